pub mod alerts;
pub mod devices;
pub mod series;
