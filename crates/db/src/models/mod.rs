//! Row types for the flood monitoring tables and their conversions into
//! core domain types.

pub mod alert;
pub mod device;
pub mod reading;
