//! Domain core of the flood monitoring dashboard.
//!
//! Turns raw water level readings into calibrated, windowed series and
//! evaluates per-device alert rules, opening and closing deduplicated alerts
//! through injected [`store`] capabilities. Nothing in here talks to a
//! database or the network directly.

pub mod alert;
pub mod calibration;
pub mod device;
pub mod error;
pub mod projection;
pub mod rule;
pub mod rules;
pub mod series;
pub mod store;
pub mod telemetry;
pub mod types;
pub mod window;
