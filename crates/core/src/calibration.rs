//! Raw reading calibration.

use serde::{Deserialize, Serialize};

use crate::device::Device;
use crate::types::Timestamp;

/// A single water level measurement as reported by the hardware.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RawReading {
    pub timestamp: Timestamp,
    /// Distance in millimetres, uncalibrated.
    pub raw_value: f64,
}

impl RawReading {
    pub fn new(timestamp: Timestamp, raw_value: f64) -> Self {
        Self {
            timestamp,
            raw_value,
        }
    }
}

/// A calibrated `(timestamp, value)` pair of a sensor's series.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CalibratedPoint {
    pub timestamp: Timestamp,
    /// Water level in millimetres after subtracting the sensor offset.
    pub value: f64,
}

/// Convert a raw reading into a calibrated water level.
pub fn calibrate(reading: &RawReading, device: &Device) -> f64 {
    calibrate_with_offset(reading.raw_value, device.effective_offset_mm())
}

pub(crate) fn calibrate_with_offset(raw_value: f64, offset_mm: f64) -> f64 {
    raw_value - offset_mm
}
