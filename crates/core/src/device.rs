//! Sensor (device) configuration as owned by the configuration store.

use serde::{Deserialize, Serialize};

use crate::types::DeviceId;

/// Geographic position of an installed sensor.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub lat: f64,
    pub lng: f64,
}

/// A water level sensor.
///
/// The core only reads devices; operators edit name, offset and location
/// through the configuration store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Device {
    /// Stable hardware identifier.
    pub id: DeviceId,
    /// Optional operator-facing label.
    pub name: Option<String>,
    /// Signed calibration offset in millimetres. `None` is treated as 0.
    pub offset_mm: Option<f64>,
    pub location: Option<Location>,
}

impl Device {
    /// Create an uncalibrated device with no name or location.
    pub fn new(id: impl Into<DeviceId>) -> Self {
        Self {
            id: id.into(),
            name: None,
            offset_mm: None,
            location: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_offset_mm(mut self, offset_mm: f64) -> Self {
        self.offset_mm = Some(offset_mm);
        self
    }

    pub fn with_location(mut self, lat: f64, lng: f64) -> Self {
        self.location = Some(Location { lat, lng });
        self
    }

    /// The offset applied during calibration (0 when unset).
    pub fn effective_offset_mm(&self) -> f64 {
        self.offset_mm.unwrap_or(0.0)
    }

    /// The name to show in the dashboard, falling back to the hardware id
    /// when no (non-blank) name is configured.
    pub fn display_name(&self) -> &str {
        match self.name.as_deref() {
            Some(name) if !name.trim().is_empty() => name,
            _ => &self.id,
        }
    }
}
