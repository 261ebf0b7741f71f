//! Sensor directory rows.

use flooddash_core::device::{Device, Location};
use flooddash_core::types::Timestamp;
use serde::Serialize;
use sqlx::FromRow;

/// A row from the `devices` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct DeviceRow {
    pub device_id: String,
    pub name: Option<String>,
    pub offset_mm: Option<f64>,
    pub lat: Option<f64>,
    pub lng: Option<f64>,
    pub created_at: Timestamp,
}

impl From<DeviceRow> for Device {
    fn from(row: DeviceRow) -> Self {
        // The admin form writes "" for an unnamed sensor.
        let name = row.name.filter(|n| !n.trim().is_empty());
        let location = match (row.lat, row.lng) {
            (Some(lat), Some(lng)) => Some(Location { lat, lng }),
            _ => None,
        };
        Device {
            id: row.device_id,
            name,
            offset_mm: row.offset_mm,
            location,
        }
    }
}
