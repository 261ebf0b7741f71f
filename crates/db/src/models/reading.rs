//! Water level and telemetry rows (append-only time-series).

use flooddash_core::calibration::RawReading;
use flooddash_core::telemetry::TelemetrySnapshot;
use flooddash_core::types::{DbId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

// ---------------------------------------------------------------------------
// Water levels
// ---------------------------------------------------------------------------

/// A raw reading from the `water_levels` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct WaterLevelRow {
    pub id: DbId,
    pub device_id: String,
    pub water_level: f64,
    pub created_at: Timestamp,
}

impl From<WaterLevelRow> for RawReading {
    fn from(row: WaterLevelRow) -> Self {
        RawReading::new(row.created_at, row.water_level)
    }
}

// ---------------------------------------------------------------------------
// Device telemetry
// ---------------------------------------------------------------------------

/// A health report from the `device_telemetry` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct TelemetryRow {
    pub id: DbId,
    pub device_id: String,
    pub battery_mv: Option<i32>,
    pub error_state: Option<String>,
    pub created_at: Timestamp,
}

impl From<TelemetryRow> for TelemetrySnapshot {
    fn from(row: TelemetryRow) -> Self {
        TelemetrySnapshot {
            battery_mv: row.battery_mv,
            error_state: row.error_state,
            observed_at: row.created_at,
        }
    }
}
