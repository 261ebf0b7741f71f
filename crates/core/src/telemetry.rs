//! Device health telemetry (battery and error status).

use serde::{Deserialize, Serialize};

use crate::types::Timestamp;

/// The most recent health report of a device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetrySnapshot {
    /// Battery voltage in millivolts.
    pub battery_mv: Option<i32>,
    /// Status reported by the firmware; `None`, blank or `ok` mean healthy.
    pub error_state: Option<String>,
    pub observed_at: Timestamp,
}

impl TelemetrySnapshot {
    pub fn reports_error(&self) -> bool {
        match self.error_state.as_deref().map(str::trim) {
            Some(state) => !state.is_empty() && !state.eq_ignore_ascii_case("ok"),
            None => false,
        }
    }
}
