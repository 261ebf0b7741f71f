//! Handler for the sensor overview.

use axum::extract::State;
use axum::Json;
use chrono::{Duration, Utc};
use flooddash_core::alert::Alert;
use flooddash_core::device::Location;
use flooddash_core::projection::{has_recent_alert, RECENT_ALERT_HOURS};
use flooddash_core::store::with_timeout;
use flooddash_core::types::{DeviceId, Timestamp};
use flooddash_core::window::WindowPreset;
use serde::Serialize;

use crate::error::AppResult;
use crate::response::DataResponse;
use crate::state::AppState;

/// One row of the sensor overview.
#[derive(Debug, Serialize)]
pub struct DeviceSummary {
    pub id: DeviceId,
    pub name: String,
    pub offset_mm: f64,
    pub location: Option<Location>,
    /// Latest calibrated value over the last 24 hours.
    pub current_value: Option<f64>,
    pub current_at: Option<Timestamp>,
    /// `false` when the readings could not be fetched this time.
    pub available: bool,
    /// An alert was first observed for this sensor within the last 24 hours.
    pub has_recent_alert: bool,
}

/// GET /api/v1/devices
pub async fn list_devices(
    State(state): State<AppState>,
) -> AppResult<Json<DataResponse<Vec<DeviceSummary>>>> {
    let timeout = state.config.fetch_timeout();
    let devices = with_timeout("device", timeout, state.stores.devices.list_devices()).await?;

    let now = Utc::now();
    let range = WindowPreset::OneDay.range_ending_at(now);
    let outcomes = state.aggregator.aggregate(&devices, &range).await;

    // The highlight flag is cosmetic; a failed alert fetch only clears it.
    let since = now - Duration::hours(RECENT_ALERT_HOURS);
    let alerts: Vec<Alert> =
        match with_timeout("alert", timeout, state.stores.alerts.list_recent_alerts(since)).await {
            Ok(alerts) => alerts,
            Err(e) => {
                tracing::warn!(error = %e, "Recent alerts unavailable, highlight flags cleared");
                Vec::new()
            }
        };

    let summaries = devices
        .iter()
        .zip(&outcomes)
        .map(|(device, outcome)| {
            let latest = outcome.series().and_then(|s| s.latest());
            DeviceSummary {
                id: device.id.clone(),
                name: device.display_name().to_string(),
                offset_mm: device.effective_offset_mm(),
                location: device.location,
                current_value: latest.map(|p| p.value),
                current_at: latest.map(|p| p.timestamp),
                available: outcome.series().is_some(),
                has_recent_alert: has_recent_alert(&device.id, &alerts, now),
            }
        })
        .collect();

    Ok(Json(DataResponse { data: summaries }))
}
