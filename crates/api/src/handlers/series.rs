//! Handlers for windowed, calibrated series.

use std::str::FromStr;

use axum::extract::{Path, Query, State};
use axum::Json;
use flooddash_core::calibration::CalibratedPoint;
use flooddash_core::device::Device;
use flooddash_core::error::CoreError;
use flooddash_core::series::{CalibratedSeries, SeriesOutcome};
use flooddash_core::store::with_timeout;
use flooddash_core::types::{DeviceId, Timestamp};
use flooddash_core::window::{TimeRange, WindowPreset};
use serde::{Deserialize, Serialize};

use crate::error::AppResult;
use crate::response::DataResponse;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

/// Query parameters for the single-sensor series endpoint.
#[derive(Debug, Deserialize)]
pub struct SeriesQuery {
    /// `1h`, `6h`, `24h` or `7d` (default: `24h`).
    pub window: Option<String>,
}

/// Query parameters for the multi-sensor series endpoint.
#[derive(Debug, Deserialize)]
pub struct MultiSeriesQuery {
    pub window: Option<String>,
    /// Comma-separated device ids; all sensors when absent.
    pub devices: Option<String>,
}

/// One sensor's series within a window.
#[derive(Debug, Serialize)]
pub struct SeriesView {
    pub device_id: DeviceId,
    pub window: WindowPreset,
    pub from: Timestamp,
    pub to: Timestamp,
    /// `false` when the readings could not be fetched this time.
    pub available: bool,
    pub points: Vec<CalibratedPoint>,
    pub latest: Option<CalibratedPoint>,
    /// Malformed readings left out of `points`.
    pub dropped: usize,
}

impl SeriesView {
    fn ready(window: WindowPreset, range: &TimeRange, series: &CalibratedSeries) -> Self {
        Self {
            device_id: series.device_id().to_string(),
            window,
            from: range.from,
            to: range.to,
            available: true,
            points: series.points().collect(),
            latest: series.latest(),
            dropped: series.dropped(),
        }
    }

    fn from_outcome(window: WindowPreset, range: &TimeRange, outcome: &SeriesOutcome) -> Self {
        match outcome {
            SeriesOutcome::Ready(series) => Self::ready(window, range, series),
            SeriesOutcome::Unavailable { device_id, .. } => Self {
                device_id: device_id.clone(),
                window,
                from: range.from,
                to: range.to,
                available: false,
                points: Vec::new(),
                latest: None,
                dropped: 0,
            },
        }
    }
}

pub(crate) fn parse_window(window: Option<&str>) -> Result<WindowPreset, CoreError> {
    match window {
        None => Ok(WindowPreset::default()),
        Some(raw) => WindowPreset::from_str(raw.trim()),
    }
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// GET /api/v1/devices/{id}/series?window=24h
///
/// Calibrated readings of one sensor, oldest first. A failed fetch is an
/// error here since there is nothing else to show.
pub async fn get_device_series(
    State(state): State<AppState>,
    Path(device_id): Path<String>,
    Query(query): Query<SeriesQuery>,
) -> AppResult<Json<DataResponse<SeriesView>>> {
    let window = parse_window(query.window.as_deref())?;
    let device = find_device(&state, &device_id).await?;

    let range = window.current_range();
    let series = state.aggregator.series(&device, &range).await?;
    Ok(Json(DataResponse {
        data: SeriesView::ready(window, &range, &series),
    }))
}

/// GET /api/v1/series?window=24h&devices=a,b
///
/// Several sensors over the same window, each on its own timestamp axis.
/// A sensor whose fetch fails is reported with `available: false`.
pub async fn get_multi_series(
    State(state): State<AppState>,
    Query(query): Query<MultiSeriesQuery>,
) -> AppResult<Json<DataResponse<Vec<SeriesView>>>> {
    let window = parse_window(query.window.as_deref())?;
    let timeout = state.config.fetch_timeout();
    let all = with_timeout("device", timeout, state.stores.devices.list_devices()).await?;

    let devices: Vec<Device> = match query.devices.as_deref() {
        None => all,
        Some(list) => {
            let mut selected = Vec::new();
            for id in list.split(',').map(str::trim).filter(|s| !s.is_empty()) {
                let device = all.iter().find(|d| d.id == id).cloned().ok_or_else(|| {
                    CoreError::NotFound {
                        entity: "Device",
                        id: id.to_string(),
                    }
                })?;
                if !selected.iter().any(|d: &Device| d.id == device.id) {
                    selected.push(device);
                }
            }
            selected
        }
    };

    let range = window.current_range();
    let outcomes = state.aggregator.aggregate(&devices, &range).await;
    let views = outcomes
        .iter()
        .map(|outcome| SeriesView::from_outcome(window, &range, outcome))
        .collect();
    Ok(Json(DataResponse { data: views }))
}

pub(crate) async fn find_device(state: &AppState, device_id: &str) -> AppResult<Device> {
    let timeout = state.config.fetch_timeout();
    with_timeout("device", timeout, state.stores.devices.get_device(device_id))
        .await?
        .ok_or_else(|| {
            CoreError::NotFound {
                entity: "Device",
                id: device_id.to_string(),
            }
            .into()
        })
}
