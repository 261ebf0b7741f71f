//! Handler for the recent alerts feed.

use axum::extract::{Query, State};
use axum::Json;
use chrono::{Duration, Utc};
use flooddash_core::projection::{project_all, AlertView};
use flooddash_core::store::with_timeout;
use serde::Deserialize;

use crate::error::{AppError, AppResult};
use crate::response::DataResponse;
use crate::state::AppState;

/// Query parameters for the recent alerts endpoint.
#[derive(Debug, Deserialize)]
pub struct RecentAlertsQuery {
    /// How many hours back to look (default: 24, max: 168).
    pub hours: Option<i64>,
}

/// GET /api/v1/alerts/recent?hours=24
///
/// Alerts first observed within the last `hours`, plus every alert still
/// open, newest first, with display message and severity.
pub async fn list_recent_alerts(
    State(state): State<AppState>,
    Query(query): Query<RecentAlertsQuery>,
) -> AppResult<Json<DataResponse<Vec<AlertView>>>> {
    let hours = query.hours.unwrap_or(24);
    if !(1..=168).contains(&hours) {
        return Err(AppError::BadRequest(
            "hours must be between 1 and 168".to_string(),
        ));
    }

    let timeout = state.config.fetch_timeout();
    let since = Utc::now() - Duration::hours(hours);
    let alerts = with_timeout("alert", timeout, state.stores.alerts.list_recent_alerts(since)).await?;
    let rules = with_timeout("rule", timeout, state.stores.rules.list_rules(None)).await?;

    Ok(Json(DataResponse {
        data: project_all(&alerts, &rules),
    }))
}
