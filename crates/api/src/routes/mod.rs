pub mod alerts;
pub mod devices;
pub mod health;
pub mod series;

use axum::Router;

use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// ```text
/// /devices                      sensor overview
/// /devices/{id}/series          one sensor's calibrated series
/// /series                       several sensors' series
/// /alerts/recent                recent and open alerts
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .nest("/devices", devices::router())
        .merge(series::router())
        .nest("/alerts", alerts::router())
}
