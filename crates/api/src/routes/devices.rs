use axum::routing::get;
use axum::Router;

use crate::handlers::{devices, series};
use crate::state::AppState;

/// Routes mounted at `/devices`.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(devices::list_devices))
        .route("/{id}/series", get(series::get_device_series))
}
