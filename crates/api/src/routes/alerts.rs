use axum::routing::get;
use axum::Router;

use crate::handlers::alerts;
use crate::state::AppState;

/// Routes mounted at `/alerts`.
pub fn router() -> Router<AppState> {
    Router::new().route("/recent", get(alerts::list_recent_alerts))
}
