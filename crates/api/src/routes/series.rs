use axum::routing::get;
use axum::Router;

use crate::handlers::series;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/series", get(series::get_multi_series))
}
