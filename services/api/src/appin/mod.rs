pub mod handlers;
pub mod responses;
pub mod service;

use axum::routing::get;
use axum::Router;

use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/v1/appins", get(handlers::list_app_ins))
        .route("/v1/appins/overview", get(handlers::get_overview))
}
