use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use tower_http::cors::CorsLayer;

use crate::state::SharedState;
use crate::{routes_admin, routes_reports, routes_status};

pub fn router(state: SharedState) -> Router {
    let mut app = Router::new()
        .route("/", get(routes_status::get_root))
        .route("/api/reports", post(routes_reports::post_reports))
        .route("/health", get(routes_status::get_health))
        .route("/status", get(routes_status::get_status))
        .route("/download/:name", get(routes_status::get_download));

    if state.config.diagnostics {
        app = app
            .route("/test-create-excel", get(routes_admin::get_test_create))
            .route("/reset-excel", get(routes_admin::get_reset));
    }

    app.layer(DefaultBodyLimit::max(state.config.body_limit_bytes))
        .layer(CorsLayer::permissive())
        .with_state(state)
}
