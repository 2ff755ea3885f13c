use axum::{middleware as axum_mw, routing::get, Router};
use std::sync::Arc;

use crate::handlers;
use crate::middleware::timing;
use crate::AppState;

/// Builds the exporter's `Router`.
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(handlers::index))
        .route("/metrics", get(handlers::metrics::get_metrics))
        .with_state(state)
        .layer(axum_mw::from_fn(timing::timing_middleware))
}
