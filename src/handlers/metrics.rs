use axum::{
    body::Bytes,
    extract::State,
    http::header,
    response::IntoResponse,
};
use std::sync::Arc;

use crate::AppState;

/// Prometheus text exposition format.
pub const CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

// ─── GET /metrics ────────────────────────────────────────────────
/// Returns the latest published snapshot verbatim, or an empty body if the
/// collector has not published yet.

pub async fn get_metrics(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let body = state.snapshot.read(Bytes::copy_from_slice);
    ([(header::CONTENT_TYPE, CONTENT_TYPE)], body)
}
