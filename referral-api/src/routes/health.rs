use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use referral_shared::{HealthCheck, HealthResponse};
use std::sync::Arc;

use crate::AppState;

/// Health check that probes the backing store.
pub async fn health_check(State(state): State<Arc<AppState>>) -> Response {
    let store = state.store.ping();
    if let Err(e) = &store {
        tracing::warn!(error = %e, "store health probe failed");
    }

    let response = HealthResponse::from_checks(
        "referral-api",
        env!("CARGO_PKG_VERSION"),
        vec![HealthCheck::probe("store", &store)],
    );

    (response.status.status_code(), Json(response)).into_response()
}

/// Prometheus text exposition.
pub async fn metrics(State(state): State<Arc<AppState>>) -> Response {
    match &state.metrics {
        Some(handle) => handle.render().into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}
