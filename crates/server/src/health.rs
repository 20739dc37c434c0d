use axum::{extract::State, http::StatusCode, Json};
use chrono::Utc;
use serde::Serialize;

use crate::api::AppState;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub timestamp: String,
    pub service: &'static str,
    pub version: &'static str,
    pub executor: &'static str,
    pub active_sessions: usize,
}

/// Degraded when the turn executor is missing. Chat still answers in that case,
/// but only with the fixed unavailable reply.
pub async fn health(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let ready = state.service.executor_available();
    let payload = HealthResponse {
        status: if ready { "healthy" } else { "degraded" },
        timestamp: Utc::now().to_rfc3339(),
        service: "concierge",
        version: env!("CARGO_PKG_VERSION"),
        executor: if ready { "ready" } else { "unavailable" },
        active_sessions: state.service.store().len().await,
    };

    let status_code = if ready { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    (status_code, Json(payload))
}
