//! Liveness handler

use std::sync::Arc;

use axum::{extract::State, Json};
use serde::Serialize;

use crate::AppState;
use flow_core::ExecutionMode;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub mode: ExecutionMode,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wallet_host: Option<String>,
}

/// GET /api/health - Liveness and execution mode
pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let protocol = state.analyzer.protocol();
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        mode: protocol.mode(),
        wallet_host: protocol.host().map(str::to_string),
    })
}
