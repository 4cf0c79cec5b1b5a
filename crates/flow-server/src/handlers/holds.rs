//! Reconciliation hold handlers

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    Json,
};
use serde::Serialize;

use crate::{AppState, Hold};

#[derive(Debug, Serialize)]
pub struct HoldStatus {
    pub account_id: String,
    pub on_hold: bool,
    pub in_flight: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hold: Option<Hold>,
}

#[derive(Debug, Serialize)]
pub struct ClearHoldResponse {
    pub account_id: String,
    pub cleared: bool,
}

/// GET /api/accounts/:account_id/hold - Inspect an account's hold
pub async fn get_hold(
    State(state): State<Arc<AppState>>,
    Path(account_id): Path<String>,
) -> Json<HoldStatus> {
    let hold = state.gate.hold(&account_id);
    Json(HoldStatus {
        on_hold: hold.is_some(),
        in_flight: state.gate.is_in_flight(&account_id),
        hold,
        account_id,
    })
}

/// DELETE /api/accounts/:account_id/hold - Clear a hold after out-of-band reconciliation
pub async fn clear_hold(
    State(state): State<Arc<AppState>>,
    Path(account_id): Path<String>,
) -> Json<ClearHoldResponse> {
    let cleared = state.gate.clear_hold(&account_id).is_some();
    Json(ClearHoldResponse {
        account_id,
        cleared,
    })
}
