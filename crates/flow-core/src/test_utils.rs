//! Test utilities for flow-core
//!
//! This module provides testing infrastructure including a mock wallet server
//! speaking the three-phase transfer contract over real HTTP.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use axum::{
    extract::{Json, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
    Router,
};
use serde_json::json;
use tokio::sync::oneshot;

use crate::wallet::{AuthorizeRequest, ConfirmRequest, SimulateRequest};

/// Phase endpoints that can be scripted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScriptedPhase {
    Simulate,
    Authorize,
    Confirm,
}

#[derive(Default)]
struct ServerState {
    balance: f64,
    fees: String,
    next_reference: u64,
    quoted: HashMap<String, f64>,
    scripts: HashMap<ScriptedPhase, (u16, String)>,
    delays: HashMap<ScriptedPhase, Duration>,
    calls: HashMap<ScriptedPhase, usize>,
}

type SharedState = Arc<Mutex<ServerState>>;

fn lock(state: &SharedState) -> MutexGuard<'_, ServerState> {
    state.lock().unwrap_or_else(|e| e.into_inner())
}

/// Mock wallet service for testing
///
/// Healthy by default: simulation hands out `SRV-REF-NNNN` ids with zero fees,
/// authorization returns a fixed code, confirmation debits the quoted amount.
pub struct MockWalletServer {
    addr: SocketAddr,
    state: SharedState,
    shutdown_tx: Option<oneshot::Sender<()>>,
}

impl MockWalletServer {
    /// Start the mock server on an available port
    pub async fn start() -> Self {
        let state: SharedState = Arc::new(Mutex::new(ServerState {
            balance: 10_000_000.0,
            fees: "0.00".to_string(),
            next_reference: 1,
            ..ServerState::default()
        }));

        let app = Router::new()
            .route("/transfer/simulate", post(handle_simulate))
            .route("/transfer/authorize", post(handle_authorize))
            .route("/transfer/confirm", post(handle_confirm))
            .with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    shutdown_rx.await.ok();
                })
                .await
                .unwrap();
        });

        Self {
            addr,
            state,
            shutdown_tx: Some(shutdown_tx),
        }
    }

    /// Get the base URL for this mock server
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Answer every call to `phase` with this status and raw body
    pub fn script(&self, phase: ScriptedPhase, status: u16, body: &str) {
        lock(&self.state)
            .scripts
            .insert(phase, (status, body.to_string()));
    }

    /// Delay every response for `phase`
    pub fn delay(&self, phase: ScriptedPhase, delay: Duration) {
        lock(&self.state).delays.insert(phase, delay);
    }

    /// Fee total quoted by simulation (sent as a decimal string)
    pub fn set_fees(&self, fees: &str) {
        lock(&self.state).fees = fees.to_string();
    }

    pub fn simulate_calls(&self) -> usize {
        self.calls(ScriptedPhase::Simulate)
    }

    pub fn authorize_calls(&self) -> usize {
        self.calls(ScriptedPhase::Authorize)
    }

    pub fn confirm_calls(&self) -> usize {
        self.calls(ScriptedPhase::Confirm)
    }

    fn calls(&self, phase: ScriptedPhase) -> usize {
        lock(&self.state).calls.get(&phase).copied().unwrap_or(0)
    }

    pub fn balance(&self) -> f64 {
        lock(&self.state).balance
    }

    /// Stop the mock server
    pub fn stop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

impl Drop for MockWalletServer {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Record the call and return any scripted response after the configured delay
async fn intercept(state: &SharedState, phase: ScriptedPhase) -> Option<Response> {
    let (delay, scripted) = {
        let mut state = lock(state);
        *state.calls.entry(phase).or_insert(0) += 1;
        (
            state.delays.get(&phase).copied(),
            state.scripts.get(&phase).cloned(),
        )
    };
    if let Some(delay) = delay {
        tokio::time::sleep(delay).await;
    }
    scripted.map(|(status, body)| {
        let status = StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, [(header::CONTENT_TYPE, "application/json")], body).into_response()
    })
}

async fn handle_simulate(
    State(state): State<SharedState>,
    Json(request): Json<SimulateRequest>,
) -> Response {
    if let Some(response) = intercept(&state, ScriptedPhase::Simulate).await {
        return response;
    }
    let mut state = lock(&state);
    let reference_id = format!("SRV-REF-{:04}", state.next_reference);
    state.next_reference += 1;
    let amount = request.amount.parse::<f64>().unwrap_or(0.0);
    state.quoted.insert(reference_id.clone(), amount);
    Json(json!({
        "reference_id": reference_id,
        "total_fees": state.fees,
    }))
    .into_response()
}

async fn handle_authorize(
    State(state): State<SharedState>,
    Json(_request): Json<AuthorizeRequest>,
) -> Response {
    if let Some(response) = intercept(&state, ScriptedPhase::Authorize).await {
        return response;
    }
    Json(json!({ "auth_code": "123456" })).into_response()
}

async fn handle_confirm(
    State(state): State<SharedState>,
    Json(request): Json<ConfirmRequest>,
) -> Response {
    if let Some(response) = intercept(&state, ScriptedPhase::Confirm).await {
        return response;
    }
    let mut state = lock(&state);
    let Some(amount) = state.quoted.remove(&request.reference_id) else {
        return (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": "unknown or used reference_id" })),
        )
            .into_response();
    };
    let fees = request.fees.parse::<f64>().unwrap_or(0.0);
    state.balance -= amount + fees;
    // Balance as a decimal string, like the production service
    Json(json!({ "resulting_balance": format!("{:.2}", state.balance) })).into_response()
}
