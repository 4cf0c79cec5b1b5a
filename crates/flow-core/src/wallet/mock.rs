//! Mock wallet backend for testing
//!
//! Scriptable per-phase failures, fixed or generated reference ids, optional
//! latency, and a record of every request received.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;

use super::types::{
    AuthorizeRequest, AuthorizeResponse, ConfirmRequest, ConfirmResponse, PhaseError, PhaseResult,
    SimulateRequest, SimulateResponse,
};
use super::WalletBackend;

/// Requests received by a [`MockWallet`], in arrival order
#[derive(Debug, Clone, Default)]
pub struct MockCalls {
    pub simulate: Vec<SimulateRequest>,
    pub authorize: Vec<AuthorizeRequest>,
    pub confirm: Vec<ConfirmRequest>,
}

#[derive(Debug)]
struct MockState {
    balance: f64,
    fees: String,
    auth_code: String,
    fixed_reference: Option<String>,
    next_reference: u64,
    simulate_error: Option<PhaseError>,
    authorize_error: Option<PhaseError>,
    confirm_error: Option<PhaseError>,
    simulate_delay: Option<Duration>,
    authorize_delay: Option<Duration>,
    confirm_delay: Option<Duration>,
    calls: MockCalls,
}

/// Mock wallet backend
///
/// Clones share state, so a test can keep a handle while the protocol owns another.
#[derive(Debug, Clone)]
pub struct MockWallet {
    state: Arc<Mutex<MockState>>,
}

impl Default for MockWallet {
    fn default() -> Self {
        Self::new()
    }
}

impl MockWallet {
    /// Healthy mock with a 10,000,000 balance and zero fees
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(MockState {
                balance: 10_000_000.0,
                fees: "0".to_string(),
                auth_code: "000000".to_string(),
                fixed_reference: None,
                next_reference: 1,
                simulate_error: None,
                authorize_error: None,
                confirm_error: None,
                simulate_delay: None,
                authorize_delay: None,
                confirm_delay: None,
                calls: MockCalls::default(),
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        // A panicking test thread must not hide the recorded calls from others
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn with_balance(self, balance: f64) -> Self {
        self.lock().balance = balance;
        self
    }

    pub fn with_fees(self, fees: &str) -> Self {
        self.lock().fees = fees.to_string();
        self
    }

    /// Authorization code handed out (and expected back on confirmation)
    pub fn with_auth_code(self, auth_code: &str) -> Self {
        self.lock().auth_code = auth_code.to_string();
        self
    }

    /// Always hand out the same reference id from simulation
    pub fn with_fixed_reference(self, reference_id: &str) -> Self {
        self.lock().fixed_reference = Some(reference_id.to_string());
        self
    }

    pub fn fail_simulation(self, error: PhaseError) -> Self {
        self.lock().simulate_error = Some(error);
        self
    }

    pub fn fail_authorization(self, error: PhaseError) -> Self {
        self.lock().authorize_error = Some(error);
        self
    }

    pub fn fail_confirmation(self, error: PhaseError) -> Self {
        self.lock().confirm_error = Some(error);
        self
    }

    /// Delay the simulation response (the request is recorded first)
    pub fn with_simulate_delay(self, delay: Duration) -> Self {
        self.lock().simulate_delay = Some(delay);
        self
    }

    /// Delay the authorization response (the request is recorded first)
    pub fn with_authorize_delay(self, delay: Duration) -> Self {
        self.lock().authorize_delay = Some(delay);
        self
    }

    /// Delay the confirmation response (the transfer is applied after the delay)
    pub fn with_confirm_delay(self, delay: Duration) -> Self {
        self.lock().confirm_delay = Some(delay);
        self
    }

    /// Clear all scripted failures
    pub fn heal(&self) {
        let mut state = self.lock();
        state.simulate_error = None;
        state.authorize_error = None;
        state.confirm_error = None;
    }

    pub fn calls(&self) -> MockCalls {
        self.lock().calls.clone()
    }

    pub fn balance(&self) -> f64 {
        self.lock().balance
    }
}

#[async_trait]
impl WalletBackend for MockWallet {
    async fn simulate(&self, request: &SimulateRequest) -> PhaseResult<SimulateResponse> {
        let delay = {
            let mut state = self.lock();
            state.calls.simulate.push(request.clone());
            state.simulate_delay
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut state = self.lock();
        if let Some(error) = state.simulate_error.clone() {
            return Err(error);
        }
        let reference_id = match &state.fixed_reference {
            Some(reference) => reference.clone(),
            None => {
                let n = state.next_reference;
                state.next_reference += 1;
                format!("MOCK-REF-{:04}", n)
            }
        };
        Ok(SimulateResponse {
            reference_id,
            total_fees: state.fees.clone(),
        })
    }

    async fn authorize(&self, request: &AuthorizeRequest) -> PhaseResult<AuthorizeResponse> {
        let delay = {
            let mut state = self.lock();
            state.calls.authorize.push(request.clone());
            state.authorize_delay
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let state = self.lock();
        if let Some(error) = state.authorize_error.clone() {
            return Err(error);
        }
        Ok(AuthorizeResponse {
            auth_code: state.auth_code.clone(),
        })
    }

    async fn confirm(&self, request: &ConfirmRequest) -> PhaseResult<ConfirmResponse> {
        let delay = {
            let mut state = self.lock();
            state.calls.confirm.push(request.clone());
            state.confirm_delay
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut state = self.lock();
        if let Some(error) = state.confirm_error.clone() {
            return Err(error);
        }
        if request.auth_code != state.auth_code {
            return Err(PhaseError::Rejected {
                status: 401,
                body: "invalid authorization code".into(),
            });
        }
        let amount = state
            .calls
            .simulate
            .iter()
            .rev()
            .find(|s| s.payer_account_id == request.payer_account_id)
            .and_then(|s| s.amount.parse::<f64>().ok())
            .unwrap_or(0.0);
        let fees = request.fees.parse::<f64>().unwrap_or(0.0);
        state.balance -= amount + fees;
        Ok(ConfirmResponse {
            resulting_balance: state.balance,
        })
    }

    fn host(&self) -> &str {
        "mock://wallet"
    }
}
