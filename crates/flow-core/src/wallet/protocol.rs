//! Three-phase transfer protocol
//!
//! ```text
//! IDLE --submit--> SIMULATING --ok--> AUTHORIZING --ok--> CONFIRMING --ok--> SUCCEEDED
//!                  |fail: SIMULATION_FAILED
//!                               |fail: AUTH_FAILED
//!                                             |fail: CONFIRM_FAILED
//! ```
//!
//! Each attempt is consumed by [`WalletTransferProtocol::execute`], so a
//! terminal attempt can never be resumed. Reference ids are single-use across
//! the most recent [`REFERENCE_LEDGER_CAPACITY`] attempts of a protocol
//! instance. Only CONFIRMING moves funds, so only its failures are ambiguous.

use std::collections::{HashSet, VecDeque};
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde::Serialize;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::WalletConfig;
use crate::error::{Error, Result};

use super::types::{
    format_amount, AuthorizeRequest, ConfirmRequest, ConfirmResponse, ExecutionMode,
    FailureKind, FailureStage, PhaseError, PhaseResult, SimulateRequest, TransferIdentity,
    TransferOutcome,
};
use super::{WalletBackend, WalletClient};

/// Default bound on every phase call
pub const DEFAULT_PHASE_TIMEOUT: Duration = Duration::from_secs(10);

/// Number of recent reference ids remembered for reuse detection
pub const REFERENCE_LEDGER_CAPACITY: usize = 10_000;

/// Recently seen reference ids; the oldest id is forgotten once full
#[derive(Debug)]
struct ReferenceLedger {
    seen: HashSet<String>,
    order: VecDeque<String>,
    capacity: usize,
}

impl ReferenceLedger {
    fn with_capacity(capacity: usize) -> Self {
        Self {
            seen: HashSet::new(),
            order: VecDeque::new(),
            capacity: capacity.max(1),
        }
    }

    /// Record `reference_id`; false if it is still remembered
    fn claim(&mut self, reference_id: &str) -> bool {
        if self.seen.contains(reference_id) {
            return false;
        }
        if self.order.len() == self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.seen.remove(&oldest);
            }
        }
        self.seen.insert(reference_id.to_string());
        self.order.push_back(reference_id.to_string());
        true
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.order.len()
    }
}

/// Cooperative cancellation flag, checked only between phases
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Position of an attempt in the protocol state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptState {
    Idle,
    Simulating,
    Authorizing,
    Confirming,
    Succeeded,
    SimulationFailed,
    AuthFailed,
    ConfirmFailed,
}

impl AttemptState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            AttemptState::Succeeded
                | AttemptState::SimulationFailed
                | AttemptState::AuthFailed
                | AttemptState::ConfirmFailed
        )
    }

    fn can_advance_to(&self, next: AttemptState) -> bool {
        use AttemptState::*;
        matches!(
            (self, next),
            (Idle, Simulating)
                | (Idle, SimulationFailed)
                | (Simulating, Authorizing)
                | (Simulating, SimulationFailed)
                | (Authorizing, Confirming)
                | (Authorizing, AuthFailed)
                | (Confirming, Succeeded)
                | (Confirming, ConfirmFailed)
        )
    }

    /// Terminal failure state for a failure observed while in `stage`
    fn failed_at(stage: FailureStage) -> AttemptState {
        match stage {
            FailureStage::Simulation => AttemptState::SimulationFailed,
            FailureStage::Authorization => AttemptState::AuthFailed,
            FailureStage::Confirmation | FailureStage::Transport => AttemptState::ConfirmFailed,
        }
    }
}

/// One transfer attempt, created in `Idle` by [`WalletTransferProtocol::prepare`]
#[derive(Debug)]
pub struct TransferAttempt {
    id: u64,
    identity: TransferIdentity,
    amount: f64,
    state: AttemptState,
}

impl TransferAttempt {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn state(&self) -> AttemptState {
        self.state
    }

    pub fn amount(&self) -> f64 {
        self.amount
    }

    pub fn identity(&self) -> &TransferIdentity {
        &self.identity
    }

    fn advance(&mut self, next: AttemptState) {
        debug_assert!(
            self.state.can_advance_to(next),
            "invalid transfer transition {:?} -> {:?}",
            self.state,
            next
        );
        debug!(attempt = self.id, from = ?self.state, to = ?next, "Transfer state change");
        self.state = next;
    }
}

/// Final state and outcome of an executed attempt
#[derive(Debug, Clone)]
pub struct AttemptReport {
    pub state: AttemptState,
    pub outcome: TransferOutcome,
}

enum Executor {
    Live(WalletClient),
    Degraded,
}

/// Sequences simulate -> authorize -> confirm against a wallet backend
///
/// Callers must not run two attempts for the same payer account concurrently;
/// the service has no idempotency key beyond the reference id.
pub struct WalletTransferProtocol {
    executor: Executor,
    note: String,
    phase_timeout: Duration,
    used_references: Mutex<ReferenceLedger>,
    next_attempt: AtomicU64,
}

impl WalletTransferProtocol {
    fn with_executor(executor: Executor) -> Self {
        Self {
            executor,
            note: WalletConfig::default().note,
            phase_timeout: DEFAULT_PHASE_TIMEOUT,
            used_references: Mutex::new(ReferenceLedger::with_capacity(REFERENCE_LEDGER_CAPACITY)),
            next_attempt: AtomicU64::new(1),
        }
    }

    /// Protocol that talks to a real (or mock) wallet backend
    pub fn live(client: WalletClient) -> Self {
        Self::with_executor(Executor::Live(client))
    }

    /// Protocol that synthesizes successes without any wallet call
    ///
    /// Strictly for environments without a reachable wallet service.
    pub fn degraded() -> Self {
        Self::with_executor(Executor::Degraded)
    }

    /// Build the protocol selected by `config.degraded_mode`
    pub fn from_config(config: &WalletConfig) -> Result<Self> {
        let protocol = match config.execution_mode() {
            ExecutionMode::Live => Self::live(WalletClient::from_config(config)?),
            ExecutionMode::Degraded => Self::degraded(),
        };
        Ok(protocol
            .with_timeout(config.timeout())
            .with_note(&config.note))
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.phase_timeout = timeout;
        self
    }

    pub fn with_note(mut self, note: &str) -> Self {
        self.note = note.to_string();
        self
    }

    pub fn mode(&self) -> ExecutionMode {
        match self.executor {
            Executor::Live(_) => ExecutionMode::Live,
            Executor::Degraded => ExecutionMode::Degraded,
        }
    }

    /// Wallet host for logging (`None` in degraded mode)
    pub fn host(&self) -> Option<&str> {
        match &self.executor {
            Executor::Live(client) => Some(client.host()),
            Executor::Degraded => None,
        }
    }

    /// Validate inputs and create a fresh attempt in `Idle`
    pub fn prepare(&self, identity: &TransferIdentity, amount: f64) -> Result<TransferAttempt> {
        identity.validate()?;
        if !amount.is_finite() || amount <= 0.0 {
            return Err(Error::InvalidInput(format!(
                "transfer amount must be a positive number, got {}",
                amount
            )));
        }
        Ok(TransferAttempt {
            id: self.next_attempt.fetch_add(1, Ordering::SeqCst),
            identity: identity.clone(),
            amount,
            state: AttemptState::Idle,
        })
    }

    /// Prepare and execute a single attempt, returning its outcome
    pub async fn transfer(
        &self,
        identity: &TransferIdentity,
        amount: f64,
        cancel: &CancelToken,
    ) -> Result<TransferOutcome> {
        let attempt = self.prepare(identity, amount)?;
        Ok(self.execute(attempt, cancel).await.outcome)
    }

    /// Run an attempt to its terminal state
    ///
    /// Never retries. Remote failures come back as `TransferOutcome::Failure`.
    pub async fn execute(&self, attempt: TransferAttempt, cancel: &CancelToken) -> AttemptReport {
        match &self.executor {
            Executor::Degraded => self.synthesize(attempt),
            Executor::Live(client) => self.run_live(client, attempt, cancel).await,
        }
    }

    fn synthesize(&self, mut attempt: TransferAttempt) -> AttemptReport {
        warn!(
            attempt = attempt.id,
            amount = attempt.amount,
            "[DEGRADED MODE] Synthesizing transfer without wallet service"
        );
        attempt.advance(AttemptState::Simulating);
        attempt.advance(AttemptState::Authorizing);
        attempt.advance(AttemptState::Confirming);
        attempt.advance(AttemptState::Succeeded);

        AttemptReport {
            state: attempt.state,
            outcome: TransferOutcome::Success {
                amount: attempt.amount,
                fees: 0.0,
                reference_id: format!("DEGRADED-{}", Uuid::now_v7()),
                balance_after: None,
                degraded: true,
            },
        }
    }

    async fn run_live(
        &self,
        client: &WalletClient,
        mut attempt: TransferAttempt,
        cancel: &CancelToken,
    ) -> AttemptReport {
        let identity = attempt.identity.clone();

        // Phase 1: simulation (no funds move)
        if cancel.is_cancelled() {
            return cancelled(attempt, FailureStage::Simulation);
        }
        attempt.advance(AttemptState::Simulating);
        info!(
            attempt = attempt.id,
            amount = attempt.amount,
            "Step 1/3: Simulating transfer"
        );
        let simulate_request = SimulateRequest {
            payer_account_id: identity.payer_account_id.clone(),
            payer_contact: identity.payer_contact.clone(),
            destination_contact: identity.payee_contact.clone(),
            amount: format_amount(attempt.amount),
            fees: "0".to_string(),
            note: self.note.clone(),
        };
        let quote = match self.bounded(client.simulate(&simulate_request)).await {
            Ok(quote) => quote,
            Err(e) => return phase_failure(attempt, FailureStage::Simulation, e),
        };
        if quote.reference_id.trim().is_empty() {
            return phase_failure(
                attempt,
                FailureStage::Simulation,
                PhaseError::MalformedResponse("empty reference_id".into()),
            );
        }
        if !self.claim_reference(&quote.reference_id) {
            warn!(
                attempt = attempt.id,
                reference_id = %quote.reference_id,
                "Wallet service reissued a used reference id"
            );
            return failure(
                attempt,
                FailureStage::Simulation,
                FailureKind::ReferenceReused,
                format!("reference id {} was already used", quote.reference_id),
                false,
            );
        }
        info!(
            attempt = attempt.id,
            reference_id = %quote.reference_id,
            fees = %quote.total_fees,
            "Simulation successful"
        );

        // Phase 2: authorization code (no funds move, reference id now spent on failure)
        if cancel.is_cancelled() {
            return cancelled(attempt, FailureStage::Authorization);
        }
        attempt.advance(AttemptState::Authorizing);
        info!(attempt = attempt.id, "Step 2/3: Requesting authorization code");
        let authorize_request = AuthorizeRequest {
            contact: identity.payer_contact.clone(),
        };
        let authorization = match self.bounded(client.authorize(&authorize_request)).await {
            Ok(authorization) => authorization,
            Err(e) => return phase_failure(attempt, FailureStage::Authorization, e),
        };
        if authorization.auth_code.trim().is_empty() {
            return phase_failure(
                attempt,
                FailureStage::Authorization,
                PhaseError::MalformedResponse("empty auth_code".into()),
            );
        }

        // Phase 3: confirmation (moves funds; cancellation ignored once dispatched)
        if cancel.is_cancelled() {
            return cancelled(attempt, FailureStage::Confirmation);
        }
        attempt.advance(AttemptState::Confirming);
        info!(
            attempt = attempt.id,
            reference_id = %quote.reference_id,
            "Step 3/3: Confirming transfer"
        );
        let confirm_request = ConfirmRequest {
            payer_contact: identity.payer_contact.clone(),
            payer_account_id: identity.payer_account_id.clone(),
            auth_code: authorization.auth_code,
            reference_id: quote.reference_id.clone(),
            destination_contact: identity.payee_contact.clone(),
            fees: quote.total_fees.clone(),
        };
        match self
            .dispatch_confirm(client.clone(), confirm_request, attempt.id)
            .await
        {
            Ok(confirmation) => {
                attempt.advance(AttemptState::Succeeded);
                info!(
                    attempt = attempt.id,
                    reference_id = %quote.reference_id,
                    balance = confirmation.resulting_balance,
                    "Transfer successful"
                );
                AttemptReport {
                    state: attempt.state,
                    outcome: TransferOutcome::Success {
                        amount: attempt.amount,
                        fees: quote.fees_value(),
                        reference_id: quote.reference_id,
                        balance_after: Some(confirmation.resulting_balance),
                        degraded: false,
                    },
                }
            }
            Err(e) => phase_failure(attempt, FailureStage::Confirmation, e),
        }
    }

    /// Apply the phase timeout to a backend call
    async fn bounded<T, F>(&self, call: F) -> PhaseResult<T>
    where
        F: Future<Output = PhaseResult<T>>,
    {
        match tokio::time::timeout(self.phase_timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(PhaseError::Timeout),
        }
    }

    /// Run the confirmation on its own task so dropping the caller cannot abort it
    async fn dispatch_confirm(
        &self,
        client: WalletClient,
        request: ConfirmRequest,
        attempt_id: u64,
    ) -> PhaseResult<ConfirmResponse> {
        let timeout = self.phase_timeout;
        let handle = tokio::spawn(async move {
            let result = match tokio::time::timeout(timeout, client.confirm(&request)).await {
                Ok(result) => result,
                Err(_) => Err(PhaseError::Timeout),
            };
            match &result {
                Ok(response) => debug!(
                    attempt = attempt_id,
                    reference_id = %request.reference_id,
                    balance = response.resulting_balance,
                    "Confirmation reply received"
                ),
                Err(e) => warn!(
                    attempt = attempt_id,
                    reference_id = %request.reference_id,
                    error = %e,
                    "Confirmation failed; transfer state is ambiguous"
                ),
            }
            result
        });

        match handle.await {
            Ok(result) => result,
            Err(e) => Err(PhaseError::Local(format!("confirmation task failed: {}", e))),
        }
    }

    /// Record a reference id; false if it was seen recently
    fn claim_reference(&self, reference_id: &str) -> bool {
        let mut used = self
            .used_references
            .lock()
            .unwrap_or_else(|e| e.into_inner());
        used.claim(reference_id)
    }
}

fn cancelled(attempt: TransferAttempt, stage: FailureStage) -> AttemptReport {
    info!(attempt = attempt.id, stage = stage.as_str(), "Transfer cancelled");
    failure(
        attempt,
        stage,
        FailureKind::Cancelled,
        format!("cancelled before {}", stage),
        false,
    )
}

fn phase_failure(attempt: TransferAttempt, phase: FailureStage, error: PhaseError) -> AttemptReport {
    let ambiguous = phase == FailureStage::Confirmation;
    let stage = match error {
        PhaseError::Local(_) => FailureStage::Transport,
        _ => phase,
    };
    let kind = error.kind();
    let mut report = failure(attempt, stage, kind, error.to_string(), ambiguous);
    report.state = AttemptState::failed_at(phase);
    report
}

fn failure(
    mut attempt: TransferAttempt,
    stage: FailureStage,
    kind: FailureKind,
    reason: String,
    ambiguous: bool,
) -> AttemptReport {
    let next = AttemptState::failed_at(stage);
    // A cancelled attempt may stop before entering the failed phase
    if attempt.state.can_advance_to(next) {
        attempt.advance(next);
    } else {
        attempt.state = next;
    }

    if ambiguous {
        warn!(
            attempt = attempt.id,
            stage = stage.as_str(),
            reason = %reason,
            "Transfer outcome ambiguous; reconcile account before retrying"
        );
    } else {
        warn!(
            attempt = attempt.id,
            stage = stage.as_str(),
            reason = %reason,
            "Transfer failed (no funds moved)"
        );
    }

    AttemptReport {
        state: attempt.state,
        outcome: TransferOutcome::Failure {
            stage,
            kind,
            reason,
            ambiguous,
        },
    }
}
