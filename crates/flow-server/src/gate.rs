//! Per-account admission gate
//!
//! The wallet service has no idempotency key beyond the single-use reference
//! id, so two transfers for the same payer must never overlap. The gate admits
//! at most one analysis per payer account and blocks an account entirely once a
//! transfer ended ambiguously, until an operator clears the hold.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};

/// Reconciliation hold placed after an ambiguous transfer
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Hold {
    pub account_id: String,
    pub reason: String,
    pub placed_at: DateTime<Utc>,
}

/// Why an account was not admitted
#[derive(Debug, Clone, PartialEq)]
pub enum Rejection {
    /// Another analysis for this account is still running
    Busy,
    /// The account must be reconciled first
    OnHold(Hold),
}

impl Rejection {
    pub fn message(&self) -> String {
        match self {
            Rejection::Busy => "A reservation for this account is already in progress".to_string(),
            Rejection::OnHold(hold) => format!(
                "Account {} is on reconciliation hold since {}: {}",
                hold.account_id,
                hold.placed_at.to_rfc3339(),
                hold.reason
            ),
        }
    }
}

#[derive(Default)]
struct GateState {
    in_flight: HashSet<String>,
    holds: HashMap<String, Hold>,
}

#[derive(Default)]
pub struct AccountGate {
    state: Mutex<GateState>,
}

impl AccountGate {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, GateState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Admit one analysis for `account_id`; released when the returned guard drops
    pub fn admit(self: &Arc<Self>, account_id: &str) -> Result<Admission, Rejection> {
        let mut state = self.lock();
        if let Some(hold) = state.holds.get(account_id) {
            return Err(Rejection::OnHold(hold.clone()));
        }
        if !state.in_flight.insert(account_id.to_string()) {
            return Err(Rejection::Busy);
        }
        Ok(Admission {
            gate: Arc::clone(self),
            account_id: account_id.to_string(),
        })
    }

    pub fn place_hold(&self, account_id: &str, reason: &str) -> Hold {
        let hold = Hold {
            account_id: account_id.to_string(),
            reason: reason.to_string(),
            placed_at: Utc::now(),
        };
        warn!(account = %account_id, reason = %reason, "Reconciliation hold placed");
        self.lock()
            .holds
            .insert(account_id.to_string(), hold.clone());
        hold
    }

    pub fn hold(&self, account_id: &str) -> Option<Hold> {
        self.lock().holds.get(account_id).cloned()
    }

    /// Remove a hold; returns the hold that was cleared, if any
    pub fn clear_hold(&self, account_id: &str) -> Option<Hold> {
        let cleared = self.lock().holds.remove(account_id);
        if cleared.is_some() {
            info!(account = %account_id, "Reconciliation hold cleared");
        }
        cleared
    }

    pub fn is_in_flight(&self, account_id: &str) -> bool {
        self.lock().in_flight.contains(account_id)
    }
}

/// Proof of admission for one account
pub struct Admission {
    gate: Arc<AccountGate>,
    account_id: String,
}

impl Admission {
    pub fn account_id(&self) -> &str {
        &self.account_id
    }
}

impl Drop for Admission {
    fn drop(&mut self) {
        self.gate.lock().in_flight.remove(&self.account_id);
    }
}
