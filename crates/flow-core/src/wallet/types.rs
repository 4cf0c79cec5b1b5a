//! Wallet transfer types
//!
//! Wire types follow the wallet service contract. Monetary fields in
//! responses may arrive as JSON numbers or as decimal strings.

use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use thiserror::Error;

use crate::error::{Error, Result};

/// Who pays and who receives a reserve transfer
///
/// Identifiers are opaque; only non-emptiness is checked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferIdentity {
    pub payer_account_id: String,
    pub payer_contact: String,
    pub payee_contact: String,
}

impl TransferIdentity {
    pub fn new(
        payer_account_id: impl Into<String>,
        payer_contact: impl Into<String>,
        payee_contact: impl Into<String>,
    ) -> Self {
        Self {
            payer_account_id: payer_account_id.into(),
            payer_contact: payer_contact.into(),
            payee_contact: payee_contact.into(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        for (field, value) in [
            ("payer_account_id", &self.payer_account_id),
            ("payer_contact", &self.payer_contact),
            ("payee_contact", &self.payee_contact),
        ] {
            if value.trim().is_empty() {
                return Err(Error::InvalidInput(format!("{} must not be empty", field)));
            }
        }
        Ok(())
    }
}

/// Whether transfers reach the wallet service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    /// Real three-phase exchange with the wallet service
    Live,
    /// Synthesized success without any wallet call (non-production only)
    Degraded,
}

impl ExecutionMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExecutionMode::Live => "live",
            ExecutionMode::Degraded => "degraded",
        }
    }
}

impl fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ============================================================================
// Wire contract
// ============================================================================

/// POST transfer/simulate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulateRequest {
    pub payer_account_id: String,
    pub payer_contact: String,
    pub destination_contact: String,
    pub amount: String,
    pub fees: String,
    pub note: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulateResponse {
    pub reference_id: String,
    /// Fee total exactly as quoted, echoed back on confirmation
    #[serde(deserialize_with = "decimal_string")]
    pub total_fees: String,
}

impl SimulateResponse {
    pub fn fees_value(&self) -> f64 {
        self.total_fees.trim().parse().unwrap_or(0.0)
    }
}

/// POST transfer/authorize
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthorizeRequest {
    pub contact: String,
}

/// The code is embedded here only in development deployments; live
/// deployments deliver it out-of-band to the contact's channel.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthorizeResponse {
    pub auth_code: String,
}

impl fmt::Debug for AuthorizeResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthorizeResponse")
            .field("auth_code", &"<redacted>")
            .finish()
    }
}

/// POST transfer/confirm
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfirmRequest {
    pub payer_contact: String,
    pub payer_account_id: String,
    pub auth_code: String,
    pub reference_id: String,
    pub destination_contact: String,
    pub fees: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfirmResponse {
    #[serde(deserialize_with = "decimal_number")]
    pub resulting_balance: f64,
}

/// Format an amount as a decimal string that parses back to exactly `amount`
///
/// Whole-cent amounts keep two decimals; anything finer is written out in full
/// so the wallet is never asked to move a different figure than was decided.
pub fn format_amount(amount: f64) -> String {
    let cents = format!("{:.2}", amount);
    if cents.parse::<f64>().ok() == Some(amount) {
        cents
    } else {
        amount.to_string()
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawDecimal {
    Number(f64),
    Text(String),
}

fn decimal_number<'de, D>(deserializer: D) -> std::result::Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = match RawDecimal::deserialize(deserializer)? {
        RawDecimal::Number(n) => n,
        RawDecimal::Text(s) => s
            .trim()
            .parse::<f64>()
            .map_err(|e| serde::de::Error::custom(format!("invalid decimal {:?}: {}", s, e)))?,
    };
    if !value.is_finite() {
        return Err(serde::de::Error::custom("decimal is not finite"));
    }
    Ok(value)
}

fn decimal_string<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match RawDecimal::deserialize(deserializer)? {
        RawDecimal::Number(n) if n.is_finite() => Ok(n.to_string()),
        RawDecimal::Number(_) => Err(serde::de::Error::custom("decimal is not finite")),
        RawDecimal::Text(s) => {
            let trimmed = s.trim();
            match trimmed.parse::<f64>() {
                Ok(v) if v.is_finite() => Ok(trimmed.to_string()),
                _ => Err(serde::de::Error::custom(format!("invalid decimal {:?}", s))),
            }
        }
    }
}

// ============================================================================
// Failures and outcomes
// ============================================================================

/// Why a single phase call failed
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PhaseError {
    /// Connection or I/O failure talking to the service
    #[error("transport error: {0}")]
    Transport(String),

    #[error("timeout")]
    Timeout,

    /// Non-success status from the service
    #[error("service rejected request (HTTP {status}): {body}")]
    Rejected { status: u16, body: String },

    /// Success status but a body that does not match the contract
    #[error("malformed response: {0}")]
    MalformedResponse(String),

    /// The request never left this process (bad URL, task failure)
    #[error("local transport failure: {0}")]
    Local(String),
}

impl PhaseError {
    pub fn from_reqwest(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            PhaseError::Timeout
        } else if err.is_builder() {
            PhaseError::Local(err.to_string())
        } else {
            PhaseError::Transport(err.to_string())
        }
    }

    pub fn kind(&self) -> FailureKind {
        match self {
            PhaseError::Transport(_) | PhaseError::Local(_) => FailureKind::Transport,
            PhaseError::Timeout => FailureKind::Timeout,
            PhaseError::Rejected { .. } => FailureKind::Rejected,
            PhaseError::MalformedResponse(_) => FailureKind::MalformedResponse,
        }
    }
}

pub type PhaseResult<T> = std::result::Result<T, PhaseError>;

/// Protocol stage at which a transfer attempt stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureStage {
    Simulation,
    Authorization,
    Confirmation,
    /// Local transport machinery failed outside any phase response
    Transport,
}

impl FailureStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureStage::Simulation => "simulation",
            FailureStage::Authorization => "authorization",
            FailureStage::Confirmation => "confirmation",
            FailureStage::Transport => "transport",
        }
    }
}

impl fmt::Display for FailureStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Transport,
    Timeout,
    Rejected,
    MalformedResponse,
    Cancelled,
    /// The service handed out a reference id that was already used
    ReferenceReused,
}

/// Immutable record of one transfer attempt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TransferOutcome {
    Success {
        amount: f64,
        fees: f64,
        reference_id: String,
        /// Authoritative balance from the confirmation response (absent in degraded mode)
        balance_after: Option<f64>,
        /// True when synthesized without contacting the wallet service
        degraded: bool,
    },
    Failure {
        stage: FailureStage,
        kind: FailureKind,
        reason: String,
        /// Funds may or may not have moved; reconcile before another reservation
        ambiguous: bool,
    },
}

impl TransferOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, TransferOutcome::Success { .. })
    }

    pub fn is_ambiguous(&self) -> bool {
        matches!(
            self,
            TransferOutcome::Failure {
                ambiguous: true,
                ..
            }
        )
    }

    pub fn reference_id(&self) -> Option<&str> {
        match self {
            TransferOutcome::Success { reference_id, .. } => Some(reference_id),
            TransferOutcome::Failure { .. } => None,
        }
    }
}
