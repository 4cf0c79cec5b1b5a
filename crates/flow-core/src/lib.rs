//! Flow Core Library
//!
//! Decision-and-transfer subsystem for the Flow cashflow agent:
//! - Forecast vectors and pluggable forecast sources
//! - Risk classification of near-term inflow forecasts
//! - Reservation policy (excess above a salary target)
//! - Three-phase wallet transfer protocol (simulate, authorize, confirm)
//! - Analysis orchestration producing a JSON-serializable result record
//! - Layered configuration (embedded defaults, override file, environment)

pub mod analysis;
pub mod config;
pub mod error;
pub mod forecast;
pub mod reservation;
pub mod risk;
pub mod wallet;

/// Test utilities including mock wallet server
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use analysis::{AnalysisRequest, AnalysisResult, Analyzer, ReserveAction, ReserveStatus};
pub use config::{FlowConfig, RiskThresholdOverrides, RiskThresholds, WalletConfig};
pub use error::{Error, Result};
pub use forecast::{
    FixedForecast, FlatBaselineForecaster, ForecastSource, ForecastSummary, ForecastVector, Trend,
};
pub use reservation::{decide, ReservationDecision};
pub use risk::{classify, RiskFinding, RiskReport, Severity};
pub use wallet::{
    CancelToken, ExecutionMode, FailureKind, FailureStage, HttpWallet, MockWallet,
    TransferIdentity, TransferOutcome, WalletBackend, WalletClient, WalletTransferProtocol,
};
