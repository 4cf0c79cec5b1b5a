//! Wallet transfer abstraction
//!
//! Moves reserved funds into a holding account through a three-phase
//! exchange with an external wallet service.
//!
//! # Architecture
//!
//! - `WalletBackend` trait: one method per remote phase (simulate, authorize, confirm)
//! - `WalletClient` enum: concrete wrapper providing Clone + compile-time dispatch
//! - Backend implementations: `HttpWallet`, `MockWallet`
//! - `WalletTransferProtocol`: sequences the phases, enforces single-use
//!   reference ids, and turns every failure into a `TransferOutcome`
//!
//! # Usage
//!
//! ```rust,ignore
//! let protocol = WalletTransferProtocol::from_config(&config.wallet)?;
//! let outcome = protocol
//!     .transfer(&identity, 500_000.0, &CancelToken::new())
//!     .await?;
//! if outcome.is_ambiguous() {
//!     // reconcile the account before reserving again
//! }
//! ```

mod http;
mod mock;
pub mod protocol;
pub mod types;

pub use http::HttpWallet;
pub use mock::{MockCalls, MockWallet};
pub use protocol::{AttemptReport, AttemptState, CancelToken, TransferAttempt, WalletTransferProtocol};
pub use types::*;

use async_trait::async_trait;

use crate::config::WalletConfig;
use crate::error::Result;

/// Trait defining the remote phases of a wallet transfer
///
/// Implementations make exactly one request per call and never retry.
#[async_trait]
pub trait WalletBackend: Send + Sync {
    /// Obtain a fee quote and a reference id; moves no funds
    async fn simulate(&self, request: &SimulateRequest) -> PhaseResult<SimulateResponse>;

    /// Request a one-time authorization code for the payer's contact
    async fn authorize(&self, request: &AuthorizeRequest) -> PhaseResult<AuthorizeResponse>;

    /// Execute the transfer; the only phase that moves funds
    async fn confirm(&self, request: &ConfirmRequest) -> PhaseResult<ConfirmResponse>;

    /// Get the host URL (for logging)
    fn host(&self) -> &str;
}

/// Concrete wallet client enum
#[derive(Clone)]
pub enum WalletClient {
    /// Wallet service over HTTP
    Http(HttpWallet),
    /// In-process mock for testing
    Mock(MockWallet),
}

impl WalletClient {
    /// Create an HTTP client from wallet configuration
    pub fn from_config(config: &WalletConfig) -> Result<Self> {
        Ok(WalletClient::Http(HttpWallet::new(
            &config.base_url,
            config.timeout(),
        )?))
    }

    pub fn mock(wallet: MockWallet) -> Self {
        WalletClient::Mock(wallet)
    }
}

#[async_trait]
impl WalletBackend for WalletClient {
    async fn simulate(&self, request: &SimulateRequest) -> PhaseResult<SimulateResponse> {
        match self {
            WalletClient::Http(b) => b.simulate(request).await,
            WalletClient::Mock(b) => b.simulate(request).await,
        }
    }

    async fn authorize(&self, request: &AuthorizeRequest) -> PhaseResult<AuthorizeResponse> {
        match self {
            WalletClient::Http(b) => b.authorize(request).await,
            WalletClient::Mock(b) => b.authorize(request).await,
        }
    }

    async fn confirm(&self, request: &ConfirmRequest) -> PhaseResult<ConfirmResponse> {
        match self {
            WalletClient::Http(b) => b.confirm(request).await,
            WalletClient::Mock(b) => b.confirm(request).await,
        }
    }

    fn host(&self) -> &str {
        match self {
            WalletClient::Http(b) => b.host(),
            WalletClient::Mock(b) => b.host(),
        }
    }
}
