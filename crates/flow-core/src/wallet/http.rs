//! HTTP wallet backend
//!
//! JSON-over-HTTP client for the wallet service. Every request carries the
//! configured timeout; nothing is retried here.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use crate::error::Result;

use super::types::{
    AuthorizeRequest, AuthorizeResponse, ConfirmRequest, ConfirmResponse, PhaseError, PhaseResult,
    SimulateRequest, SimulateResponse,
};
use super::WalletBackend;

/// Longest slice of an error body kept in a rejection reason
const MAX_ERROR_BODY: usize = 512;

#[derive(Clone)]
pub struct HttpWallet {
    http_client: Client,
    base_url: String,
}

impl HttpWallet {
    /// Create a new wallet client with a per-request timeout
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let http_client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http_client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn post<B, R>(&self, path: &str, body: &B) -> PhaseResult<R>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let url = format!("{}/{}", self.base_url, path);
        debug!(url = %url, "Wallet request");

        let response = self
            .http_client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(PhaseError::from_reqwest)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PhaseError::Rejected {
                status: status.as_u16(),
                body: truncate_body(&body),
            });
        }

        let bytes = response.bytes().await.map_err(PhaseError::from_reqwest)?;
        serde_json::from_slice(&bytes).map_err(|e| PhaseError::MalformedResponse(e.to_string()))
    }
}

#[async_trait]
impl WalletBackend for HttpWallet {
    async fn simulate(&self, request: &SimulateRequest) -> PhaseResult<SimulateResponse> {
        self.post("transfer/simulate", request).await
    }

    async fn authorize(&self, request: &AuthorizeRequest) -> PhaseResult<AuthorizeResponse> {
        self.post("transfer/authorize", request).await
    }

    async fn confirm(&self, request: &ConfirmRequest) -> PhaseResult<ConfirmResponse> {
        self.post("transfer/confirm", request).await
    }

    fn host(&self) -> &str {
        &self.base_url
    }
}

fn truncate_body(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.len() <= MAX_ERROR_BODY {
        return trimmed.to_string();
    }
    let mut end = MAX_ERROR_BODY;
    while !trimmed.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &trimmed[..end])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{MockWalletServer, ScriptedPhase};

    fn simulate_request() -> SimulateRequest {
        SimulateRequest {
            payer_account_id: "ACC-1".into(),
            payer_contact: "212600000001".into(),
            destination_contact: "212600000009".into(),
            amount: "500000.00".into(),
            fees: "0".into(),
            note: "test".into(),
        }
    }

    #[tokio::test]
    async fn test_simulate_against_mock_server() {
        let server = MockWalletServer::start().await;
        let wallet = HttpWallet::new(&server.url(), Duration::from_secs(5)).unwrap();

        let response = wallet.simulate(&simulate_request()).await.unwrap();
        assert!(response.reference_id.starts_with("SRV-REF-"));
        assert_eq!(server.simulate_calls(), 1);
    }

    #[tokio::test]
    async fn test_non_success_status_is_rejected() {
        let server = MockWalletServer::start().await;
        server.script(ScriptedPhase::Simulate, 422, r#"{"error":"limit exceeded"}"#);
        let wallet = HttpWallet::new(&server.url(), Duration::from_secs(5)).unwrap();

        let err = wallet.simulate(&simulate_request()).await.unwrap_err();
        match err {
            PhaseError::Rejected { status, body } => {
                assert_eq!(status, 422);
                assert!(body.contains("limit exceeded"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_malformed_body() {
        let server = MockWalletServer::start().await;
        server.script(ScriptedPhase::Authorize, 200, r#"{"unexpected":true}"#);
        let wallet = HttpWallet::new(&server.url(), Duration::from_secs(5)).unwrap();

        let err = wallet
            .authorize(&AuthorizeRequest {
                contact: "212600000001".into(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, PhaseError::MalformedResponse(_)));
    }

    #[tokio::test]
    async fn test_slow_service_times_out() {
        let server = MockWalletServer::start().await;
        server.delay(ScriptedPhase::Simulate, Duration::from_millis(500));
        let wallet = HttpWallet::new(&server.url(), Duration::from_millis(50)).unwrap();

        let err = wallet.simulate(&simulate_request()).await.unwrap_err();
        assert_eq!(err, PhaseError::Timeout);
    }

    #[tokio::test]
    async fn test_unreachable_service_is_transport_error() {
        // Port 9 (discard) on localhost is almost never listening
        let wallet = HttpWallet::new("http://127.0.0.1:9", Duration::from_secs(2)).unwrap();
        let err = wallet.simulate(&simulate_request()).await.unwrap_err();
        assert!(matches!(
            err,
            PhaseError::Transport(_) | PhaseError::Timeout
        ));
    }

    #[test]
    fn test_truncate_body() {
        assert_eq!(truncate_body("  short  "), "short");
        let long = "x".repeat(MAX_ERROR_BODY + 10);
        assert!(truncate_body(&long).ends_with("..."));
    }

    #[test]
    fn test_trailing_slash_trimmed() {
        let wallet = HttpWallet::new("http://wallet.test/api/", Duration::from_secs(1)).unwrap();
        assert_eq!(wallet.host(), "http://wallet.test/api");
    }
}
