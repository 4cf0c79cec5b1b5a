//! Flow Web Server
//!
//! Axum-based REST API for the Flow cashflow agent. Acts as the admission
//! layer in front of the transfer protocol:
//! - At most one in-flight analysis per payer account
//! - Reconciliation holds after ambiguous transfers
//! - Restrictive CORS policy and security headers
//! - Sanitized error responses

use std::sync::Arc;

use axum::{
    http::{header, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use tower_http::{cors::CorsLayer, set_header::SetResponseHeaderLayer, trace::TraceLayer};
use tracing::{error, info, warn};

use flow_core::{Analyzer, ExecutionMode, FlowConfig};

mod gate;
mod handlers;

pub use gate::{AccountGate, Admission, Hold, Rejection};

/// Largest accepted request body (1 MB)
pub const MAX_BODY_SIZE: usize = 1024 * 1024;

/// Server configuration
#[derive(Clone, Default)]
pub struct ServerConfig {
    /// Allowed CORS origins (empty = same-origin only)
    pub allowed_origins: Vec<String>,
}

/// Shared application state
pub struct AppState {
    pub analyzer: Analyzer,
    pub gate: Arc<AccountGate>,
}

/// Create the application router
pub fn create_router(analyzer: Analyzer, config: ServerConfig) -> Router {
    match analyzer.protocol().mode() {
        ExecutionMode::Live => info!(
            "Wallet backend: {}",
            analyzer.protocol().host().unwrap_or("unknown")
        ),
        ExecutionMode::Degraded => {
            warn!("⚠️  Degraded mode: transfers are synthesized, no funds will move")
        }
    }

    let state = Arc::new(AppState {
        analyzer,
        gate: Arc::new(AccountGate::new()),
    });

    let api_routes = Router::new()
        .route("/health", get(handlers::health))
        .route("/classify", post(handlers::classify_forecast))
        .route("/analyze", post(handlers::analyze))
        .route(
            "/accounts/:account_id/hold",
            get(handlers::get_hold).delete(handlers::clear_hold),
        );

    // Build CORS layer
    let methods = [Method::GET, Method::POST, Method::DELETE, Method::OPTIONS];
    let cors = if config.allowed_origins.is_empty() {
        // Restrictive default: only allow same-origin
        CorsLayer::new()
            .allow_methods(methods)
            .allow_headers([header::CONTENT_TYPE])
    } else {
        let origins: Vec<HeaderValue> = config
            .allowed_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(methods)
            .allow_headers([header::CONTENT_TYPE])
    };

    Router::new()
        .nest("/api", api_routes)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        // Security headers
        .layer(SetResponseHeaderLayer::overriding(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::X_FRAME_OPTIONS,
            HeaderValue::from_static("DENY"),
        ))
}

/// Start the server
pub async fn serve(flow_config: FlowConfig, host: &str, port: u16) -> anyhow::Result<()> {
    serve_with_config(flow_config, host, port, ServerConfig::default()).await
}

/// Start the server with custom configuration
pub async fn serve_with_config(
    flow_config: FlowConfig,
    host: &str,
    port: u16,
    config: ServerConfig,
) -> anyhow::Result<()> {
    let analyzer = Analyzer::from_config(flow_config)?;
    let app = create_router(analyzer, config);
    let addr = format!("{}:{}", host, port);

    info!("Starting server at http://{}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// ============================================================================
// Error Handling
// ============================================================================

/// Application error type with proper HTTP status codes
pub struct AppError {
    status: StatusCode,
    message: String,
    internal: Option<anyhow::Error>,
}

impl AppError {
    pub fn bad_request(msg: &str) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: msg.to_string(),
            internal: None,
        }
    }

    pub fn conflict(msg: &str) -> Self {
        Self {
            status: StatusCode::CONFLICT,
            message: msg.to_string(),
            internal: None,
        }
    }

    /// Invalid input is the caller's fault; everything else is internal
    pub fn from_core(err: flow_core::Error) -> Self {
        if err.is_invalid_input() {
            Self::bad_request(&err.to_string())
        } else {
            Self::from(err)
        }
    }

    /// Admission gate refusals are conflicts with in-flight or unreconciled work
    pub fn rejected(rejection: Rejection) -> Self {
        Self::conflict(&rejection.message())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // Log the full internal error if present
        if let Some(err) = &self.internal {
            error!(error = %err, "Internal error");
        }

        let body = Json(serde_json::json!({
            "error": self.message
        }));

        (self.status, body).into_response()
    }
}

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        let err = err.into();
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            // Return generic message to client
            message: "An internal error occurred".to_string(),
            // Keep full error for logging
            internal: Some(err),
        }
    }
}
