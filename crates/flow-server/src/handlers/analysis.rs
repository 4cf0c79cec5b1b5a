//! Classification and analysis handlers

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    Json,
};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::info;

use crate::{AppError, AppState, MAX_BODY_SIZE};
use flow_core::{
    classify, AnalysisRequest, AnalysisResult, CancelToken, ForecastVector, RiskReport,
    RiskThresholdOverrides, TransferOutcome,
};

/// Request body for classifying a forecast
#[derive(Debug, Deserialize)]
pub struct ClassifyRequest {
    pub forecast: Vec<f64>,
    /// Laid over the configured thresholds field by field
    #[serde(default)]
    pub thresholds: Option<RiskThresholdOverrides>,
}

async fn read_json<T: DeserializeOwned>(request: Request) -> Result<T, AppError> {
    let bytes = axum::body::to_bytes(request.into_body(), MAX_BODY_SIZE)
        .await
        .map_err(|_| AppError::bad_request("Invalid request body"))?;
    serde_json::from_slice(&bytes)
        .map_err(|e| AppError::bad_request(&format!("Invalid JSON: {}", e)))
}

/// Cancels the analysis between phases if the client goes away
struct CancelOnDrop(CancelToken);

impl Drop for CancelOnDrop {
    fn drop(&mut self) {
        self.0.cancel();
    }
}

/// POST /api/classify - Classify a forecast without any transfer
pub async fn classify_forecast(
    State(state): State<Arc<AppState>>,
    request: Request,
) -> Result<Json<RiskReport>, AppError> {
    let req: ClassifyRequest = read_json(request).await?;
    let config = state.analyzer.config();

    let forecast = ForecastVector::with_periods(req.forecast, config.forecast_periods)
        .map_err(AppError::from_core)?;
    let thresholds = req.thresholds.unwrap_or_default().apply(config.risk);
    let report = classify(&forecast, &thresholds).map_err(AppError::from_core)?;

    Ok(Json(report))
}

/// POST /api/analyze - Classify, decide, and reserve for one payer account
///
/// Runs on its own task holding the account's admission, so a dropped client
/// cannot release the account while a confirmation may still be in flight.
pub async fn analyze(
    State(state): State<Arc<AppState>>,
    request: Request,
) -> Result<Json<AnalysisResult>, AppError> {
    let req: AnalysisRequest = read_json(request).await?;
    let account_id = req.identity.payer_account_id.trim().to_string();
    if account_id.is_empty() {
        return Err(AppError::bad_request("identity.payer_account_id is required"));
    }

    let admission = state
        .gate
        .admit(&account_id)
        .map_err(AppError::rejected)?;
    info!(account = %account_id, "Analysis admitted");

    let cancel = CancelToken::new();
    let _cancel_on_drop = CancelOnDrop(cancel.clone());

    let task_state = state.clone();
    let handle = tokio::spawn(async move {
        let result = task_state.analyzer.analyze_request(&req, &cancel).await;
        if let Ok(AnalysisResult {
            transfer_outcome:
                Some(TransferOutcome::Failure {
                    stage,
                    reason,
                    ambiguous: true,
                    ..
                }),
            ..
        }) = &result
        {
            task_state
                .gate
                .place_hold(admission.account_id(), &format!("{} failed: {}", stage, reason));
        }
        // Released only after any hold is in place
        drop(admission);
        result
    });

    let result = handle.await?.map_err(AppError::from_core)?;
    Ok(Json(result))
}
