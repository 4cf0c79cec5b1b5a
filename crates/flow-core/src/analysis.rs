//! Analysis orchestration
//!
//! One request/response cycle: classify the forecast, decide the reservation,
//! run the transfer protocol when money should move, and assemble the
//! outward-facing [`AnalysisResult`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::config::{FlowConfig, RiskThresholdOverrides, RiskThresholds};
use crate::error::{Error, Result};
use crate::forecast::{ForecastSource, ForecastSummary, ForecastVector};
use crate::reservation::{decide, ReservationDecision};
use crate::risk::{classify, RiskReport};
use crate::wallet::{
    format_amount, CancelToken, TransferIdentity, TransferOutcome, WalletTransferProtocol,
};

/// What happened to this period's reserve
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReserveAction {
    Reserved,
    NoReserve,
    Failed,
}

impl ReserveAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReserveAction::Reserved => "reserved",
            ReserveAction::NoReserve => "no_reserve",
            ReserveAction::Failed => "failed",
        }
    }
}

impl std::fmt::Display for ReserveAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Human-readable reserve status for the result record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReserveStatus {
    pub action: ReserveAction,
    pub message: String,
    pub current_inflow: f64,
    pub desired_salary: f64,
}

impl ReserveStatus {
    fn describe(
        decision: &ReservationDecision,
        outcome: Option<&TransferOutcome>,
        current_inflow: f64,
        desired_salary: f64,
    ) -> Self {
        let (action, message) = match (decision, outcome) {
            (ReservationDecision::NoAction { reason }, _) => {
                (ReserveAction::NoReserve, reason.clone())
            }
            (
                ReservationDecision::ReserveAmount { .. },
                Some(TransferOutcome::Success {
                    amount,
                    reference_id,
                    degraded,
                    ..
                }),
            ) => {
                let mut message = format!(
                    "Reserved {} to the reserve account (reference {})",
                    format_amount(*amount),
                    reference_id
                );
                if *degraded {
                    message.push_str(" [degraded mode: no funds moved]");
                }
                (ReserveAction::Reserved, message)
            }
            (
                ReservationDecision::ReserveAmount { amount },
                Some(TransferOutcome::Failure {
                    stage,
                    reason,
                    ambiguous,
                    ..
                }),
            ) => {
                let mut message = format!(
                    "Failed to reserve {}: {} failed: {}",
                    format_amount(*amount),
                    stage,
                    reason
                );
                if *ambiguous {
                    message.push_str(
                        ". Transfer state unknown; reconcile the account before retrying",
                    );
                }
                (ReserveAction::Failed, message)
            }
            (ReservationDecision::ReserveAmount { amount }, None) => (
                ReserveAction::Failed,
                format!(
                    "Failed to reserve {}: transfer was not attempted",
                    format_amount(*amount)
                ),
            ),
        };
        Self {
            action,
            message,
            current_inflow,
            desired_salary,
        }
    }
}

/// Outward-facing record of one analysis
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub business_name: Option<String>,
    pub forecast_summary: ForecastSummary,
    pub risk_report: RiskReport,
    pub reservation_decision: ReservationDecision,
    /// Present only when a transfer was attempted
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transfer_outcome: Option<TransferOutcome>,
    pub reserve_status: ReserveStatus,
}

/// Self-contained analysis input (JSON file or API body)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisRequest {
    #[serde(default)]
    pub business_name: Option<String>,
    pub forecast: Vec<f64>,
    pub current_inflow: f64,
    pub desired_salary: f64,
    pub identity: TransferIdentity,
    /// Laid over the configured thresholds field by field
    #[serde(default)]
    pub thresholds: Option<RiskThresholdOverrides>,
}

/// Composes classifier, policy, and transfer protocol
pub struct Analyzer {
    config: FlowConfig,
    protocol: WalletTransferProtocol,
}

impl Analyzer {
    pub fn new(config: FlowConfig, protocol: WalletTransferProtocol) -> Self {
        Self { config, protocol }
    }

    /// Analyzer with the protocol selected by the wallet config
    pub fn from_config(config: FlowConfig) -> Result<Self> {
        let protocol = WalletTransferProtocol::from_config(&config.wallet)?;
        Ok(Self::new(config, protocol))
    }

    pub fn config(&self) -> &FlowConfig {
        &self.config
    }

    pub fn protocol(&self) -> &WalletTransferProtocol {
        &self.protocol
    }

    /// Run a full analysis for a forecast
    ///
    /// Fails only on invalid input; transfer failures are reported in the result.
    pub async fn analyze(
        &self,
        forecast: &ForecastVector,
        current_inflow: f64,
        desired_salary: f64,
        identity: &TransferIdentity,
        thresholds: &RiskThresholds,
    ) -> Result<AnalysisResult> {
        self.run(
            forecast,
            current_inflow,
            desired_salary,
            identity,
            thresholds,
            None,
            &CancelToken::new(),
        )
        .await
    }

    /// Run an analysis described by an [`AnalysisRequest`]
    pub async fn analyze_request(
        &self,
        request: &AnalysisRequest,
        cancel: &CancelToken,
    ) -> Result<AnalysisResult> {
        let forecast = ForecastVector::with_periods(
            request.forecast.clone(),
            self.config.forecast_periods,
        )?;
        let thresholds = request
            .thresholds
            .unwrap_or_default()
            .apply(self.config.risk);
        self.run(
            &forecast,
            request.current_inflow,
            request.desired_salary,
            &request.identity,
            &thresholds,
            request.business_name.as_deref(),
            cancel,
        )
        .await
    }

    /// Produce the forecast from `source`, then analyze it with the configured thresholds
    pub async fn analyze_from_source(
        &self,
        source: &dyn ForecastSource,
        history: &[f64],
        current_inflow: f64,
        desired_salary: f64,
        identity: &TransferIdentity,
        cancel: &CancelToken,
    ) -> Result<AnalysisResult> {
        let produced = source.produce(history)?;
        info!(source = source.name(), periods = produced.len(), "Forecast produced");
        let forecast = ForecastVector::with_periods(
            produced.values().to_vec(),
            self.config.forecast_periods,
        )?;
        self.run(
            &forecast,
            current_inflow,
            desired_salary,
            identity,
            &self.config.risk,
            None,
            cancel,
        )
        .await
    }

    #[allow(clippy::too_many_arguments)]
    async fn run(
        &self,
        forecast: &ForecastVector,
        current_inflow: f64,
        desired_salary: f64,
        identity: &TransferIdentity,
        thresholds: &RiskThresholds,
        business_name: Option<&str>,
        cancel: &CancelToken,
    ) -> Result<AnalysisResult> {
        if forecast.len() != self.config.forecast_periods {
            return Err(Error::InvalidInput(format!(
                "forecast must contain exactly {} periods, got {}",
                self.config.forecast_periods,
                forecast.len()
            )));
        }
        for (name, value) in [
            ("current_inflow", current_inflow),
            ("desired_salary", desired_salary),
        ] {
            if !value.is_finite() {
                return Err(Error::InvalidInput(format!(
                    "{} must be a finite number",
                    name
                )));
            }
        }

        info!(
            business = business_name.unwrap_or("business"),
            "Step 1/3: Classifying forecast risk"
        );
        let risk_report = classify(forecast, thresholds)?;
        if risk_report.has_risk {
            info!(
                severity = %risk_report.severity,
                findings = risk_report.findings.len(),
                "Risks detected"
            );
        } else {
            info!("No significant risks detected");
        }

        info!("Step 2/3: Checking for excess inflow");
        let decision = decide(current_inflow, desired_salary);

        let transfer_outcome = match &decision {
            ReservationDecision::ReserveAmount { amount } => {
                info!(amount = *amount, mode = %self.protocol.mode(), "Step 3/3: Reserving excess");
                let attempt = self.protocol.prepare(identity, *amount)?;
                let report = self.protocol.execute(attempt, cancel).await;
                Some(report.outcome)
            }
            ReservationDecision::NoAction { reason } => {
                info!(reason = %reason, "Step 3/3: Nothing to reserve");
                None
            }
        };

        let reserve_status = ReserveStatus::describe(
            &decision,
            transfer_outcome.as_ref(),
            current_inflow,
            desired_salary,
        );
        match reserve_status.action {
            ReserveAction::Failed => warn!(message = %reserve_status.message, "Reserve failed"),
            _ => info!(message = %reserve_status.message, "Analysis complete"),
        }

        Ok(AnalysisResult {
            timestamp: Utc::now(),
            business_name: business_name.map(str::to_string),
            forecast_summary: forecast.summary(),
            risk_report,
            reservation_decision: decision,
            transfer_outcome,
            reserve_status,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forecast::{FixedForecast, FlatBaselineForecaster, Trend};
    use crate::risk::Severity;
    use crate::wallet::{FailureStage, MockWallet, PhaseError, WalletClient};

    fn identity() -> TransferIdentity {
        TransferIdentity::new("LAN193541347060000000001", "212666233333", "212666999999")
    }

    fn analyzer(wallet: &MockWallet) -> Analyzer {
        Analyzer::new(
            FlowConfig::default(),
            WalletTransferProtocol::live(WalletClient::mock(wallet.clone())),
        )
    }

    fn forecast(values: &[f64]) -> ForecastVector {
        ForecastVector::new(values.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_end_to_end_reserve() {
        let wallet = MockWallet::new();
        let analyzer = analyzer(&wallet);

        let result = analyzer
            .analyze(
                &forecast(&[2.6e6, 2.7e6, 2.55e6, 2.65e6]),
                3e6,
                2.5e6,
                &identity(),
                &RiskThresholds::with_low_threshold(2e6),
            )
            .await
            .unwrap();

        assert!(!result.risk_report.has_risk);
        assert_eq!(result.risk_report.severity, Severity::Low);
        assert_eq!(
            result.reservation_decision,
            ReservationDecision::ReserveAmount { amount: 500_000.0 }
        );
        match result.transfer_outcome {
            Some(TransferOutcome::Success { amount, .. }) => assert_eq!(amount, 500_000.0),
            other => panic!("unexpected outcome: {:?}", other),
        }
        assert_eq!(result.reserve_status.action, ReserveAction::Reserved);
        assert!(result.reserve_status.message.contains("500000.00"));
        assert_eq!(result.forecast_summary.trend, Trend::Growing);
        assert_eq!(wallet.calls().confirm.len(), 1);
    }

    #[tokio::test]
    async fn test_sub_cent_excess_moves_the_decided_amount() {
        let wallet = MockWallet::new();
        let analyzer = analyzer(&wallet);

        let result = analyzer
            .analyze(
                &forecast(&[3e6; 4]),
                2_500_000.004,
                2_500_000.0,
                &identity(),
                &RiskThresholds::default(),
            )
            .await
            .unwrap();

        let decided = result.reservation_decision.amount().unwrap();
        assert_eq!(decided, 2_500_000.004 - 2_500_000.0);

        let calls = wallet.calls();
        assert_ne!(calls.simulate[0].amount, "0.00");
        assert_eq!(calls.simulate[0].amount.parse::<f64>().unwrap(), decided);
        match result.transfer_outcome {
            Some(TransferOutcome::Success { amount, .. }) => assert_eq!(amount, decided),
            other => panic!("unexpected outcome: {:?}", other),
        }
        assert!(result
            .reserve_status
            .message
            .contains(&calls.simulate[0].amount));
    }

    #[tokio::test]
    async fn test_no_action_makes_no_calls() {
        let wallet = MockWallet::new();
        let analyzer = analyzer(&wallet);

        let result = analyzer
            .analyze(
                &forecast(&[1.0, 2.0, 3.0, 4.0]),
                2e6,
                2.5e6,
                &identity(),
                &RiskThresholds::with_low_threshold(2.5e6),
            )
            .await
            .unwrap();

        assert!(result.risk_report.has_risk);
        assert!(result.transfer_outcome.is_none());
        assert_eq!(result.reserve_status.action, ReserveAction::NoReserve);
        assert_eq!(wallet.calls().simulate.len(), 0);
    }

    #[tokio::test]
    async fn test_transfer_failure_does_not_abort() {
        let wallet = MockWallet::new().fail_simulation(PhaseError::Rejected {
            status: 503,
            body: "maintenance".into(),
        });
        let analyzer = analyzer(&wallet);

        let result = analyzer
            .analyze(
                &forecast(&[3e6; 4]),
                3e6,
                2.5e6,
                &identity(),
                &RiskThresholds::default(),
            )
            .await
            .unwrap();

        assert_eq!(result.reserve_status.action, ReserveAction::Failed);
        assert!(result.reserve_status.message.contains("simulation failed"));
        assert!(!result.reserve_status.message.contains("reconcile"));
        assert!(matches!(
            result.transfer_outcome,
            Some(TransferOutcome::Failure {
                stage: FailureStage::Simulation,
                ..
            })
        ));
    }

    #[tokio::test]
    async fn test_ambiguous_failure_asks_for_reconciliation() {
        let wallet = MockWallet::new().fail_confirmation(PhaseError::Timeout);
        let analyzer = analyzer(&wallet);

        let result = analyzer
            .analyze(
                &forecast(&[3e6; 4]),
                3e6,
                2.5e6,
                &identity(),
                &RiskThresholds::default(),
            )
            .await
            .unwrap();

        assert!(result.transfer_outcome.as_ref().unwrap().is_ambiguous());
        assert!(result.reserve_status.message.contains("reconcile"));
    }

    #[tokio::test]
    async fn test_invalid_thresholds_abort_before_transfer() {
        let wallet = MockWallet::new();
        let analyzer = analyzer(&wallet);

        let err = analyzer
            .analyze(
                &forecast(&[3e6; 4]),
                3e6,
                2.5e6,
                &identity(),
                &RiskThresholds::with_low_threshold(-1.0),
            )
            .await
            .unwrap_err();

        assert!(err.is_invalid_input());
        assert_eq!(wallet.calls().simulate.len(), 0);
    }

    #[tokio::test]
    async fn test_rejects_non_finite_inputs_and_wrong_length() {
        let analyzer = analyzer(&MockWallet::new());
        let thresholds = RiskThresholds::default();

        assert!(analyzer
            .analyze(&forecast(&[3e6; 4]), f64::NAN, 1.0, &identity(), &thresholds)
            .await
            .unwrap_err()
            .is_invalid_input());
        assert!(analyzer
            .analyze(&forecast(&[3e6; 3]), 3e6, 1.0, &identity(), &thresholds)
            .await
            .unwrap_err()
            .is_invalid_input());
    }

    #[tokio::test]
    async fn test_empty_identity_only_matters_when_reserving() {
        let wallet = MockWallet::new();
        let analyzer = analyzer(&wallet);
        let blank = TransferIdentity::new("", "", "");

        let no_action = analyzer
            .analyze(&forecast(&[3e6; 4]), 1e6, 2e6, &blank, &RiskThresholds::default())
            .await;
        assert!(no_action.is_ok());

        let reserve = analyzer
            .analyze(&forecast(&[3e6; 4]), 3e6, 2e6, &blank, &RiskThresholds::default())
            .await;
        assert!(reserve.unwrap_err().is_invalid_input());
        assert_eq!(wallet.calls().simulate.len(), 0);
    }

    #[tokio::test]
    async fn test_analyze_request_uses_config_thresholds() {
        let analyzer = Analyzer::new(
            FlowConfig::default(),
            WalletTransferProtocol::degraded(),
        );
        let request: AnalysisRequest = serde_json::from_value(serde_json::json!({
            "business_name": "ABC Trading",
            "forecast": [1e6, 1e6, 1e6, 1e6],
            "current_inflow": 3e6,
            "desired_salary": 2.5e6,
            "identity": {
                "payer_account_id": "ACC-1",
                "payer_contact": "212666233333",
                "payee_contact": "212666999999"
            }
        }))
        .unwrap();

        let result = analyzer
            .analyze_request(&request, &CancelToken::new())
            .await
            .unwrap();
        assert_eq!(result.business_name.as_deref(), Some("ABC Trading"));
        assert_eq!(result.risk_report.severity, Severity::High);
        assert!(result.reserve_status.message.contains("degraded"));
    }

    #[tokio::test]
    async fn test_analyze_from_source() {
        let analyzer = Analyzer::new(FlowConfig::default(), WalletTransferProtocol::degraded());
        let history = vec![2.8e6; 10];

        let result = analyzer
            .analyze_from_source(
                &FlatBaselineForecaster::default(),
                &history,
                2.0e6,
                2.5e6,
                &identity(),
                &CancelToken::new(),
            )
            .await
            .unwrap();
        assert_eq!(result.forecast_summary.values, vec![2.8e6; 4]);
        assert_eq!(result.forecast_summary.trend, Trend::Flat);

        let short = analyzer
            .analyze_from_source(
                &FixedForecast::new(vec![1.0, 2.0]),
                &[],
                2.0e6,
                2.5e6,
                &identity(),
                &CancelToken::new(),
            )
            .await;
        assert!(short.unwrap_err().is_invalid_input());
    }

    #[tokio::test]
    async fn test_result_json_shape() {
        let analyzer = Analyzer::new(FlowConfig::default(), WalletTransferProtocol::degraded());
        let result = analyzer
            .analyze(
                &forecast(&[100.0, 100.0, 100.0, 80.0]),
                10.0,
                20.0,
                &identity(),
                &RiskThresholds::with_low_threshold(50.0),
            )
            .await
            .unwrap();

        let json = serde_json::to_value(&result).unwrap();
        assert!(json["timestamp"].is_string());
        assert!(json.get("forecast").is_none());
        assert_eq!(json["forecast_summary"]["trend"], "declining");
        assert_eq!(json["forecast_summary"]["min"], 80.0);
        assert_eq!(json["reservation_decision"]["action"], "no_action");
        assert_eq!(json["reserve_status"]["action"], "no_reserve");
        assert_eq!(json["risk_report"]["findings"][0]["type"], "declining_trend");
        assert!(json.get("transfer_outcome").is_none());
    }
}
