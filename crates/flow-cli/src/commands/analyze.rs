//! Analyze command implementation and the text report

use std::path::PathBuf;

use anyhow::{Context, Result};
use flow_core::{
    AnalysisRequest, AnalysisResult, Analyzer, CancelToken, FlatBaselineForecaster, FlowConfig,
    ReserveAction, TransferIdentity, TransferOutcome,
};
use tracing::warn;

use super::{classify::render_risk, format_money};

/// History window used by the baseline forecaster
const BASELINE_WINDOW: usize = 8;

/// Where the forecast comes from
pub enum AnalyzeSource {
    /// Complete JSON request file
    File(PathBuf),
    /// Forecast values given directly
    Forecast(Vec<f64>),
    /// Past inflows projected with the flat baseline
    History(Vec<f64>),
}

/// Inputs for `--forecast` and `--history` runs
#[derive(Default)]
pub struct AnalyzeArgs {
    pub inflow: Option<f64>,
    pub salary: Option<f64>,
    pub account: Option<String>,
    pub contact: Option<String>,
    pub payee: Option<String>,
    pub business: Option<String>,
}

impl AnalyzeArgs {
    fn amounts(&self) -> Result<(f64, f64)> {
        let inflow = self.inflow.context("--inflow is required")?;
        let salary = self.salary.context("--salary is required")?;
        Ok((inflow, salary))
    }

    fn identity(&self) -> TransferIdentity {
        TransferIdentity::new(
            self.account.clone().unwrap_or_default(),
            self.contact.clone().unwrap_or_default(),
            self.payee.clone().unwrap_or_default(),
        )
    }
}

pub async fn cmd_analyze(
    config: FlowConfig,
    source: AnalyzeSource,
    args: AnalyzeArgs,
    json: bool,
) -> Result<()> {
    let analyzer = Analyzer::from_config(config).context("Failed to set up wallet client")?;

    // Ctrl-C stops the run between phases; a dispatched confirmation still completes
    let cancel = CancelToken::new();
    let watcher = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupt received; stopping before the next transfer phase");
                cancel.cancel();
            }
        })
    };

    let result = run_analysis(&analyzer, source, args, &cancel).await;
    watcher.abort();
    let result = result?;

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        print!("{}", render_report(&result));
    }
    Ok(())
}

/// Run one analysis from any of the supported sources
pub async fn run_analysis(
    analyzer: &Analyzer,
    source: AnalyzeSource,
    args: AnalyzeArgs,
    cancel: &CancelToken,
) -> Result<AnalysisResult> {
    let result = match source {
        AnalyzeSource::File(path) => {
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            let request: AnalysisRequest = serde_json::from_str(&content)
                .with_context(|| format!("Invalid analysis request in {}", path.display()))?;
            analyzer.analyze_request(&request, cancel).await?
        }
        AnalyzeSource::Forecast(forecast) => {
            let (current_inflow, desired_salary) = args.amounts()?;
            let request = AnalysisRequest {
                business_name: args.business.clone(),
                forecast,
                current_inflow,
                desired_salary,
                identity: args.identity(),
                thresholds: None,
            };
            analyzer.analyze_request(&request, cancel).await?
        }
        AnalyzeSource::History(history) => {
            let (current_inflow, desired_salary) = args.amounts()?;
            let source =
                FlatBaselineForecaster::new(BASELINE_WINDOW, analyzer.config().forecast_periods);
            let mut result = analyzer
                .analyze_from_source(
                    &source,
                    &history,
                    current_inflow,
                    desired_salary,
                    &args.identity(),
                    cancel,
                )
                .await?;
            result.business_name = args.business.clone();
            result
        }
    };
    Ok(result)
}

/// Plain-text cashflow report
pub fn render_report(result: &AnalysisResult) -> String {
    let rule = "=".repeat(70);
    let mut out = String::new();

    out.push_str(&format!("\n{}\n", rule));
    out.push_str(&format!(
        "📊 FLOW CASHFLOW REPORT - {}\n",
        result.business_name.as_deref().unwrap_or("Business")
    ));
    out.push_str(&format!("{}\n\n", rule));

    let forecast = &result.forecast_summary;
    out.push_str(&format!("📈 {}-PERIOD FORECAST:\n", forecast.values.len()));
    for (i, value) in forecast.values.iter().enumerate() {
        out.push_str(&format!("   Period {}: {:>16}\n", i + 1, format_money(*value)));
    }
    out.push_str(&format!("\n   Average:  {:>16}\n", format_money(forecast.avg)));
    out.push_str(&format!("   Trend:    {}\n\n", forecast.trend));

    out.push_str(&render_risk(&result.risk_report));
    out.push('\n');

    let status = &result.reserve_status;
    out.push_str("💰 AUTO-RESERVE STATUS:\n\n");
    match status.action {
        ReserveAction::Reserved => out.push_str(&format!("   ✅ {}\n", status.message)),
        ReserveAction::NoReserve => out.push_str(&format!("   ℹ️  {}\n", status.message)),
        ReserveAction::Failed => out.push_str(&format!("   ❌ {}\n", status.message)),
    }
    out.push_str(&format!(
        "   📍 Current inflow:  {}\n",
        format_money(status.current_inflow)
    ));
    out.push_str(&format!(
        "   🎯 Desired salary:  {}\n",
        format_money(status.desired_salary)
    ));
    if let Some(TransferOutcome::Success {
        reference_id,
        fees,
        balance_after,
        ..
    }) = &result.transfer_outcome
    {
        out.push_str(&format!("   🔖 Reference:       {}\n", reference_id));
        out.push_str(&format!("   💸 Fees:            {}\n", format_money(*fees)));
        if let Some(balance) = balance_after {
            out.push_str(&format!("   🏦 Balance after:   {}\n", format_money(*balance)));
        }
    }

    out.push_str(&format!("\n{}\n", rule));
    out.push_str(&format!(
        "Generated: {}\n",
        result.timestamp.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    out.push_str(&format!("{}\n", rule));
    out
}
