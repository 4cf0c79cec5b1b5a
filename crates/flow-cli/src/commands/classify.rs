//! Classification and reservation decision commands

use anyhow::Result;
use flow_core::{classify, decide, FlowConfig, ForecastVector, RiskReport, RiskThresholdOverrides};

use super::format_money;

pub fn cmd_classify(
    config: &FlowConfig,
    values: Vec<f64>,
    threshold: Option<f64>,
    json: bool,
) -> Result<()> {
    let forecast = ForecastVector::with_periods(values, config.forecast_periods)?;
    let thresholds = RiskThresholdOverrides {
        low_inflow_threshold: threshold,
        ..Default::default()
    }
    .apply(config.risk);
    let report = classify(&forecast, &thresholds)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print!("{}", render_risk(&report));
    }
    Ok(())
}

pub fn cmd_decide(inflow: f64, salary: f64, json: bool) -> Result<()> {
    if !inflow.is_finite() || !salary.is_finite() {
        anyhow::bail!("Inflow and salary must be finite numbers");
    }
    let decision = decide(inflow, salary);

    if json {
        println!("{}", serde_json::to_string_pretty(&decision)?);
        return Ok(());
    }

    println!();
    println!("   Current inflow: {}", format_money(inflow));
    println!("   Desired salary: {}", format_money(salary));
    match decision.amount() {
        Some(amount) => println!("   💼 Reserve: {}", format_money(amount)),
        None => println!("   ℹ️  No excess to reserve"),
    }
    println!();
    Ok(())
}

/// Text block describing a risk report
pub fn render_risk(report: &RiskReport) -> String {
    let mut out = String::new();
    if report.has_risk {
        let marker = match report.severity {
            flow_core::Severity::High => "🔴",
            flow_core::Severity::Medium => "🔶",
            flow_core::Severity::Low => "⚠️",
        };
        out.push_str(&format!(
            "{} RISKS DETECTED ({}):\n\n",
            marker,
            report.severity.as_str().to_uppercase()
        ));
        for finding in &report.findings {
            out.push_str(&format!("   • {}\n", finding.message()));
        }
    } else {
        out.push_str("✅ NO RISKS DETECTED\n");
    }
    out.push_str(&format!(
        "\n   Lowest period: {} ({})\n   Average:       {}\n",
        report.worst_period_index + 1,
        format_money(report.min_value),
        format_money(report.avg_value)
    ));
    out
}
