//! Risk classifier - turns a forecast into a severity-ranked report
//!
//! Both checks run independently and every finding is kept. The decline check
//! only ever contributes `medium`; `high` is reachable through low inflow alone.

use crate::config::RiskThresholds;
use crate::error::Result;
use crate::forecast::ForecastVector;

use super::types::{RiskFinding, RiskReport, Severity};

/// Classify a forecast against the given thresholds
pub fn classify(forecast: &ForecastVector, thresholds: &RiskThresholds) -> Result<RiskReport> {
    thresholds.validate()?;

    let (worst_index, min_value) = forecast.min_with_index();
    let avg_value = forecast.mean();

    let mut findings = Vec::new();
    if let Some(finding) = check_low_inflow(worst_index, min_value, thresholds) {
        findings.push(finding);
    }
    if let Some(finding) = check_decline(forecast, thresholds) {
        findings.push(finding);
    }

    let report = RiskReport::from_findings(findings, min_value, avg_value, worst_index);

    tracing::debug!(
        has_risk = report.has_risk,
        severity = report.severity.as_str(),
        findings = report.findings.len(),
        min = report.min_value,
        worst_period = report.worst_period_index,
        "Forecast classified"
    );

    Ok(report)
}

fn check_low_inflow(
    period_index: usize,
    amount: f64,
    thresholds: &RiskThresholds,
) -> Option<RiskFinding> {
    let threshold = thresholds.low_inflow_threshold;
    if amount >= threshold {
        return None;
    }

    let severity = if amount < threshold * thresholds.high_severity_ratio {
        Severity::High
    } else {
        Severity::Medium
    };

    Some(RiskFinding::LowInflow {
        period_index,
        amount,
        severity,
        message: format!(
            "Low cash inflow predicted: {:.0} in period {} (threshold {:.0})",
            amount,
            period_index + 1,
            threshold
        ),
    })
}

fn check_decline(forecast: &ForecastVector, thresholds: &RiskThresholds) -> Option<RiskFinding> {
    let (first, last) = (forecast.first(), forecast.last());
    // Ratio is undefined against a zero starting period
    if first == 0.0 {
        return None;
    }
    if last >= first * (1.0 - thresholds.decline_drop_fraction) {
        return None;
    }

    let drop_fraction = (first - last) / first;
    Some(RiskFinding::DecliningTrend {
        drop_fraction,
        message: format!(
            "Declining trend: {:.1}% drop expected over {} periods",
            drop_fraction * 100.0,
            forecast.len()
        ),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn forecast(values: &[f64]) -> ForecastVector {
        ForecastVector::new(values.to_vec()).unwrap()
    }

    fn thresholds(low: f64) -> RiskThresholds {
        RiskThresholds::with_low_threshold(low)
    }

    #[test]
    fn test_healthy_forecast_has_no_risk() {
        let report = classify(
            &forecast(&[2_600_000.0, 2_700_000.0, 2_550_000.0, 2_650_000.0]),
            &thresholds(2_000_000.0),
        )
        .unwrap();

        assert!(!report.has_risk);
        assert_eq!(report.severity, Severity::Low);
        assert!(report.findings.is_empty());
        assert_eq!(report.min_value, 2_550_000.0);
        assert_eq!(report.worst_period_index, 2);
    }

    #[test]
    fn test_low_inflow_at_first_period() {
        let report = classify(&forecast(&[1.0, 2.0, 3.0, 4.0]), &thresholds(2_500_000.0)).unwrap();

        assert!(report.has_risk);
        assert!(report.severity >= Severity::Medium);
        match &report.findings[0] {
            RiskFinding::LowInflow {
                period_index,
                amount,
                ..
            } => {
                assert_eq!(*period_index, 0);
                assert_eq!(*amount, 1.0);
            }
            other => panic!("unexpected finding: {:?}", other),
        }
    }

    #[test]
    fn test_far_below_threshold_is_high() {
        let report = classify(&forecast(&[1_000_000.0; 4]), &thresholds(2_000_000.0)).unwrap();
        assert_eq!(report.severity, Severity::High);
        assert_eq!(report.findings.len(), 1);
    }

    #[test]
    fn test_slightly_below_threshold_is_medium() {
        let report = classify(&forecast(&[1_800_000.0; 4]), &thresholds(2_000_000.0)).unwrap();
        assert_eq!(report.severity, Severity::Medium);
        assert_eq!(report.findings[0].severity(), Severity::Medium);
    }

    #[test]
    fn test_exactly_at_high_cutoff_is_medium() {
        // 0.75 * 2e6 == 1.5e6; the high cutoff is strict
        let report = classify(&forecast(&[1_500_000.0; 4]), &thresholds(2_000_000.0)).unwrap();
        assert_eq!(report.severity, Severity::Medium);
        assert_eq!(report.findings[0].severity(), Severity::Medium);
    }

    #[test]
    fn test_exactly_at_threshold_is_not_low() {
        let report = classify(&forecast(&[2_000_000.0; 4]), &thresholds(2_000_000.0)).unwrap();
        assert!(!report.has_risk);
    }

    #[test]
    fn test_decline_detected() {
        let report = classify(&forecast(&[100.0, 100.0, 100.0, 80.0]), &thresholds(50.0)).unwrap();
        assert_eq!(report.findings.len(), 1);
        match &report.findings[0] {
            RiskFinding::DecliningTrend { drop_fraction, .. } => {
                assert!((drop_fraction - 0.20).abs() < 1e-12);
            }
            other => panic!("unexpected finding: {:?}", other),
        }
        assert_eq!(report.severity, Severity::Medium);
    }

    #[test]
    fn test_small_decline_ignored() {
        let report = classify(&forecast(&[100.0, 100.0, 100.0, 90.0]), &thresholds(50.0)).unwrap();
        assert!(!report.has_risk);
    }

    #[test]
    fn test_drop_exactly_at_fraction_is_not_decline() {
        let report = classify(&forecast(&[100.0, 100.0, 100.0, 85.0]), &thresholds(50.0)).unwrap();
        assert!(report
            .findings
            .iter()
            .all(|f| !matches!(f, RiskFinding::DecliningTrend { .. })));
        assert!(!report.has_risk);
    }

    #[test]
    fn test_decline_never_escalates_to_high() {
        let report = classify(&forecast(&[100.0, 50.0, 20.0, 1.0]), &thresholds(0.5)).unwrap();
        assert_eq!(report.severity, Severity::Medium);
    }

    #[test]
    fn test_both_findings_collected() {
        let report = classify(
            &forecast(&[3_000_000.0, 2_000_000.0, 1_500_000.0, 1_000_000.0]),
            &thresholds(2_000_000.0),
        )
        .unwrap();

        assert_eq!(report.findings.len(), 2);
        assert_eq!(report.findings[0].kind(), "low_inflow");
        assert_eq!(report.findings[1].kind(), "declining_trend");
        assert_eq!(report.severity, Severity::High);
        assert_eq!(report.worst_period_index, 3);
    }

    #[test]
    fn test_zero_first_period_skips_decline() {
        let report = classify(&forecast(&[0.0, 100.0, 100.0, -50.0]), &thresholds(10.0)).unwrap();
        assert!(report
            .findings
            .iter()
            .all(|f| !matches!(f, RiskFinding::DecliningTrend { .. })));
        assert_eq!(report.findings.len(), 1);
    }

    #[test]
    fn test_all_equal_has_no_findings() {
        let report = classify(&forecast(&[5.0, 5.0, 5.0, 5.0]), &thresholds(5.0)).unwrap();
        assert!(report.findings.is_empty());
        assert_eq!(report.avg_value, 5.0);
    }

    #[test]
    fn test_classification_is_deterministic() {
        let input = forecast(&[1_900_000.0, 2_100_000.0, 1_700_000.0, 1_500_000.0]);
        let config = thresholds(2_000_000.0);
        let first = classify(&input, &config).unwrap();
        let second = classify(&input, &config).unwrap();
        assert_eq!(first, second);
        assert_eq!(
            serde_json::to_string(&first).unwrap(),
            serde_json::to_string(&second).unwrap()
        );
    }

    #[test]
    fn test_zero_threshold_disables_low_inflow() {
        let report = classify(&forecast(&[1.0, 2.0, 3.0, 4.0]), &thresholds(0.0)).unwrap();
        assert!(!report.has_risk);

        let report = classify(&forecast(&[5.0, 5.0, 5.0, -1.0]), &thresholds(0.0)).unwrap();
        assert_eq!(report.findings[0].kind(), "low_inflow");
    }

    #[test]
    fn test_invalid_thresholds_rejected() {
        let mut config = thresholds(2_000_000.0);
        config.decline_drop_fraction = 0.0;
        assert!(classify(&forecast(&[1.0, 2.0]), &config).is_err());
    }
}
