//! Core types for risk classification

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Severity of a risk report, ordered low < medium < high
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "low" => Ok(Severity::Low),
            "medium" => Ok(Severity::Medium),
            "high" => Ok(Severity::High),
            _ => Err(format!("Unknown severity: {}", s)),
        }
    }
}

/// A single risk detected in a forecast
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RiskFinding {
    /// The weakest period falls below the low-inflow threshold
    LowInflow {
        /// Zero-based index of the weakest period
        period_index: usize,
        amount: f64,
        /// Medium, or high when far below the threshold
        severity: Severity,
        message: String,
    },
    /// The last period is meaningfully lower than the first
    DecliningTrend {
        /// (first - last) / first
        drop_fraction: f64,
        message: String,
    },
}

impl RiskFinding {
    /// Severity this finding contributes to the report
    pub fn severity(&self) -> Severity {
        match self {
            RiskFinding::LowInflow { severity, .. } => *severity,
            RiskFinding::DecliningTrend { .. } => Severity::Medium,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            RiskFinding::LowInflow { message, .. } => message,
            RiskFinding::DecliningTrend { message, .. } => message,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            RiskFinding::LowInflow { .. } => "low_inflow",
            RiskFinding::DecliningTrend { .. } => "declining_trend",
        }
    }
}

/// Structured result of classifying a forecast
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskReport {
    pub has_risk: bool,
    pub severity: Severity,
    pub findings: Vec<RiskFinding>,
    pub min_value: f64,
    pub avg_value: f64,
    pub worst_period_index: usize,
}

impl RiskReport {
    /// Build a report from findings, deriving `has_risk` and `severity`
    pub fn from_findings(
        findings: Vec<RiskFinding>,
        min_value: f64,
        avg_value: f64,
        worst_period_index: usize,
    ) -> Self {
        let severity = findings
            .iter()
            .map(RiskFinding::severity)
            .max()
            .unwrap_or(Severity::Low);
        Self {
            has_risk: !findings.is_empty(),
            severity,
            findings,
            min_value,
            avg_value,
            worst_period_index,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_ordering() {
        assert!(Severity::High > Severity::Medium);
        assert!(Severity::Medium > Severity::Low);
        assert_eq!(
            [Severity::Medium, Severity::High, Severity::Low]
                .into_iter()
                .max(),
            Some(Severity::High)
        );
    }

    #[test]
    fn test_severity_round_trip_str() {
        for severity in [Severity::Low, Severity::Medium, Severity::High] {
            assert_eq!(Severity::from_str(severity.as_str()).unwrap(), severity);
        }
        assert!(Severity::from_str("critical").is_err());
    }

    #[test]
    fn test_finding_serializes_with_type_tag() {
        let finding = RiskFinding::DecliningTrend {
            drop_fraction: 0.2,
            message: "down".into(),
        };
        let json = serde_json::to_value(&finding).unwrap();
        assert_eq!(json["type"], "declining_trend");
        assert_eq!(json["drop_fraction"], 0.2);
    }

    #[test]
    fn test_report_without_findings_is_low() {
        let report = RiskReport::from_findings(vec![], 10.0, 12.0, 0);
        assert!(!report.has_risk);
        assert_eq!(report.severity, Severity::Low);
    }
}
