//! Flow configuration
//!
//! Config is loaded with a two-layer resolution:
//! 1. Explicit path, or the override in the data dir (~/.local/share/flow/config/flow.toml)
//! 2. Fall back to embedded defaults (compiled into binary)
//!
//! Environment variables are applied on top of whichever file was used.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::wallet::ExecutionMode;

/// Embedded default config (compiled into binary)
const DEFAULT_CONFIG: &str = include_str!("../../../config/flow.toml");

/// Thresholds used by the risk classifier
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskThresholds {
    /// Minimum acceptable inflow for a single period
    pub low_inflow_threshold: f64,
    /// Relative first-to-last drop that counts as a declining trend
    pub decline_drop_fraction: f64,
    /// Fraction of the threshold below which a low-inflow finding is high severity
    pub high_severity_ratio: f64,
}

impl Default for RiskThresholds {
    fn default() -> Self {
        Self {
            low_inflow_threshold: 2_000_000.0,
            decline_drop_fraction: 0.15,
            high_severity_ratio: 0.75,
        }
    }
}

impl RiskThresholds {
    /// Thresholds with a custom low-inflow threshold and default ratios
    pub fn with_low_threshold(low_inflow_threshold: f64) -> Self {
        Self {
            low_inflow_threshold,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        // Zero turns the low-inflow check off for non-negative forecasts
        if !self.low_inflow_threshold.is_finite() || self.low_inflow_threshold < 0.0 {
            return Err(Error::InvalidInput(format!(
                "low_inflow_threshold must be a non-negative number, got {}",
                self.low_inflow_threshold
            )));
        }
        if !(self.decline_drop_fraction > 0.0 && self.decline_drop_fraction < 1.0) {
            return Err(Error::InvalidInput(format!(
                "decline_drop_fraction must be in (0, 1), got {}",
                self.decline_drop_fraction
            )));
        }
        if !(self.high_severity_ratio > 0.0 && self.high_severity_ratio <= 1.0) {
            return Err(Error::InvalidInput(format!(
                "high_severity_ratio must be in (0, 1], got {}",
                self.high_severity_ratio
            )));
        }
        Ok(())
    }
}

/// Per-request threshold overrides; unset fields keep the configured value
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RiskThresholdOverrides {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub low_inflow_threshold: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decline_drop_fraction: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub high_severity_ratio: Option<f64>,
}

impl RiskThresholdOverrides {
    /// Overlay the set fields on `base`
    pub fn apply(&self, base: RiskThresholds) -> RiskThresholds {
        RiskThresholds {
            low_inflow_threshold: self.low_inflow_threshold.unwrap_or(base.low_inflow_threshold),
            decline_drop_fraction: self
                .decline_drop_fraction
                .unwrap_or(base.decline_drop_fraction),
            high_severity_ratio: self.high_severity_ratio.unwrap_or(base.high_severity_ratio),
        }
    }
}

/// Wallet service connection settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WalletConfig {
    /// Base URL of the wallet API (phase paths are appended)
    pub base_url: String,
    /// Per-phase timeout in seconds
    pub timeout_secs: u64,
    /// Synthesize transfers instead of calling the wallet service
    pub degraded_mode: bool,
    /// Note attached to the simulated transfer
    pub note: String,
}

impl Default for WalletConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8081/wallet".to_string(),
            timeout_secs: 10,
            degraded_mode: false,
            note: "Auto-reserve by FLOW".to_string(),
        }
    }
}

impl WalletConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn execution_mode(&self) -> ExecutionMode {
        if self.degraded_mode {
            ExecutionMode::Degraded
        } else {
            ExecutionMode::Live
        }
    }
}

/// Top-level Flow configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FlowConfig {
    /// Number of periods every forecast must contain
    pub forecast_periods: usize,
    pub risk: RiskThresholds,
    pub wallet: WalletConfig,
}

impl Default for FlowConfig {
    fn default() -> Self {
        Self {
            forecast_periods: 4,
            risk: RiskThresholds::default(),
            wallet: WalletConfig::default(),
        }
    }
}

impl FlowConfig {
    /// Load configuration (explicit path or override first, then embedded default),
    /// then apply environment overrides and validate.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let content = match path {
            Some(path) => fs::read_to_string(path).map_err(|e| {
                Error::Config(format!("Failed to read {}: {}", path.display(), e))
            })?,
            None => match default_config_path() {
                Some(default_path) if default_path.exists() => {
                    tracing::debug!(path = %default_path.display(), "Using config override");
                    fs::read_to_string(&default_path).map_err(|e| {
                        Error::Config(format!("Failed to read {}: {}", default_path.display(), e))
                    })?
                }
                _ => DEFAULT_CONFIG.to_string(),
            },
        };

        let mut config = Self::from_toml(&content)?;
        config.apply_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from TOML text (missing fields take defaults)
    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// The embedded default configuration
    pub fn embedded() -> Result<Self> {
        Self::from_toml(DEFAULT_CONFIG)
    }

    /// Apply `FLOW_*` overrides using the given variable lookup
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup("FLOW_WALLET_URL").filter(|s| !s.is_empty()) {
            self.wallet.base_url = url;
        }
        if let Some(flag) = lookup("FLOW_DEGRADED_MODE") {
            self.wallet.degraded_mode = parse_flag(&flag);
        }
        if let Some(secs) = lookup("FLOW_WALLET_TIMEOUT_SECS") {
            match secs.trim().parse() {
                Ok(secs) => self.wallet.timeout_secs = secs,
                Err(_) => tracing::warn!(value = %secs, "Ignoring invalid FLOW_WALLET_TIMEOUT_SECS"),
            }
        }
        if let Some(threshold) = lookup("FLOW_LOW_INFLOW_THRESHOLD") {
            match threshold.trim().parse() {
                Ok(value) => self.risk.low_inflow_threshold = value,
                Err(_) => {
                    tracing::warn!(value = %threshold, "Ignoring invalid FLOW_LOW_INFLOW_THRESHOLD")
                }
            }
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.forecast_periods < 2 {
            return Err(Error::Config(format!(
                "forecast_periods must be at least 2, got {}",
                self.forecast_periods
            )));
        }
        if self.wallet.timeout_secs == 0 {
            return Err(Error::Config("wallet.timeout_secs must be positive".into()));
        }
        if !self.wallet.degraded_mode && self.wallet.base_url.trim().is_empty() {
            return Err(Error::Config(
                "wallet.base_url is required unless degraded_mode is enabled".into(),
            ));
        }
        self.risk
            .validate()
            .map_err(|e| Error::Config(e.to_string()))
    }
}

/// Default config override path
pub fn default_config_path() -> Option<PathBuf> {
    dirs::data_local_dir().map(|d| d.join("flow").join("config").join("flow.toml"))
}

fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn test_embedded_config_matches_defaults() {
        let config = FlowConfig::embedded().unwrap();
        assert_eq!(config, FlowConfig::default());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config = FlowConfig::from_toml("[risk]\nlow_inflow_threshold = 500.0\n").unwrap();
        assert_eq!(config.risk.low_inflow_threshold, 500.0);
        assert_eq!(config.risk.decline_drop_fraction, 0.15);
        assert_eq!(config.forecast_periods, 4);
        assert_eq!(config.wallet.timeout_secs, 10);
    }

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> = [
            ("FLOW_WALLET_URL", "http://wallet.test"),
            ("FLOW_DEGRADED_MODE", "yes"),
            ("FLOW_WALLET_TIMEOUT_SECS", "3"),
            ("FLOW_LOW_INFLOW_THRESHOLD", "1500000"),
        ]
        .into_iter()
        .collect();

        let mut config = FlowConfig::default();
        config.apply_overrides(|key| vars.get(key).map(|v| v.to_string()));

        assert_eq!(config.wallet.base_url, "http://wallet.test");
        assert!(config.wallet.degraded_mode);
        assert_eq!(config.wallet.execution_mode(), ExecutionMode::Degraded);
        assert_eq!(config.wallet.timeout(), Duration::from_secs(3));
        assert_eq!(config.risk.low_inflow_threshold, 1_500_000.0);
    }

    #[test]
    fn test_invalid_env_values_are_ignored() {
        let mut config = FlowConfig::default();
        config.apply_overrides(|key| match key {
            "FLOW_WALLET_TIMEOUT_SECS" => Some("soon".to_string()),
            "FLOW_DEGRADED_MODE" => Some("nope".to_string()),
            _ => None,
        });
        assert_eq!(config.wallet.timeout_secs, 10);
        assert!(!config.wallet.degraded_mode);
    }

    #[test]
    fn test_partial_overrides_keep_configured_values() {
        let configured = FlowConfig::from_toml(
            "[risk]\nlow_inflow_threshold = 1000.0\ndecline_drop_fraction = 0.3\n",
        )
        .unwrap()
        .risk;

        let overrides: RiskThresholdOverrides =
            serde_json::from_str(r#"{"low_inflow_threshold": 500.0}"#).unwrap();
        let merged = overrides.apply(configured);
        assert_eq!(merged.low_inflow_threshold, 500.0);
        assert_eq!(merged.decline_drop_fraction, 0.3);
        assert_eq!(merged.high_severity_ratio, configured.high_severity_ratio);

        assert_eq!(RiskThresholdOverrides::default().apply(configured), configured);
    }

    #[test]
    fn test_validate_rejects_bad_thresholds() {
        let mut config = FlowConfig::default();
        config.risk.decline_drop_fraction = 1.5;
        assert!(config.validate().is_err());

        let mut config = FlowConfig::default();
        config.risk.low_inflow_threshold = f64::NAN;
        assert!(config.validate().is_err());

        let mut config = FlowConfig::default();
        config.risk.low_inflow_threshold = -1.0;
        assert!(config.validate().is_err());
        config.risk.low_inflow_threshold = 0.0;
        assert!(config.validate().is_ok());

        let mut config = FlowConfig::default();
        config.forecast_periods = 1;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_degraded_mode_allows_missing_url() {
        let mut config = FlowConfig::default();
        config.wallet.base_url = String::new();
        assert!(config.validate().is_err());

        config.wallet.degraded_mode = true;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_from_explicit_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "forecast_periods = 6\n[wallet]\ntimeout_secs = 5").unwrap();

        let config = FlowConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.forecast_periods, 6);
        assert_eq!(config.wallet.timeout_secs, 5);
    }

    #[test]
    fn test_load_missing_explicit_path_fails() {
        let result = FlowConfig::load(Some(Path::new("/nonexistent/flow.toml")));
        assert!(matches!(result, Err(Error::Config(_))));
    }
}
