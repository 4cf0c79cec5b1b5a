//! CLI command implementations
//!
//! Commands are organized by domain:
//! - `analyze` - Full analysis with reserve transfer, and the text report
//! - `classify` - Risk classification and reservation decision commands
//! - `config` - Resolved configuration display
//! - `serve` - Web server command

pub mod analyze;
pub mod classify;
pub mod config;
pub mod serve;

// Re-export command functions for main.rs
pub use analyze::*;
pub use classify::*;
pub use config::*;
pub use serve::*;

use std::path::Path;

use anyhow::{Context, Result};
use flow_core::FlowConfig;

/// Load configuration, naming the source on failure
pub fn load_config(path: Option<&Path>) -> Result<FlowConfig> {
    let config = FlowConfig::load(path).with_context(|| match path {
        Some(path) => format!("Failed to load config from {}", path.display()),
        None => "Failed to load config".to_string(),
    })?;
    Ok(config)
}

/// Parse a comma-separated list of numbers
pub fn parse_values(input: &str) -> Result<Vec<f64>> {
    input
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.replace('_', "")
                .parse::<f64>()
                .with_context(|| format!("Invalid number: {}", s))
        })
        .collect()
}

/// Format an amount with thousands separators and two decimals
pub fn format_money(amount: f64) -> String {
    let formatted = format!("{:.2}", amount.abs());
    let (whole, fraction) = formatted.split_once('.').unwrap_or((formatted.as_str(), "00"));
    let mut grouped = String::new();
    for (i, c) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }
    let sign = if amount < 0.0 { "-" } else { "" };
    format!("{}{}.{}", sign, grouped, fraction)
}
