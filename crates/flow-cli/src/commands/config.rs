//! Config command implementation

use std::path::Path;

use anyhow::Result;
use flow_core::config::default_config_path;

use super::{format_money, load_config};

pub fn cmd_config(path: Option<&Path>) -> Result<()> {
    let config = load_config(path)?;

    let source = match path {
        Some(path) => path.display().to_string(),
        None => match default_config_path() {
            Some(p) if p.exists() => p.display().to_string(),
            _ => "built-in defaults".to_string(),
        },
    };

    println!();
    println!("⚙️  Flow Configuration");
    println!("   ─────────────────────────────────────────────────────────────");
    println!("   Source: {}", source);
    println!("   Forecast periods: {}", config.forecast_periods);
    println!();
    println!("   Risk");
    println!(
        "     Low inflow threshold: {}",
        format_money(config.risk.low_inflow_threshold)
    );
    println!(
        "     Decline drop:         {:.0}%",
        config.risk.decline_drop_fraction * 100.0
    );
    println!(
        "     High severity below:  {:.0}% of threshold",
        config.risk.high_severity_ratio * 100.0
    );
    println!();
    println!("   Wallet");
    println!("     Mode:    {}", config.wallet.execution_mode());
    println!("     URL:     {}", config.wallet.base_url);
    println!("     Timeout: {}s per phase", config.wallet.timeout_secs);
    println!("     Note:    {}", config.wallet.note);
    if let Some(p) = default_config_path() {
        println!();
        println!("   Override file: {}", p.display());
    }
    println!();

    Ok(())
}
