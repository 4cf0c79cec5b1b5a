//! Flow CLI - Cashflow risk and automatic reserves
//!
//! Usage:
//!   flow classify --forecast 2.6e6,2.7e6,2.55e6,2.65e6
//!   flow decide --inflow 3000000 --salary 2500000
//!   flow analyze --input request.json
//!   flow serve --port 3000

mod cli;
mod commands;


use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cli::*;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging
    // Priority: RUST_LOG env var > --verbose flag > default (info)
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).compact())
        .init();

    let config_path = cli.config.as_deref();

    match cli.command {
        Commands::Analyze {
            input,
            forecast,
            history,
            inflow,
            salary,
            account,
            contact,
            payee,
            business,
            degraded,
            json,
        } => {
            let mut config = commands::load_config(config_path)?;
            if degraded {
                config.wallet.degraded_mode = true;
            }
            let source = match (input, forecast, history) {
                (Some(path), _, _) => commands::AnalyzeSource::File(path),
                (None, Some(values), _) => {
                    commands::AnalyzeSource::Forecast(commands::parse_values(&values)?)
                }
                (None, None, Some(values)) => {
                    commands::AnalyzeSource::History(commands::parse_values(&values)?)
                }
                (None, None, None) => {
                    anyhow::bail!("Provide --input, --forecast, or --history")
                }
            };
            let args = commands::AnalyzeArgs {
                inflow,
                salary,
                account,
                contact,
                payee,
                business,
            };
            commands::cmd_analyze(config, source, args, json).await
        }
        Commands::Classify {
            forecast,
            threshold,
            json,
        } => {
            let config = commands::load_config(config_path)?;
            let values = commands::parse_values(&forecast)?;
            commands::cmd_classify(&config, values, threshold, json)
        }
        Commands::Decide {
            inflow,
            salary,
            json,
        } => commands::cmd_decide(inflow, salary, json),
        Commands::Config => commands::cmd_config(config_path),
        Commands::Serve {
            port,
            host,
            allowed_origins,
        } => {
            let config = commands::load_config(config_path)?;
            commands::cmd_serve(config, &host, port, allowed_origins).await
        }
    }
}
