//! CLI argument definitions using clap
//!
//! This module contains all the clap structs and enums for parsing CLI arguments.
//! The actual command implementations are in the `commands` module.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Flow - Cashflow risk and automatic reserves
#[derive(Parser)]
#[command(name = "flow")]
#[command(about = "Cashflow risk classifier and auto-reserve agent", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Config file (defaults to the data-dir override, then built-in defaults)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Classify a forecast, decide the reserve, and execute the transfer
    Analyze {
        /// JSON request file (business_name, forecast, current_inflow, desired_salary, identity)
        #[arg(short, long, conflicts_with_all = ["forecast", "history"])]
        input: Option<PathBuf>,

        /// Forecast values, comma-separated (nearest period first)
        #[arg(short, long, conflicts_with = "history")]
        forecast: Option<String>,

        /// Past per-period inflows, comma-separated; forecast with the flat baseline
        #[arg(long)]
        history: Option<String>,

        /// Actual inflow for the current period
        #[arg(long)]
        inflow: Option<f64>,

        /// Desired salary for the period
        #[arg(long)]
        salary: Option<f64>,

        /// Payer wallet account id
        #[arg(long)]
        account: Option<String>,

        /// Payer contact (receives the authorization code)
        #[arg(long)]
        contact: Option<String>,

        /// Reserve account contact
        #[arg(long)]
        payee: Option<String>,

        /// Business name for the report
        #[arg(long)]
        business: Option<String>,

        /// Synthesize the transfer instead of calling the wallet service
        #[arg(long)]
        degraded: bool,

        /// Print the result record as JSON
        #[arg(long)]
        json: bool,
    },

    /// Classify a forecast for risk (no transfer)
    Classify {
        /// Forecast values, comma-separated (nearest period first)
        #[arg(short, long)]
        forecast: String,

        /// Low-inflow threshold (defaults to config)
        #[arg(short, long)]
        threshold: Option<f64>,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show the reservation decision for an inflow and salary target
    Decide {
        /// Actual inflow for the current period
        #[arg(long)]
        inflow: f64,

        /// Desired salary for the period
        #[arg(long)]
        salary: f64,

        /// Print the decision as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show the resolved configuration
    Config,

    /// Start the web server
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value = "3000")]
        port: u16,

        /// Host to bind to
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Allowed CORS origin (repeatable)
        #[arg(long = "allow-origin")]
        allowed_origins: Vec<String>,
    },
}
