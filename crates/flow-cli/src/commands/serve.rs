//! Server command implementation

use anyhow::Result;
use flow_core::{ExecutionMode, FlowConfig};
use flow_server::ServerConfig;

pub async fn cmd_serve(
    config: FlowConfig,
    host: &str,
    port: u16,
    allowed_origins: Vec<String>,
) -> Result<()> {
    println!("🚀 Starting Flow web server...");
    println!("   Listening: http://{}:{}", host, port);
    match config.wallet.execution_mode() {
        ExecutionMode::Live => println!("   Wallet: {}", config.wallet.base_url),
        ExecutionMode::Degraded => {
            println!();
            println!("   ⚠️  DEGRADED MODE - transfers are synthesized, no funds move!");
        }
    }
    if !allowed_origins.is_empty() {
        println!("   CORS origins: {}", allowed_origins.join(", "));
    }
    println!();

    flow_server::serve_with_config(config, host, port, ServerConfig { allowed_origins }).await
}
