//! Regime Signal - daily volatility regime / trend signal generator

use anyhow::Result;
use clap::Parser;

use regime_signal::adapters::cli::{self, CliApp};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if it exists (path overrides go here, not in signals.toml)
    dotenvy::dotenv().ok();

    let app = CliApp::parse();
    cli::execute(app).await
}
