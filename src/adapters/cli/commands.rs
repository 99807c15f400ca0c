//! CLI Command Handlers
//!
//! Implementation of all CLI commands for the regime signal generator.

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;

use crate::adapters::market_data::{YahooChartClient, YahooConfig};
use crate::adapters::output::write_batch;
use crate::application::{RunnerConfig, StrategyRunner};
use crate::config::{load_config, Config};
use crate::domain::SignalBatch;
use crate::strategy::{GarchT11, PipelineParams, SignalPipeline};

/// Regime Signal - GARCH volatility regime and trend signals for leveraged ETFs
#[derive(Parser, Debug)]
#[command(
    name = "regime-signal",
    version = env!("CARGO_PKG_VERSION"),
    about = "Daily volatility-regime and trend exposure signals",
    long_about = "Downloads adjusted daily closes, fits a GARCH(1,1) Student-t model per ticker, \
                  applies a hysteresis band to the volatility z-score and blends it with a \
                  200-day trend filter into a 0/50/100% exposure recommendation."
)]
pub struct CliApp {
    /// The command to execute
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Compute signals for every configured ticker and write the JSON artifact
    Run(RunCmd),

    /// Load and validate a configuration file without fetching data
    Validate(ValidateCmd),
}

/// Compute signals
#[derive(Parser, Debug)]
pub struct RunCmd {
    /// Path to configuration file
    #[arg(short, long, value_name = "FILE", default_value = "config/signals.toml")]
    pub config: PathBuf,

    /// Override output path
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Use the built-in UPRO / EURL / EDC configuration
    #[arg(long, conflicts_with = "config")]
    pub builtin: bool,
}

/// Validate configuration
#[derive(Parser, Debug)]
pub struct ValidateCmd {
    /// Path to configuration file
    #[arg(short, long, value_name = "FILE", default_value = "config/signals.toml")]
    pub config: PathBuf,
}

/// Execute the CLI command
pub async fn execute(app: CliApp) -> Result<()> {
    // Initialize logging based on flags
    init_logging(app.verbose, app.debug)?;

    match app.command {
        Command::Run(cmd) => run_command(cmd).await,
        Command::Validate(cmd) => validate_command(cmd),
    }
}

/// Initialize logging system
fn init_logging(verbose: bool, debug: bool) -> Result<()> {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = if debug {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else if verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init()
        .map_err(|e| anyhow!("Failed to initialize logging: {}", e))?;

    Ok(())
}

/// Handle run command
async fn run_command(cmd: RunCmd) -> Result<()> {
    let config = if cmd.builtin {
        tracing::info!("Using built-in ticker configuration");
        Config::builtin()
    } else {
        tracing::info!("Config: {}", cmd.config.display());
        load_config(&cmd.config)
            .with_context(|| format!("Failed to load configuration from {}", cmd.config.display()))?
    };

    let market_data = YahooChartClient::new(YahooConfig::from(&config.market_data))
        .context("Failed to create market data client")?;

    let runner = StrategyRunner::new(
        Arc::new(market_data),
        Arc::new(GarchT11::default()),
        SignalPipeline::new(PipelineParams::from(&config)),
        config.ticker_configs(),
        RunnerConfig {
            range: config.market_data.range.clone(),
            fit_timeout: std::time::Duration::from_secs(config.pipeline.fit_timeout_secs),
        },
    );

    let batch = runner.run().await;

    let output = cmd.output.unwrap_or_else(|| config.output.get_path());
    write_batch(&batch, &output)
        .with_context(|| format!("Failed to write signals to {}", output.display()))?;

    print_summary(&batch);
    println!("\nSignals written to {}", output.display());
    Ok(())
}

/// Handle validate command
fn validate_command(cmd: ValidateCmd) -> Result<()> {
    let config = load_config(&cmd.config)
        .with_context(|| format!("Invalid configuration {}", cmd.config.display()))?;

    println!("✓ Configuration valid: {}", cmd.config.display());
    println!(
        "  Windows: z-score {}, fit {}, regime lookback {}",
        config.pipeline.z_score_window,
        config.pipeline.volatility_fit_window,
        config.pipeline.regime_lookback_window
    );
    for ticker in config.ticker_configs() {
        println!(
            "  {:<6} {}  SMA {}",
            ticker.symbol,
            ticker.threshold_description(),
            ticker.trend_window
        );
    }
    Ok(())
}

fn print_summary(batch: &SignalBatch) {
    println!("Signals as of {}", batch.updated_at.format("%Y-%m-%d %H:%M:%S UTC"));
    for record in &batch.data {
        let z = record
            .z_score
            .map(|z| format!("{:+.2}", z))
            .unwrap_or_else(|| "-".to_string());
        println!(
            "  {:<6} {:>9.2}  Z {:>6}  {:<16} {:?}",
            record.ticker, record.price, z, record.final_decision, record.status
        );
    }
}
