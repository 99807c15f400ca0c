//! Configuration Loader
//!
//! Loads and validates configuration from TOML files matching signals.toml structure.

use serde::Deserialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::domain::ValidatorConfig;
use crate::strategy::params::{PipelineParams, TickerConfig};

/// Overrides `[output].path`
pub const OUTPUT_ENV: &str = "REGIME_SIGNAL_OUTPUT";
/// Overrides `[market_data].base_url`
pub const MARKET_DATA_URL_ENV: &str = "REGIME_SIGNAL_MARKET_DATA_URL";

/// Main configuration structure matching signals.toml
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub pipeline: PipelineSection,
    #[serde(default)]
    pub market_data: MarketDataSection,
    #[serde(default)]
    pub output: OutputSection,
    /// Evaluated and reported in this order
    #[serde(default)]
    pub tickers: Vec<TickerSection>,
}

/// Global pipeline parameters
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PipelineSection {
    /// Minimum bars required before fitting
    pub min_history_days: usize,
    /// Maximum calendar days between the last bar and now
    pub validation_max_lag_days: i64,
    /// Rolling window for the volatility z-score
    pub z_score_window: usize,
    /// Trailing returns handed to the GARCH fit
    pub volatility_fit_window: usize,
    /// Largest tolerated single-day move (0.50 = 50%)
    pub extreme_move_threshold: f64,
    /// Trailing z-scores replayed through the regime state machine
    pub regime_lookback_window: usize,
    /// Missing closes repaired by forward fill before failing
    pub max_missing_closes: usize,
    /// Upper bound on one ticker's model fit
    pub fit_timeout_secs: u64,
}

impl Default for PipelineSection {
    fn default() -> Self {
        let params = PipelineParams::default();
        Self {
            min_history_days: params.validator.min_history_days,
            validation_max_lag_days: params.validator.max_lag_days,
            z_score_window: params.z_score_window,
            volatility_fit_window: params.volatility_fit_window,
            extreme_move_threshold: params.validator.extreme_move_threshold,
            regime_lookback_window: params.regime_lookback_window,
            max_missing_closes: params.validator.max_missing_closes,
            fit_timeout_secs: 120,
        }
    }
}

/// Market data provider section
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MarketDataSection {
    /// Chart API base URL
    pub base_url: String,
    /// History requested per ticker ("10y", "max", ...)
    pub range: String,
    /// Per-request timeout in seconds
    pub timeout_secs: u64,
    /// Retries after the first attempt on transient failures
    pub max_retries: u32,
    /// Backoff step between retries; attempt n waits n * step
    pub retry_backoff_ms: u64,
}

impl Default for MarketDataSection {
    fn default() -> Self {
        Self {
            base_url: "https://query1.finance.yahoo.com".to_string(),
            range: "10y".to_string(),
            timeout_secs: 30,
            max_retries: 3,
            retry_backoff_ms: 2000,
        }
    }
}

impl MarketDataSection {
    /// Get base URL with environment variable override
    /// Checks REGIME_SIGNAL_MARKET_DATA_URL env var first, falls back to config value
    pub fn get_base_url(&self) -> String {
        std::env::var(MARKET_DATA_URL_ENV).unwrap_or_else(|_| self.base_url.clone())
    }
}

/// Output artifact section
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OutputSection {
    /// JSON file written after each run
    pub path: String,
}

impl Default for OutputSection {
    fn default() -> Self {
        Self { path: "signals.json".to_string() }
    }
}

impl OutputSection {
    /// Get output path with environment variable override and `~` expanded
    pub fn get_path(&self) -> PathBuf {
        let raw = std::env::var(OUTPUT_ENV).unwrap_or_else(|_| self.path.clone());
        PathBuf::from(shellexpand::tilde(&raw).into_owned())
    }
}

/// One `[[tickers]]` entry
#[derive(Debug, Clone, Deserialize)]
pub struct TickerSection {
    pub symbol: String,
    pub exit_threshold: f64,
    pub entry_threshold: f64,
    #[serde(default = "default_trend_window")]
    pub trend_window: usize,
}

fn default_trend_window() -> usize {
    200
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Failed to parse TOML: {0}")]
    ParseError(#[from] toml::de::Error),
    #[error("Validation failed: {0}")]
    ValidationError(String),
}

/// Load configuration from a TOML file
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
    let expanded = shellexpand::tilde(&path.as_ref().to_string_lossy()).into_owned();
    let content = std::fs::read_to_string(expanded)?;
    let config: Config = toml::from_str(&content)?;
    config.validate()?;
    Ok(config)
}

impl Config {
    /// Built-in UPRO / EURL / EDC set with default parameters
    pub fn builtin() -> Self {
        Self {
            pipeline: PipelineSection::default(),
            market_data: MarketDataSection::default(),
            output: OutputSection::default(),
            tickers: TickerConfig::defaults().iter().map(TickerSection::from).collect(),
        }
    }

    /// Validate all configuration parameters
    pub fn validate(&self) -> Result<(), ConfigError> {
        let params = PipelineParams::from(self);
        params
            .validate()
            .map_err(|e| ConfigError::ValidationError(e.to_string()))?;

        if self.pipeline.fit_timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "fit_timeout_secs must be > 0".to_string(),
            ));
        }

        if self.market_data.base_url.is_empty() {
            return Err(ConfigError::ValidationError(
                "base_url cannot be empty".to_string(),
            ));
        }

        if self.market_data.range.is_empty() {
            return Err(ConfigError::ValidationError(
                "range cannot be empty".to_string(),
            ));
        }

        if self.output.path.is_empty() {
            return Err(ConfigError::ValidationError(
                "output path cannot be empty".to_string(),
            ));
        }

        if self.tickers.is_empty() {
            return Err(ConfigError::ValidationError(
                "at least one [[tickers]] entry is required".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        for ticker in self.ticker_configs() {
            params
                .validate_ticker(&ticker)
                .map_err(|e| ConfigError::ValidationError(e.to_string()))?;
            if !seen.insert(ticker.symbol.clone()) {
                return Err(ConfigError::ValidationError(format!(
                    "duplicate ticker {}",
                    ticker.symbol
                )));
            }
        }

        Ok(())
    }

    /// Per-ticker configs in file order
    pub fn ticker_configs(&self) -> Vec<TickerConfig> {
        self.tickers.iter().map(TickerConfig::from).collect()
    }
}

impl From<&Config> for PipelineParams {
    fn from(config: &Config) -> Self {
        let p = &config.pipeline;
        PipelineParams {
            validator: ValidatorConfig {
                max_lag_days: p.validation_max_lag_days,
                min_history_days: p.min_history_days,
                max_missing_closes: p.max_missing_closes,
                extreme_move_threshold: p.extreme_move_threshold,
            },
            z_score_window: p.z_score_window,
            volatility_fit_window: p.volatility_fit_window,
            regime_lookback_window: p.regime_lookback_window,
        }
    }
}

impl From<&TickerSection> for TickerConfig {
    fn from(section: &TickerSection) -> Self {
        TickerConfig {
            symbol: section.symbol.trim().to_uppercase(),
            exit_threshold: section.exit_threshold,
            entry_threshold: section.entry_threshold,
            trend_window: section.trend_window,
        }
    }
}

impl From<&TickerConfig> for TickerSection {
    fn from(ticker: &TickerConfig) -> Self {
        TickerSection {
            symbol: ticker.symbol.clone(),
            exit_threshold: ticker.exit_threshold,
            entry_threshold: ticker.entry_threshold,
            trend_window: ticker.trend_window,
        }
    }
}
