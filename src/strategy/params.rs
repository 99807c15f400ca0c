//! Strategy Parameters
//!
//! Per-ticker thresholds and global pipeline parameters.
//! Defaults reproduce the production UPRO / EURL / EDC set.

use serde::{Deserialize, Serialize};

use crate::domain::ValidatorConfig;

/// Observations per year used to annualise daily volatility
pub const TRADING_DAYS_PER_YEAR: f64 = 252.0;

/// Thresholds for one ticker, passed into each pipeline call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TickerConfig {
    pub symbol: String,
    /// Z-score above which the regime turns to Exit
    pub exit_threshold: f64,
    /// Z-score below which the regime returns to Hold
    pub entry_threshold: f64,
    /// Moving-average window for the trend filter
    pub trend_window: usize,
}

impl TickerConfig {
    pub fn new(
        symbol: impl Into<String>,
        exit_threshold: f64,
        entry_threshold: f64,
        trend_window: usize,
    ) -> Result<Self, ParamsError> {
        let config = Self {
            symbol: symbol.into(),
            exit_threshold,
            entry_threshold,
            trend_window,
        };
        config.validate()?;
        Ok(config)
    }

    /// Default production ticker set
    pub fn defaults() -> Vec<TickerConfig> {
        vec![
            Self { symbol: "UPRO".into(), exit_threshold: 2.0, entry_threshold: 1.0, trend_window: 200 },
            Self { symbol: "EURL".into(), exit_threshold: 3.75, entry_threshold: 1.75, trend_window: 200 },
            Self { symbol: "EDC".into(), exit_threshold: 1.75, entry_threshold: -0.25, trend_window: 200 },
        ]
    }

    /// Human-readable hysteresis band, e.g. `GARCH(Exit>2.0, Entry<1.0)`
    pub fn threshold_description(&self) -> String {
        format!(
            "GARCH(Exit>{:?}, Entry<{:?})",
            self.exit_threshold, self.entry_threshold
        )
    }

    pub fn validate(&self) -> Result<(), ParamsError> {
        if self.symbol.trim().is_empty() {
            return Err(ParamsError::EmptySymbol);
        }
        if !self.exit_threshold.is_finite() || !self.entry_threshold.is_finite() {
            return Err(ParamsError::NonFiniteThreshold(self.symbol.clone()));
        }
        if self.exit_threshold <= self.entry_threshold {
            return Err(ParamsError::InvertedThresholds {
                symbol: self.symbol.clone(),
                exit: self.exit_threshold,
                entry: self.entry_threshold,
            });
        }
        if self.trend_window == 0 {
            return Err(ParamsError::InvalidWindow { name: "trend_window", value: 0 });
        }
        Ok(())
    }
}

/// Global parameters shared by every ticker pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineParams {
    /// Data-quality gate thresholds
    pub validator: ValidatorConfig,
    /// Rolling window for the volatility z-score
    pub z_score_window: usize,
    /// Trailing returns handed to the volatility model
    pub volatility_fit_window: usize,
    /// Trailing z-scores replayed through the hysteresis state machine
    pub regime_lookback_window: usize,
}

impl Default for PipelineParams {
    fn default() -> Self {
        Self {
            validator: ValidatorConfig::default(),
            z_score_window: 126,
            volatility_fit_window: 1200,
            regime_lookback_window: 500,
        }
    }
}

impl PipelineParams {
    pub fn validate(&self) -> Result<(), ParamsError> {
        if self.z_score_window < 2 {
            return Err(ParamsError::InvalidWindow {
                name: "z_score_window",
                value: self.z_score_window,
            });
        }
        if self.volatility_fit_window < self.z_score_window {
            return Err(ParamsError::InvalidWindow {
                name: "volatility_fit_window",
                value: self.volatility_fit_window,
            });
        }
        if self.regime_lookback_window == 0 {
            return Err(ParamsError::InvalidWindow { name: "regime_lookback_window", value: 0 });
        }
        if self.validator.min_history_days < 2 {
            return Err(ParamsError::InvalidWindow {
                name: "min_history_days",
                value: self.validator.min_history_days,
            });
        }
        if self.validator.max_lag_days < 0 {
            return Err(ParamsError::InvalidLag(self.validator.max_lag_days));
        }
        let threshold = self.validator.extreme_move_threshold;
        if !(threshold > 0.0 && threshold.is_finite()) {
            return Err(ParamsError::InvalidExtremeMove(threshold));
        }
        Ok(())
    }

    /// Check a ticker's trend window fits inside the guaranteed history
    pub fn validate_ticker(&self, ticker: &TickerConfig) -> Result<(), ParamsError> {
        ticker.validate()?;
        if ticker.trend_window > self.validator.min_history_days {
            return Err(ParamsError::TrendWindowTooLong {
                symbol: ticker.symbol.clone(),
                window: ticker.trend_window,
                min_history: self.validator.min_history_days,
            });
        }
        Ok(())
    }
}

/// Parameter validation errors
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ParamsError {
    #[error("Ticker symbol cannot be empty")]
    EmptySymbol,
    #[error("Non-finite threshold for {0}")]
    NonFiniteThreshold(String),
    #[error("Inverted thresholds for {symbol}: exit {exit} must be > entry {entry}")]
    InvertedThresholds { symbol: String, exit: f64, entry: f64 },
    #[error("Invalid {name}: {value}")]
    InvalidWindow { name: &'static str, value: usize },
    #[error("Invalid max lag days: {0} (must be >= 0)")]
    InvalidLag(i64),
    #[error("Invalid extreme move threshold: {0} (must be > 0)")]
    InvalidExtremeMove(f64),
    #[error("Trend window {window} for {symbol} exceeds minimum history {min_history}")]
    TrendWindowTooLong { symbol: String, window: usize, min_history: usize },
}
