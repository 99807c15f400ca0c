//! Data Validator
//!
//! Gates a raw price series before any derived computation. Checks run
//! in a fixed order and the first failure short-circuits:
//!
//! 1. non-empty
//! 2. recency (last bar within `max_lag_days` of now)
//! 3. minimum length
//! 4. zero / missing closes (small gaps are forward-filled in place)
//! 5. extreme day-over-day moves
//!
//! The validator never returns an error: unexpected conditions become a
//! failing report so callers have a single "cannot proceed" outcome.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, TimeZone};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::price_series::{PriceSeries, SeriesError};

/// Default tolerated calendar-day lag (weekends plus a holiday)
pub const DEFAULT_MAX_LAG_DAYS: i64 = 5;
/// Default minimum number of bars
pub const DEFAULT_MIN_HISTORY_DAYS: usize = 500;
/// Default number of missing closes that may be forward-filled
pub const DEFAULT_MAX_MISSING_CLOSES: usize = 10;
/// Default single-day absolute move treated as corrupt data
pub const DEFAULT_EXTREME_MOVE_THRESHOLD: f64 = 0.50;

/// Unexpected conditions raised inside a check
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ValidationError {
    #[error("last bar {date} is after the evaluation time {now}")]
    FutureDate { date: NaiveDate, now: NaiveDateTime },
    #[error("non-finite close on {0}")]
    NonFiniteClose(NaiveDate),
    #[error(transparent)]
    Series(#[from] SeriesError),
}

/// Thresholds for the data-quality gate
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ValidatorConfig {
    pub max_lag_days: i64,
    pub min_history_days: usize,
    pub max_missing_closes: usize,
    pub extreme_move_threshold: f64,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            max_lag_days: DEFAULT_MAX_LAG_DAYS,
            min_history_days: DEFAULT_MIN_HISTORY_DAYS,
            max_missing_closes: DEFAULT_MAX_MISSING_CLOSES,
            extreme_move_threshold: DEFAULT_EXTREME_MOVE_THRESHOLD,
        }
    }
}

/// Immutable result of gating one series
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationReport {
    pub ticker: String,
    pub passed: bool,
    pub messages: Vec<String>,
}

impl ValidationReport {
    /// All messages joined into one line
    pub fn summary(&self) -> String {
        self.messages.join("; ")
    }
}

/// Outcome of a single check
#[derive(Debug)]
struct CheckOutcome {
    passed: bool,
    messages: Vec<String>,
}

impl CheckOutcome {
    fn pass() -> Self {
        Self { passed: true, messages: Vec::new() }
    }

    fn pass_with(note: String) -> Self {
        Self { passed: true, messages: vec![note] }
    }

    fn fail(message: String) -> Self {
        Self { passed: false, messages: vec![message] }
    }

    fn fail_all(messages: Vec<String>) -> Self {
        Self { passed: false, messages }
    }
}

type CheckFn =
    fn(&ValidatorConfig, &mut PriceSeries, NaiveDateTime) -> Result<CheckOutcome, ValidationError>;

/// Checks in evaluation order
const CHECKS: [(&str, CheckFn); 5] = [
    ("empty", check_non_empty as CheckFn),
    ("recency", check_recency as CheckFn),
    ("length", check_length as CheckFn),
    ("zeros_and_missing", check_zeros_and_missing as CheckFn),
    ("extreme_moves", check_extreme_moves as CheckFn),
];

/// Data-quality gate for price series
#[derive(Debug, Clone, Default)]
pub struct DataValidator {
    config: ValidatorConfig,
}

impl DataValidator {
    pub fn new(config: ValidatorConfig) -> Self {
        Self { config }
    }

    /// Run all checks against `series` as of `now`.
    ///
    /// `now` is compared without its offset. The only mutation is the
    /// forward-fill of missing closes in the sanitation check.
    pub fn validate<Tz: TimeZone>(
        &self,
        series: &mut PriceSeries,
        now: &DateTime<Tz>,
    ) -> ValidationReport {
        let now = now.naive_local();
        let ticker = series.ticker().to_string();
        let mut messages = Vec::new();

        for (name, check) in CHECKS {
            match check(&self.config, series, now) {
                Ok(outcome) => {
                    messages.extend(outcome.messages.into_iter().map(|m| tag(&ticker, &m)));
                    if !outcome.passed {
                        tracing::debug!(ticker = %ticker, check = name, "validation check failed");
                        return ValidationReport { ticker, passed: false, messages };
                    }
                }
                Err(e) => {
                    tracing::error!(ticker = %ticker, check = name, "unexpected validation error: {}", e);
                    messages.push(tag(&ticker, &format!("unexpected error during checks: {}", e)));
                    return ValidationReport { ticker, passed: false, messages };
                }
            }
        }

        messages.push(tag(&ticker, "passed all data checks"));
        ValidationReport { ticker, passed: true, messages }
    }
}

fn tag(ticker: &str, message: &str) -> String {
    format!("[{}] {}", ticker, message)
}

fn check_non_empty(
    _config: &ValidatorConfig,
    series: &mut PriceSeries,
    _now: NaiveDateTime,
) -> Result<CheckOutcome, ValidationError> {
    if series.is_empty() {
        return Ok(CheckOutcome::fail("empty series (download returned no bars)".to_string()));
    }
    Ok(CheckOutcome::pass())
}

fn check_recency(
    config: &ValidatorConfig,
    series: &mut PriceSeries,
    now: NaiveDateTime,
) -> Result<CheckOutcome, ValidationError> {
    let Some(last) = series.last() else {
        return Ok(CheckOutcome::fail("empty series (download returned no bars)".to_string()));
    };

    if last.date > now.date() + chrono::Days::new(1) {
        return Err(ValidationError::FutureDate { date: last.date, now });
    }

    let last_midnight = last.date.and_time(NaiveTime::MIN);
    let lag_days = now.signed_duration_since(last_midnight).num_days();

    if lag_days > config.max_lag_days {
        return Ok(CheckOutcome::fail(format!(
            "stale data: last bar {} is {} days old (max {})",
            last.date, lag_days, config.max_lag_days
        )));
    }
    Ok(CheckOutcome::pass())
}

fn check_length(
    config: &ValidatorConfig,
    series: &mut PriceSeries,
    _now: NaiveDateTime,
) -> Result<CheckOutcome, ValidationError> {
    if series.len() < config.min_history_days {
        return Ok(CheckOutcome::fail(format!(
            "insufficient history length ({} < {}), volatility fit cannot converge",
            series.len(),
            config.min_history_days
        )));
    }
    Ok(CheckOutcome::pass())
}

fn check_zeros_and_missing(
    config: &ValidatorConfig,
    series: &mut PriceSeries,
    _now: NaiveDateTime,
) -> Result<CheckOutcome, ValidationError> {
    for bar in series.bars() {
        match bar.close {
            Some(close) if !close.is_finite() => {
                return Err(ValidationError::NonFiniteClose(bar.date));
            }
            Some(close) if close <= 0.0 => {
                return Ok(CheckOutcome::fail(format!(
                    "zero or negative close on {} ({})",
                    bar.date, close
                )));
            }
            _ => {}
        }
    }

    let missing = series.missing_count();
    if missing == 0 {
        return Ok(CheckOutcome::pass());
    }

    if missing > config.max_missing_closes {
        return Ok(CheckOutcome::fail(format!(
            "{} missing closes exceed repair limit of {}",
            missing, config.max_missing_closes
        )));
    }

    match series.forward_fill() {
        Ok(repaired) => {
            tracing::warn!(ticker = %series.ticker(), repaired, "forward-filled missing closes");
            Ok(CheckOutcome::pass_with(format!(
                "repaired {} missing closes by forward fill",
                repaired
            )))
        }
        Err(SeriesError::MissingClose(date)) => Ok(CheckOutcome::fail(format!(
            "missing close on {} has no prior value to forward fill",
            date
        ))),
        Err(e) => Err(e.into()),
    }
}

fn check_extreme_moves(
    config: &ValidatorConfig,
    series: &mut PriceSeries,
    _now: NaiveDateTime,
) -> Result<CheckOutcome, ValidationError> {
    let closes = series.closes()?;
    let bars = series.bars();

    let extreme: Vec<String> = closes
        .windows(2)
        .enumerate()
        .filter_map(|(i, pair)| {
            let change = pair[1] / pair[0] - 1.0;
            (change.abs() > config.extreme_move_threshold).then(|| {
                format!(
                    "extreme move on {}: {:+.2}% (limit {:.0}%)",
                    bars[i + 1].date,
                    change * 100.0,
                    config.extreme_move_threshold * 100.0
                )
            })
        })
        .collect();

    if extreme.is_empty() {
        Ok(CheckOutcome::pass())
    } else {
        Ok(CheckOutcome::fail_all(extreme))
    }
}
