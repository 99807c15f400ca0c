//! Volatility Regime Estimator
//!
//! Turns a price series into a standardized volatility signal:
//!
//! 1. percent returns (×100) from consecutive closes
//! 2. conditional volatility over the trailing fit window (delegated to a
//!    [`VolatilityModel`])
//! 3. annualization by √252
//! 4. rolling z-score: z = (vol - rolling_mean) / rolling_std
//!
//! Z-scores are only emitted once the rolling window is full and the
//! rolling standard deviation is strictly positive.

use chrono::NaiveDate;
use statrs::statistics::Statistics;
use thiserror::Error;

use crate::domain::{PriceSeries, SeriesError};
use crate::ports::{FitError, VolatilityModel};
use crate::strategy::params::{PipelineParams, TRADING_DAYS_PER_YEAR};

/// Rolling standard deviations below this are treated as zero, so the
/// z-score at that date is undefined
const MIN_STD_DEV: f64 = 1e-12;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ModelError {
    #[error("volatility fit failed: {0}")]
    Fit(#[from] FitError),

    #[error("volatility model returned {actual} values for {expected} returns")]
    LengthMismatch { expected: usize, actual: usize },

    #[error("volatility model returned an invalid value on {0}")]
    InvalidVolatility(NaiveDate),

    #[error("insufficient volatility history for z-score: need {required}, have {actual}")]
    InsufficientHistory { required: usize, actual: usize },

    #[error("volatility fit timed out after {0}s")]
    Timeout(u64),

    #[error("pipeline aborted: {0}")]
    Aborted(String),
}

/// A value stamped with its bar date
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DatedValue {
    pub date: NaiveDate,
    pub value: f64,
}

/// Percent day-over-day returns, one shorter than the source series
#[derive(Debug, Clone, PartialEq)]
pub struct ReturnSeries {
    points: Vec<DatedValue>,
}

impl ReturnSeries {
    /// Percent change from bar i-1 to bar i, dated at bar i
    pub fn from_prices(series: &PriceSeries) -> Result<Self, SeriesError> {
        let closes = series.closes()?;
        let points = series
            .bars()
            .iter()
            .skip(1)
            .zip(closes.windows(2))
            .map(|(bar, pair)| DatedValue {
                date: bar.date,
                value: (pair[1] / pair[0] - 1.0) * 100.0,
            })
            .collect();
        Ok(Self { points })
    }

    pub fn from_points(points: Vec<DatedValue>) -> Self {
        Self { points }
    }

    pub fn points(&self) -> &[DatedValue] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Trailing `n` returns (or all of them when shorter)
    pub fn tail(&self, n: usize) -> &[DatedValue] {
        &self.points[self.points.len().saturating_sub(n)..]
    }
}

/// Annualized conditional volatility over the fit window
#[derive(Debug, Clone, PartialEq)]
pub struct VolatilitySeries {
    points: Vec<DatedValue>,
}

impl VolatilitySeries {
    pub fn points(&self) -> &[DatedValue] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn last(&self) -> Option<&DatedValue> {
        self.points.last()
    }
}

/// Z-score of one volatility observation
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ZScorePoint {
    pub date: NaiveDate,
    /// Current z-score value
    pub z_score: f64,
    /// Annualized volatility at this date
    pub volatility: f64,
    /// Rolling mean used in calculation
    pub mean: f64,
    /// Rolling standard deviation
    pub std_dev: f64,
}

/// Defined z-scores only, ascending by date
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ZScoreSeries {
    points: Vec<ZScorePoint>,
}

impl ZScoreSeries {
    pub fn from_points(points: Vec<ZScorePoint>) -> Self {
        Self { points }
    }

    /// Build from bare `(date, z)` pairs
    pub fn from_values(values: &[(NaiveDate, f64)]) -> Self {
        let points = values
            .iter()
            .map(|&(date, z_score)| ZScorePoint { date, z_score, volatility: 0.0, mean: 0.0, std_dev: 0.0 })
            .collect();
        Self { points }
    }

    pub fn points(&self) -> &[ZScorePoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn last(&self) -> Option<&ZScorePoint> {
        self.points.last()
    }

    /// Z-score at `date`, if defined
    pub fn at(&self, date: NaiveDate) -> Option<f64> {
        self.points
            .binary_search_by_key(&date, |p| p.date)
            .ok()
            .map(|i| self.points[i].z_score)
    }

    /// Trailing `n` points (or all of them when shorter)
    pub fn tail(&self, n: usize) -> &[ZScorePoint] {
        &self.points[self.points.len().saturating_sub(n)..]
    }
}

/// Conditional-volatility estimator with z-score normalization
#[derive(Debug, Clone)]
pub struct VolatilityRegimeEstimator {
    fit_window: usize,
    z_window: usize,
    annualization: f64,
}

impl VolatilityRegimeEstimator {
    pub fn new(fit_window: usize, z_window: usize) -> Self {
        Self {
            fit_window,
            z_window,
            annualization: TRADING_DAYS_PER_YEAR.sqrt(),
        }
    }

    pub fn from_params(params: &PipelineParams) -> Self {
        Self::new(params.volatility_fit_window, params.z_score_window)
    }

    pub fn z_window(&self) -> usize {
        self.z_window
    }

    /// Fit the model on the trailing window and annualize its output
    pub fn estimate(
        &self,
        returns: &ReturnSeries,
        model: &dyn VolatilityModel,
    ) -> Result<VolatilitySeries, ModelError> {
        let window = returns.tail(self.fit_window);
        let values: Vec<f64> = window.iter().map(|p| p.value).collect();

        let conditional = model.fit(&values)?;
        if conditional.len() != values.len() {
            return Err(ModelError::LengthMismatch {
                expected: values.len(),
                actual: conditional.len(),
            });
        }

        let points = window
            .iter()
            .zip(conditional)
            .map(|(ret, sigma)| {
                if sigma.is_finite() && sigma >= 0.0 {
                    Ok(DatedValue { date: ret.date, value: sigma * self.annualization })
                } else {
                    Err(ModelError::InvalidVolatility(ret.date))
                }
            })
            .collect::<Result<Vec<_>, _>>()?;

        tracing::debug!(
            model = model.name(),
            observations = points.len(),
            "conditional volatility estimated"
        );
        Ok(VolatilitySeries { points })
    }

    /// Rolling z-score of the volatility series.
    ///
    /// Uses the sample standard deviation (n - 1). Dates whose rolling
    /// deviation is zero or undefined are omitted.
    pub fn zscores(&self, volatility: &VolatilitySeries) -> ZScoreSeries {
        let points = volatility.points();
        if self.z_window < 2 || points.len() < self.z_window {
            return ZScoreSeries::default();
        }

        let values: Vec<f64> = points.iter().map(|p| p.value).collect();
        let z_points = values
            .windows(self.z_window)
            .zip(&points[self.z_window - 1..])
            .filter_map(|(window, current)| {
                let mean = window.iter().copied().mean();
                let std_dev = window.iter().copied().std_dev();
                if !std_dev.is_finite() || std_dev < MIN_STD_DEV {
                    return None;
                }
                Some(ZScorePoint {
                    date: current.date,
                    z_score: (current.value - mean) / std_dev,
                    volatility: current.value,
                    mean,
                    std_dev,
                })
            })
            .collect();

        ZScoreSeries { points: z_points }
    }

    /// Estimate volatility and standardize it, requiring at least one z-score
    pub fn run(
        &self,
        returns: &ReturnSeries,
        model: &dyn VolatilityModel,
    ) -> Result<(VolatilitySeries, ZScoreSeries), ModelError> {
        let volatility = self.estimate(returns, model)?;
        let zscores = self.zscores(&volatility);
        if zscores.is_empty() {
            return Err(ModelError::InsufficientHistory {
                required: self.z_window,
                actual: volatility.len(),
            });
        }
        Ok((volatility, zscores))
    }
}
