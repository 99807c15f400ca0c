//! Trend Filter
//!
//! Simple moving average over the trailing `window` closes. The price is
//! above trend only when strictly greater than the average.

use statrs::statistics::Statistics;

use crate::domain::TrendState;

/// Trend reading at one as-of index
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrendReading {
    pub close: f64,
    /// `None` until `window` closes are available
    pub moving_average: Option<f64>,
    pub is_above: bool,
}

impl TrendReading {
    pub fn state(&self) -> TrendState {
        TrendState::from_above(self.is_above)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct TrendFilter {
    window: usize,
}

impl TrendFilter {
    pub fn new(window: usize) -> Self {
        Self { window }
    }

    /// Reading at the last close
    pub fn evaluate(&self, closes: &[f64]) -> Option<TrendReading> {
        let last = closes.len().checked_sub(1)?;
        self.evaluate_at(closes, last)
    }

    /// Reading as of `index`, using only closes up to and including it
    pub fn evaluate_at(&self, closes: &[f64], index: usize) -> Option<TrendReading> {
        let close = *closes.get(index)?;
        let moving_average = (self.window > 0 && index + 1 >= self.window)
            .then(|| closes[index + 1 - self.window..=index].iter().copied().mean());

        Some(TrendReading {
            close,
            moving_average,
            is_above: moving_average.is_some_and(|ma| close > ma),
        })
    }
}
