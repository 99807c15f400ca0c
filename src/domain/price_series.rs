//! Price Series
//!
//! Daily close bars for a single ticker, ordered ascending by date.
//! A missing close (provider null or non-finite value) is kept as `None`
//! so the validator can decide whether to repair or reject it.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum SeriesError {
    #[error("bars out of order: {next} follows {prev}")]
    OutOfOrder { prev: NaiveDate, next: NaiveDate },
    #[error("duplicate bar date: {0}")]
    DuplicateDate(NaiveDate),
    #[error("missing close on {0}")]
    MissingClose(NaiveDate),
}

/// One daily bar: calendar date and (split/dividend adjusted) close
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceBar {
    pub date: NaiveDate,
    pub close: Option<f64>,
}

impl PriceBar {
    pub fn new(date: NaiveDate, close: f64) -> Self {
        Self { date, close: Some(close) }
    }

    pub fn missing(date: NaiveDate) -> Self {
        Self { date, close: None }
    }
}

/// Ascending, duplicate-free sequence of bars for one ticker
#[derive(Debug, Clone, PartialEq)]
pub struct PriceSeries {
    ticker: String,
    bars: Vec<PriceBar>,
}

impl PriceSeries {
    /// Build a series, rejecting out-of-order or duplicate dates
    pub fn new(ticker: impl Into<String>, bars: Vec<PriceBar>) -> Result<Self, SeriesError> {
        for pair in bars.windows(2) {
            let (prev, next) = (pair[0].date, pair[1].date);
            if next == prev {
                return Err(SeriesError::DuplicateDate(next));
            }
            if next < prev {
                return Err(SeriesError::OutOfOrder { prev, next });
            }
        }
        Ok(Self { ticker: ticker.into(), bars })
    }

    /// Empty series for a ticker (used when a provider returns nothing)
    pub fn empty(ticker: impl Into<String>) -> Self {
        Self { ticker: ticker.into(), bars: Vec::new() }
    }

    pub fn ticker(&self) -> &str {
        &self.ticker
    }

    pub fn bars(&self) -> &[PriceBar] {
        &self.bars
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn last(&self) -> Option<&PriceBar> {
        self.bars.last()
    }

    /// Most recent defined close, scanning backwards past missing values
    pub fn last_known_close(&self) -> Option<f64> {
        self.bars.iter().rev().find_map(|b| b.close)
    }

    pub fn missing_count(&self) -> usize {
        self.bars.iter().filter(|b| b.close.is_none()).count()
    }

    /// Forward-fill missing closes from the last valid value.
    ///
    /// Returns the number of repaired bars, or the date of a leading gap
    /// that has no prior value to carry forward.
    pub(crate) fn forward_fill(&mut self) -> Result<usize, SeriesError> {
        let mut last_valid: Option<f64> = None;
        let mut repaired = 0;
        for bar in &mut self.bars {
            match (bar.close, last_valid) {
                (Some(close), _) => last_valid = Some(close),
                (None, Some(carry)) => {
                    bar.close = Some(carry);
                    repaired += 1;
                }
                (None, None) => return Err(SeriesError::MissingClose(bar.date)),
            }
        }
        Ok(repaired)
    }

    /// Dense close vector; fails on the first missing close
    pub fn closes(&self) -> Result<Vec<f64>, SeriesError> {
        self.bars
            .iter()
            .map(|b| b.close.ok_or(SeriesError::MissingClose(b.date)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, day).unwrap()
    }

    #[test]
    fn test_rejects_duplicate_dates() {
        let bars = vec![PriceBar::new(d(1), 10.0), PriceBar::new(d(1), 11.0)];
        assert_eq!(
            PriceSeries::new("UPRO", bars),
            Err(SeriesError::DuplicateDate(d(1)))
        );
    }

    #[test]
    fn test_rejects_out_of_order() {
        let bars = vec![PriceBar::new(d(2), 10.0), PriceBar::new(d(1), 11.0)];
        assert!(matches!(
            PriceSeries::new("UPRO", bars),
            Err(SeriesError::OutOfOrder { .. })
        ));
    }

    #[test]
    fn test_forward_fill_repairs_gaps() {
        let bars = vec![
            PriceBar::new(d(1), 10.0),
            PriceBar::missing(d(2)),
            PriceBar::missing(d(3)),
            PriceBar::new(d(4), 12.0),
        ];
        let mut series = PriceSeries::new("EDC", bars).unwrap();
        assert_eq!(series.missing_count(), 2);

        assert_eq!(series.forward_fill(), Ok(2));
        assert_eq!(series.closes().unwrap(), vec![10.0, 10.0, 10.0, 12.0]);
    }

    #[test]
    fn test_forward_fill_leading_gap_fails() {
        let bars = vec![PriceBar::missing(d(1)), PriceBar::new(d(2), 10.0)];
        let mut series = PriceSeries::new("EDC", bars).unwrap();
        assert_eq!(series.forward_fill(), Err(SeriesError::MissingClose(d(1))));
    }

    #[test]
    fn test_last_known_close_skips_missing() {
        let bars = vec![PriceBar::new(d(1), 10.0), PriceBar::missing(d(2))];
        let series = PriceSeries::new("EURL", bars).unwrap();
        assert_eq!(series.last_known_close(), Some(10.0));
        assert!(series.closes().is_err());
    }
}
