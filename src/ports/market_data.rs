use async_trait::async_trait;
use thiserror::Error;

use crate::domain::{PriceSeries, SeriesError};

/// Market data error type
#[derive(Error, Debug)]
pub enum MarketDataError {
    #[error("REST API error: {0}")]
    RestError(String),

    #[error("Data parsing error: {0}")]
    ParseError(String),

    #[error("No data returned for {0}")]
    NoData(String),

    #[error("Malformed series: {0}")]
    Malformed(#[from] SeriesError),
}

impl MarketDataError {
    /// Whether retrying the same request may succeed
    pub fn is_transient(&self) -> bool {
        matches!(self, MarketDataError::RestError(_))
    }
}

/// Historical data query parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoricalQuery {
    pub symbol: String,
    /// Provider range string, e.g. "10y"
    pub range: String,
}

impl HistoricalQuery {
    pub fn daily(symbol: impl Into<String>, range: impl Into<String>) -> Self {
        Self { symbol: symbol.into(), range: range.into() }
    }
}

/// Source of adjusted daily closes
#[async_trait]
pub trait MarketDataPort: Send + Sync {
    /// Fetch split/dividend adjusted daily closes, ascending by date
    async fn fetch_daily_closes(&self, query: &HistoricalQuery)
        -> Result<PriceSeries, MarketDataError>;

    /// Provider name for logging
    fn name(&self) -> &'static str;
}
