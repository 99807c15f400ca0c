//! Market Data Adapters
//!
//! External data sources for daily price history:
//! - `YahooChartClient`: Yahoo Finance v8 chart API, adjusted daily closes
//!
//! Client Features:
//! - Exchange-local bar dates
//! - Linear backoff retries on transient failures
//! - Missing closes kept as gaps for the validator to repair or reject

mod yahoo;

pub use yahoo::{YahooChartClient, YahooConfig};
