//! Adapters Layer - External System Implementations
//!
//! This module contains implementations of the port traits:
//! - Market Data: Yahoo Finance daily chart client
//! - Output: JSON signal artifact writer
//! - CLI: Command-line interface handlers

pub mod cli;
pub mod market_data;
pub mod output;

pub use cli::CliApp;
pub use market_data::{YahooChartClient, YahooConfig};
pub use output::{write_batch, OutputError};
