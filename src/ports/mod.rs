//! Ports Layer - Trait definitions for external dependencies
//!
//! This module defines the interfaces (ports) that adapters must implement.
//! Following hexagonal architecture, these traits abstract:
//! - Market data feeds (adjusted daily closes)
//! - Conditional volatility estimation (GARCH fit)

pub mod market_data;
pub mod mocks;
pub mod volatility_model;

// Re-export main traits and types
pub use market_data::{HistoricalQuery, MarketDataError, MarketDataPort};
pub use volatility_model::{FitError, VolatilityModel};
