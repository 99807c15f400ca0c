//! Configuration Module
//!
//! Loads and validates configuration from TOML files.

pub mod loader;

pub use loader::{
    Config, ConfigError, MarketDataSection, OutputSection, PipelineSection, TickerSection,
    load_config, MARKET_DATA_URL_ENV, OUTPUT_ENV,
};
