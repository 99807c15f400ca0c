//! Regime Signal - GARCH Volatility Regime and Trend Signals
//!
//! Daily 0 / 50 / 100% exposure recommendations for leveraged ETFs.
//!
//! # Modules
//!
//! - `domain`: Core types (PriceSeries, DataValidator, SignalRecord)
//! - `ports`: Trait abstractions (MarketDataPort, VolatilityModel)
//! - `strategy`: Signal derivation (GARCH fit, z-score, regime, trend, blend)
//! - `adapters`: External implementations (Yahoo, JSON output, CLI)
//! - `config`: Configuration loading and validation
//! - `application`: Per-run orchestration across tickers

pub mod domain;
pub mod ports;
pub mod strategy;
pub mod adapters;
pub mod config;
pub mod application;
