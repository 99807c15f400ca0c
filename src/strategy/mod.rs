//! Strategy Layer - Volatility Regime and Trend Signal
//!
//! Pure signal derivation with no I/O:
//! - GARCH(1,1) Student-t conditional volatility (native estimator)
//! - Annualized volatility z-score over a rolling window
//! - Hysteresis state machine for the Hold / Exit regime
//! - Simple moving average trend filter
//! - Blend of regime and trend into a 0 / 50 / 100% exposure
//!
//! `SignalPipeline` chains these for one ticker.

pub mod blender;
pub mod garch;
pub mod params;
pub mod pipeline;
pub mod regime;
pub mod trend_filter;
pub mod volatility;

pub use blender::{blend, compose};
pub use garch::{GarchConfig, GarchFit, GarchParams, GarchT11};
pub use params::{ParamsError, PipelineParams, TickerConfig, TRADING_DAYS_PER_YEAR};
pub use pipeline::SignalPipeline;
pub use regime::{
    BandError, HysteresisBand, RegimePoint, RegimeStateMachine, RegimeSummary, RegimeTimeline,
    Transition, Trigger,
};
pub use trend_filter::{TrendFilter, TrendReading};
pub use volatility::{
    DatedValue, ModelError, ReturnSeries, VolatilityRegimeEstimator, VolatilitySeries,
    ZScorePoint, ZScoreSeries,
};
