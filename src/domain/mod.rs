//! Domain Layer - Core types and the data-quality gate
//!
//! Pure domain types with no I/O. External interactions happen through
//! the ports layer.
//!
//! - `price_series`: daily close bars for one ticker
//! - `validator`: ordered data-quality checks producing a `ValidationReport`
//! - `signal`: regime/trend states, exposure and the output `SignalRecord`

pub mod price_series;
pub mod signal;
pub mod validator;

pub use price_series::{PriceBar, PriceSeries, SeriesError};
pub use signal::{Exposure, RegimeState, SignalBatch, SignalRecord, SignalStatus, TrendState};
pub use validator::{DataValidator, ValidationError, ValidationReport, ValidatorConfig};
