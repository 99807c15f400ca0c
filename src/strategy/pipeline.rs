//! Per-ticker signal pipeline
//!
//! validate → returns → volatility z-score → regime → trend → blend.
//!
//! Pure and synchronous: the same series, config and volatility model
//! output always give the same record. Every outcome is a `SignalRecord`.

use chrono::{DateTime, TimeZone};
use tracing::{debug, info, warn};

use crate::domain::{DataValidator, PriceSeries, SignalRecord, SignalStatus};
use crate::ports::VolatilityModel;
use crate::strategy::blender;
use crate::strategy::params::{PipelineParams, TickerConfig};
use crate::strategy::regime::{HysteresisBand, RegimeStateMachine};
use crate::strategy::trend_filter::TrendFilter;
use crate::strategy::volatility::{ModelError, ReturnSeries, VolatilityRegimeEstimator};

#[derive(Debug, Clone)]
pub struct SignalPipeline {
    params: PipelineParams,
    validator: DataValidator,
    estimator: VolatilityRegimeEstimator,
}

impl SignalPipeline {
    pub fn new(params: PipelineParams) -> Self {
        Self {
            validator: DataValidator::new(params.validator),
            estimator: VolatilityRegimeEstimator::from_params(&params),
            params,
        }
    }

    /// Run one ticker end to end as of `now`
    pub fn evaluate<Tz: TimeZone>(
        &self,
        ticker: &TickerConfig,
        mut series: PriceSeries,
        model: &dyn VolatilityModel,
        now: &DateTime<Tz>,
    ) -> SignalRecord {
        let symbol = ticker.symbol.as_str();
        let as_of_date = series.last().map(|bar| bar.date);

        let report = self.validator.validate(&mut series, now);
        if !report.passed {
            warn!(ticker = symbol, "validation failed: {}", report.summary());
            return SignalRecord::failure(
                symbol,
                SignalStatus::ValidationFailed,
                as_of_date,
                series.last_known_close(),
                ticker.threshold_description(),
                report.summary(),
            );
        }
        for message in &report.messages {
            debug!(ticker = symbol, "{}", message);
        }

        let closes = match series.closes() {
            Ok(closes) => closes,
            Err(e) => {
                return SignalRecord::failure(
                    symbol,
                    SignalStatus::DataError,
                    as_of_date,
                    series.last_known_close(),
                    ticker.threshold_description(),
                    e.to_string(),
                )
            }
        };

        let model_failure = |e: ModelError| {
            tracing::error!(ticker = symbol, model = model.name(), "model error: {}", e);
            SignalRecord::failure(
                symbol,
                SignalStatus::ModelError,
                as_of_date,
                closes.last().copied(),
                ticker.threshold_description(),
                e.to_string(),
            )
        };

        let returns = match ReturnSeries::from_prices(&series) {
            Ok(returns) => returns,
            Err(e) => return model_failure(ModelError::Aborted(e.to_string())),
        };

        let zscores = match self.estimator.run(&returns, model) {
            Ok((_, zscores)) => zscores,
            Err(e) => return model_failure(e),
        };

        let band = match HysteresisBand::try_from(ticker) {
            Ok(band) => band,
            Err(e) => panic!("invalid thresholds for {}: {}", symbol, e),
        };
        let timeline =
            RegimeStateMachine::new(band, self.params.regime_lookback_window).evaluate(&zscores);
        let Some(regime) = timeline.summary() else {
            return model_failure(ModelError::InsufficientHistory {
                required: self.estimator.z_window(),
                actual: 0,
            });
        };

        let Some(trend) = TrendFilter::new(ticker.trend_window).evaluate(&closes) else {
            return model_failure(ModelError::Aborted("no closes after validation".to_string()));
        };

        let Some(date) = as_of_date else {
            return model_failure(ModelError::Aborted("series has no as-of date".to_string()));
        };

        if regime.date != date {
            warn!(
                ticker = symbol,
                last_defined = %regime.date,
                "z-score undefined on {}, regime carried forward",
                date
            );
        }

        let record = blender::compose(ticker, date, &regime, &trend);
        info!(
            ticker = symbol,
            z_score = ?record.z_score,
            regime = %regime.state,
            trend = %trend.state(),
            exposure = record.final_exposure.percent(),
            "signal computed"
        );
        record
    }
}
