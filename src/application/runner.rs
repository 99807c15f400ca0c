//! Strategy Runner
//!
//! Fetches every configured ticker, runs its signal pipeline and collects
//! exactly one `SignalRecord` per ticker, in configuration order.
//!
//! Tickers run as independent tasks. The pipeline itself (including the
//! volatility fit) runs on the blocking pool under a timeout; a timeout or
//! a panic becomes a ModelError record for that ticker only.

use std::any::Any;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::task::JoinSet;
use tracing::{error, info, warn};

use crate::domain::{SignalBatch, SignalRecord, SignalStatus};
use crate::ports::{HistoricalQuery, MarketDataPort, VolatilityModel};
use crate::strategy::{ModelError, SignalPipeline, TickerConfig};

/// Runner settings outside the pure pipeline
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    /// Provider history range per ticker
    pub range: String,
    /// Upper bound on one ticker's pipeline once data is downloaded
    pub fit_timeout: Duration,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            range: "10y".to_string(),
            fit_timeout: Duration::from_secs(120),
        }
    }
}

pub struct StrategyRunner {
    market_data: Arc<dyn MarketDataPort>,
    model: Arc<dyn VolatilityModel>,
    pipeline: Arc<SignalPipeline>,
    tickers: Vec<TickerConfig>,
    config: RunnerConfig,
}

impl StrategyRunner {
    pub fn new(
        market_data: Arc<dyn MarketDataPort>,
        model: Arc<dyn VolatilityModel>,
        pipeline: SignalPipeline,
        tickers: Vec<TickerConfig>,
        config: RunnerConfig,
    ) -> Self {
        Self {
            market_data,
            model,
            pipeline: Arc::new(pipeline),
            tickers,
            config,
        }
    }

    /// Run all tickers as of the current time
    pub async fn run(&self) -> SignalBatch {
        self.run_at(Utc::now()).await
    }

    /// Run all tickers as of `now`
    pub async fn run_at(&self, now: DateTime<Utc>) -> SignalBatch {
        info!(
            tickers = self.tickers.len(),
            source = self.market_data.name(),
            model = self.model.name(),
            "Starting signal run"
        );

        let mut tasks = JoinSet::new();
        for (index, ticker) in self.tickers.iter().cloned().enumerate() {
            let job = TickerJob {
                ticker,
                market_data: Arc::clone(&self.market_data),
                model: Arc::clone(&self.model),
                pipeline: Arc::clone(&self.pipeline),
                config: self.config.clone(),
                now,
            };
            tasks.spawn(async move { (index, job.run().await) });
        }

        let mut slots: Vec<Option<SignalRecord>> = vec![None; self.tickers.len()];
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, record)) => slots[index] = Some(record),
                Err(e) => error!("ticker task failed: {}", e),
            }
        }

        let data: Vec<SignalRecord> = slots
            .into_iter()
            .zip(&self.tickers)
            .map(|(slot, ticker)| {
                slot.unwrap_or_else(|| {
                    failure(ticker, SignalStatus::ModelError, None, None, "ticker task aborted")
                })
            })
            .collect();

        let batch = SignalBatch::new(now, data);
        info!(
            total = batch.data.len(),
            failed = batch.failures(),
            "Signal run complete"
        );
        batch
    }
}

/// Everything one ticker task owns
struct TickerJob {
    ticker: TickerConfig,
    market_data: Arc<dyn MarketDataPort>,
    model: Arc<dyn VolatilityModel>,
    pipeline: Arc<SignalPipeline>,
    config: RunnerConfig,
    now: DateTime<Utc>,
}

impl TickerJob {
    async fn run(self) -> SignalRecord {
        let symbol = self.ticker.symbol.clone();
        let query = HistoricalQuery::daily(&symbol, &self.config.range);

        let series = match self.market_data.fetch_daily_closes(&query).await {
            Ok(series) => series,
            Err(e) => {
                error!(ticker = %symbol, "data error: {}", e);
                return failure(&self.ticker, SignalStatus::DataError, None, None, e.to_string());
            }
        };

        let as_of_date = series.last().map(|bar| bar.date);
        let last_price = series.last_known_close();

        let ticker = self.ticker.clone();
        let model = Arc::clone(&self.model);
        let pipeline = Arc::clone(&self.pipeline);
        let now = self.now;
        let blocking = tokio::task::spawn_blocking(move || {
            pipeline.evaluate(&ticker, series, model.as_ref(), &now)
        });

        let model_failure = |e: ModelError| {
            failure(&self.ticker, SignalStatus::ModelError, as_of_date, last_price, e.to_string())
        };

        match tokio::time::timeout(self.config.fit_timeout, blocking).await {
            Ok(Ok(record)) => record,
            Ok(Err(join_error)) => {
                let reason = if join_error.is_panic() {
                    panic_message(join_error.into_panic())
                } else {
                    join_error.to_string()
                };
                error!(ticker = %symbol, "pipeline panicked: {}", reason);
                model_failure(ModelError::Aborted(reason))
            }
            Err(_) => {
                warn!(
                    ticker = %symbol,
                    "volatility fit exceeded {:?}, abandoning",
                    self.config.fit_timeout
                );
                model_failure(ModelError::Timeout(self.config.fit_timeout.as_secs()))
            }
        }
    }
}

fn failure(
    ticker: &TickerConfig,
    status: SignalStatus,
    as_of_date: Option<chrono::NaiveDate>,
    last_price: Option<f64>,
    explanation: impl Into<String>,
) -> SignalRecord {
    SignalRecord::failure(
        &ticker.symbol,
        status,
        as_of_date,
        last_price,
        ticker.threshold_description(),
        explanation,
    )
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{PriceBar, PriceSeries};
    use crate::ports::mocks::{MockMarketData, MockVolatilityModel, ScriptedFit};
    use crate::ports::{FitError, MarketDataError};
    use crate::strategy::PipelineParams;
    use async_trait::async_trait;
    use chrono::{NaiveDate, TimeZone};
    use mockall::mock;
    use mockall::predicate::*;

    mock! {
        pub Feed {}

        #[async_trait]
        impl MarketDataPort for Feed {
            async fn fetch_daily_closes(
                &self,
                query: &HistoricalQuery,
            ) -> Result<PriceSeries, MarketDataError>;
            fn name(&self) -> &'static str;
        }
    }

    struct PanickingModel;

    impl VolatilityModel for PanickingModel {
        fn fit(&self, _returns: &[f64]) -> Result<Vec<f64>, FitError> {
            panic!("solver blew up");
        }

        fn name(&self) -> &'static str {
            "panicking"
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 14, 21, 0, 0).unwrap()
    }

    fn series(symbol: &str, n: usize) -> PriceSeries {
        let end = NaiveDate::from_ymd_opt(2024, 6, 14).unwrap();
        let bars = (0..n)
            .map(|i| {
                let close = 50.0 + 0.03 * i as f64 + 2.0 * (i as f64 * 0.13).sin();
                PriceBar::new(end - chrono::Duration::days((n - 1 - i) as i64), close)
            })
            .collect();
        PriceSeries::new(symbol, bars).unwrap()
    }

    fn runner(
        market_data: Arc<dyn MarketDataPort>,
        model: Arc<dyn VolatilityModel>,
        fit_timeout: Duration,
    ) -> StrategyRunner {
        StrategyRunner::new(
            market_data,
            model,
            SignalPipeline::new(PipelineParams::default()),
            TickerConfig::defaults(),
            RunnerConfig { range: "10y".to_string(), fit_timeout },
        )
    }

    #[tokio::test]
    async fn test_one_record_per_ticker_in_order() {
        let feed = MockMarketData::new()
            .with_series(series("UPRO", 700))
            .with_failure("EURL", "connection reset")
            .with_series(series("EDC", 700));
        let runner = runner(
            Arc::new(feed.clone()),
            Arc::new(MockVolatilityModel::ewma()),
            Duration::from_secs(30),
        );

        let batch = runner.run_at(now()).await;

        let tickers: Vec<&str> = batch.data.iter().map(|r| r.ticker.as_str()).collect();
        assert_eq!(tickers, vec!["UPRO", "EURL", "EDC"]);
        assert_eq!(batch.data[0].status, SignalStatus::Ok);
        assert_eq!(batch.data[1].status, SignalStatus::DataError);
        assert!(batch.data[1].trigger_explanation.contains("connection reset"));
        assert_eq!(batch.data[2].status, SignalStatus::Ok);
        assert_eq!(batch.failures(), 1);
        assert_eq!(feed.get_calls().len(), 3);
    }

    #[tokio::test]
    async fn test_fit_failure_isolated() {
        let feed = MockMarketData::new()
            .with_series(series("UPRO", 700))
            .with_series(series("EURL", 700))
            .with_series(series("EDC", 700));
        let model = MockVolatilityModel::new(ScriptedFit::Fail(FitError::NonConvergence {
            iterations: 500,
        }));
        let batch = runner(Arc::new(feed), Arc::new(model), Duration::from_secs(30))
            .run_at(now())
            .await;

        assert!(batch.data.iter().all(|r| r.status == SignalStatus::ModelError));
        assert!(batch.data.iter().all(|r| r.price > 0.0));
    }

    #[tokio::test]
    async fn test_slow_fit_times_out() {
        let feed = MockMarketData::new()
            .with_series(series("UPRO", 700))
            .with_series(series("EURL", 700))
            .with_series(series("EDC", 700));
        let model = MockVolatilityModel::new(ScriptedFit::Slow {
            delay: Duration::from_millis(500),
            lambda: 0.94,
        });
        let batch = runner(Arc::new(feed), Arc::new(model), Duration::from_millis(20))
            .run_at(now())
            .await;

        assert_eq!(batch.data.len(), 3);
        for record in &batch.data {
            assert_eq!(record.status, SignalStatus::ModelError);
            assert!(record.trigger_explanation.contains("timed out"));
            assert_eq!(record.as_of_date, NaiveDate::from_ymd_opt(2024, 6, 14));
        }
    }

    #[tokio::test]
    async fn test_panic_becomes_model_error() {
        let feed = MockMarketData::new()
            .with_series(series("UPRO", 700))
            .with_series(series("EURL", 700))
            .with_series(series("EDC", 700));
        let batch = runner(Arc::new(feed), Arc::new(PanickingModel), Duration::from_secs(30))
            .run_at(now())
            .await;

        assert_eq!(batch.data.len(), 3);
        for record in &batch.data {
            assert_eq!(record.status, SignalStatus::ModelError);
            assert!(record.trigger_explanation.contains("solver blew up"));
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_tickers_fetch_concurrently() {
        let delay = Duration::from_millis(300);
        let feed = MockMarketData::new()
            .with_series(series("UPRO", 700))
            .with_series(series("EURL", 700))
            .with_series(series("EDC", 700))
            .with_delay(delay);
        let runner = runner(
            Arc::new(feed.clone()),
            Arc::new(MockVolatilityModel::ewma()),
            Duration::from_secs(30),
        );

        let started = std::time::Instant::now();
        let batch = runner.run_at(now()).await;
        let elapsed = started.elapsed();

        assert_eq!(feed.get_calls().len(), 3);
        assert!(batch.data.iter().all(|r| r.status == SignalStatus::Ok));
        assert!(elapsed >= delay);
        assert!(elapsed < delay * 3, "fetches ran sequentially: {:?}", elapsed);
    }

    #[tokio::test]
    async fn test_queries_use_configured_range() {
        let mut feed = MockFeed::new();
        feed.expect_name().return_const("mockall");
        feed.expect_fetch_daily_closes()
            .with(function(|q: &HistoricalQuery| q.range == "10y"))
            .times(3)
            .returning(|q| Err(MarketDataError::NoData(q.symbol.clone())));

        let batch = runner(
            Arc::new(feed),
            Arc::new(MockVolatilityModel::ewma()),
            Duration::from_secs(30),
        )
        .run_at(now())
        .await;

        assert!(batch.data.iter().all(|r| r.status == SignalStatus::DataError));
        assert_eq!(batch.data[0].trigger_explanation, "No data returned for UPRO");
        assert_eq!(batch.data[0].threshold_description, "GARCH(Exit>2.0, Entry<1.0)");
    }

    #[test]
    fn test_panic_message_extraction() {
        assert_eq!(panic_message(Box::new("static")), "static");
        assert_eq!(panic_message(Box::new(String::from("owned"))), "owned");
        assert_eq!(panic_message(Box::new(42u8)), "unknown panic");
    }
}
