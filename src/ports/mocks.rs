use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use async_trait::async_trait;

use crate::domain::PriceSeries;
use super::market_data::{HistoricalQuery, MarketDataError, MarketDataPort};
use super::volatility_model::{FitError, VolatilityModel};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Mock market data port that records calls and allows controlled responses
#[derive(Debug, Default, Clone)]
pub struct MockMarketData {
    calls: Arc<Mutex<Vec<String>>>,
    responses: Arc<Mutex<HashMap<String, Result<PriceSeries, String>>>>,
    delay: Option<Duration>,
}

impl MockMarketData {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method to set a series for a given symbol
    pub fn with_series(self, series: PriceSeries) -> Self {
        lock(&self.responses).insert(series.ticker().to_string(), Ok(series));
        self
    }

    /// Builder method to make a symbol fail with a transport error
    pub fn with_failure(self, symbol: &str, message: &str) -> Self {
        lock(&self.responses).insert(symbol.to_string(), Err(message.to_string()));
        self
    }

    /// Builder method to delay every response
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Get all recorded calls
    pub fn get_calls(&self) -> Vec<String> {
        lock(&self.calls).clone()
    }
}

#[async_trait]
impl MarketDataPort for MockMarketData {
    async fn fetch_daily_closes(
        &self,
        query: &HistoricalQuery,
    ) -> Result<PriceSeries, MarketDataError> {
        lock(&self.calls).push(query.symbol.clone());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let response = lock(&self.responses).get(&query.symbol).cloned();
        match response {
            Some(Ok(series)) => Ok(series),
            Some(Err(message)) => Err(MarketDataError::RestError(message)),
            None => Err(MarketDataError::NoData(query.symbol.clone())),
        }
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}

/// Scripted behaviour for [`MockVolatilityModel`]
#[derive(Debug, Clone)]
pub enum ScriptedFit {
    /// RiskMetrics-style exponentially weighted volatility
    Ewma { lambda: f64 },
    /// Return the trailing part of a fixed series
    Fixed(Vec<f64>),
    /// Always fail
    Fail(FitError),
    /// Sleep before answering with EWMA volatility
    Slow { delay: Duration, lambda: f64 },
}

/// Deterministic volatility model for tests
#[derive(Debug, Clone)]
pub struct MockVolatilityModel {
    behaviour: ScriptedFit,
    calls: Arc<Mutex<usize>>,
}

impl MockVolatilityModel {
    pub fn new(behaviour: ScriptedFit) -> Self {
        Self { behaviour, calls: Arc::new(Mutex::new(0)) }
    }

    pub fn ewma() -> Self {
        Self::new(ScriptedFit::Ewma { lambda: 0.94 })
    }

    pub fn call_count(&self) -> usize {
        *lock(&self.calls)
    }
}

fn ewma_volatility(returns: &[f64], lambda: f64) -> Vec<f64> {
    let seed = returns.iter().map(|r| r * r).sum::<f64>() / returns.len().max(1) as f64;
    let mut variance = seed;
    returns
        .iter()
        .map(|r| {
            let current = variance.sqrt();
            variance = lambda * variance + (1.0 - lambda) * r * r;
            current
        })
        .collect()
}

impl VolatilityModel for MockVolatilityModel {
    fn fit(&self, returns: &[f64]) -> Result<Vec<f64>, FitError> {
        *lock(&self.calls) += 1;
        match &self.behaviour {
            ScriptedFit::Ewma { lambda } => Ok(ewma_volatility(returns, *lambda)),
            ScriptedFit::Fixed(values) => {
                if values.len() < returns.len() {
                    return Err(FitError::InvalidOutput(format!(
                        "scripted series has {} values, {} requested",
                        values.len(),
                        returns.len()
                    )));
                }
                Ok(values[values.len() - returns.len()..].to_vec())
            }
            ScriptedFit::Fail(err) => Err(err.clone()),
            ScriptedFit::Slow { delay, lambda } => {
                std::thread::sleep(*delay);
                Ok(ewma_volatility(returns, *lambda))
            }
        }
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}
