//! Yahoo Finance chart client
//!
//! Daily bars from the v8 chart endpoint. Closes are taken from the
//! split/dividend adjusted `adjclose` series when present, and bar dates
//! are exchange-local (timestamp shifted by the response's `gmtoffset`).

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate};
use reqwest::{Client, StatusCode};
use serde::Deserialize;

use crate::config::MarketDataSection;
use crate::domain::{PriceBar, PriceSeries};
use crate::ports::market_data::{HistoricalQuery, MarketDataError, MarketDataPort};

const USER_AGENT: &str = "Mozilla/5.0 (compatible; regime-signal/0.1)";

/// Yahoo chart client configuration
#[derive(Debug, Clone)]
pub struct YahooConfig {
    pub base_url: String,
    /// Request timeout
    pub timeout: Duration,
    /// Retries after the first attempt
    pub max_retries: u32,
    /// Linear backoff step
    pub retry_backoff: Duration,
}

impl Default for YahooConfig {
    fn default() -> Self {
        Self::from(&MarketDataSection::default())
    }
}

impl From<&MarketDataSection> for YahooConfig {
    fn from(section: &MarketDataSection) -> Self {
        Self {
            base_url: section.get_base_url(),
            timeout: Duration::from_secs(section.timeout_secs),
            max_retries: section.max_retries,
            retry_backoff: Duration::from_millis(section.retry_backoff_ms),
        }
    }
}

#[derive(Debug, Clone)]
pub struct YahooChartClient {
    config: YahooConfig,
    http: Client,
}

impl YahooChartClient {
    pub fn new(config: YahooConfig) -> Result<Self, MarketDataError> {
        let http = Client::builder()
            .timeout(config.timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| MarketDataError::RestError(e.to_string()))?;
        Ok(Self { config, http })
    }

    fn chart_url(&self, query: &HistoricalQuery) -> String {
        format!(
            "{}/v8/finance/chart/{}?interval=1d&range={}&events=div%2Csplit&includeAdjustedClose=true",
            self.config.base_url.trim_end_matches('/'),
            query.symbol,
            query.range
        )
    }

    async fn fetch_once(&self, query: &HistoricalQuery) -> Result<PriceSeries, MarketDataError> {
        let response = self
            .http
            .get(self.chart_url(query))
            .send()
            .await
            .map_err(|e| MarketDataError::RestError(e.to_string()))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(MarketDataError::NoData(query.symbol.clone()));
        }
        if !status.is_success() {
            return Err(MarketDataError::RestError(format!("HTTP {}", status)));
        }

        let body = response
            .text()
            .await
            .map_err(|e| MarketDataError::RestError(e.to_string()))?;
        parse_chart(&query.symbol, &body)
    }

    /// Run `request` until it succeeds, fails permanently or retries run out
    async fn execute_with_retry<F, Fut>(
        &self,
        symbol: &str,
        request: F,
    ) -> Result<PriceSeries, MarketDataError>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<PriceSeries, MarketDataError>>,
    {
        let mut attempt = 0;
        loop {
            match request().await {
                Ok(series) => return Ok(series),
                Err(e) if e.is_transient() && attempt < self.config.max_retries => {
                    attempt += 1;
                    let backoff = self.config.retry_backoff * attempt;
                    tracing::warn!(
                        ticker = symbol,
                        "download failed ({}), retrying in {:?} (attempt {}/{})",
                        e,
                        backoff,
                        attempt,
                        self.config.max_retries
                    );
                    tokio::time::sleep(backoff).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[async_trait]
impl MarketDataPort for YahooChartClient {
    async fn fetch_daily_closes(
        &self,
        query: &HistoricalQuery,
    ) -> Result<PriceSeries, MarketDataError> {
        let series = self
            .execute_with_retry(&query.symbol, || self.fetch_once(query))
            .await?;
        tracing::info!(ticker = %query.symbol, bars = series.len(), "downloaded daily closes");
        Ok(series)
    }

    fn name(&self) -> &'static str {
        "yahoo"
    }
}

#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: ChartEnvelope,
}

#[derive(Debug, Deserialize)]
struct ChartEnvelope {
    result: Option<Vec<ChartResult>>,
    error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
struct ChartError {
    code: String,
    description: String,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    meta: ChartMeta,
    #[serde(default)]
    timestamp: Vec<i64>,
    indicators: Indicators,
}

#[derive(Debug, Deserialize)]
struct ChartMeta {
    #[serde(default)]
    gmtoffset: i64,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    #[serde(default)]
    quote: Vec<QuoteIndicator>,
    #[serde(default)]
    adjclose: Vec<AdjCloseIndicator>,
}

#[derive(Debug, Deserialize)]
struct QuoteIndicator {
    #[serde(default)]
    close: Vec<Option<f64>>,
}

#[derive(Debug, Deserialize)]
struct AdjCloseIndicator {
    #[serde(default)]
    adjclose: Vec<Option<f64>>,
}

/// Convert a chart response body into a price series
fn parse_chart(symbol: &str, body: &str) -> Result<PriceSeries, MarketDataError> {
    let response: ChartResponse =
        serde_json::from_str(body).map_err(|e| MarketDataError::ParseError(e.to_string()))?;

    if let Some(error) = response.chart.error {
        return Err(MarketDataError::NoData(format!(
            "{}: {} - {}",
            symbol, error.code, error.description
        )));
    }

    let result = response
        .chart
        .result
        .and_then(|results| results.into_iter().next())
        .ok_or_else(|| MarketDataError::NoData(symbol.to_string()))?;

    if result.timestamp.is_empty() {
        return Err(MarketDataError::NoData(symbol.to_string()));
    }

    let closes = match result.indicators.adjclose.into_iter().next() {
        Some(adj) if !adj.adjclose.is_empty() => adj.adjclose,
        _ => result
            .indicators
            .quote
            .into_iter()
            .next()
            .map(|q| q.close)
            .ok_or_else(|| MarketDataError::ParseError(format!("{}: no close series", symbol)))?,
    };

    let mut bars: Vec<PriceBar> = Vec::with_capacity(result.timestamp.len());
    for (i, ts) in result.timestamp.iter().enumerate() {
        let date = local_date(*ts, result.meta.gmtoffset).ok_or_else(|| {
            MarketDataError::ParseError(format!("{}: invalid timestamp {}", symbol, ts))
        })?;
        let bar = match closes.get(i).copied().flatten() {
            Some(close) if close.is_finite() => PriceBar::new(date, close),
            _ => PriceBar::missing(date),
        };
        // A trailing live quote can repeat the last session's date
        match bars.last_mut() {
            Some(last) if last.date == date => *last = bar,
            _ => bars.push(bar),
        }
    }

    Ok(PriceSeries::new(symbol, bars)?)
}

fn local_date(timestamp: i64, gmtoffset: i64) -> Option<NaiveDate> {
    DateTime::from_timestamp(timestamp.checked_add(gmtoffset)?, 0).map(|dt| dt.date_naive())
}
