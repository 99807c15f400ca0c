//! Signal records
//!
//! Output vocabulary of the pipeline: regime/trend states, the blended
//! exposure and the per-ticker `SignalRecord` written to the JSON artifact.

use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Serialize, Serializer};

/// Volatility regime decided by the hysteresis state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RegimeState {
    /// Volatility normal, stay invested
    Hold,
    /// Volatility elevated, step aside
    Exit,
}

impl fmt::Display for RegimeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegimeState::Hold => write!(f, "Hold"),
            RegimeState::Exit => write!(f, "Exit"),
        }
    }
}

/// Trend filter verdict: Hold when price is strictly above its moving average
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TrendState {
    Hold,
    Exit,
}

impl TrendState {
    pub fn from_above(is_above: bool) -> Self {
        if is_above {
            TrendState::Hold
        } else {
            TrendState::Exit
        }
    }
}

impl fmt::Display for TrendState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrendState::Hold => write!(f, "Hold"),
            TrendState::Exit => write!(f, "Exit"),
        }
    }
}

/// Recommended fraction of capital in the instrument
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Exposure {
    Zero,
    Half,
    Full,
}

impl Exposure {
    pub fn percent(&self) -> u8 {
        match self {
            Exposure::Zero => 0,
            Exposure::Half => 50,
            Exposure::Full => 100,
        }
    }

    /// Human-readable decision label
    pub fn decision(&self) -> &'static str {
        match self {
            Exposure::Full => "Hold 100%",
            Exposure::Half => "Hold 50%",
            Exposure::Zero => "Hold 0% (flat)",
        }
    }
}

impl Serialize for Exposure {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(self.percent())
    }
}

/// Outcome kind of one ticker's run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalStatus {
    Ok,
    DataError,
    ModelError,
    ValidationFailed,
}

/// Final per-ticker output unit
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SignalRecord {
    pub ticker: String,
    #[serde(serialize_with = "serialize_date")]
    pub as_of_date: Option<NaiveDate>,
    #[serde(serialize_with = "round2")]
    pub price: f64,
    #[serde(serialize_with = "round2_opt")]
    pub z_score: Option<f64>,
    pub is_above_trend: bool,
    #[serde(serialize_with = "round2_opt")]
    pub trend_reference_value: Option<f64>,
    pub regime_state: Option<RegimeState>,
    pub trend_state: Option<TrendState>,
    pub final_exposure: Exposure,
    pub final_decision: String,
    pub threshold_description: String,
    pub trigger_explanation: String,
    pub status: SignalStatus,
}

impl SignalRecord {
    /// Record for a ticker whose pipeline could not produce a signal.
    ///
    /// Numeric fields are zeroed except `price`, which carries the last
    /// known close when one is available.
    pub fn failure(
        ticker: impl Into<String>,
        status: SignalStatus,
        as_of_date: Option<NaiveDate>,
        last_price: Option<f64>,
        threshold_description: String,
        explanation: impl Into<String>,
    ) -> Self {
        Self {
            ticker: ticker.into(),
            as_of_date,
            price: last_price.unwrap_or(0.0),
            z_score: Some(0.0),
            is_above_trend: false,
            trend_reference_value: Some(0.0),
            regime_state: None,
            trend_state: None,
            final_exposure: Exposure::Zero,
            final_decision: Exposure::Zero.decision().to_string(),
            threshold_description,
            trigger_explanation: explanation.into(),
            status,
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == SignalStatus::Ok
    }
}

/// One run's output artifact
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SignalBatch {
    #[serde(serialize_with = "serialize_timestamp")]
    pub updated_at: DateTime<Utc>,
    pub data: Vec<SignalRecord>,
}

impl SignalBatch {
    pub fn new(updated_at: DateTime<Utc>, data: Vec<SignalRecord>) -> Self {
        Self { updated_at, data }
    }

    pub fn failures(&self) -> usize {
        self.data.iter().filter(|r| !r.is_ok()).count()
    }
}

fn round_2dp(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn round2<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_f64(round_2dp(*value))
}

fn round2_opt<S: Serializer>(value: &Option<f64>, serializer: S) -> Result<S::Ok, S::Error> {
    match value {
        Some(v) if v.is_finite() => serializer.serialize_some(&round_2dp(*v)),
        _ => serializer.serialize_none(),
    }
}

fn serialize_date<S: Serializer>(date: &Option<NaiveDate>, serializer: S) -> Result<S::Ok, S::Error> {
    match date {
        Some(d) => serializer.serialize_str(&d.format("%Y-%m-%d").to_string()),
        None => serializer.serialize_none(),
    }
}

fn serialize_timestamp<S: Serializer>(ts: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&ts.format("%Y-%m-%d %H:%M:%S UTC").to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn sample_record() -> SignalRecord {
        SignalRecord {
            ticker: "UPRO".to_string(),
            as_of_date: NaiveDate::from_ymd_opt(2024, 6, 14),
            price: 71.23456,
            z_score: Some(-0.4567),
            is_above_trend: true,
            trend_reference_value: Some(65.005),
            regime_state: Some(RegimeState::Hold),
            trend_state: Some(TrendState::Hold),
            final_exposure: Exposure::Full,
            final_decision: Exposure::Full.decision().to_string(),
            threshold_description: "GARCH(Exit>2.0, Entry<1.0)".to_string(),
            trigger_explanation: "long-standing state, no change within 500 observations"
                .to_string(),
            status: SignalStatus::Ok,
        }
    }

    #[test]
    fn test_record_serialization_shape() {
        let value = serde_json::to_value(sample_record()).unwrap();
        assert_eq!(value["as_of_date"], json!("2024-06-14"));
        assert_eq!(value["price"], json!(71.23));
        assert_eq!(value["z_score"], json!(-0.46));
        assert_eq!(value["regime_state"], json!("hold"));
        assert_eq!(value["final_exposure"], json!(100));
        assert_eq!(value["status"], json!("ok"));
    }

    #[test]
    fn test_failure_record_is_zeroed() {
        let record = SignalRecord::failure(
            "EDC",
            SignalStatus::DataError,
            None,
            None,
            "GARCH(Exit>1.75, Entry<-0.25)".to_string(),
            "download failed",
        );
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["price"], json!(0.0));
        assert_eq!(value["z_score"], json!(0.0));
        assert_eq!(value["final_exposure"], json!(0));
        assert_eq!(value["status"], json!("data_error"));
        assert_eq!(value["as_of_date"], json!(null));
        assert!(!record.is_ok());
    }

    #[test]
    fn test_non_finite_optional_serializes_as_null() {
        let mut record = sample_record();
        record.z_score = Some(f64::NAN);
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["z_score"], json!(null));
    }

    #[test]
    fn test_batch_timestamp_format() {
        let ts = Utc.with_ymd_and_hms(2024, 6, 14, 21, 5, 9).unwrap();
        let batch = SignalBatch::new(ts, vec![sample_record()]);
        let value = serde_json::to_value(&batch).unwrap();
        assert_eq!(value["updated_at"], json!("2024-06-14 21:05:09 UTC"));
        assert_eq!(value["data"].as_array().unwrap().len(), 1);
        assert_eq!(batch.failures(), 0);
    }

    #[test]
    fn test_exposure_labels() {
        assert_eq!(Exposure::Full.percent(), 100);
        assert_eq!(Exposure::Half.percent(), 50);
        assert_eq!(Exposure::Zero.percent(), 0);
        assert_eq!(Exposure::Zero.decision(), "Hold 0% (flat)");
    }
}
