//! Signal Blender
//!
//! Combines the volatility regime and the trend flag into one exposure:
//!
//! | regime | trend  | exposure |
//! |--------|--------|----------|
//! | Hold   | above  | 100%     |
//! | Hold   | below  | 50%      |
//! | Exit   | above  | 50%      |
//! | Exit   | below  | 0%       |

use chrono::NaiveDate;

use crate::domain::{Exposure, RegimeState, SignalRecord, SignalStatus, TrendState};
use crate::strategy::params::TickerConfig;
use crate::strategy::regime::RegimeSummary;
use crate::strategy::trend_filter::TrendReading;

pub fn blend(regime: RegimeState, is_above_trend: bool) -> Exposure {
    match (regime, is_above_trend) {
        (RegimeState::Hold, true) => Exposure::Full,
        (RegimeState::Hold, false) | (RegimeState::Exit, true) => Exposure::Half,
        (RegimeState::Exit, false) => Exposure::Zero,
    }
}

/// Build the successful record for one ticker.
///
/// The regime carries forward over dates without a z-score; `z_score` is
/// only reported when one is defined on `as_of_date` itself.
pub fn compose(
    ticker: &TickerConfig,
    as_of_date: NaiveDate,
    regime: &RegimeSummary,
    trend: &TrendReading,
) -> SignalRecord {
    let exposure = blend(regime.state, trend.is_above);
    SignalRecord {
        ticker: ticker.symbol.clone(),
        as_of_date: Some(as_of_date),
        price: trend.close,
        z_score: (regime.date == as_of_date).then_some(regime.z_score),
        is_above_trend: trend.is_above,
        trend_reference_value: trend.moving_average,
        regime_state: Some(regime.state),
        trend_state: Some(TrendState::from_above(trend.is_above)),
        final_exposure: exposure,
        final_decision: exposure.decision().to_string(),
        threshold_description: ticker.threshold_description(),
        trigger_explanation: regime.trigger.to_string(),
        status: SignalStatus::Ok,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategy::regime::{Transition, Trigger};

    #[test]
    fn test_blend_table() {
        assert_eq!(blend(RegimeState::Hold, true), Exposure::Full);
        assert_eq!(blend(RegimeState::Hold, false), Exposure::Half);
        assert_eq!(blend(RegimeState::Exit, true), Exposure::Half);
        assert_eq!(blend(RegimeState::Exit, false), Exposure::Zero);

        let percents: Vec<u8> = [
            (RegimeState::Hold, true),
            (RegimeState::Hold, false),
            (RegimeState::Exit, true),
            (RegimeState::Exit, false),
        ]
        .iter()
        .map(|(r, t)| blend(*r, *t).percent())
        .collect();
        assert_eq!(percents, vec![100, 50, 50, 0]);
    }

    #[test]
    fn test_compose_record() {
        let ticker = TickerConfig::new("UPRO", 2.0, 1.0, 200).unwrap();
        let date = NaiveDate::from_ymd_opt(2024, 6, 14).unwrap();
        let regime = RegimeSummary {
            date,
            z_score: 2.41,
            state: RegimeState::Exit,
            trigger: Trigger::Changed(Transition {
                date: NaiveDate::from_ymd_opt(2024, 6, 3).unwrap(),
                z_score: 2.07,
                to: RegimeState::Exit,
            }),
        };
        let trend = TrendReading { close: 71.5, moving_average: Some(65.0), is_above: true };

        let record = compose(&ticker, date, &regime, &trend);
        assert_eq!(record.ticker, "UPRO");
        assert_eq!(record.final_exposure, Exposure::Half);
        assert_eq!(record.final_decision, "Hold 50%");
        assert_eq!(record.trend_state, Some(TrendState::Hold));
        assert_eq!(record.regime_state, Some(RegimeState::Exit));
        assert_eq!(record.threshold_description, "GARCH(Exit>2.0, Entry<1.0)");
        assert_eq!(record.trigger_explanation, "triggered Exit on 2024-06-03 (Z=2.07)");
        assert!(record.is_ok());
    }

    #[test]
    fn test_compose_omits_z_score_from_earlier_date() {
        let ticker = TickerConfig::new("EDC", 1.75, -0.25, 200).unwrap();
        let as_of = NaiveDate::from_ymd_opt(2024, 6, 14).unwrap();
        let regime = RegimeSummary {
            date: NaiveDate::from_ymd_opt(2024, 6, 11).unwrap(),
            z_score: 1.9,
            state: RegimeState::Exit,
            trigger: Trigger::LongStanding { state: RegimeState::Exit, window: 500 },
        };
        let trend = TrendReading { close: 30.0, moving_average: Some(32.0), is_above: false };

        let record = compose(&ticker, as_of, &regime, &trend);
        assert_eq!(record.as_of_date, Some(as_of));
        assert_eq!(record.z_score, None);
        assert_eq!(record.regime_state, Some(RegimeState::Exit));
        assert_eq!(record.final_exposure, Exposure::Zero);
    }
}
