//! Regime State Machine
//!
//! Hysteresis filter that turns the volatility z-score into a binary
//! Hold / Exit regime.
//!
//! ```text
//! z > exit_threshold   -> raw Exit
//! z < entry_threshold  -> raw Hold
//! otherwise            -> no instruction
//! ```
//!
//! The state at each date is the most recent raw instruction at or before
//! it, defaulting to Hold. Because `exit_threshold > entry_threshold`, a
//! z-score that stays inside the band can never flip the regime.

use std::fmt;

use chrono::NaiveDate;
use thiserror::Error;

use crate::domain::RegimeState;
use crate::strategy::params::TickerConfig;
use crate::strategy::volatility::ZScoreSeries;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum BandError {
    #[error("exit threshold {exit} must be greater than entry threshold {entry}")]
    Inverted { exit: f64, entry: f64 },

    #[error("thresholds must be finite")]
    NonFinite,
}

/// Exit / entry thresholds with `exit > entry`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HysteresisBand {
    exit_threshold: f64,
    entry_threshold: f64,
}

impl HysteresisBand {
    pub fn new(exit_threshold: f64, entry_threshold: f64) -> Result<Self, BandError> {
        if !exit_threshold.is_finite() || !entry_threshold.is_finite() {
            return Err(BandError::NonFinite);
        }
        if exit_threshold <= entry_threshold {
            return Err(BandError::Inverted {
                exit: exit_threshold,
                entry: entry_threshold,
            });
        }
        Ok(Self { exit_threshold, entry_threshold })
    }

    pub fn exit_threshold(&self) -> f64 {
        self.exit_threshold
    }

    pub fn entry_threshold(&self) -> f64 {
        self.entry_threshold
    }

    /// Raw instruction for a single z-score
    pub fn classify(&self, z_score: f64) -> Option<RegimeState> {
        if z_score > self.exit_threshold {
            Some(RegimeState::Exit)
        } else if z_score < self.entry_threshold {
            Some(RegimeState::Hold)
        } else {
            None
        }
    }
}

impl TryFrom<&TickerConfig> for HysteresisBand {
    type Error = BandError;

    fn try_from(ticker: &TickerConfig) -> Result<Self, Self::Error> {
        Self::new(ticker.exit_threshold, ticker.entry_threshold)
    }
}

/// One evaluated date
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RegimePoint {
    pub date: NaiveDate,
    pub z_score: f64,
    /// Instruction produced by this date's z-score alone
    pub raw: Option<RegimeState>,
    /// Forward-filled state
    pub state: RegimeState,
}

/// A date where the state differs from the previous date's
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transition {
    pub date: NaiveDate,
    pub z_score: f64,
    pub to: RegimeState,
}

/// Audit explanation for the current regime
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Trigger {
    Changed(Transition),
    LongStanding { state: RegimeState, window: usize },
}

impl fmt::Display for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Trigger::Changed(t) => write!(
                f,
                "triggered {} on {} (Z={:.2})",
                t.to,
                t.date.format("%Y-%m-%d"),
                t.z_score
            ),
            Trigger::LongStanding { state, window } => write!(
                f,
                "long-standing {} state, no change within {} observations",
                state, window
            ),
        }
    }
}

/// Current regime with its latest z-score and trigger
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RegimeSummary {
    pub date: NaiveDate,
    pub z_score: f64,
    pub state: RegimeState,
    pub trigger: Trigger,
}

/// Forward-filled regime over the trailing window, ascending by date
#[derive(Debug, Clone, PartialEq)]
pub struct RegimeTimeline {
    points: Vec<RegimePoint>,
}

impl RegimeTimeline {
    pub fn points(&self) -> &[RegimePoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn states(&self) -> Vec<RegimeState> {
        self.points.iter().map(|p| p.state).collect()
    }

    /// State at the last date, `None` for an empty timeline
    pub fn current(&self) -> Option<RegimeState> {
        self.points.last().map(|p| p.state)
    }

    /// Every state change; the first point is a baseline, never a change
    pub fn transitions(&self) -> Vec<Transition> {
        self.points
            .windows(2)
            .filter(|pair| pair[1].state != pair[0].state)
            .map(|pair| Transition {
                date: pair[1].date,
                z_score: pair[1].z_score,
                to: pair[1].state,
            })
            .collect()
    }

    pub fn last_transition(&self) -> Option<Transition> {
        self.points
            .windows(2)
            .rev()
            .find(|pair| pair[1].state != pair[0].state)
            .map(|pair| Transition {
                date: pair[1].date,
                z_score: pair[1].z_score,
                to: pair[1].state,
            })
    }

    pub fn trigger(&self) -> Option<Trigger> {
        let state = self.current()?;
        Some(match self.last_transition() {
            Some(transition) => Trigger::Changed(transition),
            None => Trigger::LongStanding { state, window: self.len() },
        })
    }

    pub fn summary(&self) -> Option<RegimeSummary> {
        let last = self.points.last()?;
        Some(RegimeSummary {
            date: last.date,
            z_score: last.z_score,
            state: last.state,
            trigger: self.trigger()?,
        })
    }
}

/// Replays the trailing z-scores through the hysteresis band
#[derive(Debug, Clone)]
pub struct RegimeStateMachine {
    band: HysteresisBand,
    lookback: usize,
}

impl RegimeStateMachine {
    pub fn new(band: HysteresisBand, lookback: usize) -> Self {
        assert!(
            band.exit_threshold > band.entry_threshold,
            "hysteresis band inverted: exit {} <= entry {}",
            band.exit_threshold,
            band.entry_threshold
        );
        Self { band, lookback }
    }

    pub fn evaluate(&self, zscores: &ZScoreSeries) -> RegimeTimeline {
        let mut state = RegimeState::Hold;
        let points = zscores
            .tail(self.lookback)
            .iter()
            .map(|p| {
                let raw = self.band.classify(p.z_score);
                if let Some(instruction) = raw {
                    state = instruction;
                }
                RegimePoint { date: p.date, z_score: p.z_score, raw, state }
            })
            .collect();
        RegimeTimeline { points }
    }
}
