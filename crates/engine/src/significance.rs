//! Significance filter.
//!
//! A closed candle is significant when its absolute open-to-close change
//! reaches the configured threshold. Each candle is screened at most once per
//! series: the last-processed open time only moves forward, and it moves for
//! every new candle whether or not that candle turns out to be significant.

use crate::state::{WatchKey, WatchState};
use candlewatch_core::Candle;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Configuration for the significance filter.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SignificanceConfig {
    /// Minimum absolute change in percent (1.67 means 1.67%).
    pub min_percent_change: f64,
}

impl Default for SignificanceConfig {
    fn default() -> Self {
        Self {
            min_percent_change: 1.67,
        }
    }
}

/// Outcome of screening one candle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Screening {
    /// Open time is not newer than the last processed one.
    AlreadyProcessed,
    /// New candle, but the move is too small.
    BelowThreshold { change_pct: f64 },
    /// New candle with a move at or above the threshold.
    Significant { change_pct: f64 },
}

impl Screening {
    /// Whether this outcome advances the last-processed timestamp.
    #[inline]
    pub fn is_new(&self) -> bool {
        !matches!(self, Screening::AlreadyProcessed)
    }

    #[inline]
    pub fn is_significant(&self) -> bool {
        matches!(self, Screening::Significant { .. })
    }
}

/// Percentage-change filter with timestamp gating.
#[derive(Debug, Clone)]
pub struct SignificanceFilter {
    config: SignificanceConfig,
}

impl SignificanceFilter {
    pub fn new(config: SignificanceConfig) -> Self {
        Self { config }
    }

    pub fn threshold(&self) -> f64 {
        self.config.min_percent_change
    }

    /// Classify a candle against the last processed open time.
    pub fn classify(&self, candle: &Candle, last_processed_ms: Option<i64>) -> Screening {
        if last_processed_ms.is_some_and(|last| candle.open_time_ms <= last) {
            return Screening::AlreadyProcessed;
        }

        let change_pct = candle.change_pct();
        if change_pct.abs() < self.config.min_percent_change {
            Screening::BelowThreshold { change_pct }
        } else {
            Screening::Significant { change_pct }
        }
    }

    /// Classify a candle and advance the series' last-processed timestamp.
    /// Returns the candle back if it is significant.
    pub fn screen(&self, candle: Candle, state: &mut WatchState) -> Option<Candle> {
        let key = WatchKey::of(&candle);
        let screening = self.classify(&candle, state.last_processed(&key));

        if screening.is_new() {
            state.mark_processed(&key, candle.open_time_ms);
        }

        match screening {
            Screening::Significant { change_pct } => {
                debug!(symbol = %key, change_pct, "Significant candle");
                Some(candle)
            }
            Screening::BelowThreshold { change_pct } => {
                debug!(symbol = %key, change_pct, "Candle below threshold");
                None
            }
            Screening::AlreadyProcessed => {
                debug!(symbol = %key, open_time_ms = candle.open_time_ms, "Candle already processed");
                None
            }
        }
    }
}

impl Default for SignificanceFilter {
    fn default() -> Self {
        Self::new(SignificanceConfig::default())
    }
}
