//! Duplicate suppression for candle alerts.
//!
//! A candidate is withheld when the previous alert for the same series went
//! out recently and the candidate looks like it: relative change and volume
//! both within tolerance.

use crate::state::NotificationRecord;
use candlewatch_core::Candle;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Configuration for the duplicate suppressor.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SuppressorConfig {
    /// Minimum seconds between similar alerts for one series.
    pub min_interval_secs: u64,
    /// Relative change difference below which two candles look alike.
    pub change_tolerance: f64,
    /// Relative volume difference below which two candles look alike.
    pub volume_tolerance: f64,
}

impl Default for SuppressorConfig {
    fn default() -> Self {
        Self {
            min_interval_secs: 300,
            change_tolerance: 0.2,
            volume_tolerance: 0.3,
        }
    }
}

/// Relative distance between a candidate and the last alerted candle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Similarity {
    pub change_diff: f64,
    pub volume_diff: f64,
}

impl Similarity {
    /// Distances are scaled by the previous candle, floored at 1 so that
    /// tiny reference values do not blow the ratio up.
    pub fn between(candidate: &Candle, previous: &Candle) -> Self {
        let previous_change = previous.change_pct();
        let change_diff =
            (candidate.change_pct() - previous_change).abs() / previous_change.abs().max(1.0);
        let volume_diff = (candidate.volume - previous.volume).abs() / previous.volume.max(1.0);
        Self {
            change_diff,
            volume_diff,
        }
    }
}

/// Decides whether a significant candle repeats the previous alert.
#[derive(Debug, Clone)]
pub struct DuplicateSuppressor {
    config: SuppressorConfig,
}

impl DuplicateSuppressor {
    pub fn new(config: SuppressorConfig) -> Self {
        Self { config }
    }

    pub fn is_similar(&self, candidate: &Candle, previous: &Candle) -> bool {
        let similarity = Similarity::between(candidate, previous);
        similarity.change_diff < self.config.change_tolerance
            && similarity.volume_diff < self.config.volume_tolerance
    }

    /// True if `candidate` should not be announced.
    pub fn should_suppress(
        &self,
        candidate: &Candle,
        last: Option<&NotificationRecord>,
        now: DateTime<Utc>,
    ) -> bool {
        let Some(last) = last else {
            return false;
        };

        let window_ms = i64::try_from(self.config.min_interval_secs)
            .unwrap_or(i64::MAX)
            .saturating_mul(1000);
        let elapsed_ms = (now - last.notified_at).num_milliseconds();
        let recent = elapsed_ms < window_ms;

        recent && self.is_similar(candidate, &last.candle)
    }
}

impl Default for DuplicateSuppressor {
    fn default() -> Self {
        Self::new(SuppressorConfig::default())
    }
}
