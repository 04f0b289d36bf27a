//! OHLCV candle data.

use crate::{Pair, Timeframe};
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// Raw candle row as delivered by exchanges:
/// (open_time_ms, open, high, low, close, volume).
pub type CandleRow = (i64, f64, f64, f64, f64, f64);

/// One closed or forming time bucket of trading activity.
///
/// The open time is the identity of a candle within a (pair, timeframe)
/// series: two candles with the same open time describe the same bucket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub pair: Pair,
    pub timeframe: Timeframe,
    /// Bucket open time in Unix milliseconds.
    pub open_time_ms: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    /// Traded volume in the bucket.
    pub volume: f64,
}

impl Candle {
    pub fn from_row(pair: Pair, timeframe: Timeframe, row: CandleRow) -> Self {
        let (open_time_ms, open, high, low, close, volume) = row;
        Self {
            pair,
            timeframe,
            open_time_ms,
            open,
            high,
            low,
            close,
            volume,
        }
    }

    /// Percentage change from open to close: (close - open) / open * 100.
    /// Returns 0 for a zero open price.
    pub fn change_pct(&self) -> f64 {
        if self.open == 0.0 {
            return 0.0;
        }
        (self.close - self.open) / self.open * 100.0
    }

    /// True when the close is at or above the open.
    #[inline]
    pub fn is_up(&self) -> bool {
        self.change_pct() >= 0.0
    }

    /// Bucket end time in Unix milliseconds.
    #[inline]
    pub fn close_time_ms(&self) -> i64 {
        self.open_time_ms + self.timeframe.duration_ms()
    }

    /// Whether the bucket has fully elapsed at `now_ms`.
    #[inline]
    pub fn is_closed_at(&self, now_ms: i64) -> bool {
        self.close_time_ms() <= now_ms
    }

    /// Bucket open time as a UTC datetime.
    pub fn open_time(&self) -> DateTime<Utc> {
        Utc.timestamp_millis_opt(self.open_time_ms)
            .single()
            .unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candle(open: f64, close: f64) -> Candle {
        Candle::from_row(
            Pair::spot("BTC", "USDT"),
            Timeframe::M15,
            (1_700_000_100_000, open, open.max(close) + 1.0, open.min(close) - 1.0, close, 10.0),
        )
    }

    #[test]
    fn test_change_pct() {
        assert!((candle(100.0, 102.0).change_pct() - 2.0).abs() < 1e-9);
        assert!((candle(100.0, 98.5).change_pct() + 1.5).abs() < 1e-9);
        assert_eq!(candle(0.0, 5.0).change_pct(), 0.0);
    }

    #[test]
    fn test_direction() {
        assert!(candle(100.0, 102.0).is_up());
        assert!(candle(100.0, 100.0).is_up());
        assert!(!candle(100.0, 99.0).is_up());
    }

    #[test]
    fn test_closed_at() {
        let c = candle(100.0, 101.0);
        let close = c.open_time_ms + 900_000;
        assert_eq!(c.close_time_ms(), close);
        assert!(!c.is_closed_at(close - 1));
        assert!(c.is_closed_at(close));
        assert!(c.is_closed_at(close + 1));
    }

    #[test]
    fn test_open_time() {
        let c = candle(100.0, 101.0);
        assert_eq!(c.open_time().timestamp_millis(), 1_700_000_100_000);
    }
}
