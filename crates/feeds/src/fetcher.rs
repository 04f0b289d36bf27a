//! Last-closed-candle extraction.
//!
//! The newest candle an exchange returns is usually still forming, so the
//! fetcher asks for two and takes the one before last. Exchange clocks can
//! disagree with ours; the closed check uses local time corrected by the
//! last measured server offset.

use crate::error::FeedResult;
use crate::source::CandleSource;
use candlewatch_core::{Candle, Pair, Timeframe};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

/// Number of candles requested per lookup.
pub const CANDLES_PER_FETCH: usize = 2;

/// Wraps a [`CandleSource`] and yields the most recent closed candle.
pub struct CandleFetcher {
    source: Arc<dyn CandleSource>,
    /// Server time minus local time, in milliseconds.
    clock_offset_ms: AtomicI64,
}

impl CandleFetcher {
    pub fn new(source: Arc<dyn CandleSource>) -> Self {
        Self {
            source,
            clock_offset_ms: AtomicI64::new(0),
        }
    }

    pub fn clock_offset_ms(&self) -> i64 {
        self.clock_offset_ms.load(Ordering::Relaxed)
    }

    /// Current time in Unix milliseconds, adjusted to the exchange clock.
    pub fn now_ms(&self) -> i64 {
        chrono::Utc::now().timestamp_millis() + self.clock_offset_ms()
    }

    /// Measure the exchange clock offset. Keeps the previous offset if the
    /// source has no clock or the request fails.
    pub async fn sync_clock(&self) -> FeedResult<i64> {
        let before = chrono::Utc::now().timestamp_millis();
        let server = self.source.server_time_ms().await;
        let after = chrono::Utc::now().timestamp_millis();

        match server {
            Ok(Some(server_ms)) => {
                let offset = server_ms - (before + after) / 2;
                self.clock_offset_ms.store(offset, Ordering::Relaxed);
                debug!(offset_ms = offset, "Exchange clock synced");
                Ok(offset)
            }
            Ok(None) => Ok(self.clock_offset_ms()),
            Err(e) => {
                warn!(error = %e, "Exchange clock sync failed, keeping previous offset");
                Err(e)
            }
        }
    }

    /// The most recent closed candle for a series, or None if the exchange
    /// returned too little data or the candidate has not closed yet.
    pub async fn last_closed_candle(
        &self,
        pair: &Pair,
        timeframe: Timeframe,
    ) -> FeedResult<Option<Candle>> {
        let candles = self
            .source
            .fetch_recent_candles(pair, timeframe, CANDLES_PER_FETCH)
            .await?;
        Ok(Self::select_closed(candles, self.now_ms()))
    }

    /// Pick the second-to-last candle if it has closed by `now_ms`.
    pub fn select_closed(mut candles: Vec<Candle>, now_ms: i64) -> Option<Candle> {
        if candles.len() < CANDLES_PER_FETCH {
            debug!("Not enough candles: got {}", candles.len());
            return None;
        }

        let candle = candles.swap_remove(candles.len() - 2);
        if !candle.is_closed_at(now_ms) {
            debug!(
                pair = %candle.pair,
                open_time_ms = candle.open_time_ms,
                now_ms,
                "Candle has not closed yet"
            );
            return None;
        }

        Some(candle)
    }
}
