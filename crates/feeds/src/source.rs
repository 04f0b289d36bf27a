//! Exchange collaborator contract.

use crate::FeedResult;
use async_trait::async_trait;
use candlewatch_core::{Candle, Pair, Timeframe};

/// Anything that can deliver recent candles for a pair.
#[async_trait]
pub trait CandleSource: Send + Sync {
    /// Fetch up to `limit` most recent candles, ordered by open time ascending.
    /// Returning fewer than requested is not an error.
    async fn fetch_recent_candles(
        &self,
        pair: &Pair,
        timeframe: Timeframe,
        limit: usize,
    ) -> FeedResult<Vec<Candle>>;

    /// Exchange server time in Unix milliseconds, if the source exposes it.
    async fn server_time_ms(&self) -> FeedResult<Option<i64>> {
        Ok(None)
    }
}
