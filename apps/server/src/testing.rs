//! In-memory exchange and chat fakes for server tests.

use crate::config::{AppConfig, SymbolEntry, WatchGroup};
use crate::context::{AppContext, SharedContext};
use async_trait::async_trait;
use candlewatch_alerts::{ChatTransport, InlineKeyboard, TransportError};
use candlewatch_core::{Candle, Pair, Timeframe};
use candlewatch_engine::MessageRef;
use candlewatch_feeds::{CandleSource, FeedError, FeedResult};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::{Arc, Mutex};

pub const CHAT_ID: i64 = -100;
pub const T0: i64 = 1_700_000_100_000;
pub const FIFTEEN_MIN: i64 = 900_000;

#[derive(Default)]
pub struct FakeSource {
    candles: Mutex<HashMap<Pair, Vec<Candle>>>,
    failing: Mutex<HashSet<Pair>>,
    rate_limited: Mutex<HashSet<Pair>>,
}

impl FakeSource {
    pub fn set_candles(&self, pair: &Pair, candles: Vec<Candle>) {
        self.candles.lock().unwrap().insert(pair.clone(), candles);
    }

    pub fn set_failing(&self, pair: &Pair, failing: bool) {
        let mut set = self.failing.lock().unwrap();
        if failing {
            set.insert(pair.clone());
        } else {
            set.remove(pair);
        }
    }

    pub fn set_rate_limited(&self, pair: &Pair, limited: bool) {
        let mut set = self.rate_limited.lock().unwrap();
        if limited {
            set.insert(pair.clone());
        } else {
            set.remove(pair);
        }
    }
}

#[async_trait]
impl CandleSource for FakeSource {
    async fn fetch_recent_candles(
        &self,
        pair: &Pair,
        _timeframe: Timeframe,
        limit: usize,
    ) -> FeedResult<Vec<Candle>> {
        if self.failing.lock().unwrap().contains(pair) {
            return Err(FeedError::ConnectionFailed("exchange unreachable".into()));
        }
        if self.rate_limited.lock().unwrap().contains(pair) {
            return Err(FeedError::RateLimitExceeded);
        }
        let candles = self.candles.lock().unwrap();
        let series = candles.get(pair).cloned().unwrap_or_default();
        let skip = series.len().saturating_sub(limit);
        Ok(series[skip..].to_vec())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Sent {
    Message {
        chat_id: i64,
        text: String,
        keyboard: Option<InlineKeyboard>,
    },
    Edit {
        target: MessageRef,
        text: String,
    },
}

impl Sent {
    pub fn text(&self) -> &str {
        match self {
            Sent::Message { text, .. } | Sent::Edit { text, .. } => text,
        }
    }
}

#[derive(Default)]
pub struct FakeTransport {
    sent: Mutex<Vec<Sent>>,
    next_id: AtomicI32,
}

impl FakeTransport {
    pub fn sent(&self) -> Vec<Sent> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChatTransport for FakeTransport {
    async fn send_message(
        &self,
        chat_id: i64,
        text: &str,
        keyboard: Option<&InlineKeyboard>,
    ) -> Result<i32, TransportError> {
        self.sent.lock().unwrap().push(Sent::Message {
            chat_id,
            text: text.to_string(),
            keyboard: keyboard.cloned(),
        });
        Ok(self.next_id.fetch_add(1, Ordering::Relaxed) + 1)
    }

    async fn edit_message(
        &self,
        target: MessageRef,
        text: &str,
        _keyboard: Option<&InlineKeyboard>,
    ) -> Result<(), TransportError> {
        self.sent.lock().unwrap().push(Sent::Edit {
            target,
            text: text.to_string(),
        });
        Ok(())
    }
}

pub fn perp(base: &str) -> Pair {
    Pair::perpetual(base, "USDT", "USDT")
}

pub fn candle(pair: &Pair, open_time_ms: i64, open: f64, close: f64, volume: f64) -> Candle {
    let high = open.max(close) * 1.001;
    let low = open.min(close) * 0.999;
    Candle::from_row(
        pair.clone(),
        Timeframe::M15,
        (open_time_ms, open, high, low, close, volume),
    )
}

/// Closed candle at `open_time_ms` followed by a forming one.
pub fn series(pair: &Pair, open_time_ms: i64, open: f64, close: f64, volume: f64) -> Vec<Candle> {
    vec![
        candle(pair, open_time_ms, open, close, volume),
        candle(pair, open_time_ms + FIFTEEN_MIN, close, close, 1.0),
    ]
}

/// 15m config over `bases` with no delays.
pub fn test_config(bases: &[&str]) -> AppConfig {
    AppConfig {
        groups: vec![WatchGroup {
            name: "Test".to_string(),
            timeframe: Timeframe::M15,
            symbols: bases
                .iter()
                .map(|base| SymbolEntry::new(base, perp(base)))
                .collect(),
        }],
        symbol_delay_secs: 0,
        ..AppConfig::default()
    }
}

pub struct Harness {
    pub ctx: SharedContext,
    pub source: Arc<FakeSource>,
    pub transport: Arc<FakeTransport>,
}

pub fn harness(config: AppConfig) -> Harness {
    let source = Arc::new(FakeSource::default());
    let transport = Arc::new(FakeTransport::default());
    let ctx = AppContext::new(config, CHAT_ID, source.clone(), transport.clone()).shared();
    Harness {
        ctx,
        source,
        transport,
    }
}
