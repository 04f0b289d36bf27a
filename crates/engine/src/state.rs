//! Per-symbol watch state.
//!
//! Lives for the whole process and is never persisted. The poll loop and the
//! interactive bot handler share one instance through [`SharedWatchState`].

use candlewatch_core::{Candle, Pair, Timeframe};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Identifies one watched candle series.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WatchKey {
    pub pair: Pair,
    pub timeframe: Timeframe,
}

impl WatchKey {
    pub fn new(pair: Pair, timeframe: Timeframe) -> Self {
        Self { pair, timeframe }
    }

    pub fn of(candle: &Candle) -> Self {
        Self::new(candle.pair.clone(), candle.timeframe)
    }
}

impl fmt::Display for WatchKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.pair, self.timeframe)
    }
}

/// Location of a message already delivered to a chat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MessageRef {
    pub chat_id: i64,
    pub message_id: i32,
}

/// The last notification sent for a symbol.
#[derive(Debug, Clone, PartialEq)]
pub struct NotificationRecord {
    pub candle: Candle,
    pub notified_at: DateTime<Utc>,
    /// None when delivery failed or the message id is unknown.
    pub message: Option<MessageRef>,
}

/// State tracked for one watched series.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SymbolWatch {
    /// Open time of the newest candle already screened.
    pub last_processed_ms: Option<i64>,
    pub last_notified: Option<NotificationRecord>,
}

/// Mapping of watched series to their state.
#[derive(Debug, Default)]
pub struct WatchState {
    symbols: HashMap<WatchKey, SymbolWatch>,
}

/// Watch state shared between tasks.
pub type SharedWatchState = Arc<Mutex<WatchState>>;

impl WatchState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap a fresh state for sharing between tasks.
    pub fn shared() -> SharedWatchState {
        Arc::new(Mutex::new(Self::new()))
    }

    pub fn last_processed(&self, key: &WatchKey) -> Option<i64> {
        self.symbols.get(key).and_then(|w| w.last_processed_ms)
    }

    pub fn last_notified(&self, key: &WatchKey) -> Option<&NotificationRecord> {
        self.symbols.get(key).and_then(|w| w.last_notified.as_ref())
    }

    /// Advance the last-processed timestamp. Returns false (and leaves the
    /// state untouched) if `open_time_ms` is not newer than the current one.
    pub fn mark_processed(&mut self, key: &WatchKey, open_time_ms: i64) -> bool {
        let watch = self.symbols.entry(key.clone()).or_default();
        match watch.last_processed_ms {
            Some(last) if open_time_ms <= last => false,
            _ => {
                watch.last_processed_ms = Some(open_time_ms);
                true
            }
        }
    }

    /// Replace the notification record for a symbol.
    pub fn record_notification(&mut self, key: &WatchKey, record: NotificationRecord) {
        self.symbols.entry(key.clone()).or_default().last_notified = Some(record);
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }
}
