//! Application context shared by the poll loop and the bot handler.

use crate::config::AppConfig;
use candlewatch_alerts::{build_keyboard, ChatTransport, InlineKeyboard, MenuEntry, Notifier};
use candlewatch_core::Candle;
use candlewatch_engine::{
    DuplicateSuppressor, SharedWatchState, SignificanceFilter, WatchKey, WatchState,
};
use candlewatch_feeds::{CandleFetcher, CandleSource, FeedResult};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Counters for the running bot.
#[derive(Debug, Default)]
pub struct BotStats {
    pub cycles: AtomicU64,
    pub alerts_sent: AtomicU64,
    pub alerts_suppressed: AtomicU64,
    pub fetch_errors: AtomicU64,
    started_at_ms: AtomicU64,
}

impl BotStats {
    pub fn new() -> Self {
        let now = chrono::Utc::now().timestamp_millis().max(0) as u64;
        Self {
            started_at_ms: AtomicU64::new(now),
            ..Default::default()
        }
    }

    pub fn record_cycle(&self) {
        self.cycles.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_alert(&self) {
        self.alerts_sent.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_suppressed(&self) {
        self.alerts_suppressed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_fetch_error(&self) {
        self.fetch_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn uptime_secs(&self) -> u64 {
        let now = chrono::Utc::now().timestamp_millis().max(0) as u64;
        now.saturating_sub(self.started_at_ms.load(Ordering::Relaxed)) / 1000
    }

    pub fn summary(&self) -> StatsSummary {
        StatsSummary {
            cycles: self.cycles.load(Ordering::Relaxed),
            alerts_sent: self.alerts_sent.load(Ordering::Relaxed),
            alerts_suppressed: self.alerts_suppressed.load(Ordering::Relaxed),
            fetch_errors: self.fetch_errors.load(Ordering::Relaxed),
            uptime_secs: self.uptime_secs(),
        }
    }
}

/// Summary of statistics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatsSummary {
    pub cycles: u64,
    pub alerts_sent: u64,
    pub alerts_suppressed: u64,
    pub fetch_errors: u64,
    pub uptime_secs: u64,
}

/// Everything the poll loop and the interactive handler need.
pub struct AppContext {
    pub config: AppConfig,
    /// Channel that receives automatic alerts.
    pub chat_id: i64,
    pub fetcher: CandleFetcher,
    pub filter: SignificanceFilter,
    pub suppressor: DuplicateSuppressor,
    pub notifier: Notifier,
    pub state: SharedWatchState,
    pub menu: Vec<MenuEntry>,
    pub stats: BotStats,
}

pub type SharedContext = Arc<AppContext>;

impl AppContext {
    pub fn new(
        config: AppConfig,
        chat_id: i64,
        source: Arc<dyn CandleSource>,
        transport: Arc<dyn ChatTransport>,
    ) -> Self {
        let state = WatchState::shared();
        let menu = menu_entries(&config);
        let notifier = Notifier::new(transport, state.clone(), build_keyboard(&menu));

        Self {
            chat_id,
            fetcher: CandleFetcher::new(source),
            filter: SignificanceFilter::new((&config).into()),
            suppressor: DuplicateSuppressor::new((&config).into()),
            notifier,
            state,
            menu,
            stats: BotStats::new(),
            config,
        }
    }

    pub fn shared(self) -> SharedContext {
        Arc::new(self)
    }

    pub fn threshold(&self) -> f64 {
        self.filter.threshold()
    }

    pub fn keyboard(&self) -> &InlineKeyboard {
        self.notifier.keyboard()
    }

    pub fn transport(&self) -> &Arc<dyn ChatTransport> {
        self.notifier.transport()
    }

    /// Fetch the last closed candle for `key` and run it through the
    /// significance filter. The state lock is held only for the filter step.
    pub async fn latest_significant(&self, key: &WatchKey) -> FeedResult<Option<Candle>> {
        let Some(candle) = self.fetcher.last_closed_candle(&key.pair, key.timeframe).await? else {
            return Ok(None);
        };
        let mut state = self.state.lock().await;
        Ok(self.filter.screen(candle, &mut state))
    }
}

/// Menu entries for every watched symbol. Labels carry the timeframe when
/// more than one timeframe is watched.
pub fn menu_entries(config: &AppConfig) -> Vec<MenuEntry> {
    let multi_timeframe = config.timeframes().len() > 1;
    config
        .symbols()
        .map(|(group, symbol)| {
            let label = if multi_timeframe {
                format!("{} {}", symbol.name, group.timeframe)
            } else {
                symbol.name.clone()
            };
            MenuEntry::new(label, WatchKey::new(symbol.pair.clone(), group.timeframe))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{SymbolEntry, WatchGroup};
    use candlewatch_core::{Pair, Timeframe};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_menu_labels_single_timeframe() {
        let labels: Vec<String> = menu_entries(&AppConfig::default())
            .into_iter()
            .map(|e| e.label)
            .collect();
        assert_eq!(labels, vec!["SUI", "ETH", "BNB", "SOL", "SEI", "ADA", "JUP"]);
    }

    #[test]
    fn test_menu_labels_multiple_timeframes() {
        let mut config = AppConfig::default();
        config.groups.push(WatchGroup {
            name: "Majors".to_string(),
            timeframe: Timeframe::H1,
            symbols: vec![SymbolEntry::new("BTC", Pair::spot("BTC", "USDT"))],
        });
        let entries = menu_entries(&config);
        assert_eq!(entries[0].label, "SUI 15m");
        assert_eq!(entries.last().unwrap().label, "BTC 1h");
        assert_eq!(
            entries.last().unwrap().key,
            WatchKey::new(Pair::spot("BTC", "USDT"), Timeframe::H1)
        );
    }

    #[test]
    fn test_stats_summary() {
        let stats = BotStats::new();
        stats.record_cycle();
        stats.record_alert();
        stats.record_alert();
        stats.record_suppressed();
        let summary = stats.summary();
        assert_eq!(summary.cycles, 1);
        assert_eq!(summary.alerts_sent, 2);
        assert_eq!(summary.alerts_suppressed, 1);
        assert_eq!(summary.fetch_errors, 0);
    }
}
