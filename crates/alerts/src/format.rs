//! Message text rendering. All messages are Telegram HTML.

use candlewatch_core::{Candle, Pair, Timeframe};
use chrono::{DateTime, Utc};

const UP: &str = "🟢";
const DOWN: &str = "🔴";

/// Format a timestamp as `YYYY-MM-DD HH:MM UTC`.
pub fn format_time(time: DateTime<Utc>) -> String {
    time.format("%Y-%m-%d %H:%M UTC").to_string()
}

/// Format an alert for a significant candle.
pub fn format_alert_message(candle: &Candle) -> String {
    let direction = if candle.is_up() { UP } else { DOWN };
    format!(
        "<b>{} {} {:.2}%</b>\n\
         ┌ Time: <i>{}</i> ({})\n\
         ├ Price: <b>{:.4}</b>\n\
         ├ Volume: {:.2} {}\n\
         └ Range: {:.4}-{:.4}",
        direction,
        candle.pair.base,
        candle.change_pct().abs(),
        format_time(candle.open_time()),
        candle.timeframe,
        candle.close,
        candle.volume,
        candle.pair.base,
        candle.low,
        candle.high,
    )
}

/// Reply when a requested symbol has no recorded significant candle.
pub fn format_no_candle(pair: &Pair, threshold: f64) -> String {
    format!("❌ No candles >{:.2}% for {}", threshold, pair.base)
}

pub fn format_menu_prompt(threshold: f64) -> String {
    format!(
        "📊 Choose a pair to request the latest large candle (>{:.2}%):",
        threshold
    )
}

/// Startup announcement listing the watched timeframes.
pub fn format_startup(timeframes: &[Timeframe], threshold: f64) -> String {
    let tfs = timeframes
        .iter()
        .map(|tf| tf.as_str())
        .collect::<Vec<_>>()
        .join(", ");
    format!("🔔 Bot activated | TF: {} | >{:.2}%", tfs, threshold)
}

pub fn format_help(threshold: f64) -> String {
    format!(
        "<b>Candle alerts</b>\n\n\
         Closed candles moving more than {:.2}% are posted here automatically.\n\n\
         /menu - pick a pair to see its latest large candle\n\
         /help - show this message",
        threshold
    )
}
