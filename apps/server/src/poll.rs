//! Background polling of watched symbols.

use crate::context::{AppContext, SharedContext};
use candlewatch_alerts::Delivery;
use candlewatch_engine::WatchKey;
use candlewatch_feeds::FeedError;
use chrono::Utc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

#[derive(Error, Debug)]
pub enum PollError {
    #[error("All {attempted} symbol fetches failed, last error: {last}")]
    ExchangeUnavailable { attempted: usize, last: FeedError },
}

/// What happened to one symbol in a sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolOutcome {
    /// Nothing new or nothing significant.
    Quiet,
    Suppressed,
    Notified(Delivery),
}

/// Run sweeps until `shutdown` flips to true or its sender is dropped.
pub async fn run_poll_loop(ctx: SharedContext, mut shutdown: watch::Receiver<bool>) {
    info!(
        symbols = ctx.menu.len(),
        interval_secs = ctx.config.check_interval_secs,
        threshold = ctx.threshold(),
        "Starting poll loop"
    );

    loop {
        let pause = match run_cycle(&ctx, &mut shutdown).await {
            Ok(()) => ctx.config.check_interval(),
            Err(e) => {
                error!(error = %e, "Poll cycle failed");
                ctx.config.recovery_delay()
            }
        };

        if wait_or_shutdown(&mut shutdown, pause).await {
            break;
        }
    }

    info!("Poll loop stopped");
}

/// One sweep over every watched symbol.
///
/// Per-symbol failures are logged and skipped. A rate-limited fetch stretches
/// the pause before the next symbol to the exchange's retry delay. The sweep
/// fails only when every fetch failed.
pub async fn run_cycle(
    ctx: &AppContext,
    shutdown: &mut watch::Receiver<bool>,
) -> Result<(), PollError> {
    ctx.stats.record_cycle();
    // Failure is logged inside and the previous offset stays in use.
    let _ = ctx.fetcher.sync_clock().await;

    let keys = ctx.config.watch_keys();
    let mut failures = 0;
    let mut last_error = None;
    let mut pause = Duration::ZERO;

    for key in &keys {
        if wait_or_shutdown(shutdown, pause).await {
            debug!("Shutdown requested mid-sweep");
            return Ok(());
        }
        pause = ctx.config.symbol_delay();

        match process_symbol(ctx, key).await {
            Ok(outcome) => debug!(symbol = %key, ?outcome, "Symbol checked"),
            Err(e) => {
                ctx.stats.record_fetch_error();
                if e.is_permanent() {
                    error!(symbol = %key, error = %e, "Exchange rejected credentials");
                } else {
                    warn!(
                        symbol = %key,
                        error = %e,
                        transient = e.is_transient(),
                        "Failed to fetch candles"
                    );
                }
                if let (FeedError::RateLimitExceeded, Some(retry_after)) =
                    (&e, e.suggested_retry_delay())
                {
                    warn!(
                        backoff_secs = retry_after.as_secs(),
                        "Rate limited, backing off before next symbol"
                    );
                    pause = pause.max(retry_after);
                }
                failures += 1;
                last_error = Some(e);
            }
        }
    }

    match last_error {
        Some(last) if failures == keys.len() => Err(PollError::ExchangeUnavailable {
            attempted: failures,
            last,
        }),
        _ => Ok(()),
    }
}

/// Fetch, screen, de-duplicate and announce one symbol.
pub async fn process_symbol(ctx: &AppContext, key: &WatchKey) -> Result<SymbolOutcome, FeedError> {
    let Some(candle) = ctx.latest_significant(key).await? else {
        return Ok(SymbolOutcome::Quiet);
    };

    let suppress = {
        let state = ctx.state.lock().await;
        ctx.suppressor
            .should_suppress(&candle, state.last_notified(key), Utc::now())
    };
    if suppress {
        ctx.stats.record_suppressed();
        info!(
            symbol = %key,
            change_pct = candle.change_pct(),
            "Similar alert sent recently, suppressing"
        );
        return Ok(SymbolOutcome::Suppressed);
    }

    let delivery = ctx
        .notifier
        .notify(ctx.chat_id, &candle, ctx.config.update_in_place)
        .await;
    if delivery != Delivery::Failed {
        ctx.stats.record_alert();
    }
    Ok(SymbolOutcome::Notified(delivery))
}

/// Sleep for `pause`, returning early with true on shutdown.
async fn wait_or_shutdown(shutdown: &mut watch::Receiver<bool>, pause: Duration) -> bool {
    if *shutdown.borrow() {
        return true;
    }
    if pause.is_zero() {
        return false;
    }
    tokio::select! {
        _ = tokio::time::sleep(pause) => false,
        changed = shutdown.changed() => changed.is_err() || *shutdown.borrow(),
    }
}
