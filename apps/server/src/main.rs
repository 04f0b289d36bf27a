//! Candle Watch - Telegram alert bot
//!
//! Polls Bybit for closed candles on watched pairs and posts the large ones
//! to a Telegram channel. Users can request the latest large candle for any
//! watched pair from an inline menu.

mod config;
mod context;
mod handler;
mod poll;
#[cfg(test)]
mod testing;

use candlewatch_alerts::{format_startup, ChatTransport, LoggingTransport, TelegramBot};
use candlewatch_feeds::{BybitClientConfig, BybitRestClient, FeedError};
use clap::Parser;
use config::{AppConfig, ConfigError, Secrets};
use context::AppContext;
use handler::InteractiveHandler;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Candle Watch CLI
#[derive(Parser, Debug)]
#[command(name = "candle-watch")]
#[command(about = "Telegram alerts for large crypto candles", long_about = None)]
struct Args {
    /// Configuration file path (JSON)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log level: trace, debug, info, warn, error
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Minimum candle change in percent
    #[arg(short = 'p', long)]
    min_change: Option<f64>,

    /// Seconds between poll sweeps
    #[arg(short, long)]
    interval: Option<u64>,

    /// Log alerts instead of sending them
    #[arg(long, default_value_t = false)]
    dry_run: bool,
}

#[derive(Error, Debug)]
enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("Exchange client error: {0}")]
    Feed(#[from] FeedError),
}

fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.to_lowercase()));

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
    }
}

/// Load the config file (or defaults) and apply CLI overrides.
fn build_config(args: &Args) -> Result<AppConfig, ConfigError> {
    let mut config = match &args.config {
        Some(path) => AppConfig::load(path)?,
        None => AppConfig::default(),
    };
    if let Some(min_change) = args.min_change {
        config.min_percent_change = min_change;
    }
    if let Some(interval) = args.interval {
        config.check_interval_secs = interval;
    }
    config.validate()?;
    Ok(config)
}

async fn run(args: Args) -> Result<(), AppError> {
    let config = build_config(&args)?;

    let secrets = match Secrets::from_env() {
        Ok(secrets) => Some(secrets),
        Err(e) if args.dry_run => {
            warn!(error = %e, "Telegram settings missing, continuing in dry-run mode");
            None
        }
        Err(e) => return Err(e.into()),
    };
    let chat_id = secrets.as_ref().map(|s| s.chat_id).unwrap_or_default();

    let client = BybitRestClient::new(BybitClientConfig {
        timeout: config.request_timeout(),
        credentials: secrets.as_ref().and_then(|s| s.bybit.clone()),
        ..Default::default()
    })?;
    info!("  Exchange: Bybit (signed requests: {})", client.has_credentials());

    let bot = match &secrets {
        Some(secrets) if !args.dry_run => Some(Arc::new(TelegramBot::new(&secrets.telegram_token))),
        _ => None,
    };
    let transport: Arc<dyn ChatTransport> = match &bot {
        Some(bot) => bot.clone() as Arc<dyn ChatTransport>,
        None => Arc::new(LoggingTransport::new()),
    };

    let timeframes = config.timeframes();
    let ctx = AppContext::new(config, chat_id, Arc::new(client), transport).shared();

    let banner = format_startup(&timeframes, ctx.threshold());
    if let Err(e) = ctx.transport().send_message(chat_id, &banner, None).await {
        error!(chat_id, error = %e, "Failed to send startup message");
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let poll_ctx = Arc::clone(&ctx);
    let poll_handle = tokio::spawn(async move {
        poll::run_poll_loop(poll_ctx, shutdown_rx).await;
    });

    match bot {
        Some(bot) => {
            let handler = Arc::new(InteractiveHandler::new(Arc::clone(&ctx)));
            bot.run(handler).await;
        }
        None => {
            info!("Press Ctrl+C to stop...");
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!(error = %e, "Failed to listen for Ctrl+C");
            }
        }
    }

    warn!("Shutdown signal received");
    let _ = shutdown_tx.send(true);
    if tokio::time::timeout(Duration::from_secs(5), poll_handle)
        .await
        .is_err()
    {
        warn!("Poll loop did not stop in time");
    }

    let summary = ctx.stats.summary();
    info!("📈 Final Stats:");
    info!("  Total uptime: {} seconds", summary.uptime_secs);
    info!("  Poll cycles: {}", summary.cycles);
    info!("  Alerts sent: {}", summary.alerts_sent);
    info!("  Alerts suppressed: {}", summary.alerts_suppressed);
    info!("  Fetch errors: {}", summary.fetch_errors);

    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    let args = Args::parse();

    init_logging(&args.log_level);

    info!("🚀 Candle Watch starting...");
    match &args.config {
        Some(path) => info!("  Config: {}", path.display()),
        None => info!("  Config: built-in defaults"),
    }
    info!("  Dry Run: {}", args.dry_run);

    match run(args).await {
        Ok(()) => {
            info!("👋 Candle Watch stopped");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error = %e, "Startup failed");
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn args(extra: &[&str]) -> Args {
        let mut argv = vec!["candle-watch"];
        argv.extend_from_slice(extra);
        Args::parse_from(argv)
    }

    #[test]
    fn test_cli_defaults() {
        let args = args(&[]);
        assert_eq!(args.log_level, "info");
        assert!(!args.dry_run);
        assert!(args.config.is_none());
    }

    #[test]
    fn test_cli_overrides_config() {
        let config = build_config(&args(&["--min-change", "2.5", "--interval", "30"])).unwrap();
        assert_eq!(config.min_percent_change, 2.5);
        assert_eq!(config.check_interval_secs, 30);
    }

    #[test]
    fn test_invalid_override_rejected() {
        assert!(build_config(&args(&["--min-change", "0"])).is_err());
    }

    #[test]
    fn test_missing_config_file_is_error() {
        let result = build_config(&args(&["--config", "/nonexistent/candle-watch.json"]));
        assert!(matches!(result, Err(ConfigError::Read { .. })));
    }
}
