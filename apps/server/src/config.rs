//! Application configuration.

use candlewatch_core::{Pair, Timeframe};
use candlewatch_engine::{SignificanceConfig, SuppressorConfig, WatchKey};
use candlewatch_feeds::BybitCredentials;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Upper bound for every interval setting, in seconds.
pub const MAX_INTERVAL_SECS: u64 = 7 * 24 * 60 * 60;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("Invalid config file: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("Missing environment variable {0}")]
    MissingEnv(&'static str),
    #[error("Invalid environment variable {name}: {value}")]
    InvalidEnv { name: &'static str, value: String },
    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// A watched symbol and its menu label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymbolEntry {
    pub name: String,
    pub pair: Pair,
}

impl SymbolEntry {
    pub fn new(name: &str, pair: Pair) -> Self {
        Self {
            name: name.to_string(),
            pair,
        }
    }
}

/// Symbols polled on one timeframe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WatchGroup {
    pub name: String,
    pub timeframe: Timeframe,
    pub symbols: Vec<SymbolEntry>,
}

/// Application configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub groups: Vec<WatchGroup>,
    /// Minimum absolute candle change in percent.
    pub min_percent_change: f64,
    /// Sleep between poll sweeps.
    pub check_interval_secs: u64,
    /// Window in which a similar alert is suppressed.
    pub min_message_interval_secs: u64,
    /// Delay between symbols within a sweep.
    pub symbol_delay_secs: u64,
    /// Sleep after a failed sweep.
    pub recovery_delay_secs: u64,
    pub request_timeout_secs: u64,
    /// Edit the previous alert for a symbol instead of posting a new one.
    pub update_in_place: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        let symbols = ["SUI", "ETH", "BNB", "SOL", "SEI", "ADA", "JUP"]
            .iter()
            .map(|base| SymbolEntry::new(base, Pair::perpetual(base, "USDT", "USDT")))
            .collect();

        Self {
            groups: vec![WatchGroup {
                name: "Perpetuals".to_string(),
                timeframe: Timeframe::M15,
                symbols,
            }],
            min_percent_change: 1.67,
            check_interval_secs: 60,
            min_message_interval_secs: 300,
            symbol_delay_secs: 2,
            recovery_delay_secs: 60,
            request_timeout_secs: 30,
            update_in_place: true,
        }
    }
}

impl AppConfig {
    /// Load from a JSON file. Missing fields take their defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Ok(serde_json::from_str(&raw)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.min_percent_change > 0.0 && self.min_percent_change.is_finite()) {
            return Err(ConfigError::Invalid(format!(
                "min_percent_change must be positive, got {}",
                self.min_percent_change
            )));
        }
        if self.groups.iter().all(|g| g.symbols.is_empty()) {
            return Err(ConfigError::Invalid("no symbols configured".to_string()));
        }
        if self.check_interval_secs == 0 {
            return Err(ConfigError::Invalid(
                "check_interval_secs must be at least 1".to_string(),
            ));
        }
        for (name, secs) in [
            ("check_interval_secs", self.check_interval_secs),
            ("min_message_interval_secs", self.min_message_interval_secs),
            ("symbol_delay_secs", self.symbol_delay_secs),
            ("recovery_delay_secs", self.recovery_delay_secs),
            ("request_timeout_secs", self.request_timeout_secs),
        ] {
            if secs > MAX_INTERVAL_SECS {
                return Err(ConfigError::Invalid(format!(
                    "{} must be at most {}, got {}",
                    name, MAX_INTERVAL_SECS, secs
                )));
            }
        }

        let mut seen = HashSet::new();
        for (group, symbol) in self.symbols() {
            let key = WatchKey::new(symbol.pair.clone(), group.timeframe);
            if !seen.insert(key.clone()) {
                return Err(ConfigError::Invalid(format!("{} is listed twice", key)));
            }
        }
        Ok(())
    }

    /// Every watched symbol with the group it belongs to, in config order.
    pub fn symbols(&self) -> impl Iterator<Item = (&WatchGroup, &SymbolEntry)> {
        self.groups
            .iter()
            .flat_map(|group| group.symbols.iter().map(move |symbol| (group, symbol)))
    }

    pub fn watch_keys(&self) -> Vec<WatchKey> {
        self.symbols()
            .map(|(group, symbol)| WatchKey::new(symbol.pair.clone(), group.timeframe))
            .collect()
    }

    /// Distinct timeframes in config order.
    pub fn timeframes(&self) -> Vec<Timeframe> {
        let mut timeframes = Vec::new();
        for group in &self.groups {
            if !timeframes.contains(&group.timeframe) {
                timeframes.push(group.timeframe);
            }
        }
        timeframes
    }

    pub fn check_interval(&self) -> Duration {
        Duration::from_secs(self.check_interval_secs)
    }

    pub fn symbol_delay(&self) -> Duration {
        Duration::from_secs(self.symbol_delay_secs)
    }

    pub fn recovery_delay(&self) -> Duration {
        Duration::from_secs(self.recovery_delay_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl From<&AppConfig> for SignificanceConfig {
    fn from(config: &AppConfig) -> Self {
        SignificanceConfig {
            min_percent_change: config.min_percent_change,
        }
    }
}

impl From<&AppConfig> for SuppressorConfig {
    fn from(config: &AppConfig) -> Self {
        SuppressorConfig {
            min_interval_secs: config.min_message_interval_secs,
            ..Default::default()
        }
    }
}

/// Credentials read from the environment.
#[derive(Clone)]
pub struct Secrets {
    pub telegram_token: String,
    pub chat_id: i64,
    pub bybit: Option<BybitCredentials>,
}

impl std::fmt::Debug for Secrets {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Secrets")
            .field("telegram_token", &"***")
            .field("chat_id", &self.chat_id)
            .field("bybit", &self.bybit)
            .finish()
    }
}

impl Secrets {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let required = |name: &'static str| {
            lookup(name)
                .filter(|v| !v.trim().is_empty())
                .ok_or(ConfigError::MissingEnv(name))
        };

        let telegram_token = required("TELEGRAM_BOT_TOKEN")?;
        let raw_chat_id = required("TELEGRAM_CHAT_ID")?;
        let chat_id = raw_chat_id
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidEnv {
                name: "TELEGRAM_CHAT_ID",
                value: raw_chat_id.clone(),
            })?;

        let bybit =
            BybitCredentials::from_parts(lookup("BYBIT_API_KEY"), lookup("BYBIT_API_SECRET"));

        Ok(Self {
            telegram_token: telegram_token.trim().to_string(),
            chat_id,
            bybit,
        })
    }
}
