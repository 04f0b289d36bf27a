//! Trading pair identifiers in unified `BASE/QUOTE[:SETTLE]` notation.

use crate::CoreError;
use compact_str::CompactString;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Market segment a pair trades in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MarketKind {
    /// Spot market (`BTC/USDT`).
    Spot,
    /// Linear perpetual settled in the quote asset (`BTC/USDT:USDT`).
    Linear,
    /// Inverse perpetual settled in the base asset (`BTC/USD:BTC`).
    Inverse,
}

impl MarketKind {
    /// Category name used by the Bybit v5 API.
    pub fn bybit_category(self) -> &'static str {
        match self {
            MarketKind::Spot => "spot",
            MarketKind::Linear => "linear",
            MarketKind::Inverse => "inverse",
        }
    }
}

/// Trading pair, e.g. `ETH/USDT` (spot) or `ETH/USDT:USDT` (perpetual).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Pair {
    pub base: CompactString,
    pub quote: CompactString,
    /// Settlement asset for derivatives, None for spot.
    pub settle: Option<CompactString>,
}

impl Pair {
    pub fn spot(base: &str, quote: &str) -> Self {
        Self {
            base: CompactString::new(base.to_ascii_uppercase()),
            quote: CompactString::new(quote.to_ascii_uppercase()),
            settle: None,
        }
    }

    pub fn perpetual(base: &str, quote: &str, settle: &str) -> Self {
        Self {
            settle: Some(CompactString::new(settle.to_ascii_uppercase())),
            ..Self::spot(base, quote)
        }
    }

    pub fn market_kind(&self) -> MarketKind {
        match &self.settle {
            None => MarketKind::Spot,
            Some(settle) if *settle == self.base => MarketKind::Inverse,
            Some(_) => MarketKind::Linear,
        }
    }

    /// Exchange-native symbol, e.g. "ETHUSDT".
    pub fn exchange_symbol(&self) -> String {
        format!("{}{}", self.base, self.quote)
    }
}

impl fmt::Display for Pair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.base, self.quote)?;
        if let Some(settle) = &self.settle {
            write!(f, ":{}", settle)?;
        }
        Ok(())
    }
}

impl FromStr for Pair {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || CoreError::InvalidPair(s.to_string());
        let (market, settle) = match s.trim().split_once(':') {
            Some((market, settle)) => (market, Some(settle.trim())),
            None => (s.trim(), None),
        };
        let (base, quote) = market.split_once('/').ok_or_else(invalid)?;
        let (base, quote) = (base.trim(), quote.trim());

        let is_valid = |part: &str| !part.is_empty() && part.chars().all(|c| c.is_ascii_alphanumeric());
        if !is_valid(base) || !is_valid(quote) {
            return Err(invalid());
        }

        match settle {
            Some(settle) if is_valid(settle) => Ok(Pair::perpetual(base, quote, settle)),
            Some(_) => Err(invalid()),
            None => Ok(Pair::spot(base, quote)),
        }
    }
}

impl TryFrom<String> for Pair {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Pair> for String {
    fn from(pair: Pair) -> Self {
        pair.to_string()
    }
}
