//! Bybit API key signing.
//!
//! Credentials are optional; market data endpoints work without them. When
//! configured they are attached to every request as v5 signed headers.

use crate::{FeedError, FeedResult};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::fmt;

type HmacSha256 = Hmac<Sha256>;

/// Receive window sent with signed requests, in milliseconds.
pub const RECV_WINDOW_MS: u64 = 10_000;

/// Bybit API key pair.
#[derive(Clone)]
pub struct BybitCredentials {
    pub api_key: String,
    api_secret: String,
}

impl fmt::Debug for BybitCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BybitCredentials")
            .field("api_key", &mask(&self.api_key))
            .field("api_secret", &"***")
            .finish()
    }
}

fn mask(key: &str) -> String {
    let visible: String = key.chars().take(4).collect();
    format!("{}***", visible)
}

/// Headers for one signed request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedHeaders {
    pub api_key: String,
    pub timestamp: String,
    pub recv_window: String,
    pub signature: String,
}

impl SignedHeaders {
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &str)> {
        [
            ("X-BAPI-API-KEY", self.api_key.as_str()),
            ("X-BAPI-TIMESTAMP", self.timestamp.as_str()),
            ("X-BAPI-RECV-WINDOW", self.recv_window.as_str()),
            ("X-BAPI-SIGN", self.signature.as_str()),
        ]
        .into_iter()
    }
}

impl BybitCredentials {
    pub fn new(api_key: impl Into<String>, api_secret: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            api_secret: api_secret.into(),
        }
    }

    /// Build credentials from optional key/secret, ignoring blanks.
    pub fn from_parts(api_key: Option<String>, api_secret: Option<String>) -> Option<Self> {
        match (api_key, api_secret) {
            (Some(key), Some(secret)) if !key.trim().is_empty() && !secret.trim().is_empty() => {
                Some(Self::new(key.trim(), secret.trim()))
            }
            _ => None,
        }
    }

    /// Sign a GET request: HMAC-SHA256 over timestamp + key + recv_window + query.
    pub fn sign(&self, timestamp_ms: i64, query: &str) -> FeedResult<SignedHeaders> {
        let timestamp = timestamp_ms.to_string();
        let recv_window = RECV_WINDOW_MS.to_string();
        let payload = format!("{}{}{}{}", timestamp, self.api_key, recv_window, query);

        let mut mac = HmacSha256::new_from_slice(self.api_secret.as_bytes())
            .map_err(|e| FeedError::AuthenticationFailed(e.to_string()))?;
        mac.update(payload.as_bytes());
        let signature = hex::encode(mac.finalize().into_bytes());

        Ok(SignedHeaders {
            api_key: self.api_key.clone(),
            timestamp,
            recv_window,
            signature,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_parts_requires_both() {
        assert!(BybitCredentials::from_parts(Some("k".into()), Some("s".into())).is_some());
        assert!(BybitCredentials::from_parts(Some("k".into()), None).is_none());
        assert!(BybitCredentials::from_parts(Some("  ".into()), Some("s".into())).is_none());
        assert!(BybitCredentials::from_parts(None, None).is_none());
    }

    #[test]
    fn test_sign_is_deterministic_hex() {
        let creds = BybitCredentials::new("key", "secret");
        let a = creds.sign(1_700_000_000_000, "category=linear&symbol=ETHUSDT").unwrap();
        let b = creds.sign(1_700_000_000_000, "category=linear&symbol=ETHUSDT").unwrap();
        assert_eq!(a, b);
        assert_eq!(a.signature.len(), 64);
        assert!(a.signature.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(a.recv_window, "10000");
        assert_eq!(a.timestamp, "1700000000000");
    }

    #[test]
    fn test_sign_depends_on_query() {
        let creds = BybitCredentials::new("key", "secret");
        let a = creds.sign(1, "symbol=ETHUSDT").unwrap();
        let b = creds.sign(1, "symbol=BTCUSDT").unwrap();
        assert_ne!(a.signature, b.signature);
    }

    #[test]
    fn test_debug_hides_secret() {
        let creds = BybitCredentials::new("abcdefgh", "topsecret");
        let debug = format!("{:?}", creds);
        assert!(!debug.contains("topsecret"));
        assert!(!debug.contains("abcdefgh"));
        assert!(debug.contains("abcd***"));
    }

    #[test]
    fn test_headers_iter() {
        let creds = BybitCredentials::new("key", "secret");
        let headers = creds.sign(5, "").unwrap();
        let names: Vec<_> = headers.iter().map(|(name, _)| name).collect();
        assert_eq!(
            names,
            vec!["X-BAPI-API-KEY", "X-BAPI-TIMESTAMP", "X-BAPI-RECV-WINDOW", "X-BAPI-SIGN"]
        );
    }
}
