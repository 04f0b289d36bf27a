//! Bybit REST API candle fetcher.
//!
//! Uses the public v5 market endpoints:
//! - `/v5/market/kline` for candles
//! - `/v5/market/time` for clock sync

use crate::auth::BybitCredentials;
use crate::error::{FeedError, FeedResult};
use crate::source::CandleSource;
use async_trait::async_trait;
use candlewatch_core::{Candle, Pair, Timeframe};
use serde::Deserialize;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;
use tracing::debug;

/// Bybit retCode for "too many visits".
const RET_CODE_RATE_LIMIT: i64 = 10006;
/// Bybit retCodes for invalid or expired API keys and bad signatures.
const RET_CODES_AUTH: [i64; 4] = [10003, 10004, 10005, 33004];

/// Configuration for the Bybit REST client.
#[derive(Debug, Clone)]
pub struct BybitClientConfig {
    pub base_url: String,
    /// Per-request timeout.
    pub timeout: Duration,
    pub credentials: Option<BybitCredentials>,
}

impl Default for BybitClientConfig {
    fn default() -> Self {
        Self {
            base_url: BybitRestClient::BASE_URL.to_string(),
            timeout: Duration::from_secs(30),
            credentials: None,
        }
    }
}

/// Common envelope of Bybit v5 responses.
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    #[serde(rename = "retCode")]
    ret_code: i64,
    #[serde(rename = "retMsg", default)]
    ret_msg: String,
    result: Option<T>,
    /// Server time in milliseconds.
    #[serde(default)]
    time: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct KlineResult {
    #[serde(default)]
    list: Vec<Vec<String>>,
}

#[derive(Debug, Deserialize)]
struct ServerTimeResult {
    #[serde(rename = "timeSecond")]
    time_second: String,
}

impl<T> Envelope<T> {
    fn into_result(self) -> FeedResult<T> {
        match self.ret_code {
            0 => self
                .result
                .ok_or_else(|| FeedError::ParseError("Missing result".to_string())),
            RET_CODE_RATE_LIMIT => Err(FeedError::RateLimitExceeded),
            code if RET_CODES_AUTH.contains(&code) => {
                Err(FeedError::AuthenticationFailed(self.ret_msg))
            }
            code => Err(FeedError::Api {
                code,
                message: self.ret_msg,
            }),
        }
    }
}

/// Bybit REST API client.
pub struct BybitRestClient {
    http: reqwest::Client,
    base_url: String,
    credentials: Option<BybitCredentials>,
    /// Server time minus local time, measured by the last server time call.
    clock_offset_ms: AtomicI64,
}

impl BybitRestClient {
    pub const BASE_URL: &'static str = "https://api.bybit.com";
    /// Largest page the kline endpoint accepts.
    pub const MAX_KLINE_LIMIT: usize = 1000;

    pub fn new(config: BybitClientConfig) -> FeedResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| FeedError::ConnectionFailed(format!("Failed to build client: {}", e)))?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            credentials: config.credentials,
            clock_offset_ms: AtomicI64::new(0),
        })
    }

    pub fn has_credentials(&self) -> bool {
        self.credentials.is_some()
    }

    /// Timestamp for signed requests, on the exchange clock.
    pub fn signing_timestamp_ms(&self) -> i64 {
        chrono::Utc::now().timestamp_millis() + self.clock_offset_ms.load(Ordering::Relaxed)
    }

    /// Store the offset implied by a server time read between `sent_ms` and
    /// `received_ms` local time.
    fn record_server_time(&self, server_ms: i64, sent_ms: i64, received_ms: i64) -> i64 {
        let offset = server_ms - (sent_ms + received_ms) / 2;
        self.clock_offset_ms.store(offset, Ordering::Relaxed);
        offset
    }

    /// Query string for a kline request. Parameter order matters for signing.
    pub fn kline_query(pair: &Pair, timeframe: Timeframe, limit: usize) -> String {
        format!(
            "category={}&symbol={}&interval={}&limit={}",
            pair.market_kind().bybit_category(),
            pair.exchange_symbol(),
            timeframe.bybit_interval(),
            limit.clamp(1, Self::MAX_KLINE_LIMIT)
        )
    }

    /// Decode a kline response body into ascending candles.
    ///
    /// Bybit lists rows newest first as string arrays:
    /// `[start, open, high, low, close, volume, turnover]`.
    pub fn parse_klines(pair: &Pair, timeframe: Timeframe, body: &str) -> FeedResult<Vec<Candle>> {
        let envelope: Envelope<KlineResult> = serde_json::from_str(body)?;
        let result = envelope.into_result()?;

        let mut candles = result
            .list
            .iter()
            .map(|row| parse_kline_row(pair, timeframe, row))
            .collect::<FeedResult<Vec<_>>>()?;

        candles.sort_by_key(|c| c.open_time_ms);
        Ok(candles)
    }

    /// Decode a server time response body into Unix milliseconds.
    pub fn parse_server_time(body: &str) -> FeedResult<i64> {
        let envelope: Envelope<ServerTimeResult> = serde_json::from_str(body)?;
        if let Some(time) = envelope.time.filter(|_| envelope.ret_code == 0) {
            return Ok(time);
        }
        let result = envelope.into_result()?;
        result
            .time_second
            .parse::<i64>()
            .map(|secs| secs * 1000)
            .map_err(|_| FeedError::ParseError(format!("Invalid timeSecond: {}", result.time_second)))
    }

    async fn get(&self, path: &str, query: &str) -> FeedResult<String> {
        let url = if query.is_empty() {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}{}?{}", self.base_url, path, query)
        };

        let mut request = self.http.get(&url);
        if let Some(credentials) = &self.credentials {
            let signed = credentials.sign(self.signing_timestamp_ms(), query)?;
            for (name, value) in signed.iter() {
                request = request.header(name, value);
            }
        }

        let response = request.send().await?;
        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(FeedError::RateLimitExceeded);
        }
        if !status.is_success() {
            return Err(FeedError::HttpStatus(status.as_u16()));
        }

        Ok(response.text().await?)
    }
}

fn parse_kline_row(pair: &Pair, timeframe: Timeframe, row: &[String]) -> FeedResult<Candle> {
    if row.len() < 6 {
        return Err(FeedError::ParseError(format!(
            "Kline row has {} fields, expected at least 6",
            row.len()
        )));
    }

    let number = |idx: usize| -> FeedResult<f64> {
        row[idx]
            .parse::<f64>()
            .map_err(|_| FeedError::ParseError(format!("Invalid kline field: {}", row[idx])))
    };
    let open_time_ms = row[0]
        .parse::<i64>()
        .map_err(|_| FeedError::ParseError(format!("Invalid kline start: {}", row[0])))?;

    Ok(Candle::from_row(
        pair.clone(),
        timeframe,
        (open_time_ms, number(1)?, number(2)?, number(3)?, number(4)?, number(5)?),
    ))
}

#[async_trait]
impl CandleSource for BybitRestClient {
    async fn fetch_recent_candles(
        &self,
        pair: &Pair,
        timeframe: Timeframe,
        limit: usize,
    ) -> FeedResult<Vec<Candle>> {
        let query = Self::kline_query(pair, timeframe, limit);
        let body = self.get("/v5/market/kline", &query).await?;
        let candles = Self::parse_klines(pair, timeframe, &body)?;
        debug!("Bybit: Fetched {} {} candles for {}", candles.len(), timeframe, pair);
        Ok(candles)
    }

    async fn server_time_ms(&self) -> FeedResult<Option<i64>> {
        let sent_ms = chrono::Utc::now().timestamp_millis();
        let body = self.get("/v5/market/time", "").await?;
        let received_ms = chrono::Utc::now().timestamp_millis();

        let server_ms = Self::parse_server_time(&body)?;
        let offset = self.record_server_time(server_ms, sent_ms, received_ms);
        debug!(offset_ms = offset, "Bybit: signing clock adjusted");
        Ok(Some(server_ms))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const KLINE_BODY: &str = r#"{
        "retCode": 0,
        "retMsg": "OK",
        "result": {
            "category": "linear",
            "symbol": "ETHUSDT",
            "list": [
                ["1700000900000", "2000.5", "2010", "1995", "2005.25", "1234.5", "2470000"],
                ["1700000000000", "1980", "2001", "1975.5", "2000.5", "987.25", "1960000"]
            ]
        },
        "retExtInfo": {},
        "time": 1700001000123
    }"#;

    #[test]
    fn test_kline_query() {
        let pair: Pair = "ETH/USDT:USDT".parse().unwrap();
        assert_eq!(
            BybitRestClient::kline_query(&pair, Timeframe::M15, 2),
            "category=linear&symbol=ETHUSDT&interval=15&limit=2"
        );
        let spot = Pair::spot("BTC", "USDT");
        assert_eq!(
            BybitRestClient::kline_query(&spot, Timeframe::D1, 5000),
            "category=spot&symbol=BTCUSDT&interval=D&limit=1000"
        );
    }

    #[test]
    fn test_parse_klines_sorts_ascending() {
        let pair: Pair = "ETH/USDT:USDT".parse().unwrap();
        let candles = BybitRestClient::parse_klines(&pair, Timeframe::M15, KLINE_BODY).unwrap();

        assert_eq!(candles.len(), 2);
        assert_eq!(candles[0].open_time_ms, 1_700_000_000_000);
        assert_eq!(candles[1].open_time_ms, 1_700_000_900_000);
        assert_eq!(
            (candles[0].open, candles[0].high, candles[0].low, candles[0].close, candles[0].volume),
            (1980.0, 2001.0, 1975.5, 2000.5, 987.25)
        );
        assert_eq!(candles[1].pair, pair);
        assert_eq!(candles[1].timeframe, Timeframe::M15);
    }

    #[test]
    fn test_parse_klines_empty_list() {
        let body = r#"{"retCode":0,"retMsg":"OK","result":{"category":"spot","symbol":"X","list":[]}}"#;
        let candles =
            BybitRestClient::parse_klines(&Pair::spot("X", "USDT"), Timeframe::M5, body).unwrap();
        assert!(candles.is_empty());
    }

    #[test]
    fn test_parse_klines_api_errors() {
        let pair = Pair::spot("ETH", "USDT");
        let invalid = r#"{"retCode":10001,"retMsg":"Not supported symbols","result":{}}"#;
        match BybitRestClient::parse_klines(&pair, Timeframe::M5, invalid) {
            Err(FeedError::Api { code, message }) => {
                assert_eq!(code, 10001);
                assert_eq!(message, "Not supported symbols");
            }
            other => panic!("unexpected: {:?}", other),
        }

        let limited = r#"{"retCode":10006,"retMsg":"Too many visits!","result":{}}"#;
        assert!(matches!(
            BybitRestClient::parse_klines(&pair, Timeframe::M5, limited),
            Err(FeedError::RateLimitExceeded)
        ));

        let auth = r#"{"retCode":10003,"retMsg":"API key is invalid.","result":{}}"#;
        assert!(matches!(
            BybitRestClient::parse_klines(&pair, Timeframe::M5, auth),
            Err(FeedError::AuthenticationFailed(_))
        ));
    }

    #[test]
    fn test_parse_klines_bad_rows() {
        let pair = Pair::spot("ETH", "USDT");
        let short = r#"{"retCode":0,"retMsg":"OK","result":{"list":[["1700000000000","1","2"]]}}"#;
        assert!(matches!(
            BybitRestClient::parse_klines(&pair, Timeframe::M5, short),
            Err(FeedError::ParseError(_))
        ));

        let garbage = r#"{"retCode":0,"retMsg":"OK","result":{"list":[["t","1","2","3","4","5"]]}}"#;
        assert!(matches!(
            BybitRestClient::parse_klines(&pair, Timeframe::M5, garbage),
            Err(FeedError::ParseError(_))
        ));

        assert!(matches!(
            BybitRestClient::parse_klines(&pair, Timeframe::M5, "<html>"),
            Err(FeedError::ParseError(_))
        ));
    }

    #[test]
    fn test_parse_server_time() {
        let body = r#"{"retCode":0,"retMsg":"OK","result":{"timeSecond":"1688639403","timeNano":"1688639403423213947"},"retExtInfo":{},"time":1688639403423}"#;
        assert_eq!(BybitRestClient::parse_server_time(body).unwrap(), 1_688_639_403_423);

        let without_time = r#"{"retCode":0,"retMsg":"OK","result":{"timeSecond":"1688639403","timeNano":"0"}}"#;
        assert_eq!(
            BybitRestClient::parse_server_time(without_time).unwrap(),
            1_688_639_403_000
        );
    }

    #[test]
    fn test_client_config_default() {
        let config = BybitClientConfig::default();
        assert_eq!(config.base_url, "https://api.bybit.com");
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert!(config.credentials.is_none());
    }

    #[test]
    fn test_signing_timestamp_follows_server_clock() {
        let client = BybitRestClient::new(BybitClientConfig::default()).unwrap();
        let local = chrono::Utc::now().timestamp_millis();
        assert!((client.signing_timestamp_ms() - local).abs() < 1_000);

        let offset = client.record_server_time(local + 5_000, local - 100, local + 100);
        assert_eq!(offset, 5_000);
        let drift = client.signing_timestamp_ms() - chrono::Utc::now().timestamp_millis();
        assert!((drift - 5_000).abs() < 1_000);

        client.record_server_time(local - 3_000, local, local);
        let drift = client.signing_timestamp_ms() - chrono::Utc::now().timestamp_millis();
        assert!((drift + 3_000).abs() < 1_000);
    }
}
