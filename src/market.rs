use std::time::{Duration, SystemTime, UNIX_EPOCH};

use anyhow::bail;
use async_trait::async_trait;
use regex::Regex;
use reqwest::Client;
use serde_json::Value;
use tracing::warn;

use crate::klines::{self, Candle};

const EXCHANGE_INFO_URL: &str = "https://fapi.binance.com/fapi/v1/exchangeInfo";
const KLINES_URL: &str = "https://fapi.binance.com/fapi/v1/klines";

/// Only instruments quoted in this asset are scanned.
pub const QUOTE_ASSET: &str = "USDT";
/// Instruments excluded from scanning regardless of quote asset.
pub const DENYLIST: &[&str] = &["BTCST"];

/// Market-data source: the symbol universe plus per-symbol 1m candles.
/// Implementations must be safe to share across concurrent workers.
#[async_trait]
pub trait MarketData: Send + Sync {
    async fn list_symbols(&self) -> anyhow::Result<Vec<String>>;

    /// Fetch up to `limit` one-minute candles, oldest first.
    async fn get_candles(&self, symbol: &str, limit: u32) -> anyhow::Result<Vec<Candle>>;
}

/// Keep quote-asset-matching names and drop denylisted instruments.
pub fn filter_universe(symbols: Vec<String>) -> Vec<String> {
    symbols
        .into_iter()
        .filter(|s| s.ends_with(QUOTE_ASSET) && !DENYLIST.iter().any(|d| s.contains(d)))
        .collect()
}

/// Binance USDT-margined futures REST client.
pub struct BinanceFutures {
    client: Client,
}

impl BinanceFutures {
    pub fn new() -> anyhow::Result<Self> {
        let client = Client::builder()
            .pool_max_idle_per_host(50)
            // One hung fetch must only stall its own worker slot, not the cycle.
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl MarketData for BinanceFutures {
    async fn list_symbols(&self) -> anyhow::Result<Vec<String>> {
        let info: Value = self
            .client
            .get(EXCHANGE_INFO_URL)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let symbols = info
            .get("symbols")
            .and_then(Value::as_array)
            .map(|arr| {
                arr.iter()
                    .filter_map(|s| s.get("symbol").and_then(Value::as_str).map(String::from))
                    .collect()
            })
            .unwrap_or_default();

        Ok(symbols)
    }

    async fn get_candles(&self, symbol: &str, limit: u32) -> anyhow::Result<Vec<Candle>> {
        let limit = limit.to_string();
        let response = self
            .client
            .get(KLINES_URL)
            .query(&[
                ("symbol", symbol),
                ("interval", "1m"),
                ("limit", limit.as_str()),
            ])
            .send()
            .await?;

        let status = response.status();

        if status == 418 || status == 429 {
            let body = response.text().await.unwrap_or_default();
            if let Some(wait) = ban_wait(&body, now_ms()) {
                warn!(symbol, wait_secs = wait.as_secs(), "rate limited, sleeping out the ban");
                tokio::time::sleep(wait).await;
            }
            bail!("rate limited fetching {symbol} klines (HTTP {status})");
        }

        if !status.is_success() {
            bail!("kline request for {symbol} failed: HTTP {status}");
        }

        let rows: Vec<Vec<Value>> = response.json().await?;
        Ok(klines::parse_series(&rows))
    }
}

/// Binance -1003 ban payloads carry "banned until <epoch-ms>"; the wait
/// includes a few seconds of slack past the stated deadline.
fn ban_wait(body: &str, now_ms: u64) -> Option<Duration> {
    if !body.contains("-1003") {
        return None;
    }
    let re = Regex::new(r"until\s+(\d+)").ok()?;
    let ban_until: u64 = re.captures(body)?.get(1)?.as_str().parse().ok()?;
    if ban_until > now_ms {
        Some(Duration::from_millis(ban_until - now_ms) + Duration::from_secs(5))
    } else {
        None
    }
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}
