use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One 1-minute OHLCV sample.
///
/// Binance returns klines as positional arrays mixing integers (times) and
/// numeric strings (prices), so rows are parsed field by field instead of
/// derived.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Candle {
    pub open_time: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

/// Accepts a float, an integer, or a string representing a number.
fn lenient_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) if !s.trim().is_empty() => s.trim().parse().ok(),
        _ => None,
    }
}

impl Candle {
    /// Parse one raw kline row: `[openTime, open, high, low, close, volume, ...]`.
    pub fn from_raw_row(row: &[Value]) -> Option<Self> {
        Some(Self {
            open_time: row.first()?.as_i64()?,
            open: lenient_f64(row.get(1)?)?,
            high: lenient_f64(row.get(2)?)?,
            low: lenient_f64(row.get(3)?)?,
            close: lenient_f64(row.get(4)?)?,
            volume: lenient_f64(row.get(5)?)?,
        })
    }
}

/// Parse a kline response body, dropping malformed rows.
pub fn parse_series(rows: &[Vec<Value>]) -> Vec<Candle> {
    rows.iter().filter_map(|row| Candle::from_raw_row(row)).collect()
}
