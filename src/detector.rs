use crate::klines::Candle;

/// A threshold crossing produced by [`detect`].
#[derive(Debug, Clone, PartialEq)]
pub struct Signal {
    /// Signed move; the sign carries the rise/fall direction downstream.
    pub change_percent: f64,
    pub last_price: f64,
    pub candle_open_time: i64,
}

/// Compare the open of the candle `lookback_minutes` back against the latest
/// close and signal when the absolute move reaches `threshold_percent`.
///
/// This is a fixed two-point comparison, not a high/low band over the window:
/// a move that fully reverses inside the window reads as near-zero change.
/// Short series and a zero reference open are no-signal, not errors.
pub fn detect(series: &[Candle], lookback_minutes: u32, threshold_percent: f64) -> Option<Signal> {
    let lookback = lookback_minutes as usize;
    if lookback == 0 || series.len() < lookback + 1 {
        return None;
    }

    let reference = &series[series.len() - lookback];
    let current = series.last()?;

    if reference.open == 0.0 {
        return None;
    }

    let change_percent = (current.close - reference.open) / reference.open * 100.0;

    if change_percent.abs() >= threshold_percent {
        Some(Signal {
            change_percent,
            last_price: current.close,
            candle_open_time: current.open_time,
        })
    } else {
        None
    }
}
