use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use futures::StreamExt;
use futures::stream;
use tracing::{debug, info, warn};

use crate::chart::{ChartRenderer, PlottersChart};
use crate::config::{ConfigStore, ScanConfig};
use crate::detector;
use crate::history::{HistoryRecord, HistoryStore};
use crate::janitor;
use crate::market::{self, BinanceFutures, MarketData};
use crate::notify::{Notifier, TelegramNotifier};
use crate::storage::StorageManager;
use crate::throttle::AlertThrottle;

/// Fixed fan-out width. Binance request-weight limits make a wider pool
/// counterproductive; the width is a tuned constant, not derived from the
/// universe size.
pub const MAX_WORKERS: usize = 5;

/// 1m candles requested per symbol.
pub const KLINE_LIMIT: u32 = 100;

/// A threshold crossing that survived detection, chart in hand, awaiting the
/// dispatch phase.
#[derive(Debug, Clone)]
pub struct AlertEvent {
    pub symbol: String,
    pub change_percent: f64,
    /// Latest close at detection time.
    pub price: f64,
    /// Open time (epoch ms) of the candle that completed the move.
    pub candle_time: i64,
    /// Epoch seconds when the worker packaged the event.
    pub detected_at: u64,
    pub chart_path: PathBuf,
}

impl AlertEvent {
    pub fn direction(&self) -> &'static str {
        if self.change_percent >= 0.0 { "RISE" } else { "DROP" }
    }

    pub fn caption(&self, lookback_minutes: u32) -> String {
        format!(
            "{} {} {:+.2}% in the last {}m (price {})",
            self.symbol,
            self.direction(),
            self.change_percent,
            lookback_minutes,
            self.price
        )
    }
}

impl From<&AlertEvent> for HistoryRecord {
    fn from(event: &AlertEvent) -> Self {
        Self {
            symbol: event.symbol.clone(),
            change_percent: event.change_percent,
            price: event.price,
            candle_time: event.candle_time,
            detected_at: event.detected_at,
            chart_file: event
                .chart_path
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or_default()
                .to_string(),
        }
    }
}

/// Tally of one scan cycle. Errors are collected, never raised.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CycleResult {
    pub scanned: usize,
    pub triggered: usize,
    pub throttled: usize,
    pub errors: usize,
}

/// Runs one scan cycle over the whole symbol universe.
///
/// Owns the throttle and history state outright; both are touched only in
/// the single-threaded dispatch phase after the worker pool has drained, so
/// no locking is needed.
pub struct Scanner {
    market: Arc<dyn MarketData>,
    renderer: Arc<dyn ChartRenderer>,
    notifier: Arc<dyn Notifier>,
    config_store: ConfigStore,
    history: HistoryStore,
    throttle: AlertThrottle,
    charts_dir: PathBuf,
}

impl Scanner {
    /// Wire up the production collaborators under `data_dir`.
    pub async fn new(data_dir: &Path) -> anyhow::Result<Self> {
        let storage = StorageManager::new(data_dir).await?;
        let charts_dir = data_dir.join("charts");
        let market = Arc::new(BinanceFutures::new()?);
        let renderer = Arc::new(PlottersChart::new(&charts_dir)?);
        let notifier = Arc::new(TelegramNotifier::from_env()?);
        Ok(Self::assemble(market, renderer, notifier, storage, charts_dir).await)
    }

    /// Collaborator-injecting constructor; tests wire mocks through here.
    pub async fn assemble(
        market: Arc<dyn MarketData>,
        renderer: Arc<dyn ChartRenderer>,
        notifier: Arc<dyn Notifier>,
        storage: StorageManager,
        charts_dir: PathBuf,
    ) -> Self {
        let config_store = ConfigStore::new(storage.clone());
        let history = HistoryStore::open(storage).await;
        Self {
            market,
            renderer,
            notifier,
            config_store,
            history,
            throttle: AlertThrottle::new(),
            charts_dir,
        }
    }

    /// One full pass: config, universe, bounded fan-out of fetch+detect+render,
    /// then the sequential dispatch phase, then the artifact sweep.
    pub async fn run_cycle(&mut self) -> CycleResult {
        let mut result = CycleResult::default();

        let config = self.config_store.load().await;
        let Some(destination) = config.destination_id.clone() else {
            debug!("no destination configured, skipping cycle");
            return result;
        };

        let symbols = match self.market.list_symbols().await {
            Ok(symbols) => market::filter_universe(symbols),
            Err(e) => {
                warn!(error = %e, "could not fetch symbol universe");
                result.errors += 1;
                return result;
            }
        };
        result.scanned = symbols.len();
        info!(
            symbols = symbols.len(),
            lookback = config.lookback_minutes,
            threshold = config.threshold_percent,
            "scan cycle starting"
        );

        let this: &Scanner = self;
        let config_ref = &config;
        let outcomes: Vec<(String, anyhow::Result<Option<AlertEvent>>)> = stream::iter(symbols)
            .map(|symbol| async move {
                let outcome = this.process_symbol(&symbol, config_ref).await;
                (symbol, outcome)
            })
            .buffer_unordered(MAX_WORKERS)
            .collect()
            .await;

        let mut events = Vec::new();
        for (symbol, outcome) in outcomes {
            match outcome {
                Ok(Some(event)) => events.push(event),
                Ok(None) => {}
                Err(e) => {
                    warn!(symbol = %symbol, error = %e, "symbol processing failed");
                    result.errors += 1;
                }
            }
        }
        result.triggered = events.len();

        for event in events {
            if !self.throttle.should_notify(&event.symbol, event.detected_at) {
                debug!(symbol = %event.symbol, "alert suppressed by cooldown");
                result.throttled += 1;
                continue;
            }

            info!(symbol = %event.symbol, change = event.change_percent, "alert");
            if let Err(e) = self
                .notifier
                .send(&destination, &event.chart_path, &event.caption(config.lookback_minutes))
                .await
            {
                warn!(symbol = %event.symbol, error = %e, "notification failed");
                result.errors += 1;
            }

            // The cooldown slot is consumed even on a failed send so a broken
            // channel does not spam on recovery.
            self.history.record(HistoryRecord::from(&event)).await;
            self.throttle.mark_notified(&event.symbol, event.detected_at);
        }

        match janitor::cleanup_old_charts(&self.charts_dir, janitor::RETENTION).await {
            Ok(removed) if removed > 0 => debug!(removed, "stale charts removed"),
            Ok(_) => {}
            Err(e) => warn!(error = %e, "chart cleanup failed"),
        }

        result
    }

    /// Fetch, detect, and (on a trigger) render for one symbol. Any failure
    /// here is this symbol's alone.
    async fn process_symbol(
        &self,
        symbol: &str,
        config: &ScanConfig,
    ) -> anyhow::Result<Option<AlertEvent>> {
        let series = self.market.get_candles(symbol, KLINE_LIMIT).await?;

        let Some(signal) = detector::detect(&series, config.lookback_minutes, config.threshold_percent)
        else {
            return Ok(None);
        };

        let chart_path =
            self.renderer
                .render(&series, symbol, signal.change_percent, config.lookback_minutes)?;

        Ok(Some(AlertEvent {
            symbol: symbol.to_string(),
            change_percent: signal.change_percent,
            price: signal.last_price,
            candle_time: signal.candle_open_time,
            detected_at: epoch_secs(),
            chart_path,
        }))
    }
}

fn epoch_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}
