use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::storage::StorageManager;

const HISTORY_FILE: &str = "price_change_history";

/// Snapshot of the most recent accepted alert for one symbol.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct HistoryRecord {
    pub symbol: String,
    pub change_percent: f64,
    /// Latest close at detection time.
    pub price: f64,
    /// Open time (epoch ms) of the candle that completed the move.
    pub candle_time: i64,
    /// Epoch seconds when the scanner accepted the alert.
    pub detected_at: u64,
    pub chart_file: String,
}

/// Exactly one record per symbol, overwritten on each accepted alert and
/// persisted after every update.
///
/// Load and save are fail-soft: the in-memory map stays authoritative and
/// the next successful write catches up.
pub struct HistoryStore {
    storage: StorageManager,
    records: HashMap<String, HistoryRecord>,
}

impl HistoryStore {
    pub async fn open(storage: StorageManager) -> Self {
        let records = storage.load(HISTORY_FILE).await.unwrap_or_default();
        Self { storage, records }
    }

    pub fn get(&self, symbol: &str) -> Option<&HistoryRecord> {
        self.records.get(symbol)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub async fn record(&mut self, record: HistoryRecord) {
        self.records.insert(record.symbol.clone(), record);
        if let Err(e) = self.storage.save(HISTORY_FILE, &self.records).await {
            warn!(error = %e, "alert history not persisted");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(symbol: &str, change: f64, detected_at: u64) -> HistoryRecord {
        HistoryRecord {
            symbol: symbol.to_string(),
            change_percent: change,
            price: 106.0,
            candle_time: 1_700_000_000_000,
            detected_at,
            chart_file: format!("{symbol}_{detected_at}.png"),
        }
    }

    #[tokio::test]
    async fn keeps_latest_record_per_symbol() {
        let dir = tempfile::tempdir().unwrap();
        let storage = StorageManager::new(dir.path()).await.unwrap();
        let mut history = HistoryStore::open(storage).await;

        history.record(record("AAAUSDT", 6.0, 100)).await;
        history.record(record("AAAUSDT", 8.5, 500)).await;

        assert_eq!(history.len(), 1);
        assert_eq!(history.get("AAAUSDT").unwrap().change_percent, 8.5);
        assert_eq!(history.get("AAAUSDT").unwrap().detected_at, 500);
    }

    #[tokio::test]
    async fn survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let storage = StorageManager::new(dir.path()).await.unwrap();

        let mut history = HistoryStore::open(storage.clone()).await;
        history.record(record("AAAUSDT", 6.0, 100)).await;
        drop(history);

        let reopened = HistoryStore::open(storage).await;
        assert_eq!(reopened.get("AAAUSDT").unwrap().change_percent, 6.0);
    }

    #[tokio::test]
    async fn opens_empty_without_a_file() {
        let dir = tempfile::tempdir().unwrap();
        let storage = StorageManager::new(dir.path()).await.unwrap();
        let history = HistoryStore::open(storage).await;
        assert!(history.is_empty());
    }
}
