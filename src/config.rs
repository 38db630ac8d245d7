use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::storage::StorageManager;

pub const DEFAULT_LOOKBACK_MINUTES: u32 = 5;
pub const DEFAULT_THRESHOLD_PERCENT: f64 = 5.0;

const CONFIG_FILE: &str = "config";

/// Scanner settings, re-read at the start of every cycle so operator changes
/// take effect without a restart.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ScanConfig {
    /// How many minutes back the reference candle sits.
    pub lookback_minutes: u32,
    /// Absolute percentage move that raises an alert.
    pub threshold_percent: f64,
    /// Where alerts are delivered (Telegram chat id). None disables scanning.
    pub destination_id: Option<String>,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            lookback_minutes: DEFAULT_LOOKBACK_MINUTES,
            threshold_percent: DEFAULT_THRESHOLD_PERCENT,
            destination_id: None,
        }
    }
}

pub struct ConfigStore {
    storage: StorageManager,
}

impl ConfigStore {
    pub fn new(storage: StorageManager) -> Self {
        Self { storage }
    }

    /// Load the settings file, never failing: an absent or unreadable file
    /// yields the defaults, which are written back so the operator has a
    /// file to edit.
    pub async fn load(&self) -> ScanConfig {
        match self.storage.load::<Value>(CONFIG_FILE).await {
            Ok(raw) => normalize(raw),
            Err(e) => {
                warn!(error = %e, "config unreadable, falling back to defaults");
                let defaults = ScanConfig::default();
                if let Err(e) = self.save(&defaults).await {
                    warn!(error = %e, "could not write default config");
                }
                defaults
            }
        }
    }

    pub async fn save(&self, config: &ScanConfig) -> anyhow::Result<()> {
        self.storage.save(CONFIG_FILE, config).await
    }
}

/// Map legacy keys onto the canonical schema and replace out-of-range values
/// with defaults.
fn normalize(raw: Value) -> ScanConfig {
    let defaults = ScanConfig::default();
    let Value::Object(map) = raw else {
        return defaults;
    };

    let lookback_minutes = map
        .get("lookback_minutes")
        .and_then(Value::as_u64)
        .or_else(|| legacy_interval_minutes(&map))
        .filter(|v| *v >= 1)
        .map(|v| v as u32)
        .unwrap_or(defaults.lookback_minutes);

    let threshold_percent = map
        .get("threshold_percent")
        .and_then(Value::as_f64)
        .filter(|v| *v > 0.0)
        .unwrap_or(defaults.threshold_percent);

    let destination_id = map
        .get("destination_id")
        .and_then(Value::as_str)
        .map(String::from);

    ScanConfig {
        lookback_minutes,
        threshold_percent,
        destination_id,
    }
}

/// Older deployments stored the window under `interval` as a minute string,
/// possibly with an "m" suffix ("5m").
fn legacy_interval_minutes(map: &serde_json::Map<String, Value>) -> Option<u64> {
    match map.get("interval")? {
        Value::String(s) => s.trim().trim_end_matches('m').parse().ok(),
        Value::Number(n) => n.as_u64(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn missing_file_yields_defaults_and_writes_them() {
        let dir = tempfile::tempdir().unwrap();
        let storage = StorageManager::new(dir.path()).await.unwrap();
        let store = ConfigStore::new(storage.clone());

        let config = store.load().await;
        assert_eq!(config, ScanConfig::default());

        // First run leaves an editable file behind.
        let on_disk: ScanConfig = storage.load(CONFIG_FILE).await.unwrap();
        assert_eq!(on_disk, ScanConfig::default());
    }

    #[tokio::test]
    async fn corrupt_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("config.json"), b"{not json").unwrap();
        let storage = StorageManager::new(dir.path()).await.unwrap();

        let config = ConfigStore::new(storage).load().await;
        assert_eq!(config.lookback_minutes, DEFAULT_LOOKBACK_MINUTES);
        assert_eq!(config.threshold_percent, DEFAULT_THRESHOLD_PERCENT);
        assert_eq!(config.destination_id, None);
    }

    #[test]
    fn legacy_minute_string_maps_to_lookback() {
        let config = normalize(json!({"interval": "15m", "threshold_percent": 3.5}));
        assert_eq!(config.lookback_minutes, 15);
        assert_eq!(config.threshold_percent, 3.5);

        let config = normalize(json!({"interval": "10"}));
        assert_eq!(config.lookback_minutes, 10);
    }

    #[test]
    fn canonical_key_wins_over_legacy() {
        let config = normalize(json!({"lookback_minutes": 3, "interval": "15m"}));
        assert_eq!(config.lookback_minutes, 3);
    }

    #[test]
    fn out_of_range_values_fall_back() {
        let config = normalize(json!({
            "lookback_minutes": 0,
            "threshold_percent": -2.0,
            "destination_id": "chat-9"
        }));
        assert_eq!(config.lookback_minutes, DEFAULT_LOOKBACK_MINUTES);
        assert_eq!(config.threshold_percent, DEFAULT_THRESHOLD_PERCENT);
        assert_eq!(config.destination_id.as_deref(), Some("chat-9"));
    }
}
