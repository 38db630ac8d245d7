use std::path::{Path, PathBuf};

use serde::{Serialize, de::DeserializeOwned};
use tokio::fs;

/// JSON file store for the scanner's durable state.
///
/// Saves go through a `.tmp` sibling that is renamed into place, so a crash
/// mid-write never leaves a truncated target file: readers always see either
/// the old content or the fully written new content.
#[derive(Clone)]
pub struct StorageManager {
    base_dir: PathBuf,
}

impl StorageManager {
    /// Creates the base directory up front so saves never have to check for it.
    pub async fn new<P: AsRef<Path>>(base_dir: P) -> anyhow::Result<Self> {
        let base_dir = base_dir.as_ref().to_path_buf();
        if !base_dir.exists() {
            fs::create_dir_all(&base_dir).await?;
        }
        Ok(Self { base_dir })
    }

    /// Serialize `data` as pretty JSON and atomically replace `{name}.json`.
    pub async fn save<T: Serialize>(&self, name: &str, data: &T) -> anyhow::Result<()> {
        let file_name = format!("{}.json", name);
        let final_path = self.base_dir.join(&file_name);
        let tmp_path = self.base_dir.join(format!("{}.tmp", file_name));

        let json_bytes = serde_json::to_vec_pretty(data)?;

        fs::write(&tmp_path, json_bytes).await?;
        fs::rename(tmp_path, final_path).await?;

        Ok(())
    }

    /// Read `{name}.json` and deserialize it into `T`.
    ///
    /// Reads raw bytes rather than a String; serde_json scans them anyway and
    /// the UTF-8 validation pass is redundant.
    pub async fn load<T: DeserializeOwned>(&self, name: &str) -> anyhow::Result<T> {
        let content = fs::read(self.base_dir.join(format!("{}.json", name))).await?;
        let data = serde_json::from_slice(&content)?;
        Ok(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Value, json};

    #[tokio::test]
    async fn save_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let storage = StorageManager::new(dir.path()).await.unwrap();

        let original = json!({"threshold_percent": 5.0, "destination_id": "42"});
        storage.save("config", &original).await.unwrap();
        let loaded: Value = storage.load("config").await.unwrap();
        assert_eq!(loaded, original);

        // Writing back an unmodified loaded value is byte-idempotent.
        storage.save("config", &loaded).await.unwrap();
        let first = std::fs::read(dir.path().join("config.json")).unwrap();
        storage.save("config", &loaded).await.unwrap();
        let second = std::fs::read(dir.path().join("config.json")).unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn load_of_missing_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let storage = StorageManager::new(dir.path()).await.unwrap();
        assert!(storage.load::<Value>("nothing").await.is_err());
    }

    #[tokio::test]
    async fn interrupted_write_never_corrupts_committed_file() {
        let dir = tempfile::tempdir().unwrap();
        let storage = StorageManager::new(dir.path()).await.unwrap();

        storage.save("history", &json!({"AAAUSDT": {"change": 7.0}})).await.unwrap();

        // Simulate a crash that left a half-written temp file behind.
        std::fs::write(dir.path().join("history.json.tmp"), b"{\"trunc").unwrap();

        // The committed file is untouched and still parseable.
        let loaded: Value = storage.load("history").await.unwrap();
        assert_eq!(loaded["AAAUSDT"]["change"], 7.0);

        // The next full save replaces both cleanly.
        storage.save("history", &json!({"BBBUSDT": {"change": -6.0}})).await.unwrap();
        let loaded: Value = storage.load("history").await.unwrap();
        assert_eq!(loaded["BBBUSDT"]["change"], -6.0);
    }
}
