//! File-backed settings store
//!
//! Implements the host persistence port over a single JSON file. Writes
//! land in memory immediately and flush to disk after a debounce window,
//! so the collection registry can save eagerly without thrashing the disk.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::Mutex;

use vecthare_domain::error::{Error, Result};
use vecthare_domain::ports::SettingsStore;

/// Default flush debounce
const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(500);

/// JSON-file settings store with debounced writes
pub struct FileSettingsStore {
    path: PathBuf,
    values: Arc<Mutex<HashMap<String, Value>>>,
    debounce: Duration,
    flush_scheduled: Arc<AtomicBool>,
}

impl FileSettingsStore {
    /// Open (or create) a store at `path`
    pub async fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let values = if tokio::fs::metadata(&path).await.is_ok() {
            let content = tokio::fs::read_to_string(&path)
                .await
                .map_err(|e| Error::internal(format!("Failed to read settings file: {e}")))?;
            serde_json::from_str(&content)?
        } else {
            HashMap::new()
        };

        Ok(Self {
            path,
            values: Arc::new(Mutex::new(values)),
            debounce: DEFAULT_DEBOUNCE,
            flush_scheduled: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Override the flush debounce (tests use a short one)
    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }

    /// Write the current state to disk immediately
    pub async fn flush(&self) -> Result<()> {
        let snapshot = self.values.lock().await.clone();
        write_file(&self.path, &snapshot).await
    }

    fn schedule_flush(&self) {
        if self.flush_scheduled.swap(true, Ordering::SeqCst) {
            return;
        }
        let path = self.path.clone();
        let values = Arc::clone(&self.values);
        let flag = Arc::clone(&self.flush_scheduled);
        let debounce = self.debounce;
        tokio::spawn(async move {
            tokio::time::sleep(debounce).await;
            flag.store(false, Ordering::SeqCst);
            let snapshot = values.lock().await.clone();
            if let Err(e) = write_file(&path, &snapshot).await {
                tracing::error!("Failed to flush settings to {}: {e}", path.display());
            }
        });
    }
}

async fn write_file(path: &Path, values: &HashMap<String, Value>) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| Error::internal(format!("Failed to create settings dir: {e}")))?;
        }
    }
    let content = serde_json::to_string_pretty(values)?;
    tokio::fs::write(path, content)
        .await
        .map_err(|e| Error::internal(format!("Failed to write settings file: {e}")))
}

#[async_trait]
impl SettingsStore for FileSettingsStore {
    async fn load(&self, key: &str) -> Result<Option<Value>> {
        Ok(self.values.lock().await.get(key).cloned())
    }

    async fn save(&self, key: &str, value: Value) -> Result<()> {
        self.values.lock().await.insert(key.to_string(), value);
        self.schedule_flush();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn values_round_trip_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");

        {
            let store = FileSettingsStore::open(&path)
                .await
                .unwrap()
                .with_debounce(Duration::from_millis(1));
            store.save("alpha", json!({"x": 1})).await.unwrap();
            store.flush().await.unwrap();
        }

        let reopened = FileSettingsStore::open(&path).await.unwrap();
        assert_eq!(reopened.load("alpha").await.unwrap(), Some(json!({"x": 1})));
        assert_eq!(reopened.load("missing").await.unwrap(), None);
    }

    #[tokio::test]
    async fn debounced_writes_coalesce() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        let store = FileSettingsStore::open(&path)
            .await
            .unwrap()
            .with_debounce(Duration::from_millis(20));

        for i in 0..10 {
            store.save("counter", json!(i)).await.unwrap();
        }
        // Memory state is current even before the flush fires
        assert_eq!(store.load("counter").await.unwrap(), Some(json!(9)));

        tokio::time::sleep(Duration::from_millis(60)).await;
        let on_disk: HashMap<String, Value> =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(on_disk["counter"], json!(9));
    }
}
