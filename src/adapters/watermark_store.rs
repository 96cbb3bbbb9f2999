use async_trait::async_trait;
use std::path::PathBuf;
use tokio::fs;
use tokio::sync::RwLock;

use crate::domain::SyncState;
use crate::error::WatermarkError;
use crate::ports::WatermarkStore;

/// JSON file holding the watermark and retry set of the last completed sync run.
pub struct FileWatermarkStore {
    path: PathBuf,
}

impl FileWatermarkStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &std::path::Path {
        &self.path
    }
}

#[async_trait]
impl WatermarkStore for FileWatermarkStore {
    async fn load(&self) -> Result<SyncState, WatermarkError> {
        let raw = match fs::read(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(SyncState::default()),
            Err(e) => return Err(e.into()),
        };

        Ok(serde_json::from_slice(&raw)?)
    }

    async fn store(&self, state: &SyncState) -> Result<(), WatermarkError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await?;
            }
        }

        let body = serde_json::to_vec_pretty(state)?;

        let temp_path = self.path.with_extension("tmp");
        fs::write(&temp_path, body).await?;
        fs::rename(&temp_path, &self.path).await?;

        tracing::debug!(
            path = %self.path.display(),
            watermark = ?state.watermark,
            retry = state.retry_shop_ids.len(),
            "Sync state stored"
        );
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryWatermarkStore {
    state: RwLock<SyncState>,
}

impl InMemoryWatermarkStore {
    pub fn new(initial: SyncState) -> Self {
        Self {
            state: RwLock::new(initial),
        }
    }
}

#[async_trait]
impl WatermarkStore for InMemoryWatermarkStore {
    async fn load(&self) -> Result<SyncState, WatermarkError> {
        Ok(self.state.read().await.clone())
    }

    async fn store(&self, state: &SyncState) -> Result<(), WatermarkError> {
        *self.state.write().await = state.clone();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    #[tokio::test]
    async fn test_missing_file_loads_as_empty_state() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileWatermarkStore::new(dir.path().join("watermark.json"));
        assert_eq!(store.load().await.unwrap(), SyncState::default());
    }

    #[tokio::test]
    async fn test_store_then_load_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileWatermarkStore::new(dir.path().join("nested/state/watermark.json"));
        let mut state = SyncState::new(Some(Utc.with_ymd_and_hms(2024, 5, 17, 8, 30, 0).unwrap()));
        state.retry_shop_ids.insert("2002".to_string());

        store.store(&state).await.unwrap();

        assert_eq!(store.load().await.unwrap(), state);
        assert!(!store.path().with_extension("tmp").exists());
    }

    #[tokio::test]
    async fn test_file_without_retry_set_loads() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("watermark.json");
        std::fs::write(&path, br#"{"watermark": "2024-05-17T08:30:00Z"}"#).unwrap();

        let state = FileWatermarkStore::new(path).load().await.unwrap();
        assert_eq!(
            state.watermark,
            Some(Utc.with_ymd_and_hms(2024, 5, 17, 8, 30, 0).unwrap())
        );
        assert!(state.retry_shop_ids.is_empty());
    }

    #[tokio::test]
    async fn test_corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("watermark.json");
        std::fs::write(&path, b"not json").unwrap();

        let store = FileWatermarkStore::new(path);
        assert!(matches!(store.load().await, Err(WatermarkError::Corrupt(_))));
    }

    #[tokio::test]
    async fn test_in_memory_store() {
        let store = InMemoryWatermarkStore::default();
        assert_eq!(store.load().await.unwrap(), SyncState::default());

        let state = SyncState::new(Some(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()));
        store.store(&state).await.unwrap();
        assert_eq!(store.load().await.unwrap(), state);
    }
}
