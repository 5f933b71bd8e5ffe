//! File-based state store — one pretty-printed JSON document per user.
//!
//! Each record lives at `<dir>/<user_key>_state.json`, which keeps the files
//! human-inspectable and compatible with records written by earlier
//! deployments. Writes go to a temporary sibling and are renamed into place,
//! so a crash mid-write never leaves a truncated record behind.
//!
//! Storage location: `~/.tutorstitch/state/`

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use tutorstitch_core::error::StoreError;
use tutorstitch_core::state::ContextState;
use tutorstitch_core::store::{StateStore, validate_key};

const RECORD_SUFFIX: &str = "_state.json";

/// A directory of JSON state records.
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    /// Create a store rooted at `dir`. The directory is created on first write.
    pub fn new(dir: PathBuf) -> Self {
        debug!(dir = %dir.display(), "File state store configured");
        Self { dir }
    }

    /// The directory holding the records.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn record_path(&self, user_key: &str) -> PathBuf {
        self.dir.join(format!("{user_key}{RECORD_SUFFIX}"))
    }
}

#[async_trait]
impl StateStore for FileStore {
    fn name(&self) -> &str {
        "file"
    }

    async fn get(&self, user_key: &str) -> Result<Option<ContextState>, StoreError> {
        validate_key(user_key)?;
        let path = self.record_path(user_key);

        let content = match tokio::fs::read_to_string(&path).await {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(StoreError::Storage(format!(
                    "Failed to read {}: {e}",
                    path.display()
                )));
            }
        };

        let state = serde_json::from_str::<ContextState>(&content).map_err(|e| {
            warn!(key = user_key, error = %e, "Corrupt state record");
            StoreError::Corrupt {
                key: user_key.to_string(),
                reason: e.to_string(),
            }
        })?;

        debug!(key = user_key, "State record loaded");
        Ok(Some(state))
    }

    async fn put(&self, user_key: &str, state: &ContextState) -> Result<(), StoreError> {
        validate_key(user_key)?;

        tokio::fs::create_dir_all(&self.dir).await.map_err(|e| {
            StoreError::Storage(format!("Failed to create state directory: {e}"))
        })?;

        let json = serde_json::to_string_pretty(state).map_err(|e| {
            StoreError::Storage(format!("Failed to serialize state record: {e}"))
        })?;

        let path = self.record_path(user_key);
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, json.as_bytes())
            .await
            .map_err(|e| StoreError::Storage(format!("Failed to write state file: {e}")))?;
        tokio::fs::rename(&tmp, &path)
            .await
            .map_err(|e| StoreError::Storage(format!("Failed to replace state file: {e}")))?;

        debug!(key = user_key, "State record saved");
        Ok(())
    }

    async fn delete(&self, user_key: &str) -> Result<bool, StoreError> {
        validate_key(user_key)?;
        match tokio::fs::remove_file(self.record_path(user_key)).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(StoreError::Storage(format!(
                "Failed to delete state file: {e}"
            ))),
        }
    }

    async fn keys(&self) -> Result<Vec<String>, StoreError> {
        let mut dir = match tokio::fs::read_dir(&self.dir).await {
            Ok(d) => d,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(StoreError::Storage(format!(
                    "Failed to list state directory: {e}"
                )));
            }
        };

        let mut keys = Vec::new();
        while let Some(entry) = dir
            .next_entry()
            .await
            .map_err(|e| StoreError::Storage(format!("Failed to list state directory: {e}")))?
        {
            let name = entry.file_name();
            if let Some(key) = name.to_str().and_then(|n| n.strip_suffix(RECORD_SUFFIX)) {
                keys.push(key.to_string());
            }
        }
        keys.sort();
        Ok(keys)
    }
}
