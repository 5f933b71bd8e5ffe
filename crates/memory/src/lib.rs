//! State store implementations for TutorStitch.

pub mod file_backend;
pub mod in_memory;
pub mod noop;

#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use file_backend::FileStore;
pub use in_memory::InMemoryStore;
pub use noop::NoopStore;

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteStore;

use std::sync::Arc;
use tutorstitch_config::StoreConfig;
use tutorstitch_core::error::StoreError;
use tutorstitch_core::store::StateStore;

/// Open the store selected by configuration.
pub async fn open_store(config: &StoreConfig) -> Result<Arc<dyn StateStore>, StoreError> {
    let store: Arc<dyn StateStore> = match config.backend.as_str() {
        "file" => Arc::new(FileStore::new(config.resolved_path())),
        #[cfg(feature = "sqlite")]
        "sqlite" => Arc::new(SqliteStore::new(&config.resolved_path()).await?),
        "memory" => Arc::new(InMemoryStore::new()),
        "none" => Arc::new(NoopStore),
        other => {
            return Err(StoreError::Storage(format!(
                "store backend '{other}' is not available in this build"
            )));
        }
    };
    tracing::info!(backend = store.name(), "State store opened");
    Ok(store)
}
