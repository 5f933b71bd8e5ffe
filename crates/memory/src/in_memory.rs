//! In-memory store — useful for testing, demos and ephemeral sessions.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tutorstitch_core::error::StoreError;
use tutorstitch_core::state::ContextState;
use tutorstitch_core::store::{StateStore, validate_key};

/// A store that keeps records in a HashMap for the life of the process.
#[derive(Clone)]
pub struct InMemoryStore {
    records: Arc<RwLock<HashMap<String, ContextState>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            records: Arc::new(RwLock::new(HashMap::new())),
        }
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StateStore for InMemoryStore {
    fn name(&self) -> &str {
        "in_memory"
    }

    async fn get(&self, user_key: &str) -> Result<Option<ContextState>, StoreError> {
        validate_key(user_key)?;
        Ok(self.records.read().await.get(user_key).cloned())
    }

    async fn put(&self, user_key: &str, state: &ContextState) -> Result<(), StoreError> {
        validate_key(user_key)?;
        self.records
            .write()
            .await
            .insert(user_key.to_string(), state.clone());
        Ok(())
    }

    async fn delete(&self, user_key: &str) -> Result<bool, StoreError> {
        validate_key(user_key)?;
        Ok(self.records.write().await.remove(user_key).is_some())
    }

    async fn keys(&self) -> Result<Vec<String>, StoreError> {
        let mut keys: Vec<String> = self.records.read().await.keys().cloned().collect();
        keys.sort();
        Ok(keys)
    }
}
