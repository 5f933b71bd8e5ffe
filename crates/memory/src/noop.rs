//! No-op store — disables persistence entirely.
//!
//! Every request starts from a fresh state, which is what a stateless
//! prompt-preview deployment wants.

use async_trait::async_trait;
use tutorstitch_core::error::StoreError;
use tutorstitch_core::state::ContextState;
use tutorstitch_core::store::StateStore;

/// A store that remembers nothing.
pub struct NoopStore;

#[async_trait]
impl StateStore for NoopStore {
    fn name(&self) -> &str {
        "none"
    }

    async fn get(&self, _user_key: &str) -> Result<Option<ContextState>, StoreError> {
        Ok(None)
    }

    async fn put(&self, _user_key: &str, _state: &ContextState) -> Result<(), StoreError> {
        Ok(())
    }

    async fn delete(&self, _user_key: &str) -> Result<bool, StoreError> {
        Ok(false)
    }

    async fn keys(&self) -> Result<Vec<String>, StoreError> {
        Ok(Vec::new())
    }
}
