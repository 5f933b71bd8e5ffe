//! StateStore trait — keyed persistence for per-user context state.
//!
//! The stitcher never touches storage; a session layer loads a record with
//! [`StateStore::get`], mutates it through the stitcher and writes it back
//! with [`StateStore::put`]. Writes are last-write-wins per key.

use async_trait::async_trait;

use crate::error::StoreError;
use crate::state::ContextState;

/// The core StateStore trait.
///
/// Implementations: JSON files, SQLite, in-memory (for testing), none (no-op).
#[async_trait]
pub trait StateStore: Send + Sync {
    /// The backend name (e.g., "file", "sqlite", "none").
    fn name(&self) -> &str;

    /// Fetch the record for a user. `Ok(None)` means no record exists yet.
    async fn get(&self, user_key: &str) -> Result<Option<ContextState>, StoreError>;

    /// Insert or overwrite the record for a user.
    async fn put(&self, user_key: &str, state: &ContextState) -> Result<(), StoreError>;

    /// Delete a user's record. Returns whether one existed.
    async fn delete(&self, user_key: &str) -> Result<bool, StoreError>;

    /// List every stored user key, sorted.
    async fn keys(&self) -> Result<Vec<String>, StoreError>;
}

/// Reject keys that cannot be used safely as a record name.
///
/// Keys become file names in the file store, so path separators, parent
/// references and control characters are refused everywhere to keep the
/// backends interchangeable.
pub fn validate_key(user_key: &str) -> Result<(), StoreError> {
    let invalid = user_key.is_empty()
        || user_key.len() > 128
        || user_key == "."
        || user_key == ".."
        || user_key
            .chars()
            .any(|c| c == '/' || c == '\\' || c.is_control());
    if invalid {
        return Err(StoreError::InvalidKey(user_key.to_string()));
    }
    Ok(())
}
