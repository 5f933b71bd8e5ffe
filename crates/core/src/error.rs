//! Error types for the TutorStitch domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Rendering and summarization are infallible; the session operations fail
//! only on storage problems or a stage with no room left to advance.

use thiserror::Error;

/// The error returned by session operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Store errors ---
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    // --- Stage progression ---
    #[error("Stage {stage} is the last representable stage and cannot be advanced")]
    StageOutOfRange { stage: u32 },
}

impl Error {
    /// Whether the caller sent something unusable, as opposed to a
    /// failure on our side.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Error::Store(StoreError::InvalidKey(_)) | Error::StageOutOfRange { .. }
        )
    }
}

/// Result type alias using our Error.
pub type Result<T, E = Error> = std::result::Result<T, E>;

// --- Bounded context errors ---

/// Failures of a [`crate::StateStore`]. A missing record is not an error;
/// stores report it as `Ok(None)`.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Query failed: {0}")]
    QueryFailed(String),

    #[error("Corrupt record for '{key}': {reason}")]
    Corrupt { key: String, reason: String },

    #[error("Invalid user key '{0}'")]
    InvalidKey(String),

    #[error("Migration failed: {0}")]
    MigrationFailed(String),
}

#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),
}
