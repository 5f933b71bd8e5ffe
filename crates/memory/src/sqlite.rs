//! SQLite state store.
//!
//! One row per user in `context_states`. The full record is kept as a JSON
//! document so that missing fields default exactly as they do for the file
//! store; `location` and `current_stage` are mirrored into columns for
//! ad-hoc inspection.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Row, SqlitePool};
use std::path::Path;
use std::str::FromStr;
use tracing::{debug, info, warn};
use tutorstitch_core::error::StoreError;
use tutorstitch_core::state::ContextState;
use tutorstitch_core::store::{StateStore, validate_key};

/// A SQLite-backed state store.
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open (or create) the database file at `path`.
    pub async fn new(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                StoreError::Storage(format!("Failed to create database directory: {e}"))
            })?;
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal);

        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await
            .map_err(|e| StoreError::Storage(format!("Failed to open SQLite: {e}")))?;

        let store = Self { pool };
        store.run_migrations().await?;
        info!("SQLite state store initialized at {}", path.display());
        Ok(store)
    }

    /// An ephemeral in-process database. A single connection keeps every
    /// query on the same memory database.
    pub async fn in_memory() -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")
            .map_err(|e| StoreError::Storage(format!("Invalid SQLite path: {e}")))?;
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .map_err(|e| StoreError::Storage(format!("Failed to open SQLite: {e}")))?;

        let store = Self { pool };
        store.run_migrations().await?;
        Ok(store)
    }

    async fn run_migrations(&self) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS context_states (
                user_key      TEXT PRIMARY KEY NOT NULL,
                location      TEXT NOT NULL,
                current_stage INTEGER NOT NULL,
                record        TEXT NOT NULL,
                updated_at    TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::MigrationFailed(format!("context_states table: {e}")))?;

        Ok(())
    }
}

#[async_trait]
impl StateStore for SqliteStore {
    fn name(&self) -> &str {
        "sqlite"
    }

    async fn get(&self, user_key: &str) -> Result<Option<ContextState>, StoreError> {
        validate_key(user_key)?;
        let row = sqlx::query("SELECT record FROM context_states WHERE user_key = ?1")
            .bind(user_key)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StoreError::QueryFailed(format!("GET by key: {e}")))?;

        let Some(row) = row else {
            return Ok(None);
        };

        let record: String = row
            .try_get("record")
            .map_err(|e| StoreError::QueryFailed(format!("record column: {e}")))?;

        let state = serde_json::from_str::<ContextState>(&record).map_err(|e| {
            warn!(key = user_key, error = %e, "Corrupt state record");
            StoreError::Corrupt {
                key: user_key.to_string(),
                reason: e.to_string(),
            }
        })?;
        Ok(Some(state))
    }

    async fn put(&self, user_key: &str, state: &ContextState) -> Result<(), StoreError> {
        validate_key(user_key)?;
        let record = serde_json::to_string(state)
            .map_err(|e| StoreError::Storage(format!("Record serialization: {e}")))?;

        sqlx::query(
            r#"
            INSERT INTO context_states (user_key, location, current_stage, record, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ON CONFLICT(user_key) DO UPDATE SET
                location = excluded.location,
                current_stage = excluded.current_stage,
                record = excluded.record,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(user_key)
        .bind(&state.location)
        .bind(i64::from(state.current_stage))
        .bind(&record)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Storage(format!("UPSERT failed: {e}")))?;

        debug!(key = user_key, "State record saved");
        Ok(())
    }

    async fn delete(&self, user_key: &str) -> Result<bool, StoreError> {
        validate_key(user_key)?;
        let result = sqlx::query("DELETE FROM context_states WHERE user_key = ?1")
            .bind(user_key)
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Storage(format!("DELETE failed: {e}")))?;

        Ok(result.rows_affected() > 0)
    }

    async fn keys(&self) -> Result<Vec<String>, StoreError> {
        let rows = sqlx::query("SELECT user_key FROM context_states ORDER BY user_key")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StoreError::QueryFailed(format!("LIST keys: {e}")))?;

        rows.iter()
            .map(|r| {
                r.try_get::<String, _>("user_key")
                    .map_err(|e| StoreError::QueryFailed(format!("user_key column: {e}")))
            })
            .collect()
    }
}
