//! Configuration loading, validation, and management for TutorStitch.
//!
//! Loads configuration from `~/.tutorstitch/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `~/.tutorstitch/config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Summarization policy, prompt rules and new-user defaults
    #[serde(default)]
    pub stitcher: StitcherConfig,

    /// Extra location facts, merged over the built-in table
    #[serde(default)]
    pub geo_facts: BTreeMap<String, String>,

    /// State persistence
    #[serde(default)]
    pub store: StoreConfig,

    /// HTTP gateway
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Text-generation service
    #[serde(default)]
    pub generation: GenerationConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StitcherConfig {
    /// Summarize once this many messages have been stitched since the last reset.
    #[serde(default = "default_max_interactions")]
    pub max_interactions: u32,

    /// Summarize once the buffered dialogue reaches this many estimated tokens.
    #[serde(default = "default_max_buffer_tokens")]
    pub max_buffer_tokens: usize,

    /// Length of the project lifecycle shown in the prompt. Display only.
    #[serde(default = "default_total_stages")]
    pub total_stages: u32,

    /// Label prefixed to every buffered user message.
    #[serde(default = "default_speaker_label")]
    pub speaker_label: String,

    /// Replaces the built-in core rules when set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub core_rules: Option<String>,

    /// Location given to users created without one.
    #[serde(default = "default_location")]
    pub default_location: String,

    /// Stage given to users created without one.
    #[serde(default = "default_stage")]
    pub default_stage: u32,
}

fn default_max_interactions() -> u32 {
    5
}
fn default_max_buffer_tokens() -> usize {
    500
}
fn default_total_stages() -> u32 {
    36
}
fn default_speaker_label() -> String {
    "Student".into()
}
fn default_location() -> String {
    "Erode".into()
}
fn default_stage() -> u32 {
    14
}

impl Default for StitcherConfig {
    fn default() -> Self {
        Self {
            max_interactions: default_max_interactions(),
            max_buffer_tokens: default_max_buffer_tokens(),
            total_stages: default_total_stages(),
            speaker_label: default_speaker_label(),
            core_rules: None,
            default_location: default_location(),
            default_stage: default_stage(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// "file", "sqlite", "memory" or "none"
    #[serde(default = "default_store_backend")]
    pub backend: String,

    /// Directory (file backend) or database file (sqlite backend).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

fn default_store_backend() -> String {
    "file".into()
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: default_store_backend(),
            path: None,
        }
    }
}

impl StoreConfig {
    /// The configured path, or the backend's default under the config dir.
    pub fn resolved_path(&self) -> PathBuf {
        match &self.path {
            Some(p) => PathBuf::from(p),
            None if self.backend == "sqlite" => AppConfig::config_dir().join("state.sqlite"),
            None => AppConfig::config_dir().join("state"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_host")]
    pub host: String,
}

fn default_port() -> u16 {
    42618
}
fn default_host() -> String {
    "127.0.0.1".into()
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            host: default_host(),
        }
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    /// Call the generation service after stitching
    #[serde(default)]
    pub enabled: bool,

    /// "openai", "openrouter", "ollama" or "custom"
    #[serde(default = "default_provider")]
    pub provider: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_provider() -> String {
    "openai".into()
}
fn default_model() -> String {
    "gpt-4o-mini".into()
}
fn default_temperature() -> f32 {
    0.7
}
fn default_max_tokens() -> u32 {
    1024
}
fn default_timeout_secs() -> u64 {
    60
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            provider: default_provider(),
            api_url: None,
            api_key: None,
            model: default_model(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// Redact a secret string for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for GenerationConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GenerationConfig")
            .field("enabled", &self.enabled)
            .field("provider", &self.provider)
            .field("api_url", &self.api_url)
            .field("api_key", &redact(&self.api_key))
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

impl AppConfig {
    /// Load configuration from the default path (~/.tutorstitch/config.toml).
    ///
    /// Also checks environment variables:
    /// - `TUTORSTITCH_API_KEY`, then `OPENAI_API_KEY`, then `OPENROUTER_API_KEY`
    /// - `TUTORSTITCH_MODEL`
    /// - `TUTORSTITCH_STORE` (store backend)
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::read_from(&config_path)?;
        config.apply_overrides(|name| std::env::var(name).ok());
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let config = Self::read_from(path)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse the file at `path` without validating it.
    fn read_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    /// Apply environment overrides, reading variables through `var`.
    fn apply_overrides(&mut self, var: impl Fn(&str) -> Option<String>) {
        if self.generation.api_key.is_none() {
            self.generation.api_key = var("TUTORSTITCH_API_KEY")
                .or_else(|| var("OPENAI_API_KEY"))
                .or_else(|| var("OPENROUTER_API_KEY"));
        }

        if let Some(model) = var("TUTORSTITCH_MODEL") {
            self.generation.model = model;
        }

        if let Some(backend) = var("TUTORSTITCH_STORE") {
            self.store.backend = backend;
        }
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".tutorstitch")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.stitcher.max_interactions == 0 {
            return Err(ConfigError::ValidationError(
                "stitcher.max_interactions must be at least 1".into(),
            ));
        }

        if self.stitcher.max_buffer_tokens == 0 {
            return Err(ConfigError::ValidationError(
                "stitcher.max_buffer_tokens must be at least 1".into(),
            ));
        }

        if self.stitcher.total_stages == 0 {
            return Err(ConfigError::ValidationError(
                "stitcher.total_stages must be at least 1".into(),
            ));
        }

        if self.stitcher.default_stage == u32::MAX {
            return Err(ConfigError::ValidationError(
                "stitcher.default_stage leaves no stage to advance to".into(),
            ));
        }

        if !matches!(
            self.store.backend.as_str(),
            "file" | "sqlite" | "memory" | "none"
        ) {
            return Err(ConfigError::ValidationError(format!(
                "unknown store backend '{}' (expected file, sqlite, memory or none)",
                self.store.backend
            )));
        }

        if self.generation.temperature < 0.0 || self.generation.temperature > 2.0 {
            return Err(ConfigError::ValidationError(
                "generation.temperature must be between 0.0 and 2.0".into(),
            ));
        }

        Ok(())
    }

    /// Generate a default config TOML string (for the `init` command).
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}
