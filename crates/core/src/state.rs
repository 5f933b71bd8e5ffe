//! Per-user conversational state — the record a [`crate::StateStore`] keeps.
//!
//! A `ContextState` is everything the stitcher needs to resume a user's
//! session: where they are, how far through the project lifecycle they have
//! got, the compressed summary of earlier dialogue and the raw turns that
//! have not been compressed yet.
//!
//! Records written by older deployments used `student_id` and
//! `major_decisions` as field names; both are accepted on import.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Summary carried by a fresh state, and by imported records that lack one.
pub const DEFAULT_SUMMARY: &str = "No hardware selected yet.";

/// The persisted state of one user's session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextState {
    /// Stable identity of the user; never changes after creation.
    #[serde(alias = "student_id")]
    pub user_key: String,

    /// Free-text location, used as the geo-fact lookup key.
    pub location: String,

    /// Current lifecycle stage. Only ever moves forward.
    pub current_stage: u32,

    /// Compressed memory of earlier dialogue.
    #[serde(default = "default_summary", alias = "major_decisions")]
    pub summary: String,

    /// Number of `stitch` calls since the last summarization.
    #[serde(default)]
    pub interaction_count: u32,

    /// Completed lifecycle milestones, oldest first.
    #[serde(default)]
    pub completed_milestones: Vec<Milestone>,

    /// Raw recent turns awaiting compression, oldest first.
    #[serde(default)]
    pub episodic_buffer: Vec<String>,
}

fn default_summary() -> String {
    DEFAULT_SUMMARY.to_string()
}

/// One completed stage of the project lifecycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Milestone {
    /// The stage that was completed (the stage number *before* advancing).
    pub stage: u32,

    /// Free-text description supplied by the caller.
    pub milestone: String,

    /// When the stage was completed, if known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
}

impl ContextState {
    /// Create a fresh state for a user with no persisted record.
    pub fn new(user_key: impl Into<String>, location: impl Into<String>, stage: u32) -> Self {
        Self {
            user_key: user_key.into(),
            location: location.into(),
            current_stage: stage,
            summary: default_summary(),
            interaction_count: 0,
            completed_milestones: Vec::new(),
            episodic_buffer: Vec::new(),
        }
    }
}
