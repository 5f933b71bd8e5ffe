//! The context stitcher — rolling per-user memory and prompt assembly.
//!
//! Every call to [`ContextStitcher::stitch`] appends the user's message to
//! the episodic buffer and checks the dual-threshold trigger: once the
//! buffer holds enough messages *or* enough estimated tokens, the whole
//! buffer is compressed into the summary and cleared. The prompt is then
//! rendered from the updated state in five fixed layers:
//!
//! | Section | Source |
//! |---------|--------|
//! | CORE RULES | fixed at construction |
//! | PROJECT STATE | stage, summary, milestone count |
//! | LOCAL CONTEXT | location + geo fact |
//! | RECENT DIALOGUE | episodic buffer |
//! | QUERY | the incoming message |
//!
//! The stitcher is plain synchronous state. Callers serialize access per
//! user key (see [`crate::session::SessionManager`]).

use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tracing::{debug, info};
use tutorstitch_config::AppConfig;
use tutorstitch_core::error::{Error, Result};
use tutorstitch_core::state::{ContextState, Milestone};

use crate::geo::GeoFacts;
use crate::summarizer::{KeywordSummarizer, Summarizer};
use crate::template::{self, PromptTemplate};
use crate::token;

/// Rules placed at the top of every prompt unless configured otherwise.
pub const DEFAULT_CORE_RULES: &str = "1. Adhere to the 36-stage engineering lifecycle.\n\
2. Prioritize UN Sustainability Goal 14 (Life Below Water).\n\
3. Safety First: Include waterproofing warnings.";

pub const DEFAULT_SPEAKER_LABEL: &str = "Student";
pub const DEFAULT_TOTAL_STAGES: u32 = 36;

// ── Trigger policy ────────────────────────────────────────────────────────

/// Dual-threshold summarization trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TriggerPolicy {
    pub max_interactions: u32,
    pub max_buffer_tokens: usize,
}

impl Default for TriggerPolicy {
    fn default() -> Self {
        Self {
            max_interactions: 5,
            max_buffer_tokens: 500,
        }
    }
}

impl TriggerPolicy {
    /// Which threshold, if any, the current counters have reached.
    /// The interaction count is checked first.
    pub fn evaluate(&self, interaction_count: u32, buffer_tokens: usize) -> Option<TriggerReason> {
        if interaction_count >= self.max_interactions {
            Some(TriggerReason::InteractionCount)
        } else if buffer_tokens >= self.max_buffer_tokens {
            Some(TriggerReason::TokenVolume)
        } else {
            None
        }
    }
}

/// Why a summarization fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerReason {
    InteractionCount,
    TokenVolume,
}

/// Record of one summarization event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SummaryEvent {
    pub reason: TriggerReason,
    /// Interaction count at the moment the trigger fired.
    pub interaction_count: u32,
    /// Estimated tokens in the buffer at the moment the trigger fired.
    pub buffer_tokens: usize,
    /// Number of buffered messages folded into the summary.
    pub compressed_messages: usize,
    /// The new summary.
    pub summary: String,
}

/// Where the stitcher is in its summarization cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CyclePhase {
    /// Buffering messages; no summarization on the last call.
    Accumulating,
    /// The last call compressed and cleared the buffer.
    SummarizedAndReset,
}

/// The result of one stitch call.
#[derive(Debug, Clone)]
pub struct Stitched {
    pub prompt: String,
    pub summarized: Option<SummaryEvent>,
}

// ── Settings ──────────────────────────────────────────────────────────────

/// Everything about a stitcher that is not per-user state.
#[derive(Clone)]
pub struct StitcherSettings {
    pub core_rules: String,
    pub speaker_label: String,
    pub total_stages: u32,
    pub policy: TriggerPolicy,
    pub geo: Arc<GeoFacts>,
    pub summarizer: Arc<dyn Summarizer>,
}

impl Default for StitcherSettings {
    fn default() -> Self {
        Self {
            core_rules: DEFAULT_CORE_RULES.to_string(),
            speaker_label: DEFAULT_SPEAKER_LABEL.to_string(),
            total_stages: DEFAULT_TOTAL_STAGES,
            policy: TriggerPolicy::default(),
            geo: Arc::new(GeoFacts::builtin()),
            summarizer: Arc::new(KeywordSummarizer),
        }
    }
}

impl StitcherSettings {
    /// Build settings from the `[stitcher]` and `[geo_facts]` tables.
    pub fn from_config(config: &AppConfig) -> Self {
        let cfg = &config.stitcher;
        let mut geo = GeoFacts::builtin();
        geo.extend(config.geo_facts.clone());

        Self {
            core_rules: cfg
                .core_rules
                .clone()
                .unwrap_or_else(|| DEFAULT_CORE_RULES.to_string()),
            speaker_label: cfg.speaker_label.clone(),
            total_stages: cfg.total_stages,
            policy: TriggerPolicy {
                max_interactions: cfg.max_interactions,
                max_buffer_tokens: cfg.max_buffer_tokens,
            },
            geo: Arc::new(geo),
            summarizer: Arc::new(KeywordSummarizer),
        }
    }

    /// Replace the summarization strategy.
    pub fn with_summarizer(mut self, summarizer: Arc<dyn Summarizer>) -> Self {
        self.summarizer = summarizer;
        self
    }
}

// ── Stitcher ──────────────────────────────────────────────────────────────

/// Per-user context stitcher.
pub struct ContextStitcher {
    state: ContextState,
    settings: StitcherSettings,
    phase: CyclePhase,
}

impl ContextStitcher {
    /// A fresh stitcher with default settings.
    pub fn new(user_key: impl Into<String>, location: impl Into<String>, stage: u32) -> Self {
        Self::restore(
            ContextState::new(user_key, location, stage),
            StitcherSettings::default(),
        )
    }

    /// Resume from a previously exported state.
    pub fn restore(state: ContextState, settings: StitcherSettings) -> Self {
        Self {
            state,
            settings,
            phase: CyclePhase::Accumulating,
        }
    }

    pub fn state(&self) -> &ContextState {
        &self.state
    }

    pub fn settings(&self) -> &StitcherSettings {
        &self.settings
    }

    pub fn phase(&self) -> CyclePhase {
        self.phase
    }

    /// A copy of the state, ready to persist.
    pub fn export(&self) -> ContextState {
        self.state.clone()
    }

    pub fn into_state(self) -> ContextState {
        self.state
    }

    /// Estimated tokens currently held in the episodic buffer.
    pub fn buffer_tokens(&self) -> usize {
        token::estimate_buffer_tokens(&self.state.episodic_buffer)
    }

    /// Record a message and return the prompt to send to the model.
    pub fn stitch(&mut self, message: &str) -> String {
        self.stitch_detailed(message).prompt
    }

    /// Like [`stitch`](Self::stitch), but also reports whether the buffer
    /// was summarized.
    pub fn stitch_detailed(&mut self, message: &str) -> Stitched {
        self.state
            .episodic_buffer
            .push(format!("{}: {}", self.settings.speaker_label, message));
        self.state.interaction_count = self.state.interaction_count.saturating_add(1);

        let buffer_tokens = self.buffer_tokens();
        let summarized = self
            .settings
            .policy
            .evaluate(self.state.interaction_count, buffer_tokens)
            .map(|reason| self.summarize_and_reset(reason, buffer_tokens));

        self.phase = if summarized.is_some() {
            CyclePhase::SummarizedAndReset
        } else {
            CyclePhase::Accumulating
        };

        Stitched {
            prompt: self.render(message),
            summarized,
        }
    }

    fn summarize_and_reset(&mut self, reason: TriggerReason, buffer_tokens: usize) -> SummaryEvent {
        let summary = self.settings.summarizer.summarize(&self.state.episodic_buffer);
        let event = SummaryEvent {
            reason,
            interaction_count: self.state.interaction_count,
            buffer_tokens,
            compressed_messages: self.state.episodic_buffer.len(),
            summary: summary.clone(),
        };

        self.state.summary = summary;
        self.state.episodic_buffer.clear();
        self.state.interaction_count = 0;

        info!(
            user = %self.state.user_key,
            reason = ?event.reason,
            interactions = event.interaction_count,
            buffer_tokens = event.buffer_tokens,
            compressed = event.compressed_messages,
            summarizer = self.settings.summarizer.name(),
            summary = %event.summary,
            "Summarization triggered"
        );
        event
    }

    /// Mark the current stage complete and move to the next one.
    ///
    /// Fails without touching the state when the stage is already
    /// `u32::MAX`.
    pub fn advance_stage(&mut self, milestone: &str) -> Result<()> {
        let completed = self.state.current_stage;
        let next = completed
            .checked_add(1)
            .ok_or(Error::StageOutOfRange { stage: completed })?;
        self.state.current_stage = next;
        self.state.completed_milestones.push(Milestone {
            stage: completed,
            milestone: milestone.to_string(),
            timestamp: Some(Utc::now()),
        });
        debug!(
            user = %self.state.user_key,
            stage = self.state.current_stage,
            milestone,
            "Advanced stage"
        );
        Ok(())
    }

    /// The prompt sections for `message` against the current state.
    pub fn sections(&self, message: &str) -> PromptTemplate {
        let s = &self.state;
        PromptTemplate::new()
            .section(template::CORE_RULES, self.settings.core_rules.as_str())
            .section(
                template::PROJECT_STATE,
                format!(
                    "Stage: {}/{} | Decisions: {}\nCompleted Milestones: {}",
                    s.current_stage,
                    self.settings.total_stages,
                    s.summary,
                    s.completed_milestones.len()
                ),
            )
            .section(
                template::LOCAL_CONTEXT,
                format!(
                    "Location: {} | Alert: {}",
                    s.location,
                    self.settings.geo.lookup(&s.location)
                ),
            )
            .section(template::RECENT_DIALOGUE, s.episodic_buffer.join("\n"))
            .section(template::QUERY, message)
    }

    /// Render the prompt for `message` without changing any state.
    pub fn render(&self, message: &str) -> String {
        self.sections(message).render()
    }
}
