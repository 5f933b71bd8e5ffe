//! # TutorStitch Engine
//!
//! Hierarchical context stitching for a project-tutoring chatbot.
//!
//! Each user has a rolling memory with two tiers: a short episodic buffer of
//! recent messages and a one-line summary of everything older. When the
//! buffer grows past a message-count or token threshold it is compressed
//! into the summary and cleared. Every message produces a prompt built from
//! fixed rules, project progress, a location advisory, the recent dialogue
//! and the query itself.
//!
//! - [`stitcher`] — per-user state machine and prompt assembly
//! - [`summarizer`] — buffer compression strategies
//! - [`session`] — persistence, per-user locking and generation calls

pub mod geo;
pub mod session;
pub mod stitcher;
pub mod summarizer;
pub mod template;
pub mod token;

pub use geo::GeoFacts;
pub use session::{
    ChatReply, GenerationSettings, NewUserDefaults, SessionManager, StitchReply, StitchRequest,
};
pub use stitcher::{
    ContextStitcher, CyclePhase, StitcherSettings, Stitched, SummaryEvent, TriggerPolicy,
    TriggerReason,
};
pub use summarizer::{KeywordSummarizer, Summarizer};
pub use template::PromptTemplate;
