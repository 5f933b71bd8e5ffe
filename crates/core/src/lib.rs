//! # TutorStitch Core
//!
//! Domain types, traits, and error definitions for the TutorStitch context
//! engine. This crate has **no framework dependencies**: it defines the
//! per-user state record and the seams (storage, generation) that the other
//! crates implement against.
//!
//! ## Design Philosophy
//!
//! Every external collaborator is a trait here. Implementations live in
//! their respective crates:
//! - [`StateStore`] — keyed persistence of [`ContextState`] records
//! - [`Provider`] — the text-generation service that receives the prompt

pub mod error;
pub mod provider;
pub mod state;
pub mod store;

// Re-export key types at crate root for ergonomics
pub use error::{Error, ProviderError, Result, StoreError};
pub use provider::{Provider, ProviderRequest, ProviderResponse, Usage};
pub use state::{ContextState, DEFAULT_SUMMARY, Milestone};
pub use store::{StateStore, validate_key};
