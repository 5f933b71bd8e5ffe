//! Generation service providers for TutorStitch.
//!
//! All providers implement the `tutorstitch_core::Provider` trait.
//! [`build_from_config`] picks one based on the `[generation]` table.

pub mod openai_compat;
pub mod router;

pub use openai_compat::OpenAiCompatProvider;
pub use router::build_from_config;
