//! Token estimation utilities.
//!
//! Uses a character-based heuristic: ~4 characters per token, rounded down.
//! It only has to be stable, not exact: the estimate drives the
//! summarization trigger, never a hard context limit.

/// Estimate the token count for a string: `floor(chars / 4)`.
pub fn estimate_tokens(text: &str) -> usize {
    text.chars().count() / 4
}

/// Estimate tokens for buffered dialogue, joined one entry per line.
pub fn estimate_buffer_tokens(entries: &[String]) -> usize {
    estimate_tokens(&entries.join("\n"))
}
