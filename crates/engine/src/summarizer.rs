//! Summarization strategies for the episodic buffer.
//!
//! A [`Summarizer`] compresses the buffered dialogue into a single line that
//! replaces the previous summary. The stitcher only depends on the trait, so
//! the keyword heuristic here can be swapped for a model-backed strategy
//! without touching the trigger and reset logic.

/// Summary produced for an empty buffer.
pub const EMPTY_BUFFER_SUMMARY: &str = "Initial phase.";

/// Compresses buffered dialogue into a summary line.
pub trait Summarizer: Send + Sync {
    /// Strategy name, for logs.
    fn name(&self) -> &str;

    /// Summarize `entries` (oldest first). Must be pure.
    fn summarize(&self, entries: &[String]) -> String;
}

/// A topic detected by keyword presence.
#[derive(Debug, Clone, Copy)]
pub struct TopicGroup {
    pub keywords: &'static [&'static str],
    pub phrase: &'static str,
}

/// Topic groups, in the order their phrases appear in a summary.
pub const TOPIC_GROUPS: [TopicGroup; 5] = [
    TopicGroup {
        keywords: &["sensor", "hardware"],
        phrase: "Discussed sensor/hardware selection",
    },
    TopicGroup {
        keywords: &["data", "collect"],
        phrase: "Explored data collection methods",
    },
    TopicGroup {
        keywords: &["cost", "budget"],
        phrase: "Considered budget constraints",
    },
    TopicGroup {
        keywords: &["pollution", "water quality"],
        phrase: "Analyzed water quality parameters",
    },
    TopicGroup {
        keywords: &["filter", "treatment"],
        phrase: "Evaluated filtration/treatment systems",
    },
];

/// Words that mark an entry as recording a decision.
pub const DECISION_KEYWORDS: [&str; 3] = ["select", "choose", "decided"];

/// How many trailing entries are searched for the decision snippet.
const DECISION_WINDOW: usize = 3;
const DECISION_SNIPPET_CHARS: usize = 60;
const FOCUS_SNIPPET_CHARS: usize = 80;

/// Keyword-matching summarizer.
///
/// Emits one fixed phrase per topic group found anywhere in the buffer, then
/// at most one decision snippet. When a decision keyword appears anywhere in
/// the buffer, only the last three entries are searched for the snippet, so
/// an older decision can be detected without being quoted. When nothing
/// matches, the summary quotes the most recent entry instead.
#[derive(Debug, Clone, Copy, Default)]
pub struct KeywordSummarizer;

impl KeywordSummarizer {
    fn decision_snippet(entries: &[String], text: &str) -> Option<String> {
        if !contains_any(text, &DECISION_KEYWORDS) {
            return None;
        }
        let start = entries.len().saturating_sub(DECISION_WINDOW);
        entries[start..]
            .iter()
            .find(|entry| contains_any(&entry.to_lowercase(), &DECISION_KEYWORDS))
            .map(|entry| {
                format!(
                    "Decision: {}...",
                    truncate_chars(entry, DECISION_SNIPPET_CHARS)
                )
            })
    }
}

impl Summarizer for KeywordSummarizer {
    fn name(&self) -> &str {
        "keyword"
    }

    fn summarize(&self, entries: &[String]) -> String {
        let Some(last) = entries.last() else {
            return EMPTY_BUFFER_SUMMARY.to_string();
        };

        let text = entries.join(" ").to_lowercase();

        let mut points: Vec<String> = TOPIC_GROUPS
            .iter()
            .filter(|group| contains_any(&text, group.keywords))
            .map(|group| group.phrase.to_string())
            .collect();

        if let Some(snippet) = Self::decision_snippet(entries, &text) {
            points.push(snippet);
        }

        if points.is_empty() {
            format!(
                "Recent focus: {}...",
                truncate_chars(last, FOCUS_SNIPPET_CHARS)
            )
        } else {
            points.join(" | ")
        }
    }
}

fn contains_any(text: &str, keywords: &[&str]) -> bool {
    keywords.iter().any(|k| text.contains(k))
}

/// The first `max` characters of `text`, never splitting a character.
pub fn truncate_chars(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
