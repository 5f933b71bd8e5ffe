//! Ordered prompt sections and their rendering.
//!
//! The prompt is an explicit list of `(header, body)` pairs rendered in
//! insertion order, so the output is byte-for-byte reproducible for a given
//! state. Rendering is deterministic: no time or randomness is involved.

pub const CORE_RULES: &str = "CORE RULES";
pub const PROJECT_STATE: &str = "PROJECT STATE";
pub const LOCAL_CONTEXT: &str = "LOCAL CONTEXT";
pub const RECENT_DIALOGUE: &str = "RECENT DIALOGUE";
pub const QUERY: &str = "QUERY";

/// One `### [HEADER]` block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptSection {
    pub header: &'static str,
    pub body: String,
}

/// An ordered list of prompt sections.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PromptTemplate {
    sections: Vec<PromptSection>,
}

impl PromptTemplate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a section.
    pub fn section(mut self, header: &'static str, body: impl Into<String>) -> Self {
        self.sections.push(PromptSection {
            header,
            body: body.into(),
        });
        self
    }

    pub fn sections(&self) -> &[PromptSection] {
        &self.sections
    }

    /// Body of the first section with this header.
    pub fn body(&self, header: &str) -> Option<&str> {
        self.sections
            .iter()
            .find(|s| s.header == header)
            .map(|s| s.body.as_str())
    }

    /// Render as `### [HEADER]\nbody` blocks separated by a blank line,
    /// ending with a newline.
    pub fn render(&self) -> String {
        let mut out = self
            .sections
            .iter()
            .map(|s| format!("### [{}]\n{}", s.header, s.body))
            .collect::<Vec<_>>()
            .join("\n\n");
        out.push('\n');
        out
    }
}
