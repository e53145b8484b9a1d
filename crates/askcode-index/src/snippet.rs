//! Snippet rendering for retrieved chunks.

use crate::languages::Lang;
use crate::types::{ChunkId, ChunkRecord};

/// A retrieved chunk rendered for a downstream consumer.
#[derive(Debug, Clone, PartialEq)]
pub struct Snippet {
    pub id: ChunkId,
    pub path: String,
    pub language: Option<Lang>,
    pub start_line: usize,
    pub end_line: usize,
    /// Cosine distance from the query.
    pub distance: f32,
    /// Raw chunk text.
    pub content: String,
    /// Header plus fenced content, as produced by [`make_snippet`].
    pub text: String,
}

impl Snippet {
    #[must_use]
    pub fn from_record(record: &ChunkRecord, distance: f32) -> Self {
        Self {
            id: record.id,
            path: record.path.clone(),
            language: record.language,
            start_line: record.start_line,
            end_line: record.end_line,
            distance,
            content: record.content.clone(),
            text: make_snippet(
                &record.path,
                record.language,
                record.start_line,
                record.end_line,
                &record.content,
            ),
        }
    }

    /// Length counted against the context budget, in characters.
    #[must_use]
    pub fn char_len(&self) -> usize {
        self.text.chars().count()
    }
}

/// Render one chunk as a path header followed by a fenced code block.
#[must_use]
pub fn make_snippet(
    path: &str,
    language: Option<Lang>,
    start_line: usize,
    end_line: usize,
    content: &str,
) -> String {
    let fence = language.map_or("", Lang::id);
    format!("# Path: {path}  (lines {start_line}-{end_line})\n```{fence}\n{content}\n```")
}

/// Concatenate snippets in order, separated by a blank line.
#[must_use]
pub fn format_context(snippets: &[Snippet]) -> String {
    snippets
        .iter()
        .map(|s| s.text.as_str())
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// First `max_lines` lines of `content`, with a trailing `...` when cut.
#[must_use]
pub fn preview(content: &str, max_lines: usize) -> String {
    let mut lines = content.lines();
    let mut out = lines.by_ref().take(max_lines).collect::<Vec<_>>().join("\n");
    if lines.next().is_some() {
        out.push_str("\n...");
    }
    out
}
