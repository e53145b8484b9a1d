//! Condensed-context summary files.

use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono::{DateTime, Local};

const MAX_SLUG_LEN: usize = 60;

pub const SUMMARY_SYSTEM_PROMPT: &str = "You are a local assistant. Your ONLY task is to compress and rephrase \
the following code snippets into a faithful, concise summary that preserves all important technical \
details needed to answer the question. Do not try to solve the problem. Do not explain. Only summarize \
relevant information clearly.";

/// User prompt pairing the question with the retrieved context.
#[must_use]
pub fn summary_prompt(question: &str, context: &str) -> String {
    format!("Question: {question}\n\nCode context:\n{context}")
}

/// Lowercase, collapse runs of non-alphanumerics to `-`, trim dashes, cap at 60 chars.
#[must_use]
pub fn slugify(text: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    for c in text.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
        } else if !slug.is_empty() && !slug.ends_with('-') {
            slug.push('-');
        }
    }
    let capped: String = slug.chars().take(MAX_SLUG_LEN).collect();
    capped.trim_matches('-').to_owned()
}

/// `summary_<slug>_<YYYYMMDD-HHMMSS>.txt` inside `dir`.
#[must_use]
pub fn summary_path(dir: &Path, slug: &str, at: DateTime<Local>) -> PathBuf {
    dir.join(format!("summary_{slug}_{}.txt", at.format("%Y%m%d-%H%M%S")))
}

/// Write `summary` under `dir`, naming it from `task` or else the question.
///
/// # Errors
///
/// Returns an error if the file cannot be written.
pub fn write_summary(
    dir: &Path,
    task: Option<&str>,
    question: &str,
    summary: &str,
) -> anyhow::Result<PathBuf> {
    let slug = task
        .map(slugify)
        .filter(|slug| !slug.is_empty())
        .unwrap_or_else(|| slugify(question));
    let slug = if slug.is_empty() { "untitled".to_owned() } else { slug };
    let path = summary_path(dir, &slug, Local::now());
    std::fs::write(&path, summary)
        .with_context(|| format!("failed to write summary to {}", path.display()))?;
    Ok(path)
}
