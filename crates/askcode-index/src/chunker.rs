//! Overlapping line-window chunking.

use crate::error::{IndexError, Result};

/// One window of source text. Line numbers are 1-based and inclusive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineWindow {
    pub start_line: usize,
    pub end_line: usize,
    pub content: String,
}

/// Chunker configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkerConfig {
    /// Window height in lines (default: 120).
    pub max_lines: usize,
    /// Lines shared by consecutive windows (default: 20). Ignored when
    /// `overlap >= max_lines`.
    pub overlap: usize,
}

impl Default for ChunkerConfig {
    fn default() -> Self {
        Self {
            max_lines: 120,
            overlap: 20,
        }
    }
}

impl ChunkerConfig {
    /// # Errors
    ///
    /// Returns `InvalidChunking` if `max_lines` is zero.
    pub fn new(max_lines: usize, overlap: usize) -> Result<Self> {
        let config = Self { max_lines, overlap };
        config.validate()?;
        Ok(config)
    }

    /// # Errors
    ///
    /// Returns `InvalidChunking` if `max_lines` is zero.
    pub fn validate(&self) -> Result<()> {
        if self.max_lines == 0 {
            return Err(IndexError::InvalidChunking("max_lines must be > 0".into()));
        }
        Ok(())
    }

    /// Distance between consecutive window starts, never below 1.
    #[must_use]
    pub fn step(&self) -> usize {
        let step = if self.max_lines > self.overlap {
            self.max_lines - self.overlap
        } else {
            self.max_lines
        };
        step.max(1)
    }
}

/// Split `text` into overlapping windows of at most `max_lines` lines.
///
/// Windows start at line 1 and advance by [`ChunkerConfig::step`]; the last
/// window is truncated at the final line and iteration stops once a window
/// reaches it. Empty text yields no windows. `\n`, `\r\n` and a lone `\r`
/// all end a line.
#[must_use]
pub fn chunk_lines(text: &str, config: &ChunkerConfig) -> Vec<LineWindow> {
    let lines = split_lines(text);
    let total = lines.len();
    if total == 0 {
        return Vec::new();
    }

    let max_lines = config.max_lines.max(1);
    let step = config.step();
    let mut windows = Vec::with_capacity(total.div_ceil(step));
    let mut start = 0;

    while start < total {
        let end = (start + max_lines).min(total);
        windows.push(LineWindow {
            start_line: start + 1,
            end_line: end,
            content: lines[start..end].join("\n"),
        });
        if end == total {
            break;
        }
        start += step;
    }

    windows
}

/// Like [`str::lines`], but a lone `\r` is also a terminator.
fn split_lines(text: &str) -> Vec<&str> {
    let bytes = text.as_bytes();
    let mut lines = Vec::new();
    let mut start = 0;
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'\n' => {
                lines.push(&text[start..i]);
                i += 1;
                start = i;
            }
            b'\r' => {
                lines.push(&text[start..i]);
                i += 1;
                if bytes.get(i) == Some(&b'\n') {
                    i += 1;
                }
                start = i;
            }
            _ => i += 1,
        }
    }
    if start < bytes.len() {
        lines.push(&text[start..]);
    }
    lines
}
