// ResultSink - append-only log of classified output lines
//
// The background worker appends; the foreground reads with cursor-based
// snapshots. Appends and snapshots hold the lock only for the push or the
// slice clone, so a reader never observes a partially written line.

use crate::services::classifier::{LineCategory, classify};
use std::sync::{Arc, PoisonError, RwLock};

/// One immutable line of operation output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputLine {
    text: String,
    category: LineCategory,
}

impl OutputLine {
    pub fn new(text: impl Into<String>, category: LineCategory) -> Self {
        Self {
            text: text.into(),
            category,
        }
    }

    /// Build a line and classify it.
    pub fn classified(text: impl Into<String>) -> Self {
        let text = text.into();
        let category = classify(&text);
        Self { text, category }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn category(&self) -> LineCategory {
        self.category
    }
}

/// Shared, append-only sequence of [`OutputLine`]s.
///
/// Cloning yields another handle to the same log.
#[derive(Debug, Clone, Default)]
pub struct ResultSink {
    lines: Arc<RwLock<Vec<OutputLine>>>,
}

impl ResultSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a line and return the new cursor position (the line count).
    pub fn append(&self, text: impl Into<String>, category: LineCategory) -> usize {
        self.push(OutputLine::new(text, category))
    }

    pub fn push(&self, line: OutputLine) -> usize {
        let mut lines = self.lines.write().unwrap_or_else(PoisonError::into_inner);
        tracing::trace!(category = ?line.category, "{}", line.text);
        lines.push(line);
        lines.len()
    }

    /// All lines appended at or after `from_cursor`, in append order.
    ///
    /// A cursor past the end yields an empty snapshot.
    pub fn snapshot(&self, from_cursor: usize) -> Vec<OutputLine> {
        let lines = self.lines.read().unwrap_or_else(PoisonError::into_inner);
        lines.get(from_cursor..).map(<[_]>::to_vec).unwrap_or_default()
    }

    /// Current cursor position.
    pub fn len(&self) -> usize {
        self.lines.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every line and reset the cursor to zero.
    ///
    /// Only call this once the producing operation is terminal.
    pub fn clear(&self) {
        self.lines.write().unwrap_or_else(PoisonError::into_inner).clear();
    }
}
