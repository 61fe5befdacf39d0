use serde::{Deserialize, Serialize};

/// Presentation category of one output line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LineCategory {
    Added,
    Removed,
    Heading,
    Plain,
}

/// Classify a line of diff-style output.
///
/// `+` is added, `-` is removed, a line starting with `Index` is a heading,
/// everything else is plain.
pub fn classify(line: &str) -> LineCategory {
    if line.starts_with('+') {
        LineCategory::Added
    } else if line.starts_with('-') {
        LineCategory::Removed
    } else if line.starts_with("Index") {
        LineCategory::Heading
    } else {
        LineCategory::Plain
    }
}
