//! Source locations.
//!
//! The host owns the source text; the checker only carries the positions it
//! was handed so that diagnostics can be rendered by the host afterwards.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A region of source code, as reported by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Span {
    /// Byte offset of the first character.
    #[serde(default)]
    pub start: usize,
    /// Byte offset one past the last character.
    #[serde(default)]
    pub end: usize,
    /// 1-based line number (0 when unknown).
    #[serde(default)]
    pub line: u32,
    /// 1-based column number (0 when unknown).
    #[serde(default)]
    pub column: u32,
}

impl Span {
    /// Create a new span.
    pub fn new(start: usize, end: usize, line: u32, column: u32) -> Self {
        Self {
            start,
            end,
            line,
            column,
        }
    }

    /// A span pointing at a line/column without byte offsets.
    pub fn at(line: u32, column: u32) -> Self {
        Self {
            start: 0,
            end: 0,
            line,
            column,
        }
    }

    /// A placeholder span for synthesized nodes.
    pub fn dummy() -> Self {
        Self::default()
    }

    /// Whether this span carries no position information.
    pub fn is_dummy(&self) -> bool {
        *self == Self::default()
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dummy_span() {
        assert!(Span::dummy().is_dummy());
        assert!(!Span::at(3, 4).is_dummy());
    }

    #[test]
    fn test_display() {
        assert_eq!(Span::at(12, 5).to_string(), "12:5");
    }
}
