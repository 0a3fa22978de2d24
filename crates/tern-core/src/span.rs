//! Source location tracking for diagnostics.
//!
//! Provides [`Span`] for a position within a source file and [`SourcePos`]
//! for a position tagged with its file. Functions synthesized by the
//! compiler carry no position at all (`Option<SourcePos>` is `None`).

use std::fmt;

/// A span of source code, represented by its starting position.
///
/// Tracks the line:column where a construct starts, for diagnostics.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Span {
    /// Line number (1-indexed).
    pub line: u32,
    /// Column number (1-indexed, byte-based).
    pub col: u32,
    /// Length in bytes.
    pub len: u32,
}

impl Span {
    /// Create a new span from a line, column, and length.
    #[inline]
    pub fn new(line: u32, col: u32, len: u32) -> Self {
        Self { line, col, len }
    }

    /// Create a zero-length span at a position.
    #[inline]
    pub fn point(line: u32, col: u32) -> Self {
        Self { line, col, len: 0 }
    }

    /// Whether this span is empty (zero length).
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl fmt::Debug for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.col)
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.col)
    }
}

/// A source position: a span within a named source file.
///
/// This is the position tag carried by IR nodes. The backend groups
/// functions into code units by the `file` component.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct SourcePos {
    /// Source file name (e.g. "orders.tern").
    pub file: String,
    /// Position within the file.
    pub span: Span,
}

impl SourcePos {
    /// Create a source position.
    pub fn new(file: impl Into<String>, span: Span) -> Self {
        Self {
            file: file.into(),
            span,
        }
    }
}

impl fmt::Debug for SourcePos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.file, self.span)
    }
}

impl fmt::Display for SourcePos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.file, self.span)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn span_display() {
        let span = Span::new(3, 7, 4);
        assert_eq!(span.to_string(), "3:7");
        assert!(!span.is_empty());
        assert!(Span::point(1, 1).is_empty());
    }

    #[test]
    fn source_pos_display() {
        let pos = SourcePos::new("orders.tern", Span::new(12, 5, 3));
        assert_eq!(pos.to_string(), "orders.tern:12:5");
    }
}
