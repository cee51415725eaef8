//! Source locations carried by every AST node.

use std::fmt;

/// A position in a source file.
///
/// Mirrors the teacher's `CodeRange`, but line/column are optional since the
/// parser (out of scope here) may not always have them available at the
/// point a node is constructed by a caller of this crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct SourceLocation {
    /// Interned file name; see [`crate::intern::StringId`].
    pub file: crate::intern::StringId,
    /// Byte offset into the source file.
    pub offset: u32,
    pub line: Option<u32>,
    pub column: Option<u32>,
}

impl SourceLocation {
    #[must_use]
    pub fn new(file: crate::intern::StringId, offset: u32) -> Self {
        Self { file, offset, line: None, column: None }
    }

    #[must_use]
    pub fn with_line_column(mut self, line: u32, column: u32) -> Self {
        self.line = Some(line);
        self.column = Some(column);
        self
    }

    /// A location used for synthesized nodes that have no direct source text
    /// (e.g. an inserted default `return`, or a synthesized init method).
    #[must_use]
    pub fn synthetic() -> Self {
        Self { file: crate::intern::StringId::synthetic(), offset: 0, line: None, column: None }
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.line, self.column) {
            (Some(line), Some(col)) => write!(f, "{}:{}:{}", self.file.index(), line, col),
            _ => write!(f, "{}@{}", self.file.index(), self.offset),
        }
    }
}
