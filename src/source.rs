//! Source position tracking for diagnostics.
//!
//! Every AST node and every [`crate::error::AnalysisError`] carries a
//! [`SourceSpan`] so a caller can point a contract author at the offending
//! statement or expression. Mirrors `ouros::parse::CodeRange` in spirit, but
//! without the interned-filename/preview-line machinery that crate needs for
//! a much larger source corpus — this engine only ever analyzes one module
//! at a time.

use std::fmt;

/// A zero-indexed line/column position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
pub struct CodeLoc {
    pub line: u32,
    pub column: u32,
}

impl CodeLoc {
    pub const fn new(line: u32, column: u32) -> Self {
        Self { line, column }
    }
}

impl fmt::Display for CodeLoc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line + 1, self.column + 1)
    }
}

/// A half-open range of source positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, serde::Serialize, serde::Deserialize)]
pub struct SourceSpan {
    pub start: CodeLoc,
    pub end: CodeLoc,
}

impl SourceSpan {
    pub const fn new(start: CodeLoc, end: CodeLoc) -> Self {
        Self { start, end }
    }

    pub const fn point(loc: CodeLoc) -> Self {
        Self { start: loc, end: loc }
    }
}

impl fmt::Display for SourceSpan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.start == self.end {
            write!(f, "{}", self.start)
        } else {
            write!(f, "{}-{}", self.start, self.end)
        }
    }
}
