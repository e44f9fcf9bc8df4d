//! Error handling for the Carlos frontend
//!
//! Provides structured error types with source location tracking
//! for helpful diagnostic messages.

mod diagnostic;

use std::ops::Range;
use thiserror::Error;

pub use diagnostic::{format_error, print_error};

/// A span in the source code, represented as a byte range
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceSpan {
    /// Start byte offset (inclusive)
    pub start: usize,
    /// End byte offset (exclusive)
    pub end: usize,
}

impl SourceSpan {
    /// Create a new source span
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    /// Merge two spans into one that covers both
    pub fn merge(self, other: Self) -> Self {
        Self {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }

    /// Get the length of this span
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    /// Check if the span is empty
    pub fn is_empty(&self) -> bool {
        self.start >= self.end
    }
}

impl From<Range<usize>> for SourceSpan {
    fn from(range: Range<usize>) -> Self {
        Self::new(range.start, range.end)
    }
}

impl From<SourceSpan> for Range<usize> {
    fn from(span: SourceSpan) -> Self {
        span.start..span.end
    }
}

/// The main error type for Carlos frontend operations
#[derive(Error, Debug)]
pub enum CarlosError {
    #[error("Lexer error: {message}")]
    Lexer { message: String, span: SourceSpan },

    #[error("Parser error: {message}")]
    Parser { message: String, span: SourceSpan },

    #[error("Analysis error: {message}")]
    Analysis { message: String, span: SourceSpan },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl CarlosError {
    /// Get the source span associated with this error, if any
    pub fn span(&self) -> Option<SourceSpan> {
        match self {
            CarlosError::Lexer { span, .. } => Some(*span),
            CarlosError::Parser { span, .. } => Some(*span),
            CarlosError::Analysis { span, .. } => Some(*span),
            CarlosError::Io(_) => None,
        }
    }

    /// Get the bare message, without the error-kind prefix
    pub fn message(&self) -> String {
        match self {
            CarlosError::Lexer { message, .. }
            | CarlosError::Parser { message, .. }
            | CarlosError::Analysis { message, .. } => message.clone(),
            CarlosError::Io(e) => e.to_string(),
        }
    }

    /// Create a lexer error
    pub fn lexer(message: impl Into<String>, span: SourceSpan) -> Self {
        CarlosError::Lexer {
            message: message.into(),
            span,
        }
    }

    /// Create a parser error
    pub fn parser(message: impl Into<String>, span: SourceSpan) -> Self {
        CarlosError::Parser {
            message: message.into(),
            span,
        }
    }

    /// Create a semantic analysis error
    pub fn analysis(message: impl Into<String>, span: SourceSpan) -> Self {
        CarlosError::Analysis {
            message: message.into(),
            span,
        }
    }
}

/// Result type alias for Carlos frontend operations
pub type CarlosResult<T> = Result<T, CarlosError>;
