//! Error types for condition parsing
//!
//! All failures in this crate are parse-time failures. Evaluation never
//! errors: missing memory degrades to reads of 0 and division by zero
//! yields 0.

use thiserror::Error;

/// Result type for parse operations
pub type ParseResult<T> = Result<T, ParseError>;

/// The kind of parse failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ParseErrorKind {
    /// A `X:` prefix where `X` is not a recognized condition type letter
    #[error("invalid condition type")]
    InvalidConditionType,
    /// An operand that is neither a memory reference nor a constant
    #[error("invalid memory operand")]
    InvalidMemoryOperand,
    /// A floating-point operand where only integer operands are allowed
    #[error("invalid floating-point operand")]
    InvalidFpOperand,
    /// A floating-point operand in a comparison
    #[error("invalid comparison")]
    InvalidComparison,
    /// A missing or incompatible operator for the condition type
    #[error("invalid operator")]
    InvalidOperator,
    /// A malformed or unterminated hit-target suffix
    #[error("invalid required hit count")]
    InvalidRequiredHits,
}

/// A parse failure with the byte offset into the source text where the
/// offending token begins.
///
/// Any error aborts parsing of the entire condition set; the caller must
/// re-parse from scratch after fixing the source. Memory references
/// allocated before the failure are retained in the pool (they are
/// deduplicated and harmless).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind} at byte offset {offset}")]
pub struct ParseError {
    pub kind: ParseErrorKind,
    pub offset: usize,
}

impl ParseError {
    /// Create a new parse error at the given byte offset
    pub fn new(kind: ParseErrorKind, offset: usize) -> Self {
        Self { kind, offset }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_includes_offset() {
        let err = ParseError::new(ParseErrorKind::InvalidOperator, 7);
        let s = err.to_string();
        assert!(s.contains("invalid operator"));
        assert!(s.contains("7"));
    }

    #[test]
    fn test_kind_equality() {
        let a = ParseError::new(ParseErrorKind::InvalidRequiredHits, 3);
        assert_eq!(a.kind, ParseErrorKind::InvalidRequiredHits);
        assert_ne!(a.kind, ParseErrorKind::InvalidComparison);
    }
}
