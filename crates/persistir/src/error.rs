//! Error types for `persistir`.
//!
//! The engine has no fatal error class for malformed *input*: unresolvable
//! occurrences degrade by omission. The variants here all signal a broken
//! edit plan, which is a programming-invariant violation in the caller, not
//! a data error; it aborts one file's transform and nothing else.

use thiserror::Error;

/// Result type alias for persistir operations.
pub type Result<T> = std::result::Result<T, PersistirError>;

/// Errors raised while applying an edit plan to a source buffer.
#[derive(Debug, Error)]
pub enum PersistirError {
    /// Two replacement spans partially overlap.
    #[error("overlapping edits: [{first_start}, {first_end}) and [{second_start}, {second_end})")]
    OverlappingEdits {
        /// Start of the earlier span.
        first_start: usize,
        /// End of the earlier span.
        first_end: usize,
        /// Start of the later span.
        second_start: usize,
        /// End of the later span.
        second_end: usize,
    },

    /// An edit addresses text outside the source buffer.
    #[error("edit span [{start}, {end}) is outside the source text (length {len})")]
    SpanOutOfBounds {
        /// Span start.
        start: usize,
        /// Span end (exclusive).
        end: usize,
        /// Source length in bytes.
        len: usize,
    },

    /// An edit offset does not fall on a character boundary.
    #[error("edit offset {offset} is not a character boundary")]
    NotCharBoundary {
        /// The offending byte offset.
        offset: usize,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overlapping_edits_display() {
        let err = PersistirError::OverlappingEdits {
            first_start: 3,
            first_end: 9,
            second_start: 7,
            second_end: 12,
        };
        assert_eq!(err.to_string(), "overlapping edits: [3, 9) and [7, 12)");
    }

    #[test]
    fn span_out_of_bounds_display() {
        let err = PersistirError::SpanOutOfBounds { start: 4, end: 20, len: 10 };
        assert!(err.to_string().contains("outside the source text"));
    }
}
