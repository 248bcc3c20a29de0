//! Error types for the PDF engine.
//!
//! This module defines all error types that can occur while reading a PDF
//! into the edit buffer, walking its cross-reference chain, or appending a
//! signed incremental update.

/// Result type alias for library operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error types that can occur during PDF processing.
#[derive(Debug, thiserror::Error)]
#[allow(clippy::enum_variant_names)] // "Invalid" prefix is intentional for clarity
pub enum Error {
    /// Invalid PDF header (expected '%PDF-')
    #[error("Invalid PDF header: expected '%PDF-', found '{0}'")]
    InvalidHeader(String),

    /// Parse error at specific byte offset
    #[error("Failed to parse object at byte {offset}: {reason}")]
    ParseError {
        /// Byte offset where error occurred
        offset: usize,
        /// Reason for parse failure
        reason: String,
    },

    /// No `startxref` keyword near the end of the file
    #[error("startxref keyword not found")]
    MissingStartXref,

    /// Invalid cross-reference table or stream
    #[error("Invalid cross-reference section at byte {offset}: {reason}")]
    InvalidXref {
        /// Byte offset of the section
        offset: usize,
        /// Reason for rejection
        reason: String,
    },

    /// Referenced object not found in the document
    #[error("Object not found: {0} 0 R")]
    ObjectNotFound(u32),

    /// Object has wrong type
    #[error("Invalid object type: expected {expected}, found {found}")]
    InvalidObjectType {
        /// Expected object type
        expected: String,
        /// Actual object type found
        found: String,
    },

    /// A required dictionary key is absent
    #[error("Missing key /{key} in {context}")]
    MissingKey {
        /// Name of the key without the leading slash
        key: String,
        /// Where the key was expected
        context: String,
    },

    /// Unexpected end of file
    #[error("End of file reached unexpectedly")]
    UnexpectedEof,

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Unsupported stream filter
    #[error("Unsupported filter: {0}")]
    UnsupportedFilter(String),

    /// Unsupported predictor
    #[error("Unsupported predictor: {0}")]
    UnsupportedPredictor(i64),

    /// Stream decoding error
    #[error("Stream decoding error: {0}")]
    Decode(String),

    /// Invalid PDF structure (generic)
    #[error("Invalid PDF: {0}")]
    InvalidPdf(String),

    /// Recursion depth limit exceeded
    #[error("Recursion depth limit exceeded (max: {0})")]
    RecursionLimitExceeded(usize),

    /// Signing precondition or collaborator failure
    #[error("Signing failed: {0}")]
    Signing(String),

    /// Signature value does not fit in the reserved placeholder
    #[error("Signature ({actual} hex digits) exceeds placeholder size ({reserved} hex digits)")]
    PlaceholderOverflow {
        /// Hex digits produced
        actual: usize,
        /// Hex digits reserved
        reserved: usize,
    },

    /// In-place patch would change the buffer length or run out of bounds
    #[error("Invalid patch at byte {offset}: {reason}")]
    InvalidPatch {
        /// Target offset
        offset: usize,
        /// Reason for rejection
        reason: String,
    },

    /// External normalization of a malformed file failed
    #[error("PDF fix-up failed: {0}")]
    Fixup(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_header_error() {
        let err = Error::InvalidHeader("NotAPDF".to_string());
        let msg = format!("{}", err);
        assert!(msg.contains("Invalid PDF header"));
        assert!(msg.contains("NotAPDF"));
    }

    #[test]
    fn test_parse_error() {
        let err = Error::ParseError {
            offset: 1234,
            reason: "invalid token".to_string(),
        };
        let msg = format!("{}", err);
        assert!(msg.contains("1234"));
        assert!(msg.contains("invalid token"));
    }

    #[test]
    fn test_object_not_found_error() {
        let err = Error::ObjectNotFound(10);
        assert!(format!("{}", err).contains("10 0 R"));
    }

    #[test]
    fn test_missing_key_error() {
        let err = Error::MissingKey {
            key: "Fields".to_string(),
            context: "AcroForm".to_string(),
        };
        let msg = format!("{}", err);
        assert!(msg.contains("/Fields"));
        assert!(msg.contains("AcroForm"));
    }

    #[test]
    fn test_placeholder_overflow_error() {
        let err = Error::PlaceholderOverflow {
            actual: 12,
            reserved: 10,
        };
        let msg = format!("{}", err);
        assert!(msg.contains("12"));
        assert!(msg.contains("10"));
    }

    #[test]
    fn test_error_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Error>();
    }
}
