//! Configuration for reading and signing.

use crate::parser_config::ParserOptions;

/// Default number of hex digits reserved for the signature value.
pub const MAX_SIGNATURE_CONTENT_LENGTH: usize = 50000;

/// Default number of blank bytes reserved for the last `/ByteRange` number.
pub const BYTE_RANGE_FILLER_LENGTH: usize = 100;

/// PDF processing configuration.
#[derive(Debug, Clone)]
pub struct PdfConfig {
    /// Limits applied while reading.
    pub parser: ParserOptions,

    /// Hex digits reserved inside `/Contents <...>`.
    pub signature_content_length: usize,

    /// Blank bytes reserved after the third `/ByteRange` number.
    pub byte_range_filler: usize,
}

impl Default for PdfConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl PdfConfig {
    /// Create new configuration with defaults.
    pub fn new() -> Self {
        Self {
            parser: ParserOptions::default(),
            signature_content_length: MAX_SIGNATURE_CONTENT_LENGTH,
            byte_range_filler: BYTE_RANGE_FILLER_LENGTH,
        }
    }

    /// Replace the parser options.
    pub fn with_parser(mut self, parser: ParserOptions) -> Self {
        self.parser = parser;
        self
    }

    /// Set the signature placeholder width in hex digits.
    pub fn with_signature_content_length(mut self, length: usize) -> Self {
        self.signature_content_length = length;
        self
    }

    /// Set the blank filler width for the last ByteRange number.
    pub fn with_byte_range_filler(mut self, length: usize) -> Self {
        self.byte_range_filler = length;
        self
    }
}
