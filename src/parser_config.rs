//! Parser limits and strictness options.

/// Parser options for controlling limits and error handling during `read`.
///
/// The engine rejects malformed input instead of repairing it, so the
/// default is [`ParserOptions::strict`]. The limits exist to keep hostile
/// input from exhausting the stack or memory.
///
/// # Example
///
/// ```
/// use pdf_incremental::parser_config::ParserOptions;
///
/// let strict = ParserOptions::strict();
/// assert_eq!(strict.startxref_search_window, 1024);
///
/// let custom = ParserOptions {
///     max_nesting: 32,
///     ..ParserOptions::strict()
/// };
/// assert_eq!(custom.max_nesting, 32);
/// ```
#[derive(Debug, Clone, Copy)]
pub struct ParserOptions {
    /// Maximum array/dictionary nesting depth
    ///
    /// PDF Spec: ISO 32000-1:2008, Section H.1 - Implementation Limits
    pub max_nesting: usize,

    /// Number of trailing bytes searched for the `startxref` keyword
    ///
    /// The whole file is searched when it is shorter than the window.
    pub startxref_search_window: usize,

    /// Maximum number of cross-reference sections followed through `/Prev`
    pub max_xref_chain: usize,

    /// Maximum decompressed stream size in bytes (0 disables the check)
    ///
    /// Protects against decompression bombs in xref and object streams.
    pub max_decompressed_size: usize,

    /// Skip stray NUL bytes between tokens instead of failing
    pub skip_nul_bytes: bool,
}

impl Default for ParserOptions {
    fn default() -> Self {
        Self::strict()
    }
}

impl ParserOptions {
    /// Strict mode: reject everything except the tolerated NUL padding.
    pub fn strict() -> Self {
        Self {
            max_nesting: 100, // ISO 32000-1 Annex C nesting limit
            startxref_search_window: 1024,
            max_xref_chain: 100,
            max_decompressed_size: 100 * 1024 * 1024, // 100 MB
            skip_nul_bytes: true,
        }
    }

    /// Lenient mode: larger limits for big or deeply nested files.
    pub fn lenient() -> Self {
        Self {
            max_nesting: 200,
            startxref_search_window: 4096,
            max_xref_chain: 1000,
            max_decompressed_size: 1024 * 1024 * 1024, // 1 GB
            skip_nul_bytes: true,
        }
    }

    /// Check a decompressed length against the configured limit.
    pub(crate) fn allows_decompressed(&self, len: usize) -> bool {
        self.max_decompressed_size == 0 || len <= self.max_decompressed_size
    }

    /// Output cap for a single decoded stream, `None` when unlimited.
    pub(crate) fn decompression_limit(&self) -> Option<usize> {
        (self.max_decompressed_size != 0).then_some(self.max_decompressed_size)
    }
}
