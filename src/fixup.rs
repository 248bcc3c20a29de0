//! Recovery path for input the strict reader rejects.
//!
//! A [`PdfNormalizer`] rewrites a damaged file into a clean one (fresh
//! cross-reference table, consistent offsets) so that
//! [`PdfDocument::read_with_possible_fixup`](crate::PdfDocument::read_with_possible_fixup)
//! can retry once.

use crate::error::{Error, Result};

/// Re-encodes a PDF into a form the strict reader accepts.
pub trait PdfNormalizer {
    /// Produce a normalized copy of `data`.
    fn normalize(&self, data: &[u8]) -> Result<Vec<u8>>;

    /// Name used in log messages.
    fn name(&self) -> &str {
        "external"
    }
}

/// Normalizer backed by `lopdf`'s tolerant loader and writer.
#[derive(Debug, Clone, Copy, Default)]
pub struct LopdfNormalizer;

impl PdfNormalizer for LopdfNormalizer {
    fn normalize(&self, data: &[u8]) -> Result<Vec<u8>> {
        let mut document = lopdf::Document::load_mem(data).map_err(|e| {
            log::warn!("lopdf could not load the input: {}", e);
            Error::Fixup(e.to_string())
        })?;

        let mut output = Vec::new();
        document
            .save_to(&mut output)
            .map_err(|e| Error::Fixup(e.to_string()))?;
        log::info!("Normalized {} bytes into {} bytes", data.len(), output.len());
        Ok(output)
    }

    fn name(&self) -> &str {
        "lopdf"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_garbage_is_a_fixup_error() {
        let result = LopdfNormalizer.normalize(b"definitely not a pdf");
        assert!(matches!(result, Err(Error::Fixup(_))));
    }

    #[test]
    fn test_default_name() {
        struct Identity;
        impl PdfNormalizer for Identity {
            fn normalize(&self, data: &[u8]) -> Result<Vec<u8>> {
                Ok(data.to_vec())
            }
        }
        assert_eq!(Identity.name(), "external");
        assert_eq!(LopdfNormalizer.name(), "lopdf");
    }
}
