//! ByteRange calculation for PDF signatures.
//!
//! PDF digital signatures use a ByteRange array to specify which portions
//! of the document are covered by the signature. The signature itself is
//! stored in a placeholder that is excluded from the signed bytes.
//!
//! ## ByteRange Format
//!
//! The ByteRange is an array of four integers:
//! `[offset1, length1, offset2, length2]`
//!
//! Where:
//! - `offset1` = 0 (start of file)
//! - `length1` = byte offset of the `<` that opens the signature value
//! - `offset2` = byte offset just past the closing `>`
//! - `length2` = remaining bytes to end of file
//!
//! The last number is not known until the whole update has been written,
//! so it is reserved as a run of blanks and filled in place afterwards.

use crate::error::{Error, Result};
use crate::patch::BytePatch;

/// Calculator for PDF signature byte ranges.
#[derive(Debug, Clone, Copy)]
pub struct ByteRangeCalculator {
    /// Hex digits reserved for the signature value
    content_length: usize,
}

impl ByteRangeCalculator {
    /// Create a calculator reserving `content_length` hex digits.
    pub fn new(content_length: usize) -> Self {
        Self { content_length }
    }

    /// Hex digits reserved for the signature value.
    pub fn content_length(&self) -> usize {
        self.content_length
    }

    /// Size of the whole `/Contents` value, angle brackets included.
    pub fn placeholder_size(&self) -> usize {
        self.content_length + 2
    }

    /// The zero-filled `<...>` written before the signature is known.
    pub fn generate_placeholder(&self) -> String {
        format!("<{}>", "0".repeat(self.content_length))
    }

    /// `[0, lt, lt + L + 2, file_size - (lt + L + 2)]` for a `/Contents`
    /// value whose `<` sits at `lt`.
    pub fn calculate_byte_range(&self, file_size: usize, lt: usize) -> [i64; 4] {
        let gap_end = lt + self.placeholder_size();
        [0, lt as i64, gap_end as i64, file_size as i64 - gap_end as i64]
    }

    /// Format a ByteRange array as a PDF array string.
    pub fn format_byte_range(byte_range: &[i64; 4]) -> String {
        format!("[{} {} {} {}]", byte_range[0], byte_range[1], byte_range[2], byte_range[3])
    }

    /// Concatenation of the two signed ranges.
    pub fn extract_signed_bytes(pdf_data: &[u8], byte_range: &[i64; 4]) -> Result<Vec<u8>> {
        let [offset1, length1, offset2, length2] = Self::to_usize(byte_range)?;
        let first = signed_range(pdf_data, offset1, length1, "first")?;
        let second = signed_range(pdf_data, offset2, length2, "second")?;
        Ok([first, second].concat())
    }

    /// Check that the ranges start at 0, end at `file_size` and do not overlap.
    pub fn validate_byte_range(byte_range: &[i64; 4], file_size: usize) -> Result<()> {
        let [offset1, length1, offset2, length2] = Self::to_usize(byte_range)?;
        let problem = if offset1 != 0 {
            format!("starts at {} instead of 0", offset1)
        } else if offset2.checked_add(length2) != Some(file_size) {
            format!("ends at {} instead of the file size {}", offset2.saturating_add(length2), file_size)
        } else if length1 > offset2 {
            format!("first range ({}) runs past the second range start ({})", length1, offset2)
        } else {
            return Ok(());
        };
        Err(Error::InvalidPdf(format!("ByteRange {}", problem)))
    }

    fn to_usize(byte_range: &[i64; 4]) -> Result<[usize; 4]> {
        let mut out = [0usize; 4];
        for (slot, value) in out.iter_mut().zip(byte_range) {
            *slot = usize::try_from(*value).map_err(|_| {
                Error::InvalidPdf(format!(
                    "ByteRange has a negative entry: {}",
                    Self::format_byte_range(byte_range)
                ))
            })?;
        }
        Ok(out)
    }

    /// Patch that writes `length2` followed by ` ]` over the blank filler.
    ///
    /// The result is padded with spaces to exactly `filler_len` bytes.
    pub fn last_range_patch(filler_offset: usize, filler_len: usize, length2: usize) -> Result<BytePatch> {
        let mut text = format!("{} ]", length2).into_bytes();
        if text.len() > filler_len {
            log::warn!("ByteRange tail '{} ]' does not fit in {} bytes", length2, filler_len);
            return Err(Error::PlaceholderOverflow {
                actual: text.len(),
                reserved: filler_len,
            });
        }
        text.resize(filler_len, b' ');
        Ok(BytePatch::new(filler_offset, filler_len, text))
    }

    /// Patch that writes `signature_hex` at the first placeholder digit.
    ///
    /// Digits past the end of the signature keep their zero padding.
    pub fn signature_patch(&self, first_digit_offset: usize, signature_hex: &str) -> Result<BytePatch> {
        if signature_hex.len() > self.content_length {
            log::warn!(
                "Signature needs {} hex digits, only {} reserved",
                signature_hex.len(),
                self.content_length
            );
            return Err(Error::PlaceholderOverflow {
                actual: signature_hex.len(),
                reserved: self.content_length,
            });
        }
        Ok(BytePatch::new(
            first_digit_offset,
            signature_hex.len(),
            signature_hex.as_bytes(),
        ))
    }
}

impl Default for ByteRangeCalculator {
    fn default() -> Self {
        Self::new(crate::config::MAX_SIGNATURE_CONTENT_LENGTH)
    }
}

fn signed_range<'a>(pdf_data: &'a [u8], offset: usize, length: usize, which: &str) -> Result<&'a [u8]> {
    offset
        .checked_add(length)
        .and_then(|end| pdf_data.get(offset..end))
        .ok_or_else(|| {
            Error::InvalidPdf(format!(
                "ByteRange {} range {}+{} exceeds file size {}",
                which,
                offset,
                length,
                pdf_data.len()
            ))
        })
}

/// Convert bytes to uppercase hex string.
pub fn bytes_to_hex(bytes: &[u8]) -> String {
    const HEX_CHARS: &[u8] = b"0123456789ABCDEF";
    let mut hex = String::with_capacity(bytes.len() * 2);
    for &byte in bytes {
        hex.push(HEX_CHARS[(byte >> 4) as usize] as char);
        hex.push(HEX_CHARS[(byte & 0x0F) as usize] as char);
    }
    hex
}
