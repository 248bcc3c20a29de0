//! Byte-range patches.
//!
//! Incremental updates never re-serialize an existing object from a parsed
//! graph. Instead the serialized bytes are copied and edited by splicing:
//! a patch replaces `old_len` bytes at `offset` with new bytes. Every
//! byte after the patch moves by [`BytePatch::shift`].

use crate::error::{Error, Result};

/// Replace `old_len` bytes at `offset` with `bytes`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BytePatch {
    /// Where the replaced range starts
    pub offset: usize,
    /// How many bytes are replaced (0 for a pure insertion)
    pub old_len: usize,
    /// Replacement bytes
    pub bytes: Vec<u8>,
}

impl BytePatch {
    /// Create a patch.
    pub fn new(offset: usize, old_len: usize, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            offset,
            old_len,
            bytes: bytes.into(),
        }
    }

    /// Insert `bytes` before `offset`.
    pub fn insert(offset: usize, bytes: impl Into<Vec<u8>>) -> Self {
        Self::new(offset, 0, bytes)
    }

    /// How far bytes after the patched range move.
    pub fn shift(&self) -> isize {
        self.bytes.len() as isize - self.old_len as isize
    }

    fn check_bounds(&self, len: usize) -> Result<()> {
        match self.offset.checked_add(self.old_len) {
            Some(end) if end <= len => Ok(()),
            _ => Err(Error::InvalidPatch {
                offset: self.offset,
                reason: format!("range of {} bytes exceeds buffer of {} bytes", self.old_len, len),
            }),
        }
    }

    /// Splice the patch into `buffer`, shifting downstream bytes.
    pub fn apply(&self, buffer: &mut Vec<u8>) -> Result<()> {
        self.check_bounds(buffer.len())?;
        buffer.splice(self.offset..self.offset + self.old_len, self.bytes.iter().copied());
        Ok(())
    }

    /// Overwrite bytes without changing the buffer length.
    ///
    /// Fails unless the replacement has exactly `old_len` bytes.
    pub fn apply_in_place(&self, buffer: &mut [u8]) -> Result<()> {
        if self.bytes.len() != self.old_len {
            return Err(Error::InvalidPatch {
                offset: self.offset,
                reason: format!("in-place patch changes width from {} to {} bytes", self.old_len, self.bytes.len()),
            });
        }
        self.check_bounds(buffer.len())?;
        buffer[self.offset..self.offset + self.old_len].copy_from_slice(&self.bytes);
        Ok(())
    }
}

/// Apply a copy-and-patch edit to `source` and return the result.
pub fn patched(source: &[u8], patch: &BytePatch) -> Result<Vec<u8>> {
    let mut buffer = source.to_vec();
    patch.apply(&mut buffer)?;
    Ok(buffer)
}
