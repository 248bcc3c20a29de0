//! Object stream parsing (PDF 1.5+).
//!
//! Object streams (/Type /ObjStm) allow multiple objects to be compressed together
//! in a single stream for better compression ratios. This module splits a
//! decoded object stream into its member objects, each of which keeps its own
//! byte buffer so that later edits can copy and patch it.
//!
//! # Format
//!
//! An object stream has this structure:
//! ```text
//! N 0 obj
//! << /Type /ObjStm
//!    /N 5              % Number of objects in stream
//!    /First 30         % Byte offset to first object's data
//!    /Filter /FlateDecode
//! >>
//! stream
//! 10 0 11 15 12 28 13 42 14 55    % Pairs: (obj_num, offset)
//! <dict>                           % Object 10 at offset 0
//! <array>                          % Object 11 at offset 15
//! ...
//! endstream
//! endobj
//! ```
//!
//! The first part contains N pairs of integers (object number, byte offset relative
//! to /First). The second part contains the actual object data.

use crate::element::Element;
use crate::error::{Error, Result};
use crate::lexer::{Lexer, tokenize_all};
use crate::object::{Dictionary, Value};

/// One object extracted from an object stream.
#[derive(Debug, Clone)]
pub struct ObjectStreamMember {
    /// Object number
    pub number: u32,
    /// Index of the object within the stream
    pub index: usize,
    /// The member's own serialized bytes
    pub bytes: Vec<u8>,
    /// Elements of `bytes`, offsets relative to `bytes`
    pub elements: Vec<Element>,
}

/// Read `/N` and `/First` from an object stream dictionary.
///
/// # Errors
///
/// Returns an error if `/Type` is present but not `/ObjStm`, or if `/N`
/// or `/First` is missing or negative.
pub fn object_stream_header(dict: &Dictionary) -> Result<(usize, usize)> {
    if let Some(type_name) = dict.name("Type") {
        if type_name != "ObjStm" {
            return Err(Error::InvalidPdf(format!("expected /Type /ObjStm, got /Type /{}", type_name)));
        }
    }

    let n = dict
        .lookup("N")
        .and_then(Value::as_usize)
        .ok_or_else(|| Error::InvalidPdf("object stream missing /N entry".to_string()))?;
    let first = dict
        .lookup("First")
        .and_then(Value::as_usize)
        .ok_or_else(|| Error::InvalidPdf("object stream missing /First entry".to_string()))?;
    Ok((n, first))
}

/// Split decoded object stream data into its members.
///
/// The length of each member is the gap to the next listed offset; the last
/// member runs to the end of the data. A member that fails to tokenize is
/// skipped with a warning.
pub fn split_object_stream(dict: &Dictionary, decoded: &[u8], skip_nul_bytes: bool) -> Result<Vec<ObjectStreamMember>> {
    let (n, first) = object_stream_header(dict)?;

    if decoded.len() < first {
        return Err(Error::InvalidPdf(format!(
            "object stream data too short: {} bytes, expected at least {}",
            decoded.len(),
            first
        )));
    }

    let pairs = parse_object_number_pairs(&decoded[..first], n)?;
    let mut members = Vec::with_capacity(pairs.len());

    for (index, &(number, relative)) in pairs.iter().enumerate() {
        let start = first.saturating_add(relative);
        let end = match pairs.get(index + 1) {
            Some(&(_, next)) => first.saturating_add(next),
            None => decoded.len(),
        };
        if start > end || end > decoded.len() {
            log::warn!(
                "Object {} has invalid span {}..{} in object stream of {} bytes",
                number,
                start,
                end,
                decoded.len()
            );
            continue;
        }

        let bytes = decoded[start..end].to_vec();
        match tokenize_all(&bytes, skip_nul_bytes) {
            Ok(elements) => members.push(ObjectStreamMember {
                number,
                index,
                bytes,
                elements,
            }),
            Err(e) => {
                log::warn!("Failed to tokenize object {} from stream at offset {}: {}", number, start, e);
            },
        }
    }

    Ok(members)
}

/// Parse the pairs section of an object stream.
///
/// The pairs section contains N pairs of integers: (object_number, offset).
/// The offset is relative to the start of the objects data section.
fn parse_object_number_pairs(data: &[u8], count: usize) -> Result<Vec<(u32, usize)>> {
    let mut lexer = Lexer::new(data, 0);
    let mut pairs = Vec::with_capacity(count.min(data.len() / 2 + 1));

    for i in 0..count {
        let number = lexer.read_unsigned().map_err(|_| Error::ParseError {
            offset: lexer.position(),
            reason: format!("failed to parse object number for pair {}", i),
        })?;
        let number = u32::try_from(number).map_err(|_| Error::ParseError {
            offset: lexer.position(),
            reason: format!("invalid object number: {}", number),
        })?;
        let offset = lexer.read_unsigned().map_err(|_| Error::ParseError {
            offset: lexer.position(),
            reason: format!("failed to parse offset for pair {}", i),
        })?;
        pairs.push((number, offset as usize));
    }

    Ok(pairs)
}
