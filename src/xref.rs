//! Cross-reference subsystem.
//!
//! The xref maps object numbers to byte offsets in the PDF file (or to the
//! object stream holding them), enabling random access to PDF objects.
//!
//! Both encodings are read: classic `xref` tables and compressed
//! cross-reference streams (`/Type /XRef`, Flate + PNG Up predictor). The
//! chain of incremental updates is followed newest first through `/Prev`,
//! and an object number seen in a newer section is never overridden by an
//! older one.
//!
//! For writing, entries touched by the current update are flagged dirty and
//! only those are serialized into the appended section.

use crate::decoders::{DecodeParams, Filter, decode_stream_with_options, encode_png_up, flate_encode};
use crate::element::ElementKind;
use crate::error::{Error, Result};
use crate::lexer::Lexer;
use crate::object::{Dictionary, ObjectRef, Value};
use crate::parser::parse_object_body;
use crate::parser_config::ParserOptions;
use std::collections::{BTreeMap, HashSet};

/// Cross-reference table entry type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum XRefEntryType {
    /// Entry for a free object
    Free,
    /// Entry for an object stored directly in the file
    NotCompressed,
    /// Entry for an object in an object stream (PDF 1.5+)
    Compressed,
}

/// Cross-reference table entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XRefEntry {
    /// Type of entry
    pub entry_type: XRefEntryType,
    /// Byte offset (not compressed), object stream number (compressed) or
    /// next free object (free)
    pub offset: u64,
    /// Generation number, or index within the object stream
    pub generation: u16,
    /// Touched by the current write pass
    pub dirty: bool,
}

impl XRefEntry {
    /// Create an entry for an object stored directly in the file.
    pub fn not_compressed(offset: u64, generation: u16) -> Self {
        Self {
            entry_type: XRefEntryType::NotCompressed,
            offset,
            generation,
            dirty: false,
        }
    }

    /// Create an entry for an object in an object stream.
    pub fn compressed(stream_obj_num: u64, index_in_stream: u16) -> Self {
        Self {
            entry_type: XRefEntryType::Compressed,
            offset: stream_obj_num,
            generation: index_in_stream,
            dirty: false,
        }
    }

    /// Create a free entry.
    pub fn free(next_free: u64, generation: u16) -> Self {
        Self {
            entry_type: XRefEntryType::Free,
            offset: next_free,
            generation,
            dirty: false,
        }
    }

    /// Builder-style dirty flag.
    pub fn with_dirty(mut self, dirty: bool) -> Self {
        self.dirty = dirty;
        self
    }
}

/// Cross-reference table that maps object numbers to their locations.
///
/// Keys are kept ordered so written sections list objects ascending.
#[derive(Debug, Clone, Default)]
pub struct CrossRefTable {
    entries: BTreeMap<u32, XRefEntry>,
}

impl CrossRefTable {
    /// Create a new empty cross-reference table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an entry unless the object number is already known.
    ///
    /// Sections are read newest first, so the first entry seen for a number
    /// is the current one. Returns `true` if the entry was inserted.
    pub fn insert_if_absent(&mut self, object_number: u32, entry: XRefEntry) -> bool {
        match self.entries.entry(object_number) {
            std::collections::btree_map::Entry::Vacant(slot) => {
                slot.insert(entry);
                true
            },
            std::collections::btree_map::Entry::Occupied(_) => {
                log::debug!("Ignoring older xref entry for object {}", object_number);
                false
            },
        }
    }

    /// Insert or replace an entry.
    pub fn set(&mut self, object_number: u32, entry: XRefEntry) {
        self.entries.insert(object_number, entry);
    }

    /// Get an entry by object number.
    pub fn get(&self, object_number: u32) -> Option<&XRefEntry> {
        self.entries.get(&object_number)
    }

    /// Check if an object exists in the xref table.
    pub fn contains(&self, object_number: u32) -> bool {
        self.entries.contains_key(&object_number)
    }

    /// Record that `object_number` is (re)written at `offset` by this update.
    pub fn mark_written(&mut self, object_number: u32, offset: u64, generation: u16) {
        self.entries
            .insert(object_number, XRefEntry::not_compressed(offset, generation).with_dirty(true));
    }

    /// Highest object number present.
    pub fn max_object_number(&self) -> Option<u32> {
        self.entries.keys().next_back().copied()
    }

    /// Number to use for a newly created object.
    pub fn next_object_number(&self) -> u32 {
        self.max_object_number().map_or(1, |n| n + 1)
    }

    /// Value for the trailer's `/Size`.
    pub fn size(&self) -> u32 {
        self.max_object_number().map_or(0, |n| n + 1)
    }

    /// Iterate over all entries in object-number order.
    pub fn iter(&self) -> impl Iterator<Item = (u32, &XRefEntry)> {
        self.entries.iter().map(|(n, e)| (*n, e))
    }

    /// Iterate over the entries touched by the current write pass.
    pub fn dirty_entries(&self) -> impl Iterator<Item = (u32, &XRefEntry)> {
        self.iter().filter(|(_, e)| e.dirty)
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if there are no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Which encoding a cross-reference section uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum XRefSectionKind {
    /// `xref` keyword followed by a text table and a `trailer`
    Table,
    /// Compressed `/Type /XRef` stream object
    Stream,
}

/// One hop of the `/Prev` chain.
#[derive(Debug, Clone)]
pub struct XRefSection {
    /// Offset the section was found at (the `startxref` or `/Prev` value)
    pub offset: usize,
    /// Offset of the `trailer` keyword, or of the xref stream object
    pub trailer_offset: usize,
    /// Encoding of the section
    pub kind: XRefSectionKind,
    /// Trailer dictionary, or the xref stream dictionary
    pub trailer: Dictionary,
}

/// Result of walking all cross-reference sections.
#[derive(Debug, Clone)]
pub struct XRefChain {
    /// Merged entries, newest section first-seen-wins
    pub table: CrossRefTable,
    /// Sections, newest first
    pub sections: Vec<XRefSection>,
    /// Offset named by the final `startxref`
    pub start_xref: usize,
}

/// Find the offset named by the last `startxref` in the file.
///
/// Only the last `window` bytes are searched (the whole buffer if it is
/// shorter).
pub fn find_start_xref(buffer: &[u8], window: usize) -> Result<usize> {
    let tail_start = buffer.len().saturating_sub(window);
    let tail = &buffer[tail_start..];
    let keyword = b"startxref";

    let position = tail
        .windows(keyword.len())
        .rposition(|w| w == keyword)
        .ok_or(Error::MissingStartXref)?;

    let mut lexer = Lexer::new(buffer, tail_start + position + keyword.len());
    let offset = lexer.read_unsigned().map_err(|_| {
        log::warn!("startxref is not followed by an offset");
        Error::MissingStartXref
    })?;
    usize::try_from(offset).map_err(|_| Error::MissingStartXref)
}

/// Walk every cross-reference section from the last `startxref` backwards.
pub fn read_xref_chain(buffer: &[u8], options: &ParserOptions) -> Result<XRefChain> {
    let start_xref = find_start_xref(buffer, options.startxref_search_window)?;
    log::debug!("startxref is {}", start_xref);

    let mut table = CrossRefTable::new();
    let mut sections = Vec::new();
    let mut visited = HashSet::new();
    let mut next = Some(start_xref);

    while let Some(offset) = next {
        if !visited.insert(offset) {
            log::warn!("Cyclic /Prev chain at offset {}, stopping", offset);
            break;
        }
        if sections.len() >= options.max_xref_chain {
            return Err(Error::InvalidXref {
                offset,
                reason: format!("more than {} chained sections", options.max_xref_chain),
            });
        }

        let section = read_xref_section(buffer, offset, &mut table, options)?;
        next = section.trailer.lookup("Prev").and_then(Value::as_usize);
        log::debug!(
            "Read {:?} xref section at {} (prev: {:?}, {} entries so far)",
            section.kind,
            offset,
            next,
            table.len()
        );
        sections.push(section);
    }

    Ok(XRefChain {
        table,
        sections,
        start_xref,
    })
}

/// Read the section at `offset`, dispatching on its first keyword.
pub fn read_xref_section(
    buffer: &[u8],
    offset: usize,
    table: &mut CrossRefTable,
    options: &ParserOptions,
) -> Result<XRefSection> {
    if offset >= buffer.len() {
        return Err(Error::InvalidXref {
            offset,
            reason: "offset is past the end of the file".to_string(),
        });
    }

    let mut lexer = Lexer::new(buffer, offset).with_nul_policy(options.skip_nul_bytes);
    lexer.skip_whitespace()?;
    let rest = &buffer[lexer.position()..];

    if rest.starts_with(b"xref") {
        read_xref_table(buffer, offset, table, options)
    } else if rest.first().is_some_and(u8::is_ascii_digit) {
        read_xref_stream(buffer, offset, table, options)
    } else {
        log::warn!("xref is not the first keyword at offset {}", offset);
        Err(Error::InvalidXref {
            offset,
            reason: "neither an xref table nor an xref stream".to_string(),
        })
    }
}

/// Parse a traditional cross-reference table and its trailer.
///
/// The xref table format is:
/// ```text
/// xref
/// 0 6             % Start at object 0, 6 entries
/// 0000000000 65535 f   % Object 0 (free)
/// 0000000018 00000 n   % Object 1 at byte 18
/// ...
/// trailer
/// << /Size 6 /Root 1 0 R >>
/// ```
fn read_xref_table(
    buffer: &[u8],
    offset: usize,
    table: &mut CrossRefTable,
    options: &ParserOptions,
) -> Result<XRefSection> {
    let invalid = |reason: &str| Error::InvalidXref {
        offset,
        reason: reason.to_string(),
    };

    let mut lexer = Lexer::new(buffer, offset).with_nul_policy(options.skip_nul_bytes);
    if lexer.read_keyword()? != b"xref" {
        return Err(invalid("missing xref keyword"));
    }

    let trailer_offset = loop {
        lexer.skip_whitespace()?;
        let before = lexer.position();
        let keyword = lexer.read_keyword()?;
        if keyword == b"trailer" {
            break before;
        }
        if !keyword.is_empty() {
            return Err(invalid("unexpected keyword in xref table"));
        }

        let first = lexer.read_unsigned().map_err(|_| invalid("failed to read first object number"))?;
        let count = lexer.read_unsigned().map_err(|_| invalid("failed to read number of entries"))?;

        for i in 0..count {
            let entry_offset = lexer.read_unsigned().map_err(|_| invalid("failed to read entry offset"))?;
            let generation = lexer
                .read_unsigned()
                .map_err(|_| invalid("failed to read entry generation"))?;
            let generation = u16::try_from(generation).map_err(|_| invalid("generation out of range"))?;
            let object_number =
                u32::try_from(first + i).map_err(|_| invalid("object number out of range"))?;

            let entry = match lexer.read_keyword()? {
                b"n" => XRefEntry::not_compressed(entry_offset, generation),
                b"f" => XRefEntry::free(entry_offset, generation),
                _ => return Err(invalid("expected f or n in xref entry")),
            };
            // The free-list head is always rewritten by an update
            let entry = entry.with_dirty(object_number == 0);
            table.insert_if_absent(object_number, entry);
        }
    };

    let (trailer, _) = read_dictionary_at(buffer, trailer_offset + b"trailer".len(), options)?;

    Ok(XRefSection {
        offset,
        trailer_offset,
        kind: XRefSectionKind::Table,
        trailer,
    })
}

/// Parse a cross-reference stream object.
fn read_xref_stream(
    buffer: &[u8],
    offset: usize,
    table: &mut CrossRefTable,
    options: &ParserOptions,
) -> Result<XRefSection> {
    let invalid = |reason: String| Error::InvalidXref { offset, reason };

    let (object_offset, dict, data_offset) = read_stream_header(buffer, offset, options)?;

    if dict.name("Type") != Some("XRef") {
        return Err(invalid("object is not /Type /XRef".to_string()));
    }

    let length = stream_length(buffer, &dict, table, options)?;
    let raw = buffer
        .get(data_offset..data_offset.saturating_add(length))
        .ok_or_else(|| invalid(format!("stream length {} runs past the end of the file", length)))?;

    let widths = xref_stream_widths(&dict).map_err(|reason| invalid(reason.to_string()))?;
    let row_len: usize = widths.iter().sum();
    if row_len == 0 {
        return Err(invalid("/W describes empty rows".to_string()));
    }

    let filter = Filter::from_value(dict.lookup("Filter"))?;
    let params = decode_params(&dict)?;
    if let Some(params) = &params {
        match params.predictor {
            1 => {},
            12 if params.columns == row_len => {},
            12 => {
                return Err(invalid(format!(
                    "/DecodeParms/Columns {} is inconsistent with /W",
                    params.columns
                )));
            },
            other => {
                log::warn!("Unexpected xref stream predictor {} at offset {}", other, offset);
                return Err(Error::UnsupportedPredictor(other));
            },
        }
    }

    let data = decode_stream_with_options(raw, filter, params.as_ref(), options)?;

    let sub_sections = index_ranges(&dict).map_err(|reason| invalid(reason.to_string()))?;
    let mut rows = data.chunks_exact(row_len);
    for (first, count) in sub_sections {
        for i in 0..count {
            let row = rows
                .next()
                .ok_or_else(|| invalid("truncated xref stream data".to_string()))?;
            let entry_type = if widths[0] > 0 {
                read_int(&row[..widths[0]])
            } else {
                1 // Default to type 1 if width is 0
            };
            let field2 = read_int(&row[widths[0]..widths[0] + widths[1]]);
            let field3 = read_int(&row[widths[0] + widths[1]..]);

            let entry = match entry_type {
                0 => XRefEntry::free(field2, field3 as u16),
                1 => XRefEntry::not_compressed(field2, field3 as u16),
                2 => XRefEntry::compressed(field2, field3 as u16),
                other => {
                    log::debug!("Ignoring xref stream entry of type {}", other);
                    continue;
                },
            };
            let object_number =
                u32::try_from(first + i).map_err(|_| invalid("object number out of range".to_string()))?;
            table.insert_if_absent(object_number, entry);
        }
    }

    Ok(XRefSection {
        offset,
        trailer_offset: object_offset,
        kind: XRefSectionKind::Stream,
        trailer: dict,
    })
}

/// Read `N G obj <<...>> stream` at `offset`.
///
/// Returns the offset of the object header, the stream dictionary and the
/// offset of the first data byte.
pub(crate) fn read_stream_header(
    buffer: &[u8],
    offset: usize,
    options: &ParserOptions,
) -> Result<(usize, Dictionary, usize)> {
    let mut lexer = Lexer::new(buffer, offset).with_nul_policy(options.skip_nul_bytes);
    let number = lexer.next_element()?.ok_or(Error::UnexpectedEof)?;
    let generation = lexer.next_element()?.ok_or(Error::UnexpectedEof)?;
    let keyword = lexer.next_element()?.ok_or(Error::UnexpectedEof)?;
    if number.as_number().is_none() || generation.as_number().is_none() || keyword.kind != ElementKind::Object {
        return Err(Error::ParseError {
            offset: number.offset,
            reason: "expected an object header".to_string(),
        });
    }

    let (dict, end) = read_dictionary_at(buffer, lexer.position(), options)?;
    lexer.seek(end);
    match lexer.next_element()? {
        Some(element) => match element.kind {
            ElementKind::Stream { data_offset, .. } => Ok((number.offset, dict, data_offset)),
            _ => Err(Error::ParseError {
                offset: element.offset,
                reason: "expected stream keyword after dictionary".to_string(),
            }),
        },
        None => Err(Error::UnexpectedEof),
    }
}

/// Tokenize and parse one dictionary starting at `pos`.
///
/// Returns the dictionary and the position right after its closing `>>`.
pub(crate) fn read_dictionary_at(buffer: &[u8], pos: usize, options: &ParserOptions) -> Result<(Dictionary, usize)> {
    let mut lexer = Lexer::new(buffer, pos).with_nul_policy(options.skip_nul_bytes);
    let mut elements = Vec::new();
    let mut depth = 0usize;

    loop {
        let element = lexer.next_element()?.ok_or(Error::UnexpectedEof)?;
        match element.kind {
            ElementKind::Comment(_) => continue,
            ElementKind::Dictionary | ElementKind::Array => depth += 1,
            ElementKind::EndDictionary | ElementKind::EndArray => depth = depth.saturating_sub(1),
            ElementKind::Stream { .. } => {
                return Err(Error::ParseError {
                    offset: element.offset,
                    reason: "stream keyword inside a dictionary".to_string(),
                });
            },
            _ => {},
        }
        elements.push(element);
        if depth == 0 {
            break;
        }
    }

    match parse_object_body(&elements, options.max_nesting)? {
        Value::Dictionary(dict) => Ok((dict, lexer.position())),
        other => Err(Error::InvalidObjectType {
            expected: "Dictionary".to_string(),
            found: other.type_name().to_string(),
        }),
    }
}

/// Resolve a stream's `/Length`, following one indirect reference.
pub(crate) fn stream_length(
    buffer: &[u8],
    dict: &Dictionary,
    table: &CrossRefTable,
    options: &ParserOptions,
) -> Result<usize> {
    match dict.require("Length", "stream dictionary")? {
        Value::Reference(reference) => read_indirect_number(buffer, table, *reference, options),
        value => value.as_usize().ok_or_else(|| Error::InvalidObjectType {
            expected: "non-negative integer".to_string(),
            found: value.type_name().to_string(),
        }),
    }
}

/// Read the number stored in a tiny indirect object such as `12 0 obj 345 endobj`.
///
/// The object is located through the xref offset, without tokenizing the
/// whole file.
pub(crate) fn read_indirect_number(
    buffer: &[u8],
    table: &CrossRefTable,
    reference: ObjectRef,
    options: &ParserOptions,
) -> Result<usize> {
    let entry = table
        .get(reference.id)
        .filter(|e| e.entry_type == XRefEntryType::NotCompressed)
        .ok_or(Error::ObjectNotFound(reference.id))?;
    let offset = usize::try_from(entry.offset).map_err(|_| Error::ObjectNotFound(reference.id))?;

    let mut lexer = Lexer::new(buffer, offset).with_nul_policy(options.skip_nul_bytes);
    let mut header = Vec::with_capacity(4);
    for _ in 0..4 {
        header.push(lexer.next_element()?.ok_or(Error::UnexpectedEof)?);
    }
    if header[0].as_number() != Some(reference.id as f64) || header[2].kind != ElementKind::Object {
        return Err(Error::ParseError {
            offset,
            reason: format!("xref offset does not point at object {}", reference.id),
        });
    }
    match header[3].as_number() {
        Some(n) if n >= 0.0 && n.fract() == 0.0 => Ok(n as usize),
        _ => Err(Error::InvalidObjectType {
            expected: "Number".to_string(),
            found: format!("{:?}", header[3].kind),
        }),
    }
}

/// Extract predictor parameters from `/DecodeParms`.
pub(crate) fn decode_params(dict: &Dictionary) -> Result<Option<DecodeParams>> {
    let params = match dict.lookup("DecodeParms") {
        None | Some(Value::Null) => return Ok(None),
        Some(Value::Dictionary(d)) => d,
        Some(Value::Array(a)) => match a.get(0).and_then(Value::as_dict) {
            Some(d) => d,
            None => return Ok(None),
        },
        Some(other) => {
            return Err(Error::InvalidObjectType {
                expected: "Dictionary".to_string(),
                found: other.type_name().to_string(),
            });
        },
    };

    let predictor = params.lookup("Predictor").and_then(Value::as_number).unwrap_or(1.0) as i64;
    let columns = params.lookup("Columns").and_then(Value::as_usize).unwrap_or(1);
    Ok(Some(DecodeParams { predictor, columns }))
}

fn xref_stream_widths(dict: &Dictionary) -> std::result::Result<[usize; 3], &'static str> {
    let w = dict
        .lookup("W")
        .and_then(Value::as_array)
        .ok_or("missing /W array in xref stream")?;
    if w.len() < 3 {
        return Err("/W has fewer than 3 elements");
    }
    let mut widths = [0usize; 3];
    for (i, width) in widths.iter_mut().enumerate() {
        *width = w
            .get(i)
            .and_then(Value::as_usize)
            .filter(|n| *n <= 8)
            .ok_or("/W contains an invalid width")?;
    }
    Ok(widths)
}

fn index_ranges(dict: &Dictionary) -> std::result::Result<Vec<(u64, u64)>, &'static str> {
    match dict.lookup("Index").and_then(Value::as_array) {
        Some(index) => {
            if index.len() % 2 != 0 {
                return Err("/Index has an odd number of elements");
            }
            index
                .items()
                .chunks(2)
                .map(|pair| {
                    let first = pair[0].as_usize().ok_or("/Index has no first object")?;
                    let count = pair[1].as_usize().ok_or("/Index has no number of objects")?;
                    Ok((first as u64, count as u64))
                })
                .collect()
        },
        None => {
            let size = dict
                .lookup("Size")
                .and_then(Value::as_usize)
                .ok_or("/Index and /Size not found")?;
            Ok(vec![(0, size as u64)])
        },
    }
}

fn read_int(bytes: &[u8]) -> u64 {
    bytes.iter().fold(0u64, |acc, b| (acc << 8) | *b as u64)
}

/// Keys copied from the previous trailer into a newly written section.
#[derive(Debug, Clone, Default)]
pub struct TrailerFields {
    /// `/Size`
    pub size: u32,
    /// `/Root`
    pub root: Option<ObjectRef>,
    /// `/Info`
    pub info: Option<ObjectRef>,
    /// Raw hex strings of `/ID`
    pub id: Vec<Vec<u8>>,
    /// `/Prev`: offset of the previous section
    pub prev: Option<usize>,
}

impl TrailerFields {
    /// Collect `/Info` and `/ID` from an existing trailer.
    pub fn inherit(trailer: &Dictionary) -> Self {
        let info = trailer.lookup("Info").and_then(Value::as_reference);
        let id = trailer
            .lookup("ID")
            .and_then(Value::as_array)
            .map(|ids| ids.items().iter().filter_map(Value::as_hex_string).map(<[u8]>::to_vec).collect())
            .unwrap_or_default();
        Self {
            info,
            id,
            ..Self::default()
        }
    }

    fn write_id(&self, out: &mut Vec<u8>) {
        if self.id.is_empty() {
            return;
        }
        out.extend_from_slice(b"/ID [ <");
        for (i, id) in self.id.iter().enumerate() {
            if i > 0 {
                out.extend_from_slice(b"> <");
            }
            out.extend_from_slice(id);
        }
        out.extend_from_slice(b"> ]");
    }
}

/// Append a classic xref table with one sub-section per dirty entry,
/// followed by its trailer.
pub fn write_xref_table(out: &mut Vec<u8>, table: &CrossRefTable, fields: &TrailerFields) -> Result<()> {
    let root = fields.root.ok_or_else(|| Error::MissingKey {
        key: "Root".to_string(),
        context: "trailer".to_string(),
    })?;

    out.extend_from_slice(b"xref\n");
    for (number, entry) in table.dirty_entries() {
        out.extend_from_slice(format!("{} 1\n", number).as_bytes());
        if number == 0 {
            out.extend_from_slice(format!("{:010} 65535 f \n", entry.offset).as_bytes());
        } else {
            out.extend_from_slice(format!("{:010} {:05} n \n", entry.offset, entry.generation).as_bytes());
        }
    }

    out.extend_from_slice(format!("trailer\n<</Size {}/Root {} {} R\n", fields.size, root.id, root.gen).as_bytes());
    if let Some(info) = fields.info {
        out.extend_from_slice(format!("/Info {} {} R\n", info.id, info.gen).as_bytes());
    }
    if !fields.id.is_empty() {
        fields.write_id(out);
        out.push(b'\n');
    }
    if let Some(prev) = fields.prev {
        out.extend_from_slice(format!("/Prev {}", prev).as_bytes());
    }
    out.extend_from_slice(b">>\n");
    Ok(())
}

/// Dirty entries that go into an xref stream.
///
/// The free-list head inherited from a classic table is left out; its
/// generation 65535 does not fit the one-byte column.
fn xref_stream_entries(table: &CrossRefTable) -> impl Iterator<Item = (u32, &XRefEntry)> {
    table.dirty_entries().filter(|(number, entry)| {
        !(*number == 0 && entry.entry_type == XRefEntryType::Free)
    })
}

/// Encode the dirty entries as `W [1 3 1]` rows, PNG Up predicted and
/// Flate compressed.
pub fn encode_xref_stream_rows(table: &CrossRefTable) -> Result<Vec<u8>> {
    let mut rows = Vec::new();
    for (number, entry) in xref_stream_entries(table) {
        if entry.offset > 0xFF_FFFF {
            return Err(Error::InvalidXref {
                offset: entry.offset as usize,
                reason: format!("offset of object {} does not fit in 3 bytes", number),
            });
        }
        let entry_type = match entry.entry_type {
            XRefEntryType::Free => 0u8,
            XRefEntryType::NotCompressed => 1,
            XRefEntryType::Compressed => 2,
        };
        rows.push(entry_type);
        rows.extend_from_slice(&entry.offset.to_be_bytes()[5..]);
        rows.push(entry.generation.min(0xFF) as u8);
    }
    flate_encode(&encode_png_up(&rows, 5)?)
}

/// Append a cross-reference stream object numbered `stream_id`.
///
/// `table` must already contain the dirty entry of the stream itself.
pub fn write_xref_stream(
    out: &mut Vec<u8>,
    table: &CrossRefTable,
    stream_id: u32,
    fields: &TrailerFields,
) -> Result<()> {
    let root = fields.root.ok_or_else(|| Error::MissingKey {
        key: "Root".to_string(),
        context: "xref stream".to_string(),
    })?;
    let data = encode_xref_stream_rows(table)?;

    out.extend_from_slice(
        format!("{} 0 obj\n<</DecodeParms<</Columns 5/Predictor 12>>/Filter/FlateDecode", stream_id).as_bytes(),
    );
    if !fields.id.is_empty() {
        fields.write_id(out);
        out.push(b' ');
    }
    out.extend_from_slice(b"/Index [ ");
    for (number, _) in xref_stream_entries(table) {
        out.extend_from_slice(format!("{} 1 ", number).as_bytes());
    }
    out.extend_from_slice(b"] ");
    if let Some(info) = fields.info {
        out.extend_from_slice(format!("/Info {} {} R ", info.id, info.gen).as_bytes());
    }
    out.extend_from_slice(format!("/Length {}", data.len()).as_bytes());
    if let Some(prev) = fields.prev {
        out.extend_from_slice(format!("/Prev {}", prev).as_bytes());
    }
    out.extend_from_slice(format!("/Root {} {} R ", root.id, root.gen).as_bytes());
    out.extend_from_slice(format!("/Size {}", fields.size).as_bytes());
    out.extend_from_slice(b"/Type/XRef/W[1 3 1]>>\nstream\n");
    out.extend_from_slice(&data);
    out.extend_from_slice(b"\nendstream\nendobj\n\n");
    Ok(())
}
