//! PDF document model.
//!
//! A [`PdfDocument`] owns an in-memory edit buffer holding the complete
//! file. Reading walks the cross-reference chain, tokenizes the buffer once
//! and indexes every indirect object; incremental updates are appended to
//! the same buffer and nothing reaches storage until [`PdfDocument::write`]
//! or [`PdfDocument::save`] is called.

use crate::config::PdfConfig;
use crate::decoders::{Filter, decode_stream_with_options};
use crate::element::{Element, ElementKind};
use crate::error::{Error, Result};
use crate::fixup::PdfNormalizer;
use crate::lexer::Lexer;
use crate::object::{Array, Dictionary, ObjectRef, PdfObject, StreamSpan, Value};
use crate::objstm::split_object_stream;
use crate::parser::{decode_literal_string_escapes, parse_object_body};
use crate::parser_config::ParserOptions;
use crate::patch::BytePatch;
use crate::xref::{self, CrossRefTable, XRefEntryType, XRefSection, XRefSectionKind};
use std::collections::{HashMap, HashSet};
use std::io::{Read, Write};
use std::path::Path;

/// PDF document.
///
/// This structure represents a PDF loaded for incremental editing, providing
/// access to:
/// - The cross-reference chain and trailers of every revision
/// - Object lookup, including objects stored inside object streams
/// - The page tree and existing signature widgets
/// - Append-only write primitives used by the signing code
///
/// # Example
///
/// ```no_run
/// use pdf_incremental::PdfDocument;
///
/// let doc = PdfDocument::open("sample.pdf")?;
/// println!("Pages: {}", doc.pages()?.len());
/// println!("Signatures: {}", doc.signature_widgets()?.len());
/// # Ok::<(), pdf_incremental::Error>(())
/// ```
pub struct PdfDocument {
    /// The complete file plus every appended update
    buffer: Vec<u8>,
    config: PdfConfig,
    /// Merged cross-reference entries, newest first-seen-wins
    xref: CrossRefTable,
    /// Xref sections, newest first
    sections: Vec<XRefSection>,
    start_xref: usize,
    /// Elements of the whole buffer, in file order
    elements: Vec<Element>,
    /// Arena of all indirect objects
    objects: Vec<PdfObject>,
    /// Header offset -> arena index
    by_offset: HashMap<usize, usize>,
    /// Object number -> arena index of its last top-level definition
    by_number: HashMap<u32, usize>,
    /// Object number -> arena index of object-stream members
    stored: HashMap<u32, usize>,
    /// Offsets just past every `%%EOF` marker and its end-of-line
    eof_offsets: Vec<usize>,
}

impl std::fmt::Debug for PdfDocument {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PdfDocument")
            .field("len", &self.buffer.len())
            .field("xref_entries", &self.xref.len())
            .field("sections", &self.sections.len())
            .field("objects", &self.objects.len())
            .field("eof_offsets", &self.eof_offsets)
            .finish_non_exhaustive()
    }
}

impl PdfDocument {
    /// Read a PDF from memory with the default configuration.
    ///
    /// This function:
    /// 1. Checks the `%PDF-` magic
    /// 2. Copies the input into the edit buffer
    /// 3. Walks every cross-reference section through `/Prev`
    /// 4. Tokenizes the whole buffer and indexes the objects
    /// 5. Expands object streams
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The header is not `%PDF-`
    /// - No `startxref` is found near the end of the file
    /// - A cross-reference section is neither a table nor a stream
    /// - The file does not tokenize
    pub fn read(data: &[u8]) -> Result<Self> {
        Self::read_with_config(data, PdfConfig::default())
    }

    /// Read a PDF from memory.
    pub fn read_with_config(data: &[u8], config: PdfConfig) -> Result<Self> {
        if !data.starts_with(b"%PDF-") {
            let found = String::from_utf8_lossy(&data[..data.len().min(5)]).into_owned();
            log::warn!("Invalid PDF header: {:?}", found);
            return Err(Error::InvalidHeader(found));
        }
        Self::from_buffer(data.to_vec(), config)
    }

    /// Read a PDF from any reader.
    pub fn read_from<R: Read>(mut reader: R) -> Result<Self> {
        let mut data = Vec::new();
        reader.read_to_end(&mut data)?;
        Self::read(&data)
    }

    /// Open a PDF document from a file path.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use pdf_incremental::PdfDocument;
    ///
    /// let doc = PdfDocument::open("sample.pdf")?;
    /// # Ok::<(), pdf_incremental::Error>(())
    /// ```
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let data = std::fs::read(path.as_ref())?;
        Self::read(&data)
    }

    /// Read a PDF, falling back to a normalized copy if the direct read fails.
    ///
    /// The normalizer is given the original bytes once; its output must
    /// read cleanly or the second error is returned.
    pub fn read_with_possible_fixup(data: &[u8], normalizer: &dyn PdfNormalizer) -> Result<Self> {
        match Self::read(data) {
            Ok(document) => Ok(document),
            Err(e) => {
                log::info!("Direct read failed ({}), retrying after {} normalization", e, normalizer.name());
                let normalized = normalizer.normalize(data)?;
                Self::read(&normalized)
            },
        }
    }

    fn from_buffer(buffer: Vec<u8>, config: PdfConfig) -> Result<Self> {
        let chain = xref::read_xref_chain(&buffer, &config.parser)?;
        let scan = scan(&buffer, &chain.table, &config.parser)?;

        let mut document = Self {
            buffer,
            config,
            xref: chain.table,
            sections: chain.sections,
            start_xref: chain.start_xref,
            elements: scan.elements,
            objects: scan.objects,
            by_offset: scan.by_offset,
            by_number: scan.by_number,
            stored: HashMap::new(),
            eof_offsets: scan.eof_offsets,
        };
        document.expand_object_streams()?;

        log::debug!(
            "Read {} bytes: {} xref sections, {} objects ({} in object streams), {} %%EOF markers",
            document.buffer.len(),
            document.sections.len(),
            document.objects.len(),
            document.stored.len(),
            document.eof_offsets.len()
        );
        Ok(document)
    }

    /// Rebuild every index from the current edit buffer.
    pub(crate) fn reload(&mut self) -> Result<()> {
        *self = Self::from_buffer(self.buffer.clone(), self.config.clone())?;
        Ok(())
    }

    /// Drop everything appended after `len` and restore a saved xref.
    pub(crate) fn rollback(&mut self, len: usize, xref: CrossRefTable) {
        self.buffer.truncate(len);
        self.xref = xref;
    }

    fn expand_object_streams(&mut self) -> Result<()> {
        let options = &self.config.parser;
        let mut members = Vec::new();

        for object in &self.objects {
            let Some(span) = object.stream() else {
                continue;
            };
            let dict = match object.value(&self.elements, options.max_nesting) {
                Ok(Value::Dictionary(dict)) if dict.name("Type") == Some("ObjStm") => dict,
                _ => continue,
            };
            if !matches!(Filter::from_value(dict.lookup("Filter")), Ok(Some(Filter::FlateDecode))) {
                log::warn!("Object stream {} is not FlateDecode compressed, skipping", object.number());
                continue;
            }

            let raw = &self.buffer[span.data_offset..span.data_offset + span.length];
            let decoded = decode_stream_with_options(raw, Some(Filter::FlateDecode), None, options)?;
            let container = object.number();

            for member in split_object_stream(dict, &decoded, options.skip_nul_bytes)? {
                let current = match self.xref.get(member.number) {
                    None => true,
                    Some(entry) => {
                        entry.entry_type == XRefEntryType::Compressed && entry.offset == u64::from(container)
                    },
                };
                if current {
                    members.push((container, member));
                } else {
                    log::debug!("Object {} in stream {} is superseded", member.number, container);
                }
            }
        }

        for (container, member) in members {
            self.stored.insert(member.number, self.objects.len());
            self.objects
                .push(PdfObject::stored(member.number, container, member.elements, member.bytes));
        }
        Ok(())
    }

    /// Configuration the document was read with.
    pub fn config(&self) -> &PdfConfig {
        &self.config
    }

    /// Merged cross-reference table.
    pub fn xref(&self) -> &CrossRefTable {
        &self.xref
    }

    /// Cross-reference sections, newest first.
    pub fn xref_sections(&self) -> &[XRefSection] {
        &self.sections
    }

    /// Find an object by number.
    ///
    /// The newest xref entry decides where the object lives: a file offset,
    /// an object stream, or nowhere (free). Objects without an xref entry
    /// fall back to their last definition in the file. The same object is
    /// returned on every call.
    pub fn lookup_object(&self, number: u32) -> Option<&PdfObject> {
        let by_number = || self.by_number.get(&number);
        let index = match self.xref.get(number) {
            Some(entry) => match entry.entry_type {
                XRefEntryType::NotCompressed => usize::try_from(entry.offset)
                    .ok()
                    .and_then(|offset| self.by_offset.get(&offset))
                    .filter(|index| self.objects[**index].number() == number)
                    .or_else(by_number),
                XRefEntryType::Compressed => self.stored.get(&number).or_else(by_number),
                XRefEntryType::Free => None,
            },
            None => by_number().or_else(|| self.stored.get(&number)),
        }?;
        self.objects.get(*index)
    }

    /// File offset of an object stored directly in the file.
    pub fn object_offset(&self, number: u32) -> Option<usize> {
        self.xref
            .get(number)
            .filter(|entry| entry.entry_type == XRefEntryType::NotCompressed)
            .and_then(|entry| usize::try_from(entry.offset).ok())
    }

    /// Parsed value of an object (parsed once, then cached).
    pub fn object_value<'a>(&'a self, object: &'a PdfObject) -> Result<&'a Value> {
        object.value(&self.elements, self.config.parser.max_nesting)
    }

    /// Dictionary of an object, or of a stream object.
    pub fn object_dictionary<'a>(&'a self, object: &'a PdfObject) -> Result<&'a Dictionary> {
        let value = self.object_value(object)?;
        value.as_dict().ok_or_else(|| Error::InvalidObjectType {
            expected: "Dictionary".to_string(),
            found: value.type_name().to_string(),
        })
    }

    /// Array held by an object.
    pub fn object_array<'a>(&'a self, object: &'a PdfObject) -> Result<&'a Array> {
        let value = self.object_value(object)?;
        value.as_array().ok_or_else(|| Error::InvalidObjectType {
            expected: "Array".to_string(),
            found: value.type_name().to_string(),
        })
    }

    /// Follow references until a direct value is reached.
    pub fn resolve<'a>(&'a self, value: &'a Value) -> Result<&'a Value> {
        let limit = self.config.parser.max_nesting;
        let mut current = value;
        for _ in 0..limit {
            match current {
                Value::Reference(reference) => {
                    let object = self
                        .lookup_object(reference.id)
                        .ok_or(Error::ObjectNotFound(reference.id))?;
                    current = self.object_value(object)?;
                },
                direct => return Ok(direct),
            }
        }
        log::warn!("Reference chain longer than {} hops", limit);
        Err(Error::RecursionLimitExceeded(limit))
    }

    /// Raw (still encoded) stream bytes of a stream object.
    pub fn stream_data(&self, object: &PdfObject) -> Result<&[u8]> {
        let span = object.stream().ok_or_else(|| Error::InvalidObjectType {
            expected: "Stream".to_string(),
            found: "Dictionary".to_string(),
        })?;
        self.buffer
            .get(span.data_offset..span.data_offset + span.length)
            .ok_or(Error::UnexpectedEof)
    }

    /// Decoded stream bytes (FlateDecode or unfiltered only).
    pub fn decoded_stream_data(&self, object: &PdfObject) -> Result<Vec<u8>> {
        let dict = self.object_dictionary(object)?;
        let filter = Filter::from_value(dict.lookup("Filter"))?;
        let params = xref::decode_params(dict)?;
        decode_stream_with_options(self.stream_data(object)?, filter, params.as_ref(), &self.config.parser)
    }

    /// Buffer that an object's dictionary and array offsets refer to.
    ///
    /// That is the edit buffer for top-level objects and the private member
    /// bytes for objects recovered from an object stream.
    pub fn object_source<'a>(&'a self, object: &'a PdfObject) -> &'a [u8] {
        object.stream_buffer().unwrap_or(&self.buffer)
    }

    /// Newest trailer dictionary (or xref stream dictionary).
    pub fn trailer(&self) -> Option<&Dictionary> {
        self.sections.first().map(|section| &section.trailer)
    }

    /// Offsets of every trailer (or xref stream object), newest first.
    pub fn trailer_offsets(&self) -> Vec<usize> {
        self.sections.iter().map(|section| section.trailer_offset).collect()
    }

    /// Offsets just past each `%%EOF` marker and the CR, LF or CRLF that
    /// ends its line, in file order.
    pub fn eof_offsets(&self) -> &[usize] {
        &self.eof_offsets
    }

    /// Offset named by the last `startxref`.
    pub fn start_xref(&self) -> usize {
        self.start_xref
    }

    /// True if the newest revision uses a cross-reference stream.
    pub fn uses_xref_stream(&self) -> bool {
        self.sections
            .first()
            .is_some_and(|section| section.kind == XRefSectionKind::Stream)
    }

    /// `/Root` from the most recent trailer that has one.
    pub fn root_reference(&self) -> Result<ObjectRef> {
        self.sections
            .iter()
            .find_map(|section| section.trailer.lookup("Root").and_then(Value::as_reference))
            .ok_or_else(|| {
                log::warn!("No trailer has a /Root reference");
                Error::MissingKey {
                    key: "Root".to_string(),
                    context: "trailer".to_string(),
                }
            })
    }

    /// Document catalog.
    pub fn catalog(&self) -> Result<&PdfObject> {
        let root = self.root_reference()?;
        self.lookup_object(root.id).ok_or(Error::ObjectNotFound(root.id))
    }

    /// Leaf page objects in document order.
    ///
    /// The page tree is walked depth-first from `/Root/Pages`; a node seen
    /// twice is skipped so a cyclic tree cannot loop.
    pub fn pages(&self) -> Result<Vec<&PdfObject>> {
        let catalog = self.object_dictionary(self.catalog()?)?;
        let pages_ref = catalog
            .require("Pages", "catalog")?
            .as_reference()
            .ok_or_else(|| Error::InvalidPdf("/Pages is not a reference".to_string()))?;
        let root = self
            .lookup_object(pages_ref.id)
            .ok_or(Error::ObjectNotFound(pages_ref.id))?;

        let mut pages = Vec::new();
        let mut visited = HashSet::new();
        self.collect_pages(root, &mut visited, &mut pages, 0)?;
        Ok(pages)
    }

    fn collect_pages<'a>(
        &'a self,
        node: &'a PdfObject,
        visited: &mut HashSet<u32>,
        pages: &mut Vec<&'a PdfObject>,
        depth: usize,
    ) -> Result<()> {
        if !visited.insert(node.number()) {
            log::warn!("Page tree node {} visited twice, skipping", node.number());
            return Ok(());
        }
        if depth >= self.config.parser.max_nesting {
            return Err(Error::RecursionLimitExceeded(self.config.parser.max_nesting));
        }

        let dict = self.object_dictionary(node)?;
        let kids = match dict.lookup("Kids") {
            Some(kids) => self.resolve(kids)?.as_array(),
            None => None,
        };
        let Some(kids) = kids else {
            log::warn!("Pages node {} has no /Kids array", node.number());
            return Ok(());
        };

        for kid_ref in kids.references() {
            let Some(kid) = self.lookup_object(kid_ref.id) else {
                log::warn!("Page tree kid {} not found", kid_ref);
                continue;
            };
            if self.object_dictionary(kid)?.name("Type") == Some("Pages") {
                self.collect_pages(kid, visited, pages, depth + 1)?;
            } else if visited.insert(kid.number()) {
                pages.push(kid);
            }
        }
        Ok(())
    }

    /// Annotation array of a page, following one level of indirection.
    pub(crate) fn page_annotations<'a>(&'a self, page: &'a PdfObject) -> Result<Option<&'a Array>> {
        match self.object_dictionary(page)?.lookup("Annots") {
            None => Ok(None),
            Some(annots) => Ok(self.resolve(annots)?.as_array()),
        }
    }

    /// Signature widget annotations (`/FT /Sig`) of every page.
    pub fn signature_widgets(&self) -> Result<Vec<&PdfObject>> {
        let mut widgets = Vec::new();
        for page in self.pages()? {
            let Some(annots) = self.page_annotations(page)? else {
                continue;
            };
            for annot_ref in annots.references() {
                let Some(annot) = self.lookup_object(annot_ref.id) else {
                    continue;
                };
                if let Ok(dict) = self.object_dictionary(annot) {
                    if dict.name("FT") == Some("Sig") {
                        widgets.push(annot);
                    }
                }
            }
        }
        Ok(widgets)
    }

    /// One past the highest `SignatureN` field name, starting at 1.
    pub fn next_signature_index(&self) -> Result<u32> {
        let mut highest = 0;
        for widget in self.signature_widgets()? {
            let dict = self.object_dictionary(widget)?;
            let Some(raw) = dict.lookup("T").and_then(Value::as_literal_string) else {
                continue;
            };
            let name = decode_literal_string_escapes(raw);
            if let Some(suffix) = name.strip_prefix(b"Signature") {
                if let Some(index) = std::str::from_utf8(suffix).ok().and_then(|s| s.parse::<u32>().ok()) {
                    highest = highest.max(index);
                }
            }
        }
        Ok(highest + 1)
    }

    /// Remove the signature at `position` and every later revision.
    ///
    /// The edit buffer is truncated right after the `%%EOF` line (CR, LF or
    /// CRLF included) that precedes the signature's revision. A line break
    /// that [`PdfDocument::sign`] added after a bare `%%EOF` stays. Each signature must have been added in its
    /// own revision, so there has to be exactly one `%%EOF` per signature
    /// plus the original one.
    pub fn remove_signature(&mut self, position: usize) -> Result<()> {
        let signatures = self.signature_widgets()?.len();
        if position >= signatures {
            log::warn!("Signature {} requested, document has {}", position, signatures);
            return Err(Error::InvalidPdf(format!(
                "signature index {} is out of range ({} signatures)",
                position, signatures
            )));
        }
        if self.eof_offsets.len() != signatures + 1 {
            log::warn!(
                "{} %%EOF markers for {} signatures, refusing to truncate",
                self.eof_offsets.len(),
                signatures
            );
            return Err(Error::InvalidPdf(
                "signatures and incremental updates do not line up".to_string(),
            ));
        }

        let end = self.eof_offsets[position].min(self.buffer.len());
        self.buffer.truncate(end);
        self.reload()
    }

    /// Mark an existing object as rewritten at the current end of the buffer.
    pub fn update_object(&mut self, number: u32) {
        let generation = self.lookup_object(number).map_or(0, PdfObject::generation);
        self.xref.mark_written(number, self.buffer.len() as u64, generation);
    }

    /// Allocate a new object number written at the current end of the buffer.
    pub fn create_object(&mut self) -> u32 {
        let number = self.xref.next_object_number();
        self.xref.mark_written(number, self.buffer.len() as u64, 0);
        number
    }

    /// Append bytes to the edit buffer.
    pub fn append(&mut self, bytes: &[u8]) {
        self.buffer.extend_from_slice(bytes);
    }

    /// Overwrite already written bytes without moving anything.
    pub fn patch(&mut self, patch: &BytePatch) -> Result<()> {
        patch.apply_in_place(&mut self.buffer)
    }

    /// Write the complete edit buffer.
    pub fn write<W: Write>(&self, mut writer: W) -> Result<()> {
        writer.write_all(&self.buffer)?;
        writer.flush()?;
        Ok(())
    }

    /// Write the complete edit buffer to a file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        std::fs::write(path.as_ref(), &self.buffer)?;
        Ok(())
    }

    /// The complete edit buffer.
    pub fn as_bytes(&self) -> &[u8] {
        &self.buffer
    }

    /// Length of the edit buffer.
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// True if the edit buffer is empty.
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }
}

/// Offset just past the CR, LF or CRLF starting at `at`, or `at` itself.
fn end_of_line(buffer: &[u8], at: usize) -> usize {
    match buffer.get(at..).unwrap_or_default() {
        [b'\r', b'\n', ..] => at + 2,
        [b'\r' | b'\n', ..] => at + 1,
        _ => at,
    }
}

/// Indexes produced by the full tokenize pass.
#[derive(Default)]
struct Scan {
    elements: Vec<Element>,
    objects: Vec<PdfObject>,
    by_offset: HashMap<usize, usize>,
    by_number: HashMap<u32, usize>,
    eof_offsets: Vec<usize>,
}

/// An `N G obj` whose `endobj` has not been seen yet.
struct OpenObject {
    number: u32,
    generation: u16,
    offset: usize,
    first_element: usize,
    stream: Option<StreamSpan>,
}

impl Scan {
    fn register(&mut self, object: OpenObject, end: usize) {
        let index = self.objects.len();
        self.objects.push(PdfObject::top_level(
            object.number,
            object.generation,
            object.offset,
            object.first_element..end,
            object.stream,
        ));
        self.by_offset.insert(object.offset, index);
        if self.by_number.insert(object.number, index).is_some() {
            log::debug!("Object {} redefined at offset {}", object.number, object.offset);
        }
    }
}

fn object_header(elements: &[Element], at: usize) -> Result<(u32, u16, usize)> {
    let header = at
        .checked_sub(2)
        .map(|first| (&elements[first], &elements[first + 1]));
    if let Some((number, generation)) = header {
        if let (Some(n), Some(g)) = (number.as_number(), generation.as_number()) {
            if n >= 0.0 && n <= u32::MAX as f64 && g >= 0.0 && g <= u16::MAX as f64 {
                return Ok((n as u32, g as u16, number.offset));
            }
        }
    }
    Err(Error::ParseError {
        offset: elements.get(at).map_or(0, |e| e.offset),
        reason: "obj keyword without object and generation numbers".to_string(),
    })
}

/// Tokenize the whole buffer once and index the indirect objects.
fn scan(buffer: &[u8], table: &CrossRefTable, options: &ParserOptions) -> Result<Scan> {
    let mut lexer = Lexer::new(buffer, 0).with_nul_policy(options.skip_nul_bytes);
    let mut scan = Scan::default();
    let mut open: Option<OpenObject> = None;

    while let Some(element) = lexer.next_element()? {
        match element.kind {
            ElementKind::Object => {
                let at = scan.elements.len();
                let (number, generation, offset) = object_header(&scan.elements, at)?;
                if let Some(unclosed) = open.take() {
                    log::warn!("Object {} has no endobj", unclosed.number);
                    scan.register(unclosed, at - 2);
                }
                scan.elements.push(element);
                open = Some(OpenObject {
                    number,
                    generation,
                    offset,
                    first_element: at + 1,
                    stream: None,
                });
            },
            ElementKind::Stream { data_offset, .. } => {
                let current = open.as_mut().ok_or_else(|| Error::ParseError {
                    offset: element.offset,
                    reason: "stream outside of an indirect object".to_string(),
                })?;
                let length = match parse_object_body(&scan.elements[current.first_element..], options.max_nesting)? {
                    Value::Dictionary(dict) => xref::stream_length(buffer, &dict, table, options)?,
                    other => {
                        return Err(Error::InvalidObjectType {
                            expected: "Dictionary".to_string(),
                            found: other.type_name().to_string(),
                        });
                    },
                };
                let end_stream = lexer.skip_stream_data(data_offset, length)?;
                current.stream = Some(StreamSpan { data_offset, length });
                scan.elements.push(Element::new(
                    ElementKind::Stream { data_offset, length },
                    element.offset,
                    element.len,
                ));
                scan.elements.push(end_stream);
            },
            ElementKind::EndObject => {
                let at = scan.elements.len();
                if let Some(current) = open.take() {
                    scan.register(current, at);
                }
                scan.elements.push(element);
            },
            ElementKind::XRef => {
                // Table rows are not tokens; jump to the trailer
                let from = lexer.position();
                let found = buffer[from..]
                    .windows(b"trailer".len())
                    .position(|w| w == b"trailer")
                    .ok_or_else(|| Error::InvalidXref {
                        offset: element.offset,
                        reason: "xref table without trailer".to_string(),
                    })?;
                lexer.seek(from + found);
                scan.elements.push(element);
            },
            ElementKind::Comment(_) => {
                if element.is_eof_marker() {
                    scan.eof_offsets.push(end_of_line(buffer, element.end()));
                }
                scan.elements.push(element);
            },
            _ => scan.elements.push(element),
        }
    }

    if let Some(unclosed) = open.take() {
        log::warn!("Object {} has no endobj before the end of the file", unclosed.number);
        let end = scan.elements.len();
        scan.register(unclosed, end);
    }
    Ok(scan)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Build a classic-xref PDF from object bodies numbered 1..=n.
    fn build_pdf(bodies: &[&str]) -> Vec<u8> {
        let mut out = b"%PDF-1.4\n".to_vec();
        let mut offsets = Vec::new();
        for (i, body) in bodies.iter().enumerate() {
            offsets.push(out.len());
            out.extend_from_slice(format!("{} 0 obj\n{}\nendobj\n", i + 1, body).as_bytes());
        }
        let xref_offset = out.len();
        out.extend_from_slice(format!("xref\n0 {}\n0000000000 65535 f \n", bodies.len() + 1).as_bytes());
        for offset in offsets {
            out.extend_from_slice(format!("{:010} 00000 n \n", offset).as_bytes());
        }
        out.extend_from_slice(
            format!(
                "trailer\n<</Size {}/Root 1 0 R>>\nstartxref\n{}\n%%EOF\n",
                bodies.len() + 1,
                xref_offset
            )
            .as_bytes(),
        );
        out
    }

    fn one_page() -> Vec<u8> {
        build_pdf(&[
            "<</Type/Catalog/Pages 2 0 R>>",
            "<</Type/Pages/Kids[3 0 R]/Count 1>>",
            "<</Type/Page/Parent 2 0 R/MediaBox[0 0 612 792]>>",
        ])
    }

    #[test]
    fn test_read_and_lookup() {
        let doc = PdfDocument::read(&one_page()).unwrap();
        let page = doc.lookup_object(3).unwrap();
        let dict = doc.object_dictionary(page).unwrap();
        assert_eq!(dict.name("Type"), Some("Page"));
        assert_eq!(doc.object_offset(3), Some(page.offset()));
        assert!(doc.lookup_object(9).is_none());
        assert!(!doc.uses_xref_stream());
    }

    #[test]
    fn test_lookup_is_idempotent() {
        let doc = PdfDocument::read(&one_page()).unwrap();
        let first = doc.lookup_object(1).unwrap();
        let second = doc.lookup_object(1).unwrap();
        assert!(std::ptr::eq(first, second));
        let a = doc.object_value(first).unwrap();
        let b = doc.object_value(second).unwrap();
        assert!(std::ptr::eq(a, b));
    }

    #[test]
    fn test_bad_header() {
        match PdfDocument::read(b"%!PS-Adobe") {
            Err(Error::InvalidHeader(found)) => assert_eq!(found, "%!PS-"),
            other => panic!("Expected InvalidHeader, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_startxref() {
        let result = PdfDocument::read(b"%PDF-1.4\n1 0 obj\n<<>>\nendobj\n");
        assert!(matches!(result, Err(Error::MissingStartXref)));
    }

    #[test]
    fn test_round_trip_bytes() {
        let data = one_page();
        let doc = PdfDocument::read(&data).unwrap();
        let mut out = Vec::new();
        doc.write(&mut out).unwrap();
        assert_eq!(out, data);
        assert_eq!(doc.len(), data.len());
    }

    #[test]
    fn test_eof_offsets() {
        let data = one_page();
        let doc = PdfDocument::read(&data).unwrap();
        // The line break after "%%EOF" belongs to the marker
        assert_eq!(doc.eof_offsets(), &[data.len()]);
    }

    #[test]
    fn test_end_of_line() {
        assert_eq!(end_of_line(b"%%EOF\r\nx", 5), 7);
        assert_eq!(end_of_line(b"%%EOF\rx", 5), 6);
        assert_eq!(end_of_line(b"%%EOF\n", 5), 6);
        assert_eq!(end_of_line(b"%%EOF", 5), 5);
        assert_eq!(end_of_line(b"%%EOF 1", 5), 5);
    }

    #[test]
    fn test_pages_nested_and_cyclic() {
        let data = build_pdf(&[
            "<</Type/Catalog/Pages 2 0 R>>",
            "<</Type/Pages/Kids[3 0 R 4 0 R]/Count 2>>",
            "<</Type/Pages/Kids[5 0 R 2 0 R]/Parent 2 0 R>>",
            "<</Type/Page/Parent 2 0 R>>",
            "<</Type/Page/Parent 3 0 R>>",
        ]);
        let doc = PdfDocument::read(&data).unwrap();
        let numbers: Vec<u32> = doc.pages().unwrap().iter().map(|p| p.number()).collect();
        assert_eq!(numbers, vec![5, 4]);
    }

    #[test]
    fn test_pages_missing_root_pages() {
        let doc = PdfDocument::read(&build_pdf(&["<</Type/Catalog>>"])).unwrap();
        assert!(matches!(doc.pages(), Err(Error::MissingKey { .. })));
    }

    #[test]
    fn test_signature_widgets_and_next_index() {
        let data = build_pdf(&[
            "<</Type/Catalog/Pages 2 0 R>>",
            "<</Type/Pages/Kids[3 0 R]/Count 1>>",
            "<</Type/Page/Parent 2 0 R/Annots 4 0 R>>",
            "[5 0 R 6 0 R]",
            "<</Type/Annot/Subtype/Widget/FT/Sig/T(Signature3)>>",
            "<</Type/Annot/Subtype/Link>>",
        ]);
        let doc = PdfDocument::read(&data).unwrap();
        let widgets = doc.signature_widgets().unwrap();
        assert_eq!(widgets.len(), 1);
        assert_eq!(widgets[0].number(), 5);
        assert_eq!(doc.next_signature_index().unwrap(), 4);
    }

    #[test]
    fn test_next_signature_index_defaults_to_one() {
        let doc = PdfDocument::read(&one_page()).unwrap();
        assert_eq!(doc.next_signature_index().unwrap(), 1);
    }

    #[test]
    fn test_resolve_follows_references() {
        let data = build_pdf(&["<</Type/Catalog/Pages 2 0 R/Extra 3 0 R>>", "<</Type/Pages/Kids[]>>", "42"]);
        let doc = PdfDocument::read(&data).unwrap();
        let catalog = doc.object_dictionary(doc.catalog().unwrap()).unwrap();
        let extra = doc.resolve(catalog.lookup("Extra").unwrap()).unwrap();
        assert_eq!(extra, &Value::Number(42.0));
    }

    #[test]
    fn test_stream_object() {
        let data = build_pdf(&["<</Type/Catalog>>", "<</Length 5>>\nstream\nhello\nendstream"]);
        let doc = PdfDocument::read(&data).unwrap();
        let stream = doc.lookup_object(2).unwrap();
        assert_eq!(doc.stream_data(stream).unwrap(), b"hello");
        assert_eq!(doc.decoded_stream_data(stream).unwrap(), b"hello");
    }

    #[test]
    fn test_stream_with_indirect_length() {
        let data = build_pdf(&["<</Type/Catalog>>", "<</Length 3 0 R>>\nstream\nhello\nendstream", "5"]);
        let doc = PdfDocument::read(&data).unwrap();
        let stream = doc.lookup_object(2).unwrap();
        assert_eq!(doc.stream_data(stream).unwrap(), b"hello");
    }

    #[test]
    fn test_create_and_update_object() {
        let mut doc = PdfDocument::read(&one_page()).unwrap();
        let len = doc.len() as u64;
        let number = doc.create_object();
        assert_eq!(number, 4);
        assert_eq!(doc.xref().get(4).unwrap().offset, len);
        assert!(doc.xref().get(4).unwrap().dirty);

        doc.append(b"junk");
        doc.update_object(3);
        let entry = doc.xref().get(3).unwrap();
        assert_eq!(entry.offset, len + 4);
        assert!(entry.dirty);
    }

    #[test]
    fn test_patch_in_place() {
        let mut doc = PdfDocument::read(&one_page()).unwrap();
        doc.append(b"AAAA");
        let at = doc.len() - 4;
        doc.patch(&BytePatch::new(at, 2, "BB")).unwrap();
        assert!(doc.as_bytes().ends_with(b"BBAA"));
        assert!(doc.patch(&BytePatch::new(at, 2, "CCC")).is_err());
    }

    #[test]
    fn test_remove_signature_out_of_range() {
        let mut doc = PdfDocument::read(&one_page()).unwrap();
        assert!(doc.remove_signature(0).is_err());
    }
}
