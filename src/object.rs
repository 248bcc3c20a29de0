//! PDF object model.
//!
//! Values keep the byte offsets of their delimiters and, for dictionary
//! entries, the span of every key + value pair. Objects do not own each
//! other: a [`Value::Reference`] is just an object number that the owning
//! document resolves through its arena.

use crate::element::Element;
use crate::error::{Error, Result};
use crate::parser::parse_object_body;
use indexmap::IndexMap;
use std::cell::OnceCell;
use std::ops::Range;

/// Reference to an indirect object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectRef {
    /// Object number
    pub id: u32,
    /// Generation number
    pub gen: u16,
}

impl ObjectRef {
    /// Create a new object reference.
    pub fn new(id: u32, gen: u16) -> Self {
        Self { id, gen }
    }
}

impl std::fmt::Display for ObjectRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {} R", self.id, self.gen)
    }
}

/// A parsed PDF value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Integer or real number
    Number(f64),
    /// Name without the leading slash
    Name(String),
    /// Boolean value
    Boolean(bool),
    /// Null object
    Null,
    /// Literal string, raw bytes between the parentheses
    LiteralString(Vec<u8>),
    /// Hex string, raw bytes between the angle brackets
    HexString(Vec<u8>),
    /// Array of values
    Array(Array),
    /// Dictionary
    Dictionary(Dictionary),
    /// Indirect object reference
    Reference(ObjectRef),
}

impl Value {
    /// Get the type name of this value (without data).
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Number(_) => "Number",
            Value::Name(_) => "Name",
            Value::Boolean(_) => "Boolean",
            Value::Null => "Null",
            Value::LiteralString(_) => "LiteralString",
            Value::HexString(_) => "HexString",
            Value::Array(_) => "Array",
            Value::Dictionary(_) => "Dictionary",
            Value::Reference(_) => "Reference",
        }
    }

    /// Try to cast to number.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Try to cast to a non-negative whole number.
    pub fn as_usize(&self) -> Option<usize> {
        match self {
            Value::Number(n) if *n >= 0.0 && n.fract() == 0.0 => Some(*n as usize),
            _ => None,
        }
    }

    /// Try to cast to name.
    pub fn as_name(&self) -> Option<&str> {
        match self {
            Value::Name(s) => Some(s),
            _ => None,
        }
    }

    /// Try to cast to dictionary.
    pub fn as_dict(&self) -> Option<&Dictionary> {
        match self {
            Value::Dictionary(d) => Some(d),
            _ => None,
        }
    }

    /// Try to cast to array.
    pub fn as_array(&self) -> Option<&Array> {
        match self {
            Value::Array(a) => Some(a),
            _ => None,
        }
    }

    /// Try to cast to reference.
    pub fn as_reference(&self) -> Option<ObjectRef> {
        match self {
            Value::Reference(r) => Some(*r),
            _ => None,
        }
    }

    /// Raw bytes of a literal string.
    pub fn as_literal_string(&self) -> Option<&[u8]> {
        match self {
            Value::LiteralString(s) => Some(s),
            _ => None,
        }
    }

    /// Raw bytes of a hex string.
    pub fn as_hex_string(&self) -> Option<&[u8]> {
        match self {
            Value::HexString(s) => Some(s),
            _ => None,
        }
    }
}

/// Array value with the offsets of its `[` and `]` delimiters.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Array {
    items: Vec<Value>,
    offset: usize,
    end_offset: usize,
}

impl Array {
    /// Create an array that was not read from a buffer.
    pub fn new(items: Vec<Value>) -> Self {
        Self {
            items,
            offset: 0,
            end_offset: 0,
        }
    }

    pub(crate) fn with_offsets(items: Vec<Value>, offset: usize, end_offset: usize) -> Self {
        Self {
            items,
            offset,
            end_offset,
        }
    }

    /// The array elements.
    pub fn items(&self) -> &[Value] {
        &self.items
    }

    /// Number of elements.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// True if the array is empty.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Element at `index`.
    pub fn get(&self, index: usize) -> Option<&Value> {
        self.items.get(index)
    }

    /// Offset of the opening `[`.
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Offset of the closing `]`.
    pub fn end_offset(&self) -> usize {
        self.end_offset
    }

    /// Iterate over the references in the array, skipping other values.
    pub fn references(&self) -> impl Iterator<Item = ObjectRef> + '_ {
        self.items.iter().filter_map(Value::as_reference)
    }
}

/// Dictionary entry with the byte span of its key and value.
#[derive(Debug, Clone, PartialEq)]
pub struct DictEntry {
    /// The value
    pub value: Value,
    /// Offset of the `/` that starts the key
    pub key_offset: usize,
    /// Bytes from the key start to one past the end of the value
    pub key_value_len: usize,
}

/// Dictionary with keys in source order and the offsets of `<<` and `>>`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Dictionary {
    entries: IndexMap<String, DictEntry>,
    offset: usize,
    end_offset: usize,
}

impl Dictionary {
    /// Create an empty dictionary that was not read from a buffer.
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with_offsets(entries: IndexMap<String, DictEntry>, offset: usize, end_offset: usize) -> Self {
        Self {
            entries,
            offset,
            end_offset,
        }
    }

    /// Look up a key.
    pub fn lookup(&self, key: &str) -> Option<&Value> {
        self.entries.get(key).map(|entry| &entry.value)
    }

    /// Look up a key with its byte span.
    pub fn entry(&self, key: &str) -> Option<&DictEntry> {
        self.entries.get(key)
    }

    /// Offset of the key's leading `/`.
    pub fn key_offset(&self, key: &str) -> Option<usize> {
        self.entries.get(key).map(|entry| entry.key_offset)
    }

    /// Length of key + value in bytes.
    pub fn key_value_length(&self, key: &str) -> Option<usize> {
        self.entries.get(key).map(|entry| entry.key_value_len)
    }

    /// True if the key is present.
    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Iterate over keys and values in source order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(k, entry)| (k.as_str(), &entry.value))
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if the dictionary is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Offset of the opening `<<`.
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Offset of the closing `>>`.
    pub fn end_offset(&self) -> usize {
        self.end_offset
    }

    /// Insert a value without byte-span information.
    pub fn insert(&mut self, key: impl Into<String>, value: Value) {
        self.entries.insert(
            key.into(),
            DictEntry {
                value,
                key_offset: 0,
                key_value_len: 0,
            },
        );
    }

    /// Name value of a key.
    pub fn name(&self, key: &str) -> Option<&str> {
        self.lookup(key).and_then(Value::as_name)
    }

    /// Look up a key that must be present.
    pub fn require(&self, key: &str, context: &str) -> Result<&Value> {
        self.lookup(key).ok_or_else(|| Error::MissingKey {
            key: key.to_string(),
            context: context.to_string(),
        })
    }
}

/// Where an object's elements live.
#[derive(Debug, Clone)]
pub enum ElementSource {
    /// A range of the document-wide element list, after `obj`
    Document(Range<usize>),
    /// Elements tokenized from an object-stream member
    Owned(Vec<Element>),
}

/// Location of stream data in the edit buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamSpan {
    /// Offset of the first data byte
    pub data_offset: usize,
    /// Declared data length
    pub length: usize,
}

/// An indirect object.
///
/// Its body is parsed the first time it is needed and cached for the rest
/// of the object's life, so repeated lookups return the same value.
#[derive(Debug)]
pub struct PdfObject {
    number: u32,
    generation: u16,
    offset: usize,
    source: ElementSource,
    stream: Option<StreamSpan>,
    stream_buffer: Option<Vec<u8>>,
    container: Option<u32>,
    body: OnceCell<Value>,
}

impl PdfObject {
    /// Object that lives directly in the edit buffer.
    pub(crate) fn top_level(
        number: u32,
        generation: u16,
        offset: usize,
        elements: Range<usize>,
        stream: Option<StreamSpan>,
    ) -> Self {
        Self {
            number,
            generation,
            offset,
            source: ElementSource::Document(elements),
            stream,
            stream_buffer: None,
            container: None,
            body: OnceCell::new(),
        }
    }

    /// Object recovered from an object stream.
    pub(crate) fn stored(number: u32, container: u32, elements: Vec<Element>, stream_buffer: Vec<u8>) -> Self {
        Self {
            number,
            generation: 0,
            offset: 0,
            source: ElementSource::Owned(elements),
            stream: None,
            stream_buffer: Some(stream_buffer),
            container: Some(container),
            body: OnceCell::new(),
        }
    }

    /// Object number.
    pub fn number(&self) -> u32 {
        self.number
    }

    /// Generation number.
    pub fn generation(&self) -> u16 {
        self.generation
    }

    /// Reference to this object.
    pub fn reference(&self) -> ObjectRef {
        ObjectRef::new(self.number, self.generation)
    }

    /// Offset of the `N G obj` header in the edit buffer (0 for stored objects).
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Stream data location, if the object is a stream.
    pub fn stream(&self) -> Option<StreamSpan> {
        self.stream
    }

    /// Private copy of the serialized bytes of an object-stream member.
    pub fn stream_buffer(&self) -> Option<&[u8]> {
        self.stream_buffer.as_deref()
    }

    /// Number of the object stream holding this object, if any.
    pub fn container(&self) -> Option<u32> {
        self.container
    }

    /// Where the object's elements live.
    pub fn source(&self) -> &ElementSource {
        &self.source
    }

    /// Parse the body on first access and return the cached value.
    ///
    /// `document_elements` is the document-wide element list; it is ignored
    /// for objects that own their elements.
    pub(crate) fn value(&self, document_elements: &[Element], max_nesting: usize) -> Result<&Value> {
        if let Some(value) = self.body.get() {
            return Ok(value);
        }
        let elements = match &self.source {
            ElementSource::Document(range) => document_elements.get(range.clone()).ok_or(Error::ParseError {
                offset: self.offset,
                reason: format!("element range of object {} is out of bounds", self.number),
            })?,
            ElementSource::Owned(elements) => elements.as_slice(),
        };
        let parsed = parse_object_body(elements, max_nesting).map_err(|e| {
            log::warn!("Failed to parse object {}: {}", self.number, e);
            e
        })?;
        Ok(self.body.get_or_init(|| parsed))
    }
}
