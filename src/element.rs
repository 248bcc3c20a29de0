//! Lexical elements.
//!
//! The tokenizer turns the edit buffer into a flat list of [`Element`]s.
//! Every element remembers the byte span it was read from, which is what
//! makes byte-exact patching of already serialized dictionaries possible.

/// What kind of lexeme an element is, with its decoded scalar payload.
#[derive(Debug, Clone, PartialEq)]
pub enum ElementKind {
    /// Numeric literal. Integers and reals share one representation.
    Number(f64),
    /// Name without the leading slash, `#xx` escapes decoded
    Name(String),
    /// `true` or `false`
    Boolean(bool),
    /// `null`
    Null,
    /// Raw bytes between the parentheses, escapes untouched
    LiteralString(Vec<u8>),
    /// Raw bytes between the angle brackets, not hex-decoded
    HexString(Vec<u8>),
    /// `[`
    Array,
    /// `]`
    EndArray,
    /// `<<`
    Dictionary,
    /// `>>`
    EndDictionary,
    /// `stream` keyword; the data starts at `data_offset` and spans `length` bytes
    Stream {
        /// Offset of the first data byte, after the keyword's end-of-line
        data_offset: usize,
        /// Declared `/Length`
        length: usize,
    },
    /// `endstream`
    EndStream,
    /// `obj`; the object and generation numbers are the two preceding numbers
    Object,
    /// `endobj`
    EndObject,
    /// `R`; the referenced numbers are the two preceding numbers
    Reference,
    /// `xref`
    XRef,
    /// `trailer`
    Trailer,
    /// `startxref`
    StartXRef,
    /// Comment text after the `%`
    Comment(Vec<u8>),
}

/// One lexeme with its position in the source buffer.
#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    /// Decoded lexeme
    pub kind: ElementKind,
    /// Offset of the first byte of the lexeme
    pub offset: usize,
    /// Length of the lexeme in bytes
    pub len: usize,
}

impl Element {
    /// Create an element.
    pub fn new(kind: ElementKind, offset: usize, len: usize) -> Self {
        Self { kind, offset, len }
    }

    /// Offset one past the last byte of the lexeme.
    pub fn end(&self) -> usize {
        self.offset + self.len
    }

    /// The numeric value, if this is a number.
    pub fn as_number(&self) -> Option<f64> {
        match self.kind {
            ElementKind::Number(n) => Some(n),
            _ => None,
        }
    }

    /// True for a `%%EOF` marker comment.
    pub fn is_eof_marker(&self) -> bool {
        matches!(&self.kind, ElementKind::Comment(text) if text.starts_with(b"%EOF"))
    }
}

/// Decode the raw bytes of a hex string.
///
/// Whitespace is ignored and an odd trailing digit is padded with 0.
/// Returns `None` if a non-hex character is present.
pub fn decode_hex_string(raw: &[u8]) -> Option<Vec<u8>> {
    let digits: Vec<u8> = raw.iter().copied().filter(|c| !c.is_ascii_whitespace()).collect();
    let mut out = Vec::with_capacity(digits.len().div_ceil(2));
    for pair in digits.chunks(2) {
        let hi = hex_value(pair[0])?;
        let lo = match pair.get(1) {
            Some(c) => hex_value(*c)?,
            None => 0,
        };
        out.push((hi << 4) | lo);
    }
    Some(out)
}

/// Decode a hex string holding UTF-16BE text with a `FEFF` byte order mark.
///
/// Returns `None` when the bytes are not hex, the mark is missing, or the
/// code units do not form valid UTF-16.
pub fn decode_hex_string_utf16be(raw: &[u8]) -> Option<String> {
    let bytes = decode_hex_string(raw)?;
    let body = bytes.strip_prefix(&[0xFE, 0xFF])?;
    if body.len() % 2 != 0 {
        return None;
    }
    let units: Vec<u16> = body.chunks(2).map(|c| u16::from_be_bytes([c[0], c[1]])).collect();
    String::from_utf16(&units).ok()
}

/// Encode text as upper-case UTF-16BE hex with a leading `FEFF` mark.
pub fn encode_hex_string_utf16be(text: &str) -> String {
    let mut out = String::from("FEFF");
    for unit in text.encode_utf16() {
        out.push_str(&format!("{:04X}", unit));
    }
    out
}

fn hex_value(c: u8) -> Option<u8> {
    match c {
        b'0'..=b'9' => Some(c - b'0'),
        b'a'..=b'f' => Some(c - b'a' + 10),
        b'A'..=b'F' => Some(c - b'A' + 10),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_element_end() {
        let element = Element::new(ElementKind::Number(42.0), 10, 2);
        assert_eq!(element.end(), 12);
        assert_eq!(element.as_number(), Some(42.0));
    }

    #[test]
    fn test_eof_marker() {
        let eof = Element::new(ElementKind::Comment(b"%EOF".to_vec()), 0, 5);
        assert!(eof.is_eof_marker());
        let other = Element::new(ElementKind::Comment(b"PDF-1.7".to_vec()), 0, 8);
        assert!(!other.is_eof_marker());
    }

    #[test]
    fn test_decode_hex_string() {
        assert_eq!(decode_hex_string(b"48656C6C6F").unwrap(), b"Hello");
        assert_eq!(decode_hex_string(b"48 65\n6c").unwrap(), b"Hel");
        assert_eq!(decode_hex_string(b"901FA").unwrap(), vec![0x90, 0x1F, 0xA0]);
        assert!(decode_hex_string(b"zz").is_none());
    }

    #[test]
    fn test_utf16be_roundtrip() {
        let encoded = encode_hex_string_utf16be("Approved");
        assert!(encoded.starts_with("FEFF0041"));
        assert_eq!(decode_hex_string_utf16be(encoded.as_bytes()).unwrap(), "Approved");
    }

    #[test]
    fn test_utf16be_non_ascii() {
        let encoded = encode_hex_string_utf16be("\u{00e9}t\u{00e9}");
        assert_eq!(encoded, "FEFF00E9007400E9");
        assert_eq!(decode_hex_string_utf16be(encoded.as_bytes()).unwrap(), "\u{00e9}t\u{00e9}");
    }

    #[test]
    fn test_utf16be_requires_bom() {
        assert!(decode_hex_string_utf16be(b"0041").is_none());
    }
}
