//! PDF lexer (tokenizer).
//!
//! This module provides low-level tokenization of PDF byte streams into
//! [`Element`]s that remember their byte span.
//!
//! # PDF Syntax Overview
//!
//! PDF uses a PostScript-like syntax with the following token types:
//! - Numbers: integers (42, -123) and reals (3.14, -2.5)
//! - Strings: literal ((Hello)) and hexadecimal (<48656C6C6F>)
//! - Names: identifiers starting with / (/Type, /Pages)
//! - Keywords: true, false, null, obj, endobj, stream, endstream, R,
//!   xref, trailer, startxref
//! - Delimiters: `[`, `]`, `<<`, `>>`
//! - Comments: `%` to end of line (kept, since `%%EOF` markers matter)
//!
//! Whitespace (space, \t, \r, \n, \f) is skipped. Stray NUL bytes are
//! skipped with a warning. Anything else that does not start a token is
//! rejected.

use crate::element::{Element, ElementKind};
use crate::error::{Error, Result};
use nom::{
    IResult,
    branch::alt,
    bytes::complete::{tag, take_till, take_while, take_while1},
    character::complete::char,
    combinator::{map, map_opt, value},
    sequence::{delimited, preceded},
};

/// Parse a comment (% to end of line).
///
/// The returned bytes exclude the leading `%` and the line terminator.
fn parse_comment(input: &[u8]) -> IResult<&[u8], ElementKind> {
    map(preceded(char('%'), take_till(|c| c == b'\r' || c == b'\n')), |text: &[u8]| {
        ElementKind::Comment(text.to_vec())
    })(input)
}

/// Parse a number.
///
/// A number is the run of digits, `+`, `-` and `.` characters. There is no
/// exponent form in PDF; the value is kept as `f64` whether or not it looks
/// like an integer.
fn parse_number(input: &[u8]) -> IResult<&[u8], ElementKind> {
    map_opt(
        take_while1(|c: u8| c.is_ascii_digit() || matches!(c, b'+' | b'-' | b'.')),
        |digits: &[u8]| {
            let text = std::str::from_utf8(digits).ok()?;
            text.parse::<f64>().ok().map(ElementKind::Number)
        },
    )(input)
}

/// Parse a literal string enclosed in parentheses.
///
/// Literal strings can contain balanced nested parentheses and escape
/// sequences (PDF Ref 1.7, Section 3.2.3). The raw bytes including escape
/// sequences are returned; nothing is decoded here.
fn parse_literal_string(input: &[u8]) -> IResult<&[u8], ElementKind> {
    let (remaining, _) = char('(')(input)?;
    let mut depth = 1;
    let mut pos = 0;

    while depth > 0 && pos < remaining.len() {
        match remaining[pos] {
            b'\\' => {
                // Skip the escaped character; octal digits are plain bytes
                pos += 2;
            },
            b'(' => {
                depth += 1;
                pos += 1;
            },
            b')' => {
                depth -= 1;
                pos += 1;
            },
            _ => {
                pos += 1;
            },
        }
    }

    if depth != 0 || pos > remaining.len() {
        // Unbalanced parentheses
        return Err(nom::Err::Error(nom::error::Error::new(input, nom::error::ErrorKind::Tag)));
    }

    // Content excludes the closing parenthesis
    let content = &remaining[..pos - 1];
    Ok((&remaining[pos..], ElementKind::LiteralString(content.to_vec())))
}

/// Parse a hexadecimal string enclosed in angle brackets.
///
/// The raw bytes between `<` and `>` are kept; decoding is opt-in through
/// [`crate::element::decode_hex_string`].
fn parse_hex_string(input: &[u8]) -> IResult<&[u8], ElementKind> {
    // Must not be a dictionary start (<<)
    if input.starts_with(b"<<") {
        return Err(nom::Err::Error(nom::error::Error::new(input, nom::error::ErrorKind::Tag)));
    }

    delimited(
        char('<'),
        map(take_till(|c| c == b'>'), |raw: &[u8]| ElementKind::HexString(raw.to_vec())),
        char('>'),
    )(input)
}

/// Decode #XX escape sequences in PDF names.
///
/// PDF Spec: ISO 32000-1:2008, Section 7.3.5 - Name Objects
///
/// Escapes are decoded to bytes before the result is read as UTF-8, so
/// `#C3#A9` is `é`. Returns `None` when the decoded bytes are not UTF-8,
/// since such a name could not be written back unchanged.
///
/// # Examples
///
/// ```
/// # use pdf_incremental::lexer::decode_name_escapes;
/// assert_eq!(decode_name_escapes(b"A#20B#23C").as_deref(), Some("A B#C"));
/// assert_eq!(decode_name_escapes(b"Type").as_deref(), Some("Type"));
/// assert_eq!(decode_name_escapes(b"A#").as_deref(), Some("A#")); // Invalid sequence preserved
/// assert_eq!(decode_name_escapes(b"A#E9"), None);
/// ```
pub fn decode_name_escapes(name: &[u8]) -> Option<String> {
    let mut result = Vec::with_capacity(name.len());
    let mut index = 0;

    while index < name.len() {
        let escaped = name
            .get(index + 1..index + 3)
            .filter(|hex| name[index] == b'#' && hex.iter().all(u8::is_ascii_hexdigit))
            .and_then(|hex| std::str::from_utf8(hex).ok())
            .and_then(|hex| u8::from_str_radix(hex, 16).ok());
        match escaped {
            Some(byte) => {
                result.push(byte);
                index += 3;
            },
            // Invalid or truncated escapes are kept as literal characters
            None => {
                result.push(name[index]);
                index += 1;
            },
        }
    }

    String::from_utf8(result).ok()
}

fn is_delimiter_or_space(c: u8) -> bool {
    matches!(
        c,
        b' ' | b'\t' | b'\r' | b'\n' | 0x00 | 0x0C | // Whitespace
        b'/' | b'%' | // Start of name/comment
        b'(' | b')' | b'<' | b'>' | b'[' | b']' | b'{' | b'}' // Delimiters
    )
}

/// Parse a name starting with /.
///
/// Names can contain any characters except whitespace and delimiters.
/// `#XX` escape sequences are decoded. A name that does not decode to
/// UTF-8 is not a token.
fn parse_name(input: &[u8]) -> IResult<&[u8], ElementKind> {
    preceded(
        char('/'),
        map_opt(take_while(|c: u8| !is_delimiter_or_space(c)), |bytes: &[u8]| {
            decode_name_escapes(bytes).map(ElementKind::Name)
        }),
    )(input)
}

/// Parse an alphabetic keyword.
///
/// Unknown keywords fail to parse, which aborts the tokenize pass.
fn parse_keyword(input: &[u8]) -> IResult<&[u8], ElementKind> {
    map_opt(take_while1(|c: u8| c.is_ascii_alphabetic()), |word: &[u8]| {
        let kind = match word {
            b"true" => ElementKind::Boolean(true),
            b"false" => ElementKind::Boolean(false),
            b"null" => ElementKind::Null,
            b"obj" => ElementKind::Object,
            b"endobj" => ElementKind::EndObject,
            b"stream" => ElementKind::Stream {
                data_offset: 0,
                length: 0,
            },
            b"endstream" => ElementKind::EndStream,
            b"R" => ElementKind::Reference,
            b"xref" => ElementKind::XRef,
            b"trailer" => ElementKind::Trailer,
            b"startxref" => ElementKind::StartXRef,
            _ => return None,
        };
        Some(kind)
    })(input)
}

/// Parse delimiters.
///
/// Note: `<<` must be checked before a hex string and `>>` on its own.
fn parse_delimiter(input: &[u8]) -> IResult<&[u8], ElementKind> {
    alt((
        value(ElementKind::Dictionary, tag(b"<<")),
        value(ElementKind::EndDictionary, tag(b">>")),
        value(ElementKind::Array, tag(b"[")),
        value(ElementKind::EndArray, tag(b"]")),
    ))(input)
}

/// Parse a single PDF token at the start of `input`.
///
/// No whitespace is skipped; [`Lexer`] takes care of that.
pub fn token(input: &[u8]) -> IResult<&[u8], ElementKind> {
    alt((
        parse_comment,
        parse_delimiter,
        parse_hex_string,
        parse_literal_string,
        parse_name,
        parse_number,
        parse_keyword,
    ))(input)
}

/// Cursor over a byte buffer that yields one [`Element`] at a time.
///
/// Offsets of produced elements are absolute positions in the buffer, so a
/// lexer started in the middle of the edit buffer still reports file
/// offsets.
pub struct Lexer<'a> {
    input: &'a [u8],
    pos: usize,
    skip_nul_bytes: bool,
}

impl<'a> Lexer<'a> {
    /// Create a lexer positioned at `pos`.
    pub fn new(input: &'a [u8], pos: usize) -> Self {
        Self {
            input,
            pos,
            skip_nul_bytes: true,
        }
    }

    /// Choose whether stray NUL bytes are skipped or rejected.
    pub fn with_nul_policy(mut self, skip_nul_bytes: bool) -> Self {
        self.skip_nul_bytes = skip_nul_bytes;
        self
    }

    /// Current cursor position.
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Move the cursor.
    pub fn seek(&mut self, pos: usize) {
        self.pos = pos.min(self.input.len());
    }

    /// The underlying buffer.
    pub fn input(&self) -> &'a [u8] {
        self.input
    }

    /// Skip whitespace and stray NUL bytes.
    pub fn skip_whitespace(&mut self) -> Result<()> {
        while let Some(&c) = self.input.get(self.pos) {
            match c {
                b' ' | b'\t' | b'\r' | b'\n' | 0x0C => self.pos += 1,
                0x00 if self.skip_nul_bytes => {
                    log::warn!("Skipping stray NUL byte at offset {}", self.pos);
                    self.pos += 1;
                },
                0x00 => {
                    return Err(Error::ParseError {
                        offset: self.pos,
                        reason: "unexpected NUL byte".to_string(),
                    });
                },
                _ => break,
            }
        }
        Ok(())
    }

    /// Consume exactly one lexeme and leave the cursor right after it.
    ///
    /// Returns `Ok(None)` at the end of the buffer. For the `stream`
    /// keyword the end-of-line marker after it is consumed too and the
    /// returned element carries the data offset; its length is zero until
    /// the caller knows the stream's `/Length` and calls
    /// [`Lexer::skip_stream_data`].
    pub fn next_element(&mut self) -> Result<Option<Element>> {
        self.skip_whitespace()?;
        let start = self.pos;
        let rest = &self.input[start..];
        if rest.is_empty() {
            return Ok(None);
        }

        let (remaining, kind) = token(rest).map_err(|_| {
            log::warn!("Unexpected byte 0x{:02X} at offset {}", rest[0], start);
            Error::ParseError {
                offset: start,
                reason: format!("unexpected byte 0x{:02X}", rest[0]),
            }
        })?;
        let len = rest.len() - remaining.len();
        self.pos = start + len;

        let kind = match kind {
            ElementKind::Stream { .. } => {
                self.skip_stream_eol();
                ElementKind::Stream {
                    data_offset: self.pos,
                    length: 0,
                }
            },
            other => other,
        };

        Ok(Some(Element::new(kind, start, len)))
    }

    /// Position the cursor after `length` bytes of stream data and expect
    /// the `endstream` keyword.
    pub fn skip_stream_data(&mut self, data_offset: usize, length: usize) -> Result<Element> {
        let end = data_offset.checked_add(length).filter(|end| *end <= self.input.len()).ok_or(
            Error::ParseError {
                offset: data_offset,
                reason: format!("stream length {} runs past the end of the buffer", length),
            },
        )?;
        self.pos = end;
        match self.next_element()? {
            Some(element) if element.kind == ElementKind::EndStream => Ok(element),
            Some(element) => Err(Error::ParseError {
                offset: element.offset,
                reason: "expected endstream after stream data".to_string(),
            }),
            None => Err(Error::UnexpectedEof),
        }
    }

    /// Skip the end-of-line marker that follows `stream`: CRLF, LF or CR.
    fn skip_stream_eol(&mut self) {
        if self.input[self.pos..].starts_with(b"\r\n") {
            self.pos += 2;
        } else if matches!(self.input.get(self.pos), Some(b'\n') | Some(b'\r')) {
            self.pos += 1;
        }
    }

    /// Read an unsigned integer at the cursor, after skipping whitespace.
    pub fn read_unsigned(&mut self) -> Result<u64> {
        self.skip_whitespace()?;
        let start = self.pos;
        while self.input.get(self.pos).is_some_and(|c| c.is_ascii_digit()) {
            self.pos += 1;
        }
        std::str::from_utf8(&self.input[start..self.pos])
            .ok()
            .and_then(|digits| digits.parse::<u64>().ok())
            .ok_or(Error::ParseError {
                offset: start,
                reason: "expected an unsigned integer".to_string(),
            })
    }

    /// Read a run of alphabetic characters at the cursor, after skipping
    /// whitespace. Returns an empty slice when no keyword follows.
    pub fn read_keyword(&mut self) -> Result<&'a [u8]> {
        self.skip_whitespace()?;
        let start = self.pos;
        while self.input.get(self.pos).is_some_and(|c| c.is_ascii_alphabetic()) {
            self.pos += 1;
        }
        Ok(&self.input[start..self.pos])
    }
}

/// Tokenize a complete buffer that cannot contain streams.
///
/// Used for object-stream members and other self-contained snippets.
pub fn tokenize_all(input: &[u8], skip_nul_bytes: bool) -> Result<Vec<Element>> {
    let mut lexer = Lexer::new(input, 0).with_nul_policy(skip_nul_bytes);
    let mut elements = Vec::new();
    while let Some(element) = lexer.next_element()? {
        if matches!(element.kind, ElementKind::Stream { .. }) {
            return Err(Error::ParseError {
                offset: element.offset,
                reason: "stream keyword inside a self-contained object".to_string(),
            });
        }
        elements.push(element);
    }
    Ok(elements)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(input: &[u8]) -> Vec<ElementKind> {
        tokenize_all(input, true)
            .unwrap()
            .into_iter()
            .map(|e| e.kind)
            .collect()
    }

    // ========================================================================
    // Basic Token Tests
    // ========================================================================

    #[test]
    fn test_parse_integer() {
        assert_eq!(kinds(b"42"), vec![ElementKind::Number(42.0)]);
        assert_eq!(kinds(b"-123"), vec![ElementKind::Number(-123.0)]);
        assert_eq!(kinds(b"+17"), vec![ElementKind::Number(17.0)]);
    }

    #[test]
    fn test_parse_real() {
        assert_eq!(kinds(b"-2.5"), vec![ElementKind::Number(-2.5)]);
        assert_eq!(kinds(b".5"), vec![ElementKind::Number(0.5)]);
        assert_eq!(kinds(b"5."), vec![ElementKind::Number(5.0)]);
    }

    #[test]
    fn test_parse_malformed_number() {
        assert!(tokenize_all(b"1-2", true).is_err());
    }

    // ========================================================================
    // String Tests
    // ========================================================================

    #[test]
    fn test_parse_literal_string() {
        assert_eq!(kinds(b"(Hello World)"), vec![ElementKind::LiteralString(b"Hello World".to_vec())]);
    }

    #[test]
    fn test_parse_literal_string_with_nested_parens() {
        assert_eq!(
            kinds(b"(Hello (nested) World)"),
            vec![ElementKind::LiteralString(b"Hello (nested) World".to_vec())]
        );
    }

    #[test]
    fn test_parse_literal_string_keeps_escapes() {
        assert_eq!(kinds(b"(a\\)b\\n)"), vec![ElementKind::LiteralString(b"a\\)b\\n".to_vec())]);
    }

    #[test]
    fn test_parse_unbalanced_literal_string() {
        assert!(tokenize_all(b"(never closed", true).is_err());
    }

    #[test]
    fn test_parse_hex_string_raw() {
        assert_eq!(kinds(b"<48 65>"), vec![ElementKind::HexString(b"48 65".to_vec())]);
    }

    // ========================================================================
    // Name and Keyword Tests
    // ========================================================================

    #[test]
    fn test_parse_name() {
        assert_eq!(kinds(b"/Type"), vec![ElementKind::Name("Type".to_string())]);
        assert_eq!(kinds(b"/A#20B"), vec![ElementKind::Name("A B".to_string())]);
    }

    #[test]
    fn test_parse_name_utf8_escapes() {
        assert_eq!(kinds(b"/A#C3#A9"), vec![ElementKind::Name("A\u{e9}".to_string())]);
        assert_eq!(kinds("/A\u{e9}".as_bytes()), vec![ElementKind::Name("A\u{e9}".to_string())]);
        assert!(tokenize_all(b"/A#E9", true).is_err());
        assert!(tokenize_all(b"/Font/A\xE9", true).is_err());
    }

    #[test]
    fn test_adjacent_names() {
        assert_eq!(
            kinds(b"/Type/Sig"),
            vec![ElementKind::Name("Type".to_string()), ElementKind::Name("Sig".to_string())]
        );
    }

    #[test]
    fn test_parse_keywords() {
        assert_eq!(
            kinds(b"true false null obj endobj R xref trailer startxref endstream"),
            vec![
                ElementKind::Boolean(true),
                ElementKind::Boolean(false),
                ElementKind::Null,
                ElementKind::Object,
                ElementKind::EndObject,
                ElementKind::Reference,
                ElementKind::XRef,
                ElementKind::Trailer,
                ElementKind::StartXRef,
                ElementKind::EndStream,
            ]
        );
    }

    #[test]
    fn test_unknown_keyword_rejected() {
        assert!(tokenize_all(b"bogus", true).is_err());
    }

    #[test]
    fn test_delimiters() {
        assert_eq!(
            kinds(b"<</A[1]>>"),
            vec![
                ElementKind::Dictionary,
                ElementKind::Name("A".to_string()),
                ElementKind::Array,
                ElementKind::Number(1.0),
                ElementKind::EndArray,
                ElementKind::EndDictionary,
            ]
        );
    }

    #[test]
    fn test_comment_kept() {
        let elements = tokenize_all(b"1\n%%EOF\n", true).unwrap();
        assert_eq!(elements.len(), 2);
        assert!(elements[1].is_eof_marker());
        assert_eq!(elements[1].offset, 2);
        assert_eq!(elements[1].end(), 7);
    }

    // ========================================================================
    // Offsets, NUL bytes and streams
    // ========================================================================

    #[test]
    fn test_element_offsets() {
        let elements = tokenize_all(b"  /Key   (v)", true).unwrap();
        assert_eq!(elements[0].offset, 2);
        assert_eq!(elements[0].len, 4);
        assert_eq!(elements[1].offset, 9);
        assert_eq!(elements[1].len, 3);
    }

    #[test]
    fn test_nul_bytes_skipped() {
        assert_eq!(kinds(b"1\x00\x002"), vec![ElementKind::Number(1.0), ElementKind::Number(2.0)]);
    }

    #[test]
    fn test_nul_bytes_rejected_when_disabled() {
        assert!(tokenize_all(b"1\x002", false).is_err());
    }

    #[test]
    fn test_stream_keyword_and_data() {
        let input = b"stream\r\nABCDE\nendstream";
        let mut lexer = Lexer::new(input, 0);
        let stream = lexer.next_element().unwrap().unwrap();
        let data_offset = match stream.kind {
            ElementKind::Stream { data_offset, .. } => data_offset,
            other => panic!("Expected stream, got {:?}", other),
        };
        assert_eq!(data_offset, 8);
        let end = lexer.skip_stream_data(data_offset, 5).unwrap();
        assert_eq!(end.kind, ElementKind::EndStream);
        assert!(lexer.next_element().unwrap().is_none());
    }

    #[test]
    fn test_stream_length_too_long() {
        let input = b"stream\nAB\nendstream";
        let mut lexer = Lexer::new(input, 0);
        lexer.next_element().unwrap();
        assert!(lexer.skip_stream_data(7, 100).is_err());
    }

    #[test]
    fn test_stream_not_allowed_in_self_contained_input() {
        assert!(tokenize_all(b"<<>>stream\nx\nendstream", true).is_err());
    }

    #[test]
    fn test_read_unsigned_and_keyword() {
        let mut lexer = Lexer::new(b"  0000000017 00000 n\r\n", 0);
        assert_eq!(lexer.read_unsigned().unwrap(), 17);
        assert_eq!(lexer.read_unsigned().unwrap(), 0);
        assert_eq!(lexer.read_keyword().unwrap(), b"n");
    }
}
