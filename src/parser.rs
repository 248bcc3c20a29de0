//! PDF object parser.
//!
//! Builds nested [`Value`]s from the flat element list produced by the
//! lexer.
//!
//! # Architecture
//!
//! The parser is recursive descent over an element slice:
//! 1. Look at the element at the cursor
//! 2. Scalars map directly to values
//! 3. `[` and `<<` recurse until the matching closing delimiter
//!
//! A number is only a plain number if it is not the first of a
//! `number number R` triple; the parser looks ahead two elements before
//! committing it. Every dictionary entry records where its key starts and
//! how many bytes key + value occupy, which is what in-place splicing of
//! `/Annots` and `/Fields` relies on.

use crate::element::{Element, ElementKind};
use crate::error::{Error, Result};
use crate::object::{Array, DictEntry, Dictionary, ObjectRef, Value};
use indexmap::IndexMap;

/// Decode escape sequences in PDF literal strings.
///
/// PDF literal strings support escape sequences per ISO 32000-1:2008,
/// Section 7.3.4.2: `\n \r \t \b \f \( \) \\`, `\ddd` octal codes and
/// line continuations.
///
/// # Examples
///
/// ```
/// # use pdf_incremental::parser::decode_literal_string_escapes;
/// let input = b"Section \\247 71.01";
/// let decoded = decode_literal_string_escapes(input);
/// assert_eq!(decoded, b"Section \xa7 71.01"); // \247 = section sign
/// ```
pub fn decode_literal_string_escapes(raw: &[u8]) -> Vec<u8> {
    let mut result = Vec::with_capacity(raw.len());
    let mut i = 0;

    while i < raw.len() {
        if raw[i] == b'\\' && i + 1 < raw.len() {
            match raw[i + 1] {
                b'n' => {
                    result.push(b'\n');
                    i += 2;
                },
                b'r' => {
                    result.push(b'\r');
                    i += 2;
                },
                b't' => {
                    result.push(b'\t');
                    i += 2;
                },
                b'b' => {
                    result.push(8); // Backspace
                    i += 2;
                },
                b'f' => {
                    result.push(12); // Form feed
                    i += 2;
                },
                c @ (b'(' | b')' | b'\\') => {
                    result.push(c);
                    i += 2;
                },
                // Line continuation: \<newline> is ignored
                b'\n' => {
                    i += 2;
                },
                b'\r' => {
                    i += 2;
                    if i < raw.len() && raw[i] == b'\n' {
                        i += 1;
                    }
                },
                // Octal escape: \ddd (1-3 octal digits)
                b'0'..=b'7' => {
                    let start = i + 1;
                    let mut octal_value = 0u32;
                    let mut octal_len = 0;
                    while octal_len < 3 && start + octal_len < raw.len() && (b'0'..b'8').contains(&raw[start + octal_len])
                    {
                        octal_value = octal_value * 8 + (raw[start + octal_len] - b'0') as u32;
                        octal_len += 1;
                    }
                    result.push((octal_value & 0xFF) as u8);
                    i += 1 + octal_len;
                },
                // Unknown escape: drop the backslash (ISO 32000-1, 7.3.4.2)
                _ => {
                    i += 1;
                },
            }
        } else {
            result.push(raw[i]);
            i += 1;
        }
    }

    result
}

/// Parse one value starting at `elements[index]`.
///
/// Returns the value and the index of the first element after it. Nesting
/// deeper than `max_nesting` fails with
/// [`Error::RecursionLimitExceeded`] instead of descending further.
pub fn parse_value(elements: &[Element], index: usize, max_nesting: usize) -> Result<(Value, usize)> {
    parse_value_at_depth(elements, index, 0, max_nesting)
}

/// Parse the value of an indirect object.
///
/// `elements` starts right after the `obj` keyword (or at the first element
/// of an object-stream member). Elements after the first complete value,
/// such as `stream` or `endobj`, are ignored.
pub fn parse_object_body(elements: &[Element], max_nesting: usize) -> Result<Value> {
    let (value, _) = parse_value(elements, 0, max_nesting)?;
    Ok(value)
}

fn unexpected(element: &Element, what: &str) -> Error {
    Error::ParseError {
        offset: element.offset,
        reason: format!("unexpected {:?} while parsing {}", element.kind, what),
    }
}

fn end_of_elements(elements: &[Element], what: &str) -> Error {
    Error::ParseError {
        offset: elements.last().map(Element::end).unwrap_or(0),
        reason: format!("element list ended inside {}", what),
    }
}

fn parse_value_at_depth(
    elements: &[Element],
    index: usize,
    depth: usize,
    max_nesting: usize,
) -> Result<(Value, usize)> {
    let element = elements.get(index).ok_or_else(|| end_of_elements(elements, "a value"))?;

    match &element.kind {
        ElementKind::Number(n) => {
            if let Some(reference) = reference_at(elements, index) {
                return Ok((Value::Reference(reference), index + 3));
            }
            Ok((Value::Number(*n), index + 1))
        },
        ElementKind::Name(name) => Ok((Value::Name(name.clone()), index + 1)),
        ElementKind::Boolean(b) => Ok((Value::Boolean(*b), index + 1)),
        ElementKind::Null => Ok((Value::Null, index + 1)),
        ElementKind::LiteralString(raw) => Ok((Value::LiteralString(raw.clone()), index + 1)),
        ElementKind::HexString(raw) => Ok((Value::HexString(raw.clone()), index + 1)),
        ElementKind::Comment(_) => parse_value_at_depth(elements, index + 1, depth, max_nesting),
        ElementKind::Array => {
            if depth >= max_nesting {
                log::warn!("Array at offset {} exceeds nesting limit {}", element.offset, max_nesting);
                return Err(Error::RecursionLimitExceeded(max_nesting));
            }
            parse_array(elements, index, depth, max_nesting)
        },
        ElementKind::Dictionary => {
            if depth >= max_nesting {
                log::warn!("Dictionary at offset {} exceeds nesting limit {}", element.offset, max_nesting);
                return Err(Error::RecursionLimitExceeded(max_nesting));
            }
            parse_dictionary(elements, index, depth, max_nesting)
        },
        _ => Err(unexpected(element, "a value")),
    }
}

/// Recognize `number number R` at `index`.
fn reference_at(elements: &[Element], index: usize) -> Option<ObjectRef> {
    let id = elements.get(index)?.as_number()?;
    let gen = elements.get(index + 1)?.as_number()?;
    if elements.get(index + 2)?.kind != ElementKind::Reference {
        return None;
    }
    if id < 0.0 || gen < 0.0 || id > u32::MAX as f64 || gen > u16::MAX as f64 {
        return None;
    }
    Some(ObjectRef::new(id as u32, gen as u16))
}

fn parse_array(elements: &[Element], start: usize, depth: usize, max_nesting: usize) -> Result<(Value, usize)> {
    let offset = elements[start].offset;
    let mut items = Vec::new();
    let mut index = start + 1;

    loop {
        let element = elements.get(index).ok_or_else(|| end_of_elements(elements, "an array"))?;
        if matches!(element.kind, ElementKind::Comment(_)) {
            index += 1;
            continue;
        }
        if element.kind == ElementKind::EndArray {
            let array = Array::with_offsets(items, offset, element.offset);
            return Ok((Value::Array(array), index + 1));
        }
        let (value, next) = parse_value_at_depth(elements, index, depth + 1, max_nesting)?;
        items.push(value);
        index = next;
    }
}

fn parse_dictionary(
    elements: &[Element],
    start: usize,
    depth: usize,
    max_nesting: usize,
) -> Result<(Value, usize)> {
    let offset = elements[start].offset;
    let mut entries = IndexMap::new();
    let mut index = start + 1;

    loop {
        let element = elements.get(index).ok_or_else(|| end_of_elements(elements, "a dictionary"))?;
        let key = match &element.kind {
            ElementKind::Comment(_) => {
                index += 1;
                continue;
            },
            ElementKind::EndDictionary => {
                let dict = Dictionary::with_offsets(entries, offset, element.offset);
                return Ok((Value::Dictionary(dict), index + 1));
            },
            ElementKind::Name(name) => name.clone(),
            _ => return Err(unexpected(element, "a dictionary key")),
        };

        let key_offset = element.offset;
        let (value, next) = parse_value_at_depth(elements, index + 1, depth + 1, max_nesting)?;
        let value_end = elements[next - 1].end();
        // Later duplicates win, matching how most readers treat them
        entries.insert(
            key,
            DictEntry {
                value,
                key_offset,
                key_value_len: value_end - key_offset,
            },
        );
        index = next;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::tokenize_all;

    fn parse(input: &[u8]) -> Value {
        let elements = tokenize_all(input, true).unwrap();
        parse_object_body(&elements, 100).unwrap()
    }

    #[test]
    fn test_parse_scalars() {
        assert_eq!(parse(b"42"), Value::Number(42.0));
        assert_eq!(parse(b"/Name"), Value::Name("Name".to_string()));
        assert_eq!(parse(b"true"), Value::Boolean(true));
        assert_eq!(parse(b"null"), Value::Null);
        assert_eq!(parse(b"(text)"), Value::LiteralString(b"text".to_vec()));
        assert_eq!(parse(b"<AB>"), Value::HexString(b"AB".to_vec()));
    }

    #[test]
    fn test_comments_are_skipped() {
        let value = parse(b"<</A 1 % note\n/B [2 %x\n 3]>>");
        let dict = value.as_dict().unwrap();
        assert_eq!(dict.lookup("A"), Some(&Value::Number(1.0)));
        assert_eq!(dict.lookup("B").and_then(Value::as_array).map(Array::len), Some(2));
    }

    #[test]
    fn test_parse_reference() {
        assert_eq!(parse(b"10 0 R"), Value::Reference(ObjectRef::new(10, 0)));
    }

    #[test]
    fn test_pending_numbers_in_array() {
        let value = parse(b"[0 0 612 792 3 0 R 5]");
        let array = value.as_array().unwrap();
        assert_eq!(array.len(), 6);
        assert_eq!(array.get(0), Some(&Value::Number(0.0)));
        assert_eq!(array.get(3), Some(&Value::Number(792.0)));
        assert_eq!(array.get(4), Some(&Value::Reference(ObjectRef::new(3, 0))));
        // "3 0 R 5": the trailing 5 is a plain number again
        assert_eq!(array.get(5), Some(&Value::Number(5.0)));
    }

    #[test]
    fn test_array_offsets() {
        let value = parse(b"  [1 2]");
        let array = value.as_array().unwrap();
        assert_eq!(array.offset(), 2);
        assert_eq!(array.end_offset(), 6);
    }

    #[test]
    fn test_dictionary_key_offsets() {
        let input = b"<</Type/Page /Annots[4 0 R 5 0 R] /Count 3>>";
        let value = parse(input);
        let dict = value.as_dict().unwrap();
        assert_eq!(dict.offset(), 0);
        assert_eq!(dict.end_offset(), input.len() - 2);

        let key_offset = dict.key_offset("Annots").unwrap();
        let len = dict.key_value_length("Annots").unwrap();
        assert_eq!(&input[key_offset..key_offset + len], b"/Annots[4 0 R 5 0 R]");
        // The byte before the span end is the closing bracket
        assert_eq!(input[key_offset + len - 1], b']');

        let key_offset = dict.key_offset("Count").unwrap();
        let len = dict.key_value_length("Count").unwrap();
        assert_eq!(&input[key_offset..key_offset + len], b"/Count 3");
    }

    #[test]
    fn test_dictionary_reference_value_span() {
        let input = b"<</Root 1 0 R>>";
        let dict_value = parse(input);
        let dict = dict_value.as_dict().unwrap();
        let key_offset = dict.key_offset("Root").unwrap();
        let len = dict.key_value_length("Root").unwrap();
        assert_eq!(&input[key_offset..key_offset + len], b"/Root 1 0 R");
    }

    #[test]
    fn test_nested_dictionary() {
        let value = parse(b"<</AcroForm<</Fields[7 0 R]/SigFlags 3>>>>");
        let acroform = value.as_dict().unwrap().lookup("AcroForm").unwrap().as_dict().unwrap();
        assert_eq!(acroform.lookup("SigFlags"), Some(&Value::Number(3.0)));
        let fields = acroform.lookup("Fields").unwrap().as_array().unwrap();
        assert_eq!(fields.references().count(), 1);
    }

    #[test]
    fn test_key_without_value() {
        let elements = tokenize_all(b"<</Key>>", true).unwrap();
        assert!(parse_object_body(&elements, 100).is_err());
    }

    #[test]
    fn test_non_name_key() {
        let elements = tokenize_all(b"<<1 2>>", true).unwrap();
        assert!(parse_object_body(&elements, 100).is_err());
    }

    #[test]
    fn test_unterminated_array() {
        let elements = tokenize_all(b"[1 2", true).unwrap();
        assert!(parse_object_body(&elements, 100).is_err());
    }

    #[test]
    fn test_nesting_limit() {
        let input = "[".repeat(10) + &"]".repeat(10);
        let elements = tokenize_all(input.as_bytes(), true).unwrap();
        assert!(parse_object_body(&elements, 20).is_ok());
        assert!(matches!(parse_object_body(&elements, 5), Err(Error::RecursionLimitExceeded(5))));
    }

    #[test]
    fn test_deep_nesting_does_not_overflow() {
        let input = "[".repeat(100_000);
        let elements = tokenize_all(input.as_bytes(), true).unwrap();
        assert!(parse_object_body(&elements, 100).is_err());
    }

    #[test]
    fn test_stops_after_first_value() {
        let elements = tokenize_all(b"<</Length 5>> stream", false);
        // stream keyword is not allowed in self-contained input
        assert!(elements.is_err());
        let elements = tokenize_all(b"<</Length 5>> endobj", true).unwrap();
        let value = parse_object_body(&elements, 100).unwrap();
        assert_eq!(value.as_dict().unwrap().lookup("Length"), Some(&Value::Number(5.0)));
    }

    #[test]
    fn test_decode_literal_string_escapes() {
        assert_eq!(decode_literal_string_escapes(b"a\\(b\\)c"), b"a(b)c");
        assert_eq!(decode_literal_string_escapes(b"line\\nnext"), b"line\nnext");
        assert_eq!(decode_literal_string_escapes(b"\\101"), b"A");
        assert_eq!(decode_literal_string_escapes(b"cont\\\ninued"), b"continued");
    }
}
