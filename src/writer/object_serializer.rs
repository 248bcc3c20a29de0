//! PDF object serialization.
//!
//! Serializes parsed [`Value`]s back to PDF syntax according to
//! ISO 32000-1:2008 Section 7.3. Strings are emitted from their raw bytes,
//! so escapes survive a copy unchanged, and references can be renumbered on
//! the way out.

use crate::object::{Array, Dictionary, Value};
use std::collections::HashMap;

/// Serializer for PDF values.
#[derive(Debug, Clone, Default)]
pub struct ObjectSerializer {
    /// Old object number -> new object number
    renumber: HashMap<u32, u32>,
    /// Dictionary keys left out of the output
    skipped_keys: Vec<String>,
}

impl ObjectSerializer {
    /// Create a new object serializer with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Rewrite references through `renumber`; unmapped references are kept.
    pub fn with_renumbering(mut self, renumber: HashMap<u32, u32>) -> Self {
        self.renumber = renumber;
        self
    }

    /// Leave `key` out of every dictionary.
    pub fn skip_key(mut self, key: impl Into<String>) -> Self {
        self.skipped_keys.push(key.into());
        self
    }

    /// Serialize a value to bytes.
    pub fn serialize(&self, value: &Value) -> Vec<u8> {
        let mut out = Vec::new();
        self.write_value(&mut out, value);
        out
    }

    /// Serialize an indirect object definition.
    ///
    /// Format: `{id} {gen} obj\n{object}\nendobj\n\n`
    pub fn serialize_indirect(&self, id: u32, gen: u16, value: &Value) -> Vec<u8> {
        let mut out = format!("{} {} obj\n", id, gen).into_bytes();
        self.write_value(&mut out, value);
        out.extend_from_slice(b"\nendobj\n\n");
        out
    }

    /// Serialize a stream object; `/Length` is set to `data.len()`.
    pub fn serialize_stream(&self, id: u32, gen: u16, dict: &Dictionary, data: &[u8]) -> Vec<u8> {
        let mut dict = dict.clone();
        dict.insert("Length", Value::Number(data.len() as f64));

        let mut out = format!("{} {} obj\n", id, gen).into_bytes();
        self.write_dictionary(&mut out, &dict);
        out.extend_from_slice(b"\nstream\n");
        out.extend_from_slice(data);
        out.extend_from_slice(b"\nendstream\nendobj\n\n");
        out
    }

    fn write_value(&self, out: &mut Vec<u8>, value: &Value) {
        match value {
            Value::Null => out.extend_from_slice(b"null"),
            Value::Boolean(b) => out.extend_from_slice(if *b { b"true" } else { b"false" }),
            Value::Number(n) => write_number(out, *n),
            Value::Name(name) => write_name(out, name),
            Value::LiteralString(raw) => {
                out.push(b'(');
                out.extend_from_slice(raw);
                out.push(b')');
            },
            Value::HexString(raw) => {
                out.push(b'<');
                out.extend_from_slice(raw);
                out.push(b'>');
            },
            Value::Array(array) => self.write_array(out, array),
            Value::Dictionary(dict) => self.write_dictionary(out, dict),
            Value::Reference(r) => {
                let id = self.renumber.get(&r.id).copied().unwrap_or(r.id);
                let gen = if id == r.id { r.gen } else { 0 };
                out.extend_from_slice(format!("{} {} R", id, gen).as_bytes());
            },
        }
    }

    fn write_array(&self, out: &mut Vec<u8>, array: &Array) {
        out.push(b'[');
        for (i, item) in array.items().iter().enumerate() {
            if i > 0 {
                out.push(b' ');
            }
            self.write_value(out, item);
        }
        out.push(b']');
    }

    fn write_dictionary(&self, out: &mut Vec<u8>, dict: &Dictionary) {
        out.extend_from_slice(b"<<");
        for (key, value) in dict.iter() {
            if self.skipped_keys.iter().any(|k| k == key) {
                continue;
            }
            write_name(out, key);
            out.push(b' ');
            self.write_value(out, value);
        }
        out.extend_from_slice(b">>");
    }
}

/// Format a number, as an integer when it has no fractional part.
///
/// Reals get at most five decimals with trailing zeros removed.
pub fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < i64::MAX as f64 {
        format!("{}", value as i64)
    } else {
        let formatted = format!("{:.5}", value);
        formatted.trim_end_matches('0').trim_end_matches('.').to_string()
    }
}

fn write_number(out: &mut Vec<u8>, value: f64) {
    out.extend_from_slice(format_number(value).as_bytes());
}

/// Write a PDF name.
///
/// Names start with `/`; whitespace, delimiters, `#` and anything outside
/// printable ASCII are escaped as `#xx`.
fn write_name(out: &mut Vec<u8>, name: &str) {
    out.push(b'/');
    for byte in name.bytes() {
        match byte {
            b'!'..=b'~' if !b"#%()/<>[]{}".contains(&byte) => out.push(byte),
            _ => out.extend_from_slice(format!("#{:02X}", byte).as_bytes()),
        }
    }
}
