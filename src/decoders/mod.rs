//! Stream decoder implementations for the filters the engine understands.
//!
//! Only FlateDecode is supported, optionally combined with the PNG "Up"
//! predictor (predictor 12) used by cross-reference streams. Any other
//! filter or predictor is reported as unsupported rather than ignored.

use crate::error::{Error, Result};
use crate::object::Value;
use crate::parser_config::ParserOptions;

mod flate;
mod predictor;

pub use flate::{FlateDecoder, flate_encode};
pub use predictor::{DecodeParams, PngPredictor, decode_png_up, decode_predictor, encode_png_up};

/// PDF stream filter types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Filter {
    /// FlateDecode (deflate/zlib compression)
    FlateDecode,
}

impl Filter {
    /// Map a filter name (without the leading slash) to a supported filter.
    pub fn from_name(name: &str) -> Result<Self> {
        match name {
            "FlateDecode" => Ok(Filter::FlateDecode),
            other => Err(Error::UnsupportedFilter(other.to_string())),
        }
    }

    /// Resolve the `/Filter` value of a stream dictionary.
    ///
    /// Returns `Ok(None)` when the stream is unfiltered. A one-element
    /// filter array is accepted; longer chains are unsupported.
    pub fn from_value(value: Option<&Value>) -> Result<Option<Self>> {
        match value {
            None | Some(Value::Null) => Ok(None),
            Some(Value::Name(name)) => Self::from_name(name).map(Some),
            Some(Value::Array(array)) => match array.items() {
                [] => Ok(None),
                [Value::Name(name)] => Self::from_name(name).map(Some),
                _ => Err(Error::UnsupportedFilter(format!("filter chain of {} entries", array.len()))),
            },
            Some(other) => Err(Error::InvalidObjectType {
                expected: "Name".to_string(),
                found: other.type_name().to_string(),
            }),
        }
    }

    fn decoder(&self) -> Box<dyn StreamDecoder> {
        match self {
            Filter::FlateDecode => Box::new(FlateDecoder),
        }
    }
}

/// Trait for PDF stream decoders.
pub trait StreamDecoder {
    /// Decode the input data.
    fn decode(&self, input: &[u8]) -> Result<Vec<u8>>;

    /// Decode, failing once the output would exceed `limit` bytes.
    ///
    /// The default decodes everything first; decoders that stream should
    /// stop as soon as the limit is crossed.
    fn decode_limited(&self, input: &[u8], limit: Option<usize>) -> Result<Vec<u8>> {
        let output = self.decode(input)?;
        match limit {
            Some(limit) if output.len() > limit => Err(decompression_bomb(limit)),
            _ => Ok(output),
        }
    }

    /// Get the name of this decoder (e.g., "FlateDecode").
    fn name(&self) -> &str;
}

pub(crate) fn decompression_bomb(limit: usize) -> Error {
    log::warn!("Decoded stream exceeds {} bytes, giving up", limit);
    Error::Decode(format!(
        "Decompression bomb detected: decompressed size exceeds limit {} bytes",
        limit
    ))
}

/// Decode stream data with parser options (includes decompression bomb protection).
///
/// Applies `filter` (if any), stopping as soon as the output passes
/// `options.max_decompressed_size`, then undoes the predictor described by
/// `params`.
pub fn decode_stream_with_options(
    data: &[u8],
    filter: Option<Filter>,
    params: Option<&DecodeParams>,
    options: &ParserOptions,
) -> Result<Vec<u8>> {
    let mut current = match filter {
        Some(filter) => {
            let decoder = filter.decoder();
            log::debug!("Applying {} to {} bytes", decoder.name(), data.len());
            decoder.decode_limited(data, options.decompression_limit())?
        },
        None => data.to_vec(),
    };

    if !options.allows_decompressed(current.len()) {
        return Err(decompression_bomb(options.max_decompressed_size));
    }

    if let Some(params) = params {
        if params.predictor != 1 {
            current = decode_predictor(&current, params)?;
        }
    }

    Ok(current)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::Array;

    #[test]
    fn test_filter_from_name() {
        assert_eq!(Filter::from_name("FlateDecode").unwrap(), Filter::FlateDecode);
        match Filter::from_name("LZWDecode") {
            Err(Error::UnsupportedFilter(name)) => assert_eq!(name, "LZWDecode"),
            other => panic!("Expected UnsupportedFilter, got {:?}", other),
        }
    }

    #[test]
    fn test_filter_from_value() {
        assert_eq!(Filter::from_value(None).unwrap(), None);
        let name = Value::Name("FlateDecode".to_string());
        assert_eq!(Filter::from_value(Some(&name)).unwrap(), Some(Filter::FlateDecode));

        let single = Value::Array(Array::new(vec![Value::Name("FlateDecode".to_string())]));
        assert_eq!(Filter::from_value(Some(&single)).unwrap(), Some(Filter::FlateDecode));

        let chain = Value::Array(Array::new(vec![
            Value::Name("ASCII85Decode".to_string()),
            Value::Name("FlateDecode".to_string()),
        ]));
        assert!(Filter::from_value(Some(&chain)).is_err());
    }

    #[test]
    fn test_decode_stream_no_filter() {
        let data = b"Hello, World!";
        let result = decode_stream_with_options(data, None, None, &ParserOptions::default()).unwrap();
        assert_eq!(result, data);
    }

    #[test]
    fn test_decode_stream_size_limit() {
        let compressed = flate_encode(&[0u8; 64]).unwrap();
        let mut options = ParserOptions::default();
        options.max_decompressed_size = 16;
        let result = decode_stream_with_options(&compressed, Some(Filter::FlateDecode), None, &options);
        assert!(matches!(result, Err(Error::Decode(_))));
    }

    #[test]
    fn test_decode_stream_unlimited() {
        let compressed = flate_encode(&[7u8; 4096]).unwrap();
        let mut options = ParserOptions::default();
        options.max_decompressed_size = 0;
        let result = decode_stream_with_options(&compressed, Some(Filter::FlateDecode), None, &options).unwrap();
        assert_eq!(result.len(), 4096);
    }
}
