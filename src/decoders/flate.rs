//! FlateDecode (zlib/deflate) implementation.
//!
//! Uses the flate2 crate for zlib compression and decompression.

use crate::decoders::{StreamDecoder, decompression_bomb};
use crate::error::{Error, Result};
use flate2::Compression;
use flate2::read::{DeflateDecoder, ZlibDecoder};
use flate2::write::ZlibEncoder;
use std::io::{Read, Write};

/// FlateDecode filter implementation.
///
/// Decompresses data using the zlib/deflate algorithm.
pub struct FlateDecoder;

impl StreamDecoder for FlateDecoder {
    fn decode(&self, input: &[u8]) -> Result<Vec<u8>> {
        self.decode_limited(input, None)
    }

    fn decode_limited(&self, input: &[u8], limit: Option<usize>) -> Result<Vec<u8>> {
        let error = match inflate(ZlibDecoder::new(input), limit) {
            Ok(Some(output)) => return Ok(output),
            Ok(None) => return Err(decompression_bomb(limit.unwrap_or(usize::MAX))),
            Err(e) => e,
        };

        // Some producers write raw deflate data without the zlib wrapper
        log::info!("Zlib decode failed ({}), trying raw deflate", error);
        match inflate(DeflateDecoder::new(input), limit) {
            Ok(Some(output)) => {
                log::info!("Raw deflate recovery succeeded: {} bytes", output.len());
                Ok(output)
            },
            Ok(None) => Err(decompression_bomb(limit.unwrap_or(usize::MAX))),
            Err(deflate_err) => {
                log::warn!("FlateDecode failed: {}", deflate_err);
                Err(Error::Decode(format!("FlateDecode decompression failed: {}", error)))
            },
        }
    }

    fn name(&self) -> &str {
        "FlateDecode"
    }
}

/// Read at most `limit + 1` bytes; `None` means the limit was crossed.
fn inflate<R: Read>(reader: R, limit: Option<usize>) -> std::io::Result<Option<Vec<u8>>> {
    let cap = limit.map_or(u64::MAX, |limit| (limit as u64).saturating_add(1));
    let mut output = Vec::new();
    reader.take(cap).read_to_end(&mut output)?;
    match limit {
        Some(limit) if output.len() > limit => Ok(None),
        _ => Ok(Some(output)),
    }
}

/// Compress data with zlib at the default compression level.
pub fn flate_encode(input: &[u8]) -> Result<Vec<u8>> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(input)?;
    Ok(encoder.finish()?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flate_decode_simple() {
        let original = b"Hello, FlateDecode!";
        let compressed = flate_encode(original).unwrap();

        let decoder = FlateDecoder;
        let decompressed = decoder.decode(&compressed).unwrap();
        assert_eq!(decompressed, original);
    }

    #[test]
    fn test_flate_decode_raw_deflate() {
        use flate2::write::DeflateEncoder;

        let original = b"raw deflate without zlib header";
        let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(original).unwrap();
        let compressed = encoder.finish().unwrap();

        let decompressed = FlateDecoder.decode(&compressed).unwrap();
        assert_eq!(decompressed, original);
    }

    #[test]
    fn test_flate_decode_empty() {
        let compressed = flate_encode(b"").unwrap();
        assert!(FlateDecoder.decode(&compressed).unwrap().is_empty());
    }

    #[test]
    fn test_flate_decode_invalid_data() {
        let result = FlateDecoder.decode(b"\xFF\xFF\xFF\xFF not compressed");
        assert!(result.is_err());
    }

    #[test]
    fn test_flate_decode_stops_at_limit() {
        // 64 MiB of zeros compress to a few dozen KiB
        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::best());
        let block = vec![0u8; 1 << 20];
        for _ in 0..64 {
            encoder.write_all(&block).unwrap();
        }
        let bomb = encoder.finish().unwrap();
        assert!(bomb.len() < 1 << 20);

        let result = FlateDecoder.decode_limited(&bomb, Some(4096));
        assert!(matches!(result, Err(Error::Decode(ref msg)) if msg.contains("4096")));

        let exact = flate_encode(&[1u8; 4096]).unwrap();
        assert_eq!(FlateDecoder.decode_limited(&exact, Some(4096)).unwrap().len(), 4096);
        assert!(FlateDecoder.decode_limited(&exact, Some(4095)).is_err());
    }

    #[test]
    fn test_flate_decoder_name() {
        assert_eq!(FlateDecoder.name(), "FlateDecode");
    }
}
