//! PNG predictor support for cross-reference stream data.
//!
//! Cross-reference streams are almost always written with the PNG "Up"
//! predictor (predictor 12): every row starts with a one-byte tag and each
//! following byte stores the difference to the byte above it. Rows tagged
//! 0 carry no prediction. Other predictors are rejected.

use crate::error::{Error, Result};

/// PNG predictor row tags accepted in Up-predicted data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PngPredictor {
    /// No prediction for this row (tag 0)
    None = 0,
    /// Up: each byte is the difference from the byte above (tag 2)
    Up = 2,
}

impl PngPredictor {
    fn from_tag(tag: u8) -> Result<Self> {
        match tag {
            0 => Ok(PngPredictor::None),
            2 => Ok(PngPredictor::Up),
            other => Err(Error::Decode(format!("Unsupported PNG row tag: {}", other))),
        }
    }
}

/// Decode parameters for stream decoders.
#[derive(Debug, Clone)]
pub struct DecodeParams {
    /// Predictor algorithm (1 = none, 12 = PNG Up)
    pub predictor: i64,
    /// Number of columns (bytes per row for 8-bit single-colour data)
    pub columns: usize,
}

impl Default for DecodeParams {
    fn default() -> Self {
        Self {
            predictor: 1, // No prediction
            columns: 1,
        }
    }
}

impl DecodeParams {
    /// Calculate the number of bytes per row, including the PNG tag byte.
    pub fn bytes_per_row(&self) -> usize {
        if self.predictor >= 10 {
            self.columns + 1
        } else {
            self.columns
        }
    }
}

/// Apply predictor decoding to data.
///
/// Predictor 1 passes the data through. Predictor 12 undoes PNG Up
/// prediction. Everything else fails with [`Error::UnsupportedPredictor`].
pub fn decode_predictor(data: &[u8], params: &DecodeParams) -> Result<Vec<u8>> {
    match params.predictor {
        1 => Ok(data.to_vec()),
        12 => decode_png_up(data, params.columns),
        other => Err(Error::UnsupportedPredictor(other)),
    }
}

/// Undo PNG Up prediction.
///
/// `columns` is the row width without the tag byte. The output has the tag
/// bytes stripped, so it is `rows * columns` long.
pub fn decode_png_up(data: &[u8], columns: usize) -> Result<Vec<u8>> {
    if columns == 0 {
        return Err(Error::Decode("PNG predictor with zero columns".to_string()));
    }
    let row_len = columns + 1;
    if data.len() % row_len != 0 {
        return Err(Error::Decode(format!(
            "Data length {} is not a multiple of row size {}",
            data.len(),
            row_len
        )));
    }

    let mut output = Vec::with_capacity(data.len() / row_len * columns);
    let mut prev_row = vec![0u8; columns];

    for row in data.chunks(row_len) {
        let predictor = PngPredictor::from_tag(row[0])?;
        let encoded = &row[1..];
        for (i, byte) in encoded.iter().enumerate() {
            let decoded = match predictor {
                PngPredictor::None => *byte,
                PngPredictor::Up => byte.wrapping_add(prev_row[i]),
            };
            prev_row[i] = decoded;
        }
        output.extend_from_slice(&prev_row);
    }

    Ok(output)
}

/// Apply PNG Up prediction to rows of `columns` bytes.
///
/// Every output row is tagged 2, the first row is predicted against a row
/// of zeros.
pub fn encode_png_up(data: &[u8], columns: usize) -> Result<Vec<u8>> {
    if columns == 0 || data.len() % columns != 0 {
        return Err(Error::Decode(format!(
            "Data length {} is not a multiple of row size {}",
            data.len(),
            columns
        )));
    }

    let mut output = Vec::with_capacity(data.len() / columns * (columns + 1));
    let mut prev_row: &[u8] = &[];

    for row in data.chunks(columns) {
        output.push(PngPredictor::Up as u8);
        for (i, byte) in row.iter().enumerate() {
            let above = prev_row.get(i).copied().unwrap_or(0);
            output.push(byte.wrapping_sub(above));
        }
        prev_row = row;
    }

    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_no_predictor() {
        let data = vec![1, 2, 3, 4];
        let params = DecodeParams::default();
        assert_eq!(decode_predictor(&data, &params).unwrap(), data);
    }

    #[test]
    fn test_png_up_predictor() {
        let params = DecodeParams {
            predictor: 12,
            columns: 3,
        };

        // Row 1: tag 2, [10, 20, 30] (no previous row)
        // Row 2: tag 2, [1, 1, 1] (add to previous)
        let encoded = vec![2, 10, 20, 30, 2, 1, 1, 1];
        let decoded = decode_predictor(&encoded, &params).unwrap();
        assert_eq!(decoded, vec![10, 20, 30, 11, 21, 31]);
    }

    #[test]
    fn test_png_none_row_tag() {
        let encoded = vec![2, 5, 5, 0, 7, 8];
        assert_eq!(decode_png_up(&encoded, 2).unwrap(), vec![5, 5, 7, 8]);
    }

    #[test]
    fn test_png_up_wrapping() {
        let encoded = vec![2, 200, 2, 100];
        assert_eq!(decode_png_up(&encoded, 1).unwrap(), vec![200, 44]);
    }

    #[test]
    fn test_unsupported_predictor() {
        let params = DecodeParams {
            predictor: 11,
            columns: 3,
        };
        assert!(matches!(decode_predictor(&[0, 1, 2, 3], &params), Err(Error::UnsupportedPredictor(11))));
    }

    #[test]
    fn test_unsupported_row_tag() {
        assert!(decode_png_up(&[4, 1, 2], 2).is_err());
    }

    #[test]
    fn test_truncated_rows() {
        assert!(decode_png_up(&[2, 1, 2, 3], 2).is_err());
    }

    #[test]
    fn test_bytes_per_row_calculation() {
        let params = DecodeParams {
            predictor: 12,
            columns: 5,
        };
        assert_eq!(params.bytes_per_row(), 6);
        assert_eq!(DecodeParams::default().bytes_per_row(), 1);
    }

    #[test]
    fn test_encode_png_up_known_rows() {
        let rows = vec![1, 0, 16, 0, 0, 1, 0, 32, 0, 0];
        let encoded = encode_png_up(&rows, 5).unwrap();
        assert_eq!(encoded, vec![2, 1, 0, 16, 0, 0, 2, 0, 0, 16, 0, 0]);
    }

    proptest! {
        #[test]
        fn test_png_up_roundtrip(columns in 1usize..8, rows in 0usize..16, seed in any::<u64>()) {
            let mut state = seed;
            let data: Vec<u8> = (0..columns * rows)
                .map(|_| {
                    state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
                    (state >> 56) as u8
                })
                .collect();
            let encoded = encode_png_up(&data, columns).unwrap();
            prop_assert_eq!(encoded.len(), rows * (columns + 1));
            prop_assert_eq!(decode_png_up(&encoded, columns).unwrap(), data);
        }
    }
}
