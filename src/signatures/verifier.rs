//! PDF signature inspection.
//!
//! Reads back what [`PdfDocument::sign`](crate::PdfDocument::sign) (or any
//! other signer) wrote: the signature dictionary of every signature widget,
//! its byte range and the embedded signature bytes. Cryptographic checking
//! of the CMS structure is left to the caller, who gets the signed-bytes
//! digest to compare against.

use super::byterange::ByteRangeCalculator;
use super::types::{SignatureInfo, SignatureSubFilter};
use crate::document::PdfDocument;
use crate::element::{decode_hex_string, decode_hex_string_utf16be};
use crate::error::{Error, Result};
use crate::object::{Dictionary, Value};
use crate::parser::decode_literal_string_escapes;
use sha2::{Digest, Sha256};

/// Inspector for PDF digital signatures.
#[derive(Debug, Default, Clone, Copy)]
pub struct SignatureVerifier;

impl SignatureVerifier {
    /// Create a new signature verifier.
    pub fn new() -> Self {
        Self
    }

    /// Describe every signature widget of `document`, in page order.
    ///
    /// Widgets without a `/V` signature dictionary (unsigned fields) are
    /// skipped.
    pub fn inspect(&self, document: &PdfDocument) -> Result<Vec<SignatureInfo>> {
        let mut signatures = Vec::new();
        for widget in document.signature_widgets()? {
            let widget_dict = document.object_dictionary(widget)?;
            let Some(value) = widget_dict.lookup("V") else {
                log::debug!("Signature field {} is not signed", widget.number());
                continue;
            };
            let Some(sig_dict) = document.resolve(value)?.as_dict() else {
                log::warn!("Signature field {} has a /V that is not a dictionary", widget.number());
                continue;
            };

            let mut info = self.extract_signature_info(sig_dict)?;
            info.widget = widget.number();
            info.field_name = widget_dict.lookup("T").and_then(text_value);
            self.check_coverage(document.as_bytes(), &mut info);
            signatures.push(info);
        }
        Ok(signatures)
    }

    /// Extract signature information from a signature dictionary.
    pub fn extract_signature_info(&self, sig_dict: &Dictionary) -> Result<SignatureInfo> {
        if let Some(type_name) = sig_dict.name("Type") {
            if type_name != "Sig" {
                return Err(Error::InvalidObjectType {
                    expected: "Sig".to_string(),
                    found: type_name.to_string(),
                });
            }
        }

        let mut info = SignatureInfo {
            sub_filter: sig_dict.name("SubFilter").and_then(SignatureSubFilter::from_pdf_name),
            reason: sig_dict.lookup("Reason").and_then(text_value),
            signing_time: sig_dict.lookup("M").and_then(text_value),
            ..SignatureInfo::default()
        };

        if let Some(byte_range) = sig_dict.lookup("ByteRange").and_then(Value::as_array) {
            info.byte_range = byte_range
                .items()
                .iter()
                .filter_map(Value::as_number)
                .map(|n| n as i64)
                .collect();
        }

        if let Some(raw) = sig_dict.lookup("Contents").and_then(Value::as_hex_string) {
            info.contents = decode_hex_string(raw)
                .ok_or_else(|| Error::InvalidPdf("signature /Contents is not a hex string".to_string()))?;
        }

        Ok(info)
    }

    /// Fill in coverage and digest from the file bytes.
    ///
    /// The gap between the two ranges must be exactly the `<...>` value.
    fn check_coverage(&self, pdf_data: &[u8], info: &mut SignatureInfo) {
        let Ok(byte_range) = <[i64; 4]>::try_from(info.byte_range.as_slice()) else {
            log::warn!("ByteRange has {} entries, expected 4", info.byte_range.len());
            return;
        };

        let gap_is_contents = byte_range[1] > 0
            && byte_range[2] > byte_range[1]
            && pdf_data.get(byte_range[1] as usize) == Some(&b'<')
            && pdf_data.get(byte_range[2] as usize - 1) == Some(&b'>');
        info.covers_whole_document =
            gap_is_contents && ByteRangeCalculator::validate_byte_range(&byte_range, pdf_data.len()).is_ok();

        match ByteRangeCalculator::extract_signed_bytes(pdf_data, &byte_range) {
            Ok(signed) => info.digest = Some(Sha256::digest(&signed).to_vec()),
            Err(e) => log::warn!("Signed bytes not readable: {}", e),
        }
    }
}

/// Text of a literal or hex string, UTF-16BE when it carries a byte order mark.
fn text_value(value: &Value) -> Option<String> {
    match value {
        Value::LiteralString(raw) => {
            let bytes = decode_literal_string_escapes(raw);
            Some(String::from_utf8_lossy(&bytes).into_owned())
        },
        Value::HexString(raw) => decode_hex_string_utf16be(raw)
            .or_else(|| decode_hex_string(raw).map(|bytes| String::from_utf8_lossy(&bytes).into_owned())),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::tokenize_all;
    use crate::parser::parse_object_body;

    fn parse_dict(input: &[u8]) -> Dictionary {
        match parse_object_body(&tokenize_all(input, true).unwrap(), 100).unwrap() {
            Value::Dictionary(dict) => dict,
            other => panic!("expected a dictionary, got {:?}", other),
        }
    }

    #[test]
    fn test_extract_signature_info() {
        let dict = parse_dict(
            b"<</Contents <3082AB00>/Type/Sig/SubFilter/ETSI.CAdES.detached \
              /M (D:20240101120000+01'00') /ByteRange [ 0 10 20 30 ] \
              /Filter/Adobe.PPKMS/Reason<FEFF004F004B> >>",
        );
        let info = SignatureVerifier::new().extract_signature_info(&dict).unwrap();

        assert_eq!(info.sub_filter, Some(SignatureSubFilter::CadesDetached));
        assert_eq!(info.reason, Some("OK".to_string()));
        assert_eq!(info.signing_time, Some("D:20240101120000+01'00'".to_string()));
        assert_eq!(info.byte_range, vec![0, 10, 20, 30]);
        assert_eq!(info.contents, vec![0x30, 0x82, 0xAB, 0x00]);
        assert!(!info.covers_whole_document);
    }

    #[test]
    fn test_wrong_type() {
        let dict = parse_dict(b"<</Type/Annot>>");
        assert!(SignatureVerifier::new().extract_signature_info(&dict).is_err());
    }

    #[test]
    fn test_literal_reason() {
        let dict = parse_dict(b"<</Type/Sig/Reason(I \\(really\\) agree)>>");
        let info = SignatureVerifier::new().extract_signature_info(&dict).unwrap();
        assert_eq!(info.reason, Some("I (really) agree".to_string()));
        assert_eq!(info.sub_filter, None);
    }

    #[test]
    fn test_check_coverage() {
        let data = b"AAA<00>BBB";
        let mut info = SignatureInfo {
            byte_range: vec![0, 3, 7, 3],
            ..SignatureInfo::default()
        };
        SignatureVerifier::new().check_coverage(data, &mut info);
        assert!(info.covers_whole_document);
        assert_eq!(info.digest, Some(Sha256::digest(b"AAABBB").to_vec()));

        let mut short = SignatureInfo {
            byte_range: vec![0, 3, 7, 2],
            ..SignatureInfo::default()
        };
        SignatureVerifier::new().check_coverage(data, &mut short);
        assert!(!short.covers_whole_document);
    }
}
