//! Digital signature types and data structures.
//!
//! This module defines the core types used for PDF digital signatures.

use crate::error::Result;
use chrono::{DateTime, FixedOffset};

/// Signature sub-filter type (signature format).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SignatureSubFilter {
    /// adbe.pkcs7.detached - PKCS#7 detached signature
    #[default]
    Pkcs7Detached,
    /// ETSI.CAdES.detached - PAdES CAdES signature
    CadesDetached,
}

impl SignatureSubFilter {
    /// Get the PDF name for this sub-filter.
    pub fn as_pdf_name(&self) -> &'static str {
        match self {
            SignatureSubFilter::Pkcs7Detached => "adbe.pkcs7.detached",
            SignatureSubFilter::CadesDetached => "ETSI.CAdES.detached",
        }
    }

    /// Parse a PDF name into a sub-filter type.
    pub fn from_pdf_name(name: &str) -> Option<Self> {
        match name {
            "adbe.pkcs7.detached" => Some(SignatureSubFilter::Pkcs7Detached),
            "ETSI.CAdES.detached" => Some(SignatureSubFilter::CadesDetached),
            _ => None,
        }
    }
}

/// Produces the detached signature over the signed byte ranges.
///
/// Any `Fn(&[u8], SignatureSubFilter) -> Result<Vec<u8>>` is a signer, so a
/// closure or a plain function can stand in for a real key.
pub trait ContentSigner {
    /// Sign `data` (both byte ranges, concatenated) and return the DER bytes.
    fn sign(&self, data: &[u8], sub_filter: SignatureSubFilter) -> Result<Vec<u8>>;
}

impl<F> ContentSigner for F
where
    F: Fn(&[u8], SignatureSubFilter) -> Result<Vec<u8>>,
{
    fn sign(&self, data: &[u8], sub_filter: SignatureSubFilter) -> Result<Vec<u8>> {
        self(data, sub_filter)
    }
}

/// Signing material supplied by the caller.
///
/// Either `signer` or `signature_value` must be set. A precomputed value
/// wins and the signer is never called.
#[derive(Clone, Default)]
pub struct SigningContext<'a> {
    /// DER-encoded X.509 certificate
    pub certificate: Vec<u8>,
    /// Signing primitive
    pub signer: Option<&'a dyn ContentSigner>,
    /// Raw signature bytes to embed verbatim
    pub signature_value: Option<Vec<u8>>,
}

impl<'a> SigningContext<'a> {
    /// Create a context for the given DER certificate.
    pub fn new(certificate: impl Into<Vec<u8>>) -> Self {
        Self {
            certificate: certificate.into(),
            signer: None,
            signature_value: None,
        }
    }

    /// Use `signer` to produce the signature.
    pub fn with_signer(mut self, signer: &'a dyn ContentSigner) -> Self {
        self.signer = Some(signer);
        self
    }

    /// Embed `value` instead of calling a signer.
    pub fn with_signature_value(mut self, value: impl Into<Vec<u8>>) -> Self {
        self.signature_value = Some(value.into());
        self
    }
}

impl std::fmt::Debug for SigningContext<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SigningContext")
            .field("certificate", &format!("{} bytes", self.certificate.len()))
            .field("signer", &self.signer.map(|_| "[REDACTED]"))
            .field("signature_value", &self.signature_value.as_ref().map(|v| format!("{} bytes", v.len())))
            .finish()
    }
}

/// Options for signing a PDF.
#[derive(Debug, Clone, Default)]
pub struct SignOptions {
    /// Reason for signing, written as `/Reason`
    pub reason: Option<String>,
    /// Use `ETSI.CAdES.detached` instead of `adbe.pkcs7.detached`
    pub ades: bool,
    /// Page that receives the widget (0-indexed, defaults to the first)
    pub page: Option<usize>,
    /// One-page PDF whose first page becomes the visible appearance
    pub signature_line: Option<Vec<u8>>,
    /// `/M` value; the current local time when unset
    pub signing_time: Option<DateTime<FixedOffset>>,
}

impl SignOptions {
    /// Set the reason for signing.
    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Select the CAdES sub-filter.
    pub fn with_ades(mut self, ades: bool) -> Self {
        self.ades = ades;
        self
    }

    /// Place the widget on page `page`.
    pub fn with_page(mut self, page: usize) -> Self {
        self.page = Some(page);
        self
    }

    /// Use the first page of `pdf` as the signature appearance.
    pub fn with_signature_line(mut self, pdf: impl Into<Vec<u8>>) -> Self {
        self.signature_line = Some(pdf.into());
        self
    }

    /// Fix the signing time.
    pub fn with_signing_time(mut self, time: DateTime<FixedOffset>) -> Self {
        self.signing_time = Some(time);
        self
    }

    /// Sub-filter selected by [`SignOptions::ades`].
    pub fn sub_filter(&self) -> SignatureSubFilter {
        if self.ades {
            SignatureSubFilter::CadesDetached
        } else {
            SignatureSubFilter::Pkcs7Detached
        }
    }
}

/// Information about an existing signature in a PDF.
#[derive(Debug, Clone, Default)]
pub struct SignatureInfo {
    /// Object number of the widget annotation
    pub widget: u32,
    /// Field name (`/T`)
    pub field_name: Option<String>,
    /// Signature sub-filter type
    pub sub_filter: Option<SignatureSubFilter>,
    /// Reason for signing
    pub reason: Option<String>,
    /// Signing time, as written in `/M`
    pub signing_time: Option<String>,
    /// Byte range of the signed data
    pub byte_range: Vec<i64>,
    /// Decoded `/Contents`, including any zero padding
    pub contents: Vec<u8>,
    /// Whether the ranges cover the whole file except the `/Contents` value
    pub covers_whole_document: bool,
    /// SHA-256 of the signed bytes, when the byte range is readable
    pub digest: Option<Vec<u8>>,
}
