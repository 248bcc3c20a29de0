//! PDF Digital Signatures module.
//!
//! This module places detached signatures into PDF documents as
//! incremental updates, and reads existing signatures back.
//!
//! ## Features
//!
//! - **Signature Creation**: [`PdfDocument::sign`](crate::PdfDocument::sign)
//!   appends the signature, its widget and the form/page updates
//! - **Signature Inspection**: [`SignatureVerifier`] reports byte ranges,
//!   contents and coverage of every signature widget
//! - **ByteRange Calculation**: [`ByteRangeCalculator`] reserves and fills
//!   the fixed-width placeholders
//!
//! ## Signature Types Supported
//!
//! - PKCS#7 detached signatures (adbe.pkcs7.detached)
//! - PAdES signatures (ETSI.CAdES.detached)
//!
//! ## Example
//!
//! ```ignore
//! use pdf_incremental::PdfDocument;
//! use pdf_incremental::signatures::{CmsSigner, SignOptions, SigningContext};
//!
//! let mut pdf = PdfDocument::open("document.pdf")?;
//! let signer = CmsSigner::from_der(&certificate, &private_key)?;
//! let context = SigningContext::new(certificate.clone()).with_signer(&signer);
//!
//! pdf.sign(&context, &SignOptions::default().with_reason("Approved"))?;
//! pdf.save("signed_document.pdf")?;
//! ```
//!
//! ## PDF Specification Reference
//!
//! - ISO 32000-1:2008 Section 12.8 - Digital Signatures
//! - ETSI TS 102 778 - PAdES
//!
//! [`CmsSigner`] requires the `signatures` feature.

mod byterange;
#[cfg(feature = "signatures")]
mod cms_signer;
mod signer;
mod types;
mod verifier;

pub use byterange::{ByteRangeCalculator, bytes_to_hex};
#[cfg(feature = "signatures")]
pub use cms_signer::CmsSigner;
pub use signer::format_pdf_date;
pub use types::{ContentSigner, SignOptions, SignatureInfo, SignatureSubFilter, SigningContext};
pub use verifier::SignatureVerifier;
