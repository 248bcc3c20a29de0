// Allow some clippy lints that are too pedantic for this project
#![allow(clippy::too_many_arguments)]
#![allow(clippy::enum_variant_names)]
#![allow(clippy::should_implement_trait)]
// Allow unused for tests
#![cfg_attr(test, allow(dead_code))]
#![cfg_attr(test, allow(unused_variables))]

//! # pdf_incremental
//!
//! PDF incremental-update engine: reads a PDF into an edit buffer without
//! rewriting a single byte, exposes its object graph, and appends digitally
//! signed revisions.
//!
//! ## Core Features
//!
//! ### Reading
//! - **Byte-exact object graph**: every dictionary key and array remembers
//!   where it sits in the file, so later edits are byte splices
//! - **Cross-reference chains**: classic tables and PNG-predicted
//!   cross-reference streams, following `/Prev` through every revision
//! - **Object streams**: compressed objects resolve like any other object
//! - **Lazy parsing**: an object body is parsed the first time it is looked up
//! - **Fix-up path**: damaged files can be normalized with `lopdf` and read again
//!
//! ### Signing
//! - **Incremental updates**: new objects and a new xref section are appended;
//!   earlier revisions and signatures stay valid
//! - **Detached signatures**: `adbe.pkcs7.detached` or `ETSI.CAdES.detached`,
//!   produced by any [`signatures::ContentSigner`] or embedded precomputed
//! - **Visible signatures**: a one-page "signature line" PDF can be copied in
//!   as the widget appearance
//! - **Removal**: the most recent signatures can be dropped by truncating
//!   their revisions
//!
//! ## Quick Start
//!
//! ```ignore
//! use pdf_incremental::PdfDocument;
//! use pdf_incremental::signatures::{SignOptions, SigningContext, SignatureVerifier};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut doc = PdfDocument::open("contract.pdf")?;
//!
//! let context = SigningContext::new(certificate).with_signer(&my_signer);
//! doc.sign(&context, &SignOptions::default().with_reason("Approved"))?;
//!
//! for signature in SignatureVerifier::new().inspect(&doc)? {
//!     println!("{:?} covers whole file: {}", signature.field_name, signature.covers_whole_document);
//! }
//! doc.save("contract-signed.pdf")?;
//! # Ok(())
//! # }
//! ```
//!
//! ## License
//!
//! Licensed under either of:
//!
//! * Apache License, Version 2.0 ([LICENSE-APACHE](LICENSE-APACHE) or <http://www.apache.org/licenses/LICENSE-2.0>)
//! * MIT license ([LICENSE-MIT](LICENSE-MIT) or <http://opensource.org/licenses/MIT>)
//!
//! at your option.

#![warn(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

// Error handling
pub mod error;

// Configuration
pub mod config;
pub mod parser_config;

// Core PDF parsing
pub mod document;
pub mod element;
pub mod lexer;
pub mod object;
pub mod objstm;
pub mod parser;
pub mod xref;

// Stream decoders
pub mod decoders;

// Recovery of malformed input
pub mod fixup;

// Incremental writing
pub mod patch;
pub mod writer;

// Digital signatures
pub mod signatures;

pub use config::PdfConfig;
pub use document::PdfDocument;
pub use error::{Error, Result};
pub use fixup::{LopdfNormalizer, PdfNormalizer};
pub use object::{ObjectRef, PdfObject, Value};
pub use parser_config::ParserOptions;
pub use patch::BytePatch;

// Version info
/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        // VERSION is populated from CARGO_PKG_VERSION at compile time
        assert!(VERSION.starts_with("0."));
    }

    #[test]
    fn test_name() {
        assert_eq!(NAME, "pdf_incremental");
    }
}
