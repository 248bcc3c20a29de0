//! PDF signing implementation.
//!
//! [`PdfDocument::sign`] appends one incremental update holding a `/Sig`
//! dictionary, its appearance XObject, a `/Widget` annotation, new
//! revisions of the page and of the catalog (or `/AcroForm`), and a fresh
//! cross-reference section. Existing bytes are never moved. Two fixed-width
//! placeholders written early on are filled in place at the end: the last
//! `/ByteRange` number and the hex signature value.

use super::byterange::{ByteRangeCalculator, bytes_to_hex};
use super::types::{SignOptions, SigningContext};
use crate::decoders::flate_encode;
use crate::document::PdfDocument;
use crate::element::encode_hex_string_utf16be;
use crate::error::{Error, Result};
use crate::object::{Array, Dictionary, Value};
use crate::patch::{BytePatch, patched};
use crate::writer::{ObjectCopier, format_number};
use crate::xref::{TrailerFields, write_xref_stream, write_xref_table};
use chrono::{DateTime, FixedOffset, Local};
use std::ops::Range;

/// Resource categories copied from a signature line page.
const RESOURCE_CATEGORIES: [&str; 6] = ["ColorSpace", "ExtGState", "Font", "Pattern", "Shading", "XObject"];

/// Where the two in-place fields of the signature dictionary were written.
#[derive(Debug, Clone, Copy)]
struct Placeholders {
    /// Offset of the first hex digit after `/Contents <`
    contents: usize,
    /// Offset of the blank filler after the third `/ByteRange` number
    filler: usize,
}

/// Appearance object and the size of the widget rectangle.
#[derive(Debug, Clone, Copy)]
struct Appearance {
    id: u32,
    width: f64,
    height: f64,
}

impl PdfDocument {
    /// Append a signed incremental update.
    ///
    /// On success the document is reloaded, so the new signature is visible
    /// through [`PdfDocument::signature_widgets`]. On failure everything
    /// appended by this call is dropped again and the document is left as
    /// it was. Nothing reaches storage until [`PdfDocument::write`] or
    /// [`PdfDocument::save`].
    ///
    /// # Errors
    ///
    /// Fails without a certificate, without a signer or signature value,
    /// when the requested page does not exist, when the catalog or an
    /// existing `/AcroForm` lacks a required key, or when the signature
    /// does not fit in the reserved placeholder.
    pub fn sign(&mut self, context: &SigningContext<'_>, options: &SignOptions) -> Result<()> {
        if context.certificate.is_empty() {
            log::warn!("No signing certificate given");
            return Err(Error::Signing("no signing certificate".to_string()));
        }
        if context.signer.is_none() && context.signature_value.is_none() {
            log::warn!("Neither a signer nor a signature value given");
            return Err(Error::Signing("neither a signer nor a signature value".to_string()));
        }

        let original_len = self.len();
        let original_xref = self.xref().clone();
        match self.append_signed_update(context, options) {
            Ok(()) => {
                log::info!("Signed update written, {} bytes appended", self.len() - original_len);
                self.reload()
            },
            Err(e) => {
                log::warn!("Signing failed, discarding {} bytes: {}", self.len() - original_len, e);
                self.rollback(original_len, original_xref);
                Err(e)
            },
        }
    }

    fn append_signed_update(&mut self, context: &SigningContext<'_>, options: &SignOptions) -> Result<()> {
        let calc = ByteRangeCalculator::new(self.config().signature_content_length);
        let filler_len = self.config().byte_range_filler;

        let page_index = options.page.unwrap_or(0);
        let page = {
            let pages = self.pages()?;
            let page = pages.get(page_index).ok_or_else(|| {
                log::warn!("Page {} requested, document has {}", page_index, pages.len());
                Error::Signing(format!("page {} not found ({} pages)", page_index, pages.len()))
            })?;
            page.reference()
        };
        let signature_index = self.next_signature_index()?;

        // A bare trailing `%%EOF` comment would swallow the first object header
        if !matches!(self.as_bytes().last(), None | Some(b'\r' | b'\n')) {
            self.append(b"\n");
        }

        let (signature_id, placeholders) = self.write_signature_object(&calc, filler_len, options)?;
        let appearance = self.write_appearance_object(options.signature_line.as_deref())?;
        let annot_id = self.create_object();
        let annot = format!(
            "{} 0 obj\n<</Type/Annot/Subtype/Widget/F 132\n/Rect[0 0 {} {}]\n/FT/Sig\n/P {} {} R\n\
             /T(Signature{})\n/V {} 0 R\n/DV {} 0 R\n/AP<<\n/N {} 0 R\n>>\n>>\nendobj\n\n",
            annot_id,
            format_number(appearance.width),
            format_number(appearance.height),
            page.id,
            page.gen,
            signature_index,
            signature_id,
            signature_id,
            appearance.id
        );
        self.append(annot.as_bytes());

        self.add_page_annotation(page.id, annot_id)?;
        self.add_form_field(annot_id)?;
        self.write_xref_section()?;

        // Both placeholders keep their width, so nothing written so far moves.
        let file_end = self.len();
        let byte_range = calc.calculate_byte_range(file_end, placeholders.contents - 1);
        self.patch(&ByteRangeCalculator::last_range_patch(
            placeholders.filler,
            filler_len,
            byte_range[3] as usize,
        )?)?;

        let signed = ByteRangeCalculator::extract_signed_bytes(self.as_bytes(), &byte_range)?;
        let signature = match (&context.signature_value, context.signer) {
            (Some(value), _) => value.clone(),
            (None, Some(signer)) => signer.sign(&signed, options.sub_filter())?,
            (None, None) => return Err(Error::Signing("neither a signer nor a signature value".to_string())),
        };
        let hex = bytes_to_hex(&signature);
        self.patch(&calc.signature_patch(placeholders.contents, &hex)?)?;

        log::debug!(
            "Signature{} (object {}) on page {}, ByteRange {}",
            signature_index,
            signature_id,
            page_index,
            ByteRangeCalculator::format_byte_range(&byte_range)
        );
        Ok(())
    }

    /// Append the `/Sig` dictionary with both placeholders.
    fn write_signature_object(
        &mut self,
        calc: &ByteRangeCalculator,
        filler_len: usize,
        options: &SignOptions,
    ) -> Result<(u32, Placeholders)> {
        let id = self.create_object();
        let start = self.len();
        let length = calc.content_length();

        let mut text = format!("{} 0 obj\n<</Contents ", id).into_bytes();
        let contents = start + text.len() + 1;
        text.extend_from_slice(calc.generate_placeholder().as_bytes());
        text.extend_from_slice(b"\n/Type/Sig/SubFilter/");
        text.extend_from_slice(options.sub_filter().as_pdf_name().as_bytes());

        let time = options.signing_time.unwrap_or_else(|| Local::now().fixed_offset());
        text.extend_from_slice(format!(" /M ({})", format_pdf_date(&time)).as_bytes());

        // The first range ends at the '<', the second starts after the '>'.
        text.extend_from_slice(format!(" /ByteRange [ 0 {} {} ", contents - 1, contents + length + 1).as_bytes());
        let filler = start + text.len();
        text.resize(text.len() + filler_len, b' ');
        text.extend_from_slice(b" /Filter/Adobe.PPKMS");

        if let Some(reason) = options.reason.as_deref().filter(|r| !r.is_empty()) {
            text.extend_from_slice(format!("/Reason<{}>", encode_hex_string_utf16be(reason)).as_bytes());
        }
        text.extend_from_slice(b" >>\nendobj\n\n");
        self.append(&text);

        Ok((id, Placeholders { contents, filler }))
    }

    /// Append the appearance form XObject.
    ///
    /// With a signature line PDF its first page's resources and content
    /// become the appearance; without one the XObject is empty with a
    /// zero-area `/BBox`.
    fn write_appearance_object(&mut self, signature_line: Option<&[u8]>) -> Result<Appearance> {
        let id = self.create_object();
        let Some(signature_line) = signature_line else {
            self.append(
                format!(
                    "{} 0 obj\n<</Type/XObject\n/Subtype/Form\n/BBox[0 0 0 0]\n/Length 0\n>>\nstream\n\nendstream\nendobj\n\n",
                    id
                )
                .as_bytes(),
            );
            return Ok(Appearance {
                id,
                width: 0.0,
                height: 0.0,
            });
        };

        let source = PdfDocument::read_with_config(signature_line, self.config().clone())?;
        let pages = source.pages()?;
        let page = pages
            .first()
            .ok_or_else(|| Error::Signing("signature line PDF has no pages".to_string()))?;
        let page_dict = source.object_dictionary(page)?;

        let media_box = source
            .resolve(page_dict.require("MediaBox", "signature line page")?)?
            .as_array()
            .ok_or_else(|| Error::InvalidObjectType {
                expected: "Array".to_string(),
                found: "MediaBox".to_string(),
            })?;
        let (width, height) = media_box_size(media_box)?;

        let mut copier = ObjectCopier::new(&source);
        let mut resources = Dictionary::new();
        if let Some(page_resources) = page_dict.lookup("Resources") {
            if let Some(page_resources) = source.resolve(page_resources)?.as_dict() {
                for category in RESOURCE_CATEGORIES {
                    if let Some(value) = page_resources.lookup(category) {
                        copier.copy_reachable(self, value)?;
                        resources.insert(category, value.clone());
                    }
                }
            }
        }

        let mut content = Vec::new();
        let content_refs: Vec<_> = match page_dict.lookup("Contents").map(|c| source.resolve_array_or_self(c)) {
            Some(refs) => refs?,
            None => Vec::new(),
        };
        for reference in content_refs {
            let stream = source
                .lookup_object(reference)
                .ok_or(Error::ObjectNotFound(reference))?;
            if !content.is_empty() {
                content.push(b'\n');
            }
            content.extend_from_slice(&source.decoded_stream_data(stream)?);
        }

        let mut text = format!("{} 0 obj\n<</Type/XObject\n/Subtype/Form\n", id).into_bytes();
        if !resources.is_empty() {
            text.extend_from_slice(b"/Resources");
            text.extend_from_slice(&copier.serializer().serialize(&Value::Dictionary(resources)));
            text.push(b'\n');
        }
        text.extend_from_slice(format!("/BBox[0 0 {} {}]\n", format_number(width), format_number(height)).as_bytes());

        let data = if content.is_empty() { Vec::new() } else { flate_encode(&content)? };
        text.extend_from_slice(format!("/Length {}\n", data.len()).as_bytes());
        if !data.is_empty() {
            text.extend_from_slice(b"/Filter/FlateDecode\n");
        }
        text.extend_from_slice(b">>\nstream\n");
        text.extend_from_slice(&data);
        text.extend_from_slice(b"\nendstream\nendobj\n\n");

        // Copied resources were appended after the id was allocated.
        self.update_object(id);
        self.append(&text);

        Ok(Appearance { id, width, height })
    }

    /// Add `annot_id` to the page's `/Annots`.
    fn add_page_annotation(&mut self, page_id: u32, annot_id: u32) -> Result<()> {
        let insertion = format!(" {} 0 R", annot_id);
        let page = self.lookup_object(page_id).ok_or(Error::ObjectNotFound(page_id))?;
        let dict = self.object_dictionary(page)?;

        match dict.lookup("Annots") {
            Some(Value::Reference(annots)) => {
                let annots_id = annots.id;
                let object = self.lookup_object(annots_id).ok_or(Error::ObjectNotFound(annots_id))?;
                let array = self.object_array(object)?;
                let (span, at) = (array_span(array), array.end_offset());
                self.rewrite_with_insertion(annots_id, span, at, insertion.as_bytes())
            },
            Some(Value::Array(array)) => {
                let (span, at) = (dict_span(dict), array.end_offset());
                self.rewrite_with_insertion(page_id, span, at, insertion.as_bytes())
            },
            None => {
                let (span, at) = (dict_span(dict), dict.end_offset());
                self.rewrite_with_insertion(page_id, span, at, format!("/Annots[{} 0 R]", annot_id).as_bytes())
            },
            Some(other) => {
                log::warn!("Page {} has /Annots of type {}", page_id, other.type_name());
                Err(Error::InvalidObjectType {
                    expected: "Array".to_string(),
                    found: other.type_name().to_string(),
                })
            },
        }
    }

    /// Add `annot_id` to `/AcroForm/Fields`, creating the form if needed.
    fn add_form_field(&mut self, annot_id: u32) -> Result<()> {
        let insertion = format!(" {} 0 R", annot_id);
        let root = self.root_reference()?;
        let catalog = self.lookup_object(root.id).ok_or(Error::ObjectNotFound(root.id))?;
        let catalog_dict = self.object_dictionary(catalog)?;

        let (form_id, form_dict) = match catalog_dict.lookup("AcroForm") {
            None => {
                let (span, at) = (dict_span(catalog_dict), catalog_dict.end_offset());
                let form = format!("/AcroForm<</Fields[{} 0 R]/SigFlags 3>>", annot_id);
                return self.rewrite_with_insertion(root.id, span, at, form.as_bytes());
            },
            Some(Value::Reference(form)) => {
                let form_object = self.lookup_object(form.id).ok_or(Error::ObjectNotFound(form.id))?;
                (form.id, self.object_dictionary(form_object)?)
            },
            Some(Value::Dictionary(form)) => (root.id, form),
            Some(other) => {
                return Err(Error::InvalidObjectType {
                    expected: "Dictionary".to_string(),
                    found: other.type_name().to_string(),
                });
            },
        };

        match form_dict.require("Fields", "AcroForm")? {
            Value::Reference(fields) => {
                let fields_id = fields.id;
                let object = self.lookup_object(fields_id).ok_or(Error::ObjectNotFound(fields_id))?;
                let array = self.object_array(object)?;
                let (span, at) = (array_span(array), array.end_offset());
                self.rewrite_with_insertion(fields_id, span, at, insertion.as_bytes())
            },
            Value::Array(fields) => {
                // An inline form lives in the catalog, whose bytes are rewritten.
                let owner = self.lookup_object(form_id).ok_or(Error::ObjectNotFound(form_id))?;
                let span = dict_span(self.object_dictionary(owner)?);
                let at = fields.end_offset();
                self.rewrite_with_insertion(form_id, span, at, insertion.as_bytes())
            },
            other => Err(Error::InvalidObjectType {
                expected: "Array".to_string(),
                found: other.type_name().to_string(),
            }),
        }
    }

    /// Append a new revision of object `number` whose body is `span` of its
    /// source bytes with `insertion` spliced in at `at`.
    fn rewrite_with_insertion(&mut self, number: u32, span: Range<usize>, at: usize, insertion: &[u8]) -> Result<()> {
        let object = self.lookup_object(number).ok_or(Error::ObjectNotFound(number))?;
        let generation = object.generation();
        let source = self.object_source(object);
        let body = source.get(span.clone()).ok_or(Error::UnexpectedEof)?;
        if at < span.start || at > span.end {
            return Err(Error::InvalidPatch {
                offset: at,
                reason: format!("outside object {} ({}..{})", number, span.start, span.end),
            });
        }
        let body = patched(body, &BytePatch::insert(at - span.start, insertion))?;

        self.update_object(number);
        let mut text = format!("{} {} obj\n", number, generation).into_bytes();
        text.extend_from_slice(&body);
        text.extend_from_slice(b"\nendobj\n\n");
        self.append(&text);
        log::debug!("Rewrote object {} with {} inserted bytes", number, insertion.len());
        Ok(())
    }

    /// Append the cross-reference section, in the same form as the newest
    /// existing one, followed by `startxref` and `%%EOF`.
    fn write_xref_section(&mut self) -> Result<()> {
        let mut fields = self.trailer().map(TrailerFields::inherit).unwrap_or_default();
        fields.root = Some(self.root_reference()?);
        fields.prev = Some(self.start_xref());

        let mut out = Vec::new();
        let xref_offset;
        if self.uses_xref_stream() {
            let stream_id = self.create_object();
            xref_offset = self.len();
            fields.size = self.xref().size();
            write_xref_stream(&mut out, self.xref(), stream_id, &fields)?;
        } else {
            xref_offset = self.len();
            fields.size = self.xref().size();
            write_xref_table(&mut out, self.xref(), &fields)?;
        }
        out.extend_from_slice(format!("startxref\n{}\n%%EOF\n", xref_offset).as_bytes());
        self.append(&out);
        Ok(())
    }

    /// Object numbers named by `value`: one reference or an array of them.
    fn resolve_array_or_self(&self, value: &Value) -> Result<Vec<u32>> {
        match value {
            Value::Reference(reference) => match self.resolve(value)? {
                Value::Array(array) => Ok(array.references().map(|r| r.id).collect()),
                _ => Ok(vec![reference.id]),
            },
            Value::Array(array) => Ok(array.references().map(|r| r.id).collect()),
            other => Err(Error::InvalidObjectType {
                expected: "Reference".to_string(),
                found: other.type_name().to_string(),
            }),
        }
    }
}

/// Bytes of a dictionary from `<<` through `>>`.
fn dict_span(dict: &Dictionary) -> Range<usize> {
    dict.offset()..dict.end_offset() + 2
}

/// Bytes of an array from `[` through `]`.
fn array_span(array: &Array) -> Range<usize> {
    array.offset()..array.end_offset() + 1
}

fn media_box_size(media_box: &Array) -> Result<(f64, f64)> {
    let numbers: Vec<f64> = media_box.items().iter().filter_map(Value::as_number).collect();
    if numbers.len() < 4 {
        log::warn!("MediaBox has {} numbers, expected 4", numbers.len());
        return Err(Error::InvalidPdf(format!("MediaBox has {} numbers, expected 4", numbers.len())));
    }
    Ok((numbers[2] - numbers[0], numbers[3] - numbers[1]))
}

/// Format a time as a PDF date: `D:YYYYMMDDHHmmSS+HH'mm'`.
pub fn format_pdf_date(time: &DateTime<FixedOffset>) -> String {
    let offset = time.offset().local_minus_utc();
    let sign = if offset < 0 { '-' } else { '+' };
    let offset = offset.abs();
    format!(
        "{}{}{:02}'{:02}'",
        time.format("D:%Y%m%d%H%M%S"),
        sign,
        offset / 3600,
        (offset % 3600) / 60
    )
}
