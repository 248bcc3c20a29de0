//! Synthetic PDF builders shared by the integration tests.

#![allow(dead_code)]

use flate2::write::ZlibEncoder;
use flate2::Compression;
use std::io::Write;

/// Catalog, page tree and one 612x792 page, numbered 1 to 3.
pub const ONE_PAGE: [&str; 3] = [
    "<</Type/Catalog/Pages 2 0 R>>",
    "<</Type/Pages/Kids[3 0 R]/Count 1>>",
    "<</Type/Page/Parent 2 0 R/MediaBox[0 0 612 792]>>",
];

/// Build a PDF with a classic xref table. Body `i` becomes object `i + 1`
/// and object 1 is the catalog.
pub fn classic_pdf(bodies: &[&str]) -> Vec<u8> {
    classic_pdf_with_trailer(bodies, "")
}

/// Like [`classic_pdf`], with `extra` appended inside the trailer dictionary.
pub fn classic_pdf_with_trailer(bodies: &[&str], extra: &str) -> Vec<u8> {
    let mut out = b"%PDF-1.7\n".to_vec();
    let mut offsets = Vec::new();
    for (i, body) in bodies.iter().enumerate() {
        offsets.push(out.len());
        out.extend_from_slice(format!("{} 0 obj\n{}\nendobj\n", i + 1, body).as_bytes());
    }

    let xref = out.len();
    out.extend_from_slice(format!("xref\n0 {}\n0000000000 65535 f \n", bodies.len() + 1).as_bytes());
    for offset in offsets {
        out.extend_from_slice(format!("{:010} 00000 n \n", offset).as_bytes());
    }
    out.extend_from_slice(
        format!(
            "trailer\n<</Size {}/Root 1 0 R{}>>\nstartxref\n{}\n%%EOF\n",
            bodies.len() + 1,
            extra,
            xref
        )
        .as_bytes(),
    );
    out
}

/// Append a classic incremental update redefining `objects`.
pub fn append_update(base: &[u8], objects: &[(u32, &str)], size: u32) -> Vec<u8> {
    let prev = last_startxref(base);
    let mut out = base.to_vec();
    let mut entries = Vec::new();
    for (number, body) in objects {
        entries.push((*number, out.len()));
        out.extend_from_slice(format!("{} 0 obj\n{}\nendobj\n", number, body).as_bytes());
    }

    let xref = out.len();
    out.extend_from_slice(b"xref\n");
    for (number, offset) in entries {
        out.extend_from_slice(format!("{} 1\n{:010} 00000 n \n", number, offset).as_bytes());
    }
    out.extend_from_slice(
        format!("trailer\n<</Size {}/Root 1 0 R/Prev {}>>\nstartxref\n{}\n%%EOF\n", size, prev, xref).as_bytes(),
    );
    out
}

/// Build a PDF whose xref is a PNG-Up predicted, Flate compressed stream.
///
/// `top` objects are written directly, `stored` objects go into one object
/// stream. The object stream and the xref stream take the next two numbers.
pub fn xref_stream_pdf(top: &[(u32, &str)], stored: &[(u32, &str)], root: u32) -> Vec<u8> {
    let max = top.iter().chain(stored).map(|(n, _)| *n).max().unwrap_or(0);
    let objstm_number = max + 1;
    let xref_number = max + 2;
    let size = xref_number + 1;

    // (type, field2, field3) per object number
    let mut rows = vec![(0u8, 0u32, 0u8); size as usize];
    let mut out = b"%PDF-1.7\n".to_vec();

    for (number, body) in top {
        rows[*number as usize] = (1, out.len() as u32, 0);
        out.extend_from_slice(format!("{} 0 obj\n{}\nendobj\n", number, body).as_bytes());
    }

    if !stored.is_empty() {
        let mut header = String::new();
        let mut data = String::new();
        for (index, (number, body)) in stored.iter().enumerate() {
            rows[*number as usize] = (2, objstm_number, index as u8);
            header.push_str(&format!("{} {} ", number, data.len()));
            data.push_str(body);
            data.push('\n');
        }
        let decoded = format!("{}{}", header, data);
        let compressed = zlib(decoded.as_bytes());

        rows[objstm_number as usize] = (1, out.len() as u32, 0);
        out.extend_from_slice(
            format!(
                "{} 0 obj\n<</Type/ObjStm/N {}/First {}/Filter/FlateDecode/Length {}>>\nstream\n",
                objstm_number,
                stored.len(),
                header.len(),
                compressed.len()
            )
            .as_bytes(),
        );
        out.extend_from_slice(&compressed);
        out.extend_from_slice(b"\nendstream\nendobj\n");
    }

    let xref_offset = out.len();
    rows[xref_number as usize] = (1, xref_offset as u32, 0);

    let mut raw = Vec::new();
    for (kind, field2, field3) in &rows {
        raw.push(*kind);
        raw.extend_from_slice(&field2.to_be_bytes()[1..]);
        raw.push(*field3);
    }
    let compressed = zlib(&png_up(&raw, 5));

    out.extend_from_slice(
        format!(
            "{} 0 obj\n<</Type/XRef/Size {}/W[1 3 1]/Root {} 0 R/Filter/FlateDecode\
             /DecodeParms<</Columns 5/Predictor 12>>/Length {}>>\nstream\n",
            xref_number,
            size,
            root,
            compressed.len()
        )
        .as_bytes(),
    );
    out.extend_from_slice(&compressed);
    out.extend_from_slice(format!("\nendstream\nendobj\nstartxref\n{}\n%%EOF\n", xref_offset).as_bytes());
    out
}

/// A one-page signature line PDF: 200x50 page, one font, one raw content stream.
pub fn signature_line_pdf() -> Vec<u8> {
    classic_pdf(&[
        "<</Type/Catalog/Pages 2 0 R>>",
        "<</Type/Pages/Kids[3 0 R]/Count 1>>",
        "<</Type/Page/Parent 2 0 R/MediaBox[0 0 200 50]/Resources<</Font<</F1 4 0 R>>>>/Contents 5 0 R>>",
        "<</Type/Font/Subtype/Type1/BaseFont/Helvetica>>",
        "<</Length 24>>\nstream\nBT /F1 12 Tf (Sig) Tj ET\nendstream",
    ])
}

/// Offset named by the last `startxref` of `pdf`.
pub fn last_startxref(pdf: &[u8]) -> usize {
    let text = String::from_utf8_lossy(pdf);
    let position = text.rfind("startxref").expect("startxref present");
    text[position + "startxref".len()..]
        .split_whitespace()
        .next()
        .and_then(|n| n.parse().ok())
        .expect("startxref offset")
}

/// Count non-overlapping occurrences of `needle`.
pub fn count(haystack: &[u8], needle: &[u8]) -> usize {
    haystack.windows(needle.len()).filter(|w| *w == needle).count()
}

fn zlib(data: &[u8]) -> Vec<u8> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data).expect("in-memory write");
    encoder.finish().expect("in-memory finish")
}

fn png_up(data: &[u8], columns: usize) -> Vec<u8> {
    let mut out = Vec::new();
    let mut previous = vec![0u8; columns];
    for row in data.chunks(columns) {
        out.push(2);
        for (i, byte) in row.iter().enumerate() {
            out.push(byte.wrapping_sub(previous[i]));
        }
        previous.copy_from_slice(row);
    }
    out
}
