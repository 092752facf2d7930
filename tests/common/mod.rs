//! Shared helpers for building small PDFs in memory.

#![allow(dead_code)]

/// Builds a classic-xref PDF from numbered object bodies.
pub struct PdfBuilder {
    objects: Vec<(u32, Vec<u8>)>,
    trailer_extra: Vec<u8>,
    header: Vec<u8>,
}

impl PdfBuilder {
    pub fn new() -> Self {
        Self {
            objects: Vec::new(),
            trailer_extra: Vec::new(),
            header: b"%PDF-1.7\n%\xc2\xa5\xc2\xb1\xc3\xab\n".to_vec(),
        }
    }

    /// Prepend junk bytes before the %PDF- header.
    pub fn with_junk_prefix(mut self, junk: &[u8]) -> Self {
        let mut header = junk.to_vec();
        header.extend_from_slice(&self.header);
        self.header = header;
        self
    }

    /// Add an object body (the part between `N 0 obj` and `endobj`).
    pub fn add(&mut self, objid: u32, body: &[u8]) -> &mut Self {
        self.objects.push((objid, body.to_vec()));
        self
    }

    /// Add a stream object with the given dictionary entries (without
    /// /Length, which is computed) and payload.
    pub fn add_stream(&mut self, objid: u32, dict_entries: &str, payload: &[u8]) -> &mut Self {
        let mut body = Vec::new();
        body.extend_from_slice(
            format!("<< {} /Length {} >>\nstream\n", dict_entries, payload.len()).as_bytes(),
        );
        body.extend_from_slice(payload);
        body.extend_from_slice(b"\nendstream");
        self.objects.push((objid, body));
        self
    }

    /// Extra entries spliced into the trailer dictionary (e.g. /Encrypt,
    /// /ID).
    pub fn trailer_extra(&mut self, extra: &[u8]) -> &mut Self {
        self.trailer_extra = extra.to_vec();
        self
    }

    /// Serialize with a correct xref table and startxref.
    pub fn build(&self, root: u32) -> Vec<u8> {
        self.build_inner(root, None)
    }

    /// Serialize with a deliberately wrong startxref offset.
    pub fn build_with_bad_startxref(&self, root: u32) -> Vec<u8> {
        self.build_inner(root, Some(999_999_999))
    }

    fn build_inner(&self, root: u32, override_startxref: Option<usize>) -> Vec<u8> {
        let mut out = self.header.clone();
        let mut offsets: Vec<(u32, usize)> = Vec::new();
        for (objid, body) in &self.objects {
            offsets.push((*objid, out.len()));
            out.extend_from_slice(format!("{} 0 obj\n", objid).as_bytes());
            out.extend_from_slice(body);
            out.extend_from_slice(b"\nendobj\n");
        }
        let max_id = self.objects.iter().map(|(id, _)| *id).max().unwrap_or(0);
        let xref_pos = out.len();
        out.extend_from_slice(format!("xref\n0 {}\n", max_id + 1).as_bytes());
        out.extend_from_slice(b"0000000000 65535 f \n");
        for objid in 1..=max_id {
            match offsets.iter().find(|(id, _)| *id == objid) {
                Some((_, offset)) => {
                    out.extend_from_slice(format!("{:010} 00000 n \n", offset).as_bytes())
                }
                None => out.extend_from_slice(b"0000000000 65535 f \n"),
            }
        }
        out.extend_from_slice(
            format!(
                "trailer\n<< /Size {} /Root {} 0 R ",
                max_id + 1,
                root
            )
            .as_bytes(),
        );
        out.extend_from_slice(&self.trailer_extra);
        out.extend_from_slice(b">>\nstartxref\n");
        out.extend_from_slice(
            format!("{}\n", override_startxref.unwrap_or(xref_pos)).as_bytes(),
        );
        out.extend_from_slice(b"%%EOF\n");
        out
    }
}

/// Hex-string spelling of arbitrary bytes for use in object bodies.
pub fn hex_string(data: &[u8]) -> String {
    let mut s = String::with_capacity(data.len() * 2 + 2);
    s.push('<');
    for b in data {
        s.push_str(&format!("{:02X}", b));
    }
    s.push('>');
    s
}

/// A one-page document showing `text` in Helvetica 12pt at (72, 720).
pub fn hello_world_pdf(text: &str) -> Vec<u8> {
    let content = format!("BT /F1 12 Tf 72 720 Td ({}) Tj ET", text);
    let mut builder = PdfBuilder::new();
    builder
        .add(1, b"<< /Type /Catalog /Pages 2 0 R >>")
        .add(
            2,
            b"<< /Type /Pages /Kids [3 0 R] /Count 1 /MediaBox [0 0 612 792] >>",
        )
        .add(
            3,
            b"<< /Type /Page /Parent 2 0 R /Contents 4 0 R /Resources << /Font << /F1 5 0 R >> >> >>",
        )
        .add_stream(4, "", content.as_bytes())
        .add(
            5,
            b"<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica /Encoding /WinAnsiEncoding >>",
        );
    builder.build(1)
}
