//! Cross-reference tables, streams and reconstruction.

use crate::codec::filters::{decode_with_specs, filter_specs};
use crate::error::{PdfError, Result};
use crate::model::objects::PDFObject;
use crate::parser::lexer::rfind_bytes;
use crate::parser::object::{parse_indirect_object, ObjectParser};
use crate::utils::nunpack;
use bytes::Bytes;
use std::collections::HashMap;

/// Where an object lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum XRefPos {
    /// The slot is unused; the reference resolves to null.
    Free,
    /// Stored at a byte offset in the file.
    InFile { pos: usize, genno: u32 },
    /// Stored as the `index`-th object inside an object stream.
    InStream { streamid: u32, index: usize },
}

/// One xref section (classic table, xref stream, or the reconstructed
/// fallback) together with its trailer dictionary.
#[derive(Debug, Default)]
pub struct XRefSection {
    pub entries: HashMap<u32, XRefPos>,
    pub trailer: HashMap<String, PDFObject>,
    pub is_fallback: bool,
}

impl XRefSection {
    pub fn get(&self, objid: u32) -> Option<XRefPos> {
        self.entries.get(&objid).copied()
    }

    pub fn objids(&self) -> impl Iterator<Item = u32> + '_ {
        self.entries.keys().copied()
    }
}

/// How far back from EOF to look for the final startxref.
const STARTXREF_WINDOW: usize = 65536;

/// Read the startxref offset near the end of the file, scanning backward
/// up to 64 KiB from the last `%%EOF`.
pub fn find_startxref(data: &[u8]) -> Result<usize> {
    let window_start = data.len().saturating_sub(STARTXREF_WINDOW);
    let window = &data[window_start..];
    let i = rfind_bytes(window, b"startxref").ok_or_else(|| PdfError::Xref {
        pos: None,
        msg: "startxref not found".into(),
    })?;
    let rest = &window[i + b"startxref".len()..];
    let mut pos = 0;
    while pos < rest.len() && (rest[pos] == b' ' || rest[pos] == b'\r' || rest[pos] == b'\n') {
        pos += 1;
    }
    let start = pos;
    while pos < rest.len() && rest[pos].is_ascii_digit() {
        pos += 1;
    }
    if pos == start {
        return Err(PdfError::Xref {
            pos: Some(window_start + i),
            msg: "startxref not followed by an offset".into(),
        });
    }
    std::str::from_utf8(&rest[start..pos])
        .ok()
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| PdfError::Xref {
            pos: Some(window_start + i),
            msg: "invalid startxref offset".into(),
        })
}

/// Parse the xref section at `pos`: a classic table if the keyword
/// `xref` is present, otherwise a cross-reference stream.
pub fn load_xref_at(data: &Bytes, pos: usize) -> Result<XRefSection> {
    let buf: &[u8] = data.as_ref();
    if pos >= buf.len() {
        return Err(PdfError::Xref {
            pos: Some(pos),
            msg: "xref offset beyond EOF".into(),
        });
    }
    let mut probe = pos;
    while probe < buf.len() && matches!(buf[probe], b' ' | b'\r' | b'\n') {
        probe += 1;
    }
    if buf[probe..].starts_with(b"xref") {
        parse_xref_table(buf, probe)
    } else {
        parse_xref_stream(data, pos)
    }
}

fn skip_ws(data: &[u8], mut cursor: usize) -> usize {
    while cursor < data.len() && matches!(data[cursor], b' ' | b'\t' | b'\r' | b'\n') {
        cursor += 1;
    }
    cursor
}

fn read_uint(data: &[u8], cursor: usize) -> Result<(u64, usize)> {
    let mut end = cursor;
    while end < data.len() && data[end].is_ascii_digit() {
        end += 1;
    }
    if end == cursor {
        return Err(PdfError::Xref {
            pos: Some(cursor),
            msg: "expected a number in xref table".into(),
        });
    }
    let value = std::str::from_utf8(&data[cursor..end])
        .ok()
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| PdfError::Xref {
            pos: Some(cursor),
            msg: "unparseable number in xref table".into(),
        })?;
    Ok((value, end))
}

/// Classic table: `xref`, then `start count` subsections of 20-byte
/// entries, terminated by `trailer`.
fn parse_xref_table(data: &[u8], pos: usize) -> Result<XRefSection> {
    let mut xref = XRefSection::default();
    let mut cursor = pos + b"xref".len();
    loop {
        cursor = skip_ws(data, cursor);
        if cursor >= data.len() {
            break;
        }
        if data[cursor..].starts_with(b"trailer") {
            cursor += b"trailer".len();
            break;
        }
        let (start_objid, next) = read_uint(data, cursor)?;
        cursor = skip_ws(data, next);
        let (count, next) = read_uint(data, cursor)?;
        cursor = next;

        let mut base_objid = start_objid;
        for i in 0..count {
            cursor = skip_ws(data, cursor);
            let (offset, next) = read_uint(data, cursor)?;
            cursor = skip_ws(data, next);
            let (genno, next) = read_uint(data, cursor)?;
            cursor = skip_ws(data, next);
            let marker = data.get(cursor).copied().unwrap_or(b'f');
            cursor += 1;

            // Some writers start the first subsection at 1 yet still emit
            // the object-0 free entry; realign so the table makes sense.
            if i == 0 && base_objid > 0 && marker == b'f' && offset == 0 && genno == 65535 {
                base_objid -= 1;
            }
            let objid = (base_objid + i) as u32;
            match marker {
                b'n' => {
                    xref.entries.insert(
                        objid,
                        XRefPos::InFile {
                            pos: offset as usize,
                            genno: genno as u32,
                        },
                    );
                }
                b'f' => {
                    xref.entries.insert(objid, XRefPos::Free);
                }
                _ => {
                    return Err(PdfError::Xref {
                        pos: Some(cursor),
                        msg: format!("invalid xref entry marker {:?}", marker as char),
                    });
                }
            }
        }
    }

    cursor = skip_ws(data, cursor);
    if data[cursor..].starts_with(b"<<") {
        let mut parser = ObjectParser::at(data, cursor);
        if let Ok(PDFObject::Dict(dict)) = parser.parse_object() {
            xref.trailer = dict;
        }
    }
    if xref.trailer.is_empty() {
        return Err(PdfError::Xref {
            pos: Some(pos),
            msg: "xref table has no trailer".into(),
        });
    }
    Ok(xref)
}

/// Cross-reference stream (`/Type /XRef`): the decoded payload is a
/// packed table of `/W`-sized (type, field2, field3) rows covering the
/// `/Index` ranges.
fn parse_xref_stream(data: &Bytes, pos: usize) -> Result<XRefSection> {
    // Xref streams predate key material, so /Length must be direct.
    let indobj = parse_indirect_object(data, pos, &|obj| match obj {
        PDFObject::Int(n) if *n >= 0 => Some(*n as usize),
        _ => None,
    })
    .map_err(|e| PdfError::Xref {
        pos: Some(pos),
        msg: format!("cannot parse xref stream: {}", e),
    })?;
    let stream = indobj.obj.as_stream().map_err(|_| PdfError::Xref {
        pos: Some(pos),
        msg: "xref offset does not point at a stream".into(),
    })?;
    match stream.get("Type") {
        Some(PDFObject::Name(name)) if name == "XRef" => {}
        _ => {
            return Err(PdfError::Xref {
                pos: Some(pos),
                msg: "stream at xref offset is not /Type /XRef".into(),
            })
        }
    }

    let w = stream
        .get("W")
        .and_then(|v| v.as_array().ok())
        .ok_or_else(|| PdfError::Xref {
            pos: Some(pos),
            msg: "xref stream missing /W".into(),
        })?;
    if w.len() < 3 {
        return Err(PdfError::Xref {
            pos: Some(pos),
            msg: "/W must have 3 elements".into(),
        });
    }
    let w0 = w[0].as_int().unwrap_or(0).max(0) as usize;
    let w1 = w[1].as_int().unwrap_or(0).max(0) as usize;
    let w2 = w[2].as_int().unwrap_or(0).max(0) as usize;
    let entry_size = w0 + w1 + w2;
    if entry_size == 0 {
        return Err(PdfError::Xref {
            pos: Some(pos),
            msg: "/W describes empty entries".into(),
        });
    }
    let size = stream
        .get("Size")
        .and_then(|v| v.as_int().ok())
        .unwrap_or(0)
        .max(0) as usize;
    let index: Vec<(u32, usize)> = match stream.get("Index").and_then(|v| v.as_array().ok()) {
        Some(arr) => arr
            .chunks(2)
            .filter_map(|pair| {
                let start = pair.first()?.as_int().ok()?;
                let count = pair.get(1)?.as_int().ok()?;
                Some((start.max(0) as u32, count.max(0) as usize))
            })
            .collect(),
        None => vec![(0, size)],
    };

    let specs = filter_specs(
        stream.get("Filter").unwrap_or(&PDFObject::Null),
        stream.get("DecodeParms"),
    );
    let decoded = decode_with_specs(stream.rawdata(), &specs).map_err(|e| PdfError::Xref {
        pos: Some(pos),
        msg: format!("cannot decode xref stream: {}", e),
    })?;

    let mut xref = XRefSection::default();
    let mut offset = 0usize;
    for (start_objid, count) in index {
        for i in 0..count {
            if offset + entry_size > decoded.len() {
                break;
            }
            let objid = start_objid + i as u32;
            let row = &decoded[offset..offset + entry_size];
            offset += entry_size;
            // A zero-width type field defaults to 1 (in use).
            let kind = nunpack(&row[..w0], 1);
            let field2 = nunpack(&row[w0..w0 + w1], 0);
            let field3 = nunpack(&row[w0 + w1..], 0);
            match kind {
                0 => {
                    xref.entries.insert(objid, XRefPos::Free);
                }
                1 => {
                    xref.entries.insert(
                        objid,
                        XRefPos::InFile {
                            pos: field2 as usize,
                            genno: field3 as u32,
                        },
                    );
                }
                2 => {
                    xref.entries.insert(
                        objid,
                        XRefPos::InStream {
                            streamid: field2 as u32,
                            index: field3 as usize,
                        },
                    );
                }
                _ => {}
            }
        }
    }

    for (key, value) in &stream.attrs {
        match key.as_str() {
            "Length" | "Filter" | "DecodeParms" | "W" | "Index" | "Type" => {}
            _ => {
                xref.trailer.insert(key.clone(), value.clone());
            }
        }
    }
    Ok(xref)
}

/// Reconstruct the xref by scanning the whole file for `N M obj`
/// markers. The synthesized trailer is the last parseable `trailer`
/// dictionary, if any.
pub fn reconstruct_xref(data: &[u8]) -> Result<XRefSection> {
    use regex::bytes::Regex;

    let mut xref = XRefSection {
        is_fallback: true,
        ..Default::default()
    };
    let re = Regex::new(r"(\d{1,10})\s+(\d{1,10})\s+obj\b").unwrap();
    for cap in re.captures_iter(data) {
        let objid: u32 = match std::str::from_utf8(&cap[1]).ok().and_then(|s| s.parse().ok()) {
            Some(v) => v,
            None => continue,
        };
        let genno: u32 = match std::str::from_utf8(&cap[2]).ok().and_then(|s| s.parse().ok()) {
            Some(v) => v,
            None => continue,
        };
        let pos = cap.get(0).map(|m| m.start()).unwrap_or(0);
        // Later definitions override earlier ones, as incremental
        // updates append to the file.
        xref.entries.insert(objid, XRefPos::InFile { pos, genno });
    }
    if xref.entries.is_empty() {
        return Err(PdfError::Xref {
            pos: None,
            msg: "no indirect objects found during reconstruction".into(),
        });
    }

    // Take the last trailer dictionary that parses.
    let mut search_end = data.len();
    while let Some(tpos) = rfind_bytes(&data[..search_end], b"trailer") {
        let cursor = skip_ws(data, tpos + b"trailer".len());
        if data[cursor..].starts_with(b"<<") {
            let mut parser = ObjectParser::at(data, cursor);
            if let Ok(PDFObject::Dict(dict)) = parser.parse_object() {
                xref.trailer = dict;
                break;
            }
        }
        search_end = tpos;
    }
    Ok(xref)
}
