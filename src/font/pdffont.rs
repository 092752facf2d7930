//! Font resources: decoding text-showing operands into character codes,
//! widths, and Unicode.

use super::cmap::{
    parse_cmap, predefined_cid2unicode, predefined_cmap, EncodingCMap, UnicodeMap,
};
use super::encoding::{get_encoding, DiffEntry};
use crate::document::Document;
use crate::error::PdfWarning;
use crate::model::objects::PDFObject;
use crate::utils::{decode_text, Matrix, Rect};
use std::collections::HashMap;

/// Glyph displacement as consumed by bounding-box computation.
#[derive(Debug, Clone, Copy)]
pub enum CharDisp {
    /// Horizontal writing: no extra displacement.
    Horizontal,
    /// Vertical writing: (vx, vy) in glyph units; a missing vx means
    /// half the font size.
    Vertical(Option<f64>, f64),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FontKind {
    Type1,
    TrueType,
    Type3,
    MMType1,
    Type0,
    Unknown,
}

/// A font resource, simple or composite, reduced to the operations the
/// interpreter needs: code decoding, widths, and Unicode mapping.
#[derive(Debug)]
pub struct Font {
    pub kind: FontKind,
    pub basefont: Option<String>,
    pub fontname: Option<String>,
    multibyte: bool,
    vertical: bool,
    widths: HashMap<u32, f64>,
    default_width: f64,
    /// Byte-code to Unicode for simple fonts with a known encoding.
    code2unicode: Option<HashMap<u8, String>>,
    /// The font's /ToUnicode CMap. Takes precedence over everything.
    tounicode: Option<UnicodeMap>,
    /// Predefined CID-system fallback table, consulted last.
    system_unicode: Option<UnicodeMap>,
    /// Encoding CMap for composite fonts.
    cmap: Option<EncodingCMap>,
    disps: HashMap<u32, (Option<f64>, f64)>,
    default_disp: (Option<f64>, f64),
    descent: f64,
    ascent: f64,
    pub fontbbox: Option<Rect>,
    /// Type3 glyph-space transform.
    pub matrix: Option<Matrix>,
    hscale: f64,
}

impl Font {
    /// Build a font from its resource dictionary.
    pub fn from_spec(doc: &Document, spec: &HashMap<String, PDFObject>) -> Font {
        let subtype = spec
            .get("Subtype")
            .map(|s| doc.resolve(s))
            .and_then(|s| s.as_name().map(str::to_string).ok());
        let kind = match subtype.as_deref() {
            Some("Type1") => FontKind::Type1,
            Some("TrueType") => FontKind::TrueType,
            Some("Type3") => FontKind::Type3,
            Some("MMType1") => FontKind::MMType1,
            Some("Type0") => FontKind::Type0,
            other => {
                doc.warn(PdfWarning::new(
                    "Font",
                    None,
                    format!("unknown font subtype {:?}", other),
                ));
                FontKind::Unknown
            }
        };
        match kind {
            FontKind::Type0 => Self::composite(doc, spec),
            _ => Self::simple(doc, spec, kind),
        }
    }

    fn base(kind: FontKind) -> Font {
        Font {
            kind,
            basefont: None,
            fontname: None,
            multibyte: false,
            vertical: false,
            widths: HashMap::new(),
            default_width: 0.0,
            code2unicode: None,
            tounicode: None,
            system_unicode: None,
            cmap: None,
            disps: HashMap::new(),
            default_disp: (None, 880.0),
            descent: 0.0,
            ascent: 0.0,
            fontbbox: None,
            matrix: None,
            hscale: 0.001,
        }
    }

    fn load_descriptor(&mut self, doc: &Document, spec: &HashMap<String, PDFObject>) {
        let descriptor = match spec.get("FontDescriptor").map(|d| doc.resolve(d)) {
            Some(PDFObject::Dict(d)) => d,
            _ => HashMap::new(),
        };
        self.fontname = descriptor
            .get("FontName")
            .and_then(|n| n.as_name().map(str::to_string).ok());
        self.descent = descriptor
            .get("Descent")
            .and_then(|d| doc.resolve(d).as_num().ok())
            .unwrap_or(0.0);
        // A positive Descent is a writer bug; flip it below the baseline.
        if self.descent > 0.0 {
            self.descent = -self.descent;
        }
        self.ascent = descriptor
            .get("Ascent")
            .and_then(|a| doc.resolve(a).as_num().ok())
            .unwrap_or(0.0);
        self.fontbbox = descriptor
            .get("FontBBox")
            .map(|b| doc.resolve(b))
            .and_then(|b| {
                let arr = b.as_array().ok()?;
                if arr.len() < 4 {
                    return None;
                }
                Some((
                    doc.resolve(&arr[0]).as_num().ok()?,
                    doc.resolve(&arr[1]).as_num().ok()?,
                    doc.resolve(&arr[2]).as_num().ok()?,
                    doc.resolve(&arr[3]).as_num().ok()?,
                ))
            });
        if self.default_width == 0.0 {
            self.default_width = descriptor
                .get("MissingWidth")
                .and_then(|w| doc.resolve(w).as_num().ok())
                .unwrap_or(0.0);
        }
    }

    fn load_tounicode(&mut self, doc: &Document, spec: &HashMap<String, PDFObject>) {
        if let Some(tu) = spec.get("ToUnicode") {
            if let PDFObject::Stream(stream) = doc.resolve(tu) {
                let data = doc.decode_stream(&stream);
                let parsed = parse_cmap(&data);
                if !parsed.unicode.is_empty() {
                    self.tounicode = Some(parsed.unicode);
                }
            }
        }
    }

    fn simple(doc: &Document, spec: &HashMap<String, PDFObject>, kind: FontKind) -> Font {
        let mut font = Self::base(kind);
        font.basefont = spec
            .get("BaseFont")
            .map(|b| doc.resolve(b))
            .and_then(|b| b.as_name().map(str::to_string).ok());

        // Widths indexed from /FirstChar.
        let first_char = spec
            .get("FirstChar")
            .and_then(|f| doc.resolve(f).as_int().ok())
            .unwrap_or(0);
        if let Some(PDFObject::Array(widths)) = spec.get("Widths").map(|w| doc.resolve(w)) {
            for (i, w) in widths.iter().enumerate() {
                if let Ok(width) = doc.resolve(w).as_num() {
                    let code = first_char + i as i64;
                    if code >= 0 {
                        font.widths.insert(code as u32, width);
                    }
                }
            }
        }
        font.load_descriptor(doc, spec);

        if kind == FontKind::Type3 {
            font.load_type3_metrics(doc, spec);
        }

        // A font of unknown subtype maps nothing: fabricating Unicode
        // from bare codes corrupts downstream extraction.
        if kind == FontKind::Unknown {
            return font;
        }

        // Encoding: a name, or a dictionary with /BaseEncoding and
        // /Differences. Symbol and ZapfDingbats resolve through the
        // glyph table when spelled as /Differences; their built-in
        // encodings are not reconstructed from font programs here.
        let implicit = match font.basefont.as_deref() {
            Some(name) if name.contains("Symbol") || name.contains("Dingbats") => None,
            _ => Some("StandardEncoding"),
        };
        let encoding = spec.get("Encoding").map(|e| doc.resolve(e));
        font.code2unicode = match encoding {
            Some(PDFObject::Name(name)) => Some(get_encoding(&name, None)),
            Some(PDFObject::Dict(dict)) => {
                let base = dict
                    .get("BaseEncoding")
                    .and_then(|b| b.as_name().map(str::to_string).ok())
                    .or_else(|| implicit.map(str::to_string));
                let differences = dict.get("Differences").map(|d| doc.resolve(d)).map(|d| {
                    let mut entries = Vec::new();
                    if let Ok(arr) = d.as_array() {
                        for item in arr {
                            match doc.resolve(item) {
                                PDFObject::Int(n) if (0..=255).contains(&n) => {
                                    entries.push(DiffEntry::Code(n as u8))
                                }
                                PDFObject::Name(name) => entries.push(DiffEntry::Name(name)),
                                _ => {}
                            }
                        }
                    }
                    entries
                });
                Some(get_encoding(
                    base.as_deref().unwrap_or("StandardEncoding"),
                    differences.as_deref(),
                ))
            }
            _ => implicit.map(|name| get_encoding(name, None)),
        };
        font.load_tounicode(doc, spec);
        font
    }

    fn load_type3_metrics(&mut self, doc: &Document, spec: &HashMap<String, PDFObject>) {
        if let Some(PDFObject::Array(m)) = spec.get("FontMatrix").map(|m| doc.resolve(m)) {
            if m.len() >= 6 {
                let vals: Vec<f64> = m
                    .iter()
                    .map(|v| doc.resolve(v).as_num().unwrap_or(0.0))
                    .collect();
                let matrix = (vals[0], vals[1], vals[2], vals[3], vals[4], vals[5]);
                self.matrix = Some(matrix);
                // Glyph space scale comes from the matrix, not /1000.
                let (hs, _) = crate::utils::apply_matrix_norm(matrix, (1.0, 1.0));
                self.hscale = hs.abs();
            }
        }
        if let Some(PDFObject::Array(bbox)) = spec.get("FontBBox").map(|b| doc.resolve(b)) {
            if bbox.len() >= 4 {
                let vals: Vec<f64> = bbox
                    .iter()
                    .map(|v| doc.resolve(v).as_num().unwrap_or(0.0))
                    .collect();
                self.fontbbox = Some((vals[0], vals[1], vals[2], vals[3]));
                self.descent = vals[1];
                self.ascent = vals[3];
            }
        }
    }

    fn composite(doc: &Document, spec: &HashMap<String, PDFObject>) -> Font {
        let mut font = Self::base(FontKind::Type0);
        font.multibyte = true;
        font.basefont = spec
            .get("BaseFont")
            .map(|b| doc.resolve(b))
            .and_then(|b| b.as_name().map(str::to_string).ok());

        // The encoding CMap: a predefined name or an embedded stream.
        let encoding = spec.get("Encoding").map(|e| doc.resolve(e));
        font.cmap = match &encoding {
            Some(PDFObject::Name(name)) => match predefined_cmap(name) {
                Some(cmap) => Some(cmap),
                None => {
                    doc.warn(PdfWarning::new(
                        "Font",
                        None,
                        format!("unknown predefined CMap /{}, using Identity", name),
                    ));
                    Some(EncodingCMap::Identity {
                        vertical: name.ends_with('V'),
                    })
                }
            },
            Some(PDFObject::Stream(stream)) => {
                let data = doc.decode_stream(stream);
                let parsed = parse_cmap(&data);
                let mut cmap = parsed.cmap;
                if let Some(base_name) = &parsed.usecmap {
                    if let Some(EncodingCMap::Explicit(base)) = predefined_cmap(base_name) {
                        cmap.use_cmap(&base);
                    }
                }
                Some(EncodingCMap::Explicit(cmap))
            }
            _ => Some(EncodingCMap::Identity { vertical: false }),
        };
        font.vertical = font.cmap.as_ref().map(|c| c.is_vertical()).unwrap_or(false);

        // Metrics live on the single descendant CIDFont.
        let descendant = spec
            .get("DescendantFonts")
            .map(|d| doc.resolve(d))
            .and_then(|d| {
                d.as_array()
                    .ok()
                    .and_then(|arr| arr.first().map(|f| doc.resolve(f)))
            })
            .and_then(|f| f.as_dict().cloned().ok())
            .unwrap_or_default();

        if font.vertical {
            let (widths2, disps) = get_widths2(
                doc,
                descendant
                    .get("W2")
                    .map(|w| doc.resolve(w))
                    .as_ref()
                    .and_then(|w| w.as_array().ok())
                    .unwrap_or(&[]),
            );
            font.widths = widths2;
            font.disps = disps;
            let (vy, w) = match descendant.get("DW2").map(|d| doc.resolve(d)) {
                Some(PDFObject::Array(arr)) if arr.len() >= 2 => (
                    doc.resolve(&arr[0]).as_num().unwrap_or(880.0),
                    doc.resolve(&arr[1]).as_num().unwrap_or(-1000.0),
                ),
                _ => (880.0, -1000.0),
            };
            font.default_disp = (None, vy);
            font.default_width = w;
        } else {
            font.widths = get_widths(
                doc,
                descendant
                    .get("W")
                    .map(|w| doc.resolve(w))
                    .as_ref()
                    .and_then(|w| w.as_array().ok())
                    .unwrap_or(&[]),
            );
            font.default_width = descendant
                .get("DW")
                .and_then(|d| doc.resolve(d).as_num().ok())
                .unwrap_or(1000.0);
        }
        font.load_descriptor(doc, &descendant);
        font.load_tounicode(doc, spec);

        // Predefined CID-system table, a fallback only (ToUnicode wins).
        if font.tounicode.is_none() {
            if let Some(PDFObject::Dict(info)) =
                descendant.get("CIDSystemInfo").map(|i| doc.resolve(i))
            {
                let registry = info
                    .get("Registry")
                    .map(|r| doc.resolve(r))
                    .and_then(|r| r.as_string().map(decode_text).ok())
                    .unwrap_or_default();
                let ordering = info
                    .get("Ordering")
                    .map(|o| doc.resolve(o))
                    .and_then(|o| o.as_string().map(decode_text).ok())
                    .unwrap_or_default();
                font.system_unicode =
                    predefined_cid2unicode(registry.trim(), ordering.trim());
            }
        }
        font
    }

    pub fn is_vertical(&self) -> bool {
        self.vertical
    }

    pub fn is_multibyte(&self) -> bool {
        self.multibyte
    }

    /// Font descent in glyph units (negative, below the baseline).
    pub fn descent(&self) -> f64 {
        self.descent
    }

    pub fn ascent(&self) -> f64 {
        self.ascent
    }

    /// Decode a text-showing operand into (cid, unicode) pairs.
    ///
    /// The Unicode resolution order is: the font's ToUnicode CMap, then
    /// a known simple encoding, then a predefined CID-system table, and
    /// otherwise None. No characters are fabricated from bare codes.
    pub fn decode(&self, data: &[u8]) -> Vec<(u32, Option<String>)> {
        match &self.cmap {
            Some(cmap) => cmap
                .decode(data)
                .into_iter()
                .map(|(code, cid)| (cid, self.unicode_for(code, cid)))
                .collect(),
            None => data
                .iter()
                .map(|&b| (b as u32, self.unicode_for(b as u32, b as u32)))
                .collect(),
        }
    }

    fn unicode_for(&self, code: u32, cid: u32) -> Option<String> {
        if let Some(tounicode) = &self.tounicode {
            if let Some(text) = tounicode.get(code) {
                return Some(text);
            }
        }
        if let Some(encoding) = &self.code2unicode {
            if code <= 0xFF {
                if let Some(text) = encoding.get(&(code as u8)) {
                    return Some(text.clone());
                }
            }
        }
        if let Some(system) = &self.system_unicode {
            if let Some(text) = system.get(cid) {
                return Some(text);
            }
        }
        None
    }

    /// Width of a glyph in text space units (glyph units scaled by the
    /// font's horizontal scale, 1/1000 except for Type3).
    pub fn char_width(&self, cid: u32) -> f64 {
        match self.widths.get(&cid) {
            Some(width) => width * self.hscale,
            None => self.default_width * self.hscale,
        }
    }

    /// Displacement for vertical-mode glyph boxes.
    pub fn char_disp(&self, cid: u32) -> CharDisp {
        if !self.vertical {
            return CharDisp::Horizontal;
        }
        let (vx, vy) = self.disps.get(&cid).copied().unwrap_or(self.default_disp);
        CharDisp::Vertical(vx, vy)
    }
}

/// Parse a composite font /W array: `[c [w1 w2 ...]]` runs and
/// `[c1 c2 w]` ranges.
pub fn get_widths(doc: &Document, seq: &[PDFObject]) -> HashMap<u32, f64> {
    let mut widths = HashMap::new();
    let mut run: Vec<f64> = Vec::new();
    for item in seq {
        match doc.resolve(item) {
            PDFObject::Array(arr) => {
                if let Some(start) = run.pop() {
                    for (i, w) in arr.iter().enumerate() {
                        if let Ok(width) = doc.resolve(w).as_num() {
                            widths.insert(start as u32 + i as u32, width);
                        }
                    }
                }
                run.clear();
            }
            other => {
                if let Ok(n) = other.as_num() {
                    run.push(n);
                    if run.len() == 3 {
                        let (c1, c2, w) = (run[0] as u32, run[1] as u32, run[2]);
                        for cid in c1..=c2.max(c1) {
                            widths.insert(cid, w);
                        }
                        run.clear();
                    }
                }
            }
        }
    }
    widths
}

/// Parse a /W2 array for vertical fonts: runs of (w1y, vx, vy) triples
/// or `[c1 c2 w1y vx vy]` ranges. Returns (widths, displacements).
#[allow(clippy::type_complexity)]
pub fn get_widths2(
    doc: &Document,
    seq: &[PDFObject],
) -> (HashMap<u32, f64>, HashMap<u32, (Option<f64>, f64)>) {
    let mut widths = HashMap::new();
    let mut disps = HashMap::new();
    let mut run: Vec<f64> = Vec::new();
    for item in seq {
        match doc.resolve(item) {
            PDFObject::Array(arr) => {
                if let Some(start) = run.pop() {
                    let values: Vec<f64> = arr
                        .iter()
                        .filter_map(|v| doc.resolve(v).as_num().ok())
                        .collect();
                    for (i, triple) in values.chunks(3).enumerate() {
                        if let [w, vx, vy] = triple {
                            let cid = start as u32 + i as u32;
                            widths.insert(cid, *w);
                            disps.insert(cid, (Some(*vx), *vy));
                        }
                    }
                }
                run.clear();
            }
            other => {
                if let Ok(n) = other.as_num() {
                    run.push(n);
                    if run.len() == 5 {
                        let (c1, c2) = (run[0] as u32, run[1] as u32);
                        let (w, vx, vy) = (run[2], run[3], run[4]);
                        for cid in c1..=c2.max(c1) {
                            widths.insert(cid, w);
                            disps.insert(cid, (Some(vx), vy));
                        }
                        run.clear();
                    }
                }
            }
        }
    }
    (widths, disps)
}
