//! The page tree: traversal with attribute inheritance, page labels,
//! and the `Page` access surface.

use super::Document;
use crate::content::ContentObject;
use crate::data_structures::NumberTree;
use crate::error::PdfWarning;
use crate::interp::interpreter::PageInterpreter;
use crate::model::objects::{PDFObject, PDFStream};
use crate::parser::lexer::{Lexer, Token};
use crate::utils::{format_letters, format_roman, mult_matrix, normalize_rect, Matrix, Rect};
use std::collections::{HashMap, HashSet};

/// Attributes a page inherits from the nearest ancestor that defines
/// them.
const INHERITABLE: [&str; 4] = ["Resources", "MediaBox", "CropBox", "Rotate"];

/// One page of the document, with inherited attributes resolved.
pub struct Page<'a> {
    doc: &'a Document,
    /// Object number of the page dictionary in the page tree.
    pub pageid: u32,
    /// 0-based index in the document.
    pub page_idx: usize,
    /// Label computed from /PageLabels, if the document defines any.
    pub label: Option<String>,
    pub attrs: HashMap<String, PDFObject>,
    pub mediabox: Rect,
    pub cropbox: Rect,
    /// Clockwise rotation in degrees, normalized to 0/90/180/270.
    pub rotate: i64,
    pub resources: HashMap<String, PDFObject>,
    /// Transformation from default user space to device space (y up,
    /// origin at the MediaBox lower-left, rotation applied).
    pub ctm: Matrix,
}

impl<'a> Page<'a> {
    fn new(
        doc: &'a Document,
        pageid: u32,
        attrs: HashMap<String, PDFObject>,
        label: Option<String>,
        page_idx: usize,
    ) -> Page<'a> {
        let resources = match attrs.get("Resources").map(|r| doc.resolve(r)) {
            Some(PDFObject::Dict(d)) => d,
            _ => HashMap::new(),
        };
        let mediabox = match attrs.get("MediaBox").and_then(|b| parse_rect(doc, b)) {
            Some(rect) => normalize_rect(rect),
            None => {
                doc.warn(PdfWarning::new(
                    "Parse",
                    None,
                    format!(
                        "MediaBox missing from page {} (and not inherited), defaulting to US Letter",
                        pageid
                    ),
                ));
                (0.0, 0.0, 612.0, 792.0)
            }
        };
        let cropbox = attrs
            .get("CropBox")
            .and_then(|b| parse_rect(doc, b))
            .map(normalize_rect)
            .unwrap_or(mediabox);
        let rotate = attrs
            .get("Rotate")
            .map(|r| doc.resolve(r))
            .and_then(|r| r.as_int().ok())
            .map(|r| (r % 360 + 360) % 360)
            .unwrap_or(0);

        let (x0, y0, x1, y1) = mediabox;
        let width = x1 - x0;
        let height = y1 - y0;
        // Device space: origin at the MediaBox lower-left, y upward.
        let mut ctm = (1.0, 0.0, 0.0, 1.0, -x0, -y0);
        match rotate {
            90 => ctm = mult_matrix((0.0, -1.0, 1.0, 0.0, 0.0, width), ctm),
            180 => ctm = mult_matrix((-1.0, 0.0, 0.0, -1.0, width, height), ctm),
            270 => ctm = mult_matrix((0.0, 1.0, -1.0, 0.0, height, 0.0), ctm),
            _ => {}
        }

        Page {
            doc,
            pageid,
            page_idx,
            label,
            attrs,
            mediabox,
            cropbox,
            rotate,
            resources,
            ctm,
        }
    }

    pub fn doc(&self) -> &'a Document {
        self.doc
    }

    pub fn width(&self) -> f64 {
        self.mediabox.2 - self.mediabox.0
    }

    pub fn height(&self) -> f64 {
        self.mediabox.3 - self.mediabox.1
    }

    /// The raw content streams named by /Contents, in array order.
    pub fn contents(&self) -> Vec<PDFStream> {
        let mut streams = Vec::new();
        let contents = match self.attrs.get("Contents") {
            Some(c) => self.doc.resolve(c),
            None => return streams,
        };
        match contents {
            PDFObject::Stream(s) => streams.push(*s),
            PDFObject::Array(arr) => {
                for item in arr {
                    if let PDFObject::Stream(s) = self.doc.resolve(&item) {
                        streams.push(*s);
                    }
                }
            }
            _ => {}
        }
        streams
    }

    /// Decoded content, with the streams concatenated in /Contents
    /// order. Streams are separated by a newline since a token may not
    /// span a stream boundary.
    pub fn content_bytes(&self) -> Vec<u8> {
        let mut data = Vec::new();
        for stream in self.contents() {
            if !data.is_empty() {
                data.push(b'\n');
            }
            data.extend_from_slice(&self.doc.decode_stream(&stream));
        }
        data
    }

    /// Tokenize the page's decoded content streams.
    pub fn tokens(&self) -> PageTokens {
        PageTokens {
            data: self.content_bytes(),
            pos: 0,
        }
    }

    /// Lazily interpret the content streams, yielding typed content
    /// objects in stream order. Abandoning the iterator releases all
    /// transient state; it is not restartable.
    pub fn objects(&self) -> PageInterpreter<'a> {
        PageInterpreter::for_page(self)
    }

    /// Warnings recorded on the document, including those produced
    /// while interpreting this page.
    pub fn warnings(&self) -> Vec<PdfWarning> {
        self.doc.warnings()
    }

    /// Collect every content object on the page.
    pub fn flatten(&self) -> Vec<ContentObject> {
        self.objects().collect()
    }
}

/// Owning token iterator over a page's decoded content.
pub struct PageTokens {
    data: Vec<u8>,
    pos: usize,
}

impl Iterator for PageTokens {
    type Item = Token;

    fn next(&mut self) -> Option<Token> {
        let mut lexer = Lexer::at(&self.data, self.pos);
        loop {
            match lexer.next_token()? {
                Ok((_, token)) => {
                    self.pos = lexer.tell();
                    return Some(token);
                }
                Err(_) => continue,
            }
        }
    }
}

fn parse_rect(doc: &Document, obj: &PDFObject) -> Option<Rect> {
    let resolved = doc.resolve(obj);
    let arr = resolved.as_array().ok()?;
    if arr.len() < 4 {
        return None;
    }
    let mut vals = [0.0f64; 4];
    for (i, item) in arr.iter().take(4).enumerate() {
        vals[i] = doc.resolve(item).as_num().ok()?;
    }
    Some((vals[0], vals[1], vals[2], vals[3]))
}

/// The document's pages in tree order, addressable by index, label, or
/// 1-based logical page number.
pub struct PageList<'a> {
    pages: Vec<Page<'a>>,
}

impl<'a> PageList<'a> {
    pub(crate) fn new(doc: &'a Document) -> PageList<'a> {
        let found = walk_page_tree(doc);
        let labels = PageLabels::new(doc);
        let pages = found
            .into_iter()
            .enumerate()
            .map(|(idx, (pageid, attrs))| {
                let label = labels.as_ref().map(|l| l.label_for(idx));
                Page::new(doc, pageid, attrs, label, idx)
            })
            .collect();
        PageList { pages }
    }

    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    pub fn get(&self, idx: usize) -> Option<&Page<'a>> {
        self.pages.get(idx)
    }

    /// Look up a page by label, falling back to interpreting the key as
    /// a 1-based logical page number.
    pub fn by_label(&self, key: &str) -> Option<&Page<'a>> {
        if let Some(page) = self
            .pages
            .iter()
            .find(|p| p.label.as_deref() == Some(key))
        {
            return Some(page);
        }
        let number: usize = key.parse().ok()?;
        self.pages.get(number.checked_sub(1)?)
    }

    /// Look up a page by the object number of its page dictionary.
    pub fn by_id(&self, pageid: u32) -> Option<&Page<'a>> {
        self.pages.iter().find(|p| p.pageid == pageid)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Page<'a>> {
        self.pages.iter()
    }
}

impl<'a> std::ops::Index<usize> for PageList<'a> {
    type Output = Page<'a>;

    fn index(&self, idx: usize) -> &Page<'a> {
        &self.pages[idx]
    }
}

impl<'a, 'b> IntoIterator for &'b PageList<'a> {
    type Item = &'b Page<'a>;
    type IntoIter = std::slice::Iter<'b, Page<'a>>;

    fn into_iter(self) -> Self::IntoIter {
        self.pages.iter()
    }
}

/// Depth-first, left-to-right walk of the page tree, accumulating
/// inheritable attributes. Falls back to collecting /Type /Page objects
/// in xref order when the tree is broken.
fn walk_page_tree(doc: &Document) -> Vec<(u32, HashMap<String, PDFObject>)> {
    let mut pages = Vec::new();
    let root = match doc.catalog().get("Pages") {
        Some(p) => p.clone(),
        None => {
            doc.warn(PdfWarning::new("Parse", None, "catalog has no /Pages"));
            return pages_from_objects(doc);
        }
    };

    let mut visited: HashSet<u32> = HashSet::new();
    // Stack of (node, inherited attributes).
    let mut stack: Vec<(PDFObject, HashMap<String, PDFObject>)> = vec![(root, HashMap::new())];
    while let Some((node, inherited)) = stack.pop() {
        let objid = match &node {
            PDFObject::Ref(r) => {
                if !visited.insert(r.objid) {
                    continue;
                }
                Some(r.objid)
            }
            _ => None,
        };
        let resolved = doc.resolve(&node);
        let dict = match resolved.as_dict() {
            Ok(d) => d,
            Err(_) => continue,
        };
        let node_type = dict.get("Type").and_then(|t| t.as_name().ok());
        let is_node = node_type == Some("Pages") || dict.contains_key("Kids");
        if is_node {
            let mut passed = inherited;
            for key in INHERITABLE {
                if let Some(value) = dict.get(key) {
                    passed.insert(key.to_string(), value.clone());
                }
            }
            if let Some(PDFObject::Array(kids)) = dict.get("Kids").map(|k| doc.resolve(k)) {
                // Reversed, so the leftmost child pops first.
                for kid in kids.into_iter().rev() {
                    stack.push((kid, passed.clone()));
                }
            }
        } else {
            let mut attrs = dict.clone();
            for (key, value) in inherited {
                attrs.entry(key).or_insert(value);
            }
            pages.push((objid.unwrap_or(0), attrs));
        }
    }

    if pages.is_empty() {
        pages_from_objects(doc)
    } else {
        pages
    }
}

/// Collect /Type /Page dictionaries in object-number order.
fn pages_from_objects(doc: &Document) -> Vec<(u32, HashMap<String, PDFObject>)> {
    let mut pages = Vec::new();
    for objid in doc.objids() {
        let obj = doc.getobj(objid);
        if let Ok(dict) = obj.as_dict() {
            if matches!(dict.get("Type"), Some(PDFObject::Name(n)) if n == "Page") {
                pages.push((objid, dict.clone()));
            }
        }
    }
    pages
}

/// Page label ranges from the catalog's /PageLabels number tree.
struct PageLabels {
    /// (first page index, prefix, style, start number)
    ranges: Vec<(usize, String, Option<char>, u64)>,
}

impl PageLabels {
    fn new(doc: &Document) -> Option<PageLabels> {
        let root = doc.catalog().get("PageLabels")?.clone();
        let tree = NumberTree::new(doc, &root);
        if tree.pairs.is_empty() {
            return None;
        }
        let mut ranges = Vec::new();
        for (index, value) in &tree.pairs {
            let dict = match doc.resolve(value) {
                PDFObject::Dict(d) => d,
                _ => continue,
            };
            let prefix = dict
                .get("P")
                .and_then(|p| p.as_string().ok().map(crate::utils::decode_text))
                .unwrap_or_default();
            let style = dict
                .get("S")
                .and_then(|s| s.as_name().ok())
                .and_then(|s| s.chars().next());
            let start = dict
                .get("St")
                .and_then(|s| s.as_int().ok())
                .filter(|&n| n >= 1)
                .unwrap_or(1) as u64;
            ranges.push(((*index).max(0) as usize, prefix, style, start));
        }
        Some(PageLabels { ranges })
    }

    fn label_for(&self, page_idx: usize) -> String {
        let range_idx = self
            .ranges
            .partition_point(|(start, _, _, _)| *start <= page_idx);
        let Some((start_idx, prefix, style, start_no)) =
            range_idx.checked_sub(1).map(|i| &self.ranges[i])
        else {
            // Before the first range: 1-based decimal, as readers do.
            return format!("{}", page_idx + 1);
        };
        let value = start_no + (page_idx - start_idx) as u64;
        let formatted = match style {
            Some('D') => format!("{}", value),
            Some('R') => format_roman(value),
            Some('r') => format_roman(value).to_lowercase(),
            Some('A') => format_letters(value),
            Some('a') => format_letters(value).to_lowercase(),
            _ => String::new(),
        };
        format!("{}{}", prefix, formatted)
    }
}
