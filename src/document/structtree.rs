//! Logical structure tree (/StructTreeRoot).
//!
//! Exposes the role hierarchy and the marked-content identifiers that
//! link structure elements to page content.

use super::Document;
use crate::model::objects::PDFObject;
use std::collections::HashSet;

/// A node of the structure tree.
#[derive(Debug, Clone)]
pub struct StructElement {
    /// Structure role (/S), e.g. "P", "Span", "Table".
    pub role: String,
    /// Object number of the page (/Pg) this element's content lives on.
    pub page_objid: Option<u32>,
    /// Marked-content identifiers owned directly by this element.
    pub mcids: Vec<i64>,
    pub children: Vec<StructElement>,
}

/// The document's logical structure tree.
#[derive(Debug)]
pub struct StructTree {
    pub elements: Vec<StructElement>,
}

impl StructTree {
    /// Build the structure tree from /StructTreeRoot, or None when the
    /// document is untagged.
    pub fn from_document(doc: &Document) -> Option<StructTree> {
        let root = doc.resolve(doc.catalog().get("StructTreeRoot")?);
        let root_dict = root.as_dict().ok()?;
        let kids = root_dict.get("K")?;
        let mut seen = HashSet::new();
        let elements = parse_kids(doc, kids, &mut seen);
        Some(StructTree { elements })
    }

    /// Elements (recursively) whose content lives on the given page.
    pub fn on_page(&self, page_objid: u32) -> Vec<&StructElement> {
        let mut out = Vec::new();
        fn visit<'a>(el: &'a StructElement, page_objid: u32, out: &mut Vec<&'a StructElement>) {
            if el.page_objid == Some(page_objid) && !el.mcids.is_empty() {
                out.push(el);
            }
            for child in &el.children {
                visit(child, page_objid, out);
            }
        }
        for el in &self.elements {
            visit(el, page_objid, &mut out);
        }
        out
    }
}

/// A /K entry is an element dict, an MCID number, an MCR/OBJR dict, an
/// array of any of those, or a reference to one.
fn parse_kids(doc: &Document, kids: &PDFObject, seen: &mut HashSet<u32>) -> Vec<StructElement> {
    let mut elements = Vec::new();
    match kids {
        PDFObject::Ref(r) => {
            if seen.insert(r.objid) {
                let resolved = doc.resolve(kids);
                elements.extend(parse_kids(doc, &resolved, seen));
            }
        }
        PDFObject::Array(arr) => {
            for kid in arr {
                elements.extend(parse_kids(doc, kid, seen));
            }
        }
        PDFObject::Dict(dict) => {
            if let Some(el) = parse_element(doc, dict, seen) {
                elements.push(el);
            }
        }
        _ => {}
    }
    elements
}

fn parse_element(
    doc: &Document,
    dict: &std::collections::HashMap<String, PDFObject>,
    seen: &mut HashSet<u32>,
) -> Option<StructElement> {
    // MCR dictionaries carry a bare MCID, not a subtree.
    if matches!(dict.get("Type"), Some(PDFObject::Name(n)) if n == "MCR") {
        let mcid = doc.resolve(dict.get("MCID")?).as_int().ok()?;
        return Some(StructElement {
            role: String::new(),
            page_objid: page_objid(dict),
            mcids: vec![mcid],
            children: Vec::new(),
        });
    }
    let role = dict
        .get("S")
        .map(|s| doc.resolve(s))
        .and_then(|s| s.as_name().map(str::to_string).ok())?;
    let pg = page_objid(dict);
    let mut mcids = Vec::new();
    let mut children = Vec::new();
    if let Some(k) = dict.get("K") {
        collect_content(doc, k, pg, &mut mcids, &mut children, seen);
    }
    Some(StructElement {
        role,
        page_objid: pg,
        mcids,
        children,
    })
}

fn collect_content(
    doc: &Document,
    k: &PDFObject,
    parent_pg: Option<u32>,
    mcids: &mut Vec<i64>,
    children: &mut Vec<StructElement>,
    seen: &mut HashSet<u32>,
) {
    match k {
        PDFObject::Int(mcid) => mcids.push(*mcid),
        PDFObject::Array(arr) => {
            for item in arr {
                collect_content(doc, item, parent_pg, mcids, children, seen);
            }
        }
        PDFObject::Ref(r) => {
            if seen.insert(r.objid) {
                let resolved = doc.resolve(k);
                collect_content(doc, &resolved, parent_pg, mcids, children, seen);
            }
        }
        PDFObject::Dict(dict) => {
            if matches!(dict.get("Type"), Some(PDFObject::Name(n)) if n == "MCR") {
                if let Some(mcid) = dict.get("MCID").and_then(|m| doc.resolve(m).as_int().ok()) {
                    mcids.push(mcid);
                }
            } else if let Some(child) = parse_element(doc, dict, seen) {
                children.push(child);
            }
        }
        _ => {}
    }
}

fn page_objid(dict: &std::collections::HashMap<String, PDFObject>) -> Option<u32> {
    match dict.get("Pg") {
        Some(PDFObject::Ref(r)) => Some(r.objid),
        _ => None,
    }
}
