//! Outline (bookmark) walker. A thin layer over the catalog's
//! /Outlines linked structure.

use super::Document;
use crate::model::objects::PDFObject;
use crate::utils::decode_text;
use std::collections::HashSet;

/// One outline entry with its nesting level and destination, if any.
#[derive(Debug, Clone)]
pub struct OutlineItem {
    pub level: usize,
    pub title: String,
    pub dest: Option<PDFObject>,
    pub action: Option<PDFObject>,
}

/// Flatten the outline tree depth-first. Sibling and child links are
/// cycle-guarded since broken writers produce self-referential chains.
pub fn parse_outlines(doc: &Document) -> Vec<OutlineItem> {
    let mut items = Vec::new();
    let outlines = match doc.catalog().get("Outlines") {
        Some(o) => doc.resolve(o),
        None => return items,
    };
    let first = match outlines.as_dict().ok().and_then(|d| d.get("First")) {
        Some(f) => f.clone(),
        None => return items,
    };
    let mut seen = HashSet::new();
    walk(doc, &first, 1, &mut seen, &mut items);
    items
}

fn walk(
    doc: &Document,
    entry: &PDFObject,
    level: usize,
    seen: &mut HashSet<u32>,
    items: &mut Vec<OutlineItem>,
) {
    let mut current = entry.clone();
    loop {
        if let PDFObject::Ref(r) = &current {
            if !seen.insert(r.objid) {
                return;
            }
        }
        let dict = match doc.resolve(&current) {
            PDFObject::Dict(d) => d,
            _ => return,
        };
        let title = dict
            .get("Title")
            .map(|t| doc.resolve(t))
            .and_then(|t| t.as_string().map(decode_text).ok())
            .unwrap_or_default();
        items.push(OutlineItem {
            level,
            title,
            dest: dict.get("Dest").cloned(),
            action: dict.get("A").cloned(),
        });
        if let Some(first) = dict.get("First") {
            walk(doc, first, level + 1, seen, items);
        }
        match dict.get("Next") {
            Some(next) => current = next.clone(),
            None => return,
        }
    }
}
