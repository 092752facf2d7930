//! Number trees (PDF 1.7 section 7.9.7), used by /PageLabels and the
//! structure parent tree.

use crate::document::Document;
use crate::model::objects::PDFObject;

/// A flattened number tree: sorted (key, value) pairs.
#[derive(Debug, Default)]
pub struct NumberTree {
    pub pairs: Vec<(i64, PDFObject)>,
}

impl NumberTree {
    /// Walk a number tree rooted at `root`, flattening /Kids and /Nums.
    pub fn new(doc: &Document, root: &PDFObject) -> NumberTree {
        let mut tree = NumberTree::default();
        let mut seen = std::collections::HashSet::new();
        tree.walk(doc, root, &mut seen);
        tree.pairs.sort_by_key(|(k, _)| *k);
        tree
    }

    fn walk(
        &mut self,
        doc: &Document,
        node: &PDFObject,
        seen: &mut std::collections::HashSet<u32>,
    ) {
        if let PDFObject::Ref(r) = node {
            if !seen.insert(r.objid) {
                return;
            }
        }
        let node = doc.resolve(node);
        let dict = match node.as_dict() {
            Ok(d) => d,
            Err(_) => return,
        };
        if let Some(PDFObject::Array(nums)) = dict.get("Nums").map(|n| doc.resolve(n)).as_ref() {
            for pair in nums.chunks(2) {
                if pair.len() == 2 {
                    if let Ok(key) = doc.resolve(&pair[0]).as_int() {
                        self.pairs.push((key, doc.resolve(&pair[1])));
                    }
                }
            }
        }
        if let Some(PDFObject::Array(kids)) = dict.get("Kids").map(|k| doc.resolve(k)).as_ref() {
            for kid in kids {
                self.walk(doc, kid, seen);
            }
        }
    }

    /// Value for the greatest key not exceeding `key` (range semantics,
    /// as used by /PageLabels).
    pub fn lookup_range(&self, key: i64) -> Option<&PDFObject> {
        let idx = self.pairs.partition_point(|(k, _)| *k <= key);
        idx.checked_sub(1).map(|i| &self.pairs[i].1)
    }

    /// Exact-key lookup.
    pub fn get(&self, key: i64) -> Option<&PDFObject> {
        self.pairs
            .binary_search_by_key(&key, |(k, _)| *k)
            .ok()
            .map(|i| &self.pairs[i].1)
    }
}
