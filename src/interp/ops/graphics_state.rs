//! Graphics-state operators: q, Q, cm, d, ri, gs.

use crate::interp::interpreter::PageInterpreter;
use crate::model::objects::PDFObject;
use crate::model::state::DashPattern;
use crate::utils::{mult_matrix, Matrix};

#[allow(non_snake_case)]
impl<'a> PageInterpreter<'a> {
    /// q: push the graphics state. Saves nest to unbounded depth but
    /// must balance within the stream.
    pub(crate) fn do_q(&mut self) {
        self.gstack.push(self.gstate.clone());
    }

    /// Q: pop the graphics state. A pop on an empty stack is absorbed
    /// with a warning.
    pub(crate) fn do_Q(&mut self, pos: usize) {
        match self.gstack.pop() {
            Some(saved) => self.gstate = saved,
            None => self.warn("Interp", pos, "restore (Q) without matching save (q)"),
        }
    }

    /// cm: concatenate a matrix onto the CTM.
    pub(crate) fn do_cm(&mut self, m: Matrix) {
        self.gstate.ctm = mult_matrix(m, self.gstate.ctm);
    }

    /// d: dash pattern (array, phase).
    pub(crate) fn do_d(&mut self, operands: Vec<PDFObject>) {
        if operands.len() < 2 {
            return;
        }
        let dash = match &operands[0] {
            PDFObject::Array(arr) => arr.iter().filter_map(|v| v.as_num().ok()).collect(),
            _ => Vec::new(),
        };
        let phase = operands[1].as_num().unwrap_or(0.0);
        self.gstate.dash = DashPattern { dash, phase };
    }

    /// ri: rendering intent.
    pub(crate) fn do_ri(&mut self, operands: Vec<PDFObject>) {
        if let Some(PDFObject::Name(name)) = operands.into_iter().next() {
            self.gstate.intent = Some(name);
        }
    }

    /// gs: apply an /ExtGState resource. Only the parameters tracked by
    /// the graphics state are consulted.
    pub(crate) fn do_gs(&mut self, operands: Vec<PDFObject>) {
        let Some(PDFObject::Name(name)) = operands.into_iter().next() else {
            return;
        };
        let Some(entry) = self.resources.extgstates.get(&name).cloned() else {
            return;
        };
        let dict = match self.doc.resolve(&entry) {
            PDFObject::Dict(d) => d,
            _ => return,
        };
        if let Some(lw) = dict.get("LW").and_then(|v| v.as_num().ok()) {
            self.gstate.linewidth = lw;
        }
        if let Some(lc) = dict.get("LC").and_then(|v| v.as_int().ok()) {
            self.gstate.linecap = Some(lc);
        }
        if let Some(lj) = dict.get("LJ").and_then(|v| v.as_int().ok()) {
            self.gstate.linejoin = Some(lj);
        }
        if let Some(ml) = dict.get("ML").and_then(|v| v.as_num().ok()) {
            self.gstate.miterlimit = Some(ml);
        }
        if let Some(fl) = dict.get("FL").and_then(|v| v.as_num().ok()) {
            self.gstate.flatness = Some(fl);
        }
        if let Some(PDFObject::Array(d)) = dict.get("D").map(|v| self.doc.resolve(v)) {
            if d.len() >= 2 {
                let dash = match self.doc.resolve(&d[0]) {
                    PDFObject::Array(arr) => arr.iter().filter_map(|v| v.as_num().ok()).collect(),
                    _ => Vec::new(),
                };
                let phase = self.doc.resolve(&d[1]).as_num().unwrap_or(0.0);
                self.gstate.dash = DashPattern { dash, phase };
            }
        }
        // /Font is [fontref size].
        if let Some(PDFObject::Array(f)) = dict.get("Font").map(|v| self.doc.resolve(v)) {
            if f.len() >= 2 {
                let objid = match &f[0] {
                    PDFObject::Ref(r) => Some(r.objid),
                    _ => None,
                };
                if let Ok(spec) = self.doc.resolve(&f[0]).as_dict() {
                    let font = self.doc.get_font(objid, spec);
                    let size = self.doc.resolve(&f[1]).as_num().unwrap_or(0.0);
                    self.record(crate::content::TextItem::SetFont(font, size));
                }
            }
        }
    }
}
