//! Marked-content operators: BMC BDC EMC MP DP.

use crate::content::{ContentObject, MarkedContent, TagObject};
use crate::interp::interpreter::{Operands, PageInterpreter};
use crate::model::objects::PDFObject;
use std::collections::HashMap;

#[allow(non_snake_case)]
impl<'a> PageInterpreter<'a> {
    /// Resolve a BDC/DP properties operand: an inline dictionary or a
    /// name into the /Properties resources.
    fn resolve_props(&self, obj: Option<PDFObject>) -> Option<HashMap<String, PDFObject>> {
        match obj? {
            PDFObject::Dict(d) => Some(d),
            PDFObject::Name(name) => {
                let entry = self.resources.properties.get(&name)?;
                match self.doc.resolve(entry) {
                    PDFObject::Dict(d) => Some(d),
                    _ => None,
                }
            }
            _ => None,
        }
    }

    fn make_frame(&self, tag: String, props: Option<HashMap<String, PDFObject>>) -> MarkedContent {
        let mcid = props
            .as_ref()
            .and_then(|p| p.get("MCID"))
            .and_then(|m| m.as_int().ok());
        MarkedContent { tag, props, mcid }
    }

    /// BMC: push a frame with no properties.
    pub(crate) fn do_BMC(&mut self, args: &mut Operands) {
        if let Some(tag) = args.name() {
            let frame = self.make_frame(tag, None);
            self.mcstack.push(frame);
        }
    }

    /// BDC: push a frame with properties.
    pub(crate) fn do_BDC(&mut self, args: &mut Operands) {
        let Some(tag) = args.name() else { return };
        let props = self.resolve_props(args.take().into_iter().next());
        let frame = self.make_frame(tag, props);
        self.mcstack.push(frame);
    }

    /// EMC: pop a frame; mismatched pops are silently absorbed (with a
    /// recorded warning).
    pub(crate) fn do_EMC(&mut self, pos: usize) {
        if self.mcstack.pop().is_none() {
            self.warn("Interp", pos, "EMC without matching BMC/BDC");
        }
    }

    /// MP: a marked-content point.
    pub(crate) fn do_MP(&mut self, args: &mut Operands) {
        if let Some(tag) = args.name() {
            let frame = self.make_frame(tag, None);
            self.emit_tag(frame);
        }
    }

    /// DP: a marked-content point with properties.
    pub(crate) fn do_DP(&mut self, args: &mut Operands) {
        let Some(tag) = args.name() else { return };
        let props = self.resolve_props(args.take().into_iter().next());
        let frame = self.make_frame(tag, props);
        self.emit_tag(frame);
    }

    fn emit_tag(&mut self, tag: MarkedContent) {
        let (_, _, _, _, e, f) = self.gstate.ctm;
        let obj = TagObject {
            gstate: self.gstate.clone(),
            mcstack: self.snapshot_mcstack(),
            tag,
            // A point has no extent; anchor it at the CTM origin.
            bbox: (e, f, e, f),
        };
        self.emit(ContentObject::Tag(obj));
    }
}
