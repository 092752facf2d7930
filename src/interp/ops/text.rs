//! Text operators.
//!
//! State changes and showing operators between BT and ET are recorded
//! as items on the pending text object; the object is emitted at ET and
//! replays them to place glyphs.

use crate::content::{ContentObject, TJItem, TextItem, TextObject};
use crate::interp::interpreter::{Operands, PageInterpreter};
use crate::model::objects::PDFObject;

#[allow(non_snake_case)]
impl<'a> PageInterpreter<'a> {
    /// BT: begin a text object; text and line matrices reset to
    /// identity. Text objects do not nest.
    pub(crate) fn do_BT(&mut self) {
        if self.in_text {
            // Recover from a missing ET by closing the previous object.
            self.do_ET();
        }
        self.in_text = true;
        self.tstate.reset();
        self.text_start_state = self.tstate.clone();
        self.text_items.clear();
    }

    /// ET: end the text object, emitting it if it shows any text. The
    /// matrices cease to exist outside BT..ET; other text-state
    /// parameters persist.
    pub(crate) fn do_ET(&mut self) {
        self.in_text = false;
        let items = std::mem::take(&mut self.text_items);
        if items
            .iter()
            .any(|item| matches!(item, TextItem::Show(_)))
        {
            let obj = TextObject {
                gstate: self.gstate.clone(),
                mcstack: self.snapshot_mcstack(),
                textstate: self.text_start_state.clone(),
                items,
            };
            self.emit(ContentObject::Text(obj));
        }
    }

    /// Tf: select font and size from the /Font resources.
    pub(crate) fn do_Tf(&mut self, args: &mut Operands) {
        let (Some(name), Some(size)) = (args.name(), args.num()) else {
            return;
        };
        let cached = self.fontmap.get(&name).cloned();
        let font = if let Some(font) = cached {
            font
        } else {
            let Some(entry) = self.resources.fonts.get(&name).cloned() else {
                self.warn(
                    "Font",
                    args.pos(),
                    format!("undefined font resource /{}", name),
                );
                return;
            };
            let objid = match &entry {
                PDFObject::Ref(r) => Some(r.objid),
                _ => None,
            };
            let spec = match self.doc.resolve(&entry) {
                PDFObject::Dict(d) => d,
                _ => return,
            };
            let font = self.doc.get_font(objid, &spec);
            self.fontmap.insert(name.clone(), font.clone());
            font
        };
        self.tstate.fontname = Some(name);
        self.record(TextItem::SetFont(font, size));
    }

    /// Tr: text rendering mode 0-7.
    pub(crate) fn do_Tr(&mut self, args: &mut Operands) {
        if let Some(mode) = args.int() {
            self.record(TextItem::Render(mode));
        }
    }

    /// Td: move to the start of the next line, offset (tx, ty).
    pub(crate) fn do_Td(&mut self, args: &mut Operands) {
        if let (Some(tx), Some(ty)) = (args.num(), args.num()) {
            self.record(TextItem::Move(tx, ty));
        }
    }

    /// TD: like Td but also sets the leading to -ty.
    pub(crate) fn do_TD(&mut self, args: &mut Operands) {
        if let (Some(tx), Some(ty)) = (args.num(), args.num()) {
            self.record(TextItem::Leading(-ty));
            self.record(TextItem::Move(tx, ty));
        }
    }

    /// Tm: set the text and line matrices outright.
    pub(crate) fn do_Tm(&mut self, args: &mut Operands) {
        if let Some(m) = args.matrix() {
            self.record(TextItem::SetMatrix(m));
        }
    }

    /// Tj: show a string.
    pub(crate) fn do_Tj(&mut self, args: &mut Operands) {
        if let Some(bytes) = args.string() {
            self.show(vec![TJItem::Bytes(bytes)], args.pos());
        }
    }

    /// TJ: show strings with interleaved position adjustments.
    pub(crate) fn do_TJ(&mut self, args: &mut Operands) {
        let Some(arr) = args.array() else { return };
        let seq = arr
            .into_iter()
            .filter_map(|item| match item {
                PDFObject::String(bytes) => Some(TJItem::Bytes(bytes)),
                PDFObject::Int(n) => Some(TJItem::Adjust(n as f64)),
                PDFObject::Real(n) => Some(TJItem::Adjust(n)),
                _ => None,
            })
            .collect();
        self.show(seq, args.pos());
    }

    /// ': move to the next line and show.
    pub(crate) fn do_quote(&mut self, args: &mut Operands) {
        if let Some(bytes) = args.string() {
            self.record(TextItem::NextLine);
            self.show(vec![TJItem::Bytes(bytes)], args.pos());
        }
    }

    /// ": set word and character spacing, move to the next line, show.
    pub(crate) fn do_dquote(&mut self, args: &mut Operands) {
        let (Some(aw), Some(ac), Some(bytes)) = (args.num(), args.num(), args.string()) else {
            return;
        };
        self.record(TextItem::WordSpace(aw));
        self.record(TextItem::CharSpace(ac));
        self.record(TextItem::NextLine);
        self.show(vec![TJItem::Bytes(bytes)], args.pos());
    }

    fn show(&mut self, seq: Vec<TJItem>, pos: usize) {
        if self.tstate.font.is_none() {
            self.warn("Font", pos, "text shown before any font was selected");
            return;
        }
        if !self.in_text {
            // Showing text outside BT..ET is broken but common; wrap it
            // in an implicit text object.
            self.warn("Interp", pos, "text-showing operator outside BT/ET");
            self.do_BT();
            self.record(TextItem::Show(seq));
            self.do_ET();
            return;
        }
        self.record(TextItem::Show(seq));
    }
}
