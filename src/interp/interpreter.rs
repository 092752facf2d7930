//! The lazy content interpreter.
//!
//! Executes a page's content streams against a graphics-state stack,
//! yielding typed content objects in strict stream order. Form XObject
//! content appears inline at its `Do` invocation site.

use crate::content::{ContentObject, MarkedContent, PathSegment, TextItem};
use crate::document::page::Page;
use crate::document::Document;
use crate::error::PdfWarning;
use crate::font::pdffont::Font;
use crate::model::color::ColorSpace;
use crate::model::objects::PDFObject;
use crate::model::state::{GraphicState, TextState};
use crate::parser::lexer::Keyword;
use crate::parser::object::{ContentOp, ContentParser};
use crate::utils::Matrix;
use std::collections::{HashMap, VecDeque};
use std::rc::Rc;

/// Bound on Form XObject nesting, against self-referential forms.
const MAX_FORM_DEPTH: usize = 12;

/// Resources visible to the stream being interpreted: a form's own
/// resources shadow the caller's.
#[derive(Default)]
pub(crate) struct Resources {
    pub fonts: HashMap<String, PDFObject>,
    pub xobjects: HashMap<String, PDFObject>,
    pub colorspaces: HashMap<String, PDFObject>,
    pub properties: HashMap<String, PDFObject>,
    pub extgstates: HashMap<String, PDFObject>,
}

impl Resources {
    pub(crate) fn from_dict(doc: &Document, dict: &HashMap<String, PDFObject>) -> Resources {
        let load = |key: &str| -> HashMap<String, PDFObject> {
            match dict.get(key).map(|v| doc.resolve(v)) {
                Some(PDFObject::Dict(d)) => d,
                _ => HashMap::new(),
            }
        };
        Resources {
            fonts: load("Font"),
            xobjects: load("XObject"),
            colorspaces: load("ColorSpace"),
            properties: load("Properties"),
            extgstates: load("ExtGState"),
        }
    }
}

/// Lazily interprets content streams, producing `ContentObject`s.
///
/// Dropping the iterator mid-stream releases all transient state; it is
/// not restartable.
pub struct PageInterpreter<'a> {
    pub(crate) doc: &'a Document,
    ops: Vec<ContentOp>,
    idx: usize,
    pub(crate) resources: Resources,
    pub(crate) gstate: GraphicState,
    pub(crate) gstack: Vec<GraphicState>,
    pub(crate) tstate: TextState,
    pub(crate) mcstack: Vec<MarkedContent>,
    pub(crate) curpath: Vec<PathSegment>,
    pub(crate) pending_clip: bool,
    pub(crate) clip_counter: u64,
    pub(crate) in_text: bool,
    pub(crate) text_items: Vec<TextItem>,
    pub(crate) text_start_state: TextState,
    pub(crate) pending: VecDeque<ContentObject>,
    pub(crate) fontmap: HashMap<String, Rc<Font>>,
    form_depth: usize,
    mc_base_depth: usize,
    finished: bool,
}

impl<'a> PageInterpreter<'a> {
    /// Interpreter for a page: content from /Contents, device space
    /// from the page's CTM.
    pub fn for_page(page: &Page<'a>) -> PageInterpreter<'a> {
        let doc = page.doc();
        let data = page.content_bytes();
        let mut gstate = GraphicState::new();
        gstate.ctm = page.ctm;
        let resources = Resources::from_dict(doc, &page.resources);
        Self::new(doc, &data, resources, gstate, 0)
    }

    pub(crate) fn new(
        doc: &'a Document,
        data: &[u8],
        resources: Resources,
        gstate: GraphicState,
        form_depth: usize,
    ) -> PageInterpreter<'a> {
        let mut parser = ContentParser::new(data);
        let mut ops = Vec::new();
        while let Some(op) = parser.next_op() {
            ops.push(op);
        }
        PageInterpreter {
            doc,
            ops,
            idx: 0,
            resources,
            gstate,
            gstack: Vec::new(),
            tstate: TextState::new(),
            mcstack: Vec::new(),
            curpath: Vec::new(),
            pending_clip: false,
            clip_counter: 0,
            in_text: false,
            text_items: Vec::new(),
            text_start_state: TextState::new(),
            pending: VecDeque::new(),
            fontmap: HashMap::new(),
            form_depth,
            mc_base_depth: 0,
            finished: false,
        }
    }

    pub(crate) fn warn(&self, kind: &'static str, pos: usize, msg: impl Into<String>) {
        self.doc.warn(PdfWarning::new(kind, Some(pos), msg));
    }

    /// Emit a content object to the consumer.
    pub(crate) fn emit(&mut self, obj: ContentObject) {
        self.pending.push_back(obj);
    }

    pub(crate) fn snapshot_mcstack(&self) -> Vec<MarkedContent> {
        self.mcstack.clone()
    }

    /// Execute one operator tuple.
    fn execute(&mut self, op: ContentOp) {
        match op {
            ContentOp::InlineImage { dict, data, .. } => self.do_inline_image(dict, data),
            ContentOp::Op {
                pos,
                operator,
                operands,
            } => self.dispatch(pos, operator, operands),
        }
    }

    fn dispatch(&mut self, pos: usize, operator: Keyword, operands: Vec<PDFObject>) {
        use Keyword::*;
        // Text-showing and state operators inside BT..ET are recorded
        // for deferred replay; everything else executes immediately.
        let args = Operands::new(self, pos, operands, &operator);
        let Some(mut args) = args else { return };
        match operator {
            Q => self.do_q(),
            QQ => self.do_Q(pos),
            Cm => {
                if let Some(m) = args.matrix() {
                    self.do_cm(m);
                }
            }
            W => {
                if let Some(v) = args.num() {
                    self.gstate.linewidth = v;
                }
            }
            J => self.gstate.linecap = args.int(),
            Jl => self.gstate.linejoin = args.int(),
            M => self.gstate.miterlimit = args.num(),
            D => self.do_d(args.take()),
            Ri => self.do_ri(args.take()),
            I => self.gstate.flatness = args.num(),
            Gs => self.do_gs(args.take()),

            Mv => self.do_m(&mut args),
            L => self.do_l(&mut args),
            C => self.do_c(&mut args),
            V => self.do_v(&mut args),
            Y => self.do_y(&mut args),
            H => self.do_h(),
            Re => self.do_re(&mut args),

            S => self.paint_path(true, false, false),
            Sc => {
                self.do_h();
                self.paint_path(true, false, false);
            }
            F | FUpper => self.paint_path(false, true, false),
            FStar => self.paint_path(false, true, true),
            B => self.paint_path(true, true, false),
            BStar => self.paint_path(true, true, true),
            Bl => {
                self.do_h();
                self.paint_path(true, true, false);
            }
            BlStar => {
                self.do_h();
                self.paint_path(true, true, true);
            }
            N => self.paint_path(false, false, false),
            WClip => self.pending_clip = true,
            WClipStar => self.pending_clip = true,

            BT => self.do_BT(),
            ET => self.do_ET(),
            Tc => self.text_state_op(&mut args, TextItem::CharSpace(0.0)),
            Tw => self.text_state_op(&mut args, TextItem::WordSpace(0.0)),
            Tz => self.text_state_op(&mut args, TextItem::Scaling(0.0)),
            TL => self.text_state_op(&mut args, TextItem::Leading(0.0)),
            Tf => self.do_Tf(&mut args),
            Tr => self.do_Tr(&mut args),
            Ts => self.text_state_op(&mut args, TextItem::Rise(0.0)),
            Td => self.do_Td(&mut args),
            TD => self.do_TD(&mut args),
            Tm => self.do_Tm(&mut args),
            TStar => self.record(TextItem::NextLine),
            Tj => self.do_Tj(&mut args),
            TJ => self.do_TJ(&mut args),
            Quote => self.do_quote(&mut args),
            DQuote => self.do_dquote(&mut args),

            CSStroke => self.do_CS(args.take(), true),
            CSFill => self.do_CS(args.take(), false),
            SCStroke | SCNStroke => self.do_SCN(args.take(), true),
            SCFill | SCNFill => self.do_SCN(args.take(), false),
            GStroke => self.do_G(&mut args, true),
            GFill => self.do_G(&mut args, false),
            RGStroke => self.do_RG(&mut args, true),
            RGFill => self.do_RG(&mut args, false),
            KStroke => self.do_K(&mut args, true),
            KFill => self.do_K(&mut args, false),

            Do => self.do_Do(&mut args),
            Sh => {}

            MP => self.do_MP(&mut args),
            DP => self.do_DP(&mut args),
            BMC => self.do_BMC(&mut args),
            BDC => self.do_BDC(&mut args),
            EMC => self.do_EMC(pos),

            // Type3 glyph metrics and compatibility brackets are no-ops
            // at this level.
            D0 | D1 | BX | EX => {}

            BI | ID | EI => {}
            Obj | EndObj | R | Stream | EndStream | Xref | Trailer | StartXref | True | False
            | Null | Def => {
                self.warn(
                    "Interp",
                    pos,
                    format!("file-structure keyword {:?} in content stream", operator),
                );
            }
            BeginCMap | EndCMap | UseCMap | BeginCodeSpaceRange | EndCodeSpaceRange
            | BeginBfChar | EndBfChar | BeginBfRange | EndBfRange | BeginCidChar | EndCidChar
            | BeginCidRange | EndCidRange | BeginNotDefChar | EndNotDefChar
            | BeginNotDefRange | EndNotDefRange => {}
            Unknown(ref bytes) => {
                self.warn(
                    "Interp",
                    pos,
                    format!(
                        "unknown operator {:?}",
                        String::from_utf8_lossy(bytes)
                    ),
                );
            }
        }
    }

    /// Record a text item inside BT..ET, also updating the persistent
    /// text state so later text objects observe state changes.
    pub(crate) fn record(&mut self, item: TextItem) {
        match &item {
            TextItem::CharSpace(v) => self.tstate.charspace = *v,
            TextItem::WordSpace(v) => self.tstate.wordspace = *v,
            TextItem::Scaling(v) => self.tstate.scaling = *v,
            TextItem::Leading(v) => self.tstate.leading = *v,
            TextItem::SetFont(f, size) => {
                self.tstate.font = Some(Rc::clone(f));
                self.tstate.fontsize = *size;
            }
            TextItem::Render(v) => self.tstate.render = *v,
            TextItem::Rise(v) => self.tstate.rise = *v,
            _ => {}
        }
        if self.in_text {
            self.text_items.push(item);
        }
    }

    fn text_state_op(&mut self, args: &mut Operands, template: TextItem) {
        let Some(v) = args.num() else { return };
        let item = match template {
            TextItem::CharSpace(_) => TextItem::CharSpace(v),
            TextItem::WordSpace(_) => TextItem::WordSpace(v),
            TextItem::Scaling(_) => TextItem::Scaling(v),
            TextItem::Leading(_) => TextItem::Leading(v),
            TextItem::Rise(_) => TextItem::Rise(v),
            other => other,
        };
        self.record(item);
    }

    /// Interpret a Form XObject's content inline with the given state.
    pub(crate) fn run_form(
        &mut self,
        data: &[u8],
        resources: Resources,
        gstate: GraphicState,
    ) {
        if self.form_depth >= MAX_FORM_DEPTH {
            self.warn("Interp", 0, "form XObject nesting too deep");
            return;
        }
        let mut inner =
            PageInterpreter::new(self.doc, data, resources, gstate, self.form_depth + 1);
        inner.tstate = self.tstate.clone();
        inner.mcstack = self.mcstack.clone();
        inner.mc_base_depth = self.mcstack.len();
        inner.clip_counter = self.clip_counter;
        for obj in inner.by_ref() {
            self.pending.push_back(obj);
        }
        self.clip_counter = inner.clip_counter;
    }

    /// End-of-stream bookkeeping: synthesize missing restores and
    /// absorb leftover marked-content frames.
    fn finish(&mut self) {
        if self.finished {
            return;
        }
        self.finished = true;
        if self.in_text {
            self.warn("Interp", 0, "unterminated text object at end of stream");
            self.do_ET();
        }
        if !self.gstack.is_empty() {
            self.warn(
                "Interp",
                0,
                format!(
                    "{} unbalanced graphics-state saves at end of stream",
                    self.gstack.len()
                ),
            );
            while let Some(saved) = self.gstack.pop() {
                self.gstate = saved;
            }
        }
        if self.mcstack.len() > self.mc_base_depth {
            self.warn(
                "Interp",
                0,
                format!(
                    "{} unbalanced marked-content frames at end of stream",
                    self.mcstack.len() - self.mc_base_depth
                ),
            );
            self.mcstack.truncate(self.mc_base_depth);
        }
    }

    /// Graphics-state stack depth, equal before and after a balanced
    /// stream.
    pub fn stack_depth(&self) -> usize {
        self.gstack.len()
    }
}

impl<'a> Iterator for PageInterpreter<'a> {
    type Item = ContentObject;

    fn next(&mut self) -> Option<ContentObject> {
        loop {
            if let Some(obj) = self.pending.pop_front() {
                return Some(obj);
            }
            if self.idx >= self.ops.len() {
                self.finish();
                return self.pending.pop_front();
            }
            let op = self.ops[self.idx].clone();
            self.idx += 1;
            self.execute(op);
        }
    }
}

/// Operand accessor with arity checking: a failed pop warns and leaves
/// the operator skipped, per the propagation policy.
pub(crate) struct Operands {
    items: Vec<PDFObject>,
    pos: usize,
}

impl Operands {
    /// Checks arity up front; on underflow the operator is skipped with
    /// a warning and `None` is returned.
    fn new(
        interp: &PageInterpreter,
        pos: usize,
        items: Vec<PDFObject>,
        operator: &Keyword,
    ) -> Option<Operands> {
        let arity = operator_arity(operator);
        if items.len() < arity {
            interp.warn(
                "Interp",
                pos,
                format!(
                    "operator {:?} needs {} operands, got {}",
                    operator,
                    arity,
                    items.len()
                ),
            );
            return None;
        }
        Some(Operands { items, pos })
    }

    pub(crate) fn take(&mut self) -> Vec<PDFObject> {
        std::mem::take(&mut self.items)
    }

    pub(crate) fn pos(&self) -> usize {
        self.pos
    }

    fn shift(&mut self) -> Option<PDFObject> {
        if self.items.is_empty() {
            None
        } else {
            Some(self.items.remove(0))
        }
    }

    /// Numeric operand with int-to-real coercion.
    pub(crate) fn num(&mut self) -> Option<f64> {
        self.shift()?.as_num().ok()
    }

    pub(crate) fn int(&mut self) -> Option<i64> {
        self.shift()?.as_int().ok()
    }

    pub(crate) fn name(&mut self) -> Option<String> {
        match self.shift()? {
            PDFObject::Name(s) => Some(s),
            _ => None,
        }
    }

    pub(crate) fn string(&mut self) -> Option<Vec<u8>> {
        match self.shift()? {
            PDFObject::String(s) => Some(s),
            _ => None,
        }
    }

    pub(crate) fn array(&mut self) -> Option<Vec<PDFObject>> {
        match self.shift()? {
            PDFObject::Array(a) => Some(a),
            _ => None,
        }
    }

    pub(crate) fn matrix(&mut self) -> Option<Matrix> {
        let a = self.num()?;
        let b = self.num()?;
        let c = self.num()?;
        let d = self.num()?;
        let e = self.num()?;
        let f = self.num()?;
        Some((a, b, c, d, e, f))
    }

}

/// Operand count per operator; variadic color operators check zero and
/// validate per-value.
fn operator_arity(operator: &Keyword) -> usize {
    use Keyword::*;
    match operator {
        Q | QQ | H | S | F | FUpper | FStar | B | BStar | Bl | BlStar | N | WClip | WClipStar
        | BT | ET | TStar | EMC | Sh | BX | EX => 0,
        W | J | Jl | M | Ri | I | Tc | Tw | Tz | TL | Tr | Ts | Tj | TJ | GStroke | GFill
        | CSStroke | CSFill | Do | MP | BMC | Gs | Quote => 1,
        D | Td | TD | Tf | DP | BDC | D0 => 2,
        RGStroke | RGFill | DQuote => 3,
        V | Y | Re | KStroke | KFill => 4,
        Cm | Tm | C | D1 => 6,
        Mv | L => 2,
        _ => 0,
    }
}

/// Resolve a color-space operand: a device/special family name or a key
/// into the /ColorSpace resources.
pub(crate) fn resolve_colorspace(
    doc: &Document,
    resources: &Resources,
    obj: &PDFObject,
) -> Option<ColorSpace> {
    let resolved = doc.resolve(obj);
    match resolved {
        PDFObject::Name(ref name) => {
            if let Some(cs) = ColorSpace::predefined(name) {
                return Some(cs);
            }
            let entry = resources.colorspaces.get(name.as_str())?.clone();
            resolve_colorspace_value(doc, &entry)
        }
        other => resolve_colorspace_value(doc, &other),
    }
}

fn resolve_colorspace_value(doc: &Document, obj: &PDFObject) -> Option<ColorSpace> {
    match doc.resolve(obj) {
        PDFObject::Name(name) => ColorSpace::predefined(&name),
        PDFObject::Array(arr) => {
            let family = doc.resolve(arr.first()?).as_name().ok()?.to_string();
            match family.as_str() {
                "ICCBased" => {
                    let n = arr
                        .get(1)
                        .map(|s| doc.resolve(s))
                        .and_then(|s| {
                            s.as_stream()
                                .ok()
                                .and_then(|s| s.get("N").cloned())
                                .and_then(|n| doc.resolve(&n).as_int().ok())
                        })
                        .unwrap_or(3);
                    Some(ColorSpace::new("ICCBased", n.max(1) as usize))
                }
                "Indexed" | "I" => Some(ColorSpace::new("Indexed", 1)),
                "Separation" => Some(ColorSpace::new("Separation", 1)),
                "DeviceN" => {
                    let n = arr
                        .get(1)
                        .map(|names| doc.resolve(names))
                        .and_then(|names| names.as_array().map(|a| a.len()).ok())
                        .unwrap_or(1);
                    Some(ColorSpace::new("DeviceN", n))
                }
                "CalRGB" | "Lab" => Some(ColorSpace::new(&family, 3)),
                "CalGray" => Some(ColorSpace::new("CalGray", 1)),
                "Pattern" => Some(ColorSpace::new("Pattern", 1)),
                _ => ColorSpace::predefined(&family),
            }
        }
        _ => None,
    }
}
