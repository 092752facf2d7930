//! Typed content objects emitted by the interpreter.
//!
//! Every object carries a snapshot of the graphics state taken at
//! emission, the CTM in effect, and the marked-content stack active at
//! that point. Snapshots are deep copies: they stay valid after the
//! interpreter has moved on.

use crate::font::pdffont::CharDisp;
use crate::model::objects::{PDFObject, PDFStream};
use crate::model::state::{GraphicState, TextState};
use crate::utils::{
    apply_matrix_pt, get_bound, mult_matrix, translate_matrix, Matrix, Point, Rect,
};
use std::collections::HashMap;
use std::rc::Rc;

/// One frame of the marked-content stack: tag, properties (inline or
/// resolved from /Properties), and /MCID when present.
#[derive(Debug, Clone)]
pub struct MarkedContent {
    pub tag: String,
    pub props: Option<HashMap<String, PDFObject>>,
    pub mcid: Option<i64>,
}

/// A path segment, tagged with its constructing operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentOp {
    /// m
    MoveTo,
    /// l
    LineTo,
    /// c
    CurveTo,
    /// v
    CurveV,
    /// y
    CurveY,
    /// h
    Close,
    /// re
    Rect,
}

impl SegmentOp {
    /// The operator name as written in content streams.
    pub fn name(&self) -> &'static str {
        match self {
            SegmentOp::MoveTo => "m",
            SegmentOp::LineTo => "l",
            SegmentOp::CurveTo => "c",
            SegmentOp::CurveV => "v",
            SegmentOp::CurveY => "y",
            SegmentOp::Close => "h",
            SegmentOp::Rect => "re",
        }
    }
}

#[derive(Debug, Clone)]
pub struct PathSegment {
    pub operator: SegmentOp,
    pub points: Vec<Point>,
}

/// A content object: one drawing-level event on the page.
#[derive(Debug, Clone)]
pub enum ContentObject {
    Text(TextObject),
    Path(PathObject),
    Image(ImageObject),
    XObject(XObjectObject),
    Tag(TagObject),
}

impl ContentObject {
    /// Stable type name: `text`, `path`, `image`, `xobject` or `mcs`.
    pub fn object_type(&self) -> &'static str {
        match self {
            ContentObject::Text(_) => "text",
            ContentObject::Path(_) => "path",
            ContentObject::Image(_) => "image",
            ContentObject::XObject(_) => "xobject",
            ContentObject::Tag(_) => "mcs",
        }
    }

    pub fn gstate(&self) -> &GraphicState {
        match self {
            ContentObject::Text(o) => &o.gstate,
            ContentObject::Path(o) => &o.gstate,
            ContentObject::Image(o) => &o.gstate,
            ContentObject::XObject(o) => &o.gstate,
            ContentObject::Tag(o) => &o.gstate,
        }
    }

    pub fn ctm(&self) -> Matrix {
        self.gstate().ctm
    }

    /// The marked-content stack active when the object was emitted.
    pub fn mcstack(&self) -> &[MarkedContent] {
        match self {
            ContentObject::Text(o) => &o.mcstack,
            ContentObject::Path(o) => &o.mcstack,
            ContentObject::Image(o) => &o.mcstack,
            ContentObject::XObject(o) => &o.mcstack,
            ContentObject::Tag(o) => &o.mcstack,
        }
    }

    /// The nearest enclosing marked-content frame, or None.
    pub fn mcs(&self) -> Option<&MarkedContent> {
        self.mcstack().last()
    }

    /// Bounding box in device space (y increases upward).
    pub fn bbox(&self) -> Rect {
        match self {
            ContentObject::Text(o) => o.bbox(),
            ContentObject::Path(o) => o.bbox(),
            ContentObject::Image(o) => o.bbox,
            ContentObject::XObject(o) => o.bbox,
            ContentObject::Tag(o) => o.bbox,
        }
    }
}

/// A marked-content point (MP / DP).
#[derive(Debug, Clone)]
pub struct TagObject {
    pub gstate: GraphicState,
    pub mcstack: Vec<MarkedContent>,
    pub tag: MarkedContent,
    pub bbox: Rect,
}

/// An image: an Image XObject or an inline image.
#[derive(Debug, Clone)]
pub struct ImageObject {
    pub gstate: GraphicState,
    pub mcstack: Vec<MarkedContent>,
    /// Resource name; inline images have none.
    pub name: Option<String>,
    /// The image stream (raw; raster decoding is out of scope).
    pub stream: Option<PDFStream>,
    /// Inline image dictionary and data when not a named XObject.
    pub inline_dict: Option<HashMap<String, PDFObject>>,
    pub inline_data: Option<Vec<u8>>,
    pub srcsize: (i64, i64),
    pub imagemask: bool,
    pub bits: i64,
    /// The unit square transformed by the CTM.
    pub bbox: Rect,
}

/// A Form XObject invocation. The form's content appears inline in the
/// page's object sequence immediately after this record.
#[derive(Debug, Clone)]
pub struct XObjectObject {
    pub gstate: GraphicState,
    pub mcstack: Vec<MarkedContent>,
    pub name: String,
    /// The form's /BBox transformed to device space.
    pub bbox: Rect,
}

/// A painted path.
#[derive(Debug, Clone)]
pub struct PathObject {
    pub gstate: GraphicState,
    pub mcstack: Vec<MarkedContent>,
    /// Segments in user space, as written.
    pub raw_segments: Vec<PathSegment>,
    pub stroke: bool,
    pub fill: bool,
    pub evenodd: bool,
}

impl PathObject {
    /// Segments transformed to device space by the CTM.
    pub fn segments(&self) -> Vec<PathSegment> {
        let ctm = self.gstate.ctm;
        self.raw_segments
            .iter()
            .map(|seg| PathSegment {
                operator: seg.operator,
                points: seg
                    .points
                    .iter()
                    .map(|&pt| apply_matrix_pt(ctm, pt))
                    .collect(),
            })
            .collect()
    }

    /// Split the path into subpaths, each beginning at an `m` or `re`.
    pub fn subpaths(&self) -> Vec<Vec<PathSegment>> {
        let mut subpaths = Vec::new();
        let mut current: Vec<PathSegment> = Vec::new();
        for seg in &self.raw_segments {
            if matches!(seg.operator, SegmentOp::MoveTo | SegmentOp::Rect) && !current.is_empty() {
                subpaths.push(std::mem::take(&mut current));
            }
            current.push(seg.clone());
        }
        if !current.is_empty() {
            subpaths.push(current);
        }
        subpaths
    }

    pub fn bbox(&self) -> Rect {
        let mut pts = Vec::new();
        for seg in &self.raw_segments {
            match seg.operator {
                SegmentOp::Rect => {
                    if let (Some(&(x, y)), Some(&(w, h))) = (seg.points.first(), seg.points.get(1))
                    {
                        pts.push(apply_matrix_pt(self.gstate.ctm, (x, y)));
                        pts.push(apply_matrix_pt(self.gstate.ctm, (x + w, y)));
                        pts.push(apply_matrix_pt(self.gstate.ctm, (x + w, y + h)));
                        pts.push(apply_matrix_pt(self.gstate.ctm, (x, y + h)));
                    }
                }
                _ => {
                    for &pt in &seg.points {
                        pts.push(apply_matrix_pt(self.gstate.ctm, pt));
                    }
                }
            }
        }
        if pts.is_empty() {
            (0.0, 0.0, 0.0, 0.0)
        } else {
            get_bound(&pts)
        }
    }
}

/// One deferred step of a text object.
#[derive(Debug, Clone)]
pub enum TextItem {
    CharSpace(f64),
    WordSpace(f64),
    Scaling(f64),
    Leading(f64),
    SetFont(Rc<crate::font::pdffont::Font>, f64),
    Render(i64),
    Rise(f64),
    /// Td: translate the line matrix.
    Move(f64, f64),
    /// Tm: replace the line matrix.
    SetMatrix(Matrix),
    /// T*: next line using the leading.
    NextLine,
    /// TJ: strings interleaved with position adjustments.
    Show(Vec<TJItem>),
}

#[derive(Debug, Clone)]
pub enum TJItem {
    Bytes(Vec<u8>),
    Adjust(f64),
}

/// A text object: everything between BT and ET. Glyph positions are
/// computed on demand by replaying the recorded items.
#[derive(Debug, Clone)]
pub struct TextObject {
    pub gstate: GraphicState,
    pub mcstack: Vec<MarkedContent>,
    /// Text state as of BT (fonts resolved at record time).
    pub textstate: TextState,
    pub items: Vec<TextItem>,
}

/// One placed glyph, produced by iterating a text object.
#[derive(Debug, Clone)]
pub struct GlyphObject {
    pub gstate: GraphicState,
    pub mcstack: Vec<MarkedContent>,
    pub textstate: TextState,
    pub cid: u32,
    /// Unicode mapping, empty when the font defines none.
    pub text: Option<String>,
    /// Rendering matrix: text space to device space at this glyph.
    pub matrix: Matrix,
    /// Advance in text space, after font size and scaling.
    pub adv: f64,
    corners: bool,
}

impl GlyphObject {
    /// Device-space bounding box. Horizontal glyphs span descent to
    /// descent+size vertically and the advance horizontally; a rotated
    /// or skewed matrix falls back to the four-corner bound.
    pub fn bbox(&self) -> Rect {
        let tstate = &self.textstate;
        let (x0, y0, x1, y1) = match &tstate.font {
            Some(font) if font.is_vertical() => {
                let (vx, vy) = match font.char_disp(self.cid) {
                    CharDisp::Vertical(vx, vy) => (vx, vy),
                    CharDisp::Horizontal => (None, 880.0),
                };
                let vx = match vx {
                    Some(vx) => vx * tstate.fontsize * 0.001,
                    None => tstate.fontsize * 0.5,
                };
                let vy = (1000.0 - vy) * tstate.fontsize * 0.001;
                (
                    -vx,
                    vy + tstate.rise + self.adv,
                    -vx + tstate.fontsize,
                    vy + tstate.rise,
                )
            }
            _ => {
                let descent = tstate.descent();
                (
                    0.0,
                    descent + tstate.rise,
                    self.adv,
                    descent + tstate.rise + tstate.fontsize,
                )
            }
        };
        if self.corners {
            get_bound(&[
                apply_matrix_pt(self.matrix, (x0, y0)),
                apply_matrix_pt(self.matrix, (x0, y1)),
                apply_matrix_pt(self.matrix, (x1, y1)),
                apply_matrix_pt(self.matrix, (x1, y0)),
            ])
        } else {
            let (ax, ay) = apply_matrix_pt(self.matrix, (x0, y0));
            let (bx, by) = apply_matrix_pt(self.matrix, (x1, y1));
            (ax.min(bx), ay.min(by), ax.max(bx), ay.max(by))
        }
    }
}

impl TextObject {
    /// The Unicode characters of this object in stream order. Only
    /// font selection and text-showing affect the result.
    pub fn chars(&self) -> String {
        let mut font = self.textstate.font.clone();
        let mut out = String::new();
        for item in &self.items {
            match item {
                TextItem::SetFont(f, _) => font = Some(Rc::clone(f)),
                TextItem::Show(seq) => {
                    let Some(font) = &font else { continue };
                    for piece in seq {
                        if let TJItem::Bytes(bytes) = piece {
                            for (_, text) in font.decode(bytes) {
                                if let Some(text) = text {
                                    out.push_str(&text);
                                }
                            }
                        }
                    }
                }
                _ => {}
            }
        }
        out
    }

    /// Replay the text items, yielding positioned glyphs.
    pub fn glyphs(&self) -> Vec<GlyphObject> {
        let mut glyphs = Vec::new();
        let mut tstate = self.textstate.clone();
        tstate.reset();
        for item in &self.items {
            match item {
                TextItem::CharSpace(v) => tstate.charspace = *v,
                TextItem::WordSpace(v) => tstate.wordspace = *v,
                TextItem::Scaling(v) => tstate.scaling = *v,
                TextItem::Leading(v) => tstate.leading = *v,
                TextItem::SetFont(f, size) => {
                    tstate.font = Some(Rc::clone(f));
                    tstate.fontsize = *size;
                }
                TextItem::Render(v) => tstate.render = *v,
                TextItem::Rise(v) => tstate.rise = *v,
                TextItem::Move(tx, ty) => {
                    tstate.line_matrix = translate_matrix(tstate.line_matrix, (*tx, *ty));
                    tstate.glyph_offset = (0.0, 0.0);
                }
                TextItem::SetMatrix(m) => {
                    tstate.line_matrix = *m;
                    tstate.glyph_offset = (0.0, 0.0);
                }
                TextItem::NextLine => {
                    // T* is 0 -leading Td.
                    tstate.line_matrix =
                        translate_matrix(tstate.line_matrix, (0.0, -tstate.leading));
                    tstate.glyph_offset = (0.0, 0.0);
                }
                TextItem::Show(seq) => self.render_show(&mut tstate, seq, &mut glyphs),
            }
        }
        glyphs
    }

    fn render_show(&self, tstate: &mut TextState, seq: &[TJItem], out: &mut Vec<GlyphObject>) {
        let Some(font) = tstate.font.clone() else {
            return;
        };
        let vert = font.is_vertical();
        let (a, b, c, d, e, f) = mult_matrix(tstate.line_matrix, self.gstate.ctm);
        // Rotated or skewed matrices need all four corners bounded.
        let corners = b * d < 0.0 || a * c < 0.0;
        let scaling = tstate.scaling * 0.01;
        let charspace = tstate.charspace * scaling;
        let wordspace = if font.is_multibyte() {
            0.0
        } else {
            tstate.wordspace * scaling
        };
        let (mut x, mut y) = tstate.glyph_offset;
        let mut pos = if vert { y } else { x };
        let mut needcharspace = false;
        for piece in seq {
            match piece {
                TJItem::Adjust(n) => {
                    pos -= n * 0.001 * tstate.fontsize * scaling;
                    needcharspace = true;
                }
                TJItem::Bytes(bytes) => {
                    for (cid, text) in font.decode(bytes) {
                        if needcharspace {
                            pos += charspace;
                        }
                        tstate.glyph_offset = if vert { (x, pos) } else { (pos, y) };
                        let adv = font.char_width(cid) * tstate.fontsize * scaling;
                        let off = tstate.glyph_offset;
                        x = off.0;
                        y = off.1;
                        out.push(GlyphObject {
                            gstate: self.gstate.clone(),
                            mcstack: self.mcstack.clone(),
                            textstate: tstate.clone(),
                            cid,
                            text,
                            matrix: (a, b, c, d, x * a + y * c + e, x * b + y * d + f),
                            adv,
                            corners,
                        });
                        pos += adv;
                        if cid == 32 && wordspace != 0.0 {
                            pos += wordspace;
                        }
                        needcharspace = true;
                    }
                }
            }
        }
        tstate.glyph_offset = if vert { (x, pos) } else { (pos, y) };
    }

    /// Device-space bound over all glyph boxes.
    pub fn bbox(&self) -> Rect {
        let glyphs = self.glyphs();
        if glyphs.is_empty() {
            return (0.0, 0.0, 0.0, 0.0);
        }
        let mut bound = (f64::INFINITY, f64::INFINITY, f64::NEG_INFINITY, f64::NEG_INFINITY);
        for glyph in &glyphs {
            let (x0, y0, x1, y1) = glyph.bbox();
            bound.0 = bound.0.min(x0);
            bound.1 = bound.1.min(y0);
            bound.2 = bound.2.max(x1);
            bound.3 = bound.3.max(y1);
        }
        bound
    }
}
