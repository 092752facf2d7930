//! Path construction and painting: m l c v y h re, S s f F f* B B* b b*
//! n, and the W/W* clipping flags.

use crate::content::{ContentObject, PathObject, PathSegment, SegmentOp};
use crate::interp::interpreter::{Operands, PageInterpreter};

impl<'a> PageInterpreter<'a> {
    fn push_segment(&mut self, operator: SegmentOp, points: Vec<(f64, f64)>) {
        self.curpath.push(PathSegment { operator, points });
    }

    /// m: begin a new subpath.
    pub(crate) fn do_m(&mut self, args: &mut Operands) {
        if let (Some(x), Some(y)) = (args.num(), args.num()) {
            self.push_segment(SegmentOp::MoveTo, vec![(x, y)]);
        }
    }

    /// l: straight segment.
    pub(crate) fn do_l(&mut self, args: &mut Operands) {
        if let (Some(x), Some(y)) = (args.num(), args.num()) {
            self.push_segment(SegmentOp::LineTo, vec![(x, y)]);
        }
    }

    /// c: cubic Bezier with two control points.
    pub(crate) fn do_c(&mut self, args: &mut Operands) {
        if let Some(m) = args.matrix() {
            let (x1, y1, x2, y2, x3, y3) = m;
            self.push_segment(SegmentOp::CurveTo, vec![(x1, y1), (x2, y2), (x3, y3)]);
        }
    }

    /// v: Bezier whose first control point is the current point.
    pub(crate) fn do_v(&mut self, args: &mut Operands) {
        if let (Some(x2), Some(y2), Some(x3), Some(y3)) =
            (args.num(), args.num(), args.num(), args.num())
        {
            self.push_segment(SegmentOp::CurveV, vec![(x2, y2), (x3, y3)]);
        }
    }

    /// y: Bezier whose second control point is the endpoint.
    pub(crate) fn do_y(&mut self, args: &mut Operands) {
        if let (Some(x1), Some(y1), Some(x3), Some(y3)) =
            (args.num(), args.num(), args.num(), args.num())
        {
            self.push_segment(SegmentOp::CurveY, vec![(x1, y1), (x3, y3)]);
        }
    }

    /// h: close the current subpath.
    pub(crate) fn do_h(&mut self) {
        self.push_segment(SegmentOp::Close, Vec::new());
    }

    /// re: rectangle as (x, y) + (width, height).
    pub(crate) fn do_re(&mut self, args: &mut Operands) {
        if let (Some(x), Some(y), Some(w), Some(h)) =
            (args.num(), args.num(), args.num(), args.num())
        {
            self.push_segment(SegmentOp::Rect, vec![(x, y), (w, h)]);
        }
    }

    /// Flush the path buffer: emit a path object for painting
    /// operators, then apply any pending clip. `n` with no pending clip
    /// discards the path silently.
    pub(crate) fn paint_path(&mut self, stroke: bool, fill: bool, evenodd: bool) {
        let raw_segments = std::mem::take(&mut self.curpath);
        if !raw_segments.is_empty() && (stroke || fill) {
            self.pending_emit_path(raw_segments, stroke, fill, evenodd);
        }
        if self.pending_clip {
            self.pending_clip = false;
            self.clip_counter += 1;
            self.gstate.clip_id = self.clip_counter;
        }
    }

    fn pending_emit_path(
        &mut self,
        raw_segments: Vec<PathSegment>,
        stroke: bool,
        fill: bool,
        evenodd: bool,
    ) {
        let obj = PathObject {
            gstate: self.gstate.clone(),
            mcstack: self.snapshot_mcstack(),
            raw_segments,
            stroke,
            fill,
            evenodd,
        };
        self.emit(ContentObject::Path(obj));
    }
}
