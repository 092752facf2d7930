//! Graphics and text state.

use super::color::ColorSpace;
use crate::font::pdffont::Font;
use crate::utils::{Matrix, Point, MATRIX_IDENTITY};
use std::rc::Rc;

/// A color value in some color space.
#[derive(Debug, Clone, PartialEq)]
pub enum Color {
    Gray(f64),
    Rgb(f64, f64, f64),
    Cmyk(f64, f64, f64, f64),
    /// Arbitrary component vector (Separation, DeviceN, Indexed, ...).
    Components(Vec<f64>),
    /// Colored tiling pattern (PaintType 1): just the pattern name.
    PatternColored(String),
    /// Uncolored tiling pattern (PaintType 2): base color + pattern name.
    PatternUncolored(Box<Color>, String),
}

impl Default for Color {
    fn default() -> Self {
        Color::Gray(0.0)
    }
}

impl Color {
    /// Numeric components, empty for colored patterns.
    pub fn to_vec(&self) -> Vec<f64> {
        match self {
            Color::Gray(g) => vec![*g],
            Color::Rgb(r, g, b) => vec![*r, *g, *b],
            Color::Cmyk(c, m, y, k) => vec![*c, *m, *y, *k],
            Color::Components(v) => v.clone(),
            Color::PatternColored(_) => vec![],
            Color::PatternUncolored(base, _) => base.to_vec(),
        }
    }

    pub fn pattern_name(&self) -> Option<&str> {
        match self {
            Color::PatternColored(name) => Some(name),
            Color::PatternUncolored(_, name) => Some(name),
            _ => None,
        }
    }
}

/// Dash pattern: lengths array and phase.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DashPattern {
    pub dash: Vec<f64>,
    pub phase: f64,
}

/// Text state: the parameters consulted by text-showing operators.
///
/// The text and line matrices only exist between BT and ET; `reset`
/// reinitializes them at each BT.
#[derive(Debug, Clone)]
pub struct TextState {
    pub font: Option<Rc<Font>>,
    pub fontname: Option<String>,
    pub fontsize: f64,
    pub charspace: f64,
    pub wordspace: f64,
    /// Horizontal scaling percentage (100 = normal).
    pub scaling: f64,
    pub leading: f64,
    /// Rendering mode 0-7.
    pub render: i64,
    pub rise: f64,
    /// Line matrix: set by Td/TD/Tm/T*, the origin of the current line.
    pub line_matrix: Matrix,
    /// Offset of the next glyph within the current line, in text space.
    pub glyph_offset: Point,
}

impl TextState {
    pub fn new() -> Self {
        Self {
            font: None,
            fontname: None,
            fontsize: 0.0,
            charspace: 0.0,
            wordspace: 0.0,
            scaling: 100.0,
            leading: 0.0,
            render: 0,
            rise: 0.0,
            line_matrix: MATRIX_IDENTITY,
            glyph_offset: (0.0, 0.0),
        }
    }

    /// Reset the matrices at a BT operator.
    pub fn reset(&mut self) {
        self.line_matrix = MATRIX_IDENTITY;
        self.glyph_offset = (0.0, 0.0);
    }

    /// Font descent in text space units, scaled by the font size.
    pub fn descent(&self) -> f64 {
        match &self.font {
            Some(font) => font.descent() * 0.001 * self.fontsize,
            None => 0.0,
        }
    }
}

impl Default for TextState {
    fn default() -> Self {
        Self::new()
    }
}

/// Graphics state: everything q/Q saves and restores, including the CTM.
#[derive(Debug, Clone)]
pub struct GraphicState {
    /// Current transformation matrix mapping user space to device space.
    pub ctm: Matrix,
    pub linewidth: f64,
    pub linecap: Option<i64>,
    pub linejoin: Option<i64>,
    pub miterlimit: Option<f64>,
    pub dash: DashPattern,
    pub intent: Option<String>,
    pub flatness: Option<f64>,
    pub scolor: Color,
    pub scs: ColorSpace,
    pub ncolor: Color,
    pub ncs: ColorSpace,
    /// Monotonic identifier of the active clipping path; 0 means the
    /// page's initial clip. Content objects compare these to tell whether
    /// two objects share a clip without retaining the path itself.
    pub clip_id: u64,
}

impl GraphicState {
    pub fn new() -> Self {
        Self {
            ctm: MATRIX_IDENTITY,
            linewidth: 0.0,
            linecap: None,
            linejoin: None,
            miterlimit: None,
            dash: DashPattern::default(),
            intent: None,
            flatness: None,
            scolor: Color::Gray(0.0),
            scs: ColorSpace::device_gray(),
            ncolor: Color::Gray(0.0),
            ncs: ColorSpace::device_gray(),
            clip_id: 0,
        }
    }
}

impl Default for GraphicState {
    fn default() -> Self {
        Self::new()
    }
}
