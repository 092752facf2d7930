//! Color operators: CS cs SC SCN sc scn G g RG rg K k.

use crate::interp::interpreter::{resolve_colorspace, Operands, PageInterpreter};
use crate::model::color::ColorSpace;
use crate::model::objects::PDFObject;
use crate::model::state::Color;

#[allow(non_snake_case)]
impl<'a> PageInterpreter<'a> {
    fn set_colorspace(&mut self, cs: ColorSpace, stroking: bool) {
        // Selecting a color space resets the color to its initial
        // value (black in the device spaces).
        let initial = match cs.ncomponents {
            3 => Color::Rgb(0.0, 0.0, 0.0),
            4 => Color::Cmyk(0.0, 0.0, 0.0, 1.0),
            _ => Color::Gray(0.0),
        };
        if stroking {
            self.gstate.scs = cs;
            self.gstate.scolor = initial;
        } else {
            self.gstate.ncs = cs;
            self.gstate.ncolor = initial;
        }
    }

    fn set_color(&mut self, color: Color, stroking: bool) {
        if stroking {
            self.gstate.scolor = color;
        } else {
            self.gstate.ncolor = color;
        }
    }

    /// CS / cs: select a color space by name.
    pub(crate) fn do_CS(&mut self, operands: Vec<PDFObject>, stroking: bool) {
        let Some(obj) = operands.first() else { return };
        match resolve_colorspace(self.doc, &self.resources, obj) {
            Some(cs) => self.set_colorspace(cs, stroking),
            None => {
                if let PDFObject::Name(name) = obj {
                    self.warn("Interp", 0, format!("undefined color space /{}", name));
                }
            }
        }
    }

    /// SC / SCN / sc / scn: set color components in the current space.
    /// SCN additionally accepts a trailing pattern name.
    pub(crate) fn do_SCN(&mut self, operands: Vec<PDFObject>, stroking: bool) {
        let pattern = operands.iter().rev().find_map(|v| match v {
            PDFObject::Name(name) => Some(name.clone()),
            _ => None,
        });
        let components: Vec<f64> = operands.iter().filter_map(|v| v.as_num().ok()).collect();
        let color = match pattern {
            Some(name) => {
                if components.is_empty() {
                    Color::PatternColored(name)
                } else {
                    let base = Self::components_to_color(&components);
                    Color::PatternUncolored(Box::new(base), name)
                }
            }
            None => Self::components_to_color(&components),
        };
        self.set_color(color, stroking);
    }

    fn components_to_color(components: &[f64]) -> Color {
        match components {
            [g] => Color::Gray(*g),
            [r, g, b] => Color::Rgb(*r, *g, *b),
            [c, m, y, k] => Color::Cmyk(*c, *m, *y, *k),
            other => Color::Components(other.to_vec()),
        }
    }

    /// G / g: DeviceGray and a gray level.
    pub(crate) fn do_G(&mut self, args: &mut Operands, stroking: bool) {
        if let Some(gray) = args.num() {
            self.set_colorspace(ColorSpace::device_gray(), stroking);
            self.set_color(Color::Gray(gray), stroking);
        }
    }

    /// RG / rg: DeviceRGB and components.
    pub(crate) fn do_RG(&mut self, args: &mut Operands, stroking: bool) {
        if let (Some(r), Some(g), Some(b)) = (args.num(), args.num(), args.num()) {
            self.set_colorspace(ColorSpace::new("DeviceRGB", 3), stroking);
            self.set_color(Color::Rgb(r, g, b), stroking);
        }
    }

    /// K / k: DeviceCMYK and components.
    pub(crate) fn do_K(&mut self, args: &mut Operands, stroking: bool) {
        if let (Some(c), Some(m), Some(y), Some(k)) =
            (args.num(), args.num(), args.num(), args.num())
        {
            self.set_colorspace(ColorSpace::new("DeviceCMYK", 4), stroking);
            self.set_color(Color::Cmyk(c, m, y, k), stroking);
        }
    }
}
