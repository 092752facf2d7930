//! XObject invocation (Do) and inline images (BI/ID/EI).

use crate::content::{ContentObject, ImageObject, XObjectObject};
use crate::interp::interpreter::{Operands, PageInterpreter, Resources};
use crate::model::objects::{PDFObject, PDFStream};
use crate::utils::{apply_matrix_rect, mult_matrix, Matrix, Rect};
use std::collections::HashMap;

#[allow(non_snake_case)]
impl<'a> PageInterpreter<'a> {
    /// Do: invoke a named XObject. Forms run inline with the caller's
    /// state saved around them; images emit an image object whose bbox
    /// is the CTM-transformed unit square.
    pub(crate) fn do_Do(&mut self, args: &mut Operands) {
        let Some(name) = args.name() else { return };
        let Some(entry) = self.resources.xobjects.get(&name).cloned() else {
            self.warn(
                "Interp",
                args.pos(),
                format!("undefined XObject resource /{}", name),
            );
            return;
        };
        let stream = match self.doc.resolve(&entry) {
            PDFObject::Stream(s) => *s,
            _ => {
                self.warn("Interp", args.pos(), format!("XObject /{} is not a stream", name));
                return;
            }
        };
        let subtype = stream
            .get("Subtype")
            .and_then(|s| s.as_name().ok())
            .unwrap_or("");
        match subtype {
            "Image" => self.invoke_image(Some(name), stream),
            "Form" => self.invoke_form(name, stream),
            other => {
                self.warn(
                    "Unsupported",
                    args.pos(),
                    format!("XObject subtype /{}", other),
                );
            }
        }
    }

    fn invoke_image(&mut self, name: Option<String>, stream: PDFStream) {
        let get_int = |key: &str, default: i64| -> i64 {
            stream
                .get(key)
                .map(|v| self.doc.resolve(v))
                .and_then(|v| v.as_int().ok())
                .unwrap_or(default)
        };
        let width = get_int("Width", 0).max(get_int("W", 0));
        let height = get_int("Height", 0).max(get_int("H", 0));
        let bits = get_int("BitsPerComponent", 0).max(get_int("BPC", 0)).max(1);
        let imagemask = stream
            .get("ImageMask")
            .or_else(|| stream.get("IM"))
            .and_then(|v| v.as_bool().ok())
            .unwrap_or(false);
        let obj = ImageObject {
            gstate: self.gstate.clone(),
            mcstack: self.snapshot_mcstack(),
            name,
            stream: Some(stream),
            inline_dict: None,
            inline_data: None,
            srcsize: (width, height),
            imagemask,
            bits,
            bbox: unit_bbox(self.gstate.ctm),
        };
        self.emit(ContentObject::Image(obj));
    }

    fn invoke_form(&mut self, name: String, stream: PDFStream) {
        // Push state, concatenate /Matrix, clip to /BBox, interpret
        // with the form's resources shadowing the caller's, pop.
        let matrix: Matrix = stream
            .get("Matrix")
            .map(|m| self.doc.resolve(m))
            .and_then(|m| {
                let arr = m.as_array().ok()?;
                if arr.len() < 6 {
                    return None;
                }
                let vals: Vec<f64> = arr.iter().filter_map(|v| v.as_num().ok()).collect();
                if vals.len() < 6 {
                    return None;
                }
                Some((vals[0], vals[1], vals[2], vals[3], vals[4], vals[5]))
            })
            .unwrap_or(crate::utils::MATRIX_IDENTITY);
        let bbox: Option<Rect> = stream.get("BBox").map(|b| self.doc.resolve(b)).and_then(|b| {
            let arr = b.as_array().ok()?;
            if arr.len() < 4 {
                return None;
            }
            let vals: Vec<f64> = arr.iter().filter_map(|v| v.as_num().ok()).collect();
            if vals.len() < 4 {
                return None;
            }
            Some((vals[0], vals[1], vals[2], vals[3]))
        });

        let mut gstate = self.gstate.clone();
        gstate.ctm = mult_matrix(matrix, gstate.ctm);
        if bbox.is_some() {
            self.clip_counter += 1;
            gstate.clip_id = self.clip_counter;
        }

        let device_bbox = bbox
            .map(|b| apply_matrix_rect(gstate.ctm, b))
            .unwrap_or_else(|| unit_bbox(gstate.ctm));
        self.emit(ContentObject::XObject(XObjectObject {
            gstate: gstate.clone(),
            mcstack: self.snapshot_mcstack(),
            name,
            bbox: device_bbox,
        }));

        let resources = match stream.get("Resources").map(|r| self.doc.resolve(r)) {
            Some(PDFObject::Dict(d)) => Resources::from_dict(self.doc, &d),
            _ => Resources::from_dict(self.doc, &HashMap::new()),
        };
        let data = self.doc.decode_stream(&stream);
        self.run_form(&data, resources, gstate);
    }

    /// BI ... ID ... EI: an inline image, treated as an image XObject.
    pub(crate) fn do_inline_image(&mut self, dict: HashMap<String, PDFObject>, data: Vec<u8>) {
        let get_int = |key: &str, abbrev: &str| -> i64 {
            dict.get(key)
                .or_else(|| dict.get(abbrev))
                .and_then(|v| v.as_int().ok())
                .unwrap_or(0)
        };
        let width = get_int("Width", "W");
        let height = get_int("Height", "H");
        let bits = get_int("BitsPerComponent", "BPC").max(1);
        let imagemask = dict
            .get("ImageMask")
            .or_else(|| dict.get("IM"))
            .and_then(|v| v.as_bool().ok())
            .unwrap_or(false);
        let obj = ImageObject {
            gstate: self.gstate.clone(),
            mcstack: self.snapshot_mcstack(),
            name: None,
            stream: None,
            inline_dict: Some(dict),
            inline_data: Some(data),
            srcsize: (width, height),
            imagemask,
            bits,
            bbox: unit_bbox(self.gstate.ctm),
        };
        self.emit(ContentObject::Image(obj));
    }
}

/// Images occupy the unit square in user space.
fn unit_bbox(ctm: Matrix) -> Rect {
    apply_matrix_rect(ctm, (0.0, 0.0, 1.0, 1.0))
}
