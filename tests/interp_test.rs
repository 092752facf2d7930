//! Content interpretation tests: the end-to-end scenarios over
//! synthetic documents, plus balance and placement invariants.

mod common;

use common::{hello_world_pdf, PdfBuilder};
use marea::content::{ContentObject, SegmentOp};
use marea::open;

fn text_pdf(content: &str) -> Vec<u8> {
    let mut builder = PdfBuilder::new();
    builder
        .add(1, b"<< /Type /Catalog /Pages 2 0 R >>")
        .add(
            2,
            b"<< /Type /Pages /Kids [3 0 R] /Count 1 /MediaBox [0 0 612 792] >>",
        )
        .add(
            3,
            b"<< /Type /Page /Parent 2 0 R /Contents 4 0 R /Resources << /Font << /F1 5 0 R >> >> >>",
        )
        .add_stream(4, "", content.as_bytes())
        .add(
            5,
            b"<< /Type /Font /Subtype /Type1 /BaseFont /Courier /Encoding /WinAnsiEncoding \
               /FirstChar 65 /Widths [500 600 700] >>",
        );
    builder.build(1)
}

#[test]
fn test_hello_world_text_item() {
    let doc = open(hello_world_pdf("Hello, world!")).unwrap();
    let pages = doc.pages();
    let objects: Vec<ContentObject> = pages[0].objects().collect();
    assert_eq!(objects.len(), 1);
    let text = match &objects[0] {
        ContentObject::Text(t) => t,
        other => panic!("expected text, got {}", other.object_type()),
    };
    assert_eq!(text.chars(), "Hello, world!");
    // Device space has its origin at the MediaBox lower-left, y up.
    let (_, y0, _, _) = text.bbox();
    assert!((y0 - 720.0).abs() < 1e-6, "baseline y was {}", y0);
}

#[test]
fn test_glyph_advances() {
    // adv = w/1000 * size * hscale + charspace, accumulated into the
    // rendering matrix translation.
    let doc = open(text_pdf("BT /F1 10 Tf 2 Tc 50 700 Td (AB) Tj ET")).unwrap();
    let pages = doc.pages();
    let objects: Vec<ContentObject> = pages[0].objects().collect();
    let text = match &objects[0] {
        ContentObject::Text(t) => t,
        _ => panic!("expected text"),
    };
    let glyphs = text.glyphs();
    assert_eq!(glyphs.len(), 2);
    // A at the line origin.
    assert!((glyphs[0].matrix.4 - 50.0).abs() < 1e-9);
    assert!((glyphs[0].adv - 5.0).abs() < 1e-9);
    // B advanced by A's width (500/1000 * 10) plus 2 charspace.
    assert!((glyphs[1].matrix.4 - 57.0).abs() < 1e-9);
    assert!((glyphs[1].adv - 6.0).abs() < 1e-9);
}

#[test]
fn test_tj_adjustments_and_scaling() {
    // TJ numbers subtract n/1000 * size * hscale from the position.
    let doc = open(text_pdf("BT /F1 10 Tf 0 700 Td [(A) -500 (B)] TJ ET")).unwrap();
    let pages = doc.pages();
    let objects: Vec<ContentObject> = pages[0].objects().collect();
    let text = match &objects[0] {
        ContentObject::Text(t) => t,
        _ => panic!("expected text"),
    };
    let glyphs = text.glyphs();
    assert_eq!(glyphs.len(), 2);
    assert!((glyphs[0].matrix.4 - 0.0).abs() < 1e-9);
    // 0 + 5.0 (A) + 5.0 (adjustment of -500) = 10.0
    assert!((glyphs[1].matrix.4 - 10.0).abs() < 1e-9);
}

#[test]
fn test_horizontal_scaling_halves_advance() {
    let doc = open(text_pdf("BT /F1 10 Tf 50 Tz 0 700 Td (AA) Tj ET")).unwrap();
    let pages = doc.pages();
    let objects: Vec<ContentObject> = pages[0].objects().collect();
    let text = match &objects[0] {
        ContentObject::Text(t) => t,
        _ => panic!("expected text"),
    };
    let glyphs = text.glyphs();
    assert!((glyphs[1].matrix.4 - 2.5).abs() < 1e-9);
}

#[test]
fn test_form_xobject_transform() {
    // A form with CTM [0.5 0 0 0.5 100 100] drawing text at (0, 0):
    // the glyph lands at (100, 100) at half size.
    let mut builder = PdfBuilder::new();
    builder
        .add(1, b"<< /Type /Catalog /Pages 2 0 R >>")
        .add(
            2,
            b"<< /Type /Pages /Kids [3 0 R] /Count 1 /MediaBox [0 0 612 792] >>",
        )
        .add(
            3,
            b"<< /Type /Page /Parent 2 0 R /Contents 4 0 R \
               /Resources << /XObject << /Fm1 6 0 R >> >> >>",
        )
        .add_stream(4, "", b"q /Fm1 Do Q")
        .add(
            5,
            b"<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica /Encoding /WinAnsiEncoding >>",
        )
        .add_stream(
            6,
            "/Type /XObject /Subtype /Form /Matrix [0.5 0 0 0.5 100 100] /BBox [0 0 200 200] \
             /Resources << /Font << /F1 5 0 R >> >>",
            b"BT /F1 12 Tf 0 0 Td (X) Tj ET",
        );
    let doc = open(builder.build(1)).unwrap();
    let pages = doc.pages();
    let objects: Vec<ContentObject> = pages[0].objects().collect();
    // The invocation record, then the form's content inline.
    assert_eq!(objects[0].object_type(), "xobject");
    let text = objects
        .iter()
        .find_map(|o| match o {
            ContentObject::Text(t) => Some(t),
            _ => None,
        })
        .expect("form text object");
    assert_eq!(text.chars(), "X");
    let glyphs = text.glyphs();
    let m = glyphs[0].matrix;
    assert!((m.4 - 100.0).abs() < 1e-6 && (m.5 - 100.0).abs() < 1e-6);
    // Effective font size is halved by the form matrix.
    assert!((m.0 - 0.5).abs() < 1e-9);
}

#[test]
fn test_nested_marked_content() {
    let content = "/Span << /MCID 3 >> BDC \
                   BT /F1 12 Tf 10 700 Td (one) Tj ET \
                   /Artifact BMC \
                   BT /F1 12 Tf 10 680 Td (two) Tj ET \
                   EMC \
                   BT /F1 12 Tf 10 660 Td (three) Tj ET \
                   EMC";
    let doc = open(text_pdf(content)).unwrap();
    let pages = doc.pages();
    let objects: Vec<ContentObject> = pages[0].objects().collect();
    assert_eq!(objects.len(), 3);
    // Inside the inner frame: tag Artifact, no MCID.
    let inner = objects[1].mcs().unwrap();
    assert_eq!(inner.tag, "Artifact");
    assert_eq!(inner.mcid, None);
    // Between inner EMC and outer EMC: the Span frame with MCID 3.
    let outer = objects[2].mcs().unwrap();
    assert_eq!(outer.tag, "Span");
    assert_eq!(outer.mcid, Some(3));
    // The full stack inside the inner frame is two deep.
    assert_eq!(objects[1].mcstack().len(), 2);
}

#[test]
fn test_unbalanced_saves_synthesized() {
    let doc = open(text_pdf("q q q BT /F1 12 Tf 10 700 Td (hi) Tj ET")).unwrap();
    let pages = doc.pages();
    let mut interp = pages[0].objects();
    let objects: Vec<ContentObject> = interp.by_ref().collect();
    assert_eq!(objects.len(), 1);
    // Post-interpretation depth equals pre-interpretation depth.
    assert_eq!(interp.stack_depth(), 0);
    assert!(doc
        .warnings()
        .iter()
        .any(|w| w.msg.contains("unbalanced graphics-state saves")));
}

#[test]
fn test_stray_restore_absorbed() {
    let doc = open(text_pdf("Q Q BT /F1 12 Tf 10 700 Td (hi) Tj ET")).unwrap();
    let pages = doc.pages();
    let objects: Vec<ContentObject> = pages[0].objects().collect();
    assert_eq!(objects.len(), 1);
}

#[test]
fn test_unknown_operator_skipped() {
    let doc = open(text_pdf("1 2 frob BT /F1 12 Tf 10 700 Td (hi) Tj ET")).unwrap();
    let pages = doc.pages();
    let objects: Vec<ContentObject> = pages[0].objects().collect();
    assert_eq!(objects.len(), 1);
    assert!(doc.warnings().iter().any(|w| w.msg.contains("unknown operator")));
}

#[test]
fn test_path_segments_and_subpaths() {
    let content = "1 0 0 1 10 20 cm 0 0 m 100 0 l 100 100 l h 5 5 50 40 re f";
    let doc = open(text_pdf(content)).unwrap();
    let pages = doc.pages();
    let objects: Vec<ContentObject> = pages[0].objects().collect();
    assert_eq!(objects.len(), 1);
    let path = match &objects[0] {
        ContentObject::Path(p) => p,
        _ => panic!("expected path"),
    };
    assert!(path.fill && !path.stroke);
    let ops: Vec<SegmentOp> = path.raw_segments.iter().map(|s| s.operator).collect();
    assert_eq!(
        ops,
        vec![
            SegmentOp::MoveTo,
            SegmentOp::LineTo,
            SegmentOp::LineTo,
            SegmentOp::Close,
            SegmentOp::Rect,
        ]
    );
    // Raw segments stay in user space; device segments apply the CTM.
    assert_eq!(path.raw_segments[1].points[0], (100.0, 0.0));
    let device = path.segments();
    assert_eq!(device[1].points[0], (110.0, 20.0));
    // Subpaths split at each m/re.
    let subpaths = path.subpaths();
    assert_eq!(subpaths.len(), 2);
    assert_eq!(subpaths[0].len(), 4);
    assert_eq!(subpaths[1][0].operator, SegmentOp::Rect);
}

#[test]
fn test_stroke_color_on_path() {
    let content = "0.9 0.1 0.2 RG 0.5 g 0 0 m 10 10 l S";
    let doc = open(text_pdf(content)).unwrap();
    let pages = doc.pages();
    let objects: Vec<ContentObject> = pages[0].objects().collect();
    let path = match &objects[0] {
        ContentObject::Path(p) => p,
        _ => panic!("expected path"),
    };
    assert!(path.stroke);
    assert_eq!(path.gstate.scolor.to_vec(), vec![0.9, 0.1, 0.2]);
    assert_eq!(path.gstate.ncolor.to_vec(), vec![0.5]);
    assert_eq!(path.gstate.scs.name, "DeviceRGB");
}

#[test]
fn test_inline_image_object() {
    let content = "BI /W 2 /H 2 /BPC 8 ID\n\x01\x02\x03\x04 EI";
    let doc = open(text_pdf(content)).unwrap();
    let pages = doc.pages();
    let objects: Vec<ContentObject> = pages[0].objects().collect();
    assert_eq!(objects.len(), 1);
    let image = match &objects[0] {
        ContentObject::Image(img) => img,
        _ => panic!("expected image"),
    };
    assert_eq!(image.srcsize, (2, 2));
    assert!(image.name.is_none());
    assert_eq!(image.inline_data.as_deref(), Some(&b"\x01\x02\x03\x04"[..]));
}

#[test]
fn test_image_xobject_bbox_under_ctm() {
    let mut builder = PdfBuilder::new();
    builder
        .add(1, b"<< /Type /Catalog /Pages 2 0 R >>")
        .add(
            2,
            b"<< /Type /Pages /Kids [3 0 R] /Count 1 /MediaBox [0 0 612 792] >>",
        )
        .add(
            3,
            b"<< /Type /Page /Parent 2 0 R /Contents 4 0 R \
               /Resources << /XObject << /Im1 6 0 R >> >> >>",
        )
        .add_stream(4, "", b"q 200 0 0 100 30 40 cm /Im1 Do Q")
        .add_stream(
            6,
            "/Type /XObject /Subtype /Image /Width 16 /Height 8 /BitsPerComponent 8 \
             /ColorSpace /DeviceGray /Filter /DCTDecode",
            b"\xff\xd8 not really jpeg",
        );
    let doc = open(builder.build(1)).unwrap();
    let pages = doc.pages();
    let objects: Vec<ContentObject> = pages[0].objects().collect();
    assert_eq!(objects.len(), 1);
    let image = match &objects[0] {
        ContentObject::Image(img) => img,
        _ => panic!("expected image"),
    };
    // The unit square under the CTM.
    assert_eq!(image.bbox, (30.0, 40.0, 230.0, 140.0));
    assert_eq!(image.srcsize, (16, 8));
}

#[test]
fn test_cjk_tounicode() {
    // A Type0 font with an Adobe-Japan1 encoding CMap and a ToUnicode
    // stream: the two-byte code 0x82 0xA0 maps to HIRAGANA A.
    let tounicode = b"begincmap\n\
        1 begincodespacerange <8140> <FCFC> endcodespacerange\n\
        1 beginbfchar <82A0> <3042> endbfchar\n\
        endcmap";
    let mut builder = PdfBuilder::new();
    builder
        .add(1, b"<< /Type /Catalog /Pages 2 0 R >>")
        .add(
            2,
            b"<< /Type /Pages /Kids [3 0 R] /Count 1 /MediaBox [0 0 612 792] >>",
        )
        .add(
            3,
            b"<< /Type /Page /Parent 2 0 R /Contents 4 0 R /Resources << /Font << /F1 5 0 R >> >> >>",
        )
        .add_stream(4, "", b"BT /F1 12 Tf 100 700 Td <82A0> Tj ET")
        .add(
            5,
            b"<< /Type /Font /Subtype /Type0 /BaseFont /MS-Mincho /Encoding /90ms-RKSJ-H \
               /DescendantFonts [6 0 R] /ToUnicode 7 0 R >>",
        )
        .add(
            6,
            b"<< /Type /Font /Subtype /CIDFontType2 /BaseFont /MS-Mincho /DW 1000 \
               /CIDSystemInfo << /Registry (Adobe) /Ordering (Japan1) /Supplement 7 >> >>",
        )
        .add_stream(7, "", tounicode);
    let doc = open(builder.build(1)).unwrap();
    let pages = doc.pages();
    let objects: Vec<ContentObject> = pages[0].objects().collect();
    let text = match &objects[0] {
        ContentObject::Text(t) => t,
        _ => panic!("expected text"),
    };
    assert_eq!(text.chars(), "あ");
}

#[test]
fn test_page_objects_multiset_invariant_under_reopen() {
    let pdf = text_pdf("BT /F1 10 Tf 50 700 Td (ABC) Tj ET 0 0 m 5 5 l S");
    let chars = |pdf: Vec<u8>| -> (usize, Vec<String>) {
        let doc = open(pdf).unwrap();
        let pages = doc.pages();
        let objects: Vec<ContentObject> = pages[0].objects().collect();
        let texts = objects
            .iter()
            .filter_map(|o| match o {
                ContentObject::Text(t) => Some(t.chars()),
                _ => None,
            })
            .collect();
        (objects.len(), texts)
    };
    let (n1, t1) = chars(pdf.clone());
    let (n2, t2) = chars(pdf);
    assert_eq!(n1, n2);
    assert_eq!(t1, t2);
}

#[test]
fn test_page_tokens() {
    let doc = open(text_pdf("BT /F1 12 Tf (x) Tj ET")).unwrap();
    let pages = doc.pages();
    let tokens: Vec<_> = pages[0].tokens().collect();
    assert!(tokens.len() >= 7);
}
