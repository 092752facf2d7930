//! Font resolution tests: widths, encodings, ToUnicode, fallbacks.

mod common;

use common::PdfBuilder;
use marea::font::cmap::parse_cmap;
use marea::open;

fn doc_with_font(font_body: &[u8], extra: impl FnOnce(&mut PdfBuilder)) -> marea::Document {
    let mut builder = PdfBuilder::new();
    builder
        .add(1, b"<< /Type /Catalog /Pages 2 0 R >>")
        .add(
            2,
            b"<< /Type /Pages /Kids [3 0 R] /Count 1 /MediaBox [0 0 612 792] >>",
        )
        .add(3, b"<< /Type /Page /Parent 2 0 R >>")
        .add(5, font_body);
    extra(&mut builder);
    open(builder.build(1)).unwrap()
}

#[test]
fn test_simple_font_widths_and_missing_width() {
    let doc = doc_with_font(
        b"<< /Type /Font /Subtype /Type1 /BaseFont /Foo /FirstChar 65 \
           /Widths [500 600 700] /FontDescriptor 6 0 R >>",
        |builder| {
            builder.add(
                6,
                b"<< /Type /FontDescriptor /FontName /Foo /MissingWidth 250 /Descent -200 /Ascent 700 >>",
            );
        },
    );
    let spec = doc.getobj(5).as_dict().unwrap().clone();
    let font = doc.get_font(Some(5), &spec);
    // /Widths[code - /FirstChar], already in text space units.
    assert!((font.char_width(65) - 0.5).abs() < 1e-9);
    assert!((font.char_width(66) - 0.6).abs() < 1e-9);
    // Fallback to /MissingWidth.
    assert!((font.char_width(64) - 0.25).abs() < 1e-9);
    assert!((font.descent() - -200.0).abs() < 1e-9);
}

#[test]
fn test_simple_font_winansi_decode() {
    let doc = doc_with_font(
        b"<< /Type /Font /Subtype /Type1 /BaseFont /Helv /Encoding /WinAnsiEncoding >>",
        |_| {},
    );
    let spec = doc.getobj(5).as_dict().unwrap().clone();
    let font = doc.get_font(Some(5), &spec);
    let decoded = font.decode(b"Ab\xe9");
    assert_eq!(decoded.len(), 3);
    assert_eq!(decoded[0], (65, Some("A".to_string())));
    assert_eq!(decoded[1], (98, Some("b".to_string())));
    assert_eq!(decoded[2], (0xE9, Some("é".to_string())));
}

#[test]
fn test_encoding_differences() {
    let doc = doc_with_font(
        b"<< /Type /Font /Subtype /Type1 /BaseFont /Helv \
           /Encoding << /BaseEncoding /WinAnsiEncoding /Differences [65 /eacute] >> >>",
        |_| {},
    );
    let spec = doc.getobj(5).as_dict().unwrap().clone();
    let font = doc.get_font(Some(5), &spec);
    let decoded = font.decode(b"AB");
    assert_eq!(decoded[0].1.as_deref(), Some("é"));
    assert_eq!(decoded[1].1.as_deref(), Some("B"));
}

#[test]
fn test_unknown_subtype_empty_unicode_zero_width() {
    // An unknown /Subtype falls back to empty Unicode and 0 advance.
    let doc = doc_with_font(
        b"<< /Type /Font /Subtype /Weird /BaseFont /Mystery >>",
        |_| {},
    );
    let spec = doc.getobj(5).as_dict().unwrap().clone();
    let font = doc.get_font(Some(5), &spec);
    assert!((font.char_width(65) - 0.0).abs() < 1e-12);
    // Unicode is empty, never guessed from the code value.
    assert_eq!(font.decode(b"A"), vec![(65, None)]);
    assert!(doc.warnings().iter().any(|w| w.kind == "Font"));
}

#[test]
fn test_type0_identity_with_tounicode() {
    let tounicode = b"/CIDInit /ProcSet findresource begin\n\
        begincmap\n\
        1 begincodespacerange <0000> <FFFF> endcodespacerange\n\
        1 beginbfchar <0042> <0058> endbfchar\n\
        endcmap end";
    let mut builder = PdfBuilder::new();
    builder
        .add(1, b"<< /Type /Catalog /Pages 2 0 R >>")
        .add(
            2,
            b"<< /Type /Pages /Kids [3 0 R] /Count 1 /MediaBox [0 0 612 792] >>",
        )
        .add(3, b"<< /Type /Page /Parent 2 0 R >>")
        .add(
            5,
            b"<< /Type /Font /Subtype /Type0 /BaseFont /CJK /Encoding /Identity-H \
               /DescendantFonts [6 0 R] /ToUnicode 7 0 R >>",
        )
        .add(
            6,
            b"<< /Type /Font /Subtype /CIDFontType2 /BaseFont /CJK /DW 1000 \
               /W [66 [750]] /CIDSystemInfo << /Registry (Adobe) /Ordering (Identity) /Supplement 0 >> >>",
        )
        .add_stream(7, "", tounicode);
    let doc = open(builder.build(1)).unwrap();
    let spec = doc.getobj(5).as_dict().unwrap().clone();
    let font = doc.get_font(Some(5), &spec);
    assert!(font.is_multibyte());
    // Two bytes per code under Identity-H.
    let decoded = font.decode(&[0x00, 0x42]);
    assert_eq!(decoded, vec![(0x42, Some("X".to_string()))]);
    // /W widths with /DW fallback.
    assert!((font.char_width(0x42) - 0.75).abs() < 1e-9);
    assert!((font.char_width(0x43) - 1.0).abs() < 1e-9);
}

#[test]
fn test_tounicode_bfrange_roundtrip() {
    // Building a map from bfchar/bfrange entries and querying each
    // source code returns the declared target.
    let cmap = b"2 beginbfchar\n<01> <0041>\n<02> <0042>\nendbfchar\n\
                 1 beginbfrange\n<10> <19> <0061>\nendbfrange";
    let parsed = parse_cmap(cmap);
    assert_eq!(parsed.unicode.get(0x01).as_deref(), Some("A"));
    assert_eq!(parsed.unicode.get(0x02).as_deref(), Some("B"));
    for (i, expected) in ("abcdefghij").chars().enumerate() {
        let got = parsed.unicode.get(0x10 + i as u32).unwrap();
        assert_eq!(got, expected.to_string());
    }
}

#[test]
fn test_vertical_font_w2() {
    let mut builder = PdfBuilder::new();
    builder
        .add(1, b"<< /Type /Catalog /Pages 2 0 R >>")
        .add(
            2,
            b"<< /Type /Pages /Kids [3 0 R] /Count 1 /MediaBox [0 0 612 792] >>",
        )
        .add(3, b"<< /Type /Page /Parent 2 0 R >>")
        .add(
            5,
            b"<< /Type /Font /Subtype /Type0 /BaseFont /VertCJK /Encoding /Identity-V \
               /DescendantFonts [6 0 R] >>",
        )
        .add(
            6,
            b"<< /Type /Font /Subtype /CIDFontType0 /BaseFont /VertCJK \
               /DW2 [880 -1000] /W2 [10 [-900 500 880]] \
               /CIDSystemInfo << /Registry (Adobe) /Ordering (Japan1) /Supplement 7 >> >>",
        );
    let doc = open(builder.build(1)).unwrap();
    let spec = doc.getobj(5).as_dict().unwrap().clone();
    let font = doc.get_font(Some(5), &spec);
    assert!(font.is_vertical());
    // W2 entry: cid 10 gets w1y -900 (so -0.9 in text space).
    assert!((font.char_width(10) - -0.9).abs() < 1e-9);
    // DW2 default vertical advance.
    assert!((font.char_width(11) - -1.0).abs() < 1e-9);
    match font.char_disp(10) {
        marea::font::pdffont::CharDisp::Vertical(Some(vx), vy) => {
            assert!((vx - 500.0).abs() < 1e-9);
            assert!((vy - 880.0).abs() < 1e-9);
        }
        other => panic!("expected vertical disp, got {:?}", other),
    }
}
