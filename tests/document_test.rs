//! Document-level tests: open, resolution, memoization, warnings,
//! reconstruction, labels.

mod common;

use common::{hello_world_pdf, PdfBuilder};
use marea::{open, PDFObject};

#[test]
fn test_open_and_catalog() {
    let doc = open(hello_world_pdf("Hi")).unwrap();
    assert_eq!(doc.version(), "1.7");
    assert_eq!(
        doc.catalog().get("Type").unwrap().as_name().unwrap(),
        "Catalog"
    );
    assert!(!doc.is_encrypted());
}

#[test]
fn test_pages_and_inherited_mediabox() {
    let doc = open(hello_world_pdf("Hi")).unwrap();
    let pages = doc.pages();
    assert_eq!(pages.len(), 1);
    let page = &pages[0];
    // MediaBox is inherited from the Pages node.
    assert_eq!(page.mediabox, (0.0, 0.0, 612.0, 792.0));
    assert_eq!(page.rotate, 0);
    assert!(page.resources.contains_key("Font"));
}

#[test]
fn test_resolve_absent_reference_yields_null() {
    let doc = open(hello_world_pdf("Hi")).unwrap();
    // Object 99 is absent from the xref: null, never an error.
    let obj = doc.getobj(99);
    assert!(obj.is_null());
    let resolved = doc.resolve(&PDFObject::Ref(marea::ObjRef::new(99, 0)));
    assert!(resolved.is_null());
}

#[test]
fn test_memoization_determinism() {
    let doc = open(hello_world_pdf("Hi")).unwrap();
    let first = doc.getobj(2);
    let second = doc.getobj(2);
    assert_eq!(*first, *second);
}

#[test]
fn test_reopen_yields_same_objects() {
    let pdf = hello_world_pdf("Hi");
    let doc1 = open(pdf.clone()).unwrap();
    let doc2 = open(pdf).unwrap();
    let objs1: Vec<_> = doc1.objects().collect();
    let objs2: Vec<_> = doc2.objects().collect();
    assert_eq!(objs1.len(), objs2.len());
    for (a, b) in objs1.iter().zip(objs2.iter()) {
        assert_eq!(a.objid, b.objid);
        assert_eq!(a.obj, b.obj);
    }
}

#[test]
fn test_junk_before_header() {
    let mut builder = PdfBuilder::new();
    builder
        .add(1, b"<< /Type /Catalog /Pages 2 0 R >>")
        .add(2, b"<< /Type /Pages /Kids [3 0 R] /Count 1 /MediaBox [0 0 100 100] >>")
        .add(3, b"<< /Type /Page /Parent 2 0 R >>");
    // Junk before %PDF- shifts offsets; reconstruction recovers.
    let pdf = builder.with_junk_prefix(b"PREAMBLE NOISE\n").build(1);
    let doc = open(pdf).unwrap();
    assert_eq!(doc.pages().len(), 1);
}

#[test]
fn test_corrupted_startxref_reconstructs() {
    let mut builder = PdfBuilder::new();
    builder
        .add(1, b"<< /Type /Catalog /Pages 2 0 R >>")
        .add(
            2,
            b"<< /Type /Pages /Kids [3 0 R 4 0 R] /Count 2 /MediaBox [0 0 612 792] >>",
        )
        .add(3, b"<< /Type /Page /Parent 2 0 R >>")
        .add(4, b"<< /Type /Page /Parent 2 0 R >>");
    let pdf = builder.build_with_bad_startxref(1);
    let doc = open(pdf).unwrap();
    // Page count matches ground truth after reconstruction.
    assert_eq!(doc.pages().len(), 2);
    assert!(doc.warnings().iter().any(|w| w.kind == "Xref"));
}

#[test]
fn test_object_iteration_in_objid_order() {
    let doc = open(hello_world_pdf("Hi")).unwrap();
    let ids: Vec<u32> = doc.objects().map(|o| o.objid).collect();
    let mut sorted = ids.clone();
    sorted.sort_unstable();
    assert_eq!(ids, sorted);
    assert!(ids.contains(&1) && ids.contains(&5));
}

#[test]
fn test_page_labels() {
    let mut builder = PdfBuilder::new();
    builder
        .add(
            1,
            b"<< /Type /Catalog /Pages 2 0 R /PageLabels << /Nums [0 << /S /r >> 2 << /S /D /St 1 /P (A-) >>] >> >>",
        )
        .add(
            2,
            b"<< /Type /Pages /Kids [3 0 R 4 0 R 5 0 R 6 0 R] /Count 4 /MediaBox [0 0 100 100] >>",
        )
        .add(3, b"<< /Type /Page /Parent 2 0 R >>")
        .add(4, b"<< /Type /Page /Parent 2 0 R >>")
        .add(5, b"<< /Type /Page /Parent 2 0 R >>")
        .add(6, b"<< /Type /Page /Parent 2 0 R >>");
    let pdf = builder.build(1);
    let doc = open(pdf).unwrap();
    let pages = doc.pages();
    let labels: Vec<String> = pages.iter().map(|p| p.label.clone().unwrap()).collect();
    assert_eq!(labels, vec!["i", "ii", "A-1", "A-2"]);
    // Lookup by label and by logical page number string.
    assert_eq!(pages.by_label("ii").unwrap().page_idx, 1);
    assert_eq!(pages.by_label("4").unwrap().page_idx, 3);
}

#[test]
fn test_outlines() {
    let mut builder = PdfBuilder::new();
    builder
        .add(
            1,
            b"<< /Type /Catalog /Pages 2 0 R /Outlines 4 0 R >>",
        )
        .add(
            2,
            b"<< /Type /Pages /Kids [3 0 R] /Count 1 /MediaBox [0 0 100 100] >>",
        )
        .add(3, b"<< /Type /Page /Parent 2 0 R >>")
        .add(4, b"<< /Type /Outlines /First 5 0 R /Last 6 0 R >>")
        .add(
            5,
            b"<< /Title (Chapter 1) /Parent 4 0 R /Next 6 0 R /Dest [3 0 R /Fit] >>",
        )
        .add(6, b"<< /Title (Chapter 2) /Parent 4 0 R /Prev 5 0 R >>");
    let doc = open(builder.build(1)).unwrap();
    let outlines = doc.outlines();
    assert_eq!(outlines.len(), 2);
    assert_eq!(outlines[0].title, "Chapter 1");
    assert_eq!(outlines[1].title, "Chapter 2");
    assert!(outlines[0].dest.is_some());
}

#[test]
fn test_structtree() {
    let mut builder = PdfBuilder::new();
    builder
        .add(
            1,
            b"<< /Type /Catalog /Pages 2 0 R /StructTreeRoot 5 0 R >>",
        )
        .add(
            2,
            b"<< /Type /Pages /Kids [3 0 R] /Count 1 /MediaBox [0 0 100 100] >>",
        )
        .add(3, b"<< /Type /Page /Parent 2 0 R >>")
        .add(5, b"<< /Type /StructTreeRoot /K 6 0 R >>")
        .add(
            6,
            b"<< /Type /StructElem /S /Document /K [7 0 R] >>",
        )
        .add(
            7,
            b"<< /Type /StructElem /S /P /Pg 3 0 R /K [0 1] >>",
        );
    let doc = open(builder.build(1)).unwrap();
    let tree = doc.structtree().expect("tagged document");
    assert_eq!(tree.elements.len(), 1);
    assert_eq!(tree.elements[0].role, "Document");
    let children = &tree.elements[0].children;
    assert_eq!(children.len(), 1);
    assert_eq!(children[0].role, "P");
    assert_eq!(children[0].mcids, vec![0, 1]);
    let on_page = tree.on_page(3);
    assert_eq!(on_page.len(), 1);
}

#[test]
fn test_tokens_iteration() {
    let doc = open(hello_world_pdf("Hi")).unwrap();
    let count = doc.tokens().count();
    assert!(count > 20);
}
