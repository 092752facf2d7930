//! Filter pipeline tests.

use marea::codec::filters::{apply_filters, apply_png_predictor, filter_specs, FilterSpec};
use marea::PDFObject;
use std::collections::HashMap;
use std::io::Write;

fn zlib_compress(data: &[u8]) -> Vec<u8> {
    let mut encoder =
        flate2::write::ZlibEncoder::new(Vec::new(), flate2::Compression::default());
    encoder.write_all(data).unwrap();
    encoder.finish().unwrap()
}

#[test]
fn test_flate_roundtrip() {
    let original = b"the quick brown fox jumps over the lazy dog".repeat(20);
    let compressed = zlib_compress(&original);
    let specs = vec![FilterSpec {
        name: "FlateDecode".into(),
        parms: None,
    }];
    let (decoded, err) = apply_filters(&compressed, &specs);
    assert!(err.is_none());
    assert_eq!(decoded, original);
}

#[test]
fn test_flate_corrupt_yields_partial_output() {
    let original = b"partial data should still come out".repeat(50);
    let mut compressed = zlib_compress(&original);
    // Chop the tail off: CRC and some deflate data go missing.
    compressed.truncate(compressed.len() - 8);
    let specs = vec![FilterSpec {
        name: "FlateDecode".into(),
        parms: None,
    }];
    let (decoded, err) = apply_filters(&compressed, &specs);
    assert!(err.is_some());
    assert!(!decoded.is_empty());
    assert!(original.starts_with(&decoded) || decoded.starts_with(&original[..decoded.len()]));
}

#[test]
fn test_chained_filters_left_to_right() {
    // ASCIIHex over Flate: decoders run in /Filter order.
    let original = b"chained filter content";
    let compressed = zlib_compress(original);
    let hex: String = compressed.iter().map(|b| format!("{:02x}", b)).collect();
    let mut data = hex.into_bytes();
    data.push(b'>');
    let filter = PDFObject::Array(vec![
        PDFObject::Name("ASCIIHexDecode".into()),
        PDFObject::Name("FlateDecode".into()),
    ]);
    let specs = filter_specs(&filter, None);
    let (decoded, err) = apply_filters(&data, &specs);
    assert!(err.is_none());
    assert_eq!(decoded, original);
}

#[test]
fn test_abbreviations_expand_before_parms_pairing() {
    let filter = PDFObject::Array(vec![
        PDFObject::Name("AHx".into()),
        PDFObject::Name("Fl".into()),
    ]);
    let specs = filter_specs(&filter, None);
    assert_eq!(specs[0].name, "ASCIIHexDecode");
    assert_eq!(specs[1].name, "FlateDecode");
}

#[test]
fn test_decode_parms_positional_pairing() {
    let filter = PDFObject::Array(vec![
        PDFObject::Name("ASCII85Decode".into()),
        PDFObject::Name("FlateDecode".into()),
    ]);
    let mut parms2 = HashMap::new();
    parms2.insert("Predictor".to_string(), PDFObject::Int(12));
    let parms = PDFObject::Array(vec![PDFObject::Null, PDFObject::Dict(parms2)]);
    let specs = filter_specs(&filter, Some(&parms));
    assert!(specs[0].parms.is_none());
    assert_eq!(
        specs[1].parms.as_ref().unwrap().get("Predictor"),
        Some(&PDFObject::Int(12))
    );
}

#[test]
fn test_raster_filters_pass_through() {
    for name in ["DCTDecode", "JPXDecode", "JBIG2Decode", "CCITTFaxDecode", "Crypt"] {
        let specs = vec![FilterSpec {
            name: name.to_string(),
            parms: None,
        }];
        let payload = b"\xff\xd8\xff\xe0 raw image bytes";
        let (decoded, err) = apply_filters(payload, &specs);
        assert!(err.is_none(), "{} errored", name);
        assert_eq!(decoded, payload, "{} altered its payload", name);
    }
}

/// Forward-apply a PNG filter type to rows of data, for round-trip
/// checks against the decoder.
fn png_predict_forward(data: &[u8], columns: usize, filter_type: u8) -> Vec<u8> {
    let mut out = Vec::new();
    let mut prev_row = vec![0u8; columns];
    for row in data.chunks(columns) {
        out.push(filter_type);
        for (i, &b) in row.iter().enumerate() {
            let left = if i >= 1 { row[i - 1] } else { 0 };
            let above = prev_row[i];
            let encoded = match filter_type {
                0 => b,
                1 => b.wrapping_sub(left),
                2 => b.wrapping_sub(above),
                3 => b.wrapping_sub(((left as u16 + above as u16) / 2) as u8),
                _ => b,
            };
            out.push(encoded);
        }
        prev_row = row.to_vec();
    }
    out
}

#[test]
fn test_png_predictor_roundtrip() {
    let original: Vec<u8> = (0u16..128).map(|i| (i * 7 % 256) as u8).collect();
    for filter_type in [0u8, 1, 2, 3] {
        let encoded = png_predict_forward(&original, 16, filter_type);
        let decoded = apply_png_predictor(&encoded, 16, 1, 8);
        assert_eq!(decoded, original, "filter type {}", filter_type);
    }
}

#[test]
fn test_flate_with_png_predictor() {
    let original: Vec<u8> = (0u16..160).map(|i| (i % 251) as u8).collect();
    let predicted = png_predict_forward(&original, 16, 2);
    let compressed = zlib_compress(&predicted);
    let mut parms = HashMap::new();
    parms.insert("Predictor".to_string(), PDFObject::Int(12));
    parms.insert("Columns".to_string(), PDFObject::Int(16));
    let specs = vec![FilterSpec {
        name: "FlateDecode".into(),
        parms: Some(parms),
    }];
    let (decoded, err) = apply_filters(&compressed, &specs);
    assert!(err.is_none());
    assert_eq!(decoded, original);
}

#[test]
fn test_decode_is_idempotent() {
    // Same bytes no matter how many times decoding runs.
    let original = b"idempotence check".repeat(10);
    let compressed = zlib_compress(&original);
    let specs = vec![FilterSpec {
        name: "FlateDecode".into(),
        parms: None,
    }];
    let (first, _) = apply_filters(&compressed, &specs);
    let (second, _) = apply_filters(&compressed, &specs);
    assert_eq!(first, second);
}

#[test]
fn test_runlength_and_ascii85_in_pipeline() {
    // RunLength output fed through nothing else: EOD respected.
    let specs = vec![FilterSpec {
        name: "RunLengthDecode".into(),
        parms: None,
    }];
    let (decoded, err) = apply_filters(b"\x02abc\xfeZ\x80trailing", &specs);
    assert!(err.is_none());
    assert_eq!(decoded, b"abcZZZ");

    let specs = vec![FilterSpec {
        name: "ASCII85Decode".into(),
        parms: None,
    }];
    let (decoded, err) = apply_filters(b"BOu!rDZ~>", &specs);
    assert!(err.is_none());
    assert_eq!(decoded, b"hello");
}
