//! The stream filter pipeline.
//!
//! A stream's `/Filter` entry names one or more decoders, applied left to
//! right, each optionally parameterized by the positionally-matching
//! `/DecodeParms` entry. Raster codecs (CCITT, JBIG2, DCT, JPX) pass
//! their payload through unchanged; decoding imagery is not this crate's
//! concern.

use super::ascii85::{ascii85_decode, asciihex_decode};
use super::lzw::lzw_decode_with_earlychange;
use super::runlength::rl_decode;
use crate::error::{PdfError, Result};
use crate::model::objects::PDFObject;
use std::collections::HashMap;

/// One entry of the filter chain after name normalization.
#[derive(Debug, Clone, Default)]
pub struct FilterSpec {
    pub name: String,
    pub parms: Option<HashMap<String, PDFObject>>,
}

/// Expand the short filter names allowed in inline image dictionaries.
/// Expansion happens before `DecodeParms` pairing, so abbreviated and
/// canonical spellings share one code path.
pub fn expand_filter_name(name: &str) -> &str {
    match name {
        "AHx" => "ASCIIHexDecode",
        "A85" => "ASCII85Decode",
        "LZW" => "LZWDecode",
        "Fl" => "FlateDecode",
        "RL" => "RunLengthDecode",
        "CCF" => "CCITTFaxDecode",
        "DCT" => "DCTDecode",
        other => other,
    }
}

/// Pair a resolved `/Filter` value with its `/DecodeParms` positionally.
pub fn filter_specs(
    filter: &PDFObject,
    parms: Option<&PDFObject>,
) -> Vec<FilterSpec> {
    let names: Vec<String> = match filter {
        PDFObject::Name(name) => vec![name.clone()],
        PDFObject::Array(arr) => arr
            .iter()
            .filter_map(|v| v.as_name().ok().map(str::to_string))
            .collect(),
        _ => Vec::new(),
    };
    let parms_list: Vec<Option<HashMap<String, PDFObject>>> = match parms {
        Some(PDFObject::Dict(d)) => vec![Some(d.clone())],
        Some(PDFObject::Array(arr)) => arr
            .iter()
            .map(|v| match v {
                PDFObject::Dict(d) => Some(d.clone()),
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    };
    names
        .into_iter()
        .enumerate()
        .map(|(i, name)| FilterSpec {
            name: expand_filter_name(&name).to_string(),
            parms: parms_list.get(i).cloned().flatten(),
        })
        .collect()
}

/// Apply a chain of decoders. On failure, the bytes decoded so far are
/// returned together with the error so the caller can record a warning
/// and continue with partial data.
pub fn apply_filters(data: &[u8], specs: &[FilterSpec]) -> (Vec<u8>, Option<PdfError>) {
    let mut output = data.to_vec();
    for spec in specs {
        match apply_one(&output, spec) {
            Ok(decoded) => output = decoded,
            Err((partial, err)) => return (partial, Some(err)),
        }
    }
    (output, None)
}

fn apply_one(data: &[u8], spec: &FilterSpec) -> std::result::Result<Vec<u8>, (Vec<u8>, PdfError)> {
    let parms = spec.parms.as_ref();
    let decoded = match spec.name.as_str() {
        "FlateDecode" => {
            let (out, err) = flate_decode(data);
            match err {
                None => out,
                Some(msg) if !out.is_empty() => {
                    // Partial output is usable; the caller records the rest.
                    return Err((
                        maybe_predict(out, parms),
                        PdfError::Filter { pos: None, msg },
                    ));
                }
                Some(msg) => return Err((out, PdfError::Filter { pos: None, msg })),
            }
        }
        "LZWDecode" => {
            let early = parm_int(parms, "EarlyChange").unwrap_or(1);
            lzw_decode_with_earlychange(data, early)
        }
        "ASCII85Decode" => ascii85_decode(data),
        "ASCIIHexDecode" => asciihex_decode(data),
        "RunLengthDecode" => rl_decode(data),
        // Raster codecs and per-stream Crypt pass through unchanged.
        "CCITTFaxDecode" | "JBIG2Decode" | "DCTDecode" | "JPXDecode" | "Crypt" => {
            return Ok(data.to_vec())
        }
        other => {
            return Err((
                data.to_vec(),
                PdfError::Unsupported {
                    msg: format!("unknown filter /{}", other),
                },
            ))
        }
    };
    Ok(maybe_predict(decoded, parms))
}

fn parm_int(parms: Option<&HashMap<String, PDFObject>>, key: &str) -> Option<i64> {
    parms.and_then(|p| p.get(key)).and_then(|v| v.as_int().ok())
}

/// Apply the PNG predictor family when `/Predictor >= 10`. Predictor 1
/// (none) and 2 (TIFF, rarely meaningful for text extraction) pass
/// through.
fn maybe_predict(data: Vec<u8>, parms: Option<&HashMap<String, PDFObject>>) -> Vec<u8> {
    let predictor = parm_int(parms, "Predictor").unwrap_or(1);
    if predictor < 10 {
        return data;
    }
    let columns = parm_int(parms, "Columns").unwrap_or(1).max(1) as usize;
    let colors = parm_int(parms, "Colors").unwrap_or(1).max(1) as usize;
    let bits = parm_int(parms, "BitsPerComponent").unwrap_or(8).max(1) as usize;
    apply_png_predictor(&data, columns, colors, bits)
}

/// Reverse PNG row prediction: each row is prefixed by a filter-type
/// byte (0 none, 1 sub, 2 up, 3 average, 4 paeth).
pub fn apply_png_predictor(data: &[u8], columns: usize, colors: usize, bits: usize) -> Vec<u8> {
    let row_bytes = (colors * columns * bits + 7) / 8;
    let bpp = std::cmp::max(1, colors * bits / 8);
    let row_size = row_bytes + 1;
    if row_bytes == 0 {
        return Vec::new();
    }

    let mut result = Vec::with_capacity(data.len());
    let mut prev_row = vec![0u8; row_bytes];

    for row_start in (0..data.len()).step_by(row_size) {
        if row_start + row_size > data.len() {
            break;
        }
        let filter_type = data[row_start];
        let row_data = &data[row_start + 1..row_start + row_size];
        let mut current = vec![0u8; row_bytes];
        match filter_type {
            0 => current.copy_from_slice(row_data),
            1 => {
                for i in 0..row_bytes {
                    let left = if i >= bpp { current[i - bpp] } else { 0 };
                    current[i] = row_data[i].wrapping_add(left);
                }
            }
            2 => {
                for i in 0..row_bytes {
                    current[i] = row_data[i].wrapping_add(prev_row[i]);
                }
            }
            3 => {
                for i in 0..row_bytes {
                    let left = if i >= bpp { current[i - bpp] as u16 } else { 0 };
                    let above = prev_row[i] as u16;
                    current[i] = row_data[i].wrapping_add(((left + above) / 2) as u8);
                }
            }
            4 => {
                for i in 0..row_bytes {
                    let left = if i >= bpp { current[i - bpp] } else { 0 };
                    let above = prev_row[i];
                    let upper_left = if i >= bpp { prev_row[i - bpp] } else { 0 };
                    current[i] = row_data[i].wrapping_add(paeth(left, above, upper_left));
                }
            }
            _ => current.copy_from_slice(row_data),
        }
        result.extend_from_slice(&current);
        prev_row = current;
    }
    result
}

const fn paeth(left: u8, above: u8, upper_left: u8) -> u8 {
    let a = left as i32;
    let b = above as i32;
    let c = upper_left as i32;
    let p = a + b - c;
    let pa = (p - a).abs();
    let pb = (p - b).abs();
    let pc = (p - c).abs();
    if pa <= pb && pa <= pc {
        left
    } else if pb <= pc {
        above
    } else {
        upper_left
    }
}

/// Zlib-decompress, degrading to byte-at-a-time decompression to salvage
/// the prefix of a corrupted stream (typically CRC damage near the end).
fn flate_decode(data: &[u8]) -> (Vec<u8>, Option<String>) {
    use std::io::Read;
    let mut decoder = flate2::read::ZlibDecoder::new(data);
    let mut out = Vec::new();
    match decoder.read_to_end(&mut out) {
        Ok(_) => (out, None),
        Err(err) => {
            let partial = flate_decode_corrupted(data);
            if partial.len() > out.len() {
                (partial, Some(err.to_string()))
            } else {
                (out, Some(err.to_string()))
            }
        }
    }
}

fn flate_decode_corrupted(data: &[u8]) -> Vec<u8> {
    use flate2::{Decompress, FlushDecompress, Status};
    let mut decoder = Decompress::new(true);
    let mut out = Vec::with_capacity(data.len() * 2);
    let mut buf = [0u8; 4096];
    let mut i = 0usize;
    while i < data.len() {
        let before_out = decoder.total_out();
        let before_in = decoder.total_in();
        let res = decoder.decompress(&data[i..i + 1], &mut buf, FlushDecompress::None);
        let produced = (decoder.total_out() - before_out) as usize;
        if produced > 0 {
            out.extend_from_slice(&buf[..produced]);
        }
        let consumed = (decoder.total_in() - before_in) as usize;
        i += consumed.max(1);
        match res {
            Ok(Status::StreamEnd) | Err(_) => break,
            Ok(_) => {}
        }
    }
    out
}

/// Decode with a resolved filter chain, recording any failure as a
/// warning-shaped result.
pub fn decode_with_specs(data: &[u8], specs: &[FilterSpec]) -> Result<Vec<u8>> {
    match apply_filters(data, specs) {
        (out, None) => Ok(out),
        (_, Some(err)) => Err(err),
    }
}
