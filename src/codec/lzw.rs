//! LZW stream decoder.

use weezl::{decode::Decoder, BitOrder};

/// Decode LZW data in the PDF variant (MSB-first bit order, 8-bit
/// symbols) with the default EarlyChange of 1.
pub fn lzw_decode(data: &[u8]) -> Vec<u8> {
    lzw_decode_with_earlychange(data, 1)
}

/// Decode LZW data with an explicit EarlyChange setting. EarlyChange=0
/// switches code sizes one code later (the TIFF convention).
///
/// Corrupt input yields the bytes decoded up to the failure.
pub fn lzw_decode_with_earlychange(data: &[u8], early_change: i64) -> Vec<u8> {
    let mut decoder = if early_change == 0 {
        Decoder::with_tiff_size_switch(BitOrder::Msb, 8)
    } else {
        Decoder::new(BitOrder::Msb, 8)
    };
    let mut output = Vec::new();
    let _ = decoder.into_vec(&mut output).decode(data);
    output
}
