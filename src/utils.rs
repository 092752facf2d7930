//! Geometry and text decoding helpers.

/// A point in user or device space.
pub type Point = (f64, f64);

/// A rectangle as (x0, y0, x1, y1).
pub type Rect = (f64, f64, f64, f64);

/// A 3x2 affine transformation matrix (a, b, c, d, e, f):
///
/// ```text
/// | a b 0 |
/// | c d 0 |
/// | e f 1 |
/// ```
pub type Matrix = (f64, f64, f64, f64, f64, f64);

/// The identity matrix.
pub const MATRIX_IDENTITY: Matrix = (1.0, 0.0, 0.0, 1.0, 0.0, 0.0);

/// Multiply two matrices: the result applies `m1` first, then `m0`.
pub fn mult_matrix(m1: Matrix, m0: Matrix) -> Matrix {
    let (a1, b1, c1, d1, e1, f1) = m1;
    let (a0, b0, c0, d0, e0, f0) = m0;
    (
        a0 * a1 + c0 * b1,
        b0 * a1 + d0 * b1,
        a0 * c1 + c0 * d1,
        b0 * c1 + d0 * d1,
        a0 * e1 + c0 * f1 + e0,
        b0 * e1 + d0 * f1 + f0,
    )
}

/// Pre-translate a matrix by a vector.
pub fn translate_matrix(m: Matrix, v: Point) -> Matrix {
    let (a, b, c, d, e, f) = m;
    let (x, y) = v;
    (a, b, c, d, x * a + y * c + e, x * b + y * d + f)
}

/// Apply a matrix to a point.
pub fn apply_matrix_pt(m: Matrix, v: Point) -> Point {
    let (a, b, c, d, e, f) = m;
    let (x, y) = v;
    (a * x + c * y + e, b * x + d * y + f)
}

/// Apply a matrix to a vector, ignoring translation.
pub fn apply_matrix_norm(m: Matrix, v: Point) -> Point {
    let (a, b, c, d, _, _) = m;
    let (x, y) = v;
    (a * x + c * y, b * x + d * y)
}

/// Bounding box of a set of points.
pub fn get_bound(pts: &[Point]) -> Rect {
    let mut x0 = f64::INFINITY;
    let mut y0 = f64::INFINITY;
    let mut x1 = f64::NEG_INFINITY;
    let mut y1 = f64::NEG_INFINITY;
    for &(x, y) in pts {
        x0 = x0.min(x);
        y0 = y0.min(y);
        x1 = x1.max(x);
        y1 = y1.max(y);
    }
    (x0, y0, x1, y1)
}

/// Apply a matrix to all four corners of a rectangle and take the bound.
pub fn apply_matrix_rect(m: Matrix, rect: Rect) -> Rect {
    let (x0, y0, x1, y1) = rect;
    get_bound(&[
        apply_matrix_pt(m, (x0, y0)),
        apply_matrix_pt(m, (x1, y0)),
        apply_matrix_pt(m, (x0, y1)),
        apply_matrix_pt(m, (x1, y1)),
    ])
}

/// Normalize a rectangle so x0 <= x1 and y0 <= y1.
pub fn normalize_rect(rect: Rect) -> Rect {
    let (x0, y0, x1, y1) = rect;
    (x0.min(x1), y0.min(y1), x0.max(x1), y0.max(y1))
}

/// Unpack up to 8 big-endian bytes into an unsigned integer.
///
/// An empty slice yields `default` (used by xref stream fields with a
/// zero width).
pub fn nunpack(bytes: &[u8], default: u64) -> u64 {
    if bytes.is_empty() {
        return default;
    }
    let mut val: u64 = 0;
    for &b in bytes.iter().take(8) {
        val = (val << 8) | b as u64;
    }
    val
}

/// Decode a PDF text string: UTF-16 (with BOM) or PDFDocEncoding.
///
/// PDFDocEncoding agrees with Latin-1 over the printable range, which is
/// the approximation used here for the handful of divergent code points.
pub fn decode_text(data: &[u8]) -> String {
    if data.starts_with(&[0xFE, 0xFF]) {
        let units: Vec<u16> = data[2..]
            .chunks_exact(2)
            .map(|c| u16::from_be_bytes([c[0], c[1]]))
            .collect();
        String::from_utf16_lossy(&units)
    } else if data.starts_with(&[0xFF, 0xFE]) {
        let units: Vec<u16> = data[2..]
            .chunks_exact(2)
            .map(|c| u16::from_le_bytes([c[0], c[1]]))
            .collect();
        String::from_utf16_lossy(&units)
    } else {
        data.iter().map(|&b| b as char).collect()
    }
}

/// Format an integer in Roman numerals (uppercase).
pub fn format_roman(mut value: u64) -> String {
    const NUMERALS: &[(u64, &str)] = &[
        (1000, "M"),
        (900, "CM"),
        (500, "D"),
        (400, "CD"),
        (100, "C"),
        (90, "XC"),
        (50, "L"),
        (40, "XL"),
        (10, "X"),
        (9, "IX"),
        (5, "V"),
        (4, "IV"),
        (1, "I"),
    ];
    let mut out = String::new();
    for &(n, s) in NUMERALS {
        while value >= n {
            out.push_str(s);
            value -= n;
        }
    }
    out
}

/// Format an integer in the A, B, ..., Z, AA, AB, ... style.
pub fn format_letters(value: u64) -> String {
    if value == 0 {
        return String::new();
    }
    let letter = (b'A' + ((value - 1) % 26) as u8) as char;
    let count = (value - 1) / 26 + 1;
    std::iter::repeat(letter).take(count as usize).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mult_matrix_identity() {
        let m = (2.0, 0.0, 0.0, 3.0, 4.0, 5.0);
        assert_eq!(mult_matrix(m, MATRIX_IDENTITY), m);
        assert_eq!(mult_matrix(MATRIX_IDENTITY, m), m);
    }

    #[test]
    fn test_apply_matrix_pt_translate() {
        let m = (1.0, 0.0, 0.0, 1.0, 10.0, 20.0);
        assert_eq!(apply_matrix_pt(m, (1.0, 2.0)), (11.0, 22.0));
    }

    #[test]
    fn test_nunpack() {
        assert_eq!(nunpack(&[], 7), 7);
        assert_eq!(nunpack(&[0x01, 0x00], 0), 256);
        assert_eq!(nunpack(&[0xFF], 0), 255);
    }

    #[test]
    fn test_roman_letters() {
        assert_eq!(format_roman(1989), "MCMLXXXIX");
        assert_eq!(format_letters(1), "A");
        assert_eq!(format_letters(26), "Z");
        assert_eq!(format_letters(27), "AA");
    }
}
