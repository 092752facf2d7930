//! Encoding database: named simple-font encodings, /Differences, and
//! glyph-name to Unicode resolution.

use super::latin_enc::ENCODING;
use std::collections::HashMap;
use std::sync::OnceLock;

fn glyph_table() -> &'static HashMap<&'static str, char> {
    static TABLE: OnceLock<HashMap<&'static str, char>> = OnceLock::new();
    TABLE.get_or_init(|| {
        let mut map = HashMap::with_capacity(ENCODING.len() + SYMBOL_GLYPHS.len() + 32);
        for &(name, ch, _, _, _, _) in ENCODING {
            map.insert(name, ch);
        }
        for &(name, ch) in SYMBOL_GLYPHS {
            map.insert(name, ch);
        }
        for &(name, ch) in DINGBAT_GLYPHS {
            map.insert(name, ch);
        }
        map
    })
}

/// Greek and mathematical glyph names used by the Symbol font.
const SYMBOL_GLYPHS: &[(&str, char)] = &[
    ("Alpha", 'Α'),
    ("Beta", 'Β'),
    ("Gamma", 'Γ'),
    ("Delta", 'Δ'),
    ("Epsilon", 'Ε'),
    ("Zeta", 'Ζ'),
    ("Eta", 'Η'),
    ("Theta", 'Θ'),
    ("Iota", 'Ι'),
    ("Kappa", 'Κ'),
    ("Lambda", 'Λ'),
    ("Mu", 'Μ'),
    ("Nu", 'Ν'),
    ("Xi", 'Ξ'),
    ("Omicron", 'Ο'),
    ("Pi", 'Π'),
    ("Rho", 'Ρ'),
    ("Sigma", 'Σ'),
    ("Tau", 'Τ'),
    ("Upsilon", 'Υ'),
    ("Phi", 'Φ'),
    ("Chi", 'Χ'),
    ("Psi", 'Ψ'),
    ("Omega", 'Ω'),
    ("alpha", 'α'),
    ("beta", 'β'),
    ("gamma", 'γ'),
    ("delta", 'δ'),
    ("epsilon", 'ε'),
    ("zeta", 'ζ'),
    ("eta", 'η'),
    ("theta", 'θ'),
    ("iota", 'ι'),
    ("kappa", 'κ'),
    ("lambda", 'λ'),
    ("mu", 'μ'),
    ("nu", 'ν'),
    ("xi", 'ξ'),
    ("omicron", 'ο'),
    ("pi", 'π'),
    ("rho", 'ρ'),
    ("sigma", 'σ'),
    ("sigma1", 'ς'),
    ("tau", 'τ'),
    ("upsilon", 'υ'),
    ("phi", 'φ'),
    ("phi1", 'ϕ'),
    ("chi", 'χ'),
    ("psi", 'ψ'),
    ("omega", 'ω'),
    ("infinity", '∞'),
    ("plusminus", '±'),
    ("lessequal", '≤'),
    ("greaterequal", '≥'),
    ("notequal", '≠'),
    ("approxequal", '≈'),
    ("element", '∈'),
    ("partialdiff", '∂'),
    ("summation", '∑'),
    ("product", '∏'),
    ("radical", '√'),
    ("integral", '∫'),
    ("arrowright", '→'),
    ("arrowleft", '←'),
    ("arrowup", '↑'),
    ("arrowdown", '↓'),
];

/// The handful of ZapfDingbats names that have direct Unicode mappings.
const DINGBAT_GLYPHS: &[(&str, char)] = &[
    ("a1", '✁'),
    ("a2", '✂'),
    ("a9", '✇'),
    ("a10", '✈'),
    ("a11", '☞'),
    ("a12", '☜'),
    ("a14", '☝'),
    ("a15", '☟'),
    ("a19", '✓'),
    ("a20", '✔'),
    ("a21", '✕'),
    ("a24", '✗'),
    ("a35", '✦'),
    ("a69", '❏'),
    ("a71", '❑'),
    ("a75", '❘'),
    ("a100", '❛'),
    ("a101", '❜'),
    ("a102", '❝'),
    ("a103", '❞'),
];

/// Resolve a glyph name to a Unicode string following the Adobe Glyph
/// Naming convention: a suffix after "." is stripped, "_" joins
/// components, "uniXXXX" and "uXXXXXX" forms decode hex, everything else
/// consults the glyph table.
pub fn name2unicode(name: &str) -> Option<String> {
    let name = name.split('.').next().unwrap_or("");
    if name.is_empty() || name == "notdef" {
        return None;
    }
    let mut result = String::new();
    for part in name.split('_') {
        result.push_str(&decode_component(part)?);
    }
    Some(result)
}

fn decode_component(name: &str) -> Option<String> {
    if let Some(hex) = name.strip_prefix("uni") {
        if hex.len() >= 4 && hex.len() % 4 == 0 && hex.bytes().all(|b| b.is_ascii_hexdigit()) {
            let mut out = String::new();
            for chunk in hex.as_bytes().chunks(4) {
                let cp = u32::from_str_radix(std::str::from_utf8(chunk).ok()?, 16).ok()?;
                if (0xD800..=0xDFFF).contains(&cp) {
                    return None;
                }
                out.push(char::from_u32(cp)?);
            }
            return Some(out);
        }
    }
    if let Some(hex) = name.strip_prefix('u') {
        if (4..=6).contains(&hex.len()) && hex.bytes().all(|b| b.is_ascii_hexdigit()) {
            let cp = u32::from_str_radix(hex, 16).ok()?;
            return Some(char::from_u32(cp)?.to_string());
        }
    }
    glyph_table().get(name).map(|&ch| ch.to_string())
}

/// An entry of a /Differences array.
#[derive(Debug, Clone)]
pub enum DiffEntry {
    Code(u8),
    Name(String),
}

/// Build a byte-code to Unicode map for a named base encoding,
/// optionally patched by a /Differences array.
pub fn get_encoding(name: &str, differences: Option<&[DiffEntry]>) -> HashMap<u8, String> {
    let column = match name {
        "StandardEncoding" => 0,
        "MacRomanEncoding" => 1,
        "WinAnsiEncoding" => 2,
        "PDFDocEncoding" => 3,
        "MacExpertEncoding" => 0, // expert glyph positions are not text-meaningful
        _ => 0,
    };
    let mut encoding = HashMap::with_capacity(256);
    for &(_, ch, std, mac, win, pdf) in ENCODING {
        let code = match column {
            1 => mac,
            2 => win,
            3 => pdf,
            _ => std,
        };
        if let Some(code) = code {
            encoding.insert(code, ch.to_string());
        }
    }
    if let Some(diffs) = differences {
        let mut current: Option<u8> = None;
        for entry in diffs {
            match entry {
                DiffEntry::Code(code) => current = Some(*code),
                DiffEntry::Name(glyph) => {
                    if let Some(code) = current {
                        match name2unicode(glyph) {
                            Some(s) => {
                                encoding.insert(code, s);
                            }
                            None => {
                                encoding.remove(&code);
                            }
                        }
                        current = code.checked_add(1);
                    }
                }
            }
        }
    }
    encoding
}

/// True for the named encodings the Unicode resolution order knows.
pub fn is_known_encoding(name: &str) -> bool {
    matches!(
        name,
        "StandardEncoding"
            | "MacRomanEncoding"
            | "WinAnsiEncoding"
            | "PDFDocEncoding"
            | "MacExpertEncoding"
            | "Symbol"
            | "ZapfDingbats"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_name2unicode_forms() {
        assert_eq!(name2unicode("A").as_deref(), Some("A"));
        assert_eq!(name2unicode("eacute").as_deref(), Some("é"));
        assert_eq!(name2unicode("uni0041").as_deref(), Some("A"));
        assert_eq!(name2unicode("uni00410042").as_deref(), Some("AB"));
        assert_eq!(name2unicode("u1F600").as_deref(), Some("😀"));
        assert_eq!(name2unicode("f_i").as_deref(), Some("fi"));
        assert_eq!(name2unicode("A.sc").as_deref(), Some("A"));
        assert_eq!(name2unicode(".notdef"), None);
    }

    #[test]
    fn test_winansi_encoding() {
        let enc = get_encoding("WinAnsiEncoding", None);
        assert_eq!(enc.get(&65).map(String::as_str), Some("A"));
        assert_eq!(enc.get(&0x80).map(String::as_str), Some("\u{20AC}"));
        assert_eq!(enc.get(&0xE9).map(String::as_str), Some("é"));
    }

    #[test]
    fn test_differences() {
        let diffs = vec![
            DiffEntry::Code(65),
            DiffEntry::Name("eacute".into()),
            DiffEntry::Name("egrave".into()),
        ];
        let enc = get_encoding("WinAnsiEncoding", Some(&diffs));
        assert_eq!(enc.get(&65).map(String::as_str), Some("é"));
        assert_eq!(enc.get(&66).map(String::as_str), Some("è"));
        assert_eq!(enc.get(&67).map(String::as_str), Some("C"));
    }
}
