//! Character maps.
//!
//! An encoding CMap maps byte sequences to CIDs; a ToUnicode CMap maps
//! codes or CIDs to Unicode strings. Both are parsed from the same
//! PostScript-flavored syntax by a token-based parser sharing the
//! document lexer.

use super::encoding::name2unicode;
use crate::parser::lexer::{Keyword, Lexer, Token};
use crate::utils::nunpack;
use std::collections::HashMap;

/// A codespace range: all codes of `low.len()` bytes between `low` and
/// `high` inclusive. The range's byte length drives tokenization of
/// text-showing operands.
#[derive(Debug, Clone)]
pub struct CodespaceRange {
    pub low: Vec<u8>,
    pub high: Vec<u8>,
}

#[derive(Debug, Clone)]
struct CidRange {
    start: Vec<u8>,
    end: Vec<u8>,
    cid_start: u32,
}

/// A CMap with explicit code-to-CID mappings.
#[derive(Debug, Clone, Default)]
pub struct CMap {
    pub attrs: HashMap<String, String>,
    vertical: bool,
    codespace: Vec<CodespaceRange>,
    code_to_cid: HashMap<Vec<u8>, u32>,
    ranges: Vec<CidRange>,
}

impl CMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_vertical(&mut self, vertical: bool) {
        self.vertical = vertical;
    }

    pub fn is_vertical(&self) -> bool {
        self.vertical
    }

    pub fn add_codespace(&mut self, low: Vec<u8>, high: Vec<u8>) {
        if !low.is_empty() && low.len() == high.len() {
            self.codespace.push(CodespaceRange { low, high });
        }
    }

    pub fn add_code2cid(&mut self, code: &[u8], cid: u32) {
        self.code_to_cid.insert(code.to_vec(), cid);
    }

    pub fn add_cid_range(&mut self, start: &[u8], end: &[u8], cid_start: u32) {
        if start.len() == end.len() && !start.is_empty() {
            self.ranges.push(CidRange {
                start: start.to_vec(),
                end: end.to_vec(),
                cid_start,
            });
        }
    }

    pub fn has_mappings(&self) -> bool {
        !self.code_to_cid.is_empty() || !self.ranges.is_empty()
    }

    /// Merge `base` underneath this CMap (the `usecmap` mechanism): this
    /// CMap's own mappings override the base's.
    pub fn use_cmap(&mut self, base: &CMap) {
        if self.codespace.is_empty() {
            self.codespace = base.codespace.clone();
        }
        for (code, cid) in &base.code_to_cid {
            self.code_to_cid.entry(code.clone()).or_insert(*cid);
        }
        let mut inherited = base.ranges.clone();
        inherited.extend(std::mem::take(&mut self.ranges));
        self.ranges = inherited;
    }

    fn lookup(&self, code: &[u8]) -> Option<u32> {
        if let Some(&cid) = self.code_to_cid.get(code) {
            return Some(cid);
        }
        // Own ranges shadow inherited ones; scan newest first.
        for range in self.ranges.iter().rev() {
            if code.len() == range.start.len()
                && code >= range.start.as_slice()
                && code <= range.end.as_slice()
            {
                let offset = nunpack(code, 0) - nunpack(&range.start, 0);
                return Some(range.cid_start + offset as u32);
            }
        }
        None
    }

    /// Length in bytes of the code starting at `data`, per the
    /// codespace ranges. Falls back to the shortest declared length, or
    /// 1 when no codespace was declared.
    fn code_len(&self, data: &[u8]) -> usize {
        let mut shortest = usize::MAX;
        for range in &self.codespace {
            let len = range.low.len();
            shortest = shortest.min(len);
            if data.len() >= len {
                let prefix = &data[..len];
                if prefix >= range.low.as_slice() && prefix <= range.high.as_slice() {
                    return len;
                }
            }
        }
        if shortest == usize::MAX {
            1
        } else {
            shortest.min(data.len().max(1))
        }
    }

    /// Decode a text-showing operand into (code, CID) pairs, where the
    /// code is the big-endian integer value of the consumed bytes.
    /// Codes without a mapping are skipped, consuming their codespace
    /// length.
    pub fn decode(&self, data: &[u8]) -> Vec<(u32, u32)> {
        let mut cids = Vec::with_capacity(data.len());
        let mut pos = 0;
        while pos < data.len() {
            let len = self.code_len(&data[pos..]).min(data.len() - pos).max(1);
            let code = &data[pos..pos + len];
            if let Some(cid) = self.lookup(code) {
                cids.push((nunpack(code, 0) as u32, cid));
            }
            pos += len;
        }
        cids
    }
}

/// The encoding CMap attached to a composite font.
#[derive(Debug, Clone)]
pub enum EncodingCMap {
    /// Two-byte big-endian identity (Identity-H/V, DLIdent-H/V).
    Identity { vertical: bool },
    /// One-byte identity (OneByteIdentityH/V).
    IdentityByte { vertical: bool },
    /// Explicit mappings from an embedded or predefined CMap.
    Explicit(CMap),
}

impl EncodingCMap {
    pub fn is_vertical(&self) -> bool {
        match self {
            EncodingCMap::Identity { vertical } | EncodingCMap::IdentityByte { vertical } => {
                *vertical
            }
            EncodingCMap::Explicit(cmap) => cmap.is_vertical(),
        }
    }

    /// Decode into (code, CID) pairs; identity CMaps map every code to
    /// itself.
    pub fn decode(&self, data: &[u8]) -> Vec<(u32, u32)> {
        match self {
            EncodingCMap::Identity { .. } => data
                .chunks(2)
                .map(|c| {
                    let code = if c.len() == 2 {
                        u16::from_be_bytes([c[0], c[1]]) as u32
                    } else {
                        c[0] as u32
                    };
                    (code, code)
                })
                .collect(),
            EncodingCMap::IdentityByte { .. } => {
                data.iter().map(|&b| (b as u32, b as u32)).collect()
            }
            EncodingCMap::Explicit(cmap) => cmap.decode(data),
        }
    }
}

fn is_vertical_name(name: &str) -> bool {
    name.ends_with('V')
}

/// Resolve a predefined encoding CMap by name.
///
/// Full CMap data files are not shipped; the known CJK families get
/// their documented codespace ranges with an identity code-to-CID
/// mapping, which keeps multi-byte tokenization (and therefore
/// ToUnicode keying) correct.
pub fn predefined_cmap(name: &str) -> Option<EncodingCMap> {
    match name {
        "Identity-H" | "Identity-V" | "DLIdent-H" | "DLIdent-V" => Some(EncodingCMap::Identity {
            vertical: is_vertical_name(name),
        }),
        "OneByteIdentityH" | "OneByteIdentityV" => Some(EncodingCMap::IdentityByte {
            vertical: is_vertical_name(name),
        }),
        _ => {
            let base = name.trim_end_matches("-H").trim_end_matches("-V");
            let ranges: &[(&[u8], &[u8])] = match base {
                // Shift-JIS style: single bytes plus two-byte codes led
                // by 0x81-0x9F / 0xE0-0xFC.
                "90ms-RKSJ" | "90msp-RKSJ" | "90pv-RKSJ" | "78-RKSJ" | "Ext-RKSJ" => &[
                    (&[0x00], &[0x80]),
                    (&[0xA0], &[0xDF]),
                    (&[0x81, 0x40], &[0x9F, 0xFC]),
                    (&[0xE0, 0x40], &[0xFC, 0xFC]),
                ],
                // EUC: ASCII plus two-byte 0xA1-0xFE pairs.
                "EUC" | "GBK-EUC" | "GB-EUC" | "KSC-EUC" | "KSCms-UHC" => {
                    &[(&[0x00], &[0x80]), (&[0xA1, 0xA1], &[0xFE, 0xFE])]
                }
                // Big5: ASCII plus lead bytes 0xA1-0xFE.
                "B5pc" | "ETen-B5" | "CNS-EUC" => {
                    &[(&[0x00], &[0x80]), (&[0xA1, 0x40], &[0xFE, 0xFE])]
                }
                // Pure two-byte Unicode-order CMaps.
                "UniJIS-UCS2" | "UniJIS-UTF16" | "UniGB-UCS2" | "UniGB-UTF16" | "UniCNS-UCS2"
                | "UniCNS-UTF16" | "UniKS-UCS2" | "UniKS-UTF16" | "H" | "V" => {
                    &[(&[0x00, 0x00], &[0xFF, 0xFF])]
                }
                _ => return None,
            };
            let mut cmap = CMap::new();
            cmap.set_vertical(is_vertical_name(name));
            cmap.attrs.insert("CMapName".into(), name.to_string());
            for (low, high) in ranges {
                cmap.add_codespace(low.to_vec(), high.to_vec());
                cmap.add_cid_range(low, high, nunpack(low, 0) as u32);
            }
            Some(EncodingCMap::Explicit(cmap))
        }
    }
}

/// A code/CID to Unicode map built from a ToUnicode stream.
#[derive(Debug, Clone, Default)]
pub struct UnicodeMap {
    cid2unichr: HashMap<u32, String>,
    ranges: Vec<BfRange>,
}

#[derive(Debug, Clone)]
struct BfRange {
    start: u32,
    end: u32,
    /// UTF-16BE bytes of the first target; later codes increment the
    /// low-order bytes.
    target: Vec<u8>,
}

impl UnicodeMap {
    pub fn is_empty(&self) -> bool {
        self.cid2unichr.is_empty() && self.ranges.is_empty()
    }

    pub fn add_cid2unichr(&mut self, cid: u32, text: String) {
        // A non-breaking space must not shadow an existing plain space
        // for the same glyph.
        if text == "\u{00A0}" {
            if let Some(existing) = self.cid2unichr.get(&cid) {
                if existing == " " {
                    return;
                }
            }
        }
        self.cid2unichr.insert(cid, text);
    }

    pub fn add_cid2bytes(&mut self, cid: u32, utf16be: &[u8]) {
        self.add_cid2unichr(cid, decode_utf16be(utf16be));
    }

    pub fn add_bf_range(&mut self, start: u32, end: u32, target: Vec<u8>) {
        self.ranges.push(BfRange { start, end, target });
    }

    /// Unicode string for a CID, or None when the map says nothing;
    /// callers must not fabricate characters in that case.
    pub fn get(&self, cid: u32) -> Option<String> {
        if let Some(s) = self.cid2unichr.get(&cid) {
            return Some(s.clone());
        }
        for range in &self.ranges {
            if cid >= range.start && cid <= range.end {
                let offset = cid - range.start;
                let bytes = &range.target;
                let split = bytes.len().saturating_sub(4);
                let (prefix, var) = bytes.split_at(split);
                let base = nunpack(var, 0) as u32;
                let incremented = base.wrapping_add(offset).to_be_bytes();
                let mut result = prefix.to_vec();
                result.extend_from_slice(&incremented[4 - var.len()..]);
                return Some(decode_utf16be(&result));
            }
        }
        None
    }
}

fn decode_utf16be(bytes: &[u8]) -> String {
    let units: Vec<u16> = bytes
        .chunks_exact(2)
        .map(|c| u16::from_be_bytes([c[0], c[1]]))
        .collect();
    String::from_utf16_lossy(&units)
}

/// The result of parsing a CMap stream: encoding mappings, Unicode
/// mappings, writing mode, and any base CMap named by `usecmap`.
#[derive(Debug, Default)]
pub struct ParsedCMap {
    pub cmap: CMap,
    pub unicode: UnicodeMap,
    pub wmode: i64,
    pub usecmap: Option<String>,
}

/// Parse a CMap stream. One parser covers encoding CMaps (cidchar /
/// cidrange) and ToUnicode CMaps (bfchar / bfrange); the caller picks
/// the side it needs.
pub fn parse_cmap(data: &[u8]) -> ParsedCMap {
    let mut out = ParsedCMap::default();
    let mut lexer = Lexer::new(data);
    // Operand stack of recent tokens; keywords consume it.
    let mut stack: Vec<Token> = Vec::new();
    let mut in_array = false;
    let mut array: Vec<Token> = Vec::new();

    while let Some(result) = lexer.next_token() {
        let (_, token) = match result {
            Ok(item) => item,
            Err(_) => continue,
        };
        match token {
            Token::ArrayStart => {
                in_array = true;
                array.clear();
            }
            Token::ArrayEnd => {
                in_array = false;
                stack.push(Token::ProcStart); // array sentinel
                stack.append(&mut array);
                stack.push(Token::ProcEnd);
            }
            Token::Keyword(kw) => match kw {
                Keyword::BeginCodeSpaceRange
                | Keyword::BeginBfChar
                | Keyword::BeginBfRange
                | Keyword::BeginCidChar
                | Keyword::BeginCidRange
                | Keyword::BeginNotDefChar
                | Keyword::BeginNotDefRange => {
                    stack.clear();
                }
                Keyword::EndCodeSpaceRange => {
                    for pair in stack.chunks(2) {
                        if let [Token::String(low), Token::String(high)] = pair {
                            out.cmap.add_codespace(low.clone(), high.clone());
                        }
                    }
                    stack.clear();
                }
                Keyword::EndCidChar => {
                    for pair in stack.chunks(2) {
                        if let [Token::String(code), Token::Int(cid)] = pair {
                            out.cmap.add_code2cid(code, (*cid).max(0) as u32);
                        }
                    }
                    stack.clear();
                }
                Keyword::EndCidRange => {
                    for triple in stack.chunks(3) {
                        if let [Token::String(start), Token::String(end), Token::Int(cid)] = triple
                        {
                            out.cmap.add_cid_range(start, end, (*cid).max(0) as u32);
                        }
                    }
                    stack.clear();
                }
                Keyword::EndBfChar => {
                    for pair in stack.chunks(2) {
                        match pair {
                            [Token::String(code), Token::String(target)] => {
                                out.unicode.add_cid2bytes(nunpack(code, 0) as u32, target);
                            }
                            [Token::String(code), Token::Name(glyph)] => {
                                if let Some(text) = name2unicode(glyph) {
                                    out.unicode.add_cid2unichr(nunpack(code, 0) as u32, text);
                                }
                            }
                            _ => {}
                        }
                    }
                    stack.clear();
                }
                Keyword::EndBfRange => {
                    parse_bfranges(&stack, &mut out.unicode);
                    stack.clear();
                }
                Keyword::EndNotDefChar | Keyword::EndNotDefRange => {
                    stack.clear();
                }
                Keyword::UseCMap => {
                    if let Some(Token::Name(name)) = stack.pop() {
                        out.usecmap = Some(name);
                    }
                    stack.clear();
                }
                Keyword::Def => {
                    // Catch `/WMode 1 def` and `/CMapName /x def`.
                    if stack.len() >= 2 {
                        let value = stack.pop().unwrap();
                        let key = stack.pop().unwrap();
                        if let Token::Name(key) = key {
                            match (key.as_str(), value) {
                                ("WMode", Token::Int(mode)) => {
                                    out.wmode = mode;
                                    out.cmap.set_vertical(mode != 0);
                                }
                                ("CMapName", Token::Name(name)) => {
                                    out.cmap.attrs.insert("CMapName".into(), name);
                                }
                                _ => {}
                            }
                        }
                    }
                    stack.clear();
                }
                Keyword::BeginCMap | Keyword::EndCMap => {
                    stack.clear();
                }
                _ => {
                    // begin/end/dict and other PostScript noise.
                    stack.clear();
                }
            },
            other => {
                if in_array {
                    array.push(other);
                } else {
                    stack.push(other);
                }
            }
        }
    }
    out
}

/// Decode the operand run of a bfrange block. Each range is
/// `<start> <end> <target>` where target is a string (incremented per
/// code) or an array of per-code strings bracketed by sentinels.
fn parse_bfranges(stack: &[Token], unicode: &mut UnicodeMap) {
    let mut i = 0;
    while i + 2 < stack.len() {
        let (start, end) = match (&stack[i], &stack[i + 1]) {
            (Token::String(s), Token::String(e)) => (nunpack(s, 0) as u32, nunpack(e, 0) as u32),
            _ => {
                i += 1;
                continue;
            }
        };
        match &stack[i + 2] {
            Token::String(target) => {
                unicode.add_bf_range(start, end, target.clone());
                i += 3;
            }
            Token::ProcStart => {
                // Array form: one target per source code.
                let mut j = i + 3;
                let mut cid = start;
                while j < stack.len() && stack[j] != Token::ProcEnd {
                    if let Token::String(target) = &stack[j] {
                        if cid <= end {
                            unicode.add_cid2bytes(cid, target);
                        }
                        cid += 1;
                    }
                    j += 1;
                }
                i = j + 1;
            }
            _ => {
                i += 3;
            }
        }
    }
}

/// Fallback CID-to-Unicode tables for the predefined CID systems, used
/// only when a font carries no ToUnicode map. Coverage concentrates on
/// the kana rows, which dominate untagged Japanese text.
pub fn predefined_cid2unicode(registry: &str, ordering: &str) -> Option<UnicodeMap> {
    if registry != "Adobe" {
        return None;
    }
    match ordering {
        "Japan1" | "GB1" | "CNS1" | "Korea1" | "KR" => Some(jis_kana_map()),
        _ => None,
    }
}

/// JIS X 0208 rows 4 (hiragana) and 5 (katakana) keyed by their
/// two-byte JIS codes, as produced by the identity code-to-CID mapping
/// of the EUC/JIS family CMaps.
fn jis_kana_map() -> UnicodeMap {
    let mut map = UnicodeMap::default();
    for col in 0x21u32..=0x73 {
        if let Some(ch) = char::from_u32(0x3041 + (col - 0x21)) {
            map.add_cid2unichr(0x2400 + col, ch.to_string());
        }
    }
    for col in 0x21u32..=0x76 {
        if let Some(ch) = char::from_u32(0x30A1 + (col - 0x21)) {
            map.add_cid2unichr(0x2500 + col, ch.to_string());
        }
    }
    map
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bfchar_and_bfrange() {
        let cmap = b"/CIDInit /ProcSet findresource begin
12 dict begin begincmap
1 begincodespacerange <0000> <FFFF> endcodespacerange
2 beginbfchar
<0048> <0048>
<0065> <0065>
endbfchar
1 beginbfrange
<0020> <007E> <0020>
endbfrange
endcmap end end";
        let parsed = parse_cmap(cmap);
        assert_eq!(parsed.unicode.get(0x48).as_deref(), Some("H"));
        assert_eq!(parsed.unicode.get(0x41).as_deref(), Some("A"));
        assert_eq!(parsed.unicode.get(0x7E).as_deref(), Some("~"));
        assert_eq!(parsed.unicode.get(0x7F), None);
    }

    #[test]
    fn test_bfrange_array_form() {
        let cmap = b"1 beginbfrange
<0001> <0003> [<0041> <0042> <0043>]
endbfrange";
        let parsed = parse_cmap(cmap);
        assert_eq!(parsed.unicode.get(1).as_deref(), Some("A"));
        assert_eq!(parsed.unicode.get(3).as_deref(), Some("C"));
    }

    #[test]
    fn test_cidrange_decode() {
        let cmap = b"1 begincodespacerange <00> <FF> endcodespacerange
1 begincidrange <41> <5A> 100 endcidrange";
        let parsed = parse_cmap(cmap);
        assert_eq!(parsed.cmap.decode(b"AB"), vec![(0x41, 100), (0x42, 101)]);
    }

    #[test]
    fn test_wmode() {
        let parsed = parse_cmap(b"/WMode 1 def");
        assert_eq!(parsed.wmode, 1);
        assert!(parsed.cmap.is_vertical());
    }

    #[test]
    fn test_identity_cmap() {
        let cmap = predefined_cmap("Identity-H").unwrap();
        assert_eq!(
            cmap.decode(&[0x00, 0x41, 0x30, 0x42]),
            vec![(0x41, 0x41), (0x3042, 0x3042)]
        );
        assert!(!cmap.is_vertical());
        assert!(predefined_cmap("Identity-V").unwrap().is_vertical());
    }

    #[test]
    fn test_rksj_codespace() {
        let cmap = predefined_cmap("90ms-RKSJ-H").unwrap();
        // ASCII byte then a two-byte Shift-JIS code.
        assert_eq!(
            cmap.decode(&[0x41, 0x82, 0xA0]),
            vec![(0x41, 0x41), (0x82A0, 0x82A0)]
        );
    }
}
