//! Object parser: builds composite PDF values from tokens.

use super::lexer::{find_bytes, is_whitespace, Keyword, Lexer, Token};
use crate::error::{PdfError, Result};
use crate::model::objects::{IndirectObject, ObjRef, PDFObject, PDFStream};
use bytes::Bytes;
use std::collections::HashMap;

/// Parses PDF object syntax: arrays, dictionaries, indirect references.
pub struct ObjectParser<'a> {
    lexer: Lexer<'a>,
    lookahead: Vec<(usize, Token)>,
}

impl<'a> ObjectParser<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            lexer: Lexer::new(data),
            lookahead: Vec::new(),
        }
    }

    pub fn at(data: &'a [u8], pos: usize) -> Self {
        Self {
            lexer: Lexer::at(data, pos),
            lookahead: Vec::new(),
        }
    }

    /// Position of the next unconsumed byte (ignoring lookahead).
    pub fn tell(&self) -> usize {
        match self.lookahead.last() {
            Some((pos, _)) => *pos,
            None => self.lexer.tell(),
        }
    }

    pub fn next_token(&mut self) -> Result<Option<(usize, Token)>> {
        if let Some(item) = self.lookahead.pop() {
            return Ok(Some(item));
        }
        match self.lexer.next_token() {
            Some(Ok(item)) => Ok(Some(item)),
            Some(Err(e)) => Err(e),
            None => Ok(None),
        }
    }

    fn push_back(&mut self, pos: usize, tok: Token) {
        self.lookahead.push((pos, tok));
    }

    /// Parse one PDF value.
    pub fn parse_object(&mut self) -> Result<PDFObject> {
        let (pos, token) = self
            .next_token()?
            .ok_or_else(|| PdfError::parse(None, "unexpected EOF"))?;
        self.token_to_object(pos, token)
    }

    fn token_to_object(&mut self, pos: usize, token: Token) -> Result<PDFObject> {
        match token {
            Token::Int(n) => {
                // Two integers followed by R form an indirect reference.
                if let Some((pos2, tok2)) = self.next_token()? {
                    if let Token::Int(m) = tok2 {
                        if let Some((pos3, tok3)) = self.next_token()? {
                            if tok3 == Token::Keyword(Keyword::R) && n >= 0 && m >= 0 {
                                return Ok(PDFObject::Ref(ObjRef::new(n as u32, m as u32)));
                            }
                            self.push_back(pos3, tok3);
                        }
                        self.push_back(pos2, Token::Int(m));
                    } else {
                        self.push_back(pos2, tok2);
                    }
                }
                Ok(PDFObject::Int(n))
            }
            Token::Real(n) => Ok(PDFObject::Real(n)),
            Token::Bool(b) => Ok(PDFObject::Bool(b)),
            Token::Name(s) => Ok(PDFObject::Name(s)),
            Token::String(s) => Ok(PDFObject::String(s)),
            Token::ArrayStart => self.parse_array(),
            Token::DictStart => self.parse_dict(),
            Token::Keyword(Keyword::Null) => Ok(PDFObject::Null),
            Token::Keyword(kw) => Err(PdfError::parse(
                pos,
                format!("unexpected keyword {:?} in object context", kw),
            )),
            other => Err(PdfError::parse(
                pos,
                format!("unexpected token {:?} in object context", other),
            )),
        }
    }

    fn parse_array(&mut self) -> Result<PDFObject> {
        let mut arr = Vec::new();
        loop {
            let (pos, token) = self
                .next_token()?
                .ok_or_else(|| PdfError::parse(None, "unexpected EOF in array"))?;
            if token == Token::ArrayEnd {
                break;
            }
            arr.push(self.token_to_object(pos, token)?);
        }
        Ok(PDFObject::Array(arr))
    }

    fn parse_dict(&mut self) -> Result<PDFObject> {
        let mut dict = HashMap::new();
        loop {
            let (pos, token) = self
                .next_token()?
                .ok_or_else(|| PdfError::parse(None, "unexpected EOF in dict"))?;
            if token == Token::DictEnd {
                break;
            }
            let key = match token {
                Token::Name(name) => name,
                other => {
                    return Err(PdfError::parse(
                        pos,
                        format!("expected name as dict key, got {:?}", other),
                    ))
                }
            };
            // Duplicate keys: last wins.
            let value = self.parse_object()?;
            dict.insert(key, value);
        }
        Ok(PDFObject::Dict(dict))
    }
}

/// Parse an indirect object definition (`objid genno obj ... endobj`)
/// located at `offset` in the full document buffer.
///
/// `length_of` resolves the stream dictionary's `/Length` when it is an
/// indirect reference; returning `None` forces an `endstream` scan. The
/// declared length is distrusted: when the bytes at the declared end are
/// not `endstream`, the payload terminates at the scanned keyword instead.
pub fn parse_indirect_object(
    data: &Bytes,
    offset: usize,
    length_of: &dyn Fn(&PDFObject) -> Option<usize>,
) -> Result<IndirectObject> {
    let buf: &[u8] = data.as_ref();
    if offset >= buf.len() {
        return Err(PdfError::parse(
            offset,
            format!("object offset {} beyond EOF {}", offset, buf.len()),
        ));
    }
    let mut parser = ObjectParser::at(buf, offset);
    let objid = match parser.next_token()? {
        Some((_, Token::Int(n))) if n > 0 => n as u32,
        other => {
            return Err(PdfError::parse(
                offset,
                format!("expected object number, got {:?}", other),
            ))
        }
    };
    let genno = match parser.next_token()? {
        Some((_, Token::Int(n))) if n >= 0 => n as u32,
        other => {
            return Err(PdfError::parse(
                offset,
                format!("expected generation number, got {:?}", other),
            ))
        }
    };
    match parser.next_token()? {
        Some((_, Token::Keyword(Keyword::Obj))) => {}
        other => {
            return Err(PdfError::parse(
                offset,
                format!("expected 'obj' keyword, got {:?}", other),
            ))
        }
    }
    let obj = parser.parse_object()?;

    // A dictionary followed by `stream` becomes a stream object.
    match parser.next_token()? {
        Some((pos, Token::Keyword(Keyword::Stream))) => {
            let dict = match obj {
                PDFObject::Dict(d) => d,
                other => {
                    return Err(PdfError::parse(
                        pos,
                        format!("stream preceded by {} instead of dict", other.type_name()),
                    ))
                }
            };
            // The stream keyword must be followed by LF or CRLF; the
            // payload begins immediately after.
            let mut start = pos + b"stream".len();
            if buf.get(start) == Some(&b'\r') {
                start += 1;
            }
            if buf.get(start) == Some(&b'\n') {
                start += 1;
            }
            let declared = dict.get("Length").and_then(|v| length_of(v));
            let end = stream_end(buf, start, declared);
            let mut stream = PDFStream::new(dict, data.slice(start..end));
            stream.set_objid(objid, genno);
            Ok(IndirectObject {
                objid,
                genno,
                obj: PDFObject::Stream(Box::new(stream)),
            })
        }
        _ => Ok(IndirectObject { objid, genno, obj }),
    }
}

/// Locate the end of a stream payload beginning at `start`.
fn stream_end(buf: &[u8], start: usize, declared: Option<usize>) -> usize {
    if let Some(length) = declared {
        let end = start.saturating_add(length);
        if end <= buf.len() && endstream_follows(&buf[end..]) {
            return end;
        }
        // Declared length was wrong: scan onward from it for the keyword,
        // then fall back to a scan from the payload start.
        if end < buf.len() {
            if let Some(found) = find_bytes(&buf[end..], b"endstream") {
                return trim_eol(buf, start, end + found);
            }
        }
    }
    match find_bytes(&buf[start..], b"endstream") {
        Some(found) => trim_eol(buf, start, start + found),
        None => buf.len(),
    }
}

/// True when the next non-EOL bytes spell `endstream`.
fn endstream_follows(rest: &[u8]) -> bool {
    let mut i = 0;
    while i < rest.len() && (rest[i] == b'\r' || rest[i] == b'\n' || rest[i] == b' ') {
        i += 1;
        if i > 2 {
            return false;
        }
    }
    rest[i..].starts_with(b"endstream")
}

/// The EOL preceding `endstream` belongs to the markup, not the payload.
fn trim_eol(buf: &[u8], start: usize, mut end: usize) -> usize {
    if end > start && buf[end - 1] == b'\n' {
        end -= 1;
    }
    if end > start && buf[end - 1] == b'\r' {
        end -= 1;
    }
    end
}

/// One step of content-stream execution: an operator with its operands,
/// or a fully-lexed inline image.
#[derive(Debug, Clone, PartialEq)]
pub enum ContentOp {
    Op {
        pos: usize,
        operator: Keyword,
        operands: Vec<PDFObject>,
    },
    InlineImage {
        pos: usize,
        dict: HashMap<String, PDFObject>,
        data: Vec<u8>,
    },
}

/// Parses a content stream into operator tuples. Indirect references do
/// not occur in content streams, so `R` keywords are left alone.
pub struct ContentParser<'a> {
    lexer: Lexer<'a>,
    operands: Vec<PDFObject>,
    stack: Vec<Vec<PDFObject>>,
}

impl<'a> ContentParser<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            lexer: Lexer::new(data),
            operands: Vec::new(),
            stack: Vec::new(),
        }
    }

    /// Produce the next operator tuple, or None at end of stream.
    /// Lexical errors skip to the next token.
    pub fn next_op(&mut self) -> Option<ContentOp> {
        loop {
            let (pos, token) = match self.lexer.next_token()? {
                Ok(item) => item,
                Err(_) => continue,
            };
            match token {
                Token::ArrayStart => {
                    self.stack.push(std::mem::take(&mut self.operands));
                }
                Token::ArrayEnd => {
                    let contents = std::mem::take(&mut self.operands);
                    self.operands = self.stack.pop().unwrap_or_default();
                    self.operands.push(PDFObject::Array(contents));
                }
                Token::DictStart => {
                    self.stack.push(std::mem::take(&mut self.operands));
                }
                Token::DictEnd => {
                    let contents = std::mem::take(&mut self.operands);
                    self.operands = self.stack.pop().unwrap_or_default();
                    self.operands.push(PDFObject::Dict(pairs_to_dict(contents)));
                }
                Token::ProcStart | Token::ProcEnd => {}
                Token::Int(n) => self.operands.push(PDFObject::Int(n)),
                Token::Real(n) => self.operands.push(PDFObject::Real(n)),
                Token::Bool(b) => self.operands.push(PDFObject::Bool(b)),
                Token::Name(s) => self.operands.push(PDFObject::Name(s)),
                Token::String(s) => self.operands.push(PDFObject::String(s)),
                Token::Keyword(Keyword::Null) => self.operands.push(PDFObject::Null),
                Token::Keyword(Keyword::BI) => {
                    if let Some(op) = self.parse_inline_image(pos) {
                        return Some(op);
                    }
                }
                Token::Keyword(operator) => {
                    return Some(ContentOp::Op {
                        pos,
                        operator,
                        operands: std::mem::take(&mut self.operands),
                    });
                }
            }
        }
    }

    /// Lex `BI <dict entries> ID <raw bytes> EI` into an inline image.
    fn parse_inline_image(&mut self, pos: usize) -> Option<ContentOp> {
        let mut entries: Vec<PDFObject> = Vec::new();
        let mut arrays: Vec<Vec<PDFObject>> = Vec::new();
        loop {
            let (_, token) = match self.lexer.next_token()? {
                Ok(item) => item,
                Err(_) => continue,
            };
            let value = match token {
                Token::Keyword(Keyword::ID) => break,
                Token::Int(n) => PDFObject::Int(n),
                Token::Real(n) => PDFObject::Real(n),
                Token::Bool(b) => PDFObject::Bool(b),
                Token::Name(s) => PDFObject::Name(s),
                Token::String(s) => PDFObject::String(s),
                Token::Keyword(Keyword::Null) => PDFObject::Null,
                Token::ArrayStart => {
                    arrays.push(Vec::new());
                    continue;
                }
                Token::ArrayEnd => match arrays.pop() {
                    Some(done) => PDFObject::Array(done),
                    None => continue,
                },
                _ => continue,
            };
            match arrays.last_mut() {
                Some(arr) => arr.push(value),
                None => entries.push(value),
            }
        }
        let dict = pairs_to_dict(entries);
        // One whitespace byte separates ID from the image data.
        let data = self.lexer.data();
        let mut start = self.lexer.tell();
        if start < data.len() && is_whitespace(data[start]) {
            start += 1;
        }
        let end = find_inline_end(data, start);
        let image = data[start..end].to_vec();
        // Position past EI.
        let mut after = end;
        while after < data.len() && is_whitespace(data[after]) {
            after += 1;
        }
        self.lexer.set_pos((after + 2).min(data.len()));
        self.operands.clear();
        Some(ContentOp::InlineImage {
            pos,
            dict,
            data: image,
        })
    }
}

/// Find the offset of the byte after the inline image payload: the start
/// of whitespace preceding a whitespace-delimited `EI`.
fn find_inline_end(data: &[u8], start: usize) -> usize {
    let mut i = start;
    while i + 1 < data.len() {
        if data[i] == b'E' && data[i + 1] == b'I' {
            let before_ok = i == start || i > 0 && is_whitespace(data[i - 1]);
            let after_ok = match data.get(i + 2) {
                Some(&b) => is_whitespace(b) || super::lexer::is_delimiter(b),
                None => true,
            };
            if before_ok && after_ok {
                let mut end = i;
                while end > start && is_whitespace(data[end - 1]) {
                    end -= 1;
                }
                return end;
            }
        }
        i += 1;
    }
    data.len()
}

/// Fold a flat `name value name value` sequence into a dictionary.
fn pairs_to_dict(items: Vec<PDFObject>) -> HashMap<String, PDFObject> {
    let mut dict = HashMap::new();
    let mut iter = items.into_iter();
    while let Some(key) = iter.next() {
        if let PDFObject::Name(name) = key {
            if let Some(value) = iter.next() {
                dict.insert(name, value);
            }
        }
    }
    dict
}
