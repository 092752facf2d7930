//! The PDF value type and its companions.

use crate::error::{PdfError, Result};
use bytes::Bytes;
use std::collections::HashMap;

/// A PDF value: the dynamic sum type every object in a document decodes to.
#[derive(Debug, Clone, PartialEq)]
pub enum PDFObject {
    Null,
    Bool(bool),
    Int(i64),
    Real(f64),
    /// Name object, e.g. /Type (stored without the slash).
    Name(String),
    /// Byte string. PDF strings are binary; text decoding is the caller's
    /// concern.
    String(Vec<u8>),
    Array(Vec<Self>),
    Dict(HashMap<String, Self>),
    /// Stream: dictionary plus deferred raw payload.
    Stream(Box<PDFStream>),
    /// Indirect reference, resolved on demand.
    Ref(ObjRef),
}

impl PDFObject {
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    pub fn as_bool(&self) -> Result<bool> {
        match self {
            Self::Bool(b) => Ok(*b),
            _ => Err(PdfError::type_error("bool", self.type_name())),
        }
    }

    pub fn as_int(&self) -> Result<i64> {
        match self {
            Self::Int(n) => Ok(*n),
            _ => Err(PdfError::type_error("int", self.type_name())),
        }
    }

    /// Numeric value with explicit int-to-real coercion.
    pub fn as_num(&self) -> Result<f64> {
        match self {
            Self::Int(n) => Ok(*n as f64),
            Self::Real(n) => Ok(*n),
            _ => Err(PdfError::type_error("number", self.type_name())),
        }
    }

    pub fn as_name(&self) -> Result<&str> {
        match self {
            Self::Name(s) => Ok(s),
            _ => Err(PdfError::type_error("name", self.type_name())),
        }
    }

    pub fn as_string(&self) -> Result<&[u8]> {
        match self {
            Self::String(s) => Ok(s),
            _ => Err(PdfError::type_error("string", self.type_name())),
        }
    }

    pub fn as_array(&self) -> Result<&[PDFObject]> {
        match self {
            Self::Array(arr) => Ok(arr),
            _ => Err(PdfError::type_error("array", self.type_name())),
        }
    }

    pub fn as_dict(&self) -> Result<&HashMap<String, PDFObject>> {
        match self {
            Self::Dict(d) => Ok(d),
            // A stream's dictionary answers dictionary queries.
            Self::Stream(s) => Ok(&s.attrs),
            _ => Err(PdfError::type_error("dict", self.type_name())),
        }
    }

    pub fn as_stream(&self) -> Result<&PDFStream> {
        match self {
            Self::Stream(s) => Ok(s),
            _ => Err(PdfError::type_error("stream", self.type_name())),
        }
    }

    pub fn as_objref(&self) -> Result<&ObjRef> {
        match self {
            Self::Ref(r) => Ok(r),
            _ => Err(PdfError::type_error("ref", self.type_name())),
        }
    }

    pub const fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Real(_) => "real",
            Self::Name(_) => "name",
            Self::String(_) => "string",
            Self::Array(_) => "array",
            Self::Dict(_) => "dict",
            Self::Stream(_) => "stream",
            Self::Ref(_) => "ref",
        }
    }
}

/// An indirect reference: (object number, generation number).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObjRef {
    pub objid: u32,
    pub genno: u32,
}

impl ObjRef {
    pub const fn new(objid: u32, genno: u32) -> Self {
        Self { objid, genno }
    }
}

/// An indirect object: a value addressed by (objid, genno).
#[derive(Debug, Clone, PartialEq)]
pub struct IndirectObject {
    pub objid: u32,
    pub genno: u32,
    pub obj: PDFObject,
}

/// A stream object: dictionary attributes plus a raw, possibly encoded
/// payload. The payload is never decoded at parse time.
#[derive(Debug, Clone, PartialEq)]
pub struct PDFStream {
    pub attrs: HashMap<String, PDFObject>,
    rawdata: Bytes,
    decrypted: bool,
    /// Identity of the owning indirect object, needed for decryption.
    pub objid: Option<u32>,
    pub genno: Option<u32>,
}

impl PDFStream {
    pub fn new(attrs: HashMap<String, PDFObject>, rawdata: impl Into<Bytes>) -> Self {
        Self {
            attrs,
            rawdata: rawdata.into(),
            decrypted: false,
            objid: None,
            genno: None,
        }
    }

    pub fn set_objid(&mut self, objid: u32, genno: u32) {
        self.objid = Some(objid);
        self.genno = Some(genno);
    }

    /// Raw (undecoded, possibly encrypted) payload bytes.
    pub fn rawdata(&self) -> &[u8] {
        self.rawdata.as_ref()
    }

    /// Raw payload as shared bytes.
    pub fn rawdata_bytes(&self) -> Bytes {
        self.rawdata.clone()
    }

    pub const fn is_decrypted(&self) -> bool {
        self.decrypted
    }

    /// Replace the payload with its decrypted form. Decryption is applied
    /// exactly once per object; this flag enforces it.
    pub fn set_decrypted(&mut self, data: Vec<u8>) {
        self.rawdata = Bytes::from(data);
        self.decrypted = true;
    }

    pub fn get(&self, name: &str) -> Option<&PDFObject> {
        self.attrs.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.attrs.contains_key(name)
    }
}

/// Fetch a required dictionary entry, with a `Parse` error naming the key.
pub fn dict_get<'a>(
    dict: &'a HashMap<String, PDFObject>,
    key: &str,
) -> Result<&'a PDFObject> {
    dict.get(key)
        .ok_or_else(|| PdfError::parse(None, format!("missing /{} entry", key)))
}
