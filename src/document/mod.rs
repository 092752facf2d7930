//! The document: xref chain, object resolution, decryption, stream
//! decoding, and the top-level accessors.

pub mod outline;
pub mod page;
pub mod saslprep;
pub mod security;
pub mod structtree;
pub mod xref;

use crate::codec::filters::{apply_filters, filter_specs, FilterSpec};
use crate::error::{PdfError, PdfWarning, Result};
use crate::font::pdffont::Font;
use crate::model::objects::{IndirectObject, ObjRef, PDFObject};
use crate::parser::lexer::{read_header, Lexer};
use crate::parser::object::{parse_indirect_object, ObjectParser};
use bytes::Bytes;
use indexmap::IndexMap;
use memmap2::Mmap;
use security::{create_security_handler, SecurityHandler};
use std::cell::{Cell, RefCell};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::rc::Rc;
use xref::{XRefPos, XRefSection};

/// Maximum reference-resolution depth. On overflow the innermost
/// reference resolves to null.
const MAX_RESOLVE_DEPTH: usize = 64;

/// Default capacity of the resolved-object cache.
const DEFAULT_CACHE_CAPACITY: usize = 1024;

/// LRU cache of resolved objects keyed by object number.
struct ObjectCache {
    capacity: usize,
    map: IndexMap<u32, Rc<PDFObject>>,
}

impl ObjectCache {
    fn new(capacity: usize) -> Self {
        Self {
            capacity,
            map: IndexMap::new(),
        }
    }

    fn get(&mut self, objid: u32) -> Option<Rc<PDFObject>> {
        let index = self.map.get_index_of(&objid)?;
        let value = Rc::clone(self.map.get_index(index)?.1);
        if index + 1 != self.map.len() {
            self.map.move_index(index, self.map.len() - 1);
        }
        Some(value)
    }

    fn insert(&mut self, objid: u32, value: Rc<PDFObject>) {
        if self.capacity == 0 {
            return;
        }
        if self.map.contains_key(&objid) {
            self.map.shift_remove(&objid);
        }
        self.map.insert(objid, value);
        if self.map.len() > self.capacity {
            self.map.shift_remove_index(0);
        }
    }
}

/// A decoded object stream: the id/offset header plus its payload.
struct ObjStm {
    ids: Vec<u32>,
    offsets: Vec<usize>,
    first: usize,
    data: Vec<u8>,
}

/// An open PDF document.
///
/// A `Document` is single-threaded: the resolver cache is not safe for
/// concurrent mutation. Parallel workloads open one document per worker
/// over the same shared byte buffer.
pub struct Document {
    data: Bytes,
    version: String,
    xrefs: Vec<XRefSection>,
    trailer: HashMap<String, PDFObject>,
    catalog: HashMap<String, PDFObject>,
    info: Vec<HashMap<String, PDFObject>>,
    security_handler: Option<Box<dyn SecurityHandler>>,
    /// Object number of the /Encrypt dictionary, which is never
    /// decrypted.
    encrypt_objid: Option<u32>,
    cache: RefCell<ObjectCache>,
    objstm_cache: RefCell<HashMap<u32, Rc<ObjStm>>>,
    font_cache: RefCell<HashMap<u32, Rc<Font>>>,
    warnings: RefCell<Vec<PdfWarning>>,
    depth: Cell<usize>,
}

impl std::fmt::Debug for Document {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Document")
            .field("version", &self.version)
            .finish_non_exhaustive()
    }
}

impl Document {
    /// Open a document from a byte buffer. The empty password is tried
    /// by default; a user or owner password may be supplied.
    pub fn open(data: impl Into<Bytes>, password: &str) -> Result<Self> {
        let data = data.into();
        let mut doc = Self {
            data,
            version: String::new(),
            xrefs: Vec::new(),
            trailer: HashMap::new(),
            catalog: HashMap::new(),
            info: Vec::new(),
            security_handler: None,
            encrypt_objid: None,
            cache: RefCell::new(ObjectCache::new(DEFAULT_CACHE_CAPACITY)),
            objstm_cache: RefCell::new(HashMap::new()),
            font_cache: RefCell::new(HashMap::new()),
            warnings: RefCell::new(Vec::new()),
            depth: Cell::new(0),
        };
        doc.parse(password)?;
        Ok(doc)
    }

    /// Open a memory-mapped document.
    pub fn from_mmap(mmap: Mmap, password: &str) -> Result<Self> {
        Self::open(Bytes::from_owner(mmap), password)
    }

    fn parse(&mut self, password: &str) -> Result<()> {
        match read_header(self.data.as_ref()) {
            Ok((version, offset)) => {
                self.version = version;
                if offset > 0 {
                    self.warn(PdfWarning::new(
                        "Lex",
                        Some(0),
                        format!("{} bytes of junk before %PDF- header", offset),
                    ));
                }
            }
            Err(err) => self.warn(PdfWarning::from(&err)),
        }

        if let Err(err) = self.load_xref_chain() {
            log::warn!("falling back to xref reconstruction: {}", err);
            self.warn(PdfWarning::from(&err));
        }
        if self.xrefs.is_empty() || self.xrefs.iter().all(|x| x.entries.is_empty()) {
            // Reconstruction failure is the only way out of open().
            let xref = xref::reconstruct_xref(self.data.as_ref())?;
            self.xrefs = vec![xref];
        }

        // Merged trailer: earlier (newer) sections win.
        for xref in &self.xrefs {
            for (key, value) in &xref.trailer {
                self.trailer
                    .entry(key.clone())
                    .or_insert_with(|| value.clone());
            }
        }

        // Encryption is activated by /Encrypt in the trailer. The
        // encryption dictionary itself is never decrypted.
        if let Some(encrypt_ref) = self.trailer.get("Encrypt").cloned() {
            if let PDFObject::Ref(r) = &encrypt_ref {
                self.encrypt_objid = Some(r.objid);
            }
            let encrypt_obj = self.resolve(&encrypt_ref);
            let encrypt = encrypt_obj.as_dict().map_err(|_| PdfError::Crypt {
                msg: "/Encrypt is not a dictionary".into(),
            })?;
            let doc_id: Vec<Vec<u8>> = match self.trailer.get("ID") {
                Some(PDFObject::Array(arr)) => arr
                    .iter()
                    .filter_map(|o| o.as_string().ok().map(|s| s.to_vec()))
                    .collect(),
                _ => Vec::new(),
            };
            self.security_handler = Some(create_security_handler(encrypt, &doc_id, password)?);
            // Objects resolved before the handler existed were not
            // decrypted; drop them.
            self.cache.borrow_mut().map.clear();
            self.objstm_cache.borrow_mut().clear();
        }

        // Catalog via /Root, with an object-scan fallback for
        // reconstructed files whose trailer went missing.
        let root = self.trailer.get("Root").cloned();
        if let Some(root_ref) = root {
            if let Ok(dict) = self.resolve(&root_ref).as_dict() {
                self.catalog = dict.clone();
            }
        }
        if self.catalog.is_empty() {
            if let Some(found) = self.find_catalog() {
                self.catalog = found;
            } else {
                return Err(PdfError::parse(None, "no document catalog found"));
            }
        }

        if let Some(info_ref) = self.trailer.get("Info").cloned() {
            if let Ok(dict) = self.resolve(&info_ref).as_dict() {
                self.info.push(dict.clone());
            }
        }
        Ok(())
    }

    fn load_xref_chain(&mut self) -> Result<()> {
        let start = xref::find_startxref(self.data.as_ref())?;
        let mut visited = HashSet::new();
        let mut pos = start;
        loop {
            if !visited.insert(pos) {
                break;
            }
            let section = xref::load_xref_at(&self.data, pos)?;
            let next = section
                .trailer
                .get("Prev")
                .and_then(|p| p.as_int().ok())
                .map(|n| n as usize);
            let xref_stm = section
                .trailer
                .get("XRefStm")
                .and_then(|p| p.as_int().ok())
                .map(|n| n as usize);
            self.xrefs.push(section);
            // Hybrid-reference files keep a parallel xref stream.
            if let Some(stm_pos) = xref_stm {
                if visited.insert(stm_pos) {
                    if let Ok(stm) = xref::load_xref_at(&self.data, stm_pos) {
                        self.xrefs.push(stm);
                    }
                }
            }
            match next {
                Some(prev) => pos = prev,
                None => break,
            }
        }
        Ok(())
    }

    /// Last-resort catalog search over every known object.
    fn find_catalog(&self) -> Option<HashMap<String, PDFObject>> {
        for objid in self.objids() {
            let obj = self.getobj(objid);
            if let Ok(dict) = obj.as_dict() {
                if matches!(dict.get("Type"), Some(PDFObject::Name(n)) if n == "Catalog") {
                    return Some(dict.clone());
                }
            }
        }
        None
    }

    /// PDF version string from the header (e.g. "1.7").
    pub fn version(&self) -> &str {
        &self.version
    }

    /// The raw document bytes.
    pub fn buffer(&self) -> &Bytes {
        &self.data
    }

    /// The merged trailer dictionary.
    pub fn trailer(&self) -> &HashMap<String, PDFObject> {
        &self.trailer
    }

    /// The document catalog (the dictionary at /Root).
    pub fn catalog(&self) -> &HashMap<String, PDFObject> {
        &self.catalog
    }

    /// Document information dictionaries (/Info), newest first.
    pub fn info(&self) -> &[HashMap<String, PDFObject>] {
        &self.info
    }

    /// True when an /Encrypt dictionary activated a security handler.
    pub fn is_encrypted(&self) -> bool {
        self.security_handler.is_some()
    }

    /// Structured warnings recorded while decoding. Iteration is never
    /// interrupted by the conditions recorded here.
    pub fn warnings(&self) -> Vec<PdfWarning> {
        self.warnings.borrow().clone()
    }

    pub(crate) fn warn(&self, warning: PdfWarning) {
        log::warn!("{}: {}", warning.kind, warning.msg);
        self.warnings.borrow_mut().push(warning);
    }

    /// All object numbers known to the xref chain, ascending.
    pub fn objids(&self) -> Vec<u32> {
        let mut ids = BTreeSet::new();
        for xref in &self.xrefs {
            ids.extend(xref.objids());
        }
        ids.into_iter().collect()
    }

    /// Iterate over every indirect object in the document.
    pub fn objects(&self) -> impl Iterator<Item = IndirectObject> + '_ {
        self.objids().into_iter().filter_map(move |objid| {
            let obj = self.getobj(objid);
            if obj.is_null() {
                None
            } else {
                Some(IndirectObject {
                    objid,
                    genno: self.genno_of(objid),
                    obj: (*obj).clone(),
                })
            }
        })
    }

    fn genno_of(&self, objid: u32) -> u32 {
        for xref in &self.xrefs {
            match xref.get(objid) {
                Some(XRefPos::InFile { genno, .. }) => return genno,
                Some(_) => return 0,
                None => continue,
            }
        }
        0
    }

    /// Tokenize the whole document buffer.
    pub fn tokens(&self) -> Lexer<'_> {
        Lexer::new(self.data.as_ref())
    }

    /// Resolve one level of indirection. Direct values pass through;
    /// references that cannot be satisfied become null.
    pub fn resolve(&self, obj: &PDFObject) -> PDFObject {
        let mut current = obj.clone();
        let mut hops = 0;
        while let PDFObject::Ref(r) = current {
            current = (*self.getobj(r.objid)).clone();
            hops += 1;
            if hops > MAX_RESOLVE_DEPTH {
                return PDFObject::Null;
            }
        }
        current
    }

    /// Fetch an object by number, returning null (with a recorded
    /// warning) on any failure: a free or absent xref entry never
    /// produces a spurious object.
    pub fn getobj(&self, objid: u32) -> Rc<PDFObject> {
        match self.try_getobj(objid) {
            Ok(obj) => obj,
            Err(err) => {
                self.warn(PdfWarning::from(&err));
                Rc::new(PDFObject::Null)
            }
        }
    }

    /// Fetch an object by number, surfacing the failure.
    pub fn try_getobj(&self, objid: u32) -> Result<Rc<PDFObject>> {
        if objid == 0 {
            return Ok(Rc::new(PDFObject::Null));
        }
        if let Some(obj) = self.cache.borrow_mut().get(objid) {
            return Ok(obj);
        }
        if self.depth.get() >= MAX_RESOLVE_DEPTH {
            return Err(PdfError::Resolve {
                pos: None,
                msg: format!("resolution depth exceeded at object {}", objid),
            });
        }
        self.depth.set(self.depth.get() + 1);
        let result = self.load_object(objid);
        self.depth.set(self.depth.get() - 1);

        let obj = Rc::new(result?);
        self.cache.borrow_mut().insert(objid, Rc::clone(&obj));
        Ok(obj)
    }

    fn load_object(&self, objid: u32) -> Result<PDFObject> {
        let mut last_err: Option<PdfError> = None;
        for xref in &self.xrefs {
            match xref.get(objid) {
                None => continue,
                Some(XRefPos::Free) => return Ok(PDFObject::Null),
                Some(XRefPos::InFile { pos, .. }) => {
                    match self.parse_object_at(pos, objid, xref.is_fallback) {
                        Ok(obj) => return Ok(obj),
                        // A stale offset in a newer table falls through
                        // to older sections.
                        Err(err) => last_err = Some(err),
                    }
                }
                Some(XRefPos::InStream { streamid, index }) => {
                    match self.getobj_objstm(streamid, index, objid) {
                        Ok(obj) => return Ok(obj),
                        Err(err) => last_err = Some(err),
                    }
                }
            }
        }
        match last_err {
            Some(err) => Err(err),
            None => Ok(PDFObject::Null),
        }
    }

    /// Parse an indirect object at a file offset, verifying its header
    /// and applying decryption exactly once.
    fn parse_object_at(&self, pos: usize, objid: u32, fallback: bool) -> Result<PDFObject> {
        let length_of = |obj: &PDFObject| -> Option<usize> {
            // In fallback mode declared lengths are untrustworthy; force
            // the endstream scan.
            if fallback {
                return None;
            }
            match self.resolve(obj) {
                PDFObject::Int(n) if n > 0 => Some(n as usize),
                _ => None,
            }
        };
        let indobj = parse_indirect_object(&self.data, pos, &length_of)?;
        if indobj.objid != objid {
            return Err(PdfError::Resolve {
                pos: Some(pos),
                msg: format!(
                    "object id mismatch: expected {}, found {}",
                    objid, indobj.objid
                ),
            });
        }
        // The encryption dictionary itself is never decrypted.
        if self.encrypt_objid == Some(objid) {
            return Ok(indobj.obj);
        }
        Ok(self.decrypt_object(indobj.obj, objid, indobj.genno))
    }

    /// Recursively decrypt strings and stream payloads. Exempt: the
    /// /Contents entry of signature dictionaries.
    fn decrypt_object(&self, obj: PDFObject, objid: u32, genno: u32) -> PDFObject {
        let handler = match &self.security_handler {
            Some(h) => h,
            None => return obj,
        };
        match obj {
            PDFObject::String(data) => {
                PDFObject::String(handler.decrypt_string(objid, genno, &data))
            }
            PDFObject::Array(arr) => PDFObject::Array(
                arr.into_iter()
                    .map(|item| self.decrypt_object(item, objid, genno))
                    .collect(),
            ),
            PDFObject::Dict(dict) => {
                let is_sig = matches!(
                    dict.get("Type"),
                    Some(PDFObject::Name(n)) if n == "Sig" || n == "DocTimeStamp"
                );
                PDFObject::Dict(
                    dict.into_iter()
                        .map(|(k, v)| {
                            if is_sig && k == "Contents" {
                                (k, v)
                            } else {
                                let v = self.decrypt_object(v, objid, genno);
                                (k, v)
                            }
                        })
                        .collect(),
                )
            }
            PDFObject::Stream(mut stream) => {
                let attrs = std::mem::take(&mut stream.attrs);
                stream.attrs = attrs
                    .into_iter()
                    .map(|(k, v)| {
                        let v = self.decrypt_object(v, objid, genno);
                        (k, v)
                    })
                    .collect();
                stream.set_objid(objid, genno);
                if !stream.is_decrypted() {
                    let decrypted =
                        handler.decrypt_stream(objid, genno, stream.rawdata(), &stream.attrs);
                    stream.set_decrypted(decrypted);
                }
                PDFObject::Stream(stream)
            }
            other => other,
        }
    }

    /// Load (and cache, decoded) the container object stream, returning
    /// its `index`-th object.
    fn getobj_objstm(&self, streamid: u32, index: usize, objid: u32) -> Result<PDFObject> {
        let objstm = self.load_objstm(streamid)?;
        if index >= objstm.ids.len() {
            return Err(PdfError::Resolve {
                pos: None,
                msg: format!(
                    "object stream {} has {} objects, wanted index {}",
                    streamid,
                    objstm.ids.len(),
                    index
                ),
            });
        }
        if objstm.ids[index] != objid {
            return Err(PdfError::Resolve {
                pos: None,
                msg: format!(
                    "object stream {} slot {} holds object {}, wanted {}",
                    streamid, index, objstm.ids[index], objid
                ),
            });
        }
        let offset = objstm.first + objstm.offsets[index];
        if offset >= objstm.data.len() {
            return Err(PdfError::Resolve {
                pos: None,
                msg: format!("offset {} beyond object stream payload", offset),
            });
        }
        let mut parser = ObjectParser::at(&objstm.data, offset);
        // Contents of an object stream were decrypted with the stream;
        // they are never decrypted individually.
        parser.parse_object()
    }

    fn load_objstm(&self, streamid: u32) -> Result<Rc<ObjStm>> {
        if let Some(cached) = self.objstm_cache.borrow().get(&streamid) {
            return Ok(Rc::clone(cached));
        }
        let container = self.try_getobj(streamid)?;
        let stream = container.as_stream()?;
        match stream.get("Type") {
            Some(PDFObject::Name(name)) if name == "ObjStm" => {}
            _ => {
                return Err(PdfError::Resolve {
                    pos: None,
                    msg: format!("object {} is not an object stream", streamid),
                })
            }
        }
        let n = self
            .resolve(stream.get("N").unwrap_or(&PDFObject::Null))
            .as_int()
            .map_err(|_| PdfError::parse(None, "object stream missing /N"))?
            .max(0) as usize;
        let first = self
            .resolve(stream.get("First").unwrap_or(&PDFObject::Null))
            .as_int()
            .map_err(|_| PdfError::parse(None, "object stream missing /First"))?
            .max(0) as usize;
        let data = self.decode_stream(stream);
        if first > data.len() {
            return Err(PdfError::parse(None, "/First beyond object stream payload"));
        }

        let mut ids = Vec::with_capacity(n);
        let mut offsets = Vec::with_capacity(n);
        let mut header = ObjectParser::new(&data[..first]);
        for _ in 0..n {
            let id = header.parse_object()?.as_int()?;
            let off = header.parse_object()?.as_int()?;
            ids.push(id.max(0) as u32);
            offsets.push(off.max(0) as usize);
        }
        let objstm = Rc::new(ObjStm {
            ids,
            offsets,
            first,
            data,
        });
        self.objstm_cache
            .borrow_mut()
            .insert(streamid, Rc::clone(&objstm));
        Ok(objstm)
    }

    /// Decode a stream payload: decryption first (once, keyed by the
    /// owning object), then the filter pipeline. Decoding failures keep
    /// the bytes produced so far and record a warning.
    pub fn decode_stream(&self, stream: &crate::model::objects::PDFStream) -> Vec<u8> {
        let mut data = stream.rawdata().to_vec();
        if !stream.is_decrypted() {
            if let Some(handler) = &self.security_handler {
                let objid = stream.objid.unwrap_or(0);
                let genno = stream.genno.unwrap_or(0);
                data = handler.decrypt_stream(objid, genno, &data, &stream.attrs);
            }
        }
        let specs = self.resolved_filter_specs(stream);
        let (decoded, err) = apply_filters(&data, &specs);
        if let Some(err) = err {
            self.warn(PdfWarning::from(&err));
        }
        decoded
    }

    fn resolved_filter_specs(&self, stream: &crate::model::objects::PDFStream) -> Vec<FilterSpec> {
        let filter = match stream.get("Filter") {
            Some(f) => self.resolve_shallow(f),
            None => return Vec::new(),
        };
        let parms = stream
            .get("DecodeParms")
            .or_else(|| stream.get("DP"))
            .map(|p| self.resolve_shallow(p));
        filter_specs(&filter, parms.as_ref())
    }

    /// Resolve a value and, for arrays, its immediate elements.
    fn resolve_shallow(&self, obj: &PDFObject) -> PDFObject {
        match self.resolve(obj) {
            PDFObject::Array(arr) => {
                PDFObject::Array(arr.iter().map(|item| self.resolve(item)).collect())
            }
            other => other,
        }
    }

    /// Build (or fetch from cache) the font for a /Font resource
    /// dictionary. `objid` keys the cache when the resource was an
    /// indirect reference.
    pub fn get_font(&self, objid: Option<u32>, spec: &HashMap<String, PDFObject>) -> Rc<Font> {
        if let Some(objid) = objid {
            if let Some(font) = self.font_cache.borrow().get(&objid) {
                return Rc::clone(font);
            }
        }
        let font = Rc::new(Font::from_spec(self, spec));
        if let Some(objid) = objid {
            self.font_cache.borrow_mut().insert(objid, Rc::clone(&font));
        }
        font
    }

    /// The document outline (bookmark tree) root items, if any.
    pub fn outlines(&self) -> Vec<outline::OutlineItem> {
        outline::parse_outlines(self)
    }

    /// The logical structure tree, if the document has one.
    pub fn structtree(&self) -> Option<structtree::StructTree> {
        structtree::StructTree::from_document(self)
    }

    /// The page list, walked from the catalog's /Pages tree.
    pub fn pages(&self) -> page::PageList<'_> {
        page::PageList::new(self)
    }

    /// Resolve an explicit reference.
    pub fn resolve_ref(&self, r: &ObjRef) -> Rc<PDFObject> {
        self.getobj(r.objid)
    }
}
