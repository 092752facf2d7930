//! marea - low-level PDF access.
//!
//! Given a PDF byte stream, marea exposes the document's indirect-object
//! graph, page tree, content streams, logical structure tree and, for
//! each page, the absolute position and attributes of every character,
//! path segment and image. No heuristic layout analysis, no rendering,
//! no writing.

pub mod codec;
pub mod content;
pub mod data_structures;
pub mod document;
pub mod error;
pub mod font;
pub mod interp;
pub mod model;
pub mod parser;
pub mod utils;

pub use content::ContentObject;
pub use document::page::{Page, PageList};
pub use document::Document;
pub use error::{PdfError, PdfWarning, Result};
pub use model::objects::{IndirectObject, ObjRef, PDFObject, PDFStream};

use bytes::Bytes;

/// Open a document from bytes with the empty user password.
pub fn open(data: impl Into<Bytes>) -> Result<Document> {
    Document::open(data, "")
}

/// Open a document from bytes with a user or owner password.
pub fn open_with_password(data: impl Into<Bytes>, password: &str) -> Result<Document> {
    Document::open(data, password)
}
