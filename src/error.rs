//! Error and warning types for PDF decoding.

use thiserror::Error;

/// Primary error type. Every failure carries a kind, an optional byte
/// offset into the document, and a message.
#[derive(Error, Debug)]
pub enum PdfError {
    #[error("lexical error at {pos}: {msg}")]
    Lex { pos: usize, msg: String },

    #[error("syntax error{}: {msg}", fmt_pos(.pos))]
    Parse { pos: Option<usize>, msg: String },

    #[error("cross-reference error{}: {msg}", fmt_pos(.pos))]
    Xref { pos: Option<usize>, msg: String },

    #[error("encryption error: {msg}")]
    Crypt { msg: String },

    #[error("stream decoding error{}: {msg}", fmt_pos(.pos))]
    Filter { pos: Option<usize>, msg: String },

    #[error("object resolution error{}: {msg}", fmt_pos(.pos))]
    Resolve { pos: Option<usize>, msg: String },

    #[error("content interpretation error{}: {msg}", fmt_pos(.pos))]
    Interp { pos: Option<usize>, msg: String },

    #[error("font error: {msg}")]
    Font { msg: String },

    #[error("unsupported feature: {msg}")]
    Unsupported { msg: String },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

fn fmt_pos(pos: &Option<usize>) -> String {
    match pos {
        Some(p) => format!(" at {}", p),
        None => String::new(),
    }
}

impl PdfError {
    /// Short kind name, stable across releases.
    pub fn kind(&self) -> &'static str {
        match self {
            PdfError::Lex { .. } => "Lex",
            PdfError::Parse { .. } => "Parse",
            PdfError::Xref { .. } => "Xref",
            PdfError::Crypt { .. } => "Crypt",
            PdfError::Filter { .. } => "Filter",
            PdfError::Resolve { .. } => "Resolve",
            PdfError::Interp { .. } => "Interp",
            PdfError::Font { .. } => "Font",
            PdfError::Unsupported { .. } => "Unsupported",
            PdfError::Io(_) => "Io",
        }
    }

    /// Byte offset associated with the failure, if any.
    pub fn pos(&self) -> Option<usize> {
        match self {
            PdfError::Lex { pos, .. } => Some(*pos),
            PdfError::Parse { pos, .. }
            | PdfError::Xref { pos, .. }
            | PdfError::Filter { pos, .. }
            | PdfError::Resolve { pos, .. }
            | PdfError::Interp { pos, .. } => *pos,
            _ => None,
        }
    }

    pub(crate) fn parse(pos: impl Into<Option<usize>>, msg: impl Into<String>) -> Self {
        PdfError::Parse {
            pos: pos.into(),
            msg: msg.into(),
        }
    }

    pub(crate) fn type_error(expected: &'static str, got: &'static str) -> Self {
        PdfError::Parse {
            pos: None,
            msg: format!("expected {}, got {}", expected, got),
        }
    }
}

/// Convenience Result alias.
pub type Result<T> = std::result::Result<T, PdfError>;

/// A recoverable problem recorded on the document or page instead of
/// aborting decoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PdfWarning {
    /// Error kind this would have been ("Lex", "Filter", ...).
    pub kind: &'static str,
    /// Byte offset in the document or content stream, if known.
    pub pos: Option<usize>,
    pub msg: String,
}

impl PdfWarning {
    pub fn new(kind: &'static str, pos: Option<usize>, msg: impl Into<String>) -> Self {
        Self {
            kind,
            pos,
            msg: msg.into(),
        }
    }
}

impl From<&PdfError> for PdfWarning {
    fn from(err: &PdfError) -> Self {
        PdfWarning::new(err.kind(), err.pos(), err.to_string())
    }
}
