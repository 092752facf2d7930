//! Fonts, encodings and character maps.

pub mod cmap;
pub mod encoding;
pub mod latin_enc;
pub mod pdffont;
