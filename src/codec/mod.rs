//! Stream decoders and ciphers.

pub mod aes;
pub mod arcfour;
pub mod ascii85;
pub mod filters;
pub mod lzw;
pub mod runlength;
