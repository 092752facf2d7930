//! AES-CBC helpers for the standard security handler.

use aes::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use cbc::{Decryptor, Encryptor};

type Aes128CbcDec = Decryptor<aes::Aes128>;
type Aes256CbcDec = Decryptor<aes::Aes256>;
type Aes128CbcEnc = Encryptor<aes::Aes128>;

/// Decrypt AES-CBC with a 16- or 32-byte key. Input is truncated to a
/// whole number of blocks; no padding is removed here.
pub fn aes_cbc_decrypt(key: &[u8], iv: &[u8], data: &[u8]) -> Vec<u8> {
    if iv.len() != 16 || (key.len() != 16 && key.len() != 32) {
        return data.to_vec();
    }
    let mut buf = data[..data.len() - data.len() % 16].to_vec();
    match key.len() {
        16 => {
            let cipher = Aes128CbcDec::new(key.into(), iv.into());
            let _ = cipher.decrypt_padded_mut::<aes::cipher::block_padding::NoPadding>(&mut buf);
        }
        _ => {
            let cipher = Aes256CbcDec::new(key.into(), iv.into());
            let _ = cipher.decrypt_padded_mut::<aes::cipher::block_padding::NoPadding>(&mut buf);
        }
    }
    buf
}

/// Encrypt AES-128-CBC; used only by the R6 password hash. Input must be
/// a whole number of blocks.
pub fn aes_cbc_encrypt(key: &[u8], iv: &[u8], data: &[u8]) -> Vec<u8> {
    let mut buf = data.to_vec();
    let len = buf.len();
    let cipher = Aes128CbcEnc::new(key.into(), iv.into());
    let _ = cipher.encrypt_padded_mut::<aes::cipher::block_padding::NoPadding>(&mut buf, len);
    buf
}

/// Strip PKCS#7 padding, returning the input unchanged when the padding
/// is invalid.
pub fn unpad_aes(data: &[u8]) -> &[u8] {
    if data.is_empty() {
        return data;
    }
    let pad_len = data[data.len() - 1] as usize;
    if pad_len == 0 || pad_len > 16 || pad_len > data.len() {
        return data;
    }
    let start = data.len() - pad_len;
    if data[start..].iter().any(|&b| b as usize != pad_len) {
        return data;
    }
    &data[..start]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aes_roundtrip() {
        let key = [7u8; 16];
        let iv = [1u8; 16];
        let plain = b"0123456789abcdef0123456789abcdef";
        let enc = aes_cbc_encrypt(&key, &iv, plain);
        assert_eq!(aes_cbc_decrypt(&key, &iv, &enc), plain);
    }

    #[test]
    fn test_unpad() {
        assert_eq!(unpad_aes(b"hello\x03\x03\x03"), b"hello");
        assert_eq!(unpad_aes(b"hello\x09\x03\x03"), b"hello\x09\x03\x03");
    }
}
