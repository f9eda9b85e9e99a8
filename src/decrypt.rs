//! AES-CBC page decryption
//!
//! Obfuscated pages are AES-CBC ciphertext with PKCS#7 padding and a fixed,
//! publicly-known initialization vector of sixteen ASCII `'0'` bytes. The
//! per-chapter key comes from the [`KeyStore`](crate::keystore::KeyStore);
//! its length (16/24/32 bytes) selects the AES variant.

use crate::error::DecryptError;
use aes::{Aes128, Aes192, Aes256};
use cbc::cipher::block_padding::Pkcs7;
use cbc::cipher::{BlockDecryptMut, KeyIvInit};

/// The fixed initialization vector used by the origin's in-page decryptor
pub const PAGE_IV: [u8; 16] = *b"0000000000000000";

/// Decrypt one page's ciphertext with the given key material
///
/// # Errors
///
/// Returns [`DecryptError::BadKeyLength`] for key material that is not a
/// valid AES key size, and [`DecryptError::Cipher`] when the ciphertext is
/// not whole blocks or the padding does not check out (the usual symptom of a
/// rotated key).
pub fn decrypt_page(ciphertext: &[u8], key: &[u8]) -> Result<Vec<u8>, DecryptError> {
    match key.len() {
        16 => decrypt_cbc::<cbc::Decryptor<Aes128>>(ciphertext, key),
        24 => decrypt_cbc::<cbc::Decryptor<Aes192>>(ciphertext, key),
        32 => decrypt_cbc::<cbc::Decryptor<Aes256>>(ciphertext, key),
        len => Err(DecryptError::BadKeyLength { len }),
    }
}

fn decrypt_cbc<D>(ciphertext: &[u8], key: &[u8]) -> Result<Vec<u8>, DecryptError>
where
    D: BlockDecryptMut + KeyIvInit,
{
    let cipher =
        D::new_from_slices(key, &PAGE_IV).map_err(|e| DecryptError::Cipher(e.to_string()))?;
    cipher
        .decrypt_padded_vec_mut::<Pkcs7>(ciphertext)
        .map_err(|e| DecryptError::Cipher(e.to_string()))
}
