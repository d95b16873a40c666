//! PIN-derived authenticated encryption for vault secrets.
//!
//! Argon2id stretches the raw PIN into a 256-bit AES key using a per-blob
//! random salt, then AES-256-GCM provides confidentiality and tamper
//! detection. The stored credential hash (see [`crate::credential`]) is
//! salted per installation and is never reused as key material here.
//!
//! # Wire format
//! ```text
//! magic "VSB" (3 bytes) || version (1 byte) || salt (16 bytes)
//!     || nonce (12 bytes) || ciphertext + auth tag
//! ```
//!
//! Decryption failures never say why: a wrong PIN, a flipped ciphertext
//! byte, a truncated blob, and a bad header all surface as the single
//! [`VaultError::DecryptionFailed`].

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use argon2::Argon2;
use zeroize::Zeroizing;

use crate::error::VaultError;

/// Magic bytes identifying a Veil secret blob.
const BLOB_MAGIC: &[u8; 3] = b"VSB";

/// Current blob format version.
const BLOB_VERSION: u8 = 1;

/// KDF salt length in bytes.
const SALT_LEN: usize = 16;

/// AES-GCM nonce length in bytes.
const NONCE_LEN: usize = 12;

/// Header length: magic + version + salt + nonce.
const HEADER_LEN: usize = 3 + 1 + SALT_LEN + NONCE_LEN;

/// Minimum blob size: header plus the 16-byte auth tag.
const MIN_BLOB_LEN: usize = HEADER_LEN + 16;

/// Derive a 256-bit key from a raw PIN and salt using Argon2id.
///
/// The returned key is zeroized when dropped.
fn derive_key(raw_pin: &str, salt: &[u8]) -> Result<Zeroizing<[u8; 32]>, VaultError> {
    let mut key = Zeroizing::new([0u8; 32]);
    Argon2::default()
        .hash_password_into(raw_pin.as_bytes(), salt, key.as_mut())
        .map_err(|e| VaultError::Encryption(e.to_string()))?;
    Ok(key)
}

/// Encrypt a secret string under a key derived from `raw_pin`.
///
/// Generates a fresh salt and nonce per call, so encrypting the same secret
/// twice yields different blobs.
pub fn encrypt(plaintext: &str, raw_pin: &str) -> Result<Vec<u8>, VaultError> {
    use rand::RngCore;
    let mut salt = [0u8; SALT_LEN];
    let mut nonce_bytes = [0u8; NONCE_LEN];
    rand::rngs::OsRng.fill_bytes(&mut salt);
    rand::rngs::OsRng.fill_bytes(&mut nonce_bytes);

    let key = derive_key(raw_pin, &salt)?;
    let cipher = Aes256Gcm::new_from_slice(key.as_ref())
        .map_err(|e| VaultError::Encryption(e.to_string()))?;
    let nonce = Nonce::from_slice(&nonce_bytes);

    let ciphertext = cipher
        .encrypt(nonce, plaintext.as_bytes())
        .map_err(|e| VaultError::Encryption(e.to_string()))?;

    let mut blob = Vec::with_capacity(HEADER_LEN + ciphertext.len());
    blob.extend_from_slice(BLOB_MAGIC);
    blob.push(BLOB_VERSION);
    blob.extend_from_slice(&salt);
    blob.extend_from_slice(&nonce_bytes);
    blob.extend_from_slice(&ciphertext);
    Ok(blob)
}

/// Decrypt a blob produced by [`encrypt`].
///
/// Any failure, from a malformed header to an authentication tag mismatch,
/// returns [`VaultError::DecryptionFailed`] with no distinguishing payload.
pub fn decrypt(blob: &[u8], raw_pin: &str) -> Result<String, VaultError> {
    if blob.len() < MIN_BLOB_LEN
        || &blob[..3] != BLOB_MAGIC
        || blob[3] != BLOB_VERSION
    {
        return Err(VaultError::DecryptionFailed);
    }

    let salt = &blob[4..4 + SALT_LEN];
    let nonce_bytes = &blob[4 + SALT_LEN..HEADER_LEN];
    let ciphertext = &blob[HEADER_LEN..];

    let key = derive_key(raw_pin, salt).map_err(|_| VaultError::DecryptionFailed)?;
    let cipher =
        Aes256Gcm::new_from_slice(key.as_ref()).map_err(|_| VaultError::DecryptionFailed)?;
    let nonce = Nonce::from_slice(nonce_bytes);

    let plaintext = cipher
        .decrypt(nonce, ciphertext)
        .map_err(|_| VaultError::DecryptionFailed)?;

    String::from_utf8(plaintext).map_err(|_| VaultError::DecryptionFailed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encrypt_decrypt_roundtrip() {
        let blob = encrypt("abandon ability able about", "123456").unwrap();
        let back = decrypt(&blob, "123456").unwrap();
        assert_eq!(back, "abandon ability able about");
    }

    #[test]
    fn empty_secret_roundtrip() {
        let blob = encrypt("", "123456").unwrap();
        assert_eq!(decrypt(&blob, "123456").unwrap(), "");
    }

    #[test]
    fn wrong_pin_fails() {
        let blob = encrypt("secret phrase", "111111").unwrap();
        assert_eq!(decrypt(&blob, "222222").unwrap_err(), VaultError::DecryptionFailed);
    }

    #[test]
    fn same_input_different_blobs() {
        let a = encrypt("secret", "123456").unwrap();
        let b = encrypt("secret", "123456").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn blob_starts_with_magic_and_version() {
        let blob = encrypt("secret", "123456").unwrap();
        assert_eq!(&blob[..3], BLOB_MAGIC);
        assert_eq!(blob[3], BLOB_VERSION);
    }

    #[test]
    fn blob_has_expected_overhead() {
        let blob = encrypt("hello", "123456").unwrap();
        assert_eq!(blob.len(), HEADER_LEN + "hello".len() + 16);
    }

    #[test]
    fn truncated_blob_fails() {
        assert_eq!(decrypt(&[0u8; 8], "123456").unwrap_err(), VaultError::DecryptionFailed);
    }

    #[test]
    fn bad_magic_fails() {
        let mut blob = encrypt("secret", "123456").unwrap();
        blob[0] ^= 0xFF;
        assert_eq!(decrypt(&blob, "123456").unwrap_err(), VaultError::DecryptionFailed);
    }

    #[test]
    fn unknown_version_fails() {
        let mut blob = encrypt("secret", "123456").unwrap();
        blob[3] = 99;
        assert_eq!(decrypt(&blob, "123456").unwrap_err(), VaultError::DecryptionFailed);
    }

    #[test]
    fn any_flipped_byte_fails() {
        let blob = encrypt("tamper me", "123456").unwrap();
        for i in 0..blob.len() {
            let mut copy = blob.clone();
            copy[i] ^= 0x01;
            assert_eq!(
                decrypt(&copy, "123456").unwrap_err(),
                VaultError::DecryptionFailed,
                "flipping byte {i} should fail decryption",
            );
        }
    }

    #[test]
    fn derive_key_deterministic_per_salt() {
        let salt = [9u8; SALT_LEN];
        let a = derive_key("123456", &salt).unwrap();
        let b = derive_key("123456", &salt).unwrap();
        assert_eq!(a.as_ref(), b.as_ref());
        let c = derive_key("654321", &salt).unwrap();
        assert_ne!(a.as_ref(), c.as_ref());
    }
}
