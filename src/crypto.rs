//! Password-based secret sealing: PBKDF2-HMAC-SHA256 key derivation and
//! AES-256-GCM over `IV || ciphertext || tag` blobs, Base64 for transport.

use aes_gcm::{
    Aes256Gcm, Nonce,
    aead::{Aead, KeyInit},
};
use base64::{Engine, engine::general_purpose::STANDARD};
use hmac::Hmac;
use rand::RngCore;
use sha2::{Digest, Sha256};
use thiserror::Error;

pub const IV_LEN: usize = 12;
pub const TAG_LEN: usize = 16;
pub const KEY_LEN: usize = 32;

/// Salt every deployed secret was sealed with so far.
pub const LEGACY_SALT: &str = "fixed-salt";
pub const DEFAULT_ITERATIONS: u32 = 100_000;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CryptoError {
    #[error("key derivation failed: {0}")]
    KeyDerivation(String),
    #[error("decryption failed: {0}")]
    Decryption(String),
    #[error("encryption failed: {0}")]
    Encryption(String),
}

/// Salt and work factor for PBKDF2. Both sides of a secret must agree on them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KdfParams {
    pub salt: Vec<u8>,
    pub iterations: u32,
}

impl KdfParams {
    pub fn new(salt: impl Into<Vec<u8>>, iterations: u32) -> Self {
        Self {
            salt: salt.into(),
            iterations,
        }
    }

    pub fn uses_legacy_salt(&self) -> bool {
        self.salt == LEGACY_SALT.as_bytes()
    }
}

impl Default for KdfParams {
    fn default() -> Self {
        Self::new(LEGACY_SALT, DEFAULT_ITERATIONS)
    }
}

/// 256-bit AES-GCM key. Lives only in memory.
#[derive(Clone, PartialEq, Eq)]
pub struct DerivedKey([u8; KEY_LEN]);

impl DerivedKey {
    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.0
    }

    fn cipher(&self) -> Result<Aes256Gcm, CryptoError> {
        Aes256Gcm::new_from_slice(&self.0)
            .map_err(|e| CryptoError::KeyDerivation(format!("unusable key: {e}")))
    }
}

impl std::fmt::Debug for DerivedKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("DerivedKey(..)")
    }
}

/// Decrypted bearer credential for the completion endpoint.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    pub fn new(secret: impl Into<String>) -> Self {
        Self(secret.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    /// First 8 bytes of the SHA-256 digest, hex encoded.
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.0.as_bytes());
        hex::encode(&hasher.finalize()[..8])
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Credential({})", self.fingerprint())
    }
}

/// Decrypt a sealed credential.
pub fn unveil(
    cipher_base64: &str,
    password: &str,
    params: &KdfParams,
) -> Result<Credential, CryptoError> {
    decrypt_with(cipher_base64, password, params).map(Credential)
}

/// Derive the AES key for `password` with the default (legacy) parameters.
pub fn derive_key(password: &str) -> Result<DerivedKey, CryptoError> {
    derive_key_with(password, &KdfParams::default())
}

pub fn derive_key_with(password: &str, params: &KdfParams) -> Result<DerivedKey, CryptoError> {
    if params.iterations == 0 {
        return Err(CryptoError::KeyDerivation(
            "iteration count must be positive".to_string(),
        ));
    }
    log::debug!(
        "deriving key: pbkdf2-sha256, {} iterations, {}-byte salt",
        params.iterations,
        params.salt.len()
    );

    let mut key = [0u8; KEY_LEN];
    pbkdf2::pbkdf2::<Hmac<Sha256>>(password.as_bytes(), &params.salt, params.iterations, &mut key)
        .map_err(|e| CryptoError::KeyDerivation(e.to_string()))?;
    Ok(DerivedKey(key))
}

/// Seal `plain_text` under `password`, returning Base64 of `IV || ciphertext || tag`.
pub fn encrypt(plain_text: &str, password: &str) -> Result<String, CryptoError> {
    encrypt_with(plain_text, password, &KdfParams::default())
}

pub fn encrypt_with(
    plain_text: &str,
    password: &str,
    params: &KdfParams,
) -> Result<String, CryptoError> {
    let key = derive_key_with(password, params)?;
    encrypt_with_key(plain_text, &key)
}

/// Seal with an already derived key. Every call draws a fresh IV.
pub fn encrypt_with_key(plain_text: &str, key: &DerivedKey) -> Result<String, CryptoError> {
    let mut iv_bytes = [0u8; IV_LEN];
    rand::thread_rng().fill_bytes(&mut iv_bytes);
    let nonce = Nonce::from_slice(&iv_bytes);

    let ciphertext = key
        .cipher()?
        .encrypt(nonce, plain_text.as_bytes())
        .map_err(|e| CryptoError::Encryption(e.to_string()))?;

    let mut blob = Vec::with_capacity(IV_LEN + ciphertext.len());
    blob.extend_from_slice(&iv_bytes);
    blob.extend_from_slice(&ciphertext);

    Ok(STANDARD.encode(blob))
}

/// Open a Base64 secret produced by [`encrypt`].
pub fn decrypt(cipher_base64: &str, password: &str) -> Result<String, CryptoError> {
    decrypt_with(cipher_base64, password, &KdfParams::default())
}

pub fn decrypt_with(
    cipher_base64: &str,
    password: &str,
    params: &KdfParams,
) -> Result<String, CryptoError> {
    let blob = decode_blob(cipher_base64)?;
    let key = derive_key_with(password, params)?;
    open_blob(&blob, &key)
}

pub fn decrypt_with_key(cipher_base64: &str, key: &DerivedKey) -> Result<String, CryptoError> {
    let blob = decode_blob(cipher_base64)?;
    open_blob(&blob, key)
}

fn decode_blob(cipher_base64: &str) -> Result<Vec<u8>, CryptoError> {
    let blob = STANDARD
        .decode(cipher_base64.trim())
        .map_err(|e| CryptoError::Decryption(format!("invalid base64: {e}")))?;
    if blob.len() < IV_LEN + TAG_LEN {
        return Err(CryptoError::Decryption(format!(
            "blob is {} bytes, need at least {}",
            blob.len(),
            IV_LEN + TAG_LEN
        )));
    }
    Ok(blob)
}

fn open_blob(blob: &[u8], key: &DerivedKey) -> Result<String, CryptoError> {
    let (iv, ciphertext) = blob.split_at(IV_LEN);
    let nonce = Nonce::from_slice(iv);

    // aead errors are opaque: tampering, truncation and a wrong key look the same
    let plain = key
        .cipher()?
        .decrypt(nonce, ciphertext)
        .map_err(|_| CryptoError::Decryption("authentication failed".to_string()))?;

    String::from_utf8(plain)
        .map_err(|_| CryptoError::Decryption("plaintext is not valid UTF-8".to_string()))
}
