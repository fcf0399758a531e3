//! Access Gate: passphrase-based AES-256-GCM encryption for page payloads
//!
//! Provides authenticated encryption that the browser can undo with nothing
//! but WebCrypto:
//! - PBKDF2-HMAC-SHA256 key derivation with a per-build random salt
//! - AES-256-GCM with a 96-bit random IV
//! - 128-bit authentication tag appended to the ciphertext
//!
//! **Design**:
//! - Salt, IV and iteration count travel in the decode parameters (not secret)
//! - Sealed layout: [ciphertext][tag], exactly what `crypto.subtle.decrypt` takes
//! - Every failure to open maps to the same generic [`VeilError::Access`]

use crate::error::{Result, VeilError};
use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use hmac::Hmac;
use rand::{CryptoRng, RngCore};
use sha2::Sha256;

/// Derived key (32 bytes for AES-256)
pub type EncryptionKey = [u8; 32];

/// Salt size for PBKDF2 (128 bits)
pub const SALT_SIZE: usize = 16;

/// Nonce size for AES-GCM (96 bits / 12 bytes)
pub const NONCE_SIZE: usize = 12;

/// Authentication tag size (128 bits / 16 bytes)
pub const TAG_SIZE: usize = 16;

/// Everything a client needs, besides the passphrase, to open a sealed payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SealParams {
    pub salt: [u8; SALT_SIZE],
    pub nonce: [u8; NONCE_SIZE],
    pub iterations: u32,
}

impl SealParams {
    /// Draw a fresh salt and IV from `rng`
    pub fn generate<R: RngCore + CryptoRng>(rng: &mut R, iterations: u32) -> Self {
        let mut salt = [0u8; SALT_SIZE];
        let mut nonce = [0u8; NONCE_SIZE];
        rng.fill_bytes(&mut salt);
        rng.fill_bytes(&mut nonce);
        SealParams {
            salt,
            nonce,
            iterations,
        }
    }
}

/// Derive the AES key from a passphrase
pub fn derive_key(passphrase: &str, salt: &[u8], iterations: u32) -> Result<EncryptionKey> {
    if iterations == 0 {
        return Err(VeilError::Encryption("iterations must be > 0".to_string()));
    }

    let mut key = [0u8; 32];
    pbkdf2::pbkdf2::<Hmac<Sha256>>(passphrase.as_bytes(), salt, iterations, &mut key)
        .map_err(|e| VeilError::Encryption(format!("key derivation failed: {}", e)))?;
    Ok(key)
}

/// Encrypt data under a passphrase
///
/// Returns [ciphertext][tag]; the salt and nonce stay in `params`.
pub fn seal(data: &[u8], passphrase: &str, params: &SealParams) -> Result<Vec<u8>> {
    let key = derive_key(passphrase, &params.salt, params.iterations)?;
    let cipher = Aes256Gcm::new((&key).into());
    let nonce = Nonce::from_slice(&params.nonce);

    cipher
        .encrypt(nonce, data)
        .map_err(|e| VeilError::Encryption(format!("encryption failed: {}", e)))
}

/// Decrypt data sealed by [`seal`]
///
/// A wrong passphrase, a tampered payload and a truncated payload all yield
/// the same [`VeilError::Access`].
pub fn open(sealed: &[u8], passphrase: &str, params: &SealParams) -> Result<Vec<u8>> {
    if sealed.len() < TAG_SIZE {
        return Err(VeilError::Access);
    }

    let key =
        derive_key(passphrase, &params.salt, params.iterations).map_err(|_| VeilError::Access)?;
    let cipher = Aes256Gcm::new((&key).into());
    let nonce = Nonce::from_slice(&params.nonce);

    cipher.decrypt(nonce, sealed).map_err(|_| VeilError::Access)
}
