//! Content encryption using AES-256-GCM
//!
//! A `Secret` is the symmetric key behind one `(method, keyRef)` slot of the
//! [`KeyStore`](super::KeyStore). The wire format produced here is
//! `nonce (12 bytes) || ciphertext || tag (16 bytes)`; base64 framing is left
//! to the [`EncryptionEngine`](super::EncryptionEngine).

use std::fmt;
use std::ops::Deref;

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Key, Nonce,
};
use serde::{Deserialize, Serialize};

use super::CryptoError;

/// Size of AES-GCM nonce in bytes
pub const NONCE_SIZE: usize = 12;
/// Size of AES-256 key in bytes (256 bits)
pub const SECRET_SIZE: usize = 32;
/// Size of the AES-GCM authentication tag in bytes
pub const TAG_SIZE: usize = 16;

/// Domain separation context for keys derived from a key reference
const DETERMINISTIC_KEY_CONTEXT: &str = "envelope-common 2025-01 deterministic record key";

/// A 256-bit symmetric encryption key
///
/// # Examples
///
/// ```ignore
/// let secret = Secret::generate()?;
///
/// let ciphertext = secret.encrypt(b"sensitive data")?;
/// let recovered = secret.decrypt(&ciphertext)?;
/// assert_eq!(b"sensitive data", &recovered[..]);
/// ```
#[derive(PartialEq, Eq, Clone, Serialize, Deserialize)]
pub struct Secret([u8; SECRET_SIZE]);

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(..)")
    }
}

impl Deref for Secret {
    type Target = [u8; SECRET_SIZE];
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl From<[u8; SECRET_SIZE]> for Secret {
    fn from(bytes: [u8; SECRET_SIZE]) -> Self {
        Secret(bytes)
    }
}

impl Secret {
    /// Generate a new random secret using a cryptographically secure RNG
    pub fn generate() -> Result<Self, CryptoError> {
        let mut buff = [0; SECRET_SIZE];
        getrandom::getrandom(&mut buff)
            .map_err(|e| anyhow::anyhow!("failed to generate key material: {}", e))?;
        Ok(Self(buff))
    }

    /// Derive a secret from a key reference alone.
    ///
    /// Only used for reproducible fixtures: anyone who knows the key
    /// reference can recompute the key.
    pub fn derive(key_ref: &str) -> Self {
        Self(blake3::derive_key(
            DETERMINISTIC_KEY_CONTEXT,
            key_ref.as_bytes(),
        ))
    }

    /// Create a secret from a byte slice
    ///
    /// # Errors
    ///
    /// Returns an error if the slice length is not exactly `SECRET_SIZE` bytes.
    pub fn from_slice(data: &[u8]) -> Result<Self, CryptoError> {
        if data.len() != SECRET_SIZE {
            return Err(CryptoError::InvalidKeyMaterial(format!(
                "invalid secret size, expected {}, got {}",
                SECRET_SIZE,
                data.len()
            )));
        }
        let mut buff = [0; SECRET_SIZE];
        buff.copy_from_slice(data);
        Ok(buff.into())
    }

    /// Get a reference to the secret key bytes
    pub fn bytes(&self) -> &[u8] {
        self.0.as_ref()
    }

    /// Encrypt data under a fresh random nonce
    pub fn encrypt(&self, data: &[u8]) -> Result<Vec<u8>, CryptoError> {
        let mut nonce = [0u8; NONCE_SIZE];
        getrandom::getrandom(&mut nonce)
            .map_err(|e| anyhow::anyhow!("failed to generate nonce: {}", e))?;
        self.seal(nonce, data)
    }

    /// Encrypt data under a nonce derived from the key and the plaintext.
    ///
    /// Identical `(key, plaintext)` pairs always produce identical output,
    ///  which is what makes fixtures reproducible and what makes this mode
    ///  unsuitable for anything else.
    pub fn encrypt_deterministic(&self, data: &[u8]) -> Result<Vec<u8>, CryptoError> {
        let digest = blake3::keyed_hash(&self.0, data);
        let mut nonce = [0u8; NONCE_SIZE];
        nonce.copy_from_slice(&digest.as_bytes()[..NONCE_SIZE]);
        self.seal(nonce, data)
    }

    fn seal(&self, nonce: [u8; NONCE_SIZE], data: &[u8]) -> Result<Vec<u8>, CryptoError> {
        let key = Key::<Aes256Gcm>::from_slice(self.bytes());
        let cipher = Aes256Gcm::new(key);

        let ciphertext = cipher
            .encrypt(Nonce::from_slice(&nonce), data)
            .map_err(|_| CryptoError::EncryptionFailure)?;

        let mut out = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
        out.extend_from_slice(&nonce);
        out.extend_from_slice(ciphertext.as_ref());

        Ok(out)
    }

    /// Decrypt data produced by [`Secret::encrypt`] or [`Secret::encrypt_deterministic`]
    ///
    /// # Errors
    ///
    /// Returns `DecryptionFailure` if the data is too short to contain a
    /// nonce or the authentication tag does not verify (tampering or wrong key).
    pub fn decrypt(&self, data: &[u8]) -> Result<Vec<u8>, CryptoError> {
        if data.len() < NONCE_SIZE {
            return Err(CryptoError::DecryptionFailure);
        }

        let key = Key::<Aes256Gcm>::from_slice(self.bytes());
        let nonce = Nonce::from_slice(&data[..NONCE_SIZE]);
        let cipher = Aes256Gcm::new(key);
        cipher
            .decrypt(nonce, &data[NONCE_SIZE..])
            .map_err(|_| CryptoError::DecryptionFailure)
    }
}
