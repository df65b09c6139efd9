//! Cryptographic primitives for the record envelope
//!
//! - **Content encryption**: AES-256-GCM `Secret`s, one per `(method, keyRef)` slot
//! - **Key cache**: `KeyStore`, an injectable cache with export/import for
//!   moving keys between instances
//! - **Engine**: `EncryptionEngine`, base64 text framing over the key cache
//! - **Node identity**: Ed25519 `SecretKey`/`PublicKey` reported by backends
//!
//! # Wire format
//!
//! `base64(nonce (12 bytes) || ciphertext || tag (16 bytes))`
//!
//! Every decryption failure (bad base64, truncation, tag mismatch, wrong key)
//! maps to the single `CryptoError::DecryptionFailure` variant.

mod engine;
mod key_store;
mod keys;
mod secret;

pub use engine::{EncryptionEngine, EncryptionMethod, DEFAULT_KEY_REF, DEFAULT_METHOD};
pub use key_store::{ExportedKey, KeyStore};
pub use keys::{KeyError, PublicKey, SecretKey};
pub use secret::{Secret, NONCE_SIZE, SECRET_SIZE, TAG_SIZE};

/// Errors that can occur during key management and encryption
#[derive(Debug, thiserror::Error)]
pub enum CryptoError {
    #[error("unsupported encryption method: {0}")]
    UnsupportedMethod(String),
    #[error("no {method} key for key reference {key_ref}")]
    KeyNotFound { method: String, key_ref: String },
    #[error("decryption failed")]
    DecryptionFailure,
    #[error("encryption failed")]
    EncryptionFailure,
    #[error("invalid key material: {0}")]
    InvalidKeyMaterial(String),
    #[error("crypto error: {0}")]
    Default(#[from] anyhow::Error),
}
