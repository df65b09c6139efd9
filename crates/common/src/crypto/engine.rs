use std::fmt;
use std::str::FromStr;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use super::{CryptoError, KeyStore, Secret};

/// Method name used when a record does not specify one
pub const DEFAULT_METHOD: &str = "AES-GCM";
/// Key reference used when a record does not specify one
pub const DEFAULT_KEY_REF: &str = "defaultKey";

/// Supported AEAD cipher families
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum EncryptionMethod {
    /// AES-256-GCM with a 12 byte nonce
    #[default]
    AesGcm,
}

impl EncryptionMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            EncryptionMethod::AesGcm => DEFAULT_METHOD,
        }
    }

    /// JWK `alg` value for exported key material
    pub fn jwk_alg(&self) -> &'static str {
        match self {
            EncryptionMethod::AesGcm => "A256GCM",
        }
    }
}

impl fmt::Display for EncryptionMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EncryptionMethod {
    type Err = CryptoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case(DEFAULT_METHOD) {
            Ok(EncryptionMethod::AesGcm)
        } else {
            Err(CryptoError::UnsupportedMethod(s.to_string()))
        }
    }
}

/// Text-in, text-out AEAD over keys held by a [`KeyStore`]
///
/// The engine never looks inside the plaintext; callers serialize
///  structured content before encrypting and remember how to read it back.
#[derive(Debug, Clone, Default)]
pub struct EncryptionEngine {
    keys: KeyStore,
}

impl EncryptionEngine {
    pub fn new(keys: KeyStore) -> Self {
        Self { keys }
    }

    pub fn key_store(&self) -> &KeyStore {
        &self.keys
    }

    /// Resolve the key for a slot. Deterministic mode derives the key from
    ///  the reference instead of consulting the cache.
    pub fn get_key(
        &self,
        method: &str,
        key_ref: &str,
        deterministic: bool,
    ) -> Result<Secret, CryptoError> {
        let method = method.parse::<EncryptionMethod>()?;
        if deterministic {
            return Ok(Secret::derive(key_ref));
        }
        self.keys.get_key(method, key_ref)
    }

    /// Encrypt `plaintext`, returning `base64(nonce || ciphertext || tag)`
    pub fn encrypt(
        &self,
        plaintext: &str,
        method: &str,
        key_ref: &str,
        deterministic: bool,
    ) -> Result<String, CryptoError> {
        let secret = self.get_key(method, key_ref, deterministic)?;
        let sealed = if deterministic {
            secret.encrypt_deterministic(plaintext.as_bytes())?
        } else {
            secret.encrypt(plaintext.as_bytes())?
        };
        Ok(STANDARD.encode(sealed))
    }

    /// Reverse [`EncryptionEngine::encrypt`]
    ///
    /// Malformed base64, truncated input, tag mismatch and non UTF-8 output
    ///  all surface as the same `DecryptionFailure`.
    pub fn decrypt(
        &self,
        ciphertext: &str,
        method: &str,
        key_ref: &str,
        deterministic: bool,
    ) -> Result<String, CryptoError> {
        let secret = self.get_key(method, key_ref, deterministic)?;
        let sealed = STANDARD
            .decode(ciphertext)
            .map_err(|_| CryptoError::DecryptionFailure)?;
        let plaintext = secret.decrypt(&sealed)?;
        String::from_utf8(plaintext).map_err(|_| CryptoError::DecryptionFailure)
    }

    /// Drop every cached key
    pub fn clear_keys(&self) {
        self.keys.clear();
    }
}
