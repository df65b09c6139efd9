use std::collections::HashMap;
use std::sync::Arc;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use super::{CryptoError, EncryptionMethod, Secret};

/// Identifies one cached key
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct KeySlot {
    method: EncryptionMethod,
    key_ref: String,
}

impl KeySlot {
    fn new(method: EncryptionMethod, key_ref: &str) -> Self {
        Self {
            method,
            key_ref: key_ref.to_string(),
        }
    }
}

/// Portable key material, shaped like an `oct` JSON Web Key
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportedKey {
    pub kty: String,
    pub alg: String,
    /// base64url (unpadded) raw key bytes
    pub k: String,
    pub key_ref: String,
}

/// Cache of symmetric keys keyed by `(method, keyRef)`
///
/// Cloning a `KeyStore` shares the cache. Separate instances never see
///  each other's keys unless material is moved with
///  [`KeyStore::export_key`] / [`KeyStore::import_key`].
#[derive(Debug, Clone, Default)]
pub struct KeyStore {
    keys: Arc<Mutex<HashMap<KeySlot, Secret>>>,
}

impl KeyStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the key for `(method, key_ref)`, generating it on first use.
    ///
    /// Generation happens under the cache lock, so concurrent first use of
    ///  the same slot yields exactly one key.
    pub fn get_key(&self, method: EncryptionMethod, key_ref: &str) -> Result<Secret, CryptoError> {
        let mut keys = self.keys.lock();
        let slot = KeySlot::new(method, key_ref);
        if let Some(secret) = keys.get(&slot) {
            return Ok(secret.clone());
        }

        let secret = Secret::generate()?;
        tracing::debug!(method = %method, key_ref = %key_ref, "generated new key");
        keys.insert(slot, secret.clone());
        Ok(secret)
    }

    /// Get a key only if it was already generated or imported
    pub fn existing_key(
        &self,
        method: EncryptionMethod,
        key_ref: &str,
    ) -> Result<Secret, CryptoError> {
        self.keys
            .lock()
            .get(&KeySlot::new(method, key_ref))
            .cloned()
            .ok_or_else(|| CryptoError::KeyNotFound {
                method: method.to_string(),
                key_ref: key_ref.to_string(),
            })
    }

    pub fn export_key(
        &self,
        key_ref: &str,
        method: EncryptionMethod,
    ) -> Result<ExportedKey, CryptoError> {
        let secret = self.existing_key(method, key_ref)?;
        Ok(ExportedKey {
            kty: "oct".to_string(),
            alg: method.jwk_alg().to_string(),
            k: URL_SAFE_NO_PAD.encode(secret.bytes()),
            key_ref: key_ref.to_string(),
        })
    }

    /// Install exported key material under `(method, key_ref)`, replacing
    ///  whatever key the slot held before.
    pub fn import_key(
        &self,
        material: &ExportedKey,
        method: EncryptionMethod,
        key_ref: &str,
    ) -> Result<(), CryptoError> {
        if material.kty != "oct" {
            return Err(CryptoError::InvalidKeyMaterial(format!(
                "unsupported key type {}",
                material.kty
            )));
        }
        if material.alg != method.jwk_alg() {
            return Err(CryptoError::InvalidKeyMaterial(format!(
                "key algorithm {} does not match {}",
                material.alg, method
            )));
        }
        let bytes = URL_SAFE_NO_PAD
            .decode(&material.k)
            .map_err(|e| CryptoError::InvalidKeyMaterial(e.to_string()))?;
        let secret = Secret::from_slice(&bytes)?;

        self.keys.lock().insert(KeySlot::new(method, key_ref), secret);
        tracing::debug!(method = %method, key_ref = %key_ref, "imported key");
        Ok(())
    }

    /// Drop every cached key
    pub fn clear(&self) {
        self.keys.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.keys.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.lock().is_empty()
    }
}
