//! Records, bundles and the envelope fields carried alongside their content.
//!
//! The serialized form of a [`Record`] is the exact byte string handed to a
//! backend, so anything that must not influence the address (the address
//! itself, the in-memory pin request) is skipped during serialization.

mod content;
mod scope;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::backend::Address;
use crate::crypto::{DEFAULT_KEY_REF, DEFAULT_METHOD};

pub use content::{Content, ContentType};
pub use scope::{BackendClass, InvalidScope, Scope};

/// Free-form key/value annotations
pub type Metadata = serde_json::Map<String, Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Kind {
    Data,
    Schema,
}

/// Encryption envelope of a record
///
/// `ciphertext` is the single source of truth for whether `content`
///  currently holds ciphertext.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EncryptionInfo {
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_ref: Option<String>,
    #[serde(default)]
    pub ciphertext: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<ContentType>,
}

impl EncryptionInfo {
    /// Envelope for a record stored in the clear
    pub fn disabled() -> Self {
        Self::default()
    }

    /// AES-GCM under the given key reference
    pub fn aes_gcm(key_ref: impl Into<String>) -> Self {
        Self {
            enabled: true,
            method: Some(DEFAULT_METHOD.to_string()),
            key_ref: Some(key_ref.into()),
            ..Default::default()
        }
    }

    pub fn method(&self) -> &str {
        self.method.as_deref().unwrap_or(DEFAULT_METHOD)
    }

    pub fn key_ref(&self) -> &str {
        self.key_ref.as_deref().unwrap_or(DEFAULT_KEY_REF)
    }
}

/// Access annotation carried with a record. Not enforced here.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AccessPolicy {
    #[serde(rename = "hiddenFromLLM", default)]
    pub hidden_from_llm: bool,
    #[serde(rename = "allowedTools", default)]
    pub allowed_tools: Vec<String>,
    #[serde(rename = "allowedUsers", default)]
    pub allowed_users: Vec<String>,
}

/// A unit of published content
///
/// A record without an address has never been persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Record {
    #[serde(skip)]
    pub address: Option<Address>,
    pub content: Content,
    pub kind: Kind,
    pub scope: Scope,
    /// On publish: pin after storing. On fetch: whether the backend has it pinned.
    #[serde(skip)]
    pub pinned: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encryption: Option<EncryptionInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_policy: Option<AccessPolicy>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Metadata>,
}

impl Record {
    pub fn new(kind: Kind, scope: Scope, content: impl Into<Content>) -> Self {
        Self {
            address: None,
            content: content.into(),
            kind,
            scope,
            pinned: false,
            encryption: None,
            access_policy: None,
            metadata: None,
        }
    }

    pub fn data(scope: Scope, content: impl Into<Content>) -> Self {
        Self::new(Kind::Data, scope, content)
    }

    pub fn schema(scope: Scope, content: impl Into<Content>) -> Self {
        Self::new(Kind::Schema, scope, content)
    }

    pub fn with_encryption(mut self, encryption: EncryptionInfo) -> Self {
        self.encryption = Some(encryption);
        self
    }

    pub fn with_access_policy(mut self, policy: AccessPolicy) -> Self {
        self.access_policy = Some(policy);
        self
    }

    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = Some(metadata);
        self
    }

    pub fn pinned(mut self, pinned: bool) -> Self {
        self.pinned = pinned;
        self
    }

    /// Whether `content` currently holds ciphertext
    pub fn is_ciphertext(&self) -> bool {
        self.encryption
            .as_ref()
            .map(|info| info.enabled && info.ciphertext)
            .unwrap_or(false)
    }

    /// Serialize into the bytes handed to a backend
    pub fn to_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    /// Parse bytes read back from a backend
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }
}

/// A schema record and a data record published together
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bundle {
    pub schema_record: Record,
    pub data_record: Record,
    pub combined_scope: Scope,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
}

impl Bundle {
    pub fn new(schema_record: Record, data_record: Record, combined_scope: Scope) -> Self {
        Self {
            schema_record,
            data_record,
            combined_scope,
            timestamp: None,
        }
    }
}
