use serde::{Deserialize, Serialize};

use crate::backend::{Address, BackendError};
use crate::crypto::CryptoError;
use crate::hooks::HookError;
use crate::record::{BackendClass, InvalidScope};

#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error(transparent)]
    InvalidScope(#[from] InvalidScope),
    #[error("no {0} backend configured")]
    BackendNotConfigured(BackendClass),
    #[error("content not found: {0}")]
    ContentNotFound(Address),
    #[error("schema validation error: {0}")]
    SchemaValidation(String),
    #[error(transparent)]
    Crypto(#[from] CryptoError),
    #[error(transparent)]
    Backend(#[from] BackendError),
    #[error(transparent)]
    Hook(#[from] HookError),
    #[error("tool {name} failed: {source}")]
    Tool {
        name: String,
        #[source]
        source: anyhow::Error,
    },
    #[error("protocol error: {0}")]
    Default(#[from] anyhow::Error),
}

/// `{ "error": message }` body returned across the facade boundary
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

impl ProtocolError {
    pub fn to_error_body(&self) -> ErrorBody {
        ErrorBody {
            error: self.to_string(),
        }
    }
}
