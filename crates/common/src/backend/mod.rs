//! Content-addressed storage behind the record protocol.
//!
//! [`ContentBackend`] is the collaborator boundary: identical bytes map to an
//! identical [`Address`], and content is durable once `put` returns.
//! [`BlobsBackend`] implements it over an iroh-blobs store.

mod blobs;
mod pins;

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DisplayFromStr};

use crate::record::BackendClass;

pub use blobs::{BackendOptions, BlobsBackend};
pub use pins::Pins;

/// BLAKE3 content address of a stored object
#[serde_as]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Address(#[serde_as(as = "DisplayFromStr")] iroh_blobs::Hash);

impl Address {
    /// Address the given bytes would be stored under
    pub fn for_bytes(data: impl AsRef<[u8]>) -> Self {
        Self(iroh_blobs::Hash::new(data))
    }

    pub fn hash(&self) -> iroh_blobs::Hash {
        self.0
    }
}

impl From<iroh_blobs::Hash> for Address {
    fn from(hash: iroh_blobs::Hash) -> Self {
        Self(hash)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Address {
    type Err = BackendError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse::<iroh_blobs::Hash>()
            .map(Self)
            .map_err(|e| BackendError::InvalidAddress(format!("{}: {}", s, e)))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("content not found: {0}")]
    NotFound(Address),
    #[error("invalid address {0}")]
    InvalidAddress(String),
    #[error("storing {requested} bytes would exceed the {max_size} byte quota ({used} used)")]
    CapacityExceeded {
        requested: u64,
        used: u64,
        max_size: u64,
    },
    #[error("backend i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("export bao error: {0}")]
    ExportBao(#[from] iroh_blobs::api::ExportBaoError),
    #[error("request error: {0}")]
    Request(#[from] iroh_blobs::api::RequestError),
    #[error("backend error: {0}")]
    Default(#[from] anyhow::Error),
}

/// Identity of the node behind a backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeInfo {
    pub node_id: String,
    pub addresses: Vec<String>,
}

/// Storage usage of a backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageStats {
    /// Bytes held
    pub size: u64,
    pub object_count: u64,
    /// Byte quota, if any
    pub max_size: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackendStatus {
    pub class: BackendClass,
    pub online: bool,
    pub object_count: u64,
    pub pinned_count: u64,
}

/// Static configuration a backend was built with
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackendConfiguration {
    pub class: BackendClass,
    /// `memory` or the on-disk store path
    pub location: String,
    pub max_size: Option<u64>,
    pub announce_addresses: Vec<String>,
}

/// Content-addressed put/get/pin store
#[async_trait]
pub trait ContentBackend: Send + Sync + fmt::Debug + 'static {
    /// Store bytes, returning their address
    async fn put(&self, data: Vec<u8>) -> Result<Address, BackendError>;

    /// Read bytes back. `Ok(None)` if the address holds nothing.
    async fn get(&self, address: &Address) -> Result<Option<Bytes>, BackendError>;

    async fn has(&self, address: &Address) -> Result<bool, BackendError>;

    /// Mark content as retained. Idempotent; fails with `NotFound` for
    ///  content the backend does not hold.
    async fn pin(&self, address: &Address) -> Result<(), BackendError>;

    /// Remove the retention mark. Idempotent; fails with `NotFound` for
    ///  content the backend does not hold.
    async fn unpin(&self, address: &Address) -> Result<(), BackendError>;

    async fn list_pinned(&self) -> Result<Vec<Address>, BackendError>;

    async fn is_pinned(&self, address: &Address) -> Result<bool, BackendError> {
        Ok(self.list_pinned().await?.contains(address))
    }

    async fn status(&self) -> Result<BackendStatus, BackendError>;

    async fn stats(&self) -> Result<StorageStats, BackendError>;

    async fn info(&self) -> Result<NodeInfo, BackendError>;

    async fn configuration(&self) -> Result<BackendConfiguration, BackendError>;
}
