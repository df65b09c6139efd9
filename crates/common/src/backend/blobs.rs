use std::collections::HashMap;
use std::future::IntoFuture;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::anyhow;
use async_trait::async_trait;
use bytes::Bytes;
use iroh_blobs::{
    api::blobs::{BlobStatus, Blobs},
    store::{fs::FsStore, mem::MemStore},
    BlobsProtocol,
};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use super::{
    Address, BackendConfiguration, BackendError, BackendStatus, ContentBackend, NodeInfo, Pins,
    StorageStats,
};
use crate::crypto::SecretKey;
use crate::record::BackendClass;

const MEMORY_LOCATION: &str = "memory";
const LEDGER_FILE: &str = "ledger.json";

/// Pins and usage accounting of a filesystem store, kept beside it
#[derive(Debug, Default, Serialize, Deserialize)]
struct Ledger {
    objects: Vec<LedgerEntry>,
    pins: Vec<Address>,
}

#[derive(Debug, Serialize, Deserialize)]
struct LedgerEntry {
    address: Address,
    size: u64,
}

/// Construction options shared by every [`BlobsBackend`]
#[derive(Debug, Clone, Default)]
pub struct BackendOptions {
    /// Node identity, generated when not set
    pub identity: Option<SecretKey>,
    /// Byte quota over objects written through this handle
    pub max_size: Option<u64>,
    /// Addresses reported by `info`
    pub announce_addresses: Vec<String>,
}

/// Content backend over a local iroh-blobs store
///
/// Content addressing is iroh-blobs' BLAKE3 hashing. Pins and usage
///  accounting cover the objects written through this backend. A
///  filesystem store keeps them in a `ledger.json` beside its data and
///  restores them on load.
#[derive(Clone, Debug)]
pub struct BlobsBackend {
    inner: Arc<BlobsProtocol>,
    class: BackendClass,
    location: String,
    identity: SecretKey,
    pins: Pins,
    /// address -> size in bytes
    index: Arc<RwLock<HashMap<Address, u64>>>,
    max_size: Option<u64>,
    announce_addresses: Vec<String>,
    /// Where the ledger is written, `None` for memory stores
    ledger_path: Option<PathBuf>,
    /// Serializes ledger writes
    ledger_lock: Arc<tokio::sync::Mutex<()>>,
}

impl BlobsBackend {
    /// Load a filesystem backed store at `path`
    pub async fn fs(
        path: &Path,
        class: BackendClass,
        options: BackendOptions,
    ) -> Result<Self, BackendError> {
        tracing::debug!("BlobsBackend::fs called with path: {:?}", path);
        let store = FsStore::load(path).await?;
        let blobs = BlobsProtocol::new(&store, None);
        let backend = Self::build(
            blobs,
            class,
            path.display().to_string(),
            options,
            Some(path.join(LEDGER_FILE)),
        )?;
        backend.restore().await?;
        Ok(backend)
    }

    /// Create an in-memory store
    pub async fn memory(class: BackendClass, options: BackendOptions) -> Result<Self, BackendError> {
        let store = MemStore::new();
        let blobs = BlobsProtocol::new(&store, None);
        Self::build(blobs, class, MEMORY_LOCATION.to_string(), options, None)
    }

    fn build(
        blobs: BlobsProtocol,
        class: BackendClass,
        location: String,
        options: BackendOptions,
        ledger_path: Option<PathBuf>,
    ) -> Result<Self, BackendError> {
        let identity = match options.identity {
            Some(identity) => identity,
            None => SecretKey::generate().map_err(|e| anyhow!(e))?,
        };
        tracing::info!(
            class = %class,
            location = %location,
            node_id = %identity.public(),
            "content backend ready"
        );
        Ok(Self {
            inner: Arc::new(blobs),
            class,
            location,
            identity,
            pins: Pins::new(),
            index: Arc::new(RwLock::new(HashMap::new())),
            max_size: options.max_size,
            announce_addresses: options.announce_addresses,
            ledger_path,
            ledger_lock: Arc::new(tokio::sync::Mutex::new(())),
        })
    }

    /// Flush the ledger and shut the underlying store down
    pub async fn shutdown(&self) -> Result<(), BackendError> {
        self.persist().await?;
        self.inner
            .store()
            .shutdown()
            .await
            .map_err(|e| anyhow!("failed to shut down store: {}", e))?;
        Ok(())
    }

    /// Load the ledger written by an earlier backend over the same store
    ///
    /// Entries whose content is no longer complete in the store are dropped.
    async fn restore(&self) -> Result<(), BackendError> {
        let Some(path) = &self.ledger_path else {
            return Ok(());
        };
        let bytes = match tokio::fs::read(path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(e.into()),
        };
        let ledger: Ledger = serde_json::from_slice(&bytes)
            .map_err(|e| anyhow!("corrupt ledger {}: {}", path.display(), e))?;

        let mut index = HashMap::with_capacity(ledger.objects.len());
        for entry in ledger.objects {
            if self.has(&entry.address).await? {
                index.insert(entry.address, entry.size);
            } else {
                tracing::warn!(address = %entry.address, "ledger entry missing from store");
            }
        }
        for address in ledger.pins {
            if self.has(&address).await? {
                self.pins.insert(address);
            }
        }

        tracing::info!(
            class = %self.class,
            objects = index.len(),
            pinned = self.pins.len(),
            "restored ledger"
        );
        *self.index.write() = index;
        Ok(())
    }

    /// Write the current pins and index to the ledger file, if any
    async fn persist(&self) -> Result<(), BackendError> {
        let Some(path) = &self.ledger_path else {
            return Ok(());
        };
        let _guard = self.ledger_lock.lock().await;
        let ledger = Ledger {
            objects: self
                .index
                .read()
                .iter()
                .map(|(address, size)| LedgerEntry {
                    address: *address,
                    size: *size,
                })
                .collect(),
            pins: self.pins.to_vec(),
        };
        let bytes = serde_json::to_vec_pretty(&ledger).map_err(|e| anyhow!(e))?;

        // staged, then renamed into place
        let staging = path.with_extension("json.tmp");
        tokio::fs::write(&staging, bytes).await?;
        tokio::fs::rename(&staging, path).await?;
        Ok(())
    }

    /// Get a handle to the underlying blobs client against
    ///  the store
    pub fn blobs(&self) -> &Blobs {
        self.inner.store().blobs()
    }

    pub fn class(&self) -> BackendClass {
        self.class
    }

    fn used(index: &HashMap<Address, u64>) -> u64 {
        index.values().sum()
    }

    /// Account for `address` before the write so concurrent puts cannot
    ///  overshoot the quota. Returns whether a new entry was reserved.
    fn reserve(&self, address: Address, size: u64) -> Result<bool, BackendError> {
        let mut index = self.index.write();
        if index.contains_key(&address) {
            return Ok(false);
        }
        if let Some(max_size) = self.max_size {
            let used = Self::used(&index);
            if used + size > max_size {
                tracing::warn!(
                    class = %self.class,
                    requested = size,
                    used,
                    max_size,
                    "rejecting put over quota"
                );
                return Err(BackendError::CapacityExceeded {
                    requested: size,
                    used,
                    max_size,
                });
            }
        }
        index.insert(address, size);
        Ok(true)
    }

    /// Undo a reservation made by [`Self::reserve`]
    fn release(&self, address: &Address, reserved: bool) {
        if reserved {
            self.index.write().remove(address);
        }
    }

    /// Check what the store wrote against the address the bytes were
    ///  reserved under. The reservation is released on any failure.
    fn settle(
        &self,
        address: Address,
        reserved: bool,
        stored: Result<iroh_blobs::Hash, BackendError>,
    ) -> Result<Address, BackendError> {
        let hash = match stored {
            Ok(hash) => hash,
            Err(e) => {
                self.release(&address, reserved);
                return Err(e);
            }
        };
        if hash != address.hash() {
            self.release(&address, reserved);
            return Err(
                anyhow!("store returned {} for content addressed as {}", hash, address).into(),
            );
        }
        Ok(address)
    }
}

#[async_trait]
impl ContentBackend for BlobsBackend {
    async fn put(&self, data: Vec<u8>) -> Result<Address, BackendError> {
        let address = Address::for_bytes(&data);
        let size = data.len() as u64;
        let reserved = self.reserve(address, size)?;

        let stored = self
            .blobs()
            .add_bytes(data)
            .into_future()
            .await
            .map(|outcome| outcome.hash)
            .map_err(BackendError::from);
        let address = self.settle(address, reserved, stored)?;
        if reserved {
            self.persist().await?;
        }

        tracing::debug!(class = %self.class, address = %address, size, "stored object");
        Ok(address)
    }

    async fn get(&self, address: &Address) -> Result<Option<Bytes>, BackendError> {
        if !self.has(address).await? {
            return Ok(None);
        }
        let bytes = self.blobs().get_bytes(address.hash()).await?;
        Ok(Some(bytes))
    }

    async fn has(&self, address: &Address) -> Result<bool, BackendError> {
        let stat = self
            .blobs()
            .status(address.hash())
            .await
            .map_err(|err| BackendError::Default(anyhow!(err)))?;
        Ok(matches!(stat, BlobStatus::Complete { .. }))
    }

    async fn pin(&self, address: &Address) -> Result<(), BackendError> {
        if !self.has(address).await? {
            return Err(BackendError::NotFound(*address));
        }
        if self.pins.insert(*address) {
            tracing::debug!(class = %self.class, address = %address, "pinned");
            self.persist().await?;
        }
        Ok(())
    }

    async fn unpin(&self, address: &Address) -> Result<(), BackendError> {
        if !self.has(address).await? {
            return Err(BackendError::NotFound(*address));
        }
        if self.pins.remove(address) {
            tracing::debug!(class = %self.class, address = %address, "unpinned");
            self.persist().await?;
        }
        Ok(())
    }

    async fn list_pinned(&self) -> Result<Vec<Address>, BackendError> {
        Ok(self.pins.to_vec())
    }

    async fn is_pinned(&self, address: &Address) -> Result<bool, BackendError> {
        Ok(self.pins.contains(address))
    }

    async fn status(&self) -> Result<BackendStatus, BackendError> {
        Ok(BackendStatus {
            class: self.class,
            online: true,
            object_count: self.index.read().len() as u64,
            pinned_count: self.pins.len() as u64,
        })
    }

    async fn stats(&self) -> Result<StorageStats, BackendError> {
        let index = self.index.read();
        Ok(StorageStats {
            size: Self::used(&index),
            object_count: index.len() as u64,
            max_size: self.max_size,
        })
    }

    async fn info(&self) -> Result<NodeInfo, BackendError> {
        Ok(NodeInfo {
            node_id: self.identity.public().to_hex(),
            addresses: self.announce_addresses.clone(),
        })
    }

    async fn configuration(&self) -> Result<BackendConfiguration, BackendError> {
        Ok(BackendConfiguration {
            class: self.class,
            location: self.location.clone(),
            max_size: self.max_size,
            announce_addresses: self.announce_addresses.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn setup_test_backend() -> (BlobsBackend, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let blob_path = temp_dir.path().join("blobs");
        let backend = BlobsBackend::fs(&blob_path, BackendClass::Local, BackendOptions::default())
            .await
            .unwrap();
        (backend, temp_dir)
    }

    #[tokio::test]
    async fn test_put_and_get() {
        let (backend, _temp) = setup_test_backend().await;

        let data = b"Hello, BlobsBackend!";
        let address = backend.put(data.to_vec()).await.unwrap();
        assert_eq!(address, Address::for_bytes(data));

        let retrieved = backend.get(&address).await.unwrap().unwrap();
        assert_eq!(retrieved.as_ref(), data);
    }

    #[tokio::test]
    async fn test_identical_bytes_same_address() {
        let backend = BlobsBackend::memory(BackendClass::Local, BackendOptions::default())
            .await
            .unwrap();

        let a = backend.put(b"same".to_vec()).await.unwrap();
        let b = backend.put(b"same".to_vec()).await.unwrap();
        let c = backend.put(b"different".to_vec()).await.unwrap();

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(backend.stats().await.unwrap().object_count, 2);
    }

    #[tokio::test]
    async fn test_get_missing_is_none() {
        let (backend, _temp) = setup_test_backend().await;
        let missing = Address::for_bytes(b"never stored");
        assert!(backend.get(&missing).await.unwrap().is_none());
        assert!(!backend.has(&missing).await.unwrap());
    }

    #[tokio::test]
    async fn test_pin_semantics() {
        let backend = BlobsBackend::memory(BackendClass::Local, BackendOptions::default())
            .await
            .unwrap();
        let address = backend.put(b"keep me".to_vec()).await.unwrap();

        backend.pin(&address).await.unwrap();
        backend.pin(&address).await.unwrap();
        assert_eq!(backend.list_pinned().await.unwrap(), vec![address]);
        assert!(backend.is_pinned(&address).await.unwrap());

        backend.unpin(&address).await.unwrap();
        backend.unpin(&address).await.unwrap();
        assert!(backend.list_pinned().await.unwrap().is_empty());

        let missing = Address::for_bytes(b"nothing");
        assert!(matches!(
            backend.pin(&missing).await,
            Err(BackendError::NotFound(_))
        ));
        assert!(matches!(
            backend.unpin(&missing).await,
            Err(BackendError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_quota() {
        let options = BackendOptions {
            max_size: Some(10),
            ..Default::default()
        };
        let backend = BlobsBackend::memory(BackendClass::Public, options).await.unwrap();

        let address = backend.put(b"12345678".to_vec()).await.unwrap();
        // re-putting existing content does not count twice
        assert_eq!(backend.put(b"12345678".to_vec()).await.unwrap(), address);

        let result = backend.put(b"abc".to_vec()).await;
        assert!(matches!(
            result,
            Err(BackendError::CapacityExceeded {
                requested: 3,
                used: 8,
                max_size: 10
            })
        ));

        let stats = backend.stats().await.unwrap();
        assert_eq!(stats.size, 8);
        assert_eq!(stats.object_count, 1);
        assert_eq!(stats.max_size, Some(10));
    }

    #[tokio::test]
    async fn test_mismatched_write_releases_reservation() {
        let options = BackendOptions {
            max_size: Some(16),
            ..Default::default()
        };
        let backend = BlobsBackend::memory(BackendClass::Local, options).await.unwrap();
        let address = Address::for_bytes(b"twelve bytes");

        assert!(backend.reserve(address, 12).unwrap());
        let other = Address::for_bytes(b"something else").hash();
        assert!(backend.settle(address, true, Ok(other)).is_err());

        let stats = backend.stats().await.unwrap();
        assert_eq!(stats.object_count, 0);
        assert_eq!(stats.size, 0);
        // the freed quota is usable again
        backend.put(b"twelve bytes".to_vec()).await.unwrap();
    }

    #[tokio::test]
    async fn test_fs_reopen_restores_pins_and_usage() {
        let temp_dir = TempDir::new().unwrap();
        let blob_path = temp_dir.path().join("blobs");

        let backend = BlobsBackend::fs(&blob_path, BackendClass::Local, BackendOptions::default())
            .await
            .unwrap();
        let kept = backend.put(b"kept".to_vec()).await.unwrap();
        let loose = backend.put(b"loose".to_vec()).await.unwrap();
        backend.pin(&kept).await.unwrap();
        backend.shutdown().await.unwrap();
        drop(backend);

        let reopened =
            BlobsBackend::fs(&blob_path, BackendClass::Local, BackendOptions::default())
                .await
                .unwrap();
        assert_eq!(reopened.list_pinned().await.unwrap(), vec![kept]);
        assert!(!reopened.is_pinned(&loose).await.unwrap());

        let stats = reopened.stats().await.unwrap();
        assert_eq!(stats.object_count, 2);
        assert_eq!(stats.size, 9);
        assert_eq!(
            reopened.get(&loose).await.unwrap().unwrap().as_ref(),
            b"loose"
        );
    }

    #[tokio::test]
    async fn test_info_and_configuration() {
        let identity = SecretKey::generate().unwrap();
        let options = BackendOptions {
            identity: Some(identity.clone()),
            max_size: None,
            announce_addresses: vec!["127.0.0.1:4001".to_string()],
        };
        let backend = BlobsBackend::memory(BackendClass::Public, options).await.unwrap();

        let info = backend.info().await.unwrap();
        assert_eq!(info.node_id, identity.public().to_hex());
        assert_eq!(info.addresses, vec!["127.0.0.1:4001".to_string()]);

        let config = backend.configuration().await.unwrap();
        assert_eq!(config.class, BackendClass::Public);
        assert_eq!(config.location, "memory");

        let status = backend.status().await.unwrap();
        assert!(status.online);
        assert_eq!(status.object_count, 0);
    }
}
