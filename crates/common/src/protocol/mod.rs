//! The record envelope protocol.
//!
//! [`RecordProtocol`] ties the pieces together: it validates records,
//! transparently encrypts and decrypts their content, routes them by scope
//! to a content backend, and handles pinning and replication.
//!
//! # Record lifecycle
//!
//! ```text
//! Draft (no address) --publish--> Stored --pin/unpin--> Stored{Pinned,Unpinned}
//!                                   |
//!                                   +--replicate--> new independent Record
//! ```
//!
//! `publish_record`/`fetch_record` are the low-level primitives and run no
//! hooks. The hook-bearing convenience path is `store_data` (see
//! [`store`](self::store)).

mod error;
mod store;

use std::sync::Arc;

use serde_json::Value;

use crate::backend::{
    Address, BackendConfiguration, BackendError, BackendStatus, ContentBackend, NodeInfo,
    StorageStats,
};
use crate::crypto::{EncryptionEngine, EncryptionMethod, ExportedKey};
use crate::hooks::{HookError, HookHandler, HookPipeline, HookTrigger};
use crate::record::{Bundle, Content, ContentType, Record, Scope};
use crate::router::ScopeRouter;
use crate::schema::SchemaGenerator;

pub use error::{ErrorBody, ProtocolError};
pub use store::{StoreOptions, StoreReceipt, Tool, ToolDescriptor, ToolEnvelope, WrappedTool};

/// Behaviour switches fixed at construction
#[derive(Debug, Clone, Copy, Default)]
pub struct ProtocolOptions {
    /// Derive keys and nonces from the key reference and plaintext so
    ///  ciphertexts are reproducible. Fixtures only.
    pub deterministic_encryption: bool,
}

/// Orchestrator over routing, encryption, hooks and backends
///
/// Cheap to clone; clones share the key cache and the hook list.
#[derive(Debug, Clone)]
pub struct RecordProtocol {
    inner: Arc<RecordProtocolInner>,
}

#[derive(Debug)]
struct RecordProtocolInner {
    router: ScopeRouter,
    engine: EncryptionEngine,
    hooks: HookPipeline,
    schema: SchemaGenerator,
    options: ProtocolOptions,
}

impl RecordProtocol {
    pub fn new(router: ScopeRouter, engine: EncryptionEngine) -> Self {
        Self::with_options(router, engine, ProtocolOptions::default())
    }

    pub fn with_options(
        router: ScopeRouter,
        engine: EncryptionEngine,
        options: ProtocolOptions,
    ) -> Self {
        if options.deterministic_encryption {
            tracing::warn!("deterministic encryption enabled; ciphertexts are reproducible");
        }
        Self {
            inner: Arc::new(RecordProtocolInner {
                router,
                engine,
                hooks: HookPipeline::new(),
                schema: SchemaGenerator::new(),
                options,
            }),
        }
    }

    pub fn router(&self) -> &ScopeRouter {
        &self.inner.router
    }

    pub fn engine(&self) -> &EncryptionEngine {
        &self.inner.engine
    }

    pub fn hooks(&self) -> &HookPipeline {
        &self.inner.hooks
    }

    pub fn schema_generator(&self) -> &SchemaGenerator {
        &self.inner.schema
    }

    pub fn options(&self) -> ProtocolOptions {
        self.inner.options
    }

    fn backend(&self, scope: Scope) -> Result<&Arc<dyn ContentBackend>, ProtocolError> {
        self.inner.router.resolve(scope)
    }

    fn deterministic(&self) -> bool {
        self.inner.options.deterministic_encryption
    }

    /// Check a record before anything is written
    fn validate(record: &Record) -> Result<(), ProtocolError> {
        if record.content.is_null() {
            return Err(ProtocolError::SchemaValidation(
                "record content is required".to_string(),
            ));
        }
        if let Some(info) = &record.encryption {
            if info.enabled {
                info.method().parse::<EncryptionMethod>()?;
            }
            if info.ciphertext {
                if !info.enabled {
                    return Err(ProtocolError::SchemaValidation(
                        "ciphertext flag set on a record with encryption disabled".to_string(),
                    ));
                }
                if record.content.as_text().is_none() {
                    return Err(ProtocolError::SchemaValidation(
                        "ciphertext content must be a string".to_string(),
                    ));
                }
                if info.content_type.is_none() {
                    return Err(ProtocolError::SchemaValidation(
                        "ciphertext record is missing its content type".to_string(),
                    ));
                }
            }
        }
        Ok(())
    }

    /// Encrypt plaintext content in place when the envelope asks for it
    fn seal(&self, record: &mut Record) -> Result<(), ProtocolError> {
        let content_type = record.content.content_type();
        let Some(info) = record.encryption.as_mut() else {
            return Ok(());
        };
        if !info.enabled || info.ciphertext {
            if info.content_type.is_none() {
                info.content_type = Some(content_type);
            }
            return Ok(());
        }

        let plaintext = record
            .content
            .to_text()
            .map_err(|e| ProtocolError::SchemaValidation(e.to_string()))?;
        let method = info.method().to_string();
        let key_ref = info.key_ref().to_string();
        let ciphertext =
            self.inner
                .engine
                .encrypt(&plaintext, &method, &key_ref, self.deterministic())?;

        record.content = Content::Text(ciphertext);
        info.method = Some(method);
        info.key_ref = Some(key_ref);
        info.content_type = Some(content_type);
        info.ciphertext = true;
        Ok(())
    }

    /// Decrypt ciphertext content in place, restoring its original shape
    fn open(&self, record: &mut Record) -> Result<(), ProtocolError> {
        let Some(info) = record.encryption.as_mut() else {
            Self::parse_untyped(&mut record.content);
            return Ok(());
        };

        if info.enabled && info.ciphertext {
            let ciphertext = record.content.as_text().ok_or_else(|| {
                ProtocolError::SchemaValidation("ciphertext content must be a string".to_string())
            })?;
            let plaintext = self.inner.engine.decrypt(
                ciphertext,
                info.method(),
                info.key_ref(),
                self.deterministic(),
            )?;
            let content_type = info.content_type.unwrap_or(ContentType::String);
            record.content = Content::from_text(plaintext, content_type).map_err(|e| {
                ProtocolError::SchemaValidation(format!("decrypted payload is corrupt: {}", e))
            })?;
            info.ciphertext = false;
        } else if info.content_type.is_none() {
            Self::parse_untyped(&mut record.content);
        }
        Ok(())
    }

    /// Best-effort parse of string content that carries no content type
    fn parse_untyped(content: &mut Content) {
        let Content::Text(text) = content else {
            return;
        };
        match serde_json::from_str::<Value>(text) {
            Ok(value) => *content = Content::from(value),
            Err(_) => tracing::debug!("untyped string content is not JSON, keeping as text"),
        }
    }

    /// Persist a record, encrypting its content first if requested
    ///
    /// Returns the record as persisted, with `address` populated.
    pub async fn publish_record(&self, mut record: Record) -> Result<Record, ProtocolError> {
        Self::validate(&record)?;
        let backend = self.backend(record.scope)?;

        self.seal(&mut record)?;
        let bytes = record
            .to_bytes()
            .map_err(|e| ProtocolError::SchemaValidation(e.to_string()))?;

        let address = backend.put(bytes).await?;
        if record.pinned {
            backend.pin(&address).await?;
        }

        tracing::info!(
            address = %address,
            scope = %record.scope,
            encrypted = record.is_ciphertext(),
            pinned = record.pinned,
            "published record"
        );
        record.address = Some(address);
        Ok(record)
    }

    /// Read a record back, decrypting its content if it was stored encrypted
    ///
    /// Returns `Ok(None)` when the scope's backend holds nothing at
    ///  `address`, or holds a record published under a different scope.
    pub async fn fetch_record(
        &self,
        address: &Address,
        scope: Scope,
    ) -> Result<Option<Record>, ProtocolError> {
        let backend = self.backend(scope)?;
        let Some(bytes) = backend.get(address).await? else {
            tracing::debug!(address = %address, scope = %scope, "record not found");
            return Ok(None);
        };

        let mut record = Record::from_bytes(&bytes)
            .map_err(|e| ProtocolError::SchemaValidation(format!("stored record: {}", e)))?;
        if record.scope != scope {
            tracing::debug!(
                address = %address,
                requested = %scope,
                stored = %record.scope,
                "record belongs to another scope"
            );
            return Ok(None);
        }

        self.open(&mut record)?;
        record.address = Some(*address);
        record.pinned = backend.is_pinned(address).await?;
        Ok(Some(record))
    }

    /// Check a record can be published: valid envelope and a configured
    ///  backend for its scope. Writes nothing.
    pub(crate) fn preflight(&self, record: &Record) -> Result<(), ProtocolError> {
        Self::validate(record)?;
        self.backend(record.scope)?;
        Ok(())
    }

    /// Publish the schema record, then the data record
    ///
    /// Both records are checked before either is written. Not atomic past
    ///  that point: if storing the data record fails the schema record
    ///  stays stored.
    pub async fn publish_bundle(&self, bundle: &Bundle) -> Result<Bundle, ProtocolError> {
        self.preflight(&bundle.schema_record)?;
        self.preflight(&bundle.data_record)?;

        let mut bundle = bundle.clone();
        bundle.schema_record = self.publish_record(bundle.schema_record).await?;
        bundle.data_record = self.publish_record(bundle.data_record).await?;
        bundle.timestamp = Some(chrono::Utc::now().to_rfc3339());
        Ok(bundle)
    }

    /// Fail with `NotFound` unless `address` holds a record of `scope`
    ///
    /// A record stored under another scope of the same backend is treated
    ///  as absent, matching `fetch_record`.
    async fn ensure_in_scope(
        backend: &Arc<dyn ContentBackend>,
        address: &Address,
        scope: Scope,
    ) -> Result<(), ProtocolError> {
        let not_found = || ProtocolError::Backend(BackendError::NotFound(*address));
        let bytes = backend.get(address).await?.ok_or_else(not_found)?;
        let stored = Record::from_bytes(&bytes)
            .map_err(|e| ProtocolError::SchemaValidation(format!("stored record: {}", e)))?;
        if stored.scope != scope {
            tracing::debug!(
                address = %address,
                requested = %scope,
                stored = %stored.scope,
                "record belongs to another scope"
            );
            return Err(not_found());
        }
        Ok(())
    }

    /// Pin a record in the scope's backend. Idempotent.
    pub async fn pin(&self, address: &Address, scope: Scope) -> Result<(), ProtocolError> {
        let backend = self.backend(scope)?;
        Self::ensure_in_scope(backend, address, scope).await?;
        backend.pin(address).await?;
        tracing::info!(address = %address, scope = %scope, "pinned");
        Ok(())
    }

    /// Unpin a record in the scope's backend. Idempotent.
    pub async fn unpin(&self, address: &Address, scope: Scope) -> Result<(), ProtocolError> {
        let backend = self.backend(scope)?;
        Self::ensure_in_scope(backend, address, scope).await?;
        backend.unpin(address).await?;
        tracing::info!(address = %address, scope = %scope, "unpinned");
        Ok(())
    }

    /// Copy a record into another scope
    ///
    /// The scope is part of the stored bytes, so the replica's address
    ///  differs from the source address. The replica is pinned iff the
    ///  source was.
    pub async fn replicate(
        &self,
        address: &Address,
        from: Scope,
        to: Scope,
    ) -> Result<Record, ProtocolError> {
        let mut record = self
            .fetch_record(address, from)
            .await?
            .ok_or(ProtocolError::ContentNotFound(*address))?;

        record.address = None;
        record.scope = to;
        let replica = self.publish_record(record).await?;

        tracing::info!(
            source = %address,
            from = %from,
            to = %to,
            replica = ?replica.address,
            "replicated record"
        );
        Ok(replica)
    }

    pub async fn get_status(&self, scope: Scope) -> Result<BackendStatus, ProtocolError> {
        Ok(self.backend(scope)?.status().await?)
    }

    pub async fn get_node_info(&self, scope: Scope) -> Result<NodeInfo, ProtocolError> {
        Ok(self.backend(scope)?.info().await?)
    }

    pub async fn get_storage_metrics(&self, scope: Scope) -> Result<StorageStats, ProtocolError> {
        Ok(self.backend(scope)?.stats().await?)
    }

    pub async fn get_pinned_cids(&self, scope: Scope) -> Result<Vec<Address>, ProtocolError> {
        Ok(self.backend(scope)?.list_pinned().await?)
    }

    pub async fn get_configuration(
        &self,
        scope: Scope,
    ) -> Result<BackendConfiguration, ProtocolError> {
        Ok(self.backend(scope)?.configuration().await?)
    }

    pub fn add_hook(
        &self,
        name: impl Into<String>,
        trigger: HookTrigger,
        handler: impl HookHandler,
    ) -> Result<(), HookError> {
        self.inner.hooks.add_hook(name, trigger, handler)
    }

    pub fn remove_hook(&self, name: &str) -> bool {
        self.inner.hooks.remove_hook(name)
    }

    pub fn export_key(
        &self,
        key_ref: &str,
        method: &str,
    ) -> Result<ExportedKey, ProtocolError> {
        let method = method.parse::<EncryptionMethod>()?;
        Ok(self.inner.engine.key_store().export_key(key_ref, method)?)
    }

    pub fn import_key(
        &self,
        material: &ExportedKey,
        method: &str,
        key_ref: &str,
    ) -> Result<(), ProtocolError> {
        let method = method.parse::<EncryptionMethod>()?;
        Ok(self
            .inner
            .engine
            .key_store()
            .import_key(material, method, key_ref)?)
    }
}
