//! Shared test utilities for protocol integration tests
#![allow(dead_code)]

use common::prelude::*;
use tempfile::TempDir;

/// A protocol with in-memory local and public backends
pub async fn setup_protocol() -> RecordProtocol {
    let local = BlobsBackend::memory(BackendClass::Local, BackendOptions::default())
        .await
        .unwrap();
    let public = BlobsBackend::memory(BackendClass::Public, BackendOptions::default())
        .await
        .unwrap();
    RecordProtocol::new(
        ScopeRouter::new().with_local(local).with_public(public),
        EncryptionEngine::new(KeyStore::new()),
    )
}

/// A protocol with only a local backend configured
pub async fn setup_local_only() -> RecordProtocol {
    let local = BlobsBackend::memory(BackendClass::Local, BackendOptions::default())
        .await
        .unwrap();
    RecordProtocol::new(
        ScopeRouter::new().with_local(local),
        EncryptionEngine::new(KeyStore::new()),
    )
}

/// A local-only protocol whose backend holds at most `max_size` bytes
pub async fn setup_with_quota(max_size: u64) -> RecordProtocol {
    let options = BackendOptions {
        max_size: Some(max_size),
        ..Default::default()
    };
    let local = BlobsBackend::memory(BackendClass::Local, options)
        .await
        .unwrap();
    RecordProtocol::new(
        ScopeRouter::new().with_local(local),
        EncryptionEngine::new(KeyStore::new()),
    )
}

/// A protocol whose local backend lives on disk
pub async fn setup_fs_protocol() -> (RecordProtocol, TempDir) {
    let temp_dir = TempDir::new().unwrap();
    let local = BlobsBackend::fs(
        &temp_dir.path().join("blobs"),
        BackendClass::Local,
        BackendOptions::default(),
    )
    .await
    .unwrap();
    let protocol = RecordProtocol::new(
        ScopeRouter::new().with_local(local),
        EncryptionEngine::new(KeyStore::new()),
    );
    (protocol, temp_dir)
}
