//! Integration tests for publishing and fetching records

mod common;

use ::common::backend::BackendError;
use ::common::crypto::CryptoError;
use ::common::prelude::*;
use ::common::record::ContentType;
use serde_json::{json, Value};

#[tokio::test]
async fn test_plaintext_round_trip() {
    let protocol = common::setup_protocol().await;
    let record = Record::data(Scope::Private, json!({"msg": "hi"}))
        .with_encryption(EncryptionInfo::disabled());

    let published = protocol.publish_record(record).await.unwrap();
    let address = published.address.unwrap();

    let fetched = protocol
        .fetch_record(&address, Scope::Private)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(fetched.content, Content::Json(json!({"msg": "hi"})));
    assert_eq!(fetched.address, Some(address));
}

#[tokio::test]
async fn test_encrypted_round_trip() {
    let protocol = common::setup_protocol().await;
    let record = Record::data(Scope::Private, json!({"secret": "x"}))
        .with_encryption(EncryptionInfo::aes_gcm("k1"));

    let published = protocol.publish_record(record).await.unwrap();
    let persisted = published.content.as_text().unwrap();
    assert_ne!(persisted, json!({"secret": "x"}).to_string());
    let info = published.encryption.clone().unwrap();
    assert!(info.ciphertext);
    assert_eq!(info.content_type, Some(ContentType::Json));

    let fetched = protocol
        .fetch_record(&published.address.unwrap(), Scope::Private)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(fetched.content, Content::Json(json!({"secret": "x"})));
    assert!(!fetched.encryption.unwrap().ciphertext);
}

#[tokio::test]
async fn test_encrypted_string_stays_string() {
    let protocol = common::setup_protocol().await;
    let record = Record::data(Scope::Machine, "{\"looks\":\"like json\"}")
        .with_encryption(EncryptionInfo::aes_gcm("k1"));

    let published = protocol.publish_record(record).await.unwrap();
    let fetched = protocol
        .fetch_record(&published.address.unwrap(), Scope::Machine)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(
        fetched.content,
        Content::Text("{\"looks\":\"like json\"}".into())
    );
}

#[tokio::test]
async fn test_hello_scenario() {
    let protocol = common::setup_protocol().await;
    let record =
        Record::data(Scope::Private, "hello").with_encryption(EncryptionInfo::disabled());

    let published = protocol.publish_record(record).await.unwrap();
    let address = published.address.unwrap();

    let fetched = protocol
        .fetch_record(&address, Scope::Private)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(fetched.content, Content::Text("hello".into()));
    assert!(!fetched.pinned);

    let pinned = protocol.get_pinned_cids(Scope::Private).await.unwrap();
    assert!(!pinned.contains(&address));
}

#[tokio::test]
async fn test_publish_with_pin() {
    let protocol = common::setup_protocol().await;
    let record = Record::data(Scope::Private, "keep me").pinned(true);

    let published = protocol.publish_record(record).await.unwrap();
    let address = published.address.unwrap();

    assert!(protocol
        .get_pinned_cids(Scope::Private)
        .await
        .unwrap()
        .contains(&address));
    let fetched = protocol
        .fetch_record(&address, Scope::Private)
        .await
        .unwrap()
        .unwrap();
    assert!(fetched.pinned);
}

#[tokio::test]
async fn test_identical_records_share_an_address() {
    let protocol = common::setup_protocol().await;
    let a = protocol
        .publish_record(Record::data(Scope::Private, json!({"n": 1})))
        .await
        .unwrap();
    let b = protocol
        .publish_record(Record::data(Scope::Private, json!({"n": 1})))
        .await
        .unwrap();
    assert_eq!(a.address, b.address);
}

#[tokio::test]
async fn test_fetch_missing_returns_none() {
    let protocol = common::setup_protocol().await;
    let address = Address::for_bytes(b"never stored");

    assert!(protocol
        .fetch_record(&address, Scope::Private)
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn test_wrong_key_fails() {
    let protocol = common::setup_protocol().await;
    let published = protocol
        .publish_record(
            Record::data(Scope::Private, "secret").with_encryption(EncryptionInfo::aes_gcm("k1")),
        )
        .await
        .unwrap();

    // same ciphertext, relabelled to a different key
    let mut relabelled = published.clone();
    relabelled.address = None;
    relabelled.encryption = Some(EncryptionInfo {
        ciphertext: true,
        content_type: Some(ContentType::String),
        ..EncryptionInfo::aes_gcm("k2")
    });
    let relabelled = protocol.publish_record(relabelled).await.unwrap();

    let result = protocol
        .fetch_record(&relabelled.address.unwrap(), Scope::Private)
        .await;
    assert!(matches!(
        result,
        Err(ProtocolError::Crypto(CryptoError::DecryptionFailure))
    ));
}

#[tokio::test]
async fn test_ciphertext_without_content_type_rejected() {
    let protocol = common::setup_protocol().await;
    let record = Record::data(Scope::Private, "AAAA").with_encryption(EncryptionInfo {
        ciphertext: true,
        ..EncryptionInfo::aes_gcm("k1")
    });

    let result = protocol.publish_record(record).await;
    assert!(matches!(result, Err(ProtocolError::SchemaValidation(_))));
    let stats = protocol.get_storage_metrics(Scope::Private).await.unwrap();
    assert_eq!(stats.object_count, 0);
}

#[tokio::test]
async fn test_scope_rejection() {
    let protocol = common::setup_local_only().await;

    assert!(matches!(
        protocol.router().resolve_name("bogus"),
        Err(ProtocolError::InvalidScope(_))
    ));
    assert!(matches!(
        protocol.router().resolve_name("public"),
        Err(ProtocolError::BackendNotConfigured(BackendClass::Public))
    ));

    let result = protocol
        .publish_record(Record::data(Scope::Public, "x"))
        .await;
    assert!(matches!(
        result,
        Err(ProtocolError::BackendNotConfigured(BackendClass::Public))
    ));
}

#[tokio::test]
async fn test_access_policy_survives_round_trip() {
    let protocol = common::setup_protocol().await;
    let policy = AccessPolicy {
        hidden_from_llm: true,
        allowed_tools: vec!["search".into()],
        allowed_users: vec!["ada".into()],
    };
    let published = protocol
        .publish_record(Record::data(Scope::User, "x").with_access_policy(policy.clone()))
        .await
        .unwrap();

    let fetched = protocol
        .fetch_record(&published.address.unwrap(), Scope::User)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(fetched.access_policy, Some(policy));
}

#[tokio::test]
async fn test_bundle_publishes_both_records() {
    let protocol = common::setup_protocol().await;
    let bundle = Bundle::new(
        Record::schema(Scope::Private, json!({"type": "string"})),
        Record::data(Scope::Private, "payload"),
        Scope::Private,
    );

    let published = protocol.publish_bundle(&bundle).await.unwrap();
    assert!(published.timestamp.is_some());
    assert!(bundle.schema_record.address.is_none());

    let schema = protocol
        .fetch_record(&published.schema_record.address.unwrap(), Scope::Private)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(schema.kind, Kind::Schema);
    let data = protocol
        .fetch_record(&published.data_record.address.unwrap(), Scope::Private)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(data.content, Content::Text("payload".into()));
}

#[tokio::test]
async fn test_bundle_checks_both_records_before_writing() {
    let protocol = common::setup_local_only().await;

    let null_data = Bundle::new(
        Record::schema(Scope::Private, json!({"type": "null"})),
        Record::data(Scope::Private, Value::Null),
        Scope::Private,
    );
    assert!(matches!(
        protocol.publish_bundle(&null_data).await,
        Err(ProtocolError::SchemaValidation(_))
    ));

    let unroutable_data = Bundle::new(
        Record::schema(Scope::Private, json!({"type": "string"})),
        Record::data(Scope::Public, "payload"),
        Scope::Private,
    );
    assert!(matches!(
        protocol.publish_bundle(&unroutable_data).await,
        Err(ProtocolError::BackendNotConfigured(BackendClass::Public))
    ));

    let stats = protocol.get_storage_metrics(Scope::Private).await.unwrap();
    assert_eq!(stats.object_count, 0);
}

#[tokio::test]
async fn test_bundle_is_not_atomic_past_validation() {
    let protocol = common::setup_with_quota(256).await;
    let bundle = Bundle::new(
        Record::schema(Scope::Private, json!({"type": "string"})),
        Record::data(Scope::Private, "x".repeat(512)),
        Scope::Private,
    );

    assert!(matches!(
        protocol.publish_bundle(&bundle).await,
        Err(ProtocolError::Backend(BackendError::CapacityExceeded { .. }))
    ));
    let stats = protocol.get_storage_metrics(Scope::Private).await.unwrap();
    assert_eq!(stats.object_count, 1);
}

#[tokio::test]
async fn test_fs_backend_round_trip() {
    let (protocol, _temp) = common::setup_fs_protocol().await;
    let published = protocol
        .publish_record(
            Record::data(Scope::Private, json!([1, 2, 3]))
                .with_encryption(EncryptionInfo::aes_gcm("disk")),
        )
        .await
        .unwrap();

    let fetched = protocol
        .fetch_record(&published.address.unwrap(), Scope::Private)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(fetched.content, Content::Json(json!([1, 2, 3])));
}
