//! Hook-bearing convenience path and the tool-wrapping facade.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::{ProtocolError, RecordProtocol};
use crate::backend::Address;
use crate::hooks::HookTrigger;
use crate::record::{AccessPolicy, EncryptionInfo, Metadata, Record, Scope};

/// Options for [`RecordProtocol::store_data`]
#[derive(Debug, Clone)]
pub struct StoreOptions {
    pub scope: Scope,
    pub pin: bool,
    pub generate_schema: bool,
    /// Applied to both the data and the schema record
    pub encryption: Option<EncryptionInfo>,
    pub access_policy: Option<AccessPolicy>,
    /// Handed to every hook and attached to the data record
    pub metadata: Metadata,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            scope: Scope::Private,
            pin: false,
            generate_schema: true,
            encryption: None,
            access_policy: None,
            metadata: Metadata::new(),
        }
    }
}

impl StoreOptions {
    pub fn scope(mut self, scope: Scope) -> Self {
        self.scope = scope;
        self
    }

    pub fn pin(mut self, pin: bool) -> Self {
        self.pin = pin;
        self
    }

    pub fn generate_schema(mut self, generate_schema: bool) -> Self {
        self.generate_schema = generate_schema;
        self
    }

    pub fn encryption(mut self, encryption: EncryptionInfo) -> Self {
        self.encryption = Some(encryption);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreReceipt {
    pub address: Address,
    pub schema_address: Option<Address>,
    pub timestamp: String,
}

/// An external callable that can be given content-addressed persistence
#[async_trait]
pub trait Tool: Send + Sync + 'static {
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    fn metadata(&self) -> Metadata {
        Metadata::new()
    }

    async fn invoke(&self, input: Value) -> anyhow::Result<Value>;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    pub metadata: Metadata,
}

/// What a wrapped tool returns: its result plus where it was stored
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolEnvelope {
    pub result: Value,
    pub address: Address,
    pub schema_address: Option<Address>,
    pub timestamp: String,
    pub tool: ToolDescriptor,
}

/// A [`Tool`] whose every result is persisted through `store_data`
#[derive(Clone)]
pub struct WrappedTool {
    protocol: RecordProtocol,
    tool: Arc<dyn Tool>,
    options: StoreOptions,
}

impl std::fmt::Debug for WrappedTool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WrappedTool")
            .field("tool", &self.tool.name())
            .field("options", &self.options)
            .finish()
    }
}

impl WrappedTool {
    pub fn descriptor(&self) -> ToolDescriptor {
        ToolDescriptor {
            name: self.tool.name().to_string(),
            description: self.tool.description().to_string(),
            metadata: self.tool.metadata(),
        }
    }

    /// Invoke the tool and store its result
    pub async fn call(&self, input: Value) -> Result<ToolEnvelope, ProtocolError> {
        let descriptor = self.descriptor();
        let result = self
            .tool
            .invoke(input)
            .await
            .map_err(|source| ProtocolError::Tool {
                name: descriptor.name.clone(),
                source,
            })?;

        let mut options = self.options.clone();
        options
            .metadata
            .entry("tool")
            .or_insert_with(|| Value::String(descriptor.name.clone()));

        let receipt = self.protocol.store_data(result.clone(), options).await?;
        Ok(ToolEnvelope {
            result,
            address: receipt.address,
            schema_address: receipt.schema_address,
            timestamp: receipt.timestamp,
            tool: descriptor,
        })
    }
}

impl RecordProtocol {
    /// Run the pre-store hooks over `data`, then persist it alongside an
    ///  optional inferred schema
    ///
    /// The data and schema records are published concurrently. Post-store
    ///  hooks see `{address, data}` once both have landed.
    pub async fn store_data(
        &self,
        data: Value,
        options: StoreOptions,
    ) -> Result<StoreReceipt, ProtocolError> {
        let mut metadata = options.metadata.clone();
        metadata
            .entry("scope")
            .or_insert_with(|| Value::String(options.scope.to_string()));

        let data = self
            .hooks()
            .run(HookTrigger::PreStore, data, &metadata)
            .await?;

        let schema_record = if options.generate_schema {
            let schema = self.schema_generator().generate(&data);
            let content = serde_json::to_value(&schema)
                .map_err(|e| ProtocolError::SchemaValidation(e.to_string()))?;
            Some(self.envelope(Record::schema(options.scope, content), &options))
        } else {
            None
        };
        let data_record = self
            .envelope(Record::data(options.scope, data.clone()), &options)
            .with_metadata(options.metadata.clone());

        self.preflight(&data_record)?;
        if let Some(record) = &schema_record {
            self.preflight(record)?;
        }

        let publish_schema = async {
            match schema_record {
                Some(record) => self.publish_record(record).await.map(Some),
                None => Ok(None),
            }
        };
        let (data_record, schema_record) =
            tokio::try_join!(self.publish_record(data_record), publish_schema)?;

        let address = data_record
            .address
            .ok_or_else(|| anyhow::anyhow!("published record has no address"))?;
        let schema_address = schema_record.and_then(|record| record.address);

        self.hooks()
            .run(
                HookTrigger::PostStore,
                json!({ "address": address, "data": data }),
                &metadata,
            )
            .await?;

        tracing::info!(
            address = %address,
            schema_address = ?schema_address,
            scope = %options.scope,
            "stored data"
        );
        Ok(StoreReceipt {
            address,
            schema_address,
            timestamp: chrono::Utc::now().to_rfc3339(),
        })
    }

    /// Decorate `tool` so every result it produces is stored
    pub fn wrap(&self, tool: impl Tool, options: StoreOptions) -> WrappedTool {
        WrappedTool {
            protocol: self.clone(),
            tool: Arc::new(tool),
            options,
        }
    }

    fn envelope(&self, record: Record, options: &StoreOptions) -> Record {
        let mut record = record.pinned(options.pin);
        record.encryption = options.encryption.clone();
        record.access_policy = options.access_policy.clone();
        record
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::backend::{BackendOptions, BlobsBackend};
    use crate::crypto::{EncryptionEngine, KeyStore};
    use crate::record::{BackendClass, Content, Kind};
    use crate::router::ScopeRouter;

    async fn protocol() -> RecordProtocol {
        let local = BlobsBackend::memory(BackendClass::Local, BackendOptions::default())
            .await
            .unwrap();
        RecordProtocol::new(
            ScopeRouter::new().with_local(local),
            EncryptionEngine::new(KeyStore::new()),
        )
    }

    #[tokio::test]
    async fn test_store_data_publishes_schema() {
        let protocol = protocol().await;
        let receipt = protocol
            .store_data(json!({"n": 1}), StoreOptions::default())
            .await
            .unwrap();

        let schema = protocol
            .fetch_record(&receipt.schema_address.unwrap(), Scope::Private)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(schema.kind, Kind::Schema);
        assert_eq!(
            schema.content,
            Content::Json(json!({
                "type": "object",
                "properties": {"n": {"type": "number"}},
                "required": ["n"]
            }))
        );
    }

    #[tokio::test]
    async fn test_store_data_without_schema() {
        let protocol = protocol().await;
        let receipt = protocol
            .store_data(json!("plain"), StoreOptions::default().generate_schema(false))
            .await
            .unwrap();
        assert!(receipt.schema_address.is_none());

        let data = protocol
            .fetch_record(&receipt.address, Scope::Private)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(data.content, Content::Text("plain".into()));
    }

    #[tokio::test]
    async fn test_store_data_pins_both_records() {
        let protocol = protocol().await;
        let receipt = protocol
            .store_data(json!([1]), StoreOptions::default().pin(true))
            .await
            .unwrap();

        let pinned = protocol.get_pinned_cids(Scope::Private).await.unwrap();
        assert!(pinned.contains(&receipt.address));
        assert!(pinned.contains(&receipt.schema_address.unwrap()));
    }

    struct Echo;

    #[async_trait]
    impl Tool for Echo {
        fn name(&self) -> &str {
            "echo"
        }

        fn description(&self) -> &str {
            "returns its input"
        }

        async fn invoke(&self, input: Value) -> anyhow::Result<Value> {
            Ok(input)
        }
    }

    #[tokio::test]
    async fn test_wrapped_tool_envelope_shape() {
        let protocol = protocol().await;
        let wrapped = protocol.wrap(Echo, StoreOptions::default());
        let envelope = wrapped.call(json!({"q": "x"})).await.unwrap();

        let wire = serde_json::to_value(&envelope).unwrap();
        assert_eq!(wire["result"], json!({"q": "x"}));
        assert_eq!(wire["tool"]["name"], json!("echo"));
        assert_eq!(wire["tool"]["description"], json!("returns its input"));
        assert!(wire["schemaAddress"].is_string());

        let stored = protocol
            .fetch_record(&envelope.address, Scope::Private)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.metadata.unwrap()["tool"], json!("echo"));
    }
}
