use std::fs;
use std::path::Path;

use common::backend::{BackendError, BackendOptions, BlobsBackend};
use common::crypto::{EncryptionEngine, KeyError, KeyStore, SecretKey};
use common::protocol::{ProtocolOptions, RecordProtocol};
use common::record::BackendClass;
use common::router::ScopeRouter;

use super::config::Config;

/// Main service state - owns the wired up protocol
#[derive(Debug, Clone)]
pub struct State {
    protocol: RecordProtocol,
    node_secret: SecretKey,
}

impl State {
    pub async fn from_config(config: &Config) -> Result<Self, StateSetupError> {
        // 1. Setup node secret
        let node_secret = match config.node_secret_path {
            Some(ref path) => load_node_secret(path)?,
            None => SecretKey::generate()?,
        };
        tracing::info!("Node id: {}", node_secret.public());

        // 2. Setup local backend
        let local_options = BackendOptions {
            identity: Some(node_secret.clone()),
            max_size: config.local_max_size,
            announce_addresses: config.announce_addresses.clone(),
        };
        let local = open_backend(
            config.local_store_path.as_deref(),
            BackendClass::Local,
            local_options,
        )
        .await?;
        let mut router = ScopeRouter::new().with_local(local);

        // 3. Setup public backend, if configured
        match config.public {
            Some(ref public) => {
                let public_options = BackendOptions {
                    identity: Some(node_secret.clone()),
                    max_size: public.max_size,
                    announce_addresses: config.announce_addresses.clone(),
                };
                let backend = open_backend(
                    public.store_path.as_deref(),
                    BackendClass::Public,
                    public_options,
                )
                .await?;
                router = router.with_public(backend);
            }
            None => tracing::info!("no public backend configured; public and user scopes disabled"),
        }

        // 4. Wire the protocol
        let protocol = RecordProtocol::with_options(
            router,
            EncryptionEngine::new(KeyStore::new()),
            ProtocolOptions {
                deterministic_encryption: config.deterministic_encryption,
            },
        );

        Ok(Self {
            protocol,
            node_secret,
        })
    }

    pub fn protocol(&self) -> &RecordProtocol {
        &self.protocol
    }

    pub fn node_secret(&self) -> &SecretKey {
        &self.node_secret
    }
}

impl AsRef<RecordProtocol> for State {
    fn as_ref(&self) -> &RecordProtocol {
        &self.protocol
    }
}

fn load_node_secret(path: &Path) -> Result<SecretKey, StateSetupError> {
    if !path.exists() {
        return Err(StateSetupError::NodeSecretDoesNotExist(
            path.display().to_string(),
        ));
    }
    let pem = fs::read_to_string(path)?;
    Ok(SecretKey::from_pem(&pem)?)
}

async fn open_backend(
    path: Option<&Path>,
    class: BackendClass,
    options: BackendOptions,
) -> Result<BlobsBackend, StateSetupError> {
    let backend = match path {
        Some(path) => {
            tracing::debug!("State::from_config - loading {} store at {:?}", class, path);
            BlobsBackend::fs(path, class, options).await?
        }
        None => {
            tracing::debug!("State::from_config - using in-memory {} store", class);
            BlobsBackend::memory(class, options).await?
        }
    };
    Ok(backend)
}

#[derive(Debug, thiserror::Error)]
pub enum StateSetupError {
    #[error("Node secret file does not exist: {0}")]
    NodeSecretDoesNotExist(String),
    #[error("Invalid node secret: {0}")]
    InvalidNodeSecret(#[from] KeyError),
    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
