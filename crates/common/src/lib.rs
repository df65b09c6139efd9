/**
 * Content backends.
 *  A small content-addressed storage interface
 *  plus an implementation on top of Iroh-Blobs
 */
pub mod backend;
/**
 * Cryptographic types and operations.
 *  - Symmetric AES-GCM secrets and the key cache
 *  - Node identity keys
 */
pub mod crypto;
/**
 * Named, ordered transform steps run
 *  around `store_data`.
 */
pub mod hooks;
/**
 * The orchestrator: publish, fetch, pin,
 *  replicate and the tool-wrapping facade.
 */
pub mod protocol;
/**
 * Records, bundles, scopes and the
 *  envelope fields that travel with them.
 */
pub mod record;
/**
 * Scope to backend-class routing.
 */
pub mod router;
/**
 * Structural schema inference for
 *  JSON content.
 */
pub mod schema;

pub mod prelude {
    pub use crate::backend::{Address, BackendOptions, BlobsBackend, ContentBackend};
    pub use crate::crypto::{EncryptionEngine, KeyStore, PublicKey, SecretKey};
    pub use crate::hooks::{HookPipeline, HookTrigger};
    pub use crate::protocol::{
        ProtocolError, ProtocolOptions, RecordProtocol, StoreOptions, Tool, WrappedTool,
    };
    pub use crate::record::{
        AccessPolicy, BackendClass, Bundle, Content, EncryptionInfo, Kind, Metadata, Record,
        Scope,
    };
    pub use crate::router::ScopeRouter;
}
