//! Service infrastructure for the record envelope protocol.
//!
//! This crate provides the ambient pieces a process needs around the core:
//! - Configuration (TOML, with defaults for every key)
//! - Logging (tracing subscriber over a non-blocking writer)
//! - State (backends, node identity and the protocol wired from config)

pub mod config;
pub mod logging;
pub mod state;

// Re-export key types for convenience
pub use config::{Config, ConfigError, PublicBackendConfig};
pub use logging::LoggingError;
pub use state::{State as ServiceState, StateSetupError};
