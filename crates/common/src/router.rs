use std::collections::HashMap;
use std::sync::Arc;

use crate::backend::ContentBackend;
use crate::protocol::ProtocolError;
use crate::record::{BackendClass, Scope};

/// Maps scopes onto the local-class and public-class backends
#[derive(Debug, Clone, Default)]
pub struct ScopeRouter {
    backends: HashMap<BackendClass, Arc<dyn ContentBackend>>,
}

impl ScopeRouter {
    /// Router with no backends configured
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_local(self, backend: impl ContentBackend) -> Self {
        self.with_backend(BackendClass::Local, Arc::new(backend))
    }

    pub fn with_public(self, backend: impl ContentBackend) -> Self {
        self.with_backend(BackendClass::Public, Arc::new(backend))
    }

    pub fn with_backend(mut self, class: BackendClass, backend: Arc<dyn ContentBackend>) -> Self {
        self.backends.insert(class, backend);
        self
    }

    pub fn is_configured(&self, class: BackendClass) -> bool {
        self.backends.contains_key(&class)
    }

    /// Backend handle for `scope`
    pub fn resolve(&self, scope: Scope) -> Result<&Arc<dyn ContentBackend>, ProtocolError> {
        let class = scope.class();
        self.backends
            .get(&class)
            .ok_or(ProtocolError::BackendNotConfigured(class))
    }

    /// Parse a scope name and resolve it
    pub fn resolve_name(&self, scope: &str) -> Result<&Arc<dyn ContentBackend>, ProtocolError> {
        self.resolve(scope.parse()?)
    }
}
