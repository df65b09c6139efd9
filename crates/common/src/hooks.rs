//! Named, ordered transform steps around the store pipeline.
//!
//! Handlers registered for a trigger run one after another in registration
//! order, each receiving the previous handler's output. The first failing
//! handler aborts the run.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::record::Metadata;

/// When a hook runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum HookTrigger {
    PreStore,
    PostStore,
}

impl fmt::Display for HookTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HookTrigger::PreStore => f.write_str("pre-store"),
            HookTrigger::PostStore => f.write_str("post-store"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum HookError {
    #[error("a hook named {0} is already registered")]
    Duplicate(String),
    #[error("{trigger} hook {name} failed: {source}")]
    Failed {
        name: String,
        trigger: HookTrigger,
        #[source]
        source: anyhow::Error,
    },
}

/// A transform step
///
/// Implemented for any `Fn(Value, Metadata) -> impl Future<Output =
///  anyhow::Result<Value>>`, so closures can be registered directly.
#[async_trait]
pub trait HookHandler: Send + Sync + 'static {
    async fn handle(&self, data: Value, metadata: &Metadata) -> anyhow::Result<Value>;
}

#[async_trait]
impl<F, Fut> HookHandler for F
where
    F: Fn(Value, Metadata) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<Value>> + Send + 'static,
{
    async fn handle(&self, data: Value, metadata: &Metadata) -> anyhow::Result<Value> {
        (self)(data, metadata.clone()).await
    }
}

/// A registered handler
#[derive(Clone)]
pub struct Hook {
    pub name: String,
    pub trigger: HookTrigger,
    handler: Arc<dyn HookHandler>,
}

impl fmt::Debug for Hook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hook")
            .field("name", &self.name)
            .field("trigger", &self.trigger)
            .finish()
    }
}

/// Ordered hook registry
///
/// Runs operate on a snapshot, so hooks added or removed while a run is in
///  flight only affect later runs.
#[derive(Debug, Clone, Default)]
pub struct HookPipeline {
    hooks: Arc<RwLock<Vec<Hook>>>,
}

impl HookPipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` under a unique `name`
    pub fn add_hook(
        &self,
        name: impl Into<String>,
        trigger: HookTrigger,
        handler: impl HookHandler,
    ) -> Result<(), HookError> {
        let name = name.into();
        let mut hooks = self.hooks.write();
        if hooks.iter().any(|hook| hook.name == name) {
            return Err(HookError::Duplicate(name));
        }
        tracing::debug!(name = %name, trigger = %trigger, "registered hook");
        hooks.push(Hook {
            name,
            trigger,
            handler: Arc::new(handler),
        });
        Ok(())
    }

    /// Remove a hook by name, returning whether one was registered
    pub fn remove_hook(&self, name: &str) -> bool {
        let mut hooks = self.hooks.write();
        let before = hooks.len();
        hooks.retain(|hook| hook.name != name);
        before != hooks.len()
    }

    /// Hooks for `trigger`, in registration order
    pub fn snapshot(&self, trigger: HookTrigger) -> Vec<Hook> {
        self.hooks
            .read()
            .iter()
            .filter(|hook| hook.trigger == trigger)
            .cloned()
            .collect()
    }

    pub fn names(&self, trigger: HookTrigger) -> Vec<String> {
        self.snapshot(trigger)
            .into_iter()
            .map(|hook| hook.name)
            .collect()
    }

    /// Fold `data` through every hook registered for `trigger`
    pub async fn run(
        &self,
        trigger: HookTrigger,
        data: Value,
        metadata: &Metadata,
    ) -> Result<Value, HookError> {
        let mut data = data;
        for hook in self.snapshot(trigger) {
            tracing::debug!(name = %hook.name, trigger = %trigger, "running hook");
            data = hook
                .handler
                .handle(data, metadata)
                .await
                .map_err(|source| HookError::Failed {
                    name: hook.name.clone(),
                    trigger,
                    source,
                })?;
        }
        Ok(data)
    }
}
