use std::collections::HashMap;
use std::sync::Arc;

use mgate_common::ProviderSettings;
use mgate_provider::{KeySelector, ProviderAdapter};
use mgate_worker::WorkerPool;

/// Everything the fallback orchestrator needs for one provider name: its
/// adapter, key selector, worker pool and static settings (§3 Provider
/// Context). The richer counterpart to `mgate_provider::ProviderRegistry`,
/// composed here because only this crate depends on both `mgate-provider`
/// and `mgate-worker`.
pub struct ProviderRuntime {
    pub adapter: Arc<dyn ProviderAdapter>,
    pub selector: Arc<KeySelector>,
    pub worker_pool: Arc<WorkerPool>,
    pub settings: ProviderSettings,
}

#[derive(Default)]
pub struct GatewayRegistry {
    order: Vec<String>,
    providers: HashMap<String, ProviderRuntime>,
}

impl GatewayRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, name: impl Into<String>, runtime: ProviderRuntime) {
        let name = name.into();
        if !self.providers.contains_key(&name) {
            self.order.push(name.clone());
        }
        self.providers.insert(name, runtime);
    }

    pub fn get(&self, name: &str) -> Option<&ProviderRuntime> {
        self.providers.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(|s| s.as_str())
    }
}
