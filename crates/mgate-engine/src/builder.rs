use std::collections::HashMap;
use std::sync::Arc;

use mgate_common::{GatewayConfig, GatewayConfigError, SecretResolver};
use mgate_plugin::{Plugin, PluginPipeline};
use mgate_provider::{Key, KeySelector, ProviderAdapter};
use mgate_tools::{ToolManager, ToolSource};
use mgate_worker::{WorkerPool, WorkerPoolConfig};

use crate::registry::{GatewayRegistry, ProviderRuntime};
use crate::request_engine::RequestEngine;

#[derive(Debug, thiserror::Error)]
pub enum BuilderError {
    #[error(transparent)]
    Config(#[from] GatewayConfigError),
    #[error("no adapter registered for provider `{0}`")]
    MissingAdapter(String),
    #[error("failed to resolve key for provider `{provider}`: {source}")]
    Secret {
        provider: String,
        #[source]
        source: mgate_common::SecretResolveError,
    },
}

/// Assembles a [`RequestEngine`] from a [`GatewayConfig`] plus whatever the
/// embedding application registers: one adapter per provider name, the
/// tool sources the config references, and the plugin stack in order. Does
/// all secret resolution up front (construction-time, never per-request).
#[derive(Default)]
pub struct GatewayBuilder {
    config: Option<GatewayConfig>,
    adapters: HashMap<String, Arc<dyn ProviderAdapter>>,
    tool_sources: Vec<(String, Arc<dyn ToolSource>)>,
    plugins: Vec<Arc<dyn Plugin>>,
    secret_resolver: Option<Arc<dyn SecretResolver>>,
}

impl GatewayBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(mut self, config: GatewayConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn with_adapter(mut self, provider: impl Into<String>, adapter: Arc<dyn ProviderAdapter>) -> Self {
        self.adapters.insert(provider.into(), adapter);
        self
    }

    pub fn with_tool_source(mut self, name: impl Into<String>, source: Arc<dyn ToolSource>) -> Self {
        self.tool_sources.push((name.into(), source));
        self
    }

    pub fn with_plugin(mut self, plugin: Arc<dyn Plugin>) -> Self {
        self.plugins.push(plugin);
        self
    }

    pub fn with_secret_resolver(mut self, resolver: Arc<dyn SecretResolver>) -> Self {
        self.secret_resolver = Some(resolver);
        self
    }

    pub fn build(self) -> Result<RequestEngine, BuilderError> {
        let config = self.config.unwrap_or_else(|| GatewayConfig {
            host: "0.0.0.0".to_string(),
            port: 8080,
            providers: Vec::new(),
            tool_sources: Vec::new(),
            plugins: Vec::new(),
            tool_round_budget: 4,
            tool_concurrency_cap: 8,
        });
        config.validate()?;

        let mut registry = GatewayRegistry::new();
        for settings in &config.providers {
            let adapter = self
                .adapters
                .get(&settings.name)
                .cloned()
                .ok_or_else(|| BuilderError::MissingAdapter(settings.name.clone()))?;

            let mut keys = Vec::with_capacity(settings.keys.len());
            for (idx, key_config) in settings.keys.iter().enumerate() {
                let value = key_config
                    .source
                    .resolve(self.secret_resolver.as_deref())
                    .map_err(|source| BuilderError::Secret {
                        provider: settings.name.clone(),
                        source,
                    })?;
                keys.push(Key {
                    id: idx as u32,
                    value,
                    weight: key_config.weight,
                    models_allowlist: key_config.models_allowlist.clone(),
                });
            }
            let selector = Arc::new(KeySelector::new(keys));

            let worker_pool = Arc::new(WorkerPool::new(
                settings.name.clone(),
                adapter.clone(),
                WorkerPoolConfig {
                    concurrency: settings.concurrency,
                    queue_depth: settings.queue_depth,
                    network_timeout: settings.network_timeout,
                    max_retries: settings.max_retries,
                },
            ));

            registry.register(
                settings.name.clone(),
                ProviderRuntime {
                    adapter,
                    selector,
                    worker_pool,
                    settings: settings.clone(),
                },
            );
        }

        let tool_sources: Vec<_> = self
            .tool_sources
            .into_iter()
            .filter(|(name, _)| config.tool_sources.contains(name))
            .collect();
        let tools = Arc::new(ToolManager::new(
            tool_sources,
            config.tool_round_budget,
            config.tool_concurrency_cap,
        ));

        let pipeline = Arc::new(PluginPipeline::new(self.plugins));

        Ok(RequestEngine::new(Arc::new(registry), pipeline, tools))
    }
}
