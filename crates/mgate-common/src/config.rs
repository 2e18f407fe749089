use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::secret::SecretSource;

/// One credential entry as configured, before secret resolution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeyConfig {
    pub source: SecretSource,
    pub weight: f64,
    /// Empty means "all models allowed".
    pub models_allowlist: Vec<String>,
}

/// Construction-time settings for one provider's worker pool and key set.
/// Maps directly to the Provider Context fields named in the data model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderSettings {
    pub name: String,
    pub concurrency: usize,
    pub queue_depth: usize,
    pub network_timeout: Duration,
    pub max_retries: u32,
    pub keys: Vec<KeyConfig>,
}

/// Process-wide configuration, immutable once the gateway is built.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    pub host: String,
    pub port: u16,
    pub providers: Vec<ProviderSettings>,
    /// Tool source names the tool manager should wire up; resolved against
    /// whatever `ToolSource` implementations the embedding application
    /// registers with the builder.
    pub tool_sources: Vec<String>,
    /// Plugin names in registration order; order is significant (§4.5).
    pub plugins: Vec<String>,
    /// Default per-request tool round budget (§4.6); 4 unless overridden.
    pub tool_round_budget: u32,
    /// Concurrency cap for parallel tool-call execution within one response.
    pub tool_concurrency_cap: usize,
}

/// Optional overlay used when merging CLI args, env vars and file config;
/// last-writer-wins at each field, mirroring the teacher's config layering.
#[derive(Debug, Clone, Default)]
pub struct GatewayConfigPatch {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub tool_round_budget: Option<u32>,
    pub tool_concurrency_cap: Option<usize>,
}

#[derive(Debug, thiserror::Error)]
pub enum GatewayConfigError {
    #[error("missing required config field: {0}")]
    MissingField(&'static str),
    #[error("no providers configured")]
    NoProviders,
}

impl GatewayConfigPatch {
    pub fn overlay(&mut self, other: GatewayConfigPatch) {
        if other.host.is_some() {
            self.host = other.host;
        }
        if other.port.is_some() {
            self.port = other.port;
        }
        if other.tool_round_budget.is_some() {
            self.tool_round_budget = other.tool_round_budget;
        }
        if other.tool_concurrency_cap.is_some() {
            self.tool_concurrency_cap = other.tool_concurrency_cap;
        }
    }

    /// Applies this patch on top of a base config, as produced by
    /// CLI/env parsing, leaving unset fields at their base value.
    pub fn apply(self, mut base: GatewayConfig) -> GatewayConfig {
        if let Some(host) = self.host {
            base.host = host;
        }
        if let Some(port) = self.port {
            base.port = port;
        }
        if let Some(budget) = self.tool_round_budget {
            base.tool_round_budget = budget;
        }
        if let Some(cap) = self.tool_concurrency_cap {
            base.tool_concurrency_cap = cap;
        }
        base
    }
}

impl GatewayConfig {
    pub fn validate(&self) -> Result<(), GatewayConfigError> {
        if self.providers.is_empty() {
            return Err(GatewayConfigError::NoProviders);
        }
        for provider in &self.providers {
            if provider.keys.is_empty() {
                return Err(GatewayConfigError::MissingField("keys"));
            }
        }
        Ok(())
    }
}
