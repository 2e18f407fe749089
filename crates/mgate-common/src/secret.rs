use std::fmt;

/// Where a secret-bearing config field is allowed to come from. Per the
/// external-interfaces contract, key values must never be accepted as
/// inline strings in config — only indirection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SecretSource {
    /// Read from the named environment variable at build time.
    Env(String),
    /// Resolved through an injected [`SecretResolver`] by an opaque handle,
    /// e.g. a vault path or secret-manager key id.
    Resolver(String),
}

use serde::{Deserialize, Serialize};

/// A resolved secret value. Deliberately has no `Display` and a `Debug`
/// impl that only ever prints a content hash, never the value itself.
#[derive(Clone)]
pub struct SecretValue(Box<str>);

impl SecretValue {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into().into_boxed_str())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Short, stable fingerprint safe to put in logs or events.
    pub fn fingerprint(&self) -> String {
        blake3::hash(self.0.as_bytes()).to_hex()[..12].to_string()
    }
}

impl fmt::Debug for SecretValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SecretValue(<redacted fp={}>)", self.fingerprint())
    }
}

/// Resolves a [`SecretSource::Resolver`] handle into a live secret. The
/// gateway builder calls this once at construction; the core engine never
/// re-resolves secrets at request time.
pub trait SecretResolver: Send + Sync {
    fn resolve(&self, handle: &str) -> Result<SecretValue, SecretResolveError>;
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum SecretResolveError {
    #[error("environment variable {0} is not set")]
    MissingEnvVar(String),
    #[error("no resolver handle registered for {0}")]
    UnknownHandle(String),
}

impl SecretSource {
    pub fn resolve(
        &self,
        resolver: Option<&dyn SecretResolver>,
    ) -> Result<SecretValue, SecretResolveError> {
        match self {
            SecretSource::Env(var) => std::env::var(var)
                .map(SecretValue::new)
                .map_err(|_| SecretResolveError::MissingEnvVar(var.clone())),
            SecretSource::Resolver(handle) => resolver
                .ok_or_else(|| SecretResolveError::UnknownHandle(handle.clone()))?
                .resolve(handle),
        }
    }
}
