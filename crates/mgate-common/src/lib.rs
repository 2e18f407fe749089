pub mod config;
pub mod error;
pub mod secret;

pub use config::{
    GatewayConfig, GatewayConfigError, GatewayConfigPatch, KeyConfig, ProviderSettings,
};
pub use error::{AttemptError, ErrorKind, GatewayError};
pub use secret::{SecretResolveError, SecretResolver, SecretSource, SecretValue};
