pub mod bootstrap;
pub mod builder;
pub mod fallback;
pub mod registry;
pub mod request_engine;

pub use bootstrap::{bootstrap, bootstrap_from_env, CliArgs};
pub use builder::{BuilderError, GatewayBuilder};
pub use fallback::FallbackOrchestrator;
pub use registry::{GatewayRegistry, ProviderRuntime};
pub use request_engine::{RequestContext, RequestEngine};
