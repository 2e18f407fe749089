pub mod context;
pub mod pipeline;
pub mod plugin;

pub use context::PluginContext;
pub use pipeline::{Entered, PluginPipeline, PreResult};
pub use plugin::{Plugin, PreOutcome};
