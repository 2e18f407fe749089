pub mod manager;
pub mod memory;
pub mod source;

pub use manager::{ToolFilter, ToolManager};
pub use memory::InMemoryToolSource;
pub use source::{ToolOutcome, ToolSource};
