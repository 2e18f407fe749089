pub mod pool;
pub mod result_slot;

pub use pool::{Pool, Pooled, Resettable};
pub use result_slot::ResultSlot;
