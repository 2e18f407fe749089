use std::sync::Arc;

use mgate_common::GatewayError;
use mgate_pool::{Pool, Pooled, ResultSlot};
use mgate_provider::{GatewayRequest, GatewayResponse, Key};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

pub type JobOutcome = Result<GatewayResponse, GatewayError>;

/// A pooled, reusable rendezvous for one job's outcome. Wrapping the
/// [`Pooled`] guard in an `Arc` lets both the worker (writer) and the
/// fallback orchestrator (reader) hold a handle; the slot returns to its
/// pool once both drop theirs.
pub type JobResultSlot = Arc<Pooled<ResultSlot<JobOutcome>>>;

/// A single scheduled unit of work targeting one provider and one key
/// (§3 Job). Exists in exactly one queue at a time (I1); destroyed on
/// completion.
pub struct Job {
    pub request: Arc<GatewayRequest>,
    pub key: Key,
    pub provider: String,
    pub model: String,
    pub attempt_index: usize,
    pub deadline: Instant,
    pub cancel: CancellationToken,
    pub result: JobResultSlot,
}

/// Per-provider pool of reusable job-result slots; one instance backs every
/// `WorkerPool::submit` call for that provider.
pub fn result_slot_pool() -> Arc<Pool<ResultSlot<JobOutcome>>> {
    Pool::new()
}
