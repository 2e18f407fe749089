use std::sync::Arc;
use std::time::Duration;

use mgate_common::{ErrorKind, GatewayError};
use mgate_pool::Pool;
use mgate_provider::{GatewayRequest, Key, ProviderAdapter, UpstreamFailure};
use tokio::sync::{Mutex, mpsc};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::backoff::backoff_with_jitter;
use crate::job::{Job, JobOutcome, result_slot_pool};

#[derive(Debug, Clone)]
pub struct WorkerPoolConfig {
    pub concurrency: usize,
    pub queue_depth: usize,
    pub network_timeout: Duration,
    pub max_retries: u32,
}

/// Everything the orchestrator supplies per attempt; the pool fills in the
/// pooled result slot and queue bookkeeping.
pub struct JobSpec {
    pub request: Arc<GatewayRequest>,
    pub key: Key,
    pub provider: String,
    pub model: String,
    pub attempt_index: usize,
    pub deadline: Instant,
    pub cancel: CancellationToken,
}

/// Bounded FIFO + N workers dispatching to one provider's adapter (§4.4).
/// Pools never share a worker across providers, so saturation in one
/// provider cannot starve another (testable property 1, "isolation").
pub struct WorkerPool {
    job_tx: mpsc::Sender<Job>,
    slot_pool: Arc<Pool<mgate_pool::ResultSlot<JobOutcome>>>,
    provider: String,
}

impl WorkerPool {
    pub fn new(provider: String, adapter: Arc<dyn ProviderAdapter>, config: WorkerPoolConfig) -> Self {
        let (job_tx, job_rx) = mpsc::channel(config.queue_depth.max(1));
        let job_rx = Arc::new(Mutex::new(job_rx));
        let slot_pool = result_slot_pool();

        for worker_id in 0..config.concurrency.max(1) {
            let job_rx = job_rx.clone();
            let adapter = adapter.clone();
            let max_retries = config.max_retries;
            let provider_name = provider.clone();
            tokio::spawn(async move {
                worker_loop(worker_id, provider_name, job_rx, adapter, max_retries).await;
            });
        }

        Self {
            job_tx,
            slot_pool,
            provider,
        }
    }

    /// Enqueues a job and awaits its outcome. If the queue is still full at
    /// `submission_deadline`, fails with `provider_unavailable`/`queue_full`
    /// (§4.4) without ever calling the adapter.
    pub async fn submit(&self, spec: JobSpec, submission_deadline: Instant) -> JobOutcome {
        let slot = Arc::new(self.slot_pool.acquire().await);
        let job = Job {
            request: spec.request,
            key: spec.key,
            provider: spec.provider,
            model: spec.model,
            attempt_index: spec.attempt_index,
            deadline: spec.deadline,
            cancel: spec.cancel,
            result: slot.clone(),
        };

        let remaining = submission_deadline.saturating_duration_since(Instant::now());
        if tokio::time::timeout(remaining, self.job_tx.send(job))
            .await
            .is_err()
        {
            warn!(event = "submit_timeout", provider = %self.provider, "queue_full");
            return Err(GatewayError::new(
                ErrorKind::ProviderUnavailable,
                "queue_full",
            )
            .with_provider(self.provider.clone(), "unknown"));
        }

        slot.wait().await
    }
}

async fn worker_loop(
    worker_id: usize,
    provider: String,
    job_rx: Arc<Mutex<mpsc::Receiver<Job>>>,
    adapter: Arc<dyn ProviderAdapter>,
    max_retries: u32,
) {
    loop {
        let job = {
            let mut rx = job_rx.lock().await;
            match rx.recv().await {
                Some(job) => job,
                None => return,
            }
        };

        if job.cancel.is_cancelled() {
            let _ = job.result.set(Err(GatewayError::canceled())).await;
            continue;
        }

        let provider = provider.clone();
        let model = job.model.clone();
        let outcome = run_attempt(&*adapter, &job, max_retries).await;
        info!(
            event = "worker_dispatch",
            worker_id,
            provider = %provider,
            model = %model,
            ok = outcome.is_ok(),
        );
        job.result.set(outcome).await;
    }
}

/// Runs `prepare` once, then `execute`/retry/`parse` per §4.4 steps 2-6.
async fn run_attempt(adapter: &dyn ProviderAdapter, job: &Job, max_retries: u32) -> JobOutcome {
    let wire_request = adapter.prepare(&job.request, &job.key).await?;

    let mut attempt = 0u32;
    loop {
        if job.cancel.is_cancelled() {
            return Err(GatewayError::canceled());
        }

        let execute = adapter.execute(wire_request.clone(), job.deadline, job.cancel.clone());
        let result = tokio::select! {
            biased;
            _ = job.cancel.cancelled() => return Err(GatewayError::canceled()),
            res = execute => res,
        };

        match result {
            Ok(wire_response) => return adapter.parse(wire_response).await,
            Err(failure) => {
                let kind = adapter.classify(&failure);
                if kind.is_retryable() && attempt < max_retries {
                    tokio::time::sleep(backoff_with_jitter(attempt)).await;
                    attempt += 1;
                    continue;
                }
                return Err(failure_to_error(kind, failure, job));
            }
        }
    }
}

fn failure_to_error(kind: ErrorKind, failure: UpstreamFailure, job: &Job) -> GatewayError {
    let mut err = GatewayError::new(kind, describe_failure(&failure))
        .with_provider(job.provider.clone(), job.model.clone());
    if let UpstreamFailure::Http { status, body, .. } = &failure {
        err = err.with_upstream_status(*status);
        let snippet: String = String::from_utf8_lossy(body).chars().take(256).collect();
        err = err.with_body_snippet(snippet);
    }
    err
}

fn describe_failure(failure: &UpstreamFailure) -> String {
    match failure {
        UpstreamFailure::Http { status, .. } => format!("upstream returned status {status}"),
        UpstreamFailure::Transport { message, .. } => message.clone(),
    }
}
