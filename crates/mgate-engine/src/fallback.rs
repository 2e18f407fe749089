use std::sync::Arc;

use mgate_common::{AttemptError, ErrorKind, GatewayError};
use mgate_provider::{AttemptRecord, GatewayRequest, GatewayResponse};
use mgate_worker::JobSpec;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::registry::GatewayRegistry;

/// Sequential provider chain, per-attempt key selection, error aggregation
/// (§4.7). A finite, acyclic state machine over the attempt chain: each
/// entry is tried once (the worker pool already exhausted its own
/// retries); on a retryable failure the chain advances; a non-retryable
/// `invalid_request` from the primary aborts immediately unless it is
/// specifically a `model_not_supported` incompatibility.
pub struct FallbackOrchestrator {
    registry: Arc<GatewayRegistry>,
}

impl FallbackOrchestrator {
    pub fn new(registry: Arc<GatewayRegistry>) -> Self {
        Self { registry }
    }

    pub async fn dispatch(
        &self,
        request: Arc<GatewayRequest>,
        cancel: CancellationToken,
        request_deadline: Instant,
    ) -> Result<GatewayResponse, GatewayError> {
        let chain = request.attempt_chain();
        let mut failed: Vec<AttemptError> = Vec::new();
        let mut records: Vec<AttemptRecord> = Vec::new();

        for (attempt_index, target) in chain.iter().enumerate() {
            if cancel.is_cancelled() {
                return Err(GatewayError::canceled());
            }

            let Some(runtime) = self.registry.get(&target.provider) else {
                warn!(event = "unknown_provider", provider = %target.provider);
                let err = AttemptError {
                    provider: target.provider.clone(),
                    model: target.model.clone(),
                    kind: ErrorKind::ProviderUnavailable,
                    message: "provider not registered".to_string(),
                    upstream_status: None,
                };
                records.push(record_of(&err));
                failed.push(err);
                continue;
            };

            let key = match runtime.selector.select(&target.model).await {
                Ok(key) => key,
                Err(_) => {
                    let err = AttemptError {
                        provider: target.provider.clone(),
                        model: target.model.clone(),
                        kind: ErrorKind::ProviderUnavailable,
                        message: "no viable key".to_string(),
                        upstream_status: None,
                    };
                    records.push(record_of(&err));
                    failed.push(err);
                    continue;
                }
            };

            let attempt_deadline =
                std::cmp::min(request_deadline, Instant::now() + runtime.settings.network_timeout);
            let spec = JobSpec {
                request: request.clone(),
                key: key.clone(),
                provider: target.provider.clone(),
                model: target.model.clone(),
                attempt_index,
                deadline: attempt_deadline,
                cancel: cancel.clone(),
            };

            match runtime.worker_pool.submit(spec, attempt_deadline).await {
                Ok(mut response) => {
                    runtime.selector.record_success(key.id).await;
                    records.push(AttemptRecord {
                        provider: target.provider.clone(),
                        model: target.model.clone(),
                        ok: true,
                        kind: None,
                        upstream_status: None,
                    });
                    response.meta.attempts = records;
                    return Ok(response);
                }
                Err(err) => {
                    if err.kind.is_retryable() {
                        runtime.selector.record_failure(key.id).await;
                    }
                    records.push(AttemptRecord {
                        provider: target.provider.clone(),
                        model: target.model.clone(),
                        ok: false,
                        kind: Some(err.kind),
                        upstream_status: err.upstream_status,
                    });
                    let is_primary_hard_invalid = attempt_index == 0
                        && err.kind == ErrorKind::InvalidRequest
                        && !err.model_not_supported;
                    failed.push(AttemptError {
                        provider: target.provider.clone(),
                        model: target.model.clone(),
                        kind: err.kind,
                        message: err.message,
                        upstream_status: err.upstream_status,
                    });
                    if is_primary_hard_invalid {
                        return Err(GatewayError::aggregate(failed));
                    }
                }
            }
        }

        Err(GatewayError::aggregate(failed))
    }
}

fn record_of(err: &AttemptError) -> AttemptRecord {
    AttemptRecord {
        provider: err.provider.clone(),
        model: err.model.clone(),
        ok: false,
        kind: Some(err.kind),
        upstream_status: err.upstream_status,
    }
}
