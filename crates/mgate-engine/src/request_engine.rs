use std::sync::Arc;

use mgate_common::{ErrorKind, GatewayError};
use mgate_plugin::{PluginContext, PluginPipeline, PreResult};
use mgate_provider::{
    ChatMessage, ChatRole, GatewayRequest, GatewayResponse, RequestInput, ResponseMeta, Usage,
};
use mgate_tools::{ToolFilter, ToolManager, ToolOutcome};
use mgate_worker::JobSpec;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::fallback::FallbackOrchestrator;
use crate::registry::GatewayRegistry;

/// Auxiliary, per-request fields the transport hands the engine alongside
/// the normalized request (§6): correlation id, tool filters, deadline.
pub struct RequestContext {
    pub request_id: String,
    pub tool_filter: ToolFilter,
    pub deadline: Instant,
    pub cancel: CancellationToken,
}

impl RequestContext {
    pub fn new(deadline: Instant) -> Self {
        Self {
            request_id: Uuid::new_v4().to_string(),
            tool_filter: ToolFilter::default(),
            deadline,
            cancel: CancellationToken::new(),
        }
    }
}

/// Entry point composing the pipeline, tool manager and fallback
/// orchestrator in the fixed order of §4.8. Owns nothing request-scoped
/// itself; `RequestContext` carries that per call.
pub struct RequestEngine {
    registry: Arc<GatewayRegistry>,
    orchestrator: FallbackOrchestrator,
    pipeline: Arc<PluginPipeline>,
    tools: Arc<ToolManager>,
}

impl RequestEngine {
    pub fn new(
        registry: Arc<GatewayRegistry>,
        pipeline: Arc<PluginPipeline>,
        tools: Arc<ToolManager>,
    ) -> Self {
        Self {
            orchestrator: FallbackOrchestrator::new(registry.clone()),
            registry,
            pipeline,
            tools,
        }
    }

    pub async fn handle(
        &self,
        request: GatewayRequest,
        ctx: RequestContext,
    ) -> Result<GatewayResponse, GatewayError> {
        let started = Instant::now();
        let plugin_ctx = PluginContext {
            trace_id: ctx.request_id.clone(),
            cancel: ctx.cancel.clone(),
        };

        let pre = self.pipeline.run_pre(&plugin_ctx, request).await;
        let (mut request, entered) = match pre {
            PreResult::Rejected { error, entered } => {
                self.unwind_on_error(&plugin_ctx, &entered).await;
                return Err(error);
            }
            PreResult::ShortCircuited { response, entered } => {
                let response = self.pipeline.run_post(&plugin_ctx, &entered, response).await;
                return Ok(response);
            }
            PreResult::Continued { request, entered } => (request, entered),
        };

        if let Err(err) = self
            .tools
            .augment_request(&mut request, &ctx.tool_filter, ctx.cancel.clone())
            .await
        {
            self.unwind_on_error(&plugin_ctx, &entered).await;
            return Err(err);
        }

        let request = Arc::new(request);
        let dispatched = self
            .orchestrator
            .dispatch(request.clone(), ctx.cancel.clone(), ctx.deadline)
            .await;

        let mut response = match dispatched {
            Ok(response) => response,
            Err(err) => {
                self.unwind_on_error(&plugin_ctx, &entered).await;
                return Err(err);
            }
        };

        if let Err(err) = self.run_tool_rounds(&request, &mut response, &ctx).await {
            self.unwind_on_error(&plugin_ctx, &entered).await;
            return Err(err);
        }

        response.meta.latency = started.elapsed();
        let response = self.pipeline.run_post(&plugin_ctx, &entered, response).await;
        Ok(response)
    }

    /// Tool round loop (§4.6 post-augmentation, §9 "bounded re-entrant
    /// call"). Re-prompts the same `(provider, model)` the orchestrator
    /// already succeeded on — per I5 this never re-enters the fallback
    /// orchestrator or the plugin pipeline.
    async fn run_tool_rounds(
        &self,
        original_request: &GatewayRequest,
        response: &mut GatewayResponse,
        ctx: &RequestContext,
    ) -> Result<(), GatewayError> {
        if original_request.params.client_side_execution {
            return Ok(());
        }

        let Some(last_attempt) = response.meta.attempts.last().cloned() else {
            return Ok(());
        };
        let Some(runtime) = self.registry.get(&last_attempt.provider) else {
            return Ok(());
        };

        let mut conversation = match &original_request.input {
            RequestInput::Messages(messages) => messages.clone(),
            RequestInput::Prompt(prompt) => vec![ChatMessage {
                role: ChatRole::User,
                content: Some(prompt.clone()),
                tool_calls: Vec::new(),
                tool_call_id: None,
            }],
        };

        let mut rounds = 0u32;
        while response.has_tool_calls() {
            if rounds >= self.tools.round_budget {
                break;
            }
            if ctx.cancel.is_cancelled() {
                return Err(GatewayError::canceled());
            }

            let calls: Vec<_> = response.tool_calls().into_iter().cloned().collect();
            if let Some(choice) = response.choices.first() {
                conversation.push(choice.message.clone());
            }

            let outcomes = self
                .tools
                .execute_tool_calls(calls, ctx.cancel.clone())
                .await?;
            for (tool_call_id, outcome) in outcomes {
                let content = match outcome {
                    ToolOutcome::Ok(text) => text,
                    ToolOutcome::Failed(message) => message,
                };
                conversation.push(ChatMessage {
                    role: ChatRole::Tool,
                    content: Some(content),
                    tool_calls: Vec::new(),
                    tool_call_id: Some(tool_call_id),
                });
            }

            let mut next_request = (*original_request).clone();
            next_request.input = RequestInput::Messages(conversation.clone());
            next_request.model = last_attempt.model.clone();
            next_request.fallback_chain.clear();

            let key = runtime
                .selector
                .select(&last_attempt.model)
                .await
                .map_err(|_| {
                    GatewayError::new(ErrorKind::ProviderUnavailable, "no viable key for tool re-call")
                })?;
            let spec = JobSpec {
                request: Arc::new(next_request),
                key: key.clone(),
                provider: last_attempt.provider.clone(),
                model: last_attempt.model.clone(),
                attempt_index: 0,
                deadline: std::cmp::min(ctx.deadline, Instant::now() + runtime.settings.network_timeout),
                cancel: ctx.cancel.clone(),
            };
            let deadline = spec.deadline;
            match runtime.worker_pool.submit(spec, deadline).await {
                Ok(next_response) => {
                    runtime.selector.record_success(key.id).await;
                    let attempts = std::mem::take(&mut response.meta.attempts);
                    let prior_latency = response.meta.latency;
                    *response = next_response;
                    response.meta.attempts = attempts;
                    response.meta.latency += prior_latency;
                }
                Err(err) => {
                    if err.kind.is_retryable() {
                        runtime.selector.record_failure(key.id).await;
                    }
                    return Err(err);
                }
            }
            rounds += 1;
        }

        response.meta.tool_rounds_used = rounds;
        Ok(())
    }

    /// Runs post-hooks against a placeholder response purely for the
    /// symmetric-unwind side effects (logging, cleanup) when the request
    /// is terminating in an error; the placeholder's contents are
    /// discarded and the original error always propagates.
    async fn unwind_on_error(&self, ctx: &PluginContext, entered: &mgate_plugin::Entered) {
        let placeholder = GatewayResponse {
            id: String::new(),
            model: String::new(),
            choices: Vec::new(),
            usage: Usage::default(),
            raw: serde_json::Value::Null,
            meta: ResponseMeta {
                latency: std::time::Duration::ZERO,
                attempts: Vec::new(),
                tool_rounds_used: 0,
            },
        };
        let _ = self.pipeline.run_post(ctx, entered, placeholder).await;
    }
}
