use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use mgate_common::{ErrorKind, GatewayError, ProviderSettings, SecretValue};
use mgate_engine::{GatewayRegistry, ProviderRuntime, RequestContext, RequestEngine};
use mgate_plugin::{Plugin, PluginContext, PluginPipeline, PreOutcome};
use mgate_provider::{
    AttemptTarget, CapabilitySet, ChatMessage, ChatRole, Choice, FinishReason, GatewayRequest,
    GatewayResponse, Key, KeySelector, ProviderAdapter, RequestInput, RequestParams, ResponseMeta,
    ToolCallRequest, Usage, UpstreamFailure, WireRequest, WireResponse, classify_failure,
};
use mgate_tools::{InMemoryToolSource, ToolManager};
use mgate_worker::{WorkerPool, WorkerPoolConfig};
use tokio_util::sync::CancellationToken;

enum Step {
    Success(GatewayResponse),
    Failure(UpstreamFailure),
}

struct MockAdapter {
    name: String,
    steps: Mutex<VecDeque<Step>>,
    pending: Mutex<Option<GatewayResponse>>,
    invalid_request_status: Option<u16>,
}

impl MockAdapter {
    fn new(name: &str, steps: Vec<Step>) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            steps: Mutex::new(steps.into_iter().collect()),
            pending: Mutex::new(None),
            invalid_request_status: None,
        })
    }
}

#[async_trait]
impl ProviderAdapter for MockAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    fn capabilities(&self) -> CapabilitySet {
        CapabilitySet::all()
    }

    async fn prepare(&self, _request: &GatewayRequest, _key: &Key) -> Result<WireRequest, GatewayError> {
        Ok(WireRequest {
            method: mgate_provider::HttpMethod::Post,
            url: "mock://upstream".to_string(),
            headers: Vec::new(),
            body: Bytes::new(),
        })
    }

    async fn execute(
        &self,
        _wire: WireRequest,
        _deadline: tokio::time::Instant,
        _cancel: CancellationToken,
    ) -> Result<WireResponse, UpstreamFailure> {
        let step = self
            .steps
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Step::Failure(UpstreamFailure::Http {
                status: 500,
                headers: Vec::new(),
                body: Bytes::new(),
            }));
        match step {
            Step::Success(response) => {
                *self.pending.lock().unwrap() = Some(response);
                Ok(WireResponse {
                    status: 200,
                    headers: Vec::new(),
                    body: Bytes::new(),
                })
            }
            Step::Failure(failure) => Err(failure),
        }
    }

    async fn parse(&self, _wire: WireResponse) -> Result<GatewayResponse, GatewayError> {
        Ok(self.pending.lock().unwrap().take().expect("execute always sets pending on success"))
    }

    fn classify(&self, failure: &UpstreamFailure) -> ErrorKind {
        if let (Some(marker), UpstreamFailure::Http { status, .. }) =
            (self.invalid_request_status, failure)
        {
            if *status == marker {
                return ErrorKind::InvalidRequest;
            }
        }
        classify_failure(failure)
    }
}

fn simple_response(provider: &str, tool_calls: Vec<ToolCallRequest>) -> GatewayResponse {
    let finish_reason = if tool_calls.is_empty() {
        FinishReason::Stop
    } else {
        FinishReason::ToolCalls
    };
    GatewayResponse {
        id: format!("{provider}-resp"),
        model: "gpt-4o".to_string(),
        choices: vec![Choice {
            index: 0,
            finish_reason,
            message: ChatMessage {
                role: ChatRole::Assistant,
                content: Some("hello".to_string()),
                tool_calls,
                tool_call_id: None,
            },
        }],
        usage: Usage::default(),
        raw: serde_json::Value::Null,
        meta: ResponseMeta {
            latency: Duration::ZERO,
            attempts: Vec::new(),
            tool_rounds_used: 0,
        },
    }
}

fn settings(name: &str) -> ProviderSettings {
    ProviderSettings {
        name: name.to_string(),
        concurrency: 1,
        queue_depth: 8,
        network_timeout: Duration::from_secs(5),
        max_retries: 0,
        keys: Vec::new(),
    }
}

fn runtime(adapter: Arc<dyn ProviderAdapter>, name: &str) -> ProviderRuntime {
    let key = Key {
        id: 0,
        value: SecretValue::new("test-key"),
        weight: 1.0,
        models_allowlist: Vec::new(),
    };
    let selector = Arc::new(KeySelector::new(vec![key]));
    let worker_pool = Arc::new(WorkerPool::new(
        name.to_string(),
        adapter.clone(),
        WorkerPoolConfig {
            concurrency: 1,
            queue_depth: 8,
            network_timeout: Duration::from_secs(5),
            max_retries: 0,
        },
    ));
    ProviderRuntime {
        adapter,
        selector,
        worker_pool,
        settings: settings(name),
    }
}

fn request() -> GatewayRequest {
    GatewayRequest {
        provider_hint: Some("primary".to_string()),
        model: "gpt-4o".to_string(),
        input: RequestInput::Prompt("hi".to_string()),
        params: RequestParams::default(),
        fallback_chain: vec![AttemptTarget {
            provider: "fallback".to_string(),
            model: "gpt-4o-mini".to_string(),
        }],
    }
}

fn ctx() -> RequestContext {
    RequestContext::new(tokio::time::Instant::now() + Duration::from_secs(5))
}

#[tokio::test]
async fn primary_success_never_touches_fallback() {
    let primary = MockAdapter::new("primary", vec![Step::Success(simple_response("primary", vec![]))]);
    let fallback = MockAdapter::new("fallback", vec![Step::Success(simple_response("fallback", vec![]))]);

    let mut registry = GatewayRegistry::new();
    registry.register("primary", runtime(primary, "primary"));
    registry.register("fallback", runtime(fallback, "fallback"));

    let engine = RequestEngine::new(
        Arc::new(registry),
        Arc::new(PluginPipeline::new(Vec::new())),
        Arc::new(ToolManager::new(Vec::new(), 4, 8)),
    );

    let response = engine.handle(request(), ctx()).await.unwrap();
    assert_eq!(response.meta.attempts.len(), 1);
    assert_eq!(response.meta.attempts[0].provider, "primary");
    assert!(response.meta.attempts[0].ok);
}

#[tokio::test]
async fn retryable_primary_failure_advances_to_fallback() {
    let primary = MockAdapter::new(
        "primary",
        vec![Step::Failure(UpstreamFailure::Http {
            status: 503,
            headers: Vec::new(),
            body: Bytes::new(),
        })],
    );
    let fallback = MockAdapter::new("fallback", vec![Step::Success(simple_response("fallback", vec![]))]);

    let mut registry = GatewayRegistry::new();
    registry.register("primary", runtime(primary, "primary"));
    registry.register("fallback", runtime(fallback, "fallback"));

    let engine = RequestEngine::new(
        Arc::new(registry),
        Arc::new(PluginPipeline::new(Vec::new())),
        Arc::new(ToolManager::new(Vec::new(), 4, 8)),
    );

    let response = engine.handle(request(), ctx()).await.unwrap();
    assert_eq!(response.meta.attempts.len(), 2);
    assert!(!response.meta.attempts[0].ok);
    assert!(response.meta.attempts[1].ok);
    assert_eq!(response.meta.attempts[1].provider, "fallback");
}

#[tokio::test]
async fn non_retryable_invalid_request_on_primary_aborts_chain() {
    let primary = Arc::new(MockAdapter {
        name: "primary".to_string(),
        steps: Mutex::new(
            vec![Step::Failure(UpstreamFailure::Http {
                status: 400,
                headers: Vec::new(),
                body: Bytes::new(),
            })]
            .into_iter()
            .collect(),
        ),
        pending: Mutex::new(None),
        invalid_request_status: Some(400),
    });
    let fallback = MockAdapter::new("fallback", vec![Step::Success(simple_response("fallback", vec![]))]);

    let mut registry = GatewayRegistry::new();
    registry.register("primary", runtime(primary, "primary"));
    registry.register("fallback", runtime(fallback, "fallback"));

    let engine = RequestEngine::new(
        Arc::new(registry),
        Arc::new(PluginPipeline::new(Vec::new())),
        Arc::new(ToolManager::new(Vec::new(), 4, 8)),
    );

    let err = engine.handle(request(), ctx()).await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::InvalidRequest);
    assert_eq!(err.attempts.len(), 1);
}

#[tokio::test]
async fn tool_round_re_enters_same_provider_until_convergence() {
    let call = ToolCallRequest {
        id: "call-1".to_string(),
        name: "search".to_string(),
        arguments: serde_json::json!({"q": "rust"}),
    };
    let primary = MockAdapter::new(
        "primary",
        vec![
            Step::Success(simple_response("primary", vec![call])),
            Step::Success(simple_response("primary", vec![])),
        ],
    );

    let mut registry = GatewayRegistry::new();
    registry.register("primary", runtime(primary, "primary"));

    let tool_source = Arc::new(InMemoryToolSource::new(
        "search-source",
        vec![mgate_provider::ToolSpec {
            name: "search".to_string(),
            description: "search the web".to_string(),
            schema: serde_json::Value::Null,
        }],
    ));
    let tools = ToolManager::new(vec![("search-source".to_string(), tool_source)], 4, 8);

    let engine = RequestEngine::new(
        Arc::new(registry),
        Arc::new(PluginPipeline::new(Vec::new())),
        Arc::new(tools),
    );

    let mut req = request();
    req.fallback_chain.clear();
    let response = engine.handle(req, ctx()).await.unwrap();
    assert!(!response.has_tool_calls());
    assert_eq!(response.meta.tool_rounds_used, 1);
    assert_eq!(response.meta.attempts.len(), 1);
    assert_eq!(response.meta.attempts[0].provider, "primary");
    assert!(response.meta.attempts[0].ok);
}

#[tokio::test]
async fn client_side_execution_opt_out_skips_tool_dispatch() {
    let call = ToolCallRequest {
        id: "call-1".to_string(),
        name: "search".to_string(),
        arguments: serde_json::json!({"q": "rust"}),
    };
    let primary = MockAdapter::new("primary", vec![Step::Success(simple_response("primary", vec![call]))]);

    let mut registry = GatewayRegistry::new();
    registry.register("primary", runtime(primary, "primary"));

    let tool_source = Arc::new(InMemoryToolSource::new(
        "search-source",
        vec![mgate_provider::ToolSpec {
            name: "search".to_string(),
            description: "search the web".to_string(),
            schema: serde_json::Value::Null,
        }],
    ));
    let tools = ToolManager::new(vec![("search-source".to_string(), tool_source)], 4, 8);

    let engine = RequestEngine::new(
        Arc::new(registry),
        Arc::new(PluginPipeline::new(Vec::new())),
        Arc::new(tools),
    );

    let mut req = request();
    req.fallback_chain.clear();
    req.params.client_side_execution = true;
    let response = engine.handle(req, ctx()).await.unwrap();
    assert!(response.has_tool_calls());
    assert_eq!(response.meta.tool_rounds_used, 0);
}

struct ShortCircuitPlugin;

#[async_trait]
impl Plugin for ShortCircuitPlugin {
    fn name(&self) -> &str {
        "short-circuit"
    }

    async fn pre(
        &self,
        _ctx: &PluginContext,
        _request: GatewayRequest,
    ) -> Result<PreOutcome, GatewayError> {
        Ok(PreOutcome::ShortCircuit(simple_response("plugin", vec![])))
    }

    async fn post(
        &self,
        _ctx: &PluginContext,
        response: GatewayResponse,
    ) -> Result<GatewayResponse, GatewayError> {
        Ok(response)
    }
}

#[tokio::test]
async fn plugin_short_circuit_skips_dispatch_entirely() {
    let primary = MockAdapter::new("primary", vec![Step::Success(simple_response("primary", vec![]))]);
    let mut registry = GatewayRegistry::new();
    registry.register("primary", runtime(primary, "primary"));

    let engine = RequestEngine::new(
        Arc::new(registry),
        Arc::new(PluginPipeline::new(vec![Arc::new(ShortCircuitPlugin)])),
        Arc::new(ToolManager::new(Vec::new(), 4, 8)),
    );

    let response = engine.handle(request(), ctx()).await.unwrap();
    assert_eq!(response.id, "plugin-resp");
    assert!(response.meta.attempts.is_empty());
}

#[tokio::test]
async fn cancellation_short_circuits_dispatch() {
    let primary = MockAdapter::new("primary", vec![Step::Success(simple_response("primary", vec![]))]);
    let mut registry = GatewayRegistry::new();
    registry.register("primary", runtime(primary, "primary"));

    let engine = RequestEngine::new(
        Arc::new(registry),
        Arc::new(PluginPipeline::new(Vec::new())),
        Arc::new(ToolManager::new(Vec::new(), 4, 8)),
    );

    let mut context = ctx();
    context.cancel.cancel();
    let err = engine.handle(request(), context).await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::Canceled);
}
