use std::sync::Arc;

use mgate_common::GatewayError;
use mgate_provider::{GatewayRequest, GatewayResponse};
use tracing::warn;

use crate::context::PluginContext;
use crate::plugin::{Plugin, PreOutcome};

/// Indices into the pipeline's plugin list whose `pre` ran and returned
/// without error — the exact set whose `post` is entitled to run (P1).
pub type Entered = Vec<usize>;

pub enum PreResult {
    Continued {
        request: GatewayRequest,
        entered: Entered,
    },
    ShortCircuited {
        response: GatewayResponse,
        entered: Entered,
    },
    Rejected {
        error: GatewayError,
        entered: Entered,
    },
}

/// An ordered interceptor stack with short-circuit and reverse-unwind
/// semantics (§4.5). Represented as an explicit index stack rather than
/// relying on call-stack unwinding, per the design note that this should
/// be a mini-stack, not exception-like control flow.
pub struct PluginPipeline {
    plugins: Vec<Arc<dyn Plugin>>,
}

impl PluginPipeline {
    pub fn new(plugins: Vec<Arc<dyn Plugin>>) -> Self {
        Self { plugins }
    }

    /// Runs pre-hooks in registration order. Stops at the first
    /// short-circuit or rejection; tracks exactly which plugins are
    /// entitled to a matching `post`.
    pub async fn run_pre(&self, ctx: &PluginContext, request: GatewayRequest) -> PreResult {
        let mut entered = Entered::new();
        let mut request = request;

        for (idx, plugin) in self.plugins.iter().enumerate() {
            match plugin.pre(ctx, request).await {
                Ok(PreOutcome::Continue(next)) => {
                    entered.push(idx);
                    request = next;
                }
                Ok(PreOutcome::ShortCircuit(response)) => {
                    entered.push(idx);
                    return PreResult::ShortCircuited { response, entered };
                }
                Err(error) => {
                    // This plugin's own pre errored, so its post must not
                    // run (P1) — only plugins entered before it unwind.
                    return PreResult::Rejected { error, entered };
                }
            }
        }

        PreResult::Continued { request, entered }
    }

    /// Runs post-hooks for `entered` in strict reverse order (P2). Post
    /// failures are logged and swallowed; the response at that hook
    /// passes through unchanged to the next plugin (§4.5, §7).
    pub async fn run_post(
        &self,
        ctx: &PluginContext,
        entered: &Entered,
        response: GatewayResponse,
    ) -> GatewayResponse {
        let mut response = response;
        for &idx in entered.iter().rev() {
            let plugin = &self.plugins[idx];
            match plugin.post(ctx, response.clone()).await {
                Ok(next) => response = next,
                Err(error) => {
                    warn!(
                        event = "plugin_post_error",
                        plugin = plugin.name(),
                        trace_id = %ctx.trace_id,
                        error = %error,
                        "post hook failed, passing response through unchanged"
                    );
                }
            }
        }
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use mgate_common::ErrorKind;
    use mgate_provider::{ChatMessage, FinishReason, RequestInput, RequestParams, ResponseMeta, Usage};
    use std::sync::Mutex as StdMutex;
    use tokio_util::sync::CancellationToken;

    fn request() -> GatewayRequest {
        GatewayRequest {
            provider_hint: None,
            model: "gpt-4o".into(),
            input: RequestInput::Prompt("hi".into()),
            params: RequestParams::default(),
            fallback_chain: Vec::new(),
        }
    }

    fn response() -> GatewayResponse {
        GatewayResponse {
            id: "resp-1".into(),
            model: "gpt-4o".into(),
            choices: vec![mgate_provider::Choice {
                index: 0,
                finish_reason: FinishReason::Stop,
                message: ChatMessage::default(),
            }],
            usage: Usage::default(),
            raw: serde_json::Value::Null,
            meta: ResponseMeta {
                latency: std::time::Duration::ZERO,
                attempts: Vec::new(),
                tool_rounds_used: 0,
            },
        }
    }

    fn ctx() -> PluginContext {
        PluginContext {
            trace_id: "t1".into(),
            cancel: CancellationToken::new(),
        }
    }

    struct Recording {
        name: &'static str,
        log: Arc<StdMutex<Vec<String>>>,
        reject_on_pre: bool,
        short_circuit: bool,
    }

    #[async_trait]
    impl Plugin for Recording {
        fn name(&self) -> &str {
            self.name
        }

        async fn pre(
            &self,
            _ctx: &PluginContext,
            request: GatewayRequest,
        ) -> Result<PreOutcome, GatewayError> {
            self.log.lock().unwrap().push(format!("pre:{}", self.name));
            if self.reject_on_pre {
                return Err(GatewayError::new(ErrorKind::PluginReject, "rejected"));
            }
            if self.short_circuit {
                return Ok(PreOutcome::ShortCircuit(response()));
            }
            Ok(PreOutcome::Continue(request))
        }

        async fn post(
            &self,
            _ctx: &PluginContext,
            response: GatewayResponse,
        ) -> Result<GatewayResponse, GatewayError> {
            self.log.lock().unwrap().push(format!("post:{}", self.name));
            Ok(response)
        }
    }

    fn plugin(name: &'static str, log: Arc<StdMutex<Vec<String>>>) -> Arc<dyn Plugin> {
        Arc::new(Recording {
            name,
            log,
            reject_on_pre: false,
            short_circuit: false,
        })
    }

    #[tokio::test]
    async fn post_order_is_strict_reverse_of_pre() {
        let log = Arc::new(StdMutex::new(Vec::new()));
        let pipeline = PluginPipeline::new(vec![
            plugin("P1", log.clone()),
            plugin("P2", log.clone()),
            plugin("P3", log.clone()),
        ]);

        let PreResult::Continued { request: _, entered } = pipeline.run_pre(&ctx(), request()).await
        else {
            panic!("expected Continued");
        };
        pipeline.run_post(&ctx(), &entered, response()).await;

        assert_eq!(
            *log.lock().unwrap(),
            vec!["pre:P1", "pre:P2", "pre:P3", "post:P3", "post:P2", "post:P1"]
        );
    }

    #[tokio::test]
    async fn short_circuit_skips_remaining_pre_but_unwinds_entered_posts() {
        let log = Arc::new(StdMutex::new(Vec::new()));
        let p2 = Arc::new(Recording {
            name: "P2",
            log: log.clone(),
            reject_on_pre: false,
            short_circuit: true,
        });
        let pipeline = PluginPipeline::new(vec![plugin("P1", log.clone()), p2, plugin("P3", log.clone())]);

        let PreResult::ShortCircuited { response, entered } = pipeline.run_pre(&ctx(), request()).await
        else {
            panic!("expected ShortCircuited");
        };
        pipeline.run_post(&ctx(), &entered, response).await;

        assert_eq!(
            *log.lock().unwrap(),
            vec!["pre:P1", "pre:P2", "post:P2", "post:P1"]
        );
    }

    #[tokio::test]
    async fn reject_unwinds_only_previously_entered_plugins() {
        let log = Arc::new(StdMutex::new(Vec::new()));
        let p2 = Arc::new(Recording {
            name: "P2",
            log: log.clone(),
            reject_on_pre: true,
            short_circuit: false,
        });
        let pipeline = PluginPipeline::new(vec![plugin("P1", log.clone()), p2, plugin("P3", log.clone())]);

        let PreResult::Rejected { error, entered } = pipeline.run_pre(&ctx(), request()).await else {
            panic!("expected Rejected");
        };
        assert_eq!(error.kind, ErrorKind::PluginReject);
        pipeline.run_post(&ctx(), &entered, response()).await;

        assert_eq!(*log.lock().unwrap(), vec!["pre:P1", "pre:P2", "post:P1"]);
    }
}
