use std::time::Duration;

use mgate_common::ErrorKind;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatRole {
    System,
    User,
    Assistant,
    Tool,
}

/// One emitted or requested tool call. `arguments` stays opaque JSON —
/// adapters are the only code that interprets provider-specific shapes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCallRequest {
    pub id: String,
    pub name: String,
    pub arguments: serde_json::Value,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: Option<String>,
    #[serde(default)]
    pub tool_calls: Vec<ToolCallRequest>,
    /// Set when this message is a tool-result message (§4.6 post-augmentation).
    pub tool_call_id: Option<String>,
}

impl Default for ChatRole {
    fn default() -> Self {
        ChatRole::User
    }
}

/// A tool advertised to the model, materialized from the tool manager's
/// effective catalog (§4.6) into the request's parameter bag.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    pub schema: serde_json::Value,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolChoicePolicy {
    #[default]
    Auto,
    None,
    Required,
    Named(String),
}

#[derive(Debug, Clone)]
pub enum RequestInput {
    Messages(Vec<ChatMessage>),
    Prompt(String),
}

/// Bounded option bag plus a provider-keyed extras bag (§9 "dynamic request
/// shape"): the engine never inspects `extras`, only adapters read it.
#[derive(Debug, Clone, Default)]
pub struct RequestParams {
    pub temperature: Option<f32>,
    pub top_p: Option<f32>,
    pub max_tokens: Option<u32>,
    pub stop: Vec<String>,
    pub tools: Vec<ToolSpec>,
    pub tool_choice: ToolChoicePolicy,
    /// Whether the caller wants tool calls executed by the gateway itself
    /// (§4.6 `client_side_execution`); `true` opts the caller out.
    pub client_side_execution: bool,
    pub extras: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttemptTarget {
    pub provider: String,
    pub model: String,
}

/// The normalized request envelope (§3 Request). Immutable once the engine
/// begins executing it except via a plugin pre-hook replacement (I3).
#[derive(Debug, Clone)]
pub struct GatewayRequest {
    pub provider_hint: Option<String>,
    pub model: String,
    pub input: RequestInput,
    pub params: RequestParams,
    pub fallback_chain: Vec<AttemptTarget>,
}

impl GatewayRequest {
    /// The full attempt chain: the primary target first, then fallbacks,
    /// per I3 this is computed once and never mutated by the engine.
    pub fn attempt_chain(&self) -> Vec<AttemptTarget> {
        let primary = AttemptTarget {
            provider: self
                .provider_hint
                .clone()
                .unwrap_or_else(|| "default".to_string()),
            model: self.model.clone(),
        };
        std::iter::once(primary)
            .chain(self.fallback_chain.iter().cloned())
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    Stop,
    Length,
    ToolCalls,
    ContentFilter,
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Choice {
    pub index: u32,
    pub finish_reason: FinishReason,
    pub message: ChatMessage,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// One row of the response's attempt trail, accumulated by the fallback
/// orchestrator; distinct from `mgate_common::AttemptError`, which only
/// carries failed attempts — this records every attempt, ok or not.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttemptRecord {
    pub provider: String,
    pub model: String,
    pub ok: bool,
    pub kind: Option<ErrorKind>,
    pub upstream_status: Option<u16>,
}

#[derive(Debug, Clone)]
pub struct ResponseMeta {
    pub latency: Duration,
    pub attempts: Vec<AttemptRecord>,
    pub tool_rounds_used: u32,
}

#[derive(Debug, Clone)]
pub struct GatewayResponse {
    pub id: String,
    pub model: String,
    pub choices: Vec<Choice>,
    pub usage: Usage,
    pub raw: serde_json::Value,
    pub meta: ResponseMeta,
}

impl GatewayResponse {
    pub fn tool_calls(&self) -> Vec<&ToolCallRequest> {
        self.choices
            .iter()
            .flat_map(|c| c.message.tool_calls.iter())
            .collect()
    }

    pub fn has_tool_calls(&self) -> bool {
        self.choices
            .iter()
            .any(|c| !c.message.tool_calls.is_empty())
    }
}
