use serde::{Deserialize, Serialize};

/// Closed error taxonomy shared by every layer of the gateway.
///
/// Ordering here backs [`ErrorKind::severity`]; do not reorder variants
/// without checking the fallback aggregate logic in `mgate-engine`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Auth,
    InvalidRequest,
    ProviderUnavailable,
    Timeout,
    Upstream5xx,
    RateLimited,
    UpstreamMalformed,
    ToolExecution,
    PluginReject,
    Canceled,
    Internal,
}

impl ErrorKind {
    /// Whether the worker/orchestrator should retry or advance on this kind.
    pub fn is_retryable(self) -> bool {
        matches!(
            self,
            ErrorKind::RateLimited | ErrorKind::Upstream5xx | ErrorKind::ProviderUnavailable
        )
    }

    /// Severity rank used to pick the primary kind of an aggregate fallback
    /// error: `auth > invalid_request > provider_unavailable > timeout >
    /// upstream_5xx > rate_limited`. Kinds outside that explicit chain
    /// (canceled, plugin_reject, tool_execution, upstream_malformed,
    /// internal) never reach the orchestrator's aggregate and sort last.
    pub fn severity(self) -> u8 {
        match self {
            ErrorKind::Auth => 0,
            ErrorKind::InvalidRequest => 1,
            ErrorKind::ProviderUnavailable => 2,
            ErrorKind::Timeout => 3,
            ErrorKind::Upstream5xx => 4,
            ErrorKind::RateLimited => 5,
            ErrorKind::UpstreamMalformed => 6,
            ErrorKind::ToolExecution => 7,
            ErrorKind::PluginReject => 8,
            ErrorKind::Canceled => 9,
            ErrorKind::Internal => 10,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::Auth => "auth",
            ErrorKind::InvalidRequest => "invalid_request",
            ErrorKind::ProviderUnavailable => "provider_unavailable",
            ErrorKind::Timeout => "timeout",
            ErrorKind::Upstream5xx => "upstream_5xx",
            ErrorKind::RateLimited => "rate_limited",
            ErrorKind::UpstreamMalformed => "upstream_malformed",
            ErrorKind::ToolExecution => "tool_execution",
            ErrorKind::PluginReject => "plugin_reject",
            ErrorKind::Canceled => "canceled",
            ErrorKind::Internal => "internal",
        }
    }
}

/// One failed attempt, accreted into a [`GatewayError`]'s `attempts` list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttemptError {
    pub provider: String,
    pub model: String,
    pub kind: ErrorKind,
    pub message: String,
    pub upstream_status: Option<u16>,
}

/// A structured gateway failure. Never bare strings: every layer that can
/// fail produces one of these, carrying enough context to reconstruct why.
#[derive(Debug, Clone, thiserror::Error, Serialize, Deserialize)]
#[error("{kind:?}: {message}")]
pub struct GatewayError {
    pub kind: ErrorKind,
    pub message: String,
    pub retryable: bool,
    pub attempt_index: usize,
    pub provider: Option<String>,
    pub model: Option<String>,
    pub upstream_status: Option<u16>,
    pub body_snippet: Option<String>,
    pub attempts: Vec<AttemptError>,
    /// Set when an `invalid_request` is specifically model-level
    /// incompatibility (§4.7's `model_not_supported` exception) rather
    /// than a malformed request — the orchestrator continues the fallback
    /// chain instead of aborting it.
    pub model_not_supported: bool,
}

impl GatewayError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        let retryable = kind.is_retryable();
        Self {
            kind,
            message: message.into(),
            retryable,
            attempt_index: 0,
            provider: None,
            model: None,
            upstream_status: None,
            body_snippet: None,
            attempts: Vec::new(),
            model_not_supported: false,
        }
    }

    pub fn model_not_supported(mut self) -> Self {
        self.model_not_supported = true;
        self
    }

    pub fn with_provider(mut self, provider: impl Into<String>, model: impl Into<String>) -> Self {
        self.provider = Some(provider.into());
        self.model = Some(model.into());
        self
    }

    pub fn with_upstream_status(mut self, status: u16) -> Self {
        self.upstream_status = Some(status);
        self
    }

    pub fn with_body_snippet(mut self, snippet: impl Into<String>) -> Self {
        self.body_snippet = Some(snippet.into());
        self
    }

    pub fn canceled() -> Self {
        Self::new(ErrorKind::Canceled, "request canceled")
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal, message)
    }

    /// Builds the terminal aggregate error once every entry in a fallback
    /// chain has failed: primary kind is the most severe attempt, per §4.7.
    pub fn aggregate(attempts: Vec<AttemptError>) -> Self {
        let worst = attempts
            .iter()
            .min_by_key(|a| a.kind.severity())
            .expect("aggregate() requires at least one attempt");
        let mut err = Self::new(worst.kind, format!("all {} attempt(s) failed", attempts.len()));
        err.attempt_index = attempts.len().saturating_sub(1);
        err.provider = Some(worst.provider.clone());
        err.model = Some(worst.model.clone());
        err.upstream_status = worst.upstream_status;
        err.attempts = attempts;
        err
    }
}
