use async_trait::async_trait;
use mgate_common::GatewayError;
use mgate_provider::{ToolCallRequest, ToolSpec};
use tokio_util::sync::CancellationToken;

/// The result of executing one tool call. `Failed` is not an error — it's
/// a tool-level failure that becomes a `tool` role message the model sees
/// (§4.6: tool-execution errors are content, not request errors).
#[derive(Debug, Clone)]
pub enum ToolOutcome {
    Ok(String),
    Failed(String),
}

/// An external catalog + executor for callable tools (an MCP client, in
/// spirit). The wire protocol itself (stdio/SSE JSON-RPC framing) is an
/// external collaborator; this trait is the contract the tool manager
/// calls against.
#[async_trait]
pub trait ToolSource: Send + Sync {
    fn name(&self) -> &str;

    /// Lists this source's tool catalog. Returning `Err` means the source
    /// itself is unreachable — a `tool_execution` error (terminal), not a
    /// per-call outcome.
    async fn list_tools(&self, cancel: CancellationToken) -> Result<Vec<ToolSpec>, GatewayError>;

    /// Invokes one tool call. `Err` means the source is unreachable
    /// (terminal); `Ok(ToolOutcome::Failed(..))` means the tool ran and
    /// failed, which becomes tool-message content instead.
    async fn invoke(
        &self,
        call: &ToolCallRequest,
        cancel: CancellationToken,
    ) -> Result<ToolOutcome, GatewayError>;
}
