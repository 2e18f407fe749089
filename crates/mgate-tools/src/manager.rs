use std::collections::HashMap;
use std::sync::Arc;

use futures_util::stream::{self, StreamExt};
use mgate_common::{ErrorKind, GatewayError};
use mgate_provider::{GatewayRequest, ToolCallRequest, ToolSpec};
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::source::{ToolOutcome, ToolSource};

/// Per-request allow/deny filters carried in the auxiliary context map
/// (§6: `mcp-include-sources`, `mcp-exclude-sources`, `mcp-include-tools`,
/// `mcp-exclude-tools`).
#[derive(Debug, Clone, Default)]
pub struct ToolFilter {
    pub include_sources: Vec<String>,
    pub exclude_sources: Vec<String>,
    pub include_tools: Vec<String>,
    pub exclude_tools: Vec<String>,
}

/// Coordinates named tool sources: pre-call discovery/injection and
/// post-call invocation + result merging (§4.6).
pub struct ToolManager {
    sources: Vec<(String, Arc<dyn ToolSource>)>,
    pub round_budget: u32,
    pub concurrency_cap: usize,
}

impl ToolManager {
    pub fn new(sources: Vec<(String, Arc<dyn ToolSource>)>, round_budget: u32, concurrency_cap: usize) -> Self {
        Self {
            sources,
            round_budget,
            concurrency_cap,
        }
    }

    /// Resolves the effective tool set: includes take precedence, excludes
    /// are applied after includes, catalog order is preserved throughout.
    pub async fn effective_tools(
        &self,
        filter: &ToolFilter,
        cancel: CancellationToken,
    ) -> Result<Vec<ToolSpec>, GatewayError> {
        let mut all = Vec::new();
        for (source_name, source) in &self.sources {
            if !filter.include_sources.is_empty() && !filter.include_sources.contains(source_name)
            {
                continue;
            }
            if filter.exclude_sources.contains(source_name) {
                continue;
            }
            let catalog = source.list_tools(cancel.clone()).await.map_err(|e| {
                GatewayError::new(ErrorKind::ToolExecution, format!("source unreachable: {e}"))
            })?;
            all.extend(catalog);
        }

        if !filter.include_tools.is_empty() {
            all.retain(|spec| filter.include_tools.contains(&spec.name));
        }
        all.retain(|spec| !filter.exclude_tools.contains(&spec.name));
        Ok(all)
    }

    /// Pre-augmentation: materializes the effective tool set into the
    /// request's tool parameters.
    pub async fn augment_request(
        &self,
        request: &mut GatewayRequest,
        filter: &ToolFilter,
        cancel: CancellationToken,
    ) -> Result<(), GatewayError> {
        request.params.tools = self.effective_tools(filter, cancel).await?;
        Ok(())
    }

    async fn name_index(
        &self,
        cancel: CancellationToken,
    ) -> Result<HashMap<String, Arc<dyn ToolSource>>, GatewayError> {
        let mut index = HashMap::new();
        for (_, source) in &self.sources {
            let catalog = source.list_tools(cancel.clone()).await.map_err(|e| {
                GatewayError::new(ErrorKind::ToolExecution, format!("source unreachable: {e}"))
            })?;
            for spec in catalog {
                index.insert(spec.name, source.clone());
            }
        }
        Ok(index)
    }

    /// Post-augmentation: dispatches every tool call to its owning source,
    /// bounded by `concurrency_cap` concurrent invocations (§5). Returns
    /// `(tool_call_id, outcome)` pairs in an unspecified order — the caller
    /// re-keys them by id before re-prompting.
    pub async fn execute_tool_calls(
        &self,
        calls: Vec<ToolCallRequest>,
        cancel: CancellationToken,
    ) -> Result<Vec<(String, ToolOutcome)>, GatewayError> {
        let index = Arc::new(self.name_index(cancel.clone()).await?);
        let cap = self.concurrency_cap.max(1);

        let results: Vec<Result<(String, ToolOutcome), GatewayError>> = stream::iter(
            calls.into_iter().map(|call| {
                let index = index.clone();
                let cancel = cancel.clone();
                async move {
                    match index.get(&call.name) {
                        None => {
                            warn!(event = "unknown_tool_call", tool = %call.name, call_id = %call.id);
                            Ok((
                                call.id,
                                ToolOutcome::Failed(format!("unknown tool `{}`", call.name)),
                            ))
                        }
                        Some(source) => match source.invoke(&call, cancel).await {
                            Ok(outcome) => Ok((call.id, outcome)),
                            Err(err) => Err(err),
                        },
                    }
                }
            }),
        )
        .buffer_unordered(cap)
        .collect()
        .await;

        results.into_iter().collect()
    }
}
