use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use mgate_common::GatewayError;
use mgate_provider::{ToolCallRequest, ToolSpec};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use crate::source::{ToolOutcome, ToolSource};

/// A reference in-process [`ToolSource`] used by tests and as a template
/// for real MCP-backed implementations: a fixed catalog plus a map of
/// canned results keyed by tool name.
pub struct InMemoryToolSource {
    name: String,
    catalog: Vec<ToolSpec>,
    results: Arc<Mutex<HashMap<String, ToolOutcome>>>,
}

impl InMemoryToolSource {
    pub fn new(name: impl Into<String>, catalog: Vec<ToolSpec>) -> Self {
        Self {
            name: name.into(),
            catalog,
            results: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub async fn set_result(&self, tool_name: impl Into<String>, outcome: ToolOutcome) {
        self.results.lock().await.insert(tool_name.into(), outcome);
    }
}

#[async_trait]
impl ToolSource for InMemoryToolSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn list_tools(&self, _cancel: CancellationToken) -> Result<Vec<ToolSpec>, GatewayError> {
        Ok(self.catalog.clone())
    }

    async fn invoke(
        &self,
        call: &ToolCallRequest,
        _cancel: CancellationToken,
    ) -> Result<ToolOutcome, GatewayError> {
        let results = self.results.lock().await;
        Ok(results
            .get(&call.name)
            .cloned()
            .unwrap_or_else(|| ToolOutcome::Failed(format!("no canned result for {}", call.name))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manager::{ToolFilter, ToolManager};

    fn spec(name: &str) -> ToolSpec {
        ToolSpec {
            name: name.to_string(),
            description: String::new(),
            schema: serde_json::json!({}),
        }
    }

    #[tokio::test]
    async fn effective_tools_respects_include_then_exclude() {
        let source = Arc::new(InMemoryToolSource::new(
            "search",
            vec![spec("web_search"), spec("file_read"), spec("shell_exec")],
        ));
        let manager = ToolManager::new(vec![("search".to_string(), source)], 4, 8);

        let filter = ToolFilter {
            include_tools: vec!["web_search".to_string(), "shell_exec".to_string()],
            exclude_tools: vec!["shell_exec".to_string()],
            ..Default::default()
        };
        let tools = manager
            .effective_tools(&filter, CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(tools.len(), 1);
        assert_eq!(tools[0].name, "web_search");
    }

    #[tokio::test]
    async fn execute_tool_calls_dispatches_to_owning_source() {
        let source = Arc::new(InMemoryToolSource::new("calc", vec![spec("add")]));
        source.set_result("add", ToolOutcome::Ok("42".to_string())).await;
        let manager = ToolManager::new(vec![("calc".to_string(), source)], 4, 8);

        let call = ToolCallRequest {
            id: "call-1".to_string(),
            name: "add".to_string(),
            arguments: serde_json::json!({"a": 40, "b": 2}),
        };
        let results = manager
            .execute_tool_calls(vec![call], CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(results.len(), 1);
        assert!(matches!(&results[0].1, ToolOutcome::Ok(s) if s == "42"));
    }

    #[tokio::test]
    async fn unknown_tool_surfaces_as_failed_outcome_not_error() {
        let manager = ToolManager::new(Vec::new(), 4, 8);
        let call = ToolCallRequest {
            id: "call-2".to_string(),
            name: "mystery".to_string(),
            arguments: serde_json::Value::Null,
        };
        let results = manager
            .execute_tool_calls(vec![call], CancellationToken::new())
            .await
            .unwrap();
        assert!(matches!(&results[0].1, ToolOutcome::Failed(_)));
    }
}
