//! Web search collaborator and the `search_web` tool that exposes it.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Value, json};

use crate::backend::{Tool, ToolSpec};
use crate::error::TaskError;

/// Something that can answer a web search query with a text summary.
#[async_trait]
pub trait SearchProvider: Send + Sync {
    async fn search(&self, query: &str) -> Result<String, TaskError>;
}

/// Placeholder provider returning canned results.
#[derive(Debug, Clone, Copy, Default)]
pub struct StubSearch;

#[async_trait]
impl SearchProvider for StubSearch {
    async fn search(&self, query: &str) -> Result<String, TaskError> {
        tracing::info!(query, "searching the web");
        Ok(stub_results(query))
    }
}

pub fn stub_results(query: &str) -> String {
    format!(
        "Showing results for \"{query}\":\n\n- Result 1...\n- Result 2...\n- Result 3..."
    )
}

/// Tool wrapper handing a [`SearchProvider`] to the model as `search_web`.
#[derive(Clone)]
pub struct SearchTool {
    provider: Arc<dyn SearchProvider>,
}

impl SearchTool {
    pub const NAME: &'static str = "search_web";

    pub fn new(provider: Arc<dyn SearchProvider>) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl Tool for SearchTool {
    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: Self::NAME.to_string(),
            description: "Search the web for current information about a query.".to_string(),
            parameters: json!({
                "type": "OBJECT",
                "properties": {
                    "query": {
                        "type": "STRING",
                        "description": "The search query."
                    }
                },
                "required": ["query"]
            }),
        }
    }

    async fn call(&self, args: Value) -> Result<Value, TaskError> {
        let query = args
            .get("query")
            .and_then(Value::as_str)
            .filter(|q| !q.trim().is_empty())
            .ok_or_else(|| {
                TaskError::GenerationFailure("search_web was called without a query".to_string())
            })?;
        let results = self.provider.search(query).await?;
        Ok(json!({ "results": results }))
    }
}
