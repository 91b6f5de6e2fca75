//! Tool calling: functions the model may invoke mid-generation.
//!
//! A [`ToolBox`] is built per request. It owns the tools and a call
//! counter; once the counter passes the limit every further invocation
//! fails with [`TaskError::ToolBudgetExceeded`]. Invocation takes `&self`,
//! so a backend can dispatch several calls from one reply concurrently.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;

use crate::error::TaskError;

/// Declaration of a tool as advertised to the model.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    /// Argument schema, in the backend's schema dialect.
    pub parameters: Value,
}

/// A caller-supplied function the model may call.
///
/// Calls can have side effects and may run more than once per request.
#[async_trait]
pub trait Tool: Send + Sync {
    fn spec(&self) -> ToolSpec;

    /// Run the tool with the model's arguments and return a JSON object
    /// to hand back to the model.
    async fn call(&self, args: Value) -> Result<Value, TaskError>;
}

/// The tools available to one generation request, plus its call budget.
pub struct ToolBox {
    tools: Vec<Arc<dyn Tool>>,
    limit: usize,
    calls: AtomicUsize,
}

impl ToolBox {
    /// No tools, no calls allowed.
    pub fn none() -> Self {
        Self::new(0)
    }

    /// An empty box allowing at most `limit` invocations.
    pub fn new(limit: usize) -> Self {
        Self {
            tools: Vec::new(),
            limit,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn with_tool(mut self, tool: impl Tool + 'static) -> Self {
        self.tools.push(Arc::new(tool));
        self
    }

    pub fn specs(&self) -> Vec<ToolSpec> {
        self.tools.iter().map(|t| t.spec()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Invocations attempted so far, including rejected ones.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Invoke the tool called `name`.
    ///
    /// Fails with [`TaskError::ToolBudgetExceeded`] past the limit and with
    /// [`TaskError::GenerationFailure`] for a name that was never offered.
    pub async fn invoke(&self, name: &str, args: Value) -> Result<Value, TaskError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if n > self.limit {
            tracing::warn!(tool = name, limit = self.limit, "tool call budget exhausted");
            return Err(TaskError::ToolBudgetExceeded { limit: self.limit });
        }

        let tool = self
            .tools
            .iter()
            .find(|t| t.spec().name == name)
            .ok_or_else(|| {
                TaskError::GenerationFailure(format!("model requested unknown tool {name:?}"))
            })?;

        tracing::debug!(tool = name, call = n, "invoking tool");
        tool.call(args).await
    }
}

impl std::fmt::Debug for ToolBox {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<String> = self.tools.iter().map(|t| t.spec().name).collect();
        f.debug_struct("ToolBox")
            .field("tools", &names)
            .field("limit", &self.limit)
            .field("calls", &self.calls())
            .finish()
    }
}
