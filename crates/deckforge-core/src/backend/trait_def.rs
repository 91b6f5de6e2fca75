//! The `GenerationBackend` trait -- the adapter interface for model providers.
//!
//! Each concrete backend (the Gemini REST API, test doubles) implements this
//! trait. The trait is object-safe so it can be shared as
//! `Arc<dyn GenerationBackend>` across concurrent requests.

use async_trait::async_trait;
use serde_json::Value;

use super::tools::ToolBox;
use crate::error::TaskError;
use crate::prompt::Prompt;

/// Everything a backend needs for one structured completion.
pub struct GenerationRequest {
    /// Name of the task, for logs and error messages.
    pub task: &'static str,
    pub prompt: Prompt,
    /// Schema the reply must follow.
    pub output_schema: Value,
    /// Tools the model may call. Empty for most tasks.
    pub tools: ToolBox,
}

impl std::fmt::Debug for GenerationRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GenerationRequest")
            .field("task", &self.task)
            .field("prompt", &self.prompt)
            .field("tools", &self.tools)
            .finish_non_exhaustive()
    }
}

/// Media produced by an image call.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct GeneratedMedia {
    /// A URL for the media; a `data:` URI for inline payloads.
    pub url: Option<String>,
}

/// Adapter interface for a hosted generative model.
///
/// Implementations must either return output that follows the request's
/// schema or fail. They must not retry on their own, and they must route
/// every tool call through [`GenerationRequest::tools`] so the per-request
/// bound holds.
#[async_trait]
pub trait GenerationBackend: Send + Sync {
    /// Human-readable name for this backend (e.g. "gemini").
    fn name(&self) -> &str;

    /// Run a structured completion and return the model's JSON reply.
    ///
    /// `Value::Null` means the model produced nothing usable.
    async fn generate(&self, request: &GenerationRequest) -> Result<Value, TaskError>;

    /// Generate an image from a text prompt. `Ok(None)` when the backend
    /// answered but produced no media.
    async fn generate_image(&self, prompt: &str) -> Result<Option<GeneratedMedia>, TaskError>;
}

// Compile-time assertion: GenerationBackend must be object-safe.
const _: () = {
    fn _assert_object_safe(_: &dyn GenerationBackend) {}
};
