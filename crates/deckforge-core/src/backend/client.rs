use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Deserialize;
use serde_json::Value;

use super::tools::ToolBox;
use super::trait_def::{GeneratedMedia, GenerationBackend, GenerationRequest};
use crate::error::TaskError;
use crate::prompt::Prompt;
use crate::schema::{TaskDefinition, TaskOutput};

/// Timeout and schema enforcement around a [`GenerationBackend`].
///
/// Cheap to clone; clones share the backend.
#[derive(Clone)]
pub struct GenerationClient {
    backend: Arc<dyn GenerationBackend>,
    timeout: Duration,
}

impl GenerationClient {
    pub fn new(backend: Arc<dyn GenerationBackend>, timeout: Duration) -> Self {
        Self { backend, timeout }
    }

    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }

    /// Run task `D` and return its validated output.
    pub async fn generate<D: TaskDefinition>(
        &self,
        prompt: Prompt,
        tools: ToolBox,
    ) -> Result<D::Output, TaskError> {
        let request = GenerationRequest {
            task: D::NAME,
            prompt,
            output_schema: D::output_schema(),
            tools,
        };

        let started = Instant::now();
        let value = self.bounded(self.backend.generate(&request)).await?;
        tracing::debug!(
            task = D::NAME,
            backend = self.backend.name(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            tool_calls = request.tools.calls(),
            "backend replied"
        );

        validate_output::<D>(value)
    }

    /// Request an image. Checking the media is left to the caller.
    pub async fn generate_image(&self, prompt: &str) -> Result<Option<GeneratedMedia>, TaskError> {
        self.bounded(self.backend.generate_image(prompt)).await
    }

    async fn bounded<T>(
        &self,
        call: impl Future<Output = Result<T, TaskError>>,
    ) -> Result<T, TaskError> {
        match tokio::time::timeout(self.timeout, call).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!(
                    backend = self.backend.name(),
                    timeout_ms = self.timeout.as_millis() as u64,
                    "backend call timed out"
                );
                Err(TaskError::Timeout(self.timeout))
            }
        }
    }
}

impl std::fmt::Debug for GenerationClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GenerationClient")
            .field("backend", &self.backend.name())
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Check a raw backend reply against task `D`'s output contract.
///
/// `null` and well-formed but empty replies are treated as "no output". The raw value is only logged at debug
/// level; the error carries a description, never the payload.
pub fn validate_output<D: TaskDefinition>(value: Value) -> Result<D::Output, TaskError> {
    if value.is_null() {
        return Err(TaskError::GenerationFailure(format!(
            "{} produced no output",
            D::NAME
        )));
    }

    let output = match D::Output::deserialize(&value) {
        Ok(output) => output,
        Err(e) => {
            tracing::debug!(task = D::NAME, raw = %value, "output failed to deserialize");
            return Err(TaskError::schema(D::NAME, e.to_string()));
        }
    };

    if output.is_empty() {
        return Err(TaskError::GenerationFailure(format!(
            "{} produced no output",
            D::NAME
        )));
    }

    if let Err(detail) = output.validate() {
        tracing::debug!(task = D::NAME, raw = %value, "output failed validation");
        return Err(TaskError::schema(D::NAME, detail));
    }

    Ok(output)
}
