//! Server actions: the error boundary between callers and the flows.
//!
//! Every action takes raw JSON, parses and validates it into the task's
//! input type, runs the flow, and either returns the output unchanged or a
//! generic [`ActionFailure`]. This is the only place a [`TaskError`] is
//! caught; the full error is logged here and never shown to the caller,
//! except for validation problems, which the caller can fix.

use std::future::Future;

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tracing::Instrument;
use uuid::Uuid;

use crate::config::Limits;
use crate::error::{ErrorKind, TaskError, ValidationError};
use crate::flows::{self, FlowContext};
use crate::ingest::{self, IngestError};
use crate::schema::{
    FaqOutput, ImageOutput, ResearchOutput, SlidesInput, SlidesOutput, TaskInput, TipsOutput,
};

/// User-facing operations exposed by the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    GenerateSlides,
    GenerateImage,
    Research,
    Chat,
    Faq,
}

impl Action {
    pub const ALL: [Action; 5] = [
        Action::GenerateSlides,
        Action::GenerateImage,
        Action::Research,
        Action::Chat,
        Action::Faq,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::GenerateSlides => "generateSlides",
            Self::GenerateImage => "generateImage",
            Self::Research => "research",
            Self::Chat => "chat",
            Self::Faq => "faq",
        }
    }

    /// Message shown for any failure other than invalid input.
    pub fn failure_message(&self) -> &'static str {
        match self {
            Self::GenerateSlides => "Failed to generate slides. Please try again.",
            Self::GenerateImage => "Failed to generate image. Please try again.",
            Self::Research => "Failed to perform research. Please try again.",
            Self::Chat => "Failed to get a response. Please try again.",
            Self::Faq => "Failed to get an answer. Please try again.",
        }
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// What a caller sees when an action fails. Serializes as `{"error": ...}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Error)]
#[error("{message}")]
pub struct ActionFailure {
    #[serde(skip)]
    pub kind: ErrorKind,
    #[serde(rename = "error")]
    pub message: String,
}

impl ActionFailure {
    /// Render `err` for the caller of `action`.
    pub fn from_task_error(action: Action, err: &TaskError) -> Self {
        let message = match err {
            TaskError::Validation(v) => v.to_string(),
            _ => action.failure_message().to_string(),
        };
        Self {
            kind: err.kind(),
            message,
        }
    }
}

pub type ActionResult<T> = Result<T, ActionFailure>;

/// Wire form of an [`ActionResult`]: the output itself, or `{"error": ...}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ActionResponse<T> {
    Success(T),
    Failure(ActionFailure),
}

impl<T> From<ActionResult<T>> for ActionResponse<T> {
    fn from(result: ActionResult<T>) -> Self {
        match result {
            Ok(output) => Self::Success(output),
            Err(failure) => Self::Failure(failure),
        }
    }
}

/// Message shown when an uploaded file cannot be read.
pub const INGEST_FAILURE_MESSAGE: &str =
    "There was an issue extracting content from the Word document.";

/// The set of server actions over one shared [`FlowContext`].
#[derive(Debug, Clone)]
pub struct Actions {
    ctx: FlowContext,
}

impl Actions {
    pub fn new(ctx: FlowContext) -> Self {
        Self { ctx }
    }

    pub fn context(&self) -> &FlowContext {
        &self.ctx
    }

    pub fn limits(&self) -> &Limits {
        &self.ctx.limits
    }

    pub async fn generate_slides(&self, input: &Value) -> ActionResult<SlidesOutput> {
        self.run(Action::GenerateSlides, input, flows::generate_slides)
            .await
    }

    pub async fn generate_image(&self, input: &Value) -> ActionResult<ImageOutput> {
        self.run(Action::GenerateImage, input, flows::generate_image)
            .await
    }

    pub async fn research(&self, input: &Value) -> ActionResult<ResearchOutput> {
        self.run(Action::Research, input, flows::web_research).await
    }

    pub async fn chat(&self, input: &Value) -> ActionResult<TipsOutput> {
        self.run(Action::Chat, input, flows::presentation_tips)
            .await
    }

    pub async fn faq(&self, input: &Value) -> ActionResult<FaqOutput> {
        self.run(Action::Faq, input, flows::answer_question).await
    }

    /// Extract text from an uploaded file and turn it into slides.
    pub async fn slides_from_document(
        &self,
        filename: &str,
        bytes: &[u8],
    ) -> ActionResult<SlidesOutput> {
        let max_chars = self.ctx.limits.max_document_chars;
        let text = match ingest::extract_text(filename, bytes, max_chars) {
            Ok(text) => text,
            Err(e @ IngestError::TooLarge { .. }) => {
                let err = ValidationError::single(
                    "documentContent",
                    format!("document is too long ({e})"),
                );
                return self
                    .execute(
                        Action::GenerateSlides,
                        Err(TaskError::from(err)),
                        flows::generate_slides,
                    )
                    .await;
            }
            Err(e) => {
                tracing::error!(filename, error = %e, "document ingestion failed");
                return Err(ActionFailure {
                    kind: ErrorKind::Validation,
                    message: INGEST_FAILURE_MESSAGE.to_string(),
                });
            }
        };

        let input = SlidesInput {
            document_content: text,
        };
        self.execute(Action::GenerateSlides, Ok(input), flows::generate_slides)
            .await
    }

    async fn run<'a, I, O, F, Fut>(&'a self, action: Action, raw: &Value, flow: F) -> ActionResult<O>
    where
        I: TaskInput,
        F: FnOnce(&'a FlowContext, I) -> Fut,
        Fut: Future<Output = Result<O, TaskError>>,
    {
        let input = I::from_json(raw, &self.ctx.limits).map_err(TaskError::from);
        self.execute(action, input, flow).await
    }

    async fn execute<'a, I, O, F, Fut>(
        &'a self,
        action: Action,
        input: Result<I, TaskError>,
        flow: F,
    ) -> ActionResult<O>
    where
        F: FnOnce(&'a FlowContext, I) -> Fut,
        Fut: Future<Output = Result<O, TaskError>>,
    {
        let request_id = Uuid::new_v4();
        let span = tracing::info_span!("action", action = action.name(), %request_id);

        async move {
            let result = match input {
                Ok(input) => flow(&self.ctx, input).await,
                Err(e) => Err(e),
            };

            match result {
                Ok(output) => {
                    tracing::info!("action succeeded");
                    Ok(output)
                }
                Err(err) => {
                    let kind = err.kind();
                    if kind == ErrorKind::Validation {
                        tracing::warn!(%kind, error = %err, "action rejected input");
                    } else {
                        tracing::error!(%kind, error = %err, "action failed");
                    }
                    Err(ActionFailure::from_task_error(action, &err))
                }
            }
        }
        .instrument(span)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ValidationError;
    use serde_json::json;
    use std::time::Duration;

    #[test]
    fn failure_serializes_as_error_object() {
        let failure = ActionFailure::from_task_error(
            Action::GenerateImage,
            &TaskError::GenerationFailure("no media".into()),
        );
        assert_eq!(
            serde_json::to_value(&failure).unwrap(),
            json!({ "error": "Failed to generate image. Please try again." })
        );
        assert_eq!(failure.kind, ErrorKind::GenerationFailure);
    }

    #[test]
    fn validation_failures_keep_field_message() {
        let err = TaskError::Validation(ValidationError::single("topic", "is required"));
        let failure = ActionFailure::from_task_error(Action::Research, &err);
        assert!(failure.message.contains("topic"));
        assert_eq!(failure.kind, ErrorKind::Validation);
    }

    #[test]
    fn internal_details_are_hidden() {
        let err = TaskError::Timeout(Duration::from_secs(60));
        let failure = ActionFailure::from_task_error(Action::Chat, &err);
        assert_eq!(failure.message, "Failed to get a response. Please try again.");

        let err = TaskError::schema("answer_question", "unknown field `secret`");
        let failure = ActionFailure::from_task_error(Action::Faq, &err);
        assert!(!failure.message.contains("secret"));
    }

    #[test]
    fn response_is_untagged() {
        let ok: ActionResponse<TipsOutput> = Ok(TipsOutput {
            response: "Breathe.".into(),
        })
        .into();
        assert_eq!(serde_json::to_value(&ok).unwrap(), json!({ "response": "Breathe." }));

        let err: ActionResponse<TipsOutput> = Err(ActionFailure {
            kind: ErrorKind::Timeout,
            message: "Failed to get a response. Please try again.".into(),
        })
        .into();
        assert_eq!(
            serde_json::to_value(&err).unwrap(),
            json!({ "error": "Failed to get a response. Please try again." })
        );
    }

    #[test]
    fn every_action_has_a_distinct_message() {
        let mut seen = std::collections::HashSet::new();
        for action in Action::ALL {
            assert!(action.failure_message().ends_with("Please try again."));
            assert!(seen.insert(action.failure_message()));
        }
    }
}
