//! Task definitions: typed input/output contracts and their validation.
//!
//! Every task has an input struct, an output struct, and a marker type
//! implementing [`TaskDefinition`] that ties them together with the JSON
//! schema handed to the backend. Input validation happens in two stages:
//!
//! 1. [`TaskInput::from_json`] checks that required fields are present and
//!    carry the right JSON type, reporting every problem at once.
//! 2. [`TaskInput::validate`] checks content rules on an already-typed value
//!    (minimum lengths, blank strings, size limits).
//!
//! Outputs are deserialized strictly (unknown fields rejected) and then run
//! through [`TaskOutput::validate`].

use base64::{Engine, engine::general_purpose::STANDARD as BASE64};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use crate::config::Limits;
use crate::error::{FieldError, ValidationError};

// ---------------------------------------------------------------------------
// Traits
// ---------------------------------------------------------------------------

/// A validated request value for one task.
pub trait TaskInput: Sized + Send + Sync {
    /// Build the input from untyped JSON, checking presence and types,
    /// then content rules.
    fn from_json(value: &Value, limits: &Limits) -> Result<Self, ValidationError>;

    /// Check content rules on an already-typed value.
    fn validate(&self, limits: &Limits) -> Result<(), ValidationError>;
}

/// A response value for one task, as produced by the backend.
pub trait TaskOutput: Serialize + DeserializeOwned + Send {
    /// Whether the reply, although well-formed, carries nothing.
    fn is_empty(&self) -> bool {
        false
    }

    /// Semantic checks that serde cannot express. Returns a description
    /// of the first violation.
    fn validate(&self) -> Result<(), String>;
}

/// Pairs an input and output contract under a task name.
pub trait TaskDefinition {
    /// Stable name used in logs and error messages.
    const NAME: &'static str;
    type Input: TaskInput;
    type Output: TaskOutput;

    /// Schema of [`Self::Output`] in the backend's schema dialect.
    fn output_schema() -> Value;
}

// ---------------------------------------------------------------------------
// Field reader
// ---------------------------------------------------------------------------

/// Accumulates presence/type errors while reading a JSON object.
struct Fields<'a> {
    object: Option<&'a Map<String, Value>>,
    errors: Vec<FieldError>,
}

impl<'a> Fields<'a> {
    fn new(value: &'a Value) -> Self {
        match value.as_object() {
            Some(object) => Self {
                object: Some(object),
                errors: Vec::new(),
            },
            None => Self {
                object: None,
                errors: vec![FieldError::new("$", "input must be a JSON object")],
            },
        }
    }

    fn get(&self, name: &str) -> Option<&'a Value> {
        self.object
            .and_then(|o| o.get(name))
            .filter(|v| !v.is_null())
    }

    fn required_str(&mut self, name: &str) -> String {
        if self.object.is_none() {
            return String::new();
        }
        match self.get(name) {
            Some(Value::String(s)) => s.clone(),
            Some(_) => {
                self.errors.push(FieldError::new(name, "must be a string"));
                String::new()
            }
            None => {
                self.errors.push(FieldError::new(name, "is required"));
                String::new()
            }
        }
    }

    fn optional_str(&mut self, name: &str) -> Option<String> {
        match self.get(name) {
            Some(Value::String(s)) => Some(s.clone()),
            Some(_) => {
                self.errors.push(FieldError::new(name, "must be a string"));
                None
            }
            None => None,
        }
    }

    fn optional_turns(&mut self, name: &str) -> Option<Vec<ConversationTurn>> {
        let items = match self.get(name) {
            Some(Value::Array(items)) => items,
            Some(_) => {
                self.errors.push(FieldError::new(name, "must be an array"));
                return None;
            }
            None => return None,
        };

        let mut turns = Vec::with_capacity(items.len());
        for (i, item) in items.iter().enumerate() {
            let Some(obj) = item.as_object() else {
                self.errors
                    .push(FieldError::new(format!("{name}[{i}]"), "must be an object"));
                continue;
            };
            let mut read = |key: &str| match obj.get(key) {
                Some(Value::String(s)) => Some(s.clone()),
                Some(_) => {
                    self.errors.push(FieldError::new(
                        format!("{name}[{i}].{key}"),
                        "must be a string",
                    ));
                    None
                }
                None => {
                    self.errors
                        .push(FieldError::new(format!("{name}[{i}].{key}"), "is required"));
                    None
                }
            };
            let question = read("question");
            let answer = read("answer");
            if let (Some(question), Some(answer)) = (question, answer) {
                turns.push(ConversationTurn { question, answer });
            }
        }
        Some(turns)
    }

    fn finish(self) -> Result<(), ValidationError> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(ValidationError {
                fields: self.errors,
            })
        }
    }
}

// ---------------------------------------------------------------------------
// Content rules
// ---------------------------------------------------------------------------

fn check_non_blank(errors: &mut Vec<FieldError>, field: &str, value: &str, message: &str) {
    if value.trim().is_empty() {
        errors.push(FieldError::new(field, message));
    }
}

fn check_min_chars(errors: &mut Vec<FieldError>, field: &str, value: &str, min: usize) {
    if value.trim().chars().count() < min {
        errors.push(FieldError::new(
            field,
            format!("must be at least {min} characters long"),
        ));
    }
}

fn into_result(errors: Vec<FieldError>) -> Result<(), ValidationError> {
    if errors.is_empty() {
        Ok(())
    } else {
        Err(ValidationError { fields: errors })
    }
}

fn require_text(task: &str, field: &str, value: &str) -> Result<(), String> {
    if value.trim().is_empty() {
        Err(format!("{task}: `{field}` is empty"))
    } else {
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Shared entities
// ---------------------------------------------------------------------------

/// One earlier question/answer exchange, replayed as prompt context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub question: String,
    pub answer: String,
}

/// A single slide. Identity is its position in [`SlidesOutput::slides`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Slide {
    pub title: String,
    pub content: Vec<String>,
    pub speaker_notes: String,
}

// ---------------------------------------------------------------------------
// Slide generation
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SlidesInput {
    pub document_content: String,
}

impl TaskInput for SlidesInput {
    fn from_json(value: &Value, limits: &Limits) -> Result<Self, ValidationError> {
        let mut fields = Fields::new(value);
        let document_content = fields.required_str("documentContent");
        fields.finish()?;
        let input = Self { document_content };
        input.validate(limits)?;
        Ok(input)
    }

    fn validate(&self, limits: &Limits) -> Result<(), ValidationError> {
        let mut errors = Vec::new();
        check_non_blank(
            &mut errors,
            "documentContent",
            &self.document_content,
            "document has no text content",
        );
        let chars = self.document_content.chars().count();
        if chars > limits.max_document_chars {
            errors.push(FieldError::new(
                "documentContent",
                format!(
                    "document is too long ({chars} characters, limit {})",
                    limits.max_document_chars
                ),
            ));
        }
        into_result(errors)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SlidesOutput {
    pub slides: Vec<Slide>,
}

impl TaskOutput for SlidesOutput {
    fn is_empty(&self) -> bool {
        self.slides.is_empty()
    }

    fn validate(&self) -> Result<(), String> {
        for (i, slide) in self.slides.iter().enumerate() {
            if slide.title.trim().is_empty() {
                return Err(format!("slide {i} has an empty title"));
            }
            if slide.content.is_empty() {
                return Err(format!("slide {i} has no content"));
            }
            if let Some(j) = slide.content.iter().position(|c| c.trim().is_empty()) {
                return Err(format!("slide {i} has an empty content line at {j}"));
            }
            if slide.speaker_notes.trim().is_empty() {
                return Err(format!("slide {i} has empty speaker notes"));
            }
        }
        Ok(())
    }
}

/// Document text → ordered slides.
pub struct SlideGeneration;

impl TaskDefinition for SlideGeneration {
    const NAME: &'static str = "generate_slides";
    type Input = SlidesInput;
    type Output = SlidesOutput;

    fn output_schema() -> Value {
        json!({
            "type": "OBJECT",
            "properties": {
                "slides": {
                    "type": "ARRAY",
                    "description": "Slide objects, each with a title, content, and speaker notes.",
                    "items": {
                        "type": "OBJECT",
                        "properties": {
                            "title": {
                                "type": "STRING",
                                "description": "The main title of the slide."
                            },
                            "content": {
                                "type": "ARRAY",
                                "description": "Bullet points or sentences for the slide content.",
                                "items": { "type": "STRING" }
                            },
                            "speakerNotes": {
                                "type": "STRING",
                                "description": "Notes for the presenter for this slide."
                            }
                        },
                        "required": ["title", "content", "speakerNotes"]
                    }
                }
            },
            "required": ["slides"]
        })
    }
}

// ---------------------------------------------------------------------------
// Image generation
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageInput {
    pub prompt: String,
}

impl TaskInput for ImageInput {
    fn from_json(value: &Value, limits: &Limits) -> Result<Self, ValidationError> {
        let mut fields = Fields::new(value);
        let prompt = fields.required_str("prompt");
        fields.finish()?;
        let input = Self { prompt };
        input.validate(limits)?;
        Ok(input)
    }

    fn validate(&self, _limits: &Limits) -> Result<(), ValidationError> {
        let mut errors = Vec::new();
        check_min_chars(&mut errors, "prompt", &self.prompt, 10);
        into_result(errors)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ImageOutput {
    pub image_data_uri: String,
}

impl TaskOutput for ImageOutput {
    fn validate(&self) -> Result<(), String> {
        DataUri::parse(&self.image_data_uri).map(|_| ())
    }
}

/// Free-text prompt → image as a data URI.
pub struct ImageGeneration;

impl TaskDefinition for ImageGeneration {
    const NAME: &'static str = "generate_image";
    type Input = ImageInput;
    type Output = ImageOutput;

    fn output_schema() -> Value {
        json!({
            "type": "OBJECT",
            "properties": {
                "imageDataUri": {
                    "type": "STRING",
                    "description": "The generated image as a data URI: data:<mimetype>;base64,<encoded_data>."
                }
            },
            "required": ["imageDataUri"]
        })
    }
}

/// A parsed `data:<mime>;base64,<payload>` URI holding an image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataUri {
    pub mime_type: String,
    pub payload: String,
}

impl DataUri {
    /// Encode raw bytes as a data URI string.
    pub fn encode(mime_type: &str, bytes: &[u8]) -> String {
        format!("data:{mime_type};base64,{}", BASE64.encode(bytes))
    }

    /// Parse and check an image data URI: the MIME type must be `image/*`
    /// and the payload must be non-empty standard base64.
    pub fn parse(uri: &str) -> Result<Self, String> {
        let rest = uri
            .strip_prefix("data:")
            .ok_or_else(|| "image reference is not a data URI".to_string())?;
        let (header, payload) = rest
            .split_once(',')
            .ok_or_else(|| "data URI has no payload separator".to_string())?;
        let mime_type = header
            .strip_suffix(";base64")
            .ok_or_else(|| "data URI is not base64-encoded".to_string())?;
        let mime_type = mime_type.split(';').next().unwrap_or_default().trim();

        match mime_type.split_once('/') {
            Some(("image", sub)) if !sub.is_empty() => {}
            _ => return Err(format!("data URI has non-image MIME type {mime_type:?}")),
        }

        if payload.is_empty() {
            return Err("data URI payload is empty".to_string());
        }
        BASE64
            .decode(payload)
            .map_err(|e| format!("data URI payload is not valid base64: {e}"))?;

        Ok(Self {
            mime_type: mime_type.to_string(),
            payload: payload.to_string(),
        })
    }
}

// ---------------------------------------------------------------------------
// Presentation tips (chat)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TipsInput {
    pub query: String,
}

impl TaskInput for TipsInput {
    fn from_json(value: &Value, limits: &Limits) -> Result<Self, ValidationError> {
        let mut fields = Fields::new(value);
        let query = fields.required_str("query");
        fields.finish()?;
        let input = Self { query };
        input.validate(limits)?;
        Ok(input)
    }

    fn validate(&self, _limits: &Limits) -> Result<(), ValidationError> {
        let mut errors = Vec::new();
        check_non_blank(&mut errors, "query", &self.query, "message cannot be empty");
        into_result(errors)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TipsOutput {
    pub response: String,
}

impl TaskOutput for TipsOutput {
    fn validate(&self) -> Result<(), String> {
        require_text(PresentationTips::NAME, "response", &self.response)
    }
}

/// Single-turn presentation advice.
pub struct PresentationTips;

impl TaskDefinition for PresentationTips {
    const NAME: &'static str = "presentation_tips";
    type Input = TipsInput;
    type Output = TipsOutput;

    fn output_schema() -> Value {
        json!({
            "type": "OBJECT",
            "properties": {
                "response": {
                    "type": "STRING",
                    "description": "The chatbot response with presentation tips."
                }
            },
            "required": ["response"]
        })
    }
}

// ---------------------------------------------------------------------------
// FAQ answering
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FaqInput {
    pub question: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_data: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_queries: Option<Vec<ConversationTurn>>,
}

impl FaqInput {
    pub fn new(question: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            context_data: None,
            previous_queries: None,
        }
    }
}

impl TaskInput for FaqInput {
    fn from_json(value: &Value, limits: &Limits) -> Result<Self, ValidationError> {
        let mut fields = Fields::new(value);
        let question = fields.required_str("question");
        let context_data = fields.optional_str("contextData");
        let previous_queries = fields.optional_turns("previousQueries");
        fields.finish()?;
        let input = Self {
            question,
            context_data,
            previous_queries,
        };
        input.validate(limits)?;
        Ok(input)
    }

    fn validate(&self, _limits: &Limits) -> Result<(), ValidationError> {
        let mut errors = Vec::new();
        check_min_chars(&mut errors, "question", &self.question, 5);
        into_result(errors)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FaqOutput {
    pub answer: String,
}

impl TaskOutput for FaqOutput {
    fn validate(&self) -> Result<(), String> {
        require_text(FaqAnswering::NAME, "answer", &self.answer)
    }
}

/// Question + optional context and history → answer.
pub struct FaqAnswering;

impl TaskDefinition for FaqAnswering {
    const NAME: &'static str = "answer_question";
    type Input = FaqInput;
    type Output = FaqOutput;

    fn output_schema() -> Value {
        json!({
            "type": "OBJECT",
            "properties": {
                "answer": {
                    "type": "STRING",
                    "description": "The answer to the user question."
                }
            },
            "required": ["answer"]
        })
    }
}

// ---------------------------------------------------------------------------
// Web research
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResearchInput {
    pub topic: String,
}

impl TaskInput for ResearchInput {
    fn from_json(value: &Value, limits: &Limits) -> Result<Self, ValidationError> {
        let mut fields = Fields::new(value);
        let topic = fields.required_str("topic");
        fields.finish()?;
        let input = Self { topic };
        input.validate(limits)?;
        Ok(input)
    }

    fn validate(&self, _limits: &Limits) -> Result<(), ValidationError> {
        let mut errors = Vec::new();
        check_min_chars(&mut errors, "topic", &self.topic, 5);
        into_result(errors)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ResearchOutput {
    pub research_data: String,
}

impl TaskOutput for ResearchOutput {
    fn validate(&self) -> Result<(), String> {
        require_text(WebResearch::NAME, "researchData", &self.research_data)
    }
}

/// Topic → synthesized data and statistics, with optional web search.
pub struct WebResearch;

impl TaskDefinition for WebResearch {
    const NAME: &'static str = "web_research";
    type Input = ResearchInput;
    type Output = ResearchOutput;

    fn output_schema() -> Value {
        json!({
            "type": "OBJECT",
            "properties": {
                "researchData": {
                    "type": "STRING",
                    "description": "The relevant data and statistics gathered for the topic."
                }
            },
            "required": ["researchData"]
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
