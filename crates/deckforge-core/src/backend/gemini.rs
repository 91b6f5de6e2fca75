//! Gemini backend adapter.
//!
//! Talks to the Generative Language REST API:
//! `models/{model}:generateContent` for structured text (with an optional
//! function-calling loop) and `models/{model}:predict` for Imagen images.

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{Value, json};
use tracing::{debug, warn};

use super::trait_def::{GeneratedMedia, GenerationBackend, GenerationRequest};
use crate::config::BackendConfig;
use crate::error::TaskError;

const API_KEY_HEADER: &str = "x-goog-api-key";
const DEFAULT_IMAGE_MIME: &str = "image/png";
/// Longest slice of an error body kept in error messages.
const ERROR_SNIPPET_LEN: usize = 512;

/// Backend for Google's Generative Language API.
#[derive(Clone)]
pub struct GeminiBackend {
    http: Client,
    config: BackendConfig,
}

impl std::fmt::Debug for GeminiBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiBackend")
            .field("config", &self.config)
            .finish()
    }
}

impl GeminiBackend {
    pub fn new(config: BackendConfig) -> Self {
        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .unwrap_or_else(|_| Client::new());
        Self { http, config }
    }

    fn endpoint(&self, model: &str, method: &str) -> String {
        format!("{}/models/{model}:{method}", self.config.base_url)
    }

    async fn post(&self, url: &str, body: &Value) -> Result<Value, TaskError> {
        let response = self
            .http
            .post(url)
            .header(API_KEY_HEADER, &self.config.api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| TaskError::BackendUnavailable(format!("request to {url} failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            warn!(%status, url, "backend returned an error status");
            return Err(TaskError::BackendUnavailable(format!(
                "backend returned {status}: {}",
                snippet(&text)
            )));
        }

        response
            .json::<Value>()
            .await
            .map_err(|e| TaskError::GenerationFailure(format!("unreadable response body: {e}")))
    }
}

#[async_trait]
impl GenerationBackend for GeminiBackend {
    fn name(&self) -> &str {
        "gemini"
    }

    async fn generate(&self, request: &GenerationRequest) -> Result<Value, TaskError> {
        let url = self.endpoint(&self.config.text_model, "generateContent");
        let mut contents = vec![json!({
            "role": "user",
            "parts": [{ "text": request.prompt.user }]
        })];

        loop {
            let body = build_generate_body(request, &contents);
            let reply = self.post(&url, &body).await?;

            match parse_reply(&reply)? {
                Reply::Text(text) => return parse_json_text(request.task, &text),
                Reply::FunctionCalls { content, calls } => {
                    debug!(task = request.task, calls = calls.len(), "model requested tools");
                    contents.push(content);
                    let mut parts = Vec::with_capacity(calls.len());
                    for call in calls {
                        let result = request.tools.invoke(&call.name, call.args).await?;
                        parts.push(json!({
                            "functionResponse": { "name": call.name, "response": result }
                        }));
                    }
                    contents.push(json!({ "role": "user", "parts": parts }));
                }
            }
        }
    }

    async fn generate_image(&self, prompt: &str) -> Result<Option<GeneratedMedia>, TaskError> {
        let url = self.endpoint(&self.config.image_model, "predict");
        let body = json!({
            "instances": [{ "prompt": prompt }],
            "parameters": { "sampleCount": 1 }
        });
        let reply = self.post(&url, &body).await?;
        Ok(parse_image_reply(&reply))
    }
}

// ---------------------------------------------------------------------------
// Request / response mapping
// ---------------------------------------------------------------------------

/// A function call requested by the model.
#[derive(Debug, Clone, PartialEq)]
struct FunctionCall {
    name: String,
    args: Value,
}

/// What one `generateContent` reply asks us to do next.
#[derive(Debug, Clone, PartialEq)]
enum Reply {
    /// Final answer text.
    Text(String),
    /// Run these tools, then send the model content back with the results.
    FunctionCalls {
        content: Value,
        calls: Vec<FunctionCall>,
    },
}

/// Build a `generateContent` body.
///
/// Without tools the schema goes into `generationConfig.responseSchema`.
/// The API does not combine function calling with a response schema, so
/// with tools the schema is spelled out in the system instruction instead.
fn build_generate_body(request: &GenerationRequest, contents: &[Value]) -> Value {
    let mut system = request.prompt.system.clone();
    let mut body = json!({ "contents": contents });

    if request.tools.is_empty() {
        body["generationConfig"] = json!({
            "responseMimeType": "application/json",
            "responseSchema": request.output_schema,
        });
    } else {
        let declarations: Vec<Value> = request
            .tools
            .specs()
            .into_iter()
            .map(|s| {
                json!({
                    "name": s.name,
                    "description": s.description,
                    "parameters": s.parameters,
                })
            })
            .collect();
        body["tools"] = json!([{ "functionDeclarations": declarations }]);

        let schema = serde_json::to_string_pretty(&request.output_schema)
            .unwrap_or_else(|_| request.output_schema.to_string());
        system.push_str(
            "\n\nWhen you are done, reply with a single JSON object and nothing else. \
             It must follow this schema:\n",
        );
        system.push_str(&schema);
    }

    body["systemInstruction"] = json!({ "parts": [{ "text": system }] });
    body
}

fn parse_reply(body: &Value) -> Result<Reply, TaskError> {
    let Some(candidate) = body
        .get("candidates")
        .and_then(Value::as_array)
        .and_then(|c| c.first())
    else {
        let reason = body
            .pointer("/promptFeedback/blockReason")
            .and_then(Value::as_str);
        return Err(TaskError::GenerationFailure(match reason {
            Some(r) => format!("prompt was blocked ({r})"),
            None => "response contained no candidates".to_string(),
        }));
    };

    let content = candidate.get("content").cloned().unwrap_or(Value::Null);
    let parts = content
        .get("parts")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();

    let calls: Vec<FunctionCall> = parts
        .iter()
        .filter_map(|p| p.get("functionCall"))
        .filter_map(|fc| {
            let name = fc.get("name")?.as_str()?.to_string();
            let args = fc.get("args").cloned().unwrap_or_else(|| json!({}));
            Some(FunctionCall { name, args })
        })
        .collect();

    if !calls.is_empty() {
        return Ok(Reply::FunctionCalls { content, calls });
    }

    let text: String = parts
        .iter()
        .filter_map(|p| p.get("text").and_then(Value::as_str))
        .collect();

    if text.trim().is_empty() {
        let finish = candidate
            .get("finishReason")
            .and_then(Value::as_str)
            .unwrap_or("unknown");
        return Err(TaskError::GenerationFailure(format!(
            "model returned no text (finish reason: {finish})"
        )));
    }

    Ok(Reply::Text(text))
}

/// Parse the model's final text as JSON, tolerating a Markdown code fence.
fn parse_json_text(task: &'static str, text: &str) -> Result<Value, TaskError> {
    let trimmed = text.trim();
    let unfenced = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|rest| rest.strip_suffix("```"))
        .unwrap_or(trimmed);

    serde_json::from_str(unfenced.trim())
        .map_err(|e| TaskError::schema(task, format!("model reply is not valid JSON: {e}")))
}

fn parse_image_reply(body: &Value) -> Option<GeneratedMedia> {
    let prediction = body.get("predictions")?.as_array()?.first()?;
    let data = prediction.get("bytesBase64Encoded")?.as_str()?;
    if data.is_empty() {
        return None;
    }
    let mime = prediction
        .get("mimeType")
        .and_then(Value::as_str)
        .unwrap_or(DEFAULT_IMAGE_MIME);
    Some(GeneratedMedia {
        url: Some(format!("data:{mime};base64,{data}")),
    })
}

fn snippet(text: &str) -> &str {
    match text.char_indices().nth(ERROR_SNIPPET_LEN) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
