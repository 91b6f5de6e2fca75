//! One-shot commands: run a single action and print its JSON result.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use base64::{Engine, engine::general_purpose::STANDARD as BASE64};
use serde::Serialize;
use serde_json::{Map, Value, json};

use deckforge_core::backend::{GeminiBackend, GenerationClient};
use deckforge_core::schema::DataUri;
use deckforge_core::search::{SearchProvider, StubSearch};
use deckforge_core::{ActionResponse, ActionResult, Actions, FlowContext};

use crate::config::DeckforgeConfig;

/// Assemble the server actions for a resolved configuration.
pub fn build_actions(config: &DeckforgeConfig) -> Actions {
    let timeout = config.backend.timeout;
    let backend = GeminiBackend::new(config.backend.clone());
    let client = GenerationClient::new(Arc::new(backend), timeout);
    Actions::new(FlowContext::new(client, Arc::new(StubSearch), config.limits))
}

/// Print an action result as pretty JSON. Returns whether it succeeded.
fn print_result<T: Serialize>(result: ActionResult<T>) -> Result<bool> {
    let ok = result.is_ok();
    let response = ActionResponse::from(result);
    let text = serde_json::to_string_pretty(&response).context("failed to serialize result")?;
    println!("{text}");
    Ok(ok)
}

pub async fn run_slides(actions: &Actions, file: &Path) -> Result<bool> {
    let bytes = std::fs::read(file)
        .with_context(|| format!("failed to read document {}", file.display()))?;
    let filename = file
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    print_result(actions.slides_from_document(&filename, &bytes).await)
}

pub async fn run_image(actions: &Actions, prompt: &str, out: Option<&Path>) -> Result<bool> {
    let result = actions.generate_image(&json!({ "prompt": prompt })).await;

    if let (Ok(output), Some(path)) = (&result, out) {
        let uri = DataUri::parse(&output.image_data_uri)
            .map_err(anyhow::Error::msg)
            .context("backend returned an unreadable image")?;
        let bytes = BASE64
            .decode(&uri.payload)
            .context("image payload is not valid base64")?;
        std::fs::write(path, &bytes)
            .with_context(|| format!("failed to write image to {}", path.display()))?;
        println!("Image ({}) written to {}", uri.mime_type, path.display());
        return Ok(true);
    }

    print_result(result)
}

pub async fn run_research(actions: &Actions, topic: &str) -> Result<bool> {
    print_result(actions.research(&json!({ "topic": topic })).await)
}

pub async fn run_chat(actions: &Actions, query: &str) -> Result<bool> {
    print_result(actions.chat(&json!({ "query": query })).await)
}

pub async fn run_faq(
    actions: &Actions,
    question: &str,
    context: Option<&str>,
    history: Option<&Path>,
) -> Result<bool> {
    let history = history.map(load_history).transpose()?;
    let input = faq_input(question, context, history);
    print_result(actions.faq(&input).await)
}

/// Run the search collaborator directly. Needs no backend.
pub async fn run_search(query: &str) -> Result<()> {
    let text = StubSearch.search(query).await?;
    println!("{text}");
    Ok(())
}

/// Read earlier FAQ turns from a JSON file holding an array of
/// `{"question": ..., "answer": ...}` objects.
fn load_history(path: &Path) -> Result<Value> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read history file {}", path.display()))?;
    let value: Value = serde_json::from_str(&contents)
        .with_context(|| format!("history file {} is not valid JSON", path.display()))?;
    if !value.is_array() {
        anyhow::bail!("history file {} must hold a JSON array", path.display());
    }
    Ok(value)
}

fn faq_input(question: &str, context: Option<&str>, history: Option<Value>) -> Value {
    let mut input = Map::new();
    input.insert("question".into(), Value::from(question));
    if let Some(context) = context {
        input.insert("contextData".into(), Value::from(context));
    }
    if let Some(history) = history {
        input.insert("previousQueries".into(), history);
    }
    Value::Object(input)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn faq_input_includes_only_given_fields() {
        assert_eq!(
            faq_input("How do I start?", None, None),
            json!({ "question": "How do I start?" })
        );
        assert_eq!(
            faq_input("Why?", Some("ctx"), Some(json!([]))),
            json!({ "question": "Why?", "contextData": "ctx", "previousQueries": [] })
        );
    }

    #[test]
    fn load_history_requires_array() {
        let tmp = tempfile::TempDir::new().unwrap();
        let good = tmp.path().join("good.json");
        std::fs::write(&good, r#"[{"question":"a?","answer":"b"}]"#).unwrap();
        assert_eq!(load_history(&good).unwrap()[0]["answer"], "b");

        let bad = tmp.path().join("bad.json");
        std::fs::write(&bad, r#"{"question":"a?"}"#).unwrap();
        let err = load_history(&bad).unwrap_err();
        assert!(err.to_string().contains("JSON array"));
    }

    #[tokio::test]
    async fn slides_command_reads_file() {
        use deckforge_test_utils::{SAMPLE_DOCUMENT, ScriptedBackend, actions, sample_slides};

        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("talk.md");
        std::fs::write(&path, SAMPLE_DOCUMENT).unwrap();

        let backend = Arc::new(ScriptedBackend::new().reply(sample_slides()));
        let ok = run_slides(&actions(backend.clone()), &path).await.unwrap();
        assert!(ok);
        assert_eq!(backend.calls(), 1);
    }

    #[tokio::test]
    async fn image_command_writes_file() {
        use deckforge_test_utils::{SAMPLE_IMAGE_URI, ScriptedBackend, actions};

        let tmp = tempfile::TempDir::new().unwrap();
        let out = tmp.path().join("bike.png");
        let backend = Arc::new(ScriptedBackend::new().image(SAMPLE_IMAGE_URI));

        let ok = run_image(&actions(backend), "a red bicycle on a beach", Some(&out))
            .await
            .unwrap();
        assert!(ok);
        let bytes = std::fs::read(&out).unwrap();
        assert!(bytes.starts_with(b"\x89PNG"));
    }

    #[tokio::test]
    async fn failed_action_reports_false() {
        use deckforge_test_utils::{ScriptedBackend, actions};

        let backend = Arc::new(ScriptedBackend::new());
        let ok = run_chat(&actions(backend), "tips?").await.unwrap();
        assert!(!ok);
    }
}
