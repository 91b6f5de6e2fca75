//! Shared test utilities for deckforge integration tests.
//!
//! Provides [`ScriptedBackend`], a programmable [`GenerationBackend`] that
//! replays queued replies in order, counts calls, records the requests it
//! saw, and can drive tool calls through the request's [`ToolBox`] the way
//! a real model would. Also provides fixtures and helpers for assembling
//! [`Actions`] around it.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Value, json};

use deckforge_core::backend::{
    GeneratedMedia, GenerationBackend, GenerationClient, GenerationRequest,
};
use deckforge_core::search::StubSearch;
use deckforge_core::{Actions, FlowContext, Limits, TaskError};

/// One scripted answer to a `generate` call.
pub enum Script {
    /// Return this JSON value.
    Reply(Value),
    /// Fail with this error.
    Fail(TaskError),
    /// Invoke each tool in order through the request's tool box, then
    /// return the value. A tool error (e.g. an exhausted budget) aborts.
    ToolCalls(Vec<(String, Value)>, Value),
    /// Sleep, then play the inner script.
    Delayed(Duration, Box<Script>),
}

/// What the backend saw for one `generate` call.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub task: &'static str,
    pub system: String,
    pub user: String,
    pub tool_names: Vec<String>,
    /// Results returned by tools invoked while handling this request.
    pub tool_results: Vec<Value>,
}

/// A [`GenerationBackend`] that plays back a script.
///
/// When the queue runs dry `generate` fails with a `GenerationFailure`, so
/// a test that expects no backend traffic can also rely on
/// [`ScriptedBackend::calls`].
#[derive(Default)]
pub struct ScriptedBackend {
    scripts: Mutex<VecDeque<Script>>,
    images: Mutex<VecDeque<Result<Option<GeneratedMedia>, TaskError>>>,
    image_delay: Option<Duration>,
    generate_calls: AtomicUsize,
    image_calls: AtomicUsize,
    requests: Mutex<Vec<RecordedRequest>>,
    image_prompts: Mutex<Vec<String>>,
}

impl ScriptedBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reply(self, value: Value) -> Self {
        self.push(Script::Reply(value))
    }

    pub fn fail(self, err: TaskError) -> Self {
        self.push(Script::Fail(err))
    }

    pub fn tool_calls(self, calls: Vec<(&str, Value)>, then: Value) -> Self {
        let calls = calls
            .into_iter()
            .map(|(name, args)| (name.to_string(), args))
            .collect();
        self.push(Script::ToolCalls(calls, then))
    }

    pub fn delayed(self, delay: Duration, value: Value) -> Self {
        self.push(Script::Delayed(delay, Box::new(Script::Reply(value))))
    }

    pub fn push(self, script: Script) -> Self {
        self.scripts
            .lock()
            .expect("script queue poisoned")
            .push_back(script);
        self
    }

    /// Queue an image reply with the given data URI.
    pub fn image(self, url: &str) -> Self {
        self.push_image(Ok(Some(GeneratedMedia {
            url: Some(url.to_string()),
        })))
    }

    /// Queue an image reply that carries no media.
    pub fn no_image(self) -> Self {
        self.push_image(Ok(None))
    }

    pub fn image_error(self, err: TaskError) -> Self {
        self.push_image(Err(err))
    }

    pub fn push_image(self, reply: Result<Option<GeneratedMedia>, TaskError>) -> Self {
        self.images
            .lock()
            .expect("image queue poisoned")
            .push_back(reply);
        self
    }

    /// Delay every image reply.
    pub fn with_image_delay(mut self, delay: Duration) -> Self {
        self.image_delay = Some(delay);
        self
    }

    /// Number of `generate` calls so far.
    pub fn calls(&self) -> usize {
        self.generate_calls.load(Ordering::SeqCst)
    }

    /// Number of `generate_image` calls so far.
    pub fn image_calls(&self) -> usize {
        self.image_calls.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().expect("request log poisoned").clone()
    }

    pub fn last_request(&self) -> Option<RecordedRequest> {
        self.requests().pop()
    }

    pub fn image_prompts(&self) -> Vec<String> {
        self.image_prompts
            .lock()
            .expect("prompt log poisoned")
            .clone()
    }

    fn next_script(&self) -> Option<Script> {
        self.scripts.lock().expect("script queue poisoned").pop_front()
    }

    async fn play(
        &self,
        script: Script,
        request: &GenerationRequest,
        tool_results: &mut Vec<Value>,
    ) -> Result<Value, TaskError> {
        let mut script = script;
        loop {
            match script {
                Script::Reply(value) => return Ok(value),
                Script::Fail(err) => return Err(err),
                Script::ToolCalls(calls, then) => {
                    for (name, args) in calls {
                        let result = request.tools.invoke(&name, args).await?;
                        tool_results.push(result);
                    }
                    return Ok(then);
                }
                Script::Delayed(delay, inner) => {
                    tokio::time::sleep(delay).await;
                    script = *inner;
                }
            }
        }
    }
}

#[async_trait]
impl GenerationBackend for ScriptedBackend {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn generate(&self, request: &GenerationRequest) -> Result<Value, TaskError> {
        self.generate_calls.fetch_add(1, Ordering::SeqCst);

        let mut tool_results = Vec::new();
        let result = match self.next_script() {
            Some(script) => self.play(script, request, &mut tool_results).await,
            None => Err(TaskError::GenerationFailure(format!(
                "script exhausted at {}",
                request.task
            ))),
        };

        self.requests
            .lock()
            .expect("request log poisoned")
            .push(RecordedRequest {
                task: request.task,
                system: request.prompt.system.clone(),
                user: request.prompt.user.clone(),
                tool_names: request.tools.specs().into_iter().map(|s| s.name).collect(),
                tool_results,
            });
        result
    }

    async fn generate_image(&self, prompt: &str) -> Result<Option<GeneratedMedia>, TaskError> {
        self.image_calls.fetch_add(1, Ordering::SeqCst);
        self.image_prompts
            .lock()
            .expect("prompt log poisoned")
            .push(prompt.to_string());

        if let Some(delay) = self.image_delay {
            tokio::time::sleep(delay).await;
        }

        let next = self.images.lock().expect("image queue poisoned").pop_front();
        next.unwrap_or(Ok(None))
    }
}

// ---------------------------------------------------------------------------
// Assembly helpers
// ---------------------------------------------------------------------------

/// Default timeout for test clients: long enough never to fire by accident.
pub const TEST_TIMEOUT: Duration = Duration::from_secs(5);

/// A flow context around `backend` with stub search and default limits.
pub fn flow_context(backend: Arc<ScriptedBackend>) -> FlowContext {
    flow_context_with(backend, TEST_TIMEOUT, Limits::default())
}

pub fn flow_context_with(
    backend: Arc<ScriptedBackend>,
    timeout: Duration,
    limits: Limits,
) -> FlowContext {
    let client = GenerationClient::new(backend, timeout);
    FlowContext::new(client, Arc::new(StubSearch), limits)
}

/// Server actions around `backend`.
pub fn actions(backend: Arc<ScriptedBackend>) -> Actions {
    Actions::new(flow_context(backend))
}

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

/// A short document: one heading and three paragraphs.
pub const SAMPLE_DOCUMENT: &str = "# The Future of Solar Energy\n\n\
Solar panel prices have fallen by roughly ninety percent over the last decade, \
making photovoltaics the cheapest source of new electricity in many regions.\n\n\
Grid-scale battery storage is growing quickly and smooths out the gap between \
midday generation and evening demand.\n\n\
Policy support and local manufacturing will decide how fast the transition goes.";

/// A valid 1x1 PNG as a data URI.
pub const SAMPLE_IMAGE_URI: &str = "data:image/png;base64,iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAYAAAAfFcSJAAAADUlEQVR42mNk+M9QDwADhgGAWjR9awAAAABJRU5ErkJggg==";

/// A well-formed slides reply with three slides.
pub fn sample_slides() -> Value {
    json!({
        "slides": [
            {
                "title": "The Future of Solar Energy",
                "content": ["Why solar matters now", "What changed in a decade"],
                "speakerNotes": "Open with the headline numbers."
            },
            {
                "title": "Falling Prices",
                "content": ["Panel prices down ~90%", "Cheapest new electricity in many regions"],
                "speakerNotes": "Point at the cost curve."
            },
            {
                "title": "Storage and Policy",
                "content": ["Batteries bridge evening demand", "Policy sets the pace"],
                "speakerNotes": "Close with the open questions."
            }
        ]
    })
}
