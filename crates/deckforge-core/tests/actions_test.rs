//! End-to-end tests for the server actions over a scripted backend.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;

use deckforge_core::error::ErrorKind;
use deckforge_core::schema::DataUri;
use deckforge_core::{Actions, Limits, TaskError};
use deckforge_test_utils::{
    SAMPLE_DOCUMENT, SAMPLE_IMAGE_URI, ScriptedBackend, actions, flow_context_with,
    sample_slides,
};

fn setup(backend: ScriptedBackend) -> (Arc<ScriptedBackend>, Actions) {
    let backend = Arc::new(backend);
    let actions = actions(backend.clone());
    (backend, actions)
}

// ===========================================================================
// Input validation
// ===========================================================================

#[tokio::test]
async fn missing_required_fields_never_reach_the_backend() {
    let (backend, actions) = setup(ScriptedBackend::new());

    let err = actions.generate_slides(&json!({})).await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::Validation);
    assert!(err.message.contains("documentContent"), "got: {}", err.message);

    let err = actions.research(&json!({ "subject": "solar" })).await.unwrap_err();
    assert!(err.message.contains("topic"));

    let err = actions.faq(&json!({ "question": 42 })).await.unwrap_err();
    assert!(err.message.contains("question"));

    let err = actions.chat(&json!("just a string")).await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::Validation);

    let err = actions.generate_image(&json!({ "prompt": "cat" })).await.unwrap_err();
    assert!(err.message.contains("at least 10 characters"));

    assert_eq!(backend.calls(), 0);
    assert_eq!(backend.image_calls(), 0);
}

#[tokio::test]
async fn malformed_history_is_reported_by_path() {
    let (backend, actions) = setup(ScriptedBackend::new());
    let err = actions
        .faq(&json!({
            "question": "Can I upload a PDF?",
            "previousQueries": [{ "question": "hi there" }]
        }))
        .await
        .unwrap_err();
    assert!(err.message.contains("previousQueries[0].answer"), "got: {}", err.message);
    assert_eq!(backend.calls(), 0);
}

#[tokio::test]
async fn oversized_document_is_rejected() {
    let backend = Arc::new(ScriptedBackend::new());
    let limits = Limits {
        max_document_chars: 50,
        ..Limits::default()
    };
    let actions = Actions::new(flow_context_with(
        backend.clone(),
        Duration::from_secs(5),
        limits,
    ));

    let err = actions
        .generate_slides(&json!({ "documentContent": SAMPLE_DOCUMENT }))
        .await
        .unwrap_err();
    assert!(err.message.contains("too long"));
    assert_eq!(backend.calls(), 0);
}

// ===========================================================================
// Slides
// ===========================================================================

#[tokio::test]
async fn slides_from_heading_and_paragraphs() {
    let (backend, actions) = setup(ScriptedBackend::new().reply(sample_slides()));

    let out = actions
        .generate_slides(&json!({ "documentContent": SAMPLE_DOCUMENT }))
        .await
        .unwrap();

    assert!(!out.slides.is_empty());
    for slide in &out.slides {
        assert!(!slide.title.trim().is_empty());
        assert!(!slide.content.is_empty());
        assert!(slide.content.iter().all(|c| !c.trim().is_empty()));
        assert!(!slide.speaker_notes.trim().is_empty());
    }

    let request = backend.last_request().unwrap();
    assert_eq!(request.task, "generate_slides");
    assert!(request.user.contains("<document_content>"));
    assert!(request.user.contains("The Future of Solar Energy"));
    assert!(request.tool_names.is_empty());
}

#[tokio::test]
async fn non_conforming_output_becomes_generic_error() {
    let (_backend, actions) = setup(
        ScriptedBackend::new()
            .reply(json!({ "slides": [{ "title": "Only a title" }] }))
            .reply(json!({ "slides": [] })),
    );
    let input = json!({ "documentContent": SAMPLE_DOCUMENT });

    for expected in [ErrorKind::SchemaViolation, ErrorKind::GenerationFailure] {
        let err = actions.generate_slides(&input).await.unwrap_err();
        assert_eq!(err.kind, expected);
        assert_eq!(
            serde_json::to_value(&err).unwrap(),
            json!({ "error": "Failed to generate slides. Please try again." })
        );
    }
}

#[tokio::test]
async fn slides_from_text_document() {
    let (backend, actions) = setup(ScriptedBackend::new().reply(sample_slides()));
    let out = actions
        .slides_from_document("notes.md", SAMPLE_DOCUMENT.as_bytes())
        .await
        .unwrap();
    assert_eq!(out.slides.len(), 3);
    assert!(backend.last_request().unwrap().user.contains("Grid-scale battery storage"));
}

#[tokio::test]
async fn unreadable_word_document_gets_fixed_message() {
    let (backend, actions) = setup(ScriptedBackend::new());
    let err = actions
        .slides_from_document("broken.docx", b"definitely not a zip")
        .await
        .unwrap_err();
    assert_eq!(
        err.message,
        "There was an issue extracting content from the Word document."
    );
    assert_eq!(backend.calls(), 0);
}

#[tokio::test]
async fn word_document_expanding_past_the_limit_is_rejected() {
    use std::io::Write;

    let mut buf = std::io::Cursor::new(Vec::new());
    {
        let mut zip = zip::ZipWriter::new(&mut buf);
        zip.start_file("word/document.xml", zip::write::FileOptions::default())
            .unwrap();
        zip.write_all(b"<w:document><w:body><w:p><w:r><w:t>").unwrap();
        zip.write_all(&vec![b'a'; 1 << 20]).unwrap();
        zip.write_all(b"</w:t></w:r></w:p></w:body></w:document>").unwrap();
        zip.finish().unwrap();
    }

    let backend = Arc::new(ScriptedBackend::new());
    let limits = Limits {
        max_document_chars: 1_000,
        ..Limits::default()
    };
    let actions = Actions::new(flow_context_with(
        backend.clone(),
        Duration::from_secs(5),
        limits,
    ));

    let err = actions
        .slides_from_document("huge.docx", &buf.into_inner())
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::Validation);
    assert!(err.message.contains("documentContent"), "got: {}", err.message);
    assert!(err.message.contains("too long"), "got: {}", err.message);
    assert_eq!(backend.calls(), 0);
}

// ===========================================================================
// Image
// ===========================================================================

#[tokio::test]
async fn image_returns_data_uri() {
    let (backend, actions) = setup(ScriptedBackend::new().image(SAMPLE_IMAGE_URI));

    let out = actions
        .generate_image(&json!({ "prompt": "a red bicycle on a beach" }))
        .await
        .unwrap();

    let uri = DataUri::parse(&out.image_data_uri).unwrap();
    assert!(uri.mime_type.starts_with("image/"));
    assert_eq!(backend.image_prompts(), vec!["a red bicycle on a beach"]);
    assert_eq!(backend.calls(), 0);
}

#[tokio::test]
async fn image_without_media_fails() {
    let (_backend, actions) = setup(ScriptedBackend::new().no_image());
    let err = actions
        .generate_image(&json!({ "prompt": "a red bicycle on a beach" }))
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::GenerationFailure);
    assert_eq!(
        serde_json::to_value(&err).unwrap(),
        json!({ "error": "Failed to generate image. Please try again." })
    );
}

#[tokio::test]
async fn image_with_bad_data_uri_is_schema_violation() {
    let (_backend, actions) = setup(ScriptedBackend::new().image("https://example.com/cat.png"));
    let err = actions
        .generate_image(&json!({ "prompt": "a red bicycle on a beach" }))
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::SchemaViolation);
    assert_eq!(err.message, "Failed to generate image. Please try again.");
}

// ===========================================================================
// Chat / FAQ
// ===========================================================================

#[tokio::test]
async fn chat_returns_response() {
    let (backend, actions) = setup(
        ScriptedBackend::new().reply(json!({ "response": "Rehearse out loud twice." })),
    );
    let out = actions
        .chat(&json!({ "query": "How do I calm my nerves?" }))
        .await
        .unwrap();
    assert!(!out.response.is_empty());
    let request = backend.last_request().unwrap();
    assert_eq!(request.task, "presentation_tips");
    assert!(request.user.contains("How do I calm my nerves?"));
}

#[tokio::test]
async fn faq_with_empty_history() {
    let (backend, actions) = setup(
        ScriptedBackend::new().reply(json!({ "answer": "Upload it on the Slides page." })),
    );
    let out = actions
        .faq(&json!({
            "question": "How do I convert a DOCX file?",
            "previousQueries": []
        }))
        .await
        .unwrap();
    assert!(!out.answer.trim().is_empty());

    let request = backend.last_request().unwrap();
    assert!(!request.user.contains("<previous_queries>"));
    assert!(!request.user.contains("<context_data>"));
}

#[tokio::test]
async fn faq_history_is_capped_to_most_recent_turns() {
    let (backend, actions) = setup(ScriptedBackend::new().reply(json!({ "answer": "Yes." })));
    let history: Vec<_> = (0..15)
        .map(|i| json!({ "question": format!("question {i:02}"), "answer": format!("answer {i:02}") }))
        .collect();

    actions
        .faq(&json!({
            "question": "And one more thing?",
            "contextData": "The tool accepts .docx and .txt files.",
            "previousQueries": history
        }))
        .await
        .unwrap();

    let request = backend.last_request().unwrap();
    assert!(request.user.contains("<context_data>"));
    assert!(!request.user.contains("question 04"));
    assert!(request.user.contains("question 05"));
    assert!(request.user.contains("question 14"));
}

// ===========================================================================
// Research
// ===========================================================================

#[tokio::test]
async fn research_can_call_search_tool() {
    let (backend, actions) = setup(ScriptedBackend::new().tool_calls(
        vec![("search_web", json!({ "query": "renewable energy statistics" }))],
        json!({ "researchData": "Renewables supplied about 30% of global electricity." }),
    ));

    let out = actions
        .research(&json!({ "topic": "renewable energy" }))
        .await
        .unwrap();
    assert!(!out.research_data.is_empty());

    let request = backend.last_request().unwrap();
    assert_eq!(request.tool_names, vec!["search_web"]);
    let results = request.tool_results[0]["results"].as_str().unwrap();
    assert!(results.contains("renewable energy statistics"));
    assert!(results.contains("Result 1..."));
}

#[tokio::test]
async fn research_without_tool_calls() {
    let (backend, actions) = setup(
        ScriptedBackend::new().reply(json!({ "researchData": "Known facts only." })),
    );
    actions
        .research(&json!({ "topic": "renewable energy" }))
        .await
        .unwrap();
    assert!(backend.last_request().unwrap().tool_results.is_empty());
}

#[tokio::test]
async fn research_tool_calls_are_bounded() {
    let calls = (0..4)
        .map(|i| ("search_web", json!({ "query": format!("query {i}") })))
        .collect();
    let (backend, actions) = setup(
        ScriptedBackend::new().tool_calls(calls, json!({ "researchData": "never returned" })),
    );

    let err = actions
        .research(&json!({ "topic": "renewable energy" }))
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::ToolBudgetExceeded);
    assert_eq!(err.message, "Failed to perform research. Please try again.");
    assert_eq!(backend.last_request().unwrap().tool_results.len(), 3);
}

// ===========================================================================
// Backend failures
// ===========================================================================

#[tokio::test]
async fn slow_backend_times_out() {
    let backend = Arc::new(
        ScriptedBackend::new().delayed(Duration::from_secs(2), json!({ "response": "late" })),
    );
    let actions = Actions::new(flow_context_with(
        backend.clone(),
        Duration::from_millis(50),
        Limits::default(),
    ));

    let err = actions
        .chat(&json!({ "query": "Any tips?" }))
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::Timeout);
    assert_eq!(err.message, "Failed to get a response. Please try again.");
}

#[tokio::test]
async fn slow_image_backend_times_out() {
    let backend = Arc::new(
        ScriptedBackend::new()
            .image(SAMPLE_IMAGE_URI)
            .with_image_delay(Duration::from_secs(2)),
    );
    let actions = Actions::new(flow_context_with(
        backend.clone(),
        Duration::from_millis(50),
        Limits::default(),
    ));

    let err = actions
        .generate_image(&json!({ "prompt": "a red bicycle on a beach" }))
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::Timeout);
    assert_eq!(err.message, "Failed to generate image. Please try again.");
    assert_eq!(backend.image_calls(), 1);
}

#[tokio::test]
async fn backend_errors_are_not_leaked() {
    let (_backend, actions) = setup(ScriptedBackend::new().fail(TaskError::BackendUnavailable(
        "backend returned 500: internal stack trace".into(),
    )));
    let err = actions
        .faq(&json!({ "question": "Is there a size limit?" }))
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::BackendUnavailable);
    assert!(!err.message.contains("stack trace"));
}

#[tokio::test]
async fn actions_run_concurrently() {
    let backend = ScriptedBackend::new();
    let backend = (0..8).fold(backend, |b, i| {
        b.delayed(Duration::from_millis(100), json!({ "response": format!("tip {i}") }))
    });
    let (_backend, actions) = setup(backend);
    let actions = Arc::new(actions);

    let started = std::time::Instant::now();
    let handles: Vec<_> = (0..8)
        .map(|_| {
            let actions = actions.clone();
            tokio::spawn(async move { actions.chat(&json!({ "query": "tips?" })).await })
        })
        .collect();
    for handle in handles {
        assert!(handle.await.unwrap().is_ok());
    }
    assert!(started.elapsed() < Duration::from_millis(700));
}
