use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use axum::body::Bytes;
use axum::extract::{DefaultBodyLimit, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use deckforge_core::{ActionFailure, ActionResult, Actions, ErrorKind};

/// Largest accepted request body.
pub const MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

pub struct AppError {
    status: StatusCode,
    message: String,
}

impl AppError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: msg.into(),
        }
    }
}

impl From<ActionFailure> for AppError {
    fn from(failure: ActionFailure) -> Self {
        Self {
            status: status_for(failure.kind),
            message: failure.message,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = serde_json::json!({ "error": self.message });
        (self.status, Json(body)).into_response()
    }
}

/// HTTP status for a failed action.
pub fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::Validation => StatusCode::BAD_REQUEST,
        ErrorKind::Timeout => StatusCode::GATEWAY_TIMEOUT,
        ErrorKind::GenerationFailure
        | ErrorKind::SchemaViolation
        | ErrorKind::BackendUnavailable
        | ErrorKind::ToolBudgetExceeded => StatusCode::BAD_GATEWAY,
    }
}

// ---------------------------------------------------------------------------
// Response types
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub backend: String,
}

#[derive(Debug, Deserialize)]
pub struct DocumentQuery {
    pub filename: Option<String>,
}

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

pub fn build_router(actions: Arc<Actions>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/api/actions/slides", post(slides))
        .route("/api/actions/image", post(image))
        .route("/api/actions/research", post(research))
        .route("/api/actions/chat", post(chat))
        .route("/api/actions/faq", post(faq))
        .route("/api/documents/slides", post(document_slides))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(actions)
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

pub async fn run_serve(actions: Actions, bind: &str, port: u16) -> Result<()> {
    let backend = actions.context().client.backend_name().to_string();
    let app = build_router(Arc::new(actions));
    let addr: SocketAddr = format!("{bind}:{port}").parse()?;
    tracing::info!(%backend, "deckforge serve listening on http://{addr}");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    tracing::info!("deckforge serve shut down");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to install Ctrl+C handler");
        std::future::pending::<()>().await;
    }
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

fn parse_body(body: &Bytes) -> Result<Value, AppError> {
    serde_json::from_slice(body)
        .map_err(|e| AppError::bad_request(format!("request body is not valid JSON: {e}")))
}

fn respond<T: Serialize>(result: ActionResult<T>) -> Result<Response, AppError> {
    Ok(Json(result?).into_response())
}

async fn healthz(State(actions): State<Arc<Actions>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        backend: actions.context().client.backend_name().to_string(),
    })
}

async fn slides(State(actions): State<Arc<Actions>>, body: Bytes) -> Result<Response, AppError> {
    let input = parse_body(&body)?;
    respond(actions.generate_slides(&input).await)
}

async fn image(State(actions): State<Arc<Actions>>, body: Bytes) -> Result<Response, AppError> {
    let input = parse_body(&body)?;
    respond(actions.generate_image(&input).await)
}

async fn research(State(actions): State<Arc<Actions>>, body: Bytes) -> Result<Response, AppError> {
    let input = parse_body(&body)?;
    respond(actions.research(&input).await)
}

async fn chat(State(actions): State<Arc<Actions>>, body: Bytes) -> Result<Response, AppError> {
    let input = parse_body(&body)?;
    respond(actions.chat(&input).await)
}

async fn faq(State(actions): State<Arc<Actions>>, body: Bytes) -> Result<Response, AppError> {
    let input = parse_body(&body)?;
    respond(actions.faq(&input).await)
}

async fn document_slides(
    State(actions): State<Arc<Actions>>,
    Query(query): Query<DocumentQuery>,
    body: Bytes,
) -> Result<Response, AppError> {
    let filename = query.filename.as_deref().unwrap_or("document.txt");
    respond(actions.slides_from_document(filename, &body).await)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
