//! HTTP chat API.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/chat` | Answer a message, optionally grounded in the handbook |
//! | `GET`  | `/` | Liveness banner |
//! | `GET`  | `/health` | Version and document state |
//!
//! # Chat Contract
//!
//! ```json
//! // request
//! { "message": "How many vacation days do I get?", "useRAG": true }
//! // response
//! { "reply": "...", "sources": ["...excerpt..."] }
//! ```
//!
//! `useRAG` defaults to `true` when absent; `null` turns retrieval off. Errors carry a machine-readable kind:
//!
//! ```json
//! { "error": "ModelCallFailed", "message": "API error 401: ..." }
//! ```
//!
//! `InvalidInput` (400) covers malformed JSON and missing or empty
//! messages; `ModelCallFailed` (500) covers any failure of the model call.
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted to support the
//! browser-based chat client.

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Deserializer, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use crate::chat::{ChatError, ChatReply, ChatService};
use crate::config::Config;
use crate::llm::{ChatModel, OpenAiChatModel};
use crate::retriever::{DocumentStatus, Retriever};

/// Shared application state passed to all route handlers via Axum's `State` extractor.
#[derive(Clone)]
pub struct AppState {
    chat: Arc<ChatService>,
}

impl AppState {
    pub fn new(chat: Arc<ChatService>) -> Self {
        Self { chat }
    }
}

/// Build the chat service from configuration.
///
/// Fails if the model endpoint or API key is not configured.
pub fn build_chat_service(config: &Config) -> anyhow::Result<ChatService> {
    let retriever = Arc::new(Retriever::from_config(config));
    let model: Arc<dyn ChatModel> = Arc::new(OpenAiChatModel::new(&config.model)?);
    Ok(ChatService::new(
        retriever,
        model,
        Duration::from_secs(config.document.load_timeout_secs),
    ))
}

/// Construct the router with all routes and the CORS layer.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(handle_root))
        .route("/chat", post(handle_chat))
        .route("/health", get(handle_health))
        .layer(cors)
        .with_state(state)
}

/// Starts the HTTP server.
///
/// Binds to `[server].bind` (or `PORT`) and serves until the process is
/// terminated. The document is loaded lazily on the first grounded query.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let chat = Arc::new(build_chat_service(config)?);
    let app = router(AppState::new(chat));

    let listener = tokio::net::TcpListener::bind(&config.server.bind).await?;
    info!(
        bind = %config.server.bind,
        document = %config.document.path.display(),
        model = %config.model.name,
        "AI API server listening"
    );
    axum::serve(listener, app).await?;

    Ok(())
}

// ============ Error response ============

/// JSON error response body.
#[derive(Serialize)]
struct ErrorBody {
    /// Machine-readable error kind (e.g., `"InvalidInput"`).
    error: String,
    /// Human-readable error message.
    message: String,
}

/// Internal error type that converts into an Axum HTTP response.
struct AppError {
    status: StatusCode,
    error: ChatError,
}

impl From<ChatError> for AppError {
    fn from(error: ChatError) -> Self {
        let status = match error {
            ChatError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            ChatError::ModelCallFailed(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self { status, error }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: self.error.kind().to_string(),
            message: self.error.to_string(),
        };
        (self.status, Json(body)).into_response()
    }
}

// ============ GET / ============

async fn handle_root() -> &'static str {
    "AI API Server is running."
}

// ============ GET /health ============

/// JSON response body for `GET /health`.
#[derive(Serialize)]
struct HealthResponse {
    /// Always `"ok"` when the server is running.
    status: String,
    /// The crate version from `Cargo.toml`.
    version: String,
    document: DocumentStatus,
}

/// Handler for `GET /health`.
///
/// Reports the server version and the document state without triggering a
/// load.
async fn handle_health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        document: state.chat.retriever().status(),
    })
}

// ============ POST /chat ============

/// Request body for `POST /chat`.
#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub message: Option<String>,
    /// Absent means `true`; an explicit `null` means `false`.
    #[serde(
        rename = "useRAG",
        default = "default_use_rag",
        deserialize_with = "null_as_false"
    )]
    pub use_rag: bool,
}

fn default_use_rag() -> bool {
    true
}

fn null_as_false<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<bool>::deserialize(deserializer)?.unwrap_or(false))
}

/// Handler for `POST /chat`.
async fn handle_chat(
    State(state): State<AppState>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<ChatReply>, AppError> {
    let Json(request) = payload.map_err(|e| ChatError::InvalidInput(e.body_text()))?;
    let message = request
        .message
        .ok_or_else(|| ChatError::InvalidInput("message is required".to_string()))?;

    let reply = state.chat.answer(&message, request.use_rag).await?;
    Ok(Json(reply))
}
