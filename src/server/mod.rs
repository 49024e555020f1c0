//! HTTP Front End
//!
//! Exposes the session-start and chat endpoints, validates request bodies,
//! and dispatches to the registries and handlers. Validation and lookup
//! failures map to 400 with a JSON error body; backend failures surface as
//! gateway errors.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tracing::{error, info};
use uuid::Uuid;

use crate::config::Config;
use crate::handler::{AiHandler, AiKind, HandlerError};
use crate::openai::{OpenAiClient, OpenAiError};
use crate::scanner::FileRecord;
use crate::session::{
    summarize_files, HandlerRegistry, SessionContext, SessionRegistry, Speaker, GREETING,
};

/// Shared state injected into every request handler
pub struct AppState {
    pub config: Config,
    pub client: Arc<OpenAiClient>,
    pub sessions: SessionRegistry,
    pub handlers: HandlerRegistry,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        let client = Arc::new(OpenAiClient::new(
            &config.openai_base_url,
            &config.openai_api_key,
        ));
        Self {
            config,
            client,
            sessions: SessionRegistry::new(),
            handlers: HandlerRegistry::new(),
        }
    }
}

#[derive(Debug)]
pub enum ApiError {
    /// Malformed or missing request fields
    Validation(String),
    /// Unknown session or thread
    NotFound(String),
    /// Remote AI call failed
    Backend(String),
    /// Remote run did not finish within the configured wait
    Timeout(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::Validation(m) | ApiError::NotFound(m) => (StatusCode::BAD_REQUEST, m),
            ApiError::Backend(m) => (StatusCode::BAD_GATEWAY, m),
            ApiError::Timeout(m) => (StatusCode::GATEWAY_TIMEOUT, m),
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

impl From<HandlerError> for ApiError {
    fn from(e: HandlerError) -> Self {
        match e {
            HandlerError::Backend(OpenAiError::Timeout(what)) => {
                ApiError::Timeout(format!("Timed out waiting for {}", what))
            }
            other => ApiError::Backend(other.to_string()),
        }
    }
}

/// Build the application router over shared state.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(home))
        .route("/session", post(start_session))
        .route("/chat/{session_id}", post(chat))
        .with_state(state)
}

async fn home() -> &'static str {
    "DirChat server is running"
}

#[derive(Deserialize)]
struct StartSessionRequest {
    path: Option<String>,
    files: Option<Vec<FileRecord>>,
    #[serde(rename = "aiType")]
    ai_type: Option<String>,
}

#[derive(Serialize)]
struct StartSessionResponse {
    #[serde(rename = "sessionID")]
    session_id: Uuid,
    #[serde(rename = "threadID")]
    thread_id: Uuid,
}

/// Register a directory (or add a conversation to an already registered
/// one) and bind a freshly constructed handler to the new thread.
async fn start_session(
    State(state): State<Arc<AppState>>,
    Json(req): Json<StartSessionRequest>,
) -> Result<Json<StartSessionResponse>, ApiError> {
    let path = req
        .path
        .ok_or_else(|| ApiError::Validation("No path in the request".to_string()))?;
    let dir = std::path::Path::new(&path);
    if path.is_empty() || !dir.is_dir() {
        return Err(ApiError::Validation("Invalid folder path".to_string()));
    }
    let canonical = dir
        .canonicalize()
        .map_err(|_| ApiError::Validation("Invalid folder path".to_string()))?;

    let files = req
        .files
        .ok_or_else(|| ApiError::Validation("No file object in the request".to_string()))?;

    let ai_kind = match req.ai_type {
        None => AiKind::default(),
        Some(tag) => AiKind::parse(&tag)
            .ok_or_else(|| ApiError::Validation(format!("Unknown AI type: {}", tag)))?,
    };

    let folder = canonical
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| canonical.to_string_lossy().to_string());

    let context = SessionContext {
        files: files.clone(),
    };
    let (session_id, thread_id) =
        state
            .sessions
            .start_session(&canonical.to_string_lossy(), folder, files, ai_kind);

    let handler = match AiHandler::create(
        ai_kind,
        state.client.clone(),
        &state.config,
        session_id,
        &context,
    )
    .await
    {
        Ok(handler) => handler,
        Err(e) if e.is_upload_failure() => {
            // A failed context upload is fatal for the process.
            error!(error = %e, session = %session_id, "Context upload failed, terminating");
            std::process::exit(1);
        }
        Err(e) => return Err(e.into()),
    };
    state.handlers.bind(thread_id, handler);

    info!(session = %session_id, thread = %thread_id, kind = %ai_kind, "Session started");
    Ok(Json(StartSessionResponse {
        session_id,
        thread_id,
    }))
}

#[derive(Deserialize)]
struct ChatRequest {
    #[serde(rename = "threadID")]
    thread_id: Option<String>,
    message: Option<String>,
    files: Option<Vec<FileRecord>>,
    #[serde(rename = "initMessage")]
    init_message: Option<bool>,
}

#[derive(Serialize)]
struct ChatResponse {
    message: String,
}

/// Answer a chat message within an existing session/thread and record the
/// exchange in the thread's message log.
async fn chat(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
    Json(req): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, ApiError> {
    let thread_raw = req
        .thread_id
        .ok_or_else(|| ApiError::Validation("No threadID in the request".to_string()))?;
    let message = req
        .message
        .ok_or_else(|| ApiError::Validation("No message in the request".to_string()))?;

    let session_id = session_id
        .trim()
        .parse::<Uuid>()
        .map_err(|_| ApiError::NotFound("Invalid sessionID.".to_string()))?;
    if !state.sessions.session_exists(session_id) {
        return Err(ApiError::NotFound("Invalid sessionID.".to_string()));
    }
    let thread_id = thread_raw
        .trim()
        .parse::<Uuid>()
        .map_err(|_| ApiError::NotFound("Invalid threadID.".to_string()))?;
    if !state.sessions.thread_exists(session_id, thread_id) {
        return Err(ApiError::NotFound("Invalid threadID.".to_string()));
    }

    // An empty message gets the canned greeting, no backend call.
    if message.is_empty() {
        state
            .sessions
            .append_entry(session_id, thread_id, Speaker::System, GREETING);
        return Ok(Json(ChatResponse {
            message: GREETING.to_string(),
        }));
    }

    // A supplied file list is newer data; it replaces the stored snapshot.
    if let Some(files) = req.files {
        state.sessions.replace_files(session_id, files);
    }

    let files = state.sessions.files_snapshot(session_id).unwrap_or_default();
    let summary = summarize_files(&files);

    let handler = state
        .handlers
        .get(thread_id)
        .ok_or_else(|| ApiError::NotFound("Invalid threadID.".to_string()))?;
    let first_exchange = req.init_message.unwrap_or(false);
    let response = {
        let guard = handler.lock().await;
        guard.get_response(&summary, &message, first_exchange).await?
    };

    state
        .sessions
        .append_entry(session_id, thread_id, Speaker::User, message.trim());
    state
        .sessions
        .append_entry(session_id, thread_id, Speaker::System, response.clone());

    Ok(Json(ChatResponse { message: response }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use http_body_util::BodyExt;
    use std::time::Duration;
    use tempfile::TempDir;
    use tower::util::ServiceExt;

    fn test_state() -> Arc<AppState> {
        let config = Config {
            bind_addr: "127.0.0.1:0".parse().unwrap(),
            openai_api_key: "test-key".to_string(),
            openai_base_url: "http://127.0.0.1:9".to_string(),
            model: "gpt-test".to_string(),
            assistant_name: "Test Assistant".to_string(),
            poll_interval: Duration::from_millis(10),
            run_timeout: Duration::from_secs(1),
            scratch_dir: std::env::temp_dir().join("dirchat-test"),
            context_token_budget: 1_000,
        };
        Arc::new(AppState::new(config))
    }

    fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_home_liveness() {
        let app = router(test_state());
        let response = app
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_start_session_missing_path() {
        let state = test_state();
        let app = router(state.clone());

        let response = app
            .oneshot(post_json("/session", serde_json::json!({ "files": [] })))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["error"], "No path in the request");
    }

    #[tokio::test]
    async fn test_start_session_nonexistent_path_creates_nothing() {
        let state = test_state();
        let app = router(state.clone());

        let path = "/definitely/not/a/real/directory";
        let response = app
            .oneshot(post_json(
                "/session",
                serde_json::json!({ "path": path, "files": [] }),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["error"], "Invalid folder path");
        assert!(!state
            .sessions
            .session_exists(crate::session::session_id_for_path(path)));
    }

    #[tokio::test]
    async fn test_start_session_missing_files() {
        let dir = TempDir::new().unwrap();
        let app = router(test_state());

        let response = app
            .oneshot(post_json(
                "/session",
                serde_json::json!({ "path": dir.path().to_str().unwrap() }),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["error"], "No file object in the request");
    }

    #[tokio::test]
    async fn test_start_session_unknown_ai_type() {
        let dir = TempDir::new().unwrap();
        let app = router(test_state());

        let response = app
            .oneshot(post_json(
                "/session",
                serde_json::json!({
                    "path": dir.path().to_str().unwrap(),
                    "files": [],
                    "aiType": "telepathy",
                }),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_start_session_deterministic_session_id() {
        let dir = TempDir::new().unwrap();
        let state = test_state();

        let body = serde_json::json!({
            "path": dir.path().to_str().unwrap(),
            "files": [],
            "aiType": "chat_completions",
        });

        let first = router(state.clone())
            .oneshot(post_json("/session", body.clone()))
            .await
            .unwrap();
        let second = router(state.clone())
            .oneshot(post_json("/session", body))
            .await
            .unwrap();

        assert_eq!(first.status(), StatusCode::OK);
        assert_eq!(second.status(), StatusCode::OK);
        let first = body_json(first).await;
        let second = body_json(second).await;
        assert_eq!(first["sessionID"], second["sessionID"]);
        assert_ne!(first["threadID"], second["threadID"]);
    }

    #[tokio::test]
    async fn test_chat_unknown_session() {
        let app = router(test_state());

        let response = app
            .oneshot(post_json(
                &format!("/chat/{}", Uuid::new_v4()),
                serde_json::json!({ "threadID": Uuid::new_v4().to_string(), "message": "hi" }),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["error"], "Invalid sessionID.");
    }

    #[tokio::test]
    async fn test_chat_missing_thread_id() {
        let app = router(test_state());

        let response = app
            .oneshot(post_json(
                &format!("/chat/{}", Uuid::new_v4()),
                serde_json::json!({ "message": "hi" }),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["error"], "No threadID in the request");
    }

    #[tokio::test]
    async fn test_chat_unknown_thread_does_not_mutate() {
        let dir = TempDir::new().unwrap();
        let state = test_state();

        let started = router(state.clone())
            .oneshot(post_json(
                "/session",
                serde_json::json!({
                    "path": dir.path().to_str().unwrap(),
                    "files": [],
                    "aiType": "chat_completions",
                }),
            ))
            .await
            .unwrap();
        let started = body_json(started).await;
        let session_id: Uuid = started["sessionID"].as_str().unwrap().parse().unwrap();
        let thread_id: Uuid = started["threadID"].as_str().unwrap().parse().unwrap();

        let response = router(state.clone())
            .oneshot(post_json(
                &format!("/chat/{}", session_id),
                serde_json::json!({ "threadID": Uuid::new_v4().to_string(), "message": "hi" }),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["error"], "Invalid threadID.");
        // the real thread's log is untouched
        let messages = state.sessions.thread_messages(session_id, thread_id).unwrap();
        assert!(messages.is_empty());
    }

    #[tokio::test]
    async fn test_empty_message_gets_greeting_without_backend() {
        let dir = TempDir::new().unwrap();
        let state = test_state();

        let started = router(state.clone())
            .oneshot(post_json(
                "/session",
                serde_json::json!({
                    "path": dir.path().to_str().unwrap(),
                    "files": [],
                    "aiType": "chat_completions",
                }),
            ))
            .await
            .unwrap();
        assert_eq!(started.status(), StatusCode::OK);
        let started = body_json(started).await;
        let session_id: Uuid = started["sessionID"].as_str().unwrap().parse().unwrap();
        let thread_id: Uuid = started["threadID"].as_str().unwrap().parse().unwrap();

        let response = router(state.clone())
            .oneshot(post_json(
                &format!("/chat/{}", session_id),
                serde_json::json!({ "threadID": thread_id.to_string(), "message": "" }),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["message"], GREETING);

        // exactly one system-authored entry was recorded
        let messages = state.sessions.thread_messages(session_id, thread_id).unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].speaker, Speaker::System);
        assert_eq!(messages[0].text, GREETING);
    }
}
