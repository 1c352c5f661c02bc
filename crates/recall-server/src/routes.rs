//! HTTP routes: chat streaming over SSE, reset, and health

use std::convert::Infallible;
use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    response::{
        IntoResponse, Response,
        sse::{Event, KeepAlive, Sse},
    },
    routing::{get, post},
};
use futures::StreamExt;
use recall_engine::{ConversationId, Engine, Error, OutputChunk};
use serde::Deserialize;
use tower_http::trace::TraceLayer;
use tracing::error;

/// Header carrying the authenticated caller identity
pub const CALLER_HEADER: &str = "x-caller-id";

/// Application state shared across routes
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<Engine>,
}

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub images: Vec<String>,
    pub conversation: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ConversationQuery {
    pub conversation: Option<String>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/chat", post(chat).delete(reset))
        .route("/health", get(|| async { "ok" }))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn chat(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<ChatRequest>,
) -> Response {
    let conversation = match conversation_id(&headers, body.conversation.as_deref()) {
        Ok(id) => id,
        Err(e) => return error_response(e),
    };

    match state
        .engine
        .handle_turn(&conversation, &body.message, &body.images)
        .await
    {
        Ok(turn) => {
            let events = turn.map(|chunk| Ok::<_, Infallible>(chunk_event(&chunk)));
            Sse::new(events)
                .keep_alive(KeepAlive::new())
                .into_response()
        }
        Err(e) => error_response(e),
    }
}

async fn reset(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<ConversationQuery>,
) -> Response {
    let conversation = match conversation_id(&headers, query.conversation.as_deref()) {
        Ok(id) => id,
        Err(e) => return error_response(e),
    };

    match state.engine.reset(&conversation).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => error_response(e),
    }
}

fn conversation_id(
    headers: &HeaderMap,
    conversation: Option<&str>,
) -> recall_engine::Result<ConversationId> {
    let caller = headers
        .get(CALLER_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    ConversationId::for_caller(caller, conversation)
}

fn chunk_event(chunk: &OutputChunk) -> Event {
    Event::default()
        .json_data(chunk)
        .unwrap_or_else(|_| Event::default().data(r#"{"error":"unencodable chunk"}"#))
}

fn error_response(e: Error) -> Response {
    let status = if e.is_validation() {
        StatusCode::BAD_REQUEST
    } else {
        error!("Request failed: {}", e);
        StatusCode::INTERNAL_SERVER_ERROR
    };
    (status, Json(serde_json::json!({ "error": e.to_string() }))).into_response()
}
