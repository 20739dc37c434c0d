//! HTTP surface over the conversation service.
//!
//! - `POST   /api/chat`          runs one turn
//! - `GET    /api/session/{id}`  session transcript
//! - `DELETE /api/session/{id}`  drops a session
//! - `GET    /api/sessions`      lists live sessions
//! - `GET    /api/health`        liveness and executor readiness

use std::collections::BTreeMap;

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};
use uuid::Uuid;

use concierge_agent::service::{ConversationService, TurnRequest};
use concierge_core::domain::intent::ActionTag;
use concierge_core::domain::session::{Channel, Message, SessionId};
use concierge_core::errors::{ApplicationError, InterfaceError};

use crate::health;

const SERVICE_NAME: &str = "concierge";
const FORWARDED_FOR: &str = "x-forwarded-for";

#[derive(Clone)]
pub struct AppState {
    pub service: ConversationService,
}

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    pub user_id: String,
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub channel: Channel,
    #[serde(default)]
    pub metadata: Option<BTreeMap<String, Value>>,
}

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub response: String,
    pub session_id: String,
    pub metadata: BTreeMap<String, Value>,
    pub actions_taken: Vec<ActionTag>,
}

#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub session_id: String,
    pub messages: Vec<Message>,
    pub message_count: usize,
}

#[derive(Debug, Serialize)]
pub struct SessionListEntry {
    pub session_id: String,
    pub message_count: usize,
    pub last_message: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
pub struct SessionList {
    pub sessions: Vec<SessionListEntry>,
}

#[derive(Debug, Serialize)]
pub struct MessageBody {
    pub message: String,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    detail: &'static str,
    correlation_id: String,
}

/// Client-safe error response. Only the fixed user message leaves the process.
#[derive(Debug)]
pub struct ApiError(InterfaceError);

impl From<InterfaceError> for ApiError {
    fn from(value: InterfaceError) -> Self {
        Self(value)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            InterfaceError::NotFound { .. } => StatusCode::NOT_FOUND,
            InterfaceError::BadRequest { .. } => StatusCode::BAD_REQUEST,
        };
        let body = ErrorBody {
            detail: self.0.user_message(),
            correlation_id: self.0.correlation_id().to_string(),
        };
        (status, Json(body)).into_response()
    }
}

pub fn router(service: ConversationService) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/api/chat", post(chat))
        .route("/api/session/{session_id}", get(get_session).delete(delete_session))
        .route("/api/sessions", get(list_sessions))
        .route("/api/health", get(health::health))
        .with_state(AppState { service })
}

async fn root() -> Json<Value> {
    Json(serde_json::json!({
        "message": format!("Welcome to {SERVICE_NAME}"),
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

async fn chat(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, ApiError> {
    let correlation_id = correlation_id();
    if body.message.trim().is_empty() {
        warn!(
            event_name = "api.chat.rejected",
            correlation_id = %correlation_id,
            "chat request carried an empty message"
        );
        return Err(InterfaceError::BadRequest {
            message: "message is empty".to_string(),
            correlation_id,
        }
        .into());
    }

    let client_identity = client_identity(&headers).unwrap_or_else(|| body.user_id.clone());
    let response = state
        .service
        .handle_turn(TurnRequest {
            message: body.message,
            user_id: body.user_id,
            session_id: body.session_id.map(SessionId),
            client_identity: Some(client_identity),
            channel: body.channel,
            metadata: body.metadata,
        })
        .await;

    info!(
        event_name = "api.chat.completed",
        correlation_id = %correlation_id,
        session_id = %response.session_id,
        actions = response.actions_taken.len(),
        "chat turn answered"
    );

    Ok(Json(ChatResponse {
        response: response.reply,
        session_id: response.session_id.0,
        metadata: response.metadata,
        actions_taken: response.actions_taken,
    }))
}

async fn get_session(
    Path(session_id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<SessionResponse>, ApiError> {
    let session = state
        .service
        .get_session(&SessionId(session_id))
        .await
        .map_err(interface_error)?;

    let messages: Vec<Message> = session.transcript.into_iter().collect();
    Ok(Json(SessionResponse {
        session_id: session.id.0,
        message_count: messages.len(),
        messages,
    }))
}

async fn delete_session(
    Path(session_id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<MessageBody>, ApiError> {
    let id = SessionId(session_id);
    state.service.delete_session(&id).await.map_err(interface_error)?;

    Ok(Json(MessageBody { message: format!("Session {id} deleted successfully") }))
}

async fn list_sessions(State(state): State<AppState>) -> Json<SessionList> {
    let sessions = state
        .service
        .list_sessions()
        .await
        .into_iter()
        .map(|summary| SessionListEntry {
            session_id: summary.session_id.0,
            message_count: summary.transcript_len,
            last_message: summary.last_message_at,
        })
        .collect();

    Json(SessionList { sessions })
}

fn interface_error(error: ApplicationError) -> ApiError {
    let correlation_id = correlation_id();
    warn!(
        event_name = "api.request.failed",
        correlation_id = %correlation_id,
        error = %error,
        "request failed"
    );
    error.into_interface(correlation_id).into()
}

fn correlation_id() -> String {
    Uuid::new_v4().to_string()
}

/// First hop of `X-Forwarded-For`, if any.
fn client_identity(headers: &HeaderMap) -> Option<String> {
    let forwarded = headers.get(FORWARDED_FOR)?.to_str().ok()?;
    let first = forwarded.split(',').next()?.trim();
    (!first.is_empty()).then(|| first.to_string())
}
