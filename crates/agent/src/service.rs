use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use serde_json::Value;
use tracing::{error, warn};

use concierge_core::domain::intent::ActionTag;
use concierge_core::domain::session::{Channel, Message, Session, SessionId, SessionSummary};
use concierge_core::errors::{ApplicationError, SessionError};
use concierge_store::sessions::SessionStore;

use crate::reply::SERVICE_UNAVAILABLE_MESSAGE;
use crate::runtime::{TurnExecutor, TurnInput};

#[derive(Clone, Debug, Default, PartialEq)]
pub struct TurnRequest {
    pub message: String,
    pub user_id: String,
    pub session_id: Option<SessionId>,
    pub client_identity: Option<String>,
    pub channel: Channel,
    pub metadata: Option<BTreeMap<String, Value>>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct TurnResponse {
    pub reply: String,
    pub session_id: SessionId,
    pub actions_taken: Vec<ActionTag>,
    pub metadata: BTreeMap<String, Value>,
}

/// Single entry point for transports: resolves the session, records both sides of
/// the exchange and runs the turn in between.
///
/// Always answers. Without an executor every turn gets the fixed
/// service-unavailable reply.
#[derive(Clone)]
pub struct ConversationService {
    store: Arc<dyn SessionStore>,
    executor: Option<Arc<TurnExecutor>>,
}

impl ConversationService {
    pub fn new(store: Arc<dyn SessionStore>, executor: Option<Arc<TurnExecutor>>) -> Self {
        Self { store, executor }
    }

    pub fn executor_available(&self) -> bool {
        self.executor.is_some()
    }

    pub fn store(&self) -> &Arc<dyn SessionStore> {
        &self.store
    }

    pub async fn handle_turn(&self, request: TurnRequest) -> TurnResponse {
        let TurnRequest { message, user_id, session_id, client_identity, channel, metadata } =
            request;

        let user_message = Message::user(message.clone(), Utc::now())
            .with_metadata(message_metadata(channel, metadata));
        let client_identity = client_identity.as_deref();
        let session_id = self.record_user_message(session_id, client_identity, user_message).await;

        let (reply, actions_taken) = match &self.executor {
            Some(executor) => {
                let outcome = executor
                    .run_turn(TurnInput {
                        message,
                        user_id: user_id.clone(),
                        session_id: session_id.clone(),
                    })
                    .await;
                (outcome.reply, outcome.actions_taken)
            }
            None => {
                warn!(
                    event_name = "turn.service_unavailable",
                    session_id = %session_id,
                    "turn executor is not available; replying with degraded message"
                );
                (SERVICE_UNAVAILABLE_MESSAGE.to_string(), vec![ActionTag::ServiceUnavailable])
            }
        };

        let assistant_message = Message::assistant(reply.clone(), Utc::now());
        if let Err(error) =
            self.store.append(&session_id, client_identity, assistant_message).await
        {
            error!(
                event_name = "session.append_failed",
                session_id = %session_id,
                error = %error,
                "assistant reply could not be recorded"
            );
        }

        let mut response_metadata = BTreeMap::new();
        response_metadata.insert("channel".to_string(), Value::from(channel.as_str()));
        response_metadata.insert("user_id".to_string(), Value::from(user_id));

        TurnResponse { reply, session_id, actions_taken, metadata: response_metadata }
    }

    /// Appends the user message, starting a fresh session when none was supplied or
    /// the store refuses the supplied one.
    async fn record_user_message(
        &self,
        session_id: Option<SessionId>,
        client_identity: Option<&str>,
        message: Message,
    ) -> SessionId {
        let session_id = match session_id {
            Some(id) => match self.store.append(&id, client_identity, message.clone()).await {
                Ok(()) => return id,
                Err(SessionError::NotFound(_)) => {
                    warn!(
                        event_name = "session.unknown_id_replaced",
                        session_id = %id,
                        "supplied session id is unknown; starting a new session"
                    );
                    self.store.create(client_identity.map(str::to_string)).await
                }
            },
            None => self.store.create(client_identity.map(str::to_string)).await,
        };

        if let Err(error) = self.store.append(&session_id, client_identity, message).await {
            error!(
                event_name = "session.append_failed",
                session_id = %session_id,
                error = %error,
                "user message could not be recorded"
            );
        }
        session_id
    }

    pub async fn get_session(&self, id: &SessionId) -> Result<Session, ApplicationError> {
        Ok(self.store.get(id).await?)
    }

    pub async fn delete_session(&self, id: &SessionId) -> Result<(), ApplicationError> {
        Ok(self.store.delete(id).await?)
    }

    pub async fn list_sessions(&self) -> Vec<SessionSummary> {
        self.store.list().await
    }
}

fn message_metadata(
    channel: Channel,
    metadata: Option<BTreeMap<String, Value>>,
) -> Option<BTreeMap<String, Value>> {
    let mut merged = metadata.unwrap_or_default();
    merged.entry("channel".to_string()).or_insert_with(|| Value::from(channel.as_str()));
    Some(merged)
}
