use std::collections::{BTreeMap, VecDeque};
use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SessionId(pub String);

impl SessionId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SessionId {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
    System,
    Tool,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    #[default]
    Web,
    Whatsapp,
    Telegram,
    Sms,
    Voice,
}

impl Channel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Web => "web",
            Self::Whatsapp => "whatsapp",
            Self::Telegram => "telegram",
            Self::Sms => "sms",
            Self::Voice => "voice",
        }
    }
}

/// A single transcript entry. Never mutated after it is appended to a session.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<BTreeMap<String, serde_json::Value>>,
}

impl Message {
    pub fn new(role: Role, content: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self { role, content: content.into(), timestamp, metadata: None }
    }

    pub fn user(content: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self::new(Role::User, content, timestamp)
    }

    pub fn assistant(content: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self::new(Role::Assistant, content, timestamp)
    }

    pub fn with_metadata(mut self, metadata: Option<BTreeMap<String, serde_json::Value>>) -> Self {
        self.metadata = metadata;
        self
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub id: SessionId,
    pub client_identity: Option<String>,
    pub created_at: DateTime<Utc>,
    pub last_activity_at: DateTime<Utc>,
    /// Total messages ever appended, including ones evicted from the transcript.
    pub message_count: u64,
    pub transcript: VecDeque<Message>,
}

impl Session {
    pub fn new(id: SessionId, client_identity: Option<String>, now: DateTime<Utc>) -> Self {
        Self {
            id,
            client_identity,
            created_at: now,
            last_activity_at: now,
            message_count: 0,
            transcript: VecDeque::new(),
        }
    }

    /// Appends `message`, dropping the oldest entries so that at most `max_messages`
    /// remain. The newest message is always kept. Returns how many were evicted.
    pub fn append(&mut self, message: Message, max_messages: usize, now: DateTime<Utc>) -> usize {
        let cap = max_messages.max(1);
        let mut evicted = 0;
        while self.transcript.len() >= cap {
            self.transcript.pop_front();
            evicted += 1;
        }

        self.transcript.push_back(message);
        self.message_count = self.message_count.saturating_add(1);
        self.last_activity_at = now;
        evicted
    }

    pub fn is_expired(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        (now - self.created_at).to_std().map(|age| age > ttl).unwrap_or(false)
    }

    pub fn belongs_to(&self, client_identity: &str) -> bool {
        self.client_identity.as_deref() == Some(client_identity)
    }

    pub fn summary(&self) -> SessionSummary {
        SessionSummary {
            session_id: self.id.clone(),
            client_identity: self.client_identity.clone(),
            message_count: self.message_count,
            transcript_len: self.transcript.len(),
            created_at: self.created_at,
            last_activity_at: self.last_activity_at,
            last_message_at: self.transcript.back().map(|message| message.timestamp),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub session_id: SessionId,
    pub client_identity: Option<String>,
    pub message_count: u64,
    pub transcript_len: usize,
    pub created_at: DateTime<Utc>,
    pub last_activity_at: DateTime<Utc>,
    pub last_message_at: Option<DateTime<Utc>>,
}
