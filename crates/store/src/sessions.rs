use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tracing::{debug, info};

use concierge_core::config::{SessionConfig, UnknownSessionPolicy};
use concierge_core::domain::session::{Message, Session, SessionId, SessionSummary};
use concierge_core::errors::SessionError;

use crate::clock::{Clock, SystemClock};

/// Process-lifetime conversation state.
///
/// Capacity is enforced by eviction, never by rejection: admitting a session may
/// silently drop the oldest sessions (globally and for the same client), and
/// appending may drop the oldest transcript entries. Callers must treat any
/// session as something that can disappear between two requests.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn create(&self, client_identity: Option<String>) -> SessionId;
    /// Appends to the session. Under the `create` policy an unknown id is upserted
    /// for `client_identity` through the same admission as `create`.
    async fn append(
        &self,
        id: &SessionId,
        client_identity: Option<&str>,
        message: Message,
    ) -> Result<(), SessionError>;
    async fn get(&self, id: &SessionId) -> Result<Session, SessionError>;
    async fn delete(&self, id: &SessionId) -> Result<(), SessionError>;
    async fn list(&self) -> Vec<SessionSummary>;
    async fn sweep_expired(&self) -> usize;
    async fn len(&self) -> usize;
}

pub struct InMemorySessionStore {
    sessions: RwLock<HashMap<SessionId, Session>>,
    settings: SessionConfig,
    clock: Arc<dyn Clock>,
}

impl InMemorySessionStore {
    pub fn new(settings: SessionConfig) -> Self {
        Self::with_clock(settings, Arc::new(SystemClock))
    }

    pub fn with_clock(settings: SessionConfig, clock: Arc<dyn Clock>) -> Self {
        Self { sessions: RwLock::new(HashMap::new()), settings, clock }
    }

    pub fn settings(&self) -> &SessionConfig {
        &self.settings
    }

    /// Makes room for one more session. Runs with the write lock held.
    fn admit(
        &self,
        sessions: &mut HashMap<SessionId, Session>,
        client_identity: Option<&str>,
        now: DateTime<Utc>,
    ) {
        self.remove_expired(sessions, now);

        let evicted = evict_oldest(sessions, self.settings.max_total, |_| true);
        if evicted > 0 {
            info!(
                event_name = "session.evicted",
                reason = "max_total",
                evicted,
                "evicted oldest sessions to stay under the global cap"
            );
        }

        if let Some(client) = client_identity {
            let evicted = evict_oldest(sessions, self.settings.max_per_client, |session| {
                session.belongs_to(client)
            });
            if evicted > 0 {
                info!(
                    event_name = "session.evicted",
                    reason = "max_per_client",
                    client_identity = client,
                    evicted,
                    "evicted oldest sessions to stay under the per-client cap"
                );
            }
        }
    }

    fn remove_expired(
        &self,
        sessions: &mut HashMap<SessionId, Session>,
        now: DateTime<Utc>,
    ) -> usize {
        let ttl = self.settings.ttl();
        let before = sessions.len();
        sessions.retain(|_, session| !session.is_expired(now, ttl));
        before - sessions.len()
    }
}

/// Removes the oldest sessions matching `filter` until fewer than `cap` remain.
fn evict_oldest<F>(sessions: &mut HashMap<SessionId, Session>, cap: usize, filter: F) -> usize
where
    F: Fn(&Session) -> bool,
{
    let mut matching: Vec<(DateTime<Utc>, SessionId)> = sessions
        .values()
        .filter(|session| filter(session))
        .map(|session| (session.created_at, session.id.clone()))
        .collect();

    let cap = cap.max(1);
    if matching.len() < cap {
        return 0;
    }

    matching.sort();
    let excess = matching.len() + 1 - cap;
    for (_, id) in matching.into_iter().take(excess) {
        sessions.remove(&id);
    }
    excess
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn create(&self, client_identity: Option<String>) -> SessionId {
        let now = self.clock.now();
        let id = SessionId::generate();

        let mut sessions = self.sessions.write().await;
        self.admit(&mut sessions, client_identity.as_deref(), now);
        sessions.insert(id.clone(), Session::new(id.clone(), client_identity.clone(), now));
        let total = sessions.len();
        drop(sessions);

        info!(
            event_name = "session.created",
            session_id = %id,
            client_identity = client_identity.as_deref().unwrap_or("unknown"),
            total,
            "session created"
        );
        id
    }

    async fn append(
        &self,
        id: &SessionId,
        client_identity: Option<&str>,
        message: Message,
    ) -> Result<(), SessionError> {
        let now = self.clock.now();
        let mut sessions = self.sessions.write().await;

        if !sessions.contains_key(id) {
            match self.settings.unknown_session {
                UnknownSessionPolicy::Reject => return Err(SessionError::NotFound(id.clone())),
                UnknownSessionPolicy::Create => {
                    self.admit(&mut sessions, client_identity, now);
                    let owner = client_identity.map(str::to_string);
                    sessions.insert(id.clone(), Session::new(id.clone(), owner, now));
                    info!(
                        event_name = "session.created",
                        session_id = %id,
                        client_identity = client_identity.unwrap_or("unknown"),
                        upsert = true,
                        "session created on append to an unknown id"
                    );
                }
            }
        }

        let Some(session) = sessions.get_mut(id) else {
            return Err(SessionError::NotFound(id.clone()));
        };
        let dropped = session.append(message, self.settings.max_messages, now);
        if dropped > 0 {
            debug!(
                event_name = "session.transcript_trimmed",
                session_id = %id,
                dropped,
                "dropped oldest messages to respect the transcript cap"
            );
        }
        Ok(())
    }

    async fn get(&self, id: &SessionId) -> Result<Session, SessionError> {
        let sessions = self.sessions.read().await;
        sessions.get(id).cloned().ok_or_else(|| SessionError::NotFound(id.clone()))
    }

    async fn delete(&self, id: &SessionId) -> Result<(), SessionError> {
        let mut sessions = self.sessions.write().await;
        match sessions.remove(id) {
            Some(_) => {
                info!(event_name = "session.deleted", session_id = %id, "session deleted");
                Ok(())
            }
            None => Err(SessionError::NotFound(id.clone())),
        }
    }

    async fn list(&self) -> Vec<SessionSummary> {
        let sessions = self.sessions.read().await;
        let mut summaries: Vec<SessionSummary> = sessions.values().map(Session::summary).collect();
        summaries.sort_by(|left, right| {
            left.created_at
                .cmp(&right.created_at)
                .then_with(|| left.session_id.cmp(&right.session_id))
        });
        summaries
    }

    async fn sweep_expired(&self) -> usize {
        let now = self.clock.now();
        let mut sessions = self.sessions.write().await;
        let removed = self.remove_expired(&mut sessions, now);
        let remaining = sessions.len();
        drop(sessions);

        info!(
            event_name = "session.sweep_completed",
            removed,
            remaining,
            "expired sessions swept"
        );
        removed
    }

    async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::sync::Arc;

    use chrono::{Duration, TimeZone, Utc};

    use concierge_core::config::{SessionConfig, UnknownSessionPolicy};
    use concierge_core::domain::session::{Message, Role, SessionId};
    use concierge_core::errors::SessionError;

    use crate::clock::{Clock, ManualClock};
    use crate::sessions::{InMemorySessionStore, SessionStore};

    fn clock() -> Arc<ManualClock> {
        Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2026, 3, 14, 9, 0, 0).single().expect("valid timestamp"),
        ))
    }

    fn settings() -> SessionConfig {
        SessionConfig {
            ttl_secs: 600,
            max_total: 4,
            max_per_client: 2,
            max_messages: 3,
            sweep_interval_secs: 60,
            unknown_session: UnknownSessionPolicy::Create,
        }
    }

    fn clock_now(clock: &ManualClock) -> chrono::DateTime<Utc> {
        clock.now()
    }

    fn store_with(settings: SessionConfig, clock: Arc<ManualClock>) -> InMemorySessionStore {
        InMemorySessionStore::with_clock(settings, clock)
    }

    #[tokio::test]
    async fn create_returns_distinct_ids() {
        let store = store_with(settings(), clock());
        let first = store.create(None).await;
        let second = store.create(None).await;

        assert_ne!(first, second);
        assert_eq!(store.len().await, 2);
        assert!(store.get(&first).await.expect("created").transcript.is_empty());
    }

    #[tokio::test]
    async fn transcript_is_capped_and_keeps_newest() {
        let clock = clock();
        let store = store_with(settings(), clock.clone());
        let id = store.create(None).await;

        for index in 0..5 {
            clock.advance(Duration::seconds(1));
            let message = Message::user(format!("m{index}"), clock_now(&clock));
            store.append(&id, None, message).await.expect("append");
        }

        let session = store.get(&id).await.expect("session exists");
        let contents: Vec<_> =
            session.transcript.iter().map(|message| message.content.clone()).collect();
        assert_eq!(contents, vec!["m2", "m3", "m4"]);
        assert_eq!(session.message_count, 5);
    }

    #[tokio::test]
    async fn global_cap_evicts_oldest_sessions() {
        let clock = clock();
        let store = store_with(settings(), clock.clone());

        let mut ids = Vec::new();
        for _ in 0..6 {
            clock.advance(Duration::seconds(1));
            ids.push(store.create(None).await);
        }

        assert_eq!(store.len().await, 4);
        assert!(matches!(store.get(&ids[0]).await, Err(SessionError::NotFound(_))));
        assert!(matches!(store.get(&ids[1]).await, Err(SessionError::NotFound(_))));
        assert!(store.get(&ids[5]).await.is_ok());
    }

    #[tokio::test]
    async fn per_client_cap_only_evicts_that_clients_sessions() {
        let clock = clock();
        let store = store_with(settings(), clock.clone());

        clock.advance(Duration::seconds(1));
        let other = store.create(Some("10.0.0.2".to_owned())).await;
        let mut mine = Vec::new();
        for _ in 0..3 {
            clock.advance(Duration::seconds(1));
            mine.push(store.create(Some("10.0.0.1".to_owned())).await);
        }

        let summaries = store.list().await;
        let for_client =
            summaries.iter().filter(|s| s.client_identity.as_deref() == Some("10.0.0.1")).count();
        assert_eq!(for_client, 2);
        assert!(store.get(&other).await.is_ok());
        assert!(store.get(&mine[0]).await.is_err());
    }

    #[tokio::test]
    async fn sweep_removes_expired_sessions_and_is_idempotent() {
        let clock = clock();
        let store = store_with(settings(), clock.clone());
        let old = store.create(None).await;
        clock.advance(Duration::seconds(300));
        let young = store.create(None).await;
        clock.advance(Duration::seconds(301));

        assert_eq!(store.sweep_expired().await, 1);
        assert_eq!(store.sweep_expired().await, 0);
        assert!(store.get(&old).await.is_err());
        assert!(store.get(&young).await.is_ok());
    }

    #[tokio::test]
    async fn create_sweeps_expired_sessions_first() {
        let clock = clock();
        let store = store_with(settings(), clock.clone());
        store.create(None).await;
        clock.advance(Duration::seconds(601));

        store.create(None).await;
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn append_to_unknown_id_upserts_under_create_policy() {
        let store = store_with(settings(), clock());
        let id = SessionId::from("client-chosen");

        store.append(&id, None, Message::user("hi", Utc::now())).await.expect("upsert");
        let session = store.get(&id).await.expect("upserted");
        assert_eq!(session.transcript.len(), 1);
        assert_eq!(session.client_identity, None);
    }

    #[tokio::test]
    async fn upsert_respects_global_cap() {
        let clock = clock();
        let store = store_with(settings(), clock.clone());
        for index in 0..6 {
            clock.advance(Duration::seconds(1));
            let id = SessionId(format!("s-{index}"));
            store.append(&id, None, Message::user("hi", Utc::now())).await.expect("upsert");
        }

        assert_eq!(store.len().await, 4);
    }

    #[tokio::test]
    async fn upsert_counts_against_the_client_cap() {
        let clock = clock();
        let store = store_with(settings(), clock.clone());
        let kept = store.create(Some("10.0.0.9".to_string())).await;
        for index in 0..4 {
            clock.advance(Duration::seconds(1));
            let id = SessionId(format!("fresh-{index}"));
            store
                .append(&id, Some("10.0.0.1"), Message::user("hi", Utc::now()))
                .await
                .expect("upsert");
        }

        let owned: Vec<_> = store
            .list()
            .await
            .into_iter()
            .filter(|summary| summary.session_id.0.starts_with("fresh-"))
            .collect();
        assert_eq!(owned.len(), 2);
        let newest = store.get(&SessionId::from("fresh-3")).await.expect("newest kept");
        assert_eq!(newest.client_identity.as_deref(), Some("10.0.0.1"));
        assert!(store.get(&SessionId::from("fresh-0")).await.is_err());
        assert!(store.get(&kept).await.is_ok());
    }

    #[tokio::test]
    async fn append_to_unknown_id_is_rejected_under_reject_policy() {
        let store = store_with(
            SessionConfig { unknown_session: UnknownSessionPolicy::Reject, ..settings() },
            clock(),
        );
        let id = SessionId::from("missing");

        let result = store.append(&id, None, Message::user("hi", Utc::now())).await;
        assert_eq!(result, Err(SessionError::NotFound(id)));
        assert_eq!(store.len().await, 0);
    }

    #[tokio::test]
    async fn get_is_idempotent_without_intervening_appends() {
        let store = store_with(settings(), clock());
        let id = store.create(None).await;
        store.append(&id, None, Message::user("hello", Utc::now())).await.expect("append");

        let first = store.get(&id).await.expect("first read");
        let second = store.get(&id).await.expect("second read");
        assert_eq!(first.transcript, second.transcript);
    }

    #[tokio::test]
    async fn user_then_assistant_order_is_preserved() {
        let store = store_with(settings(), clock());
        let id = store.create(None).await;
        store.append(&id, None, Message::user("question", Utc::now())).await.expect("user");
        store
            .append(&id, None, Message::assistant("answer", Utc::now()))
            .await
            .expect("assistant");

        let roles: Vec<Role> =
            store.get(&id).await.expect("session").transcript.iter().map(|m| m.role).collect();
        assert_eq!(roles, vec![Role::User, Role::Assistant]);
    }

    #[tokio::test]
    async fn delete_twice_reports_not_found() {
        let store = store_with(settings(), clock());
        let id = store.create(None).await;

        assert_eq!(store.delete(&id).await, Ok(()));
        assert_eq!(store.get(&id).await.err(), Some(SessionError::NotFound(id.clone())));
        assert_eq!(store.delete(&id).await, Err(SessionError::NotFound(id)));
    }

    #[tokio::test]
    async fn list_reports_last_message_time() {
        let clock = clock();
        let store = store_with(settings(), clock.clone());
        let id = store.create(Some("10.0.0.9".to_owned())).await;
        let sent_at = clock_now(&clock) + Duration::seconds(5);
        store.append(&id, None, Message::user("hello", sent_at)).await.expect("append");

        let summaries = store.list().await;
        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[0].last_message_at, Some(sent_at));
        assert_eq!(summaries[0].message_count, 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_creates_never_exceed_caps() {
        let store = Arc::new(InMemorySessionStore::with_clock(
            SessionConfig { max_total: 10, max_per_client: 3, ..settings() },
            clock(),
        ));

        let mut handles = Vec::new();
        for task in 0..8 {
            let store = Arc::clone(&store);
            handles.push(tokio::spawn(async move {
                for _ in 0..10 {
                    let client = format!("client-{}", task % 4);
                    let id = store.create(Some(client)).await;
                    let _ = store.append(&id, None, Message::user("ping", Utc::now())).await;
                }
            }));
        }
        for handle in handles {
            handle.await.expect("task completes");
        }

        let summaries = store.list().await;
        assert!(summaries.len() <= 10);
        let clients: HashSet<_> =
            summaries.iter().filter_map(|s| s.client_identity.clone()).collect();
        for client in clients {
            let count = summaries
                .iter()
                .filter(|s| s.client_identity.as_deref() == Some(client.as_str()))
                .count();
            assert!(count <= 3, "client {client} holds {count} sessions");
        }
    }
}
