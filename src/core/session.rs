//! Session bookkeeping.
//!
//! [`SessionStore`] owns every conversation thread and the pointer to the
//! one currently presented. All mutations of session contents go through it;
//! dispatch code and the UI only read.

use std::error::Error as StdError;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::mpsc;

use crate::core::message::Message;

static NEXT_SESSION_ID: AtomicU64 = AtomicU64::new(1);

pub const SEED_SESSION_TITLE: &str = "New Chat";

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    pub fn next() -> Self {
        let n = NEXT_SESSION_ID.fetch_add(1, Ordering::Relaxed);
        Self(format!("session-{n}"))
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
        Self(value.to_string())
    }
}

impl From<String> for SessionId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// One conversation thread. Built only by [`SessionStore`], always with a
/// greeting, and append-only afterwards.
#[derive(Debug, Clone, Serialize)]
pub struct Session {
    id: SessionId,
    title: String,
    messages: Vec<Message>,
    created_at: DateTime<Utc>,
}

impl Session {
    fn with_greeting(title: String, greeting: impl Into<String>) -> Self {
        Self {
            id: SessionId::next(),
            title,
            messages: vec![Message::assistant(greeting)],
            created_at: Utc::now(),
        }
    }

    pub fn id(&self) -> &SessionId {
        &self.id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn last_assistant_message(&self) -> Option<&Message> {
        self.messages.iter().rev().find(|msg| msg.is_assistant())
    }
}

/// Lightweight listing row handed to presentation code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionSummary {
    pub id: SessionId,
    pub title: String,
    pub message_count: usize,
    pub created_at: DateTime<Utc>,
    pub active: bool,
}

/// Notifications for whoever renders the session list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreEvent {
    SessionsChanged(Vec<SessionSummary>),
    ActiveSessionChanged(SessionId),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// No session with this id exists in the store.
    NotFound(SessionId),
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionError::NotFound(id) => write!(f, "session '{id}' not found"),
        }
    }
}

impl StdError for SessionError {}

pub struct SessionStore {
    sessions: Vec<Session>,
    active_session_id: SessionId,
    events: Option<mpsc::UnboundedSender<StoreEvent>>,
}

impl SessionStore {
    /// Create a store holding a single seeded session, which is active.
    pub fn new(greeting: impl Into<String>) -> Self {
        let seed = Session::with_greeting(SEED_SESSION_TITLE.to_string(), greeting);
        Self {
            active_session_id: seed.id.clone(),
            sessions: vec![seed],
            events: None,
        }
    }

    /// Like [`SessionStore::new`], also returning the receiving end of the
    /// store's change notifications.
    pub fn with_events(
        greeting: impl Into<String>,
    ) -> (Self, mpsc::UnboundedReceiver<StoreEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut store = Self::new(greeting);
        store.events = Some(tx);
        (store, rx)
    }

    /// Append a new session holding one assistant greeting. The active
    /// pointer is left alone; callers activate the session if they want to.
    pub fn create_session(&mut self, greeting: impl Into<String>) -> &Session {
        let title = format!("Chat {}", self.sessions.len() + 1);
        let session = Session::with_greeting(title, greeting);
        tracing::debug!(session = %session.id, "created session");
        self.sessions.push(session);
        self.emit_sessions_changed();
        let last = self.sessions.len() - 1;
        &self.sessions[last]
    }

    /// Point the store at `id`. Unknown ids are ignored.
    pub fn set_active(&mut self, id: &SessionId) {
        if !self.contains(id) {
            tracing::debug!(session = %id, "ignoring activation of unknown session");
            return;
        }
        if self.active_session_id == *id {
            return;
        }
        self.active_session_id = id.clone();
        self.emit(StoreEvent::ActiveSessionChanged(id.clone()));
    }

    pub fn append_message(
        &mut self,
        session_id: &SessionId,
        message: Message,
    ) -> Result<(), SessionError> {
        let session = self
            .sessions
            .iter_mut()
            .find(|session| session.id == *session_id)
            .ok_or_else(|| SessionError::NotFound(session_id.clone()))?;
        session.messages.push(message);
        self.emit_sessions_changed();
        Ok(())
    }

    /// The active session, or the first one when the pointer is stale.
    pub fn get_active(&self) -> &Session {
        self.get(&self.active_session_id)
            .unwrap_or_else(|| &self.sessions[0])
    }

    /// Id of the session [`SessionStore::get_active`] resolves to.
    pub fn active_id(&self) -> &SessionId {
        &self.get_active().id
    }

    pub fn get(&self, id: &SessionId) -> Option<&Session> {
        self.sessions.iter().find(|session| session.id == *id)
    }

    pub fn contains(&self, id: &SessionId) -> bool {
        self.get(id).is_some()
    }

    pub fn sessions(&self) -> &[Session] {
        &self.sessions
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub fn snapshot(&self) -> Vec<SessionSummary> {
        let active = self.active_id();
        self.sessions
            .iter()
            .map(|session| SessionSummary {
                id: session.id.clone(),
                title: session.title.clone(),
                message_count: session.messages.len(),
                created_at: session.created_at,
                active: session.id == *active,
            })
            .collect()
    }

    fn emit_sessions_changed(&self) {
        if self.events.is_some() {
            self.emit(StoreEvent::SessionsChanged(self.snapshot()));
        }
    }

    fn emit(&self, event: StoreEvent) {
        if let Some(tx) = &self.events {
            let _ = tx.send(event);
        }
    }

    #[cfg(test)]
    pub(crate) fn force_active_for_test(&mut self, id: SessionId) {
        self.active_session_id = id;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::message::Sender;

    #[test]
    fn new_store_seeds_one_active_session() {
        let store = SessionStore::new("Welcome");
        assert_eq!(store.len(), 1);
        let active = store.get_active();
        assert_eq!(active.title(), SEED_SESSION_TITLE);
        assert_eq!(active.messages().len(), 1);
        assert_eq!(active.messages()[0].sender(), Sender::Assistant);
        assert_eq!(active.messages()[0].text(), "Welcome");
    }

    #[test]
    fn create_session_appends_without_activating() {
        let mut store = SessionStore::new("Welcome");
        let seed_id = store.active_id().clone();
        let created = store.create_session("Hello again").id().clone();

        assert_eq!(store.len(), 2);
        assert_eq!(store.active_id(), &seed_id);
        assert_eq!(store.sessions()[1].id(), &created);
        assert_eq!(store.sessions()[1].title(), "Chat 2");
        assert_eq!(store.sessions()[1].messages().len(), 1);
    }

    #[test]
    fn created_sessions_are_never_empty() {
        let mut store = SessionStore::new("Welcome");
        for n in 0..5 {
            let session = store.create_session(format!("greeting {n}"));
            assert!(!session.messages().is_empty());
        }
        assert!(store.sessions().iter().all(|s| !s.messages().is_empty()));
    }

    #[test]
    fn activating_last_of_many_sessions() {
        let mut store = SessionStore::new("Welcome");
        let mut last = None;
        for _ in 0..4 {
            last = Some(store.create_session("hi").id().clone());
        }
        let last = last.unwrap();
        store.set_active(&last);
        assert_eq!(store.get_active().id(), &last);
    }

    #[test]
    fn activating_unknown_id_is_a_no_op() {
        let mut store = SessionStore::new("Welcome");
        let before = store.active_id().clone();
        store.set_active(&SessionId::from("missing"));
        assert_eq!(store.active_id(), &before);
    }

    #[test]
    fn stale_active_pointer_falls_back_to_first_session() {
        let mut store = SessionStore::new("Welcome");
        store.create_session("second");
        let first = store.sessions()[0].id().clone();
        store.force_active_for_test(SessionId::from("gone"));
        assert_eq!(store.get_active().id(), &first);
    }

    #[test]
    fn append_message_preserves_order() {
        let mut store = SessionStore::new("Welcome");
        let id = store.active_id().clone();
        store.append_message(&id, Message::user("one")).unwrap();
        store.append_message(&id, Message::assistant("two")).unwrap();

        let texts: Vec<&str> = store
            .get_active()
            .messages()
            .iter()
            .map(|m| m.text())
            .collect();
        assert_eq!(texts, vec!["Welcome", "one", "two"]);
    }

    #[test]
    fn append_to_unknown_session_fails_without_mutation() {
        let mut store = SessionStore::new("Welcome");
        let missing = SessionId::from("missing");
        let err = store
            .append_message(&missing, Message::user("lost"))
            .unwrap_err();
        assert_eq!(err, SessionError::NotFound(missing));
        assert_eq!(store.get_active().messages().len(), 1);
    }

    #[test]
    fn events_report_creation_appends_and_activation() {
        let (mut store, mut rx) = SessionStore::with_events("Welcome");
        let created = store.create_session("hi").id().clone();
        match rx.try_recv().expect("sessions changed after create") {
            StoreEvent::SessionsChanged(snapshot) => {
                assert_eq!(snapshot.len(), 2);
                assert!(snapshot[0].active);
                assert!(!snapshot[1].active);
            }
            other => panic!("unexpected event {other:?}"),
        }

        store.set_active(&created);
        assert_eq!(
            rx.try_recv().unwrap(),
            StoreEvent::ActiveSessionChanged(created.clone())
        );

        // Re-activating the same session is not a change.
        store.set_active(&created);
        assert!(rx.try_recv().is_err());

        store.append_message(&created, Message::user("yo")).unwrap();
        match rx.try_recv().unwrap() {
            StoreEvent::SessionsChanged(snapshot) => {
                assert_eq!(snapshot[1].message_count, 2);
                assert!(snapshot[1].active);
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn dropped_event_receiver_does_not_break_the_store() {
        let (mut store, rx) = SessionStore::with_events("Welcome");
        drop(rx);
        let id = store.create_session("hi").id().clone();
        store.set_active(&id);
        assert!(store.append_message(&id, Message::user("still works")).is_ok());
    }
}
