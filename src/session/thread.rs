//! Per-tab transcript storage.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::llm::Message;

/// Sessions idle for longer than this are dropped from the store.
pub const DEFAULT_SESSION_TIMEOUT: Duration = Duration::from_secs(30 * 60);

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

/// One browser tab's conversation.
///
/// Only the user and assistant sides of each exchange are kept; tool
/// traffic lives inside a single agent turn.
#[derive(Debug, Clone)]
pub struct Session {
    inner: Arc<SessionInner>,
}

#[derive(Debug)]
struct SessionInner {
    id: String,
    messages: RwLock<Vec<Entry>>,
    next_entry: AtomicU64,
    created_at: DateTime<Utc>,
    last_activity: RwLock<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
struct Entry {
    id: u64,
    message: Message,
}

/// Serializable snapshot of a session.
#[derive(Debug, Serialize)]
pub struct SessionState {
    pub session_id: String,
    pub messages: Vec<Message>,
    pub created_at: String,    // RFC3339
    pub last_activity: String, // RFC3339
}

impl Session {
    fn new(id: String) -> Self {
        let now = Utc::now();
        Self {
            inner: Arc::new(SessionInner {
                id,
                messages: RwLock::new(Vec::new()),
                next_entry: AtomicU64::new(0),
                created_at: now,
                last_activity: RwLock::new(now),
            }),
        }
    }

    #[must_use]
    pub fn id(&self) -> &str {
        &self.inner.id
    }

    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.inner.created_at
    }

    #[must_use]
    pub fn last_activity(&self) -> DateTime<Utc> {
        *read(&self.inner.last_activity)
    }

    pub fn to_state(&self) -> SessionState {
        SessionState {
            session_id: self.inner.id.clone(),
            messages: self.messages(),
            created_at: self.inner.created_at.to_rfc3339(),
            last_activity: self.last_activity().to_rfc3339(),
        }
    }

    pub fn add_user_message(&self, content: impl Into<String>) {
        self.push(Message::user(content));
    }

    pub fn add_assistant_message(&self, content: impl Into<String>) {
        self.push(Message::assistant(content));
    }

    /// Record the user's side of a turn whose answer is still pending.
    ///
    /// The message is removed again when the returned guard is dropped
    /// without [`PendingTurn::complete`].
    #[must_use]
    pub fn begin_turn(&self, content: impl Into<String>) -> PendingTurn {
        let entry = self.push(Message::user(content));
        PendingTurn {
            session: self.clone(),
            entry,
            settled: false,
        }
    }

    fn push(&self, message: Message) -> u64 {
        let id = self.inner.next_entry.fetch_add(1, Ordering::Relaxed);
        write(&self.inner.messages).push(Entry { id, message });
        self.touch();
        id
    }

    #[must_use]
    pub fn messages(&self) -> Vec<Message> {
        read(&self.inner.messages)
            .iter()
            .map(|e| e.message.clone())
            .collect()
    }

    #[must_use]
    pub fn message_count(&self) -> usize {
        read(&self.inner.messages).len()
    }

    pub fn clear(&self) {
        write(&self.inner.messages).clear();
        self.touch();
    }

    fn touch(&self) {
        *write(&self.inner.last_activity) = Utc::now();
    }

    /// Whether the session has been idle for longer than `timeout`.
    #[must_use]
    pub fn is_expired_with_timeout(&self, timeout: Duration) -> bool {
        // A negative age means the clock went backwards.
        (Utc::now() - self.last_activity())
            .to_std()
            .is_ok_and(|idle| idle > timeout)
    }
}

/// The user message of a turn in flight.
#[derive(Debug)]
pub struct PendingTurn {
    session: Session,
    entry: u64,
    settled: bool,
}

impl PendingTurn {
    /// Record `answer` directly after this turn's user message.
    pub fn complete(mut self, answer: impl Into<String>) {
        self.settled = true;
        let next = self.session.inner.next_entry.fetch_add(1, Ordering::Relaxed);
        let mut messages = write(&self.session.inner.messages);
        if let Some(pos) = messages.iter().position(|e| e.id == self.entry) {
            messages.insert(
                pos + 1,
                Entry {
                    id: next,
                    message: Message::assistant(answer),
                },
            );
        }
        drop(messages);
        self.session.touch();
    }
}

impl Drop for PendingTurn {
    fn drop(&mut self) {
        if !self.settled {
            write(&self.session.inner.messages).retain(|e| e.id != self.entry);
        }
    }
}

/// Thread-safe store of sessions keyed by ID.
///
/// Idle sessions are swept whenever a session is created, and on demand
/// through [`SessionStore::cleanup_expired`].
#[derive(Debug, Clone)]
pub struct SessionStore {
    sessions: Arc<RwLock<HashMap<String, Session>>>,
    timeout: Duration,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionStore {
    #[must_use]
    pub fn new() -> Self {
        Self::with_timeout(DEFAULT_SESSION_TIMEOUT)
    }

    #[must_use]
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            timeout,
        }
    }

    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Create a session with a fresh UUID.
    #[must_use]
    pub fn create(&self) -> Session {
        self.create_with_id(Uuid::new_v4().to_string())
    }

    #[must_use]
    pub fn create_with_id(&self, id: impl Into<String>) -> Session {
        let id = id.into();
        let session = Session::new(id.clone());
        let mut sessions = write(&self.sessions);
        self.sweep(&mut sessions);
        sessions.insert(id, session.clone());
        session
    }

    /// Get a live session by ID.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<Session> {
        read(&self.sessions)
            .get(id)
            .filter(|s| !s.is_expired_with_timeout(self.timeout))
            .cloned()
    }

    /// Get a session by ID, creating it if it doesn't exist or has expired.
    #[must_use]
    pub fn get_or_create(&self, id: &str) -> Session {
        if let Some(session) = self.get(id) {
            return session;
        }

        let mut sessions = write(&self.sessions);
        self.sweep(&mut sessions);
        sessions
            .entry(id.to_string())
            .or_insert_with(|| Session::new(id.to_string()))
            .clone()
    }

    pub fn remove(&self, id: &str) -> Option<Session> {
        write(&self.sessions).remove(id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        read(&self.sessions).len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remove idle sessions, returning how many were dropped.
    pub fn cleanup_expired(&self) -> usize {
        self.sweep(&mut write(&self.sessions))
    }

    fn sweep(&self, sessions: &mut HashMap<String, Session>) -> usize {
        let before = sessions.len();
        sessions.retain(|_, s| !s.is_expired_with_timeout(self.timeout));
        let removed = before - sessions.len();
        if removed > 0 {
            tracing::debug!(
                name: "session.expired",
                removed = removed,
                remaining = sessions.len(),
                "Dropped idle sessions"
            );
        }
        removed
    }
}
