//! Session store: session identity -> current state and collected fields

use crate::state_machine::{RegState, Session, SessionId};
use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

/// Keyed container of sessions.
///
/// Every operation is atomic for its key. Callers serialize events per
/// session, so no cross-call transaction is needed.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Current session, created in `Initial` with no fields when unknown
    async fn get_or_create(&self, id: SessionId) -> Session;

    async fn set_state(&self, id: SessionId, state: RegState);

    /// Store a value, overwriting a stale one under the same name
    async fn set_field(&self, id: SessionId, name: &str, value: &str);

    /// Drop all fields and return the session to `Initial`
    async fn clear(&self, id: SessionId);

    /// Forget sessions untouched for longer than `max_idle`, returning how many
    async fn evict_idle(&self, max_idle: Duration) -> usize;
}

struct Entry {
    session: Session,
    last_active: Instant,
}

impl Entry {
    fn new(id: SessionId) -> Self {
        Self {
            session: Session::new(id),
            last_active: Instant::now(),
        }
    }
}

/// Memory-resident store; a restart resets every session to `Initial`
#[derive(Default)]
pub struct InMemorySessionStore {
    sessions: Mutex<HashMap<SessionId, Entry>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of sessions currently held
    #[allow(dead_code)] // Inspection helper for tests and diagnostics
    pub async fn len(&self) -> usize {
        self.sessions.lock().await.len()
    }

    /// Read a session without creating it
    #[allow(dead_code)] // Inspection helper for tests and diagnostics
    pub async fn get(&self, id: SessionId) -> Option<Session> {
        self.sessions
            .lock()
            .await
            .get(&id)
            .map(|entry| entry.session.clone())
    }

    async fn update(&self, id: SessionId, f: impl FnOnce(&mut Session) + Send) {
        let mut sessions = self.sessions.lock().await;
        let entry = sessions.entry(id).or_insert_with(|| Entry::new(id));
        f(&mut entry.session);
        entry.last_active = Instant::now();
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn get_or_create(&self, id: SessionId) -> Session {
        let mut sessions = self.sessions.lock().await;
        let entry = sessions.entry(id).or_insert_with(|| {
            tracing::debug!(session_id = %id, "Creating session");
            Entry::new(id)
        });
        entry.last_active = Instant::now();
        entry.session.clone()
    }

    async fn set_state(&self, id: SessionId, state: RegState) {
        self.update(id, |session| session.state = state).await;
    }

    async fn set_field(&self, id: SessionId, name: &str, value: &str) {
        self.update(id, |session| session.fields.set(name, value))
            .await;
    }

    async fn clear(&self, id: SessionId) {
        self.update(id, |session| {
            session.fields.clear();
            session.state = RegState::Initial;
        })
        .await;
    }

    async fn evict_idle(&self, max_idle: Duration) -> usize {
        let mut sessions = self.sessions.lock().await;
        let before = sessions.len();
        sessions.retain(|_, entry| entry.last_active.elapsed() <= max_idle);
        before - sessions.len()
    }
}
