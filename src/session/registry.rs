//! Registry of live sessions for lookup and bulk cancellation

use super::search::SearchSession;
use crate::core::types::SessionId;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use tracing::debug;

/// Tracks sessions without keeping them alive.
///
/// Entries whose session has been dropped are pruned on the next access.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    next_id: AtomicU64,
    sessions: Mutex<HashMap<SessionId, Weak<SearchSession>>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn sessions(&self) -> MutexGuard<'_, HashMap<SessionId, Weak<SearchSession>>> {
        let mut guard = match self.sessions.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        guard.retain(|_, session| session.strong_count() > 0);
        guard
    }

    /// Creates and registers a new empty session
    pub fn create(&self, name: impl Into<String>) -> Arc<SearchSession> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        let session = Arc::new(SearchSession::new(id, name));
        self.sessions().insert(id, Arc::downgrade(&session));
        debug!(session = id, name = session.name(), "session created");
        session
    }

    pub fn get(&self, id: SessionId) -> Option<Arc<SearchSession>> {
        self.sessions().get(&id).and_then(Weak::upgrade)
    }

    /// Unregisters a session, cancelling its running scan
    pub fn remove(&self, id: SessionId) -> bool {
        match self.sessions().remove(&id).and_then(|s| s.upgrade()) {
            Some(session) => {
                session.cancel();
                true
            }
            None => false,
        }
    }

    /// Live sessions ordered by id
    pub fn list(&self) -> Vec<Arc<SearchSession>> {
        let mut sessions: Vec<_> = self.sessions().values().filter_map(Weak::upgrade).collect();
        sessions.sort_by_key(|s| s.id());
        sessions
    }

    pub fn len(&self) -> usize {
        self.sessions().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Cancels one session's scan; false if the session is unknown
    pub fn cancel(&self, id: SessionId) -> bool {
        match self.get(id) {
            Some(session) => {
                session.cancel();
                true
            }
            None => false,
        }
    }

    /// Cancels every session, returning how many were signalled
    pub fn cancel_all(&self) -> usize {
        let sessions = self.list();
        for session in &sessions {
            session.cancel();
        }
        debug!(count = sessions.len(), "cancelled all sessions");
        sessions.len()
    }
}
