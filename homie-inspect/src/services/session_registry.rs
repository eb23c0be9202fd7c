//! In-memory registry of open inspection sessions
//!
//! At most one session is reachable per link: opening a link again replaces
//! its previous session, discarding that session's progress.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{Duration, Utc};
use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

use super::inspection_session::InspectionSession;

/// Shared handle to one session
pub type SessionHandle = Arc<Mutex<InspectionSession>>;

struct Entry {
    handle: SessionHandle,
    home_id: Uuid,
    link_id: Uuid,
}

#[derive(Default)]
struct Inner {
    sessions: HashMap<Uuid, Entry>,
    by_link: HashMap<Uuid, Uuid>,
}

impl Inner {
    fn remove(&mut self, session_id: Uuid) {
        if let Some(entry) = self.sessions.remove(&session_id) {
            if self.by_link.get(&entry.link_id) == Some(&session_id) {
                self.by_link.remove(&entry.link_id);
            }
        }
    }
}

/// Registry of sessions keyed by session id
///
/// Removal never waits on a session's lock, so a session busy with a long
/// call can still be forgotten.
#[derive(Clone, Default)]
pub struct SessionRegistry {
    inner: Arc<RwLock<Inner>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a session, replacing any earlier one for the same link
    pub async fn open(&self, session: InspectionSession) -> SessionHandle {
        let session_id = session.id;
        let entry = Entry {
            home_id: session.home_id,
            link_id: session.link_id,
            handle: Arc::new(Mutex::new(session)),
        };
        let link_id = entry.link_id;
        let handle = entry.handle.clone();

        let mut inner = self.inner.write().await;
        if let Some(previous) = inner.by_link.insert(link_id, session_id) {
            inner.sessions.remove(&previous);
            tracing::debug!(link_id = %link_id, session_id = %previous, "Discarded previous inspection session");
        }
        inner.sessions.insert(session_id, entry);
        handle
    }

    pub async fn get(&self, session_id: Uuid) -> Option<SessionHandle> {
        self.inner
            .read()
            .await
            .sessions
            .get(&session_id)
            .map(|entry| entry.handle.clone())
    }

    /// Drop the session of a link
    pub async fn forget_link(&self, link_id: Uuid) {
        let mut inner = self.inner.write().await;
        if let Some(session_id) = inner.by_link.remove(&link_id) {
            inner.sessions.remove(&session_id);
        }
    }

    /// Drop every session of a home
    pub async fn forget_home(&self, home_id: Uuid) {
        let mut inner = self.inner.write().await;
        let doomed: Vec<Uuid> = inner
            .sessions
            .iter()
            .filter(|(_, entry)| entry.home_id == home_id)
            .map(|(id, _)| *id)
            .collect();
        for session_id in doomed {
            inner.remove(session_id);
        }
    }

    /// Remove sessions idle for longer than `max_idle`
    ///
    /// Sessions that are busy (locked) are skipped. Returns the number of
    /// sessions removed.
    pub async fn prune(&self, max_idle: Duration) -> usize {
        let cutoff = Utc::now() - max_idle;
        let mut inner = self.inner.write().await;

        let expired: Vec<Uuid> = inner
            .sessions
            .iter()
            .filter_map(|(id, entry)| {
                let session = entry.handle.try_lock().ok()?;
                (session.updated_at < cutoff).then_some(*id)
            })
            .collect();

        for session_id in &expired {
            inner.remove(*session_id);
        }
        expired.len()
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.sessions.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}
