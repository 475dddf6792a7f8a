use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use fitgenius_core::models::TranscriptResponse;
use fitgenius_core::{Session, TranscriptObserver};
use tokio::sync::Mutex as AsyncMutex;
use tokio::sync::watch;
use tracing::debug;
use uuid::Uuid;

/// A session is locked for the whole of one interaction, gateway call included.
pub type SessionHandle = Arc<AsyncMutex<Session>>;

struct SessionEntry {
    handle: SessionHandle,
    snapshot: watch::Sender<TranscriptResponse>,
    touched_at: Instant,
}

/// In-memory map of live browser sessions.
#[derive(Clone)]
pub struct SessionRegistry {
    entries: Arc<Mutex<HashMap<Uuid, SessionEntry>>>,
    idle_ttl: Duration,
}

impl SessionRegistry {
    pub fn new(idle_ttl: Duration) -> Self {
        Self {
            entries: Arc::new(Mutex::new(HashMap::new())),
            idle_ttl,
        }
    }

    /// Creates a seeded session. Sessions idle for longer than the TTL are
    /// dropped first, unless a request is still holding them.
    pub fn create(&self) -> (Uuid, SessionHandle) {
        self.create_with(Session::new())
    }

    /// Registers an already built session, such as one resumed from history.
    pub fn create_with(&self, session: Session) -> (Uuid, SessionHandle) {
        let id = session.id();
        let (snapshot, _) = watch::channel(TranscriptResponse::from_session(&session));
        let handle = Arc::new(AsyncMutex::new(session));

        let mut entries = self.lock();
        let now = Instant::now();
        let before = entries.len();
        entries.retain(|_, entry| {
            now.duration_since(entry.touched_at) < self.idle_ttl
                || Arc::strong_count(&entry.handle) > 1
        });
        let purged = before - entries.len();
        if purged > 0 {
            debug!(purged, "purged idle sessions");
        }

        entries.insert(
            id,
            SessionEntry {
                handle: handle.clone(),
                snapshot,
                touched_at: now,
            },
        );
        (id, handle)
    }

    pub fn get(&self, id: Uuid) -> Option<SessionHandle> {
        let mut entries = self.lock();
        let entry = entries.get_mut(&id)?;
        entry.touched_at = Instant::now();
        Some(entry.handle.clone())
    }

    /// Last published view of the session. Never waits on the session lock,
    /// so it answers while a reply is still being generated.
    pub fn snapshot(&self, id: Uuid) -> Option<TranscriptResponse> {
        let mut entries = self.lock();
        let entry = entries.get_mut(&id)?;
        entry.touched_at = Instant::now();
        Some(entry.snapshot.borrow().clone())
    }

    /// Replaces the published view. Sessions removed in the meantime are
    /// ignored.
    pub fn publish(&self, session: &Session) {
        if let Some(entry) = self.lock().get(&session.id()) {
            entry
                .snapshot
                .send_replace(TranscriptResponse::from_session(session));
        }
    }

    pub fn remove(&self, id: Uuid) -> bool {
        self.lock().remove(&id).is_some()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<Uuid, SessionEntry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Transcript observer that keeps each session's published view current.
#[derive(Clone)]
pub struct SnapshotPublisher {
    sessions: SessionRegistry,
}

impl SnapshotPublisher {
    pub fn new(sessions: SessionRegistry) -> Self {
        Self { sessions }
    }
}

impl TranscriptObserver for SnapshotPublisher {
    fn transcript_changed(&self, session: &Session) {
        self.sessions.publish(session);
        debug!(
            session_id = %session.id(),
            revision = session.revision(),
            status = ?session.status(),
            "transcript published"
        );
    }
}
