//! The session registry, the only state shared across requests.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::auth::Principal;

/// One live session.
#[derive(Debug, Clone)]
pub struct SessionRecord {
    /// Opaque, URL-safe, high-entropy identifier.
    pub id: String,
    /// Id of the owning principal. Nobody else may read, use, or delete
    /// the session.
    pub owner: String,
    /// Whether the initialize handshake has completed.
    pub initialized: bool,
    /// Creation time.
    pub created_at: DateTime<Utc>,
}

/// Registry operation failures.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SessionError {
    /// The caller does not own the session.
    #[error("session is owned by another principal")]
    Forbidden,
    /// No session with that id.
    #[error("unknown session")]
    NotFound,
}

/// Key-value session store shared by the transports. Backed in-process by
/// [`MemorySessionStore`]; the seam exists so an external cache could be
/// substituted without touching callers.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Create a session owned by the given principal.
    async fn create(&self, owner: &Principal) -> SessionRecord;

    /// Look up a session by id.
    async fn lookup(&self, id: &str) -> Option<SessionRecord>;

    /// Record that the session's handshake completed. Unknown ids are a
    /// no-op (the session may have been deleted concurrently).
    async fn mark_initialized(&self, id: &str);

    /// Delete a session. The requester must be the owner.
    async fn delete(&self, id: &str, requester: &Principal) -> Result<(), SessionError>;
}

/// In-memory store with a lock-guarded map; all mutations on a key are
/// serialized through the write lock. Lifetime equals process lifetime.
#[derive(Default)]
pub struct MemorySessionStore {
    sessions: RwLock<HashMap<String, SessionRecord>>,
}

impl MemorySessionStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn create(&self, owner: &Principal) -> SessionRecord {
        let record = SessionRecord {
            id: Uuid::new_v4().simple().to_string(),
            owner: owner.id.clone(),
            initialized: false,
            created_at: Utc::now(),
        };
        self.sessions
            .write()
            .await
            .insert(record.id.clone(), record.clone());
        tracing::info!(session = %record.id, owner = %owner.name, "session created");
        record
    }

    async fn lookup(&self, id: &str) -> Option<SessionRecord> {
        self.sessions.read().await.get(id).cloned()
    }

    async fn mark_initialized(&self, id: &str) {
        if let Some(record) = self.sessions.write().await.get_mut(id) {
            record.initialized = true;
            tracing::debug!(session = %id, "session marked initialized");
        }
    }

    async fn delete(&self, id: &str, requester: &Principal) -> Result<(), SessionError> {
        let mut sessions = self.sessions.write().await;
        let record = sessions.get(id).ok_or(SessionError::NotFound)?;
        if record.owner != requester.id {
            return Err(SessionError::Forbidden);
        }
        sessions.remove(id);
        tracing::info!(session = %id, "session deleted");
        Ok(())
    }
}
