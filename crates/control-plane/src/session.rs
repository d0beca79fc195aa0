use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::identity::{Member, Organization};
use crate::repository::RepositoryError;

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionOrigin {
    #[default]
    IdentityProvider,
    /// Fabricated without contacting the identity provider. Only exists in
    /// builds with the `auth-bypass` feature.
    #[cfg(feature = "auth-bypass")]
    Bypass,
}

/// Server-side half of a login. The client only ever sees the session id
/// through a cookie; the provider token stays here.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SessionRecord {
    pub session_token: String,
    pub member: Member,
    pub organization: Organization,
    #[serde(default)]
    pub origin: SessionOrigin,
}

impl SessionRecord {
    pub fn identity(&self) -> SessionIdentity {
        SessionIdentity {
            member: self.member.clone(),
            organization: self.organization.clone(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SessionIdentity {
    pub member: Member,
    pub organization: Organization,
}

/// Blocking storage for session records; callers on the async runtime go
/// through `spawn_blocking`.
pub trait SessionStore: Send + Sync {
    fn get(&self, session_id: &str) -> Option<SessionRecord>;
    fn put(&self, session_id: &str, record: SessionRecord) -> Result<(), RepositoryError>;
    fn remove(&self, session_id: &str) -> Option<SessionRecord>;
}

pub struct InMemorySessionStore {
    sessions: Mutex<HashMap<String, SessionRecord>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
        }
    }

    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    pub fn len(&self) -> usize {
        self.sessions.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.lock().is_empty()
    }
}

impl Default for InMemorySessionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionStore for InMemorySessionStore {
    fn get(&self, session_id: &str) -> Option<SessionRecord> {
        self.sessions.lock().get(session_id).cloned()
    }

    fn put(&self, session_id: &str, record: SessionRecord) -> Result<(), RepositoryError> {
        self.sessions.lock().insert(session_id.to_string(), record);
        Ok(())
    }

    fn remove(&self, session_id: &str) -> Option<SessionRecord> {
        self.sessions.lock().remove(session_id)
    }
}
