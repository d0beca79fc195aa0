use redis::Commands;
use tracing::warn;

use crate::repository::RepositoryError;
use crate::session::{SessionRecord, SessionStore};

#[derive(Clone, Debug)]
pub struct RedisStoreConfig {
    pub key_prefix: String,
    pub session_ttl_seconds: usize,
}

impl Default for RedisStoreConfig {
    fn default() -> Self {
        Self {
            key_prefix: "console".to_string(),
            session_ttl_seconds: 7 * 24 * 3600,
        }
    }
}

/// Sessions shared across server processes. Failed reads look like "no
/// session"; failed writes are reported to the caller.
#[derive(Clone)]
pub struct RedisSessionStore {
    client: redis::Client,
    config: RedisStoreConfig,
}

impl RedisSessionStore {
    pub fn new(client: redis::Client, config: RedisStoreConfig) -> Self {
        Self { client, config }
    }

    fn session_key(&self, session_id: &str) -> String {
        format!("{}:session:{}", self.config.key_prefix, session_id)
    }
}

impl SessionStore for RedisSessionStore {
    fn get(&self, session_id: &str) -> Option<SessionRecord> {
        let mut conn = self.client.get_connection().ok()?;
        let payload: Option<String> = conn.get(self.session_key(session_id)).ok()?;
        serde_json::from_str(&payload?).ok()
    }

    fn put(&self, session_id: &str, record: SessionRecord) -> Result<(), RepositoryError> {
        let payload = serde_json::to_string(&record)
            .map_err(|err| RepositoryError::Serialization(err.to_string()))?;
        let mut conn = self.client.get_connection().map_err(|err| {
            warn!(error = %err, "redis unavailable, session not stored");
            RepositoryError::Store(err.to_string())
        })?;
        let mut cmd = redis::cmd("SET");
        cmd.arg(self.session_key(session_id)).arg(payload);
        if self.config.session_ttl_seconds > 0 {
            cmd.arg("EX").arg(self.config.session_ttl_seconds);
        }
        cmd.query::<()>(&mut conn)
            .map_err(|err| RepositoryError::Store(err.to_string()))
    }

    fn remove(&self, session_id: &str) -> Option<SessionRecord> {
        let existing = self.get(session_id);
        let mut conn = self.client.get_connection().ok()?;
        let _: Result<i32, _> = redis::cmd("DEL")
            .arg(self.session_key(session_id))
            .query(&mut conn);
        existing
    }
}
