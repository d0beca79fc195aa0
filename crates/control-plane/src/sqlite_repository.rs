use parking_lot::Mutex;
use rusqlite::{Connection, OptionalExtension};

use crate::credentials::Credentials;
use crate::repository::{CredentialRepository, RepositoryError};

const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS upstream_credentials (
    slot INTEGER PRIMARY KEY CHECK (slot = 0),
    record TEXT NOT NULL,
    saved_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
);";

/// Single-row table; a save replaces the previous record.
pub struct SqliteCredentialRepository {
    db: Mutex<Connection>,
}

impl SqliteCredentialRepository {
    pub fn open(path: &str) -> Result<Self, RepositoryError> {
        Connection::open(path).map(Self::wrap).map_err(store_err)
    }

    pub fn open_in_memory() -> Result<Self, RepositoryError> {
        Connection::open_in_memory().map(Self::wrap).map_err(store_err)
    }

    fn wrap(conn: Connection) -> Self {
        Self {
            db: Mutex::new(conn),
        }
    }

    pub fn ensure_schema(&self) -> Result<(), RepositoryError> {
        self.db.lock().execute_batch(SCHEMA).map_err(store_err)
    }
}

impl CredentialRepository for SqliteCredentialRepository {
    fn load(&self) -> Result<Option<Credentials>, RepositoryError> {
        let record: Option<String> = self
            .db
            .lock()
            .query_row(
                "SELECT record FROM upstream_credentials WHERE slot = 0",
                [],
                |row| row.get(0),
            )
            .optional()
            .map_err(store_err)?;
        record
            .map(|text| serde_json::from_str(&text))
            .transpose()
            .map_err(|err| RepositoryError::Serialization(err.to_string()))
    }

    fn save(&self, credentials: &Credentials) -> Result<(), RepositoryError> {
        let record = serde_json::to_string(credentials)
            .map_err(|err| RepositoryError::Serialization(err.to_string()))?;
        self.db
            .lock()
            .execute(
                "INSERT OR REPLACE INTO upstream_credentials (slot, record, saved_at) \
                 VALUES (0, ?1, CURRENT_TIMESTAMP)",
                [record],
            )
            .map(|_| ())
            .map_err(store_err)
    }

    fn clear(&self) -> Result<(), RepositoryError> {
        self.db
            .lock()
            .execute("DELETE FROM upstream_credentials", [])
            .map(|_| ())
            .map_err(store_err)
    }
}

fn store_err(err: rusqlite::Error) -> RepositoryError {
    RepositoryError::Store(err.to_string())
}
