use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::RwLock;
use thiserror::Error;

use crate::credentials::Credentials;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("repository error: {0}")]
    Store(String),
    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Durable storage for the single credentials record.
pub trait CredentialRepository: Send + Sync {
    fn load(&self) -> Result<Option<Credentials>, RepositoryError>;
    /// Replaces any previous record.
    fn save(&self, credentials: &Credentials) -> Result<(), RepositoryError>;
    /// Succeeds when nothing is stored.
    fn clear(&self) -> Result<(), RepositoryError>;
}

#[derive(Clone, Default)]
pub struct InMemoryCredentialRepository {
    record: Arc<RwLock<Option<Credentials>>>,
}

impl InMemoryCredentialRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_credentials(credentials: Credentials) -> Self {
        Self {
            record: Arc::new(RwLock::new(Some(credentials))),
        }
    }

    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }
}

impl CredentialRepository for InMemoryCredentialRepository {
    fn load(&self) -> Result<Option<Credentials>, RepositoryError> {
        Ok(self.record.read().clone())
    }

    fn save(&self, credentials: &Credentials) -> Result<(), RepositoryError> {
        *self.record.write() = Some(credentials.clone());
        Ok(())
    }

    fn clear(&self) -> Result<(), RepositoryError> {
        *self.record.write() = None;
        Ok(())
    }
}

/// Stores the record as a JSON document. Writes go through a sibling
/// temp file and a rename so a crash never leaves a truncated record.
#[derive(Clone)]
pub struct FileCredentialRepository {
    path: PathBuf,
}

impl FileCredentialRepository {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|name| name.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl CredentialRepository for FileCredentialRepository {
    fn load(&self) -> Result<Option<Credentials>, RepositoryError> {
        let payload = match fs::read_to_string(&self.path) {
            Ok(payload) => payload,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(RepositoryError::Store(err.to_string())),
        };
        if payload.trim().is_empty() {
            return Ok(None);
        }
        serde_json::from_str(&payload)
            .map(Some)
            .map_err(|err| RepositoryError::Serialization(err.to_string()))
    }

    fn save(&self, credentials: &Credentials) -> Result<(), RepositoryError> {
        let payload = serde_json::to_string_pretty(credentials)
            .map_err(|err| RepositoryError::Serialization(err.to_string()))?;
        if let Some(parent) = self.path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|err| RepositoryError::Store(err.to_string()))?;
        }
        let temp = self.temp_path();
        fs::write(&temp, payload.as_bytes())
            .map_err(|err| RepositoryError::Store(err.to_string()))?;
        fs::rename(&temp, &self.path).map_err(|err| RepositoryError::Store(err.to_string()))?;
        Ok(())
    }

    fn clear(&self) -> Result<(), RepositoryError> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(RepositoryError::Store(err.to_string())),
        }
    }
}
