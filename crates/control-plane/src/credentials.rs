use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::repository::{CredentialRepository, RepositoryError};

const PARTIAL_ACCOUNT_CHARS: usize = 10;

/// Upstream API credentials. Exactly one secret form is expected: either
/// `secret_token` or the `api_key_id` / `api_key_secret` pair.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Credentials {
    #[serde(default, alias = "accountSid")]
    pub account_identifier: String,
    #[serde(default, alias = "authToken", skip_serializing_if = "Option::is_none")]
    pub secret_token: Option<String>,
    #[serde(default, alias = "apiKey", skip_serializing_if = "Option::is_none")]
    pub api_key_id: Option<String>,
    #[serde(default, alias = "apiSecret", skip_serializing_if = "Option::is_none")]
    pub api_key_secret: Option<String>,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthMethod {
    Key,
    Token,
}

impl Credentials {
    pub fn with_token(account_identifier: impl Into<String>, secret_token: impl Into<String>) -> Self {
        Self {
            account_identifier: account_identifier.into(),
            secret_token: Some(secret_token.into()),
            api_key_id: None,
            api_key_secret: None,
        }
    }

    pub fn with_api_key(
        account_identifier: impl Into<String>,
        api_key_id: impl Into<String>,
        api_key_secret: impl Into<String>,
    ) -> Self {
        Self {
            account_identifier: account_identifier.into(),
            secret_token: None,
            api_key_id: Some(api_key_id.into()),
            api_key_secret: Some(api_key_secret.into()),
        }
    }

    pub fn token(&self) -> Option<&str> {
        non_blank(&self.secret_token)
    }

    /// Returns the key pair only when both halves are present.
    pub fn api_key(&self) -> Option<(&str, &str)> {
        match (non_blank(&self.api_key_id), non_blank(&self.api_key_secret)) {
            (Some(id), Some(secret)) => Some((id, secret)),
            _ => None,
        }
    }

    pub fn is_present(&self) -> bool {
        !self.account_identifier.trim().is_empty()
    }

    /// Key pair wins when a record somehow carries both forms.
    pub fn auth_method(&self) -> Option<AuthMethod> {
        if self.api_key().is_some() {
            Some(AuthMethod::Key)
        } else if self.token().is_some() {
            Some(AuthMethod::Token)
        } else {
            None
        }
    }

    pub fn validate(&self) -> Result<(), CredentialError> {
        if !self.is_present() {
            return Err(CredentialError::Validation(
                "account identifier is required".to_string(),
            ));
        }
        let has_token = self.token().is_some();
        let has_key_part =
            non_blank(&self.api_key_id).is_some() || non_blank(&self.api_key_secret).is_some();
        let has_key_pair = self.api_key().is_some();
        if has_token && has_key_part {
            return Err(CredentialError::Validation(
                "provide either a secret token or an API key pair, not both".to_string(),
            ));
        }
        if !has_token && !has_key_pair {
            return Err(CredentialError::Validation(
                "either a secret token or both API key id and secret are required".to_string(),
            ));
        }
        Ok(())
    }

    pub fn partial_account_identifier(&self) -> String {
        let prefix: String = self
            .account_identifier
            .chars()
            .take(PARTIAL_ACCOUNT_CHARS)
            .collect();
        format!("{prefix}...")
    }
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|value| !value.trim().is_empty())
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialStatus {
    #[serde(rename = "hasCredentials")]
    pub present: bool,
    pub partial_account_identifier: Option<String>,
    pub auth_method: Option<AuthMethod>,
}

impl CredentialStatus {
    pub fn absent() -> Self {
        Self {
            present: false,
            partial_account_identifier: None,
            auth_method: None,
        }
    }
}

#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("{0}")]
    Validation(String),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// Single-record credential store. Every call goes to the repository;
/// concurrent saves are last-write-wins.
#[derive(Clone)]
pub struct CredentialStore {
    repo: Arc<dyn CredentialRepository>,
}

impl CredentialStore {
    pub fn new(repo: Arc<dyn CredentialRepository>) -> Self {
        Self { repo }
    }

    pub fn save(&self, credentials: &Credentials) -> Result<(), CredentialError> {
        credentials.validate()?;
        self.repo.save(credentials)?;
        info!(
            account = %credentials.partial_account_identifier(),
            method = ?credentials.auth_method(),
            "credentials saved"
        );
        Ok(())
    }

    pub fn status(&self) -> Result<CredentialStatus, CredentialError> {
        let status = match self.repo.load()? {
            Some(credentials) if credentials.is_present() => CredentialStatus {
                present: true,
                partial_account_identifier: Some(credentials.partial_account_identifier()),
                auth_method: credentials.auth_method(),
            },
            _ => CredentialStatus::absent(),
        };
        Ok(status)
    }

    pub fn load(&self) -> Result<Option<Credentials>, CredentialError> {
        Ok(self.repo.load()?.filter(Credentials::is_present))
    }

    pub fn clear(&self) -> Result<(), CredentialError> {
        self.repo.clear()?;
        info!("credentials cleared");
        Ok(())
    }
}
