use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use thiserror::Error;

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Member {
    pub member_id: String,
    #[serde(default)]
    pub email_address: String,
    #[serde(default)]
    pub name: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Organization {
    pub organization_id: String,
    #[serde(default)]
    pub organization_name: String,
    #[serde(default)]
    pub organization_slug: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct DiscoveredOrganization {
    pub organization: Organization,
}

/// Result of redeeming a discovery magic-link token: an intermediate
/// session that still has to be bound to an organization.
#[derive(Clone, Debug, Deserialize)]
pub struct Discovery {
    pub intermediate_session_token: String,
    pub email_address: String,
    #[serde(default)]
    pub discovered_organizations: Vec<DiscoveredOrganization>,
}

/// A member session issued by the provider.
#[derive(Clone, Debug, Deserialize)]
pub struct ProviderSession {
    pub session_token: String,
    pub member: Member,
    pub organization: Organization,
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct NewOrganization {
    pub organization_name: String,
    pub organization_slug: String,
    pub email_allowed_domains: Vec<String>,
}

impl NewOrganization {
    /// Derives the name and slug from the local part and scopes automatic
    /// membership to the email's domain.
    pub fn for_email(email: &str) -> Option<Self> {
        let (local, domain) = email.trim().rsplit_once('@')?;
        if local.is_empty() || domain.is_empty() {
            return None;
        }
        let slug: String = local
            .to_lowercase()
            .chars()
            .map(|ch| if ch.is_ascii_alphanumeric() { ch } else { '-' })
            .collect();
        Some(Self {
            organization_name: format!("{local}'s Organization"),
            organization_slug: slug.trim_matches('-').to_string(),
            email_allowed_domains: vec![domain.to_lowercase()],
        })
    }
}

#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("identity provider rejected the request: {0}")]
    Rejected(String),
    #[error("identity provider unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn send_discovery_email(
        &self,
        email: &str,
        redirect_url: &str,
    ) -> Result<(), IdentityError>;
    async fn authenticate_discovery(&self, token: &str) -> Result<Discovery, IdentityError>;
    async fn exchange_intermediate_session(
        &self,
        intermediate_session_token: &str,
        organization_id: &str,
        session_duration_minutes: u32,
    ) -> Result<ProviderSession, IdentityError>;
    async fn create_organization(
        &self,
        intermediate_session_token: &str,
        organization: &NewOrganization,
        session_duration_minutes: u32,
    ) -> Result<ProviderSession, IdentityError>;
    /// Re-authenticates and returns the rotated token.
    async fn authenticate_session(
        &self,
        session_token: &str,
        session_duration_minutes: u32,
    ) -> Result<ProviderSession, IdentityError>;
    async fn revoke_session(&self, session_token: &str) -> Result<(), IdentityError>;
}

#[derive(Clone, Debug)]
pub struct HttpIdentityProviderConfig {
    pub base_url: String,
    pub project_id: String,
    pub secret: String,
    pub timeout_ms: u64,
}

impl Default for HttpIdentityProviderConfig {
    fn default() -> Self {
        Self {
            base_url: "https://test.stytch.com/v1/b2b".to_string(),
            project_id: String::new(),
            secret: String::new(),
            timeout_ms: 10_000,
        }
    }
}

/// Client for a B2B magic-link discovery API authenticated with the
/// project id and secret as HTTP basic credentials.
#[derive(Clone)]
pub struct HttpIdentityProvider {
    client: reqwest::Client,
    config: HttpIdentityProviderConfig,
}

impl HttpIdentityProvider {
    pub fn new(config: HttpIdentityProviderConfig) -> Self {
        let timeout = Duration::from_millis(config.timeout_ms.max(1));
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self { client, config }
    }

    async fn post<T: DeserializeOwned>(&self, path: &str, body: Value) -> Result<T, IdentityError> {
        let url = format!("{}/{}", self.config.base_url.trim_end_matches('/'), path);
        let response = self
            .client
            .post(&url)
            .basic_auth(&self.config.project_id, Some(&self.config.secret))
            .json(&body)
            .send()
            .await
            .map_err(|err| IdentityError::Unavailable(err.to_string()))?;
        let status = response.status();
        let bytes = response
            .bytes()
            .await
            .map_err(|err| IdentityError::Unavailable(err.to_string()))?;
        if status.is_server_error() {
            return Err(IdentityError::Unavailable(error_message(status.as_u16(), &bytes)));
        }
        if !status.is_success() {
            return Err(IdentityError::Rejected(error_message(status.as_u16(), &bytes)));
        }
        serde_json::from_slice(&bytes).map_err(|err| IdentityError::Unavailable(err.to_string()))
    }
}

fn error_message(status: u16, body: &[u8]) -> String {
    serde_json::from_slice::<Value>(body)
        .ok()
        .and_then(|value| {
            value
                .get("error_message")
                .or_else(|| value.get("message"))
                .and_then(Value::as_str)
                .map(str::to_string)
        })
        .unwrap_or_else(|| format!("status {status}"))
}

#[async_trait]
impl IdentityProvider for HttpIdentityProvider {
    async fn send_discovery_email(
        &self,
        email: &str,
        redirect_url: &str,
    ) -> Result<(), IdentityError> {
        let mut body = json!({ "email_address": email });
        if !redirect_url.is_empty() {
            body["discovery_redirect_url"] = Value::String(redirect_url.to_string());
        }
        let _: Value = self.post("magic_links/email/discovery/send", body).await?;
        Ok(())
    }

    async fn authenticate_discovery(&self, token: &str) -> Result<Discovery, IdentityError> {
        self.post(
            "magic_links/discovery/authenticate",
            json!({ "discovery_magic_links_token": token }),
        )
        .await
    }

    async fn exchange_intermediate_session(
        &self,
        intermediate_session_token: &str,
        organization_id: &str,
        session_duration_minutes: u32,
    ) -> Result<ProviderSession, IdentityError> {
        self.post(
            "discovery/intermediate_sessions/exchange",
            json!({
                "intermediate_session_token": intermediate_session_token,
                "organization_id": organization_id,
                "session_duration_minutes": session_duration_minutes,
            }),
        )
        .await
    }

    async fn create_organization(
        &self,
        intermediate_session_token: &str,
        organization: &NewOrganization,
        session_duration_minutes: u32,
    ) -> Result<ProviderSession, IdentityError> {
        self.post(
            "discovery/organizations/create",
            json!({
                "intermediate_session_token": intermediate_session_token,
                "organization_name": organization.organization_name,
                "organization_slug": organization.organization_slug,
                "email_allowed_domains": organization.email_allowed_domains,
                "email_jit_provisioning": "RESTRICTED",
                "session_duration_minutes": session_duration_minutes,
            }),
        )
        .await
    }

    async fn authenticate_session(
        &self,
        session_token: &str,
        session_duration_minutes: u32,
    ) -> Result<ProviderSession, IdentityError> {
        self.post(
            "sessions/authenticate",
            json!({
                "session_token": session_token,
                "session_duration_minutes": session_duration_minutes,
            }),
        )
        .await
    }

    async fn revoke_session(&self, session_token: &str) -> Result<(), IdentityError> {
        let _: Value = self
            .post("sessions/revoke", json!({ "session_token": session_token }))
            .await?;
        Ok(())
    }
}
