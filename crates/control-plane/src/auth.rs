use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::identity::{IdentityError, IdentityProvider, NewOrganization, ProviderSession};
use crate::session::{SessionIdentity, SessionOrigin, SessionRecord, SessionStore};

/// The only magic-link flavour the gateway redeems.
pub const DISCOVERY_TOKEN_KIND: &str = "discovery";

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("{0}")]
    Validation(String),
    #[error("unsupported token kind: {0}")]
    InvalidTokenKind(String),
    #[error("authentication failed: {0}")]
    AuthenticationFailed(String),
    #[error("identity provider unavailable: {0}")]
    UpstreamUnavailable(String),
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<IdentityError> for AuthError {
    fn from(err: IdentityError) -> Self {
        match err {
            IdentityError::Rejected(message) => AuthError::AuthenticationFailed(message),
            IdentityError::Unavailable(message) => AuthError::UpstreamUnavailable(message),
        }
    }
}

#[derive(Clone, Debug)]
pub struct AuthGatewayConfig {
    pub discovery_redirect_url: String,
    pub session_duration_minutes: u32,
}

impl Default for AuthGatewayConfig {
    fn default() -> Self {
        Self {
            discovery_redirect_url: String::new(),
            session_duration_minutes: 60,
        }
    }
}

/// A freshly created local session; `session_id` is what goes in the cookie.
#[derive(Clone, Debug)]
pub struct EstablishedSession {
    pub session_id: String,
    pub identity: SessionIdentity,
}

pub struct AuthGateway {
    provider: Arc<dyn IdentityProvider>,
    sessions: Arc<dyn SessionStore>,
    config: AuthGatewayConfig,
}

impl AuthGateway {
    pub fn new(
        provider: Arc<dyn IdentityProvider>,
        sessions: Arc<dyn SessionStore>,
        config: AuthGatewayConfig,
    ) -> Self {
        Self {
            provider,
            sessions,
            config,
        }
    }

    /// Succeeds whether or not the address is known to the provider; only a
    /// transport failure surfaces.
    pub async fn request_login_link(&self, email: &str) -> Result<(), AuthError> {
        let email = email.trim();
        if email.is_empty() || !email.contains('@') {
            return Err(AuthError::Validation("a valid email address is required".to_string()));
        }
        match self
            .provider
            .send_discovery_email(email, &self.config.discovery_redirect_url)
            .await
        {
            Ok(()) => {
                debug!("discovery link requested");
                Ok(())
            }
            Err(IdentityError::Rejected(message)) => {
                warn!(reason = %message, "identity provider declined discovery email");
                Ok(())
            }
            Err(IdentityError::Unavailable(message)) => Err(AuthError::UpstreamUnavailable(message)),
        }
    }

    pub async fn complete_authentication(
        &self,
        token: &str,
        token_kind: &str,
    ) -> Result<EstablishedSession, AuthError> {
        if token_kind != DISCOVERY_TOKEN_KIND {
            return Err(AuthError::InvalidTokenKind(token_kind.to_string()));
        }
        if token.trim().is_empty() {
            return Err(AuthError::Validation("token is required".to_string()));
        }

        let discovery = self.provider.authenticate_discovery(token).await?;
        let duration = self.config.session_duration_minutes;
        let session = match discovery.discovered_organizations.first() {
            Some(discovered) => {
                self.provider
                    .exchange_intermediate_session(
                        &discovery.intermediate_session_token,
                        &discovered.organization.organization_id,
                        duration,
                    )
                    .await?
            }
            None => {
                let organization = NewOrganization::for_email(&discovery.email_address)
                    .ok_or_else(|| {
                        AuthError::AuthenticationFailed(
                            "identity provider returned an unusable email address".to_string(),
                        )
                    })?;
                info!(slug = %organization.organization_slug, "creating organization for new identity");
                self.provider
                    .create_organization(&discovery.intermediate_session_token, &organization, duration)
                    .await?
            }
        };

        self.establish(session, SessionOrigin::IdentityProvider).await
    }

    /// Whether a local record exists, without asking the provider.
    pub async fn has_session(&self, session_id: &str) -> Result<bool, AuthError> {
        let key = session_id.to_string();
        self.with_sessions(move |sessions| sessions.get(&key).is_some())
            .await
    }

    /// `Ok(None)` for any session that is unknown or no longer accepted by
    /// the provider; rejected sessions are dropped locally. Fails only when
    /// the rotated record cannot be stored.
    pub async fn validate_session(
        &self,
        session_id: &str,
    ) -> Result<Option<SessionIdentity>, AuthError> {
        let key = session_id.to_string();
        let Some(record) = self.with_sessions(move |sessions| sessions.get(&key)).await? else {
            return Ok(None);
        };

        #[cfg(feature = "auth-bypass")]
        if record.origin == SessionOrigin::Bypass {
            return Ok(Some(record.identity()));
        }

        match self
            .provider
            .authenticate_session(&record.session_token, self.config.session_duration_minutes)
            .await
        {
            Ok(refreshed) => {
                let refreshed = SessionRecord {
                    session_token: refreshed.session_token,
                    member: refreshed.member,
                    organization: refreshed.organization,
                    origin: record.origin,
                };
                let identity = refreshed.identity();
                self.store(session_id, refreshed).await?;
                Ok(Some(identity))
            }
            Err(err) => {
                warn!(error = %err, "session no longer valid");
                let key = session_id.to_string();
                self.with_sessions(move |sessions| sessions.remove(&key))
                    .await?;
                Ok(None)
            }
        }
    }

    /// Local removal always happens; the remote revoke is best effort.
    pub async fn revoke_session(&self, session_id: &str) {
        let key = session_id.to_string();
        let record = match self.with_sessions(move |sessions| sessions.remove(&key)).await {
            Ok(Some(record)) => record,
            Ok(None) => return,
            Err(err) => {
                warn!(error = %err, "local session removal failed");
                return;
            }
        };
        if record.origin != SessionOrigin::IdentityProvider {
            return;
        }
        if let Err(err) = self.provider.revoke_session(&record.session_token).await {
            warn!(error = %err, "remote session revocation failed");
        }
    }

    #[cfg(feature = "auth-bypass")]
    pub async fn open_bypass_session(&self) -> Result<EstablishedSession, AuthError> {
        warn!("opening authentication bypass session");
        let session = ProviderSession {
            session_token: Uuid::new_v4().to_string(),
            member: crate::identity::Member {
                member_id: "member-bypass".to_string(),
                email_address: "admin@localhost".to_string(),
                name: "Admin".to_string(),
                extra: Default::default(),
            },
            organization: crate::identity::Organization {
                organization_id: "organization-bypass".to_string(),
                organization_name: "Bypass Organization".to_string(),
                organization_slug: "bypass".to_string(),
                extra: Default::default(),
            },
        };
        self.establish(session, SessionOrigin::Bypass).await
    }

    async fn establish(
        &self,
        session: ProviderSession,
        origin: SessionOrigin,
    ) -> Result<EstablishedSession, AuthError> {
        let session_id = Uuid::new_v4().to_string();
        let record = SessionRecord {
            session_token: session.session_token,
            member: session.member,
            organization: session.organization,
            origin,
        };
        let identity = record.identity();
        self.store(&session_id, record).await?;
        info!(
            member_id = %identity.member.member_id,
            organization_id = %identity.organization.organization_id,
            "session established"
        );
        Ok(EstablishedSession {
            session_id,
            identity,
        })
    }

    async fn store(&self, session_id: &str, record: SessionRecord) -> Result<(), AuthError> {
        let key = session_id.to_string();
        self.with_sessions(move |sessions| sessions.put(&key, record))
            .await?
            .map_err(|err| {
                warn!(error = %err, "session record not stored");
                AuthError::Internal(format!("session could not be stored: {err}"))
            })
    }

    async fn with_sessions<F, R>(&self, op: F) -> Result<R, AuthError>
    where
        F: FnOnce(&dyn SessionStore) -> R + Send + 'static,
        R: Send + 'static,
    {
        let sessions = self.sessions.clone();
        tokio::task::spawn_blocking(move || op(sessions.as_ref()))
            .await
            .map_err(|err| AuthError::Internal(err.to_string()))
    }
}
