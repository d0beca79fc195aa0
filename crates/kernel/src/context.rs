use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use control_plane::{AuthMethod, Credentials};

use crate::ProxyError;

/// Authentication material for one inbound request. Built fresh from the
/// stored credentials every time so rotated secrets apply immediately.
#[derive(Clone)]
pub struct UpstreamContext {
    account_identifier: String,
    auth_method: AuthMethod,
    authorization: String,
}

impl UpstreamContext {
    pub fn from_credentials(credentials: &Credentials) -> Result<Self, ProxyError> {
        if !credentials.is_present() {
            return Err(ProxyError::NoCredentialsConfigured);
        }
        let (auth_method, user, password) = if let Some((key_id, key_secret)) = credentials.api_key()
        {
            (AuthMethod::Key, key_id, key_secret)
        } else if let Some(token) = credentials.token() {
            (AuthMethod::Token, credentials.account_identifier.as_str(), token)
        } else {
            return Err(ProxyError::InvalidCredentials(
                "stored credentials need either a secret token or an API key pair".to_string(),
            ));
        };
        let encoded = STANDARD.encode(format!("{user}:{password}"));
        Ok(Self {
            account_identifier: credentials.account_identifier.clone(),
            auth_method,
            authorization: format!("Basic {encoded}"),
        })
    }

    pub fn auth_method(&self) -> AuthMethod {
        self.auth_method
    }

    pub fn authorization_header(&self) -> &str {
        &self.authorization
    }
}

impl std::fmt::Debug for UpstreamContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpstreamContext")
            .field("account_identifier", &self.account_identifier)
            .field("auth_method", &self.auth_method)
            .finish_non_exhaustive()
    }
}
