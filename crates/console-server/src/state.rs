use std::path::Path;
use std::sync::Arc;

use control_plane::{
    AuthGateway, AuthGatewayConfig, CredentialRepository, CredentialStore,
    FileCredentialRepository, HttpIdentityProvider, HttpIdentityProviderConfig, IdentityProvider,
    InMemorySessionStore, RedisSessionStore, RedisStoreConfig, SessionStore,
    SqliteCredentialRepository, SystemConfig, SystemConfigLoader,
};
use kernel::{
    BulkCoordinator, ExportBridge, Forwarder, HttpForwarder, HttpForwarderConfig, RequestProxy,
    UpstreamEndpoints,
};
use redis::Client as RedisClient;
use tracing::info;

use crate::error::AppError;

pub const SESSION_COOKIE: &str = "console_session";

#[derive(Clone, Debug)]
pub struct CookieSettings {
    pub secure: bool,
    pub max_age_seconds: i64,
}

impl Default for CookieSettings {
    fn default() -> Self {
        Self {
            secure: false,
            max_age_seconds: 7 * 24 * 3600,
        }
    }
}

pub struct AppState {
    pub credentials: CredentialStore,
    pub gateway: AuthGateway,
    pub proxy: Arc<RequestProxy>,
    pub bulk: BulkCoordinator,
    pub export: ExportBridge,
    pub cookie: CookieSettings,
}

impl AppState {
    pub fn new(
        credentials: CredentialStore,
        sessions: Arc<dyn SessionStore>,
        identity: Arc<dyn IdentityProvider>,
        forwarder: Arc<dyn Forwarder>,
        endpoints: UpstreamEndpoints,
        gateway_config: AuthGatewayConfig,
        cookie: CookieSettings,
    ) -> Self {
        let gateway = AuthGateway::new(identity, sessions, gateway_config);
        let proxy = Arc::new(RequestProxy::new(credentials.clone(), forwarder, endpoints));
        Self {
            credentials,
            gateway,
            bulk: BulkCoordinator::new(proxy.clone()),
            export: ExportBridge::new(proxy.clone()),
            proxy,
            cookie,
        }
    }

    pub fn from_config(config: &SystemConfig) -> Result<Self, AppError> {
        let credentials = CredentialStore::new(build_credential_repository(config)?);
        let sessions = build_session_store(config)?;
        let identity: Arc<dyn IdentityProvider> =
            Arc::new(HttpIdentityProvider::new(HttpIdentityProviderConfig {
                base_url: config.get_string("identity.base_url"),
                project_id: config.get_string("identity.project_id"),
                secret: config.get_string("identity.secret"),
                timeout_ms: config.get_positive("identity.timeout_ms", 10_000),
            }));
        let forwarder: Arc<dyn Forwarder> = Arc::new(HttpForwarder::new(HttpForwarderConfig {
            timeout_ms: config.get_positive("upstream.timeout_ms", 30_000),
            ..HttpForwarderConfig::default()
        }));
        let endpoints = UpstreamEndpoints {
            conversations_base_url: config.get_string("upstream.conversations_base_url"),
            intelligence_base_url: config.get_string("upstream.intelligence_base_url"),
        };
        let gateway_config = AuthGatewayConfig {
            discovery_redirect_url: config.get_string("identity.discovery_redirect_url"),
            session_duration_minutes: config
                .get_positive("identity.session_duration_minutes", 60)
                .min(u64::from(u32::MAX)) as u32,
        };
        let cookie = CookieSettings {
            secure: config.get_bool("session.cookie_secure"),
            max_age_seconds: config.get_positive("session.ttl_seconds", 604_800) as i64,
        };
        Ok(Self::new(
            credentials,
            sessions,
            identity,
            forwarder,
            endpoints,
            gateway_config,
            cookie,
        ))
    }
}

pub fn load_config(path: &Path) -> Result<SystemConfig, AppError> {
    let raw = std::fs::read_to_string(path)?;
    Ok(SystemConfigLoader::from_str(&raw)?)
}

pub fn create_default_config(path: &Path) -> Result<(), AppError> {
    std::fs::write(path, SystemConfigLoader::default_template())?;
    Ok(())
}

fn build_credential_repository(
    config: &SystemConfig,
) -> Result<Arc<dyn CredentialRepository>, AppError> {
    let sqlite_path = config.get_string("storage.sqlite_path");
    if sqlite_path.trim().is_empty() {
        let path = config.get_string("storage.credentials_path");
        info!(path = %path, "credentials stored in file");
        return Ok(Arc::new(FileCredentialRepository::new(path)));
    }
    let repo = SqliteCredentialRepository::open(&sqlite_path)?;
    repo.ensure_schema()?;
    info!(path = %sqlite_path, "credentials stored in sqlite");
    Ok(Arc::new(repo))
}

fn build_session_store(config: &SystemConfig) -> Result<Arc<dyn SessionStore>, AppError> {
    let redis_url = config.get_string("cache.redis_url");
    if redis_url.trim().is_empty() {
        return Ok(InMemorySessionStore::shared());
    }
    let client = RedisClient::open(redis_url.as_str())
        .map_err(|err| AppError::internal(format!("invalid redis url: {err}")))?;
    let store = RedisSessionStore::new(
        client,
        RedisStoreConfig {
            session_ttl_seconds: config.get_positive("session.ttl_seconds", 604_800) as usize,
            ..RedisStoreConfig::default()
        },
    );
    info!("sessions stored in redis");
    Ok(Arc::new(store))
}
