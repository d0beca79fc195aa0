pub mod auth;
pub mod config;
pub mod credentials;
pub mod identity;
pub mod redis_store;
pub mod repository;
pub mod session;
pub mod sqlite_repository;
pub mod static_config;

pub use auth::{AuthError, AuthGateway, AuthGatewayConfig, EstablishedSession, DISCOVERY_TOKEN_KIND};
pub use config::{ConfigError, ConfigValue, SystemConfig, SystemConfigLoader};
pub use credentials::{AuthMethod, CredentialError, CredentialStatus, CredentialStore, Credentials};
pub use identity::{
    DiscoveredOrganization, Discovery, HttpIdentityProvider, HttpIdentityProviderConfig,
    IdentityError, IdentityProvider, Member, NewOrganization, Organization, ProviderSession,
};
pub use redis_store::{RedisSessionStore, RedisStoreConfig};
pub use repository::{
    CredentialRepository, FileCredentialRepository, InMemoryCredentialRepository, RepositoryError,
};
pub use session::{InMemorySessionStore, SessionIdentity, SessionOrigin, SessionRecord, SessionStore};
pub use sqlite_repository::SqliteCredentialRepository;
