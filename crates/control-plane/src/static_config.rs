#[derive(Clone, Debug)]
pub struct StaticConfigItem {
    pub key: &'static str,
    pub description: &'static str,
    pub value_type: &'static str,
    pub default_value: &'static str,
}

pub static STATIC_CONFIG_TABLE: &[StaticConfigItem] = &[
    StaticConfigItem {
        key: "storage.credentials_path",
        description: "JSON file holding the upstream credentials record",
        value_type: "string",
        default_value: ".credentials.json",
    },
    StaticConfigItem {
        key: "storage.sqlite_path",
        description: "SQLite database for credentials (file backend is used when empty)",
        value_type: "string",
        default_value: "",
    },
    StaticConfigItem {
        key: "cache.redis_url",
        description: "Redis connection string for sessions (in-memory when empty)",
        value_type: "string",
        default_value: "",
    },
    StaticConfigItem {
        key: "session.ttl_seconds",
        description: "Lifetime of a stored session record",
        value_type: "number",
        default_value: "604800",
    },
    StaticConfigItem {
        key: "session.cookie_secure",
        description: "Mark the session cookie as Secure",
        value_type: "boolean",
        default_value: "false",
    },
    StaticConfigItem {
        key: "upstream.conversations_base_url",
        description: "Conversations API root",
        value_type: "string",
        default_value: "https://conversations.twilio.com/v1",
    },
    StaticConfigItem {
        key: "upstream.intelligence_base_url",
        description: "Analysis API root",
        value_type: "string",
        default_value: "https://intelligence.twilio.com/v2",
    },
    StaticConfigItem {
        key: "upstream.timeout_ms",
        description: "Per-call timeout for upstream requests in milliseconds",
        value_type: "number",
        default_value: "30000",
    },
    StaticConfigItem {
        key: "identity.base_url",
        description: "Identity provider API root",
        value_type: "string",
        default_value: "https://test.stytch.com/v1/b2b",
    },
    StaticConfigItem {
        key: "identity.project_id",
        description: "Identity provider project id",
        value_type: "string",
        default_value: "",
    },
    StaticConfigItem {
        key: "identity.secret",
        description: "Identity provider secret",
        value_type: "string",
        default_value: "",
    },
    StaticConfigItem {
        key: "identity.discovery_redirect_url",
        description: "Where the magic link sends the browser",
        value_type: "string",
        default_value: "http://localhost:5173/authenticate",
    },
    StaticConfigItem {
        key: "identity.session_duration_minutes",
        description: "Session length requested from the identity provider",
        value_type: "number",
        default_value: "60",
    },
    StaticConfigItem {
        key: "identity.timeout_ms",
        description: "Timeout for identity provider calls in milliseconds",
        value_type: "number",
        default_value: "10000",
    },
];
