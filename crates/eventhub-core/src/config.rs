use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

pub const DEFAULT_PORT: u16 = 8000;
pub const DEFAULT_BIND: &str = "127.0.0.1";
pub const DEFAULT_LIST_LIMIT: usize = 50; // newest-first history page for REST clients
pub const DEFAULT_HEARTBEAT_SECS: u64 = 30; // ping cadence on idle push connections
pub const DEFAULT_TOKEN_TTL_SECS: u64 = 24 * 60 * 60; // bearer tokens live one day
pub const DEFAULT_SECRET: &str = "change-me";
pub const MAX_INBOUND_BYTES: usize = 64 * 1024; // clients have nothing to say; cap what we read

/// Top-level config (eventhub.toml + EVENTHUB_* env overrides).
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct EventhubConfig {
    #[serde(default)]
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub notifications: NotificationsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_bind")]
    pub bind: String,
    #[serde(default)]
    pub auth: AuthConfig,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            bind: DEFAULT_BIND.to_string(),
            auth: AuthConfig::default(),
        }
    }
}

/// Signing settings for the REST surface's bearer tokens (HS256 JWTs).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    #[serde(default = "default_secret")]
    pub secret: String,
    /// Lifetime of tokens minted by `eventhub-gateway token`.
    #[serde(default = "default_token_ttl_secs")]
    pub token_ttl_secs: u64,
}

impl AuthConfig {
    /// True while the shipped placeholder secret is still configured.
    pub fn uses_default_secret(&self) -> bool {
        self.secret == DEFAULT_SECRET
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            secret: default_secret(),
            token_ttl_secs: DEFAULT_TOKEN_TTL_SECS,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationsConfig {
    /// Maximum number of notifications returned by the history endpoint.
    #[serde(default = "default_list_limit")]
    pub list_limit: usize,
    /// Seconds between WebSocket pings. 0 disables the heartbeat.
    #[serde(default = "default_heartbeat_secs")]
    pub heartbeat_secs: u64,
}

impl Default for NotificationsConfig {
    fn default() -> Self {
        Self {
            list_limit: DEFAULT_LIST_LIMIT,
            heartbeat_secs: DEFAULT_HEARTBEAT_SECS,
        }
    }
}

fn default_port() -> u16 {
    DEFAULT_PORT
}
fn default_bind() -> String {
    DEFAULT_BIND.to_string()
}
fn default_secret() -> String {
    DEFAULT_SECRET.to_string()
}
fn default_token_ttl_secs() -> u64 {
    DEFAULT_TOKEN_TTL_SECS
}
fn default_list_limit() -> usize {
    DEFAULT_LIST_LIMIT
}
fn default_heartbeat_secs() -> u64 {
    DEFAULT_HEARTBEAT_SECS
}
fn default_db_path() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{}/.eventhub/eventhub.db", home)
}

impl EventhubConfig {
    /// Load config from a TOML file with EVENTHUB_* env var overrides.
    ///
    /// Checks in order:
    ///   1. Explicit path argument
    ///   2. ~/.eventhub/eventhub.toml
    ///
    /// A missing file is not an error; defaults fill every section.
    pub fn load(config_path: Option<&str>) -> crate::error::Result<Self> {
        let path = config_path
            .map(String::from)
            .unwrap_or_else(default_config_path);

        Self::figment(&path)
            .extract()
            .map_err(|e| crate::error::EventhubError::Config(e.to_string()))
    }

    fn figment(path: &str) -> Figment {
        Figment::from(Serialized::defaults(EventhubConfig::default()))
            .merge(Toml::file(path))
            .merge(Env::prefixed("EVENTHUB_").split("__"))
    }

    /// `bind:port` string for the listener.
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.gateway.bind, self.gateway.port)
    }
}

fn default_config_path() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{}/.eventhub/eventhub.toml", home)
}
