//! Process configuration read from the environment (and `.env`)

use std::env;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::services::notion::DEFAULT_NOTION_BASE_URL;
use crate::services::oauth::{DEFAULT_STATE_TTL_SECS, OAuthClients};
use crate::services::retry::{DEFAULT_BASE_DELAY_MS, DEFAULT_MAX_ATTEMPTS, RetryPolicy};
use crate::services::sheets::DEFAULT_SHEETS_BASE_URL;

pub const ENV_DATABASE_URL: &str = "DATABASE_URL";
pub const ENV_BIND_ADDR: &str = "BIND_ADDR";
pub const ENV_NOTION_API_BASE_URL: &str = "NOTION_API_BASE_URL";
pub const ENV_SHEETS_API_BASE_URL: &str = "SHEETS_API_BASE_URL";
pub const ENV_SCHEDULER_TICK_SECS: &str = "SYNC_SCHEDULER_TICK_SECS";
pub const ENV_MAX_RETRIES: &str = "SYNC_MAX_RETRIES";
pub const ENV_RETRY_BASE_DELAY_MS: &str = "SYNC_RETRY_BASE_DELAY_MS";
pub const ENV_OAUTH_STATE_TTL_SECS: &str = "OAUTH_STATE_TTL_SECS";
pub const ENV_NOTION_CLIENT_ID: &str = "NOTION_CLIENT_ID";
pub const ENV_NOTION_CLIENT_SECRET: &str = "NOTION_CLIENT_SECRET";
pub const ENV_GOOGLE_CLIENT_ID: &str = "GOOGLE_CLIENT_ID";
pub const ENV_GOOGLE_CLIENT_SECRET: &str = "GOOGLE_CLIENT_SECRET";

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";
const DEFAULT_SCHEDULER_TICK_SECS: u64 = 60;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    Missing(&'static str),
    Invalid { key: &'static str, value: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Missing(key) => write!(f, "{} must be set", key),
            ConfigError::Invalid { key, value } => write!(f, "{} has invalid value '{}'", key, value),
        }
    }
}

impl std::error::Error for ConfigError {}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub bind_addr: String,
    pub notion_base_url: String,
    pub sheets_base_url: String,
    pub scheduler_tick: Duration,
    pub retry: RetryPolicy,
    pub oauth_clients: OAuthClients,
    pub oauth_state_ttl: Duration,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from any key lookup; blank values count as unset
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let database_url = get(ENV_DATABASE_URL).ok_or(ConfigError::Missing(ENV_DATABASE_URL))?;
        let tick_secs: u64 = parse_or(&get, ENV_SCHEDULER_TICK_SECS, DEFAULT_SCHEDULER_TICK_SECS)?;
        if tick_secs == 0 {
            return Err(ConfigError::Invalid {
                key: ENV_SCHEDULER_TICK_SECS,
                value: "0".to_string(),
            });
        }
        let max_attempts: u32 = parse_or(&get, ENV_MAX_RETRIES, DEFAULT_MAX_ATTEMPTS)?;
        let base_delay_ms: u64 = parse_or(&get, ENV_RETRY_BASE_DELAY_MS, DEFAULT_BASE_DELAY_MS)?;
        let state_ttl_secs: u64 = parse_or(&get, ENV_OAUTH_STATE_TTL_SECS, DEFAULT_STATE_TTL_SECS)?;

        Ok(Self {
            database_url,
            bind_addr: get(ENV_BIND_ADDR).unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string()),
            notion_base_url: get(ENV_NOTION_API_BASE_URL).unwrap_or_else(|| DEFAULT_NOTION_BASE_URL.to_string()),
            sheets_base_url: get(ENV_SHEETS_API_BASE_URL).unwrap_or_else(|| DEFAULT_SHEETS_BASE_URL.to_string()),
            scheduler_tick: Duration::from_secs(tick_secs),
            retry: RetryPolicy::new(max_attempts, Duration::from_millis(base_delay_ms)),
            oauth_clients: OAuthClients {
                notion_client_id: get(ENV_NOTION_CLIENT_ID).unwrap_or_default(),
                notion_client_secret: get(ENV_NOTION_CLIENT_SECRET).unwrap_or_default(),
                google_client_id: get(ENV_GOOGLE_CLIENT_ID).unwrap_or_default(),
                google_client_secret: get(ENV_GOOGLE_CLIENT_SECRET).unwrap_or_default(),
            },
            oauth_state_ttl: Duration::from_secs(state_ttl_secs),
        })
    }
}

fn parse_or<T, G>(get: &G, key: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        None => Ok(default),
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { key, value }),
    }
}
