//! Runtime configuration, read from the environment.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Log filter used when `RUST_LOG` is unset.
pub const DEFAULT_LOG_FILTER: &str = "jira_relay=debug";
pub const DEFAULT_WORKERS: usize = 4;
pub const DEFAULT_QUEUE_CAPACITY: usize = 1024;
pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),

    #[error("invalid value {value:?} for {name}: {reason}")]
    Invalid {
        name: &'static str,
        value: String,
        reason: String,
    },
}

/// Everything the binary needs to start.
#[derive(Clone, PartialEq, Eq)]
pub struct RelayConfig {
    pub listen_addr: SocketAddr,
    pub workers: usize,
    pub queue_capacity: usize,
    pub webhook_secret: String,
    /// JSON seed for the in-memory store; starts empty when unset.
    pub store_path: Option<PathBuf>,
    pub mattermost_url: String,
    pub mattermost_bot_token: String,
    pub mattermost_bot_user_id: String,
    pub http_timeout: Duration,
}

impl std::fmt::Debug for RelayConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RelayConfig")
            .field("listen_addr", &self.listen_addr)
            .field("workers", &self.workers)
            .field("queue_capacity", &self.queue_capacity)
            .field("webhook_secret", &"<redacted>")
            .field("store_path", &self.store_path)
            .field("mattermost_url", &self.mattermost_url)
            .field("mattermost_bot_token", &"<redacted>")
            .field("mattermost_bot_user_id", &self.mattermost_bot_user_id)
            .field("http_timeout", &self.http_timeout)
            .finish()
    }
}

impl RelayConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds the config from any variable source. Blank values count as unset.
    pub fn from_lookup<L>(lookup: L) -> Result<Self, ConfigError>
    where
        L: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let required = |name: &'static str| get(name).ok_or(ConfigError::Missing(name));

        let listen_addr = match get("JIRA_RELAY_LISTEN_ADDR") {
            Some(value) => value.parse::<SocketAddr>().map_err(|e: std::net::AddrParseError| {
                ConfigError::Invalid {
                    name: "JIRA_RELAY_LISTEN_ADDR",
                    value,
                    reason: e.to_string(),
                }
            })?,
            None => SocketAddr::from(([0, 0, 0, 0], 3000)),
        };

        let workers = positive(get("JIRA_RELAY_WORKERS"), "JIRA_RELAY_WORKERS", DEFAULT_WORKERS)?;
        let queue_capacity = positive(
            get("JIRA_RELAY_QUEUE_CAPACITY"),
            "JIRA_RELAY_QUEUE_CAPACITY",
            DEFAULT_QUEUE_CAPACITY,
        )?;
        let timeout_secs = positive(
            get("JIRA_RELAY_HTTP_TIMEOUT_SECS"),
            "JIRA_RELAY_HTTP_TIMEOUT_SECS",
            DEFAULT_HTTP_TIMEOUT.as_secs() as usize,
        )?;

        Ok(RelayConfig {
            listen_addr,
            workers,
            queue_capacity,
            webhook_secret: required("JIRA_RELAY_WEBHOOK_SECRET")?,
            store_path: get("JIRA_RELAY_STORE_PATH").map(PathBuf::from),
            mattermost_url: required("MATTERMOST_URL")?,
            mattermost_bot_token: required("MATTERMOST_BOT_TOKEN")?,
            mattermost_bot_user_id: required("MATTERMOST_BOT_USER_ID")?,
            http_timeout: Duration::from_secs(timeout_secs as u64),
        })
    }
}

fn positive(
    value: Option<String>,
    name: &'static str,
    default: usize,
) -> Result<usize, ConfigError> {
    let Some(value) = value else {
        return Ok(default);
    };
    match value.parse::<usize>() {
        Ok(0) => Err(ConfigError::Invalid {
            name,
            value,
            reason: "must be at least 1".to_string(),
        }),
        Ok(n) => Ok(n),
        Err(e) => Err(ConfigError::Invalid {
            name,
            reason: e.to_string(),
            value,
        }),
    }
}
