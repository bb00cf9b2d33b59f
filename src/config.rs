//! Runtime configuration sourced from `ACCOUNTDECK_*` environment variables.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::folder::{self, FolderRules};

pub const DEFAULT_BIND: &str = "127.0.0.1:5000";
pub const DEFAULT_LOG_FILTER: &str = "accountdeck=info,sqlx=warn";

const DEFAULT_SESSION_TTL_SECS: u64 = 12 * 60 * 60;
const DEFAULT_PASSWORD_ITERATIONS: u32 = 200_000;
const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;
const DEFAULT_MAX_CONNECTIONS: u32 = 4;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("ACCOUNTDECK_BIND `{value}` is not a socket address")]
    InvalidBind { value: String },
    #[error("ACCOUNTDECK_FOLDER_ALIASES: {0}")]
    InvalidFolderAlias(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub db_path: PathBuf,
    pub bind: SocketAddr,
    pub login_enabled: bool,
    pub session_ttl: Duration,
    pub password_iterations: u32,
    pub busy_timeout: Duration,
    pub max_connections: u32,
    pub log_filter: String,
    pub log_dir: Option<PathBuf>,
    pub folders: FolderRules,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a config from any key lookup. Malformed numbers fall back to
    /// their defaults and out-of-range numbers are clamped; only values that
    /// cannot be defaulted sensibly are reported as errors.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let db_path = get("ACCOUNTDECK_DB")
            .map(PathBuf::from)
            .unwrap_or_else(default_db_path);

        let bind_raw = get("ACCOUNTDECK_BIND").unwrap_or_else(|| DEFAULT_BIND.to_string());
        let bind = bind_raw
            .parse::<SocketAddr>()
            .map_err(|_| ConfigError::InvalidBind { value: bind_raw })?;

        let login_enabled = get("ACCOUNTDECK_LOGIN_ENABLED")
            .map(|v| parse_flag(&v))
            .unwrap_or(false);

        let session_ttl_secs = get("ACCOUNTDECK_SESSION_TTL_SECS")
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(DEFAULT_SESSION_TTL_SECS)
            .clamp(60, 30 * 24 * 60 * 60);

        let password_iterations = get("ACCOUNTDECK_PASSWORD_ITERATIONS")
            .and_then(|v| v.parse::<u32>().ok())
            .unwrap_or(DEFAULT_PASSWORD_ITERATIONS)
            .clamp(1_000, 5_000_000);

        let busy_timeout_ms = get("ACCOUNTDECK_BUSY_TIMEOUT_MS")
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(DEFAULT_BUSY_TIMEOUT_MS)
            .min(60_000);

        let max_connections = get("ACCOUNTDECK_MAX_CONNECTIONS")
            .and_then(|v| v.parse::<u32>().ok())
            .unwrap_or(DEFAULT_MAX_CONNECTIONS)
            .clamp(1, 32);

        let log_filter = get("ACCOUNTDECK_LOG")
            .or_else(|| get("RUST_LOG"))
            .unwrap_or_else(|| DEFAULT_LOG_FILTER.to_string());

        let log_dir = get("ACCOUNTDECK_LOG_DIR").map(PathBuf::from);

        let fallback =
            get("ACCOUNTDECK_FOLDER_FALLBACK").unwrap_or_else(|| folder::DEFAULT_FALLBACK.into());
        let aliases = folder::parse_aliases(
            &get("ACCOUNTDECK_FOLDER_ALIASES").unwrap_or_else(|| folder::DEFAULT_ALIASES.into()),
        )
        .map_err(ConfigError::InvalidFolderAlias)?;

        Ok(Config {
            db_path,
            bind,
            login_enabled,
            session_ttl: Duration::from_secs(session_ttl_secs),
            password_iterations,
            busy_timeout: Duration::from_millis(busy_timeout_ms),
            max_connections,
            log_filter,
            log_dir,
            folders: FolderRules::new(fallback, aliases),
        })
    }

    /// Defaults with the database placed at `db_path`. Handy for tools and tests.
    pub fn for_db(db_path: impl Into<PathBuf>) -> Self {
        Config {
            db_path: db_path.into(),
            ..Config::default()
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            db_path: default_db_path(),
            bind: SocketAddr::from(([127, 0, 0, 1], 5000)),
            login_enabled: false,
            session_ttl: Duration::from_secs(DEFAULT_SESSION_TTL_SECS),
            password_iterations: DEFAULT_PASSWORD_ITERATIONS,
            busy_timeout: Duration::from_millis(DEFAULT_BUSY_TIMEOUT_MS),
            max_connections: DEFAULT_MAX_CONNECTIONS,
            log_filter: DEFAULT_LOG_FILTER.to_string(),
            log_dir: None,
            folders: FolderRules::default(),
        }
    }
}

fn parse_flag(raw: &str) -> bool {
    matches!(
        raw.to_ascii_lowercase().as_str(),
        "1" | "true" | "on" | "yes"
    )
}

pub fn default_db_path() -> PathBuf {
    let base = dirs::data_dir()
        .or_else(|| std::env::current_dir().ok())
        .unwrap_or_else(std::env::temp_dir);
    base.join("accountdeck").join("accountdeck.sqlite3")
}
