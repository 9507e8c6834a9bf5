use crate::error::ConfigError;
use std::env;
use std::str::FromStr;
use std::time::Duration;

const DEFAULT_DATABASE_URL: &str = "sqlite:election_results.db";
const DEFAULT_MAX_CONNECTIONS: u32 = 5;
const DEFAULT_CLOSE_CHECK_INTERVAL_SECONDS: u64 = 60;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub max_connections: u32,
    pub close_check_interval: Duration,
    // Compute and pin results as soon as an election closes instead of on first view
    pub preload_on_close: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: DEFAULT_DATABASE_URL.to_string(),
            max_connections: DEFAULT_MAX_CONNECTIONS,
            close_check_interval: Duration::from_secs(DEFAULT_CLOSE_CHECK_INTERVAL_SECONDS),
            preload_on_close: true,
        }
    }
}

impl Config {
    /// Read settings from the environment (call `dotenvy::dotenv()` first to
    /// pick up a `.env` file). Unset variables fall back to defaults, but a
    /// value that is set and unparseable is an error.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let database_url = lookup("DATABASE_URL").unwrap_or(defaults.database_url);
        let max_connections = parse_or(&lookup, "DATABASE_MAX_CONNECTIONS", defaults.max_connections)?;
        let interval_secs = parse_or(
            &lookup,
            "CLOSE_CHECK_INTERVAL_SECONDS",
            DEFAULT_CLOSE_CHECK_INTERVAL_SECONDS,
        )?;
        let preload_on_close = parse_or(&lookup, "PRELOAD_ON_CLOSE", defaults.preload_on_close)?;

        if max_connections == 0 {
            return Err(ConfigError::InvalidValue {
                key: "DATABASE_MAX_CONNECTIONS",
                value: "0".to_string(),
            });
        }
        if interval_secs == 0 {
            return Err(ConfigError::InvalidValue {
                key: "CLOSE_CHECK_INTERVAL_SECONDS",
                value: "0".to_string(),
            });
        }

        Ok(Self {
            database_url,
            max_connections,
            close_check_interval: Duration::from_secs(interval_secs),
            preload_on_close,
        })
    }
}

fn parse_or<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match lookup(key) {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidValue { key, value }),
        None => Ok(default),
    }
}
