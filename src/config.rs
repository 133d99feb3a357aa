use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {name}: {message}")]
    InvalidValue { name: String, message: String },
    #[error("failed to parse {name} as integer: {source}")]
    ParseInt {
        name: String,
        #[source]
        source: std::num::ParseIntError,
    },
}

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    // Tor
    pub tor_proxy: Option<String>,
    pub proxy_probe_timeout: Duration,

    // Fetching
    pub request_timeout: Duration,
    pub max_attempts: u32,
    pub retry_delay: Duration,

    // Detection
    pub forum_score_threshold: u32,

    // Watchlist
    pub scheduler_tick: Duration,

    // Database
    pub database_path: PathBuf,

    // Logging
    pub json_logs: bool,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if an environment variable is present but invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            // Tor
            tor_proxy: optional_env("TOR_PROXY"),
            proxy_probe_timeout: Duration::from_millis(parse_env_u64(
                "PROXY_PROBE_TIMEOUT_MS",
                500,
            )?),

            // Fetching
            request_timeout: Duration::from_secs(parse_env_u64("REQUEST_TIMEOUT_SECS", 15)?),
            max_attempts: parse_env_u32("MAX_ATTEMPTS", 3)?,
            retry_delay: Duration::from_secs(parse_env_u64("RETRY_DELAY_SECS", 2)?),

            // Detection
            forum_score_threshold: parse_env_u32("FORUM_SCORE_THRESHOLD", 5)?,

            // Watchlist
            scheduler_tick: Duration::from_secs(parse_env_u64("SCHEDULER_TICK_SECS", 60)?),

            // Database
            database_path: PathBuf::from(env_or_default(
                "DATABASE_PATH",
                "./data/scanner.sqlite",
            )),

            // Logging
            json_logs: parse_log_format(&env_or_default("LOG_FORMAT", "pretty"))?,
        })
    }

    /// Defaults suitable for tests: no retry delay, no configured proxy.
    #[must_use]
    pub fn for_testing() -> Self {
        Self {
            tor_proxy: None,
            proxy_probe_timeout: Duration::from_millis(500),
            request_timeout: Duration::from_secs(15),
            max_attempts: 3,
            retry_delay: Duration::ZERO,
            forum_score_threshold: 5,
            scheduler_tick: Duration::from_secs(60),
            database_path: PathBuf::from("./data/test.sqlite"),
            json_logs: false,
        }
    }

    /// Validate that the configuration is usable.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_attempts == 0 {
            return Err(ConfigError::InvalidValue {
                name: "MAX_ATTEMPTS".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        if self.request_timeout.is_zero() {
            return Err(ConfigError::InvalidValue {
                name: "REQUEST_TIMEOUT_SECS".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        if self.scheduler_tick.is_zero() {
            return Err(ConfigError::InvalidValue {
                name: "SCHEDULER_TICK_SECS".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        if let Some(proxy) = &self.tor_proxy {
            if url::Url::parse(proxy).is_err() {
                return Err(ConfigError::InvalidValue {
                    name: "TOR_PROXY".to_string(),
                    message: format!("not a valid proxy URL: '{proxy}'"),
                });
            }
        }
        Ok(())
    }
}

fn optional_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|s| !s.is_empty())
}

fn env_or_default(name: &str, default: &str) -> String {
    std::env::var(name)
        .ok()
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn parse_env_u64(name: &str, default: u64) -> Result<u64, ConfigError> {
    match std::env::var(name) {
        Ok(val) if !val.is_empty() => val.parse().map_err(|e| ConfigError::ParseInt {
            name: name.to_string(),
            source: e,
        }),
        _ => Ok(default),
    }
}

fn parse_env_u32(name: &str, default: u32) -> Result<u32, ConfigError> {
    match std::env::var(name) {
        Ok(val) if !val.is_empty() => val.parse().map_err(|e| ConfigError::ParseInt {
            name: name.to_string(),
            source: e,
        }),
        _ => Ok(default),
    }
}

fn parse_log_format(value: &str) -> Result<bool, ConfigError> {
    match value.to_lowercase().as_str() {
        "json" | "structured" => Ok(true),
        "pretty" | "text" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            name: "LOG_FORMAT".to_string(),
            message: format!("must be 'pretty' or 'json', got '{value}'"),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn test_parse_log_format() {
        assert!(parse_log_format("json").unwrap());
        assert!(parse_log_format("STRUCTURED").unwrap());
        assert!(!parse_log_format("pretty").unwrap());
        assert!(parse_log_format("xml").is_err());
    }

    #[test]
    #[serial]
    fn test_defaults_from_env() {
        for var in [
            "TOR_PROXY",
            "MAX_ATTEMPTS",
            "RETRY_DELAY_SECS",
            "FORUM_SCORE_THRESHOLD",
            "REQUEST_TIMEOUT_SECS",
        ] {
            std::env::remove_var(var);
        }

        let config = Config::from_env().unwrap();
        assert_eq!(config.tor_proxy, None);
        assert_eq!(config.max_attempts, 3);
        assert_eq!(config.retry_delay, Duration::from_secs(2));
        assert_eq!(config.forum_score_threshold, 5);
        assert_eq!(config.request_timeout, Duration::from_secs(15));
        assert!(config.validate().is_ok());
    }

    #[test]
    #[serial]
    fn test_invalid_attempts() {
        std::env::set_var("MAX_ATTEMPTS", "lots");
        assert!(matches!(
            Config::from_env(),
            Err(ConfigError::ParseInt { .. })
        ));
        std::env::set_var("MAX_ATTEMPTS", "0");
        let config = Config::from_env().unwrap();
        assert!(config.validate().is_err());
        std::env::remove_var("MAX_ATTEMPTS");
    }

    #[test]
    fn test_rejects_malformed_proxy() {
        let config = Config {
            tor_proxy: Some("not a url".to_string()),
            ..Config::for_testing()
        };
        assert!(config.validate().is_err());
    }
}
