//! # Service Configuration
//!
//! All settings come from the environment:
//!
//! | Variable             | Default   | Meaning                                   |
//! |----------------------|-----------|-------------------------------------------|
//! | `HOST`               | `0.0.0.0` | Bind address                              |
//! | `PORT`               | `8080`    | Bind port                                 |
//! | `DATABASE_URL`       | unset     | Postgres URL; unset means in-memory mode  |
//! | `AUTH_TOKEN`         | unset     | Bearer token; unset disables auth         |
//! | `STORAGE_TIMEOUT_MS` | `5000`    | Deadline for each storage call            |
//! | `LOG_FORMAT`         | `plain`   | `plain` or `json`                         |

use std::time::Duration;

use receiptor_rules::EngineConfig;
use thiserror::Error;
use tracing_subscriber::EnvFilter;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}

/// Log line format for the service.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    #[default]
    Plain,
    Json,
}

/// Runtime configuration for the API service.
///
/// Custom `Debug` redacts the auth token and the database URL, which may
/// carry a password.
#[derive(Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub database_url: Option<String>,
    /// Static bearer token. If `None`, authentication is disabled.
    pub auth_token: Option<String>,
    pub storage_timeout: Duration,
    pub log_format: LogFormat,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database_url", &self.database_url.as_ref().map(|_| "[REDACTED]"))
            .field("auth_token", &self.auth_token.as_ref().map(|_| "[REDACTED]"))
            .field("storage_timeout", &self.storage_timeout)
            .field("log_format", &self.log_format)
            .finish()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            database_url: None,
            auth_token: None,
            storage_timeout: Duration::from_millis(5000),
            log_format: LogFormat::Plain,
        }
    }
}

impl AppConfig {
    /// Load configuration from process environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let port = match non_empty("PORT") {
            Some(raw) => raw.trim().parse().map_err(|e| ConfigError::Invalid {
                key: "PORT",
                reason: format!("{e}"),
            })?,
            None => defaults.port,
        };

        let storage_timeout = match non_empty("STORAGE_TIMEOUT_MS") {
            Some(raw) => {
                let ms: u64 = raw.trim().parse().map_err(|e| ConfigError::Invalid {
                    key: "STORAGE_TIMEOUT_MS",
                    reason: format!("{e}"),
                })?;
                if ms == 0 {
                    return Err(ConfigError::Invalid {
                        key: "STORAGE_TIMEOUT_MS",
                        reason: "must be greater than zero".to_string(),
                    });
                }
                Duration::from_millis(ms)
            }
            None => defaults.storage_timeout,
        };

        let log_format = match non_empty("LOG_FORMAT").as_deref().map(str::trim) {
            None | Some("plain") => LogFormat::Plain,
            Some("json") => LogFormat::Json,
            Some(other) => {
                return Err(ConfigError::Invalid {
                    key: "LOG_FORMAT",
                    reason: format!("expected `plain` or `json`, got `{other}`"),
                })
            }
        };

        Ok(Self {
            host: non_empty("HOST").unwrap_or(defaults.host),
            port,
            database_url: non_empty("DATABASE_URL"),
            auth_token: non_empty("AUTH_TOKEN"),
            storage_timeout,
            log_format,
        })
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            storage_timeout: self.storage_timeout,
        }
    }
}

/// Initialize the global tracing subscriber.
///
/// The filter comes from `RUST_LOG`, defaulting to `info`.
pub fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(true);
    match format {
        LogFormat::Plain => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<AppConfig, ConfigError> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn defaults_when_nothing_set() {
        let cfg = load(&[]).unwrap();
        assert_eq!(cfg.host, "0.0.0.0");
        assert_eq!(cfg.port, 8080);
        assert!(cfg.database_url.is_none());
        assert!(cfg.auth_token.is_none());
        assert_eq!(cfg.storage_timeout, Duration::from_secs(5));
        assert_eq!(cfg.log_format, LogFormat::Plain);
    }

    #[test]
    fn reads_all_variables() {
        let cfg = load(&[
            ("HOST", "127.0.0.1"),
            ("PORT", "3000"),
            ("DATABASE_URL", "postgres://localhost/receiptor"),
            ("AUTH_TOKEN", "s3cret"),
            ("STORAGE_TIMEOUT_MS", "250"),
            ("LOG_FORMAT", "json"),
        ])
        .unwrap();
        assert_eq!(cfg.bind_addr(), "127.0.0.1:3000");
        assert_eq!(cfg.database_url.as_deref(), Some("postgres://localhost/receiptor"));
        assert_eq!(cfg.auth_token.as_deref(), Some("s3cret"));
        assert_eq!(cfg.engine_config().storage_timeout, Duration::from_millis(250));
        assert_eq!(cfg.log_format, LogFormat::Json);
    }

    #[test]
    fn empty_values_count_as_unset() {
        let cfg = load(&[("AUTH_TOKEN", ""), ("DATABASE_URL", "  ")]).unwrap();
        assert!(cfg.auth_token.is_none());
        assert!(cfg.database_url.is_none());
    }

    #[test]
    fn invalid_port_is_rejected() {
        let err = load(&[("PORT", "eighty")]).unwrap_err();
        assert!(err.to_string().contains("PORT"));
    }

    #[test]
    fn zero_timeout_is_rejected() {
        assert!(load(&[("STORAGE_TIMEOUT_MS", "0")]).is_err());
    }

    #[test]
    fn unknown_log_format_is_rejected() {
        let err = load(&[("LOG_FORMAT", "xml")]).unwrap_err();
        assert!(err.to_string().contains("LOG_FORMAT"));
    }

    #[test]
    fn debug_redacts_secrets() {
        let cfg = load(&[
            ("AUTH_TOKEN", "s3cret"),
            ("DATABASE_URL", "postgres://user:hunter2@db/receiptor"),
        ])
        .unwrap();
        let debug = format!("{cfg:?}");
        assert!(!debug.contains("s3cret"));
        assert!(!debug.contains("hunter2"));
        assert!(debug.contains("[REDACTED]"));
    }
}
