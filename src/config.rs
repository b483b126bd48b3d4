//! Configuration resolution for qbit-exporter.
//!
//! All configuration is plain environment-style key/value lookup with CLI
//! overrides; there is no config file. Precedence: CLI flag > environment
//! variable > default. The upstream base URL is the only required value and
//! its absence is fatal before the listener binds.

use std::net::IpAddr;

use thiserror::Error;

use crate::cli::Args;

// Default configuration constants
pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 3001;
pub const DEFAULT_METRIC_PREFIX: &str = "qBit_";

// Environment variable names
pub const ENV_BASE_URL: &str = "QBIT_URL";
pub const ENV_USERNAME: &str = "QBIT_USER";
pub const ENV_PASSWORD: &str = "QBIT_PASS";
pub const ENV_LISTEN_PORT: &str = "LISTEN_PORT";
pub const ENV_BIND_ADDR: &str = "BIND_ADDR";
pub const ENV_METRIC_PREFIX: &str = "PROMETHEUS_PREFIX";

/// Effective configuration after resolution.
#[derive(Debug, Clone)]
pub struct Config {
    /// qBittorrent WebUI base URL, e.g. `http://localhost:8080`.
    pub base_url: String,
    pub username: String,
    pub password: String,
    pub bind: String,
    pub port: u16,
    /// Prefix prepended to every exported metric name.
    pub prefix: String,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("qBittorrent base URL is not configured: set QBIT_URL or pass --url")]
    MissingBaseUrl,

    #[error("invalid value {value:?} for {key}: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

/// Resolves the effective configuration from CLI arguments and the process
/// environment.
pub fn resolve_config(args: &Args) -> Result<Config, ConfigError> {
    resolve_config_from(args, |key| std::env::var(key).ok())
}

/// Resolution with an injectable environment lookup, so tests never touch
/// the process environment.
pub fn resolve_config_from<F>(args: &Args, env: F) -> Result<Config, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let base_url = args
        .url
        .clone()
        .or_else(|| env(ENV_BASE_URL))
        .ok_or(ConfigError::MissingBaseUrl)?;

    let username = args
        .username
        .clone()
        .or_else(|| env(ENV_USERNAME))
        .unwrap_or_default();
    let password = args
        .password
        .clone()
        .or_else(|| env(ENV_PASSWORD))
        .unwrap_or_default();

    let port = match (args.port, env(ENV_LISTEN_PORT)) {
        (Some(port), _) => port,
        (None, Some(raw)) => raw.parse().map_err(|e| ConfigError::Invalid {
            key: ENV_LISTEN_PORT,
            value: raw.clone(),
            reason: format!("{e}"),
        })?,
        (None, None) => DEFAULT_PORT,
    };

    let bind = args
        .bind
        .clone()
        .or_else(|| env(ENV_BIND_ADDR))
        .unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string());

    let prefix = args
        .prefix
        .clone()
        .or_else(|| env(ENV_METRIC_PREFIX))
        .unwrap_or_else(|| DEFAULT_METRIC_PREFIX.to_string());

    Ok(Config {
        base_url,
        username,
        password,
        bind,
        port,
        prefix,
    })
}

/// Validates the resolved configuration before any side effects happen.
pub fn validate_effective_config(config: &Config) -> Result<(), ConfigError> {
    if !config.base_url.starts_with("http://") && !config.base_url.starts_with("https://") {
        return Err(ConfigError::Invalid {
            key: ENV_BASE_URL,
            value: config.base_url.clone(),
            reason: "must start with http:// or https://".to_string(),
        });
    }
    if let Err(e) = config.bind.parse::<IpAddr>() {
        return Err(ConfigError::Invalid {
            key: ENV_BIND_ADDR,
            value: config.bind.clone(),
            reason: format!("{e}"),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn missing_base_url_is_fatal() {
        let err = resolve_config_from(&Args::default(), env_of(&[])).unwrap_err();
        assert!(matches!(err, ConfigError::MissingBaseUrl));
    }

    #[test]
    fn defaults_apply_when_only_url_is_set() {
        let config = resolve_config_from(
            &Args::default(),
            env_of(&[(ENV_BASE_URL, "http://localhost:8080")]),
        )
        .unwrap();
        assert_eq!(config.base_url, "http://localhost:8080");
        assert_eq!(config.username, "");
        assert_eq!(config.password, "");
        assert_eq!(config.port, DEFAULT_PORT);
        assert_eq!(config.bind, DEFAULT_BIND_ADDR);
        assert_eq!(config.prefix, DEFAULT_METRIC_PREFIX);
        assert!(validate_effective_config(&config).is_ok());
    }

    #[test]
    fn cli_flags_override_environment() {
        let args = Args {
            url: Some("http://cli:9090".to_string()),
            port: Some(9999),
            prefix: Some("torrents_".to_string()),
            ..Args::default()
        };
        let config = resolve_config_from(
            &args,
            env_of(&[
                (ENV_BASE_URL, "http://env:8080"),
                (ENV_LISTEN_PORT, "4000"),
                (ENV_METRIC_PREFIX, "env_"),
            ]),
        )
        .unwrap();
        assert_eq!(config.base_url, "http://cli:9090");
        assert_eq!(config.port, 9999);
        assert_eq!(config.prefix, "torrents_");
    }

    #[test]
    fn unparseable_port_is_rejected() {
        let err = resolve_config_from(
            &Args::default(),
            env_of(&[
                (ENV_BASE_URL, "http://localhost:8080"),
                (ENV_LISTEN_PORT, "not-a-port"),
            ]),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid {
                key: ENV_LISTEN_PORT,
                ..
            }
        ));
    }

    #[test]
    fn validation_rejects_bad_url_and_bind() {
        let mut config = resolve_config_from(
            &Args::default(),
            env_of(&[(ENV_BASE_URL, "localhost:8080")]),
        )
        .unwrap();
        assert!(validate_effective_config(&config).is_err());

        config.base_url = "http://localhost:8080".to_string();
        config.bind = "not-an-ip".to_string();
        assert!(validate_effective_config(&config).is_err());
    }
}
