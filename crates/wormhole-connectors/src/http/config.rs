//! HTTP adapter configuration.

use std::time::Duration;

use crate::config::{ConfigKeySpec, ConnectorConfig};
use crate::error::ConnectorError;

/// Default listen address of the ingest server.
pub const DEFAULT_LISTEN: &str = "0.0.0.0:8080";

/// Default host requests are replayed against.
pub const DEFAULT_BIND: &str = "127.0.0.1:8081";

/// Default per-request timeout of the delivery client.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

fn check_address(key: &str, addr: &str) -> Result<(), ConnectorError> {
    match addr.rsplit_once(':') {
        Some((host, port)) if !host.is_empty() && port.parse::<u16>().is_ok() => Ok(()),
        _ => Err(ConnectorError::ConfigurationError(format!(
            "{key} must be host:port, got '{addr}'"
        ))),
    }
}

/// Settings of the `http` ingest module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpServerConfig {
    /// Address the server listens on.
    pub listen: String,
}

impl Default for HttpServerConfig {
    fn default() -> Self {
        Self {
            listen: DEFAULT_LISTEN.to_string(),
        }
    }
}

impl HttpServerConfig {
    /// Parses an [`HttpServerConfig`] from a [`ConnectorConfig`].
    ///
    /// # Errors
    ///
    /// Returns `ConnectorError::ConfigurationError` if the address is malformed.
    pub fn from_config(config: &ConnectorConfig) -> Result<Self, ConnectorError> {
        let cfg = Self {
            listen: config.get("http.listen").unwrap_or(DEFAULT_LISTEN).to_string(),
        };
        cfg.validate()?;
        Ok(cfg)
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConnectorError::ConfigurationError` if the address is malformed.
    pub fn validate(&self) -> Result<(), ConnectorError> {
        check_address("http.listen", &self.listen)
    }

    /// Configuration keys of the ingest server.
    #[must_use]
    pub fn config_keys() -> Vec<ConfigKeySpec> {
        vec![ConfigKeySpec::optional(
            "http.listen",
            "Address the ingest server listens on",
            DEFAULT_LISTEN,
        )]
    }
}

/// Settings of the `http` delivery module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpClientConfig {
    /// Host (`host:port`) every request is replayed against.
    pub bind: String,
    /// Timeout of one replayed request.
    pub timeout: Duration,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            bind: DEFAULT_BIND.to_string(),
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl HttpClientConfig {
    /// Parses an [`HttpClientConfig`] from a [`ConnectorConfig`].
    ///
    /// # Errors
    ///
    /// Returns `ConnectorError::ConfigurationError` if a value is invalid.
    pub fn from_config(config: &ConnectorConfig) -> Result<Self, ConnectorError> {
        let cfg = Self {
            bind: config.get("http.bind").unwrap_or(DEFAULT_BIND).to_string(),
            timeout: config
                .get_secs("http.timeout.secs")?
                .unwrap_or(DEFAULT_TIMEOUT),
        };
        cfg.validate()?;
        Ok(cfg)
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConnectorError::ConfigurationError` if the host is malformed
    /// or the timeout is zero.
    pub fn validate(&self) -> Result<(), ConnectorError> {
        let host = self
            .bind
            .trim_start_matches("http://")
            .trim_start_matches("https://");
        check_address("http.bind", host)?;
        if self.timeout.is_zero() {
            return Err(ConnectorError::ConfigurationError(
                "http.timeout.secs must be > 0".into(),
            ));
        }
        Ok(())
    }

    /// Configuration keys of the delivery client.
    #[must_use]
    pub fn config_keys() -> Vec<ConfigKeySpec> {
        vec![
            ConfigKeySpec::optional("http.bind", "Host requests are replayed against", DEFAULT_BIND),
            ConfigKeySpec::optional(
                "http.timeout.secs",
                "Timeout of one replayed request",
                DEFAULT_TIMEOUT.as_secs().to_string(),
            ),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_defaults() {
        let cfg = HttpServerConfig::from_config(&ConnectorConfig::new("stargate")).unwrap();
        assert_eq!(cfg, HttpServerConfig::default());
        assert_eq!(cfg.listen, "0.0.0.0:8080");
    }

    #[test]
    fn test_server_rejects_bad_listen() {
        let mut config = ConnectorConfig::new("stargate");
        config.set("http.listen", "8080");
        assert!(HttpServerConfig::from_config(&config).is_err());
        config.set("http.listen", "localhost:http");
        assert!(HttpServerConfig::from_config(&config).is_err());
    }

    #[test]
    fn test_client_config() {
        let mut config = ConnectorConfig::new("dimension");
        config.set("http.bind", "backend.internal:9000");
        config.set("http.timeout.secs", "3");
        let cfg = HttpClientConfig::from_config(&config).unwrap();
        assert_eq!(cfg.bind, "backend.internal:9000");
        assert_eq!(cfg.timeout, Duration::from_secs(3));

        config.set("http.timeout.secs", "0");
        assert!(HttpClientConfig::from_config(&config).is_err());
    }

    #[test]
    fn test_client_accepts_scheme() {
        let mut config = ConnectorConfig::new("dimension");
        config.set("http.bind", "https://backend:443");
        assert!(HttpClientConfig::from_config(&config).is_ok());
    }
}
