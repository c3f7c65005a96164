//! Configuration types.
//!
//! Provides the generic configuration model shared by every adapter:
//! - [`ConnectorConfig`]: Key-value configuration with typed accessors
//! - [`ConfigKeySpec`]: One documented key
//! - [`ConnectorInfo`]: Metadata about a registered module or bridge
//! - [`ConnectorState`]: Lifecycle state of a running runtime
//! - [`RuntimeConfig`]: Settings owned by the orchestrator itself

use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use crate::error::ConnectorError;

/// Settings for one Wormhole process.
///
/// A flat string map built from command-line flags, `WORMHOLE_*`
/// environment variables and `--set` pairs. Every adapter parses the keys
/// it owns into its own typed config during `setup`.
#[derive(Debug, Clone, Default)]
pub struct ConnectorConfig {
    /// "stargate" or "dimension".
    role: String,
    properties: HashMap<String, String>,
}

impl ConnectorConfig {
    /// Creates an empty config for `role`.
    #[must_use]
    pub fn new(role: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            properties: HashMap::new(),
        }
    }

    /// The role this process runs as.
    #[must_use]
    pub fn role(&self) -> &str {
        &self.role
    }

    /// Sets `key`, replacing any earlier value.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.properties.insert(key.into(), value.into());
    }

    /// Raw value of `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.properties.get(key).map(String::as_str)
    }

    /// Value of `key` parsed as `T`, surrounding whitespace ignored.
    ///
    /// # Errors
    ///
    /// Returns `ConnectorError::ConfigurationError` naming the key if the
    /// value does not parse.
    pub fn get_parsed<T: std::str::FromStr>(&self, key: &str) -> Result<Option<T>, ConnectorError>
    where
        T::Err: fmt::Display,
    {
        let Some(raw) = self.get(key) else {
            return Ok(None);
        };
        raw.trim().parse::<T>().map(Some).map_err(|e| {
            ConnectorError::ConfigurationError(format!("invalid value for '{key}': {e}"))
        })
    }

    /// Comma-separated value of `key`, trimmed, empty items dropped.
    #[must_use]
    pub fn get_list(&self, key: &str) -> Option<Vec<String>> {
        self.get(key).map(|v| {
            v.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect()
        })
    }

    /// Whole seconds stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns `ConnectorError::ConfigurationError` if the value is not an
    /// unsigned integer.
    pub fn get_secs(&self, key: &str) -> Result<Option<Duration>, ConnectorError> {
        Ok(self.get_parsed::<u64>(key)?.map(Duration::from_secs))
    }

    /// Every key starting with `prefix`, with the prefix removed.
    #[must_use]
    pub fn properties_with_prefix(&self, prefix: &str) -> HashMap<String, String> {
        self.properties
            .iter()
            .filter_map(|(k, v)| k.strip_prefix(prefix).map(|rest| (rest.to_string(), v.clone())))
            .collect()
    }
}

/// One configuration key an adapter reads, as listed by `help()`.
#[derive(Debug, Clone)]
pub struct ConfigKeySpec {
    /// Key name.
    pub key: String,
    /// One-line description.
    pub description: String,
    /// Whether setup fails without it.
    pub required: bool,
    /// Value used when unset.
    pub default: Option<String>,
}

impl ConfigKeySpec {
    /// A key with no default.
    #[must_use]
    pub fn required(key: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            description: description.into(),
            required: true,
            default: None,
        }
    }

    /// A key that falls back to `default`.
    #[must_use]
    pub fn optional(
        key: impl Into<String>,
        description: impl Into<String>,
        default: impl Into<String>,
    ) -> Self {
        Self {
            key: key.into(),
            description: description.into(),
            required: false,
            default: Some(default.into()),
        }
    }
}

impl fmt::Display for ConfigKeySpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.default, self.required) {
            (Some(default), _) => write!(
                f,
                "{:<28} {} (default: {default})",
                self.key, self.description
            ),
            (None, true) => write!(f, "{:<28} {} (required)", self.key, self.description),
            (None, false) => write!(f, "{:<28} {}", self.key, self.description),
        }
    }
}

/// Metadata about a registered module or bridge.
#[derive(Debug, Clone)]
pub struct ConnectorInfo {
    /// Registry name (e.g., "kafka", "file").
    pub name: String,

    /// One-line summary shown by `help()`.
    pub description: String,

    /// Configuration keys this adapter reads.
    pub config_keys: Vec<ConfigKeySpec>,
}

impl ConnectorInfo {
    /// Creates adapter metadata.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        config_keys: Vec<ConfigKeySpec>,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            config_keys,
        }
    }

    /// Renders the help text for this adapter.
    #[must_use]
    pub fn help(&self) -> String {
        let mut out = format!("{}: {}\n", self.name, self.description);
        for spec in &self.config_keys {
            out.push_str("  ");
            out.push_str(&spec.to_string());
            out.push('\n');
        }
        out
    }
}

/// Lifecycle state of a runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectorState {
    /// Runtime has been created but not yet set up.
    Created,

    /// Module and bridge are wired and ready to run.
    Initialized,

    /// Module and bridge are running.
    Running,

    /// Shutdown has been requested; waiting for both sides to return.
    Draining,

    /// Both sides returned without error.
    Closed,

    /// One side returned an error.
    Failed,
}

impl fmt::Display for ConnectorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Created => "Created",
            Self::Initialized => "Initialized",
            Self::Running => "Running",
            Self::Draining => "Draining",
            Self::Closed => "Closed",
            Self::Failed => "Failed",
        };
        f.write_str(name)
    }
}

/// Settings owned by the orchestrator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeConfig {
    /// Capacity of the bounded queue between module and bridge.
    pub channel_size: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self { channel_size: 100 }
    }
}

impl RuntimeConfig {
    /// Parses a [`RuntimeConfig`] from a [`ConnectorConfig`].
    ///
    /// # Errors
    ///
    /// Returns `ConnectorError::ConfigurationError` if a value is invalid.
    pub fn from_config(config: &ConnectorConfig) -> Result<Self, ConnectorError> {
        let cfg = Self {
            channel_size: config
                .get_parsed::<usize>("runtime.channel.size")?
                .unwrap_or(100),
        };
        cfg.validate()?;
        Ok(cfg)
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConnectorError::ConfigurationError` if the channel size is zero.
    pub fn validate(&self) -> Result<(), ConnectorError> {
        if self.channel_size == 0 {
            return Err(ConnectorError::ConfigurationError(
                "runtime.channel.size must be > 0".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_basic_operations() {
        let mut config = ConnectorConfig::new("stargate");
        config.set("kafka.addrs", "localhost:9092");
        config.set("kafka.topics", "events");

        assert_eq!(config.role(), "stargate");
        assert_eq!(config.get("kafka.addrs"), Some("localhost:9092"));
        assert_eq!(config.get("missing"), None);

        config.set("kafka.addrs", "broker:9092");
        assert_eq!(config.get("kafka.addrs"), Some("broker:9092"));
    }

    #[test]
    fn test_config_parsed() {
        let mut config = ConnectorConfig::new("dimension");
        config.set("spool.scan.interval.secs", " 5 ");
        config.set("bad_number", "five");

        let secs: Option<u64> = config.get_parsed("spool.scan.interval.secs").unwrap();
        assert_eq!(secs, Some(5));
        assert_eq!(
            config.get_secs("spool.scan.interval.secs").unwrap(),
            Some(Duration::from_secs(5))
        );

        let missing: Option<u64> = config.get_parsed("missing").unwrap();
        assert_eq!(missing, None);

        assert!(matches!(
            config.get_parsed::<u64>("bad_number"),
            Err(ConnectorError::ConfigurationError(msg)) if msg.contains("bad_number")
        ));
    }

    #[test]
    fn test_config_list() {
        let mut config = ConnectorConfig::new("stargate");
        config.set("kafka.addrs", "10.0.0.1:9092, 10.0.0.2:9092,,");

        assert_eq!(
            config.get_list("kafka.addrs"),
            Some(vec!["10.0.0.1:9092".to_string(), "10.0.0.2:9092".to_string()])
        );
        assert_eq!(config.get_list("kafka.topics"), None);
    }

    #[test]
    fn test_config_prefix_extraction() {
        let mut config = ConnectorConfig::new("stargate");
        config.set("kafka.client.socket.timeout.ms", "30000");
        config.set("kafka.addrs", "localhost:9092");

        let props = config.properties_with_prefix("kafka.client.");
        assert_eq!(props.len(), 1);
        assert_eq!(
            props.get("socket.timeout.ms"),
            Some(&"30000".to_string())
        );
    }

    #[test]
    fn test_connector_info_help() {
        let info = ConnectorInfo::new(
            "file",
            "durable spool bridge",
            vec![ConfigKeySpec::optional(
                "spool.handling.path",
                "Hand-off directory",
                "./tmp",
            )],
        );
        let help = info.help();
        assert!(help.starts_with("file: durable spool bridge"));
        assert!(help.contains("spool.handling.path"));
        assert!(help.contains("default: ./tmp"));
    }

    #[test]
    fn test_runtime_config() {
        let mut config = ConnectorConfig::new("stargate");
        assert_eq!(RuntimeConfig::from_config(&config).unwrap().channel_size, 100);

        config.set("runtime.channel.size", "0");
        assert!(RuntimeConfig::from_config(&config).is_err());
    }

    #[test]
    fn test_connector_state_display() {
        assert_eq!(ConnectorState::Running.to_string(), "Running");
        assert_eq!(ConnectorState::Failed.to_string(), "Failed");
    }
}
