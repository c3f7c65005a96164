//! Kafka consumer and producer configuration.
//!
//! Provides [`KafkaConsumerConfig`] and [`KafkaProducerConfig`], both parsed
//! from the shared [`ConnectorConfig`]. Properties under `kafka.client.` are
//! handed to librdkafka verbatim and override the derived settings.

use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use rand::Rng;
use rdkafka::config::ClientConfig;

use crate::config::{ConfigKeySpec, ConnectorConfig};
use crate::error::ConnectorError;
use crate::retry::RetryPolicy;

/// Default broker address list.
pub const DEFAULT_BROKERS: &str = "127.0.0.1:9092";

/// Default consumer group.
pub const DEFAULT_GROUP_ID: &str = "wormhole_stargate";

/// Default number of marked records between offset commits.
pub const DEFAULT_COMMIT_LIMIT: u64 = 100;

const KIB: u64 = 1024;
const MIB: u64 = 1024 * KIB;

/// Prefix of properties passed straight to librdkafka.
pub const PASSTHROUGH_PREFIX: &str = "kafka.client.";

/// SASL mechanism used when credentials are configured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SaslMechanism {
    /// Username and password in clear text.
    #[default]
    Plain,
    /// SCRAM with SHA-256.
    ScramSha256,
    /// SCRAM with SHA-512.
    ScramSha512,
}

impl SaslMechanism {
    /// Returns the rdkafka config value string.
    #[must_use]
    pub fn as_rdkafka_str(&self) -> &'static str {
        match self {
            SaslMechanism::Plain => "PLAIN",
            SaslMechanism::ScramSha256 => "SCRAM-SHA-256",
            SaslMechanism::ScramSha512 => "SCRAM-SHA-512",
        }
    }
}

impl std::str::FromStr for SaslMechanism {
    type Err = ConnectorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().replace('_', "-").as_str() {
            "PLAIN" => Ok(SaslMechanism::Plain),
            "SCRAM-SHA-256" => Ok(SaslMechanism::ScramSha256),
            "SCRAM-SHA-512" => Ok(SaslMechanism::ScramSha512),
            other => Err(ConnectorError::ConfigurationError(format!(
                "invalid kafka.mechanism: '{other}' (expected PLAIN/SCRAM-SHA-256/SCRAM-SHA-512)"
            ))),
        }
    }
}

impl fmt::Display for SaslMechanism {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_rdkafka_str())
    }
}

/// SASL credentials.
#[derive(Clone, PartialEq, Eq)]
pub struct SaslConfig {
    /// SASL username.
    pub username: String,
    /// SASL password.
    pub password: String,
    /// SASL mechanism.
    pub mechanism: SaslMechanism,
}

impl fmt::Debug for SaslConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SaslConfig")
            .field("username", &self.username)
            .field("mechanism", &self.mechanism)
            .finish_non_exhaustive()
    }
}

impl SaslConfig {
    /// Reads `kafka.user`, `kafka.passwd` and `kafka.mechanism`.
    ///
    /// Returns `None` when no username is configured.
    ///
    /// # Errors
    ///
    /// Returns `ConnectorError::ConfigurationError` if only one of user and
    /// password is set, or the mechanism is unknown.
    pub fn from_config(config: &ConnectorConfig) -> Result<Option<Self>, ConnectorError> {
        let mechanism = match config.get("kafka.mechanism") {
            Some(m) => m.parse()?,
            None => SaslMechanism::default(),
        };
        match (config.get("kafka.user"), config.get("kafka.passwd")) {
            (Some(u), Some(p)) if !u.is_empty() => Ok(Some(Self {
                username: u.to_string(),
                password: p.to_string(),
                mechanism,
            })),
            (Some(u), None) if !u.is_empty() => Err(ConnectorError::ConfigurationError(
                "kafka.user and kafka.passwd must both be set".into(),
            )),
            (None, Some(_)) => Err(ConnectorError::ConfigurationError(
                "kafka.user and kafka.passwd must both be set".into(),
            )),
            _ => Ok(None),
        }
    }

    fn apply(&self, config: &mut ClientConfig) {
        config.set("security.protocol", "SASL_PLAINTEXT");
        config.set("sasl.mechanisms", self.mechanism.as_rdkafka_str());
        config.set("sasl.username", &self.username);
        config.set("sasl.password", &self.password);
    }
}

/// Auto-offset reset policy for new consumer groups.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OffsetReset {
    /// Start from the earliest available offset.
    Earliest,
    /// Start from the latest offset (only new messages).
    Latest,
}

impl OffsetReset {
    /// Returns the rdkafka config value string.
    #[must_use]
    pub fn as_rdkafka_str(&self) -> &'static str {
        match self {
            OffsetReset::Earliest => "earliest",
            OffsetReset::Latest => "latest",
        }
    }
}

impl std::str::FromStr for OffsetReset {
    type Err = ConnectorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "earliest" | "oldest" => Ok(OffsetReset::Earliest),
            "latest" | "newest" => Ok(OffsetReset::Latest),
            other => Err(ConnectorError::ConfigurationError(format!(
                "invalid kafka.offset.reset: '{other}' (expected earliest/latest)"
            ))),
        }
    }
}

fn brokers(config: &ConnectorConfig) -> String {
    config
        .get_list("kafka.addrs")
        .filter(|addrs| !addrs.is_empty())
        .map_or_else(|| DEFAULT_BROKERS.to_string(), |addrs| addrs.join(","))
}

/// Consumer-group configuration for the Kafka ingest side.
#[derive(Debug, Clone)]
pub struct KafkaConsumerConfig {
    /// Comma-separated list of broker addresses.
    pub bootstrap_servers: String,
    /// Consumer group identifier.
    pub group_id: String,
    /// Topics to subscribe to.
    pub topics: Vec<String>,
    /// Optional SASL credentials.
    pub sasl: Option<SaslConfig>,
    /// Where to start reading when no committed offset exists.
    pub auto_offset_reset: OffsetReset,
    /// Minimum bytes per fetch response.
    pub fetch_min_bytes: u64,
    /// Maximum bytes per partition per fetch.
    pub max_partition_fetch_bytes: u64,
    /// Maximum bytes per fetch response.
    pub fetch_max_bytes: u64,
    /// Largest message the client accepts.
    pub message_max_bytes: u64,
    /// Group heartbeat interval.
    pub heartbeat_interval: Duration,
    /// Group session timeout.
    pub session_timeout: Duration,
    /// Maximum time between polls before the member is evicted.
    pub max_poll_interval: Duration,
    /// Marked records per partition between offset commits.
    pub commit_limit: u64,
    /// Retry policy for the record handler.
    pub handler_retry: RetryPolicy,
    /// Additional rdkafka properties passed directly to librdkafka.
    pub kafka_properties: HashMap<String, String>,
}

impl Default for KafkaConsumerConfig {
    fn default() -> Self {
        Self {
            bootstrap_servers: DEFAULT_BROKERS.to_string(),
            group_id: DEFAULT_GROUP_ID.to_string(),
            topics: Vec::new(),
            sasl: None,
            auto_offset_reset: OffsetReset::Earliest,
            fetch_min_bytes: KIB,
            max_partition_fetch_bytes: 10 * MIB,
            fetch_max_bytes: 200 * MIB,
            message_max_bytes: 200 * MIB,
            heartbeat_interval: Duration::from_millis(5000),
            session_timeout: Duration::from_millis(120_000),
            max_poll_interval: Duration::from_millis(120_000),
            commit_limit: DEFAULT_COMMIT_LIMIT,
            handler_retry: RetryPolicy::default(),
            kafka_properties: HashMap::new(),
        }
    }
}

impl KafkaConsumerConfig {
    /// Parses a [`KafkaConsumerConfig`] from a [`ConnectorConfig`].
    ///
    /// # Errors
    ///
    /// Returns `ConnectorError` if `kafka.topics` is missing or a value is
    /// invalid.
    pub fn from_config(config: &ConnectorConfig) -> Result<Self, ConnectorError> {
        let defaults = Self::default();

        let topics = config
            .get_list("kafka.topics")
            .filter(|t| !t.is_empty())
            .ok_or_else(|| ConnectorError::MissingConfig("kafka.topics".into()))?;

        let auto_offset_reset = match config.get("kafka.offset.reset") {
            Some(s) => s.parse::<OffsetReset>()?,
            None => defaults.auto_offset_reset,
        };

        let cfg = Self {
            bootstrap_servers: brokers(config),
            group_id: config
                .get("kafka.group")
                .map_or(defaults.group_id, String::from),
            topics,
            sasl: SaslConfig::from_config(config)?,
            auto_offset_reset,
            fetch_min_bytes: config
                .get_parsed("kafka.fetch.min.bytes")?
                .unwrap_or(defaults.fetch_min_bytes),
            max_partition_fetch_bytes: config
                .get_parsed("kafka.partition.fetch.max.bytes")?
                .unwrap_or(defaults.max_partition_fetch_bytes),
            fetch_max_bytes: config
                .get_parsed("kafka.fetch.max.bytes")?
                .unwrap_or(defaults.fetch_max_bytes),
            message_max_bytes: config
                .get_parsed("kafka.message.max.bytes")?
                .unwrap_or(defaults.message_max_bytes),
            heartbeat_interval: defaults.heartbeat_interval,
            session_timeout: defaults.session_timeout,
            max_poll_interval: defaults.max_poll_interval,
            commit_limit: config
                .get_parsed("kafka.commit.limit")?
                .unwrap_or(defaults.commit_limit),
            handler_retry: RetryPolicy::from_config(
                config,
                "kafka.handler",
                defaults.handler_retry,
            )?,
            kafka_properties: config.properties_with_prefix(PASSTHROUGH_PREFIX),
        };

        cfg.validate()?;
        Ok(cfg)
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConnectorError::ConfigurationError` if the configuration is invalid.
    pub fn validate(&self) -> Result<(), ConnectorError> {
        if self.bootstrap_servers.is_empty() {
            return Err(ConnectorError::ConfigurationError(
                "kafka.addrs cannot be empty".into(),
            ));
        }
        if self.group_id.is_empty() {
            return Err(ConnectorError::ConfigurationError(
                "kafka.group cannot be empty".into(),
            ));
        }
        if self.topics.is_empty() {
            return Err(ConnectorError::ConfigurationError(
                "at least one topic is required".into(),
            ));
        }
        if self.commit_limit == 0 {
            return Err(ConnectorError::ConfigurationError(
                "kafka.commit.limit must be > 0".into(),
            ));
        }
        if self.fetch_min_bytes > self.fetch_max_bytes {
            return Err(ConnectorError::ConfigurationError(
                "kafka.fetch.min.bytes must be <= kafka.fetch.max.bytes".into(),
            ));
        }
        Ok(())
    }

    /// Builds an rdkafka [`ClientConfig`] from this configuration.
    #[must_use]
    pub fn to_rdkafka_config(&self) -> ClientConfig {
        let mut config = ClientConfig::new();
        config.set("bootstrap.servers", &self.bootstrap_servers);
        config.set("group.id", &self.group_id);
        config.set("enable.auto.commit", "false");
        config.set("auto.offset.reset", self.auto_offset_reset.as_rdkafka_str());
        config.set("fetch.min.bytes", self.fetch_min_bytes.to_string());
        config.set(
            "max.partition.fetch.bytes",
            self.max_partition_fetch_bytes.to_string(),
        );
        config.set("fetch.max.bytes", self.fetch_max_bytes.to_string());
        config.set("message.max.bytes", self.message_max_bytes.to_string());
        config.set(
            "receive.message.max.bytes",
            (self.fetch_max_bytes + 10 * MIB).to_string(),
        );
        config.set(
            "heartbeat.interval.ms",
            self.heartbeat_interval.as_millis().to_string(),
        );
        config.set(
            "session.timeout.ms",
            self.session_timeout.as_millis().to_string(),
        );
        config.set(
            "max.poll.interval.ms",
            self.max_poll_interval.as_millis().to_string(),
        );
        if let Some(sasl) = &self.sasl {
            sasl.apply(&mut config);
        }

        // Pass-through properties override the derived ones.
        for (key, value) in &self.kafka_properties {
            config.set(key, value);
        }

        config
    }

    /// Keys read by [`from_config`](Self::from_config).
    #[must_use]
    pub fn config_keys() -> Vec<ConfigKeySpec> {
        let mut keys = common_keys();
        keys.extend([
            ConfigKeySpec::required("kafka.topics", "Comma-separated topics to consume"),
            ConfigKeySpec::optional("kafka.group", "Consumer group id", DEFAULT_GROUP_ID),
            ConfigKeySpec::optional(
                "kafka.offset.reset",
                "Start position without a committed offset",
                "earliest",
            ),
            ConfigKeySpec::optional(
                "kafka.commit.limit",
                "Records per partition between commits",
                DEFAULT_COMMIT_LIMIT.to_string(),
            ),
            ConfigKeySpec::optional("kafka.handler.retries", "Handler retry budget", "5"),
            ConfigKeySpec::optional(
                "kafka.handler.retry.delay.ms",
                "Delay between handler retries",
                "1000",
            ),
        ]);
        keys
    }
}

/// Producer configuration for the Kafka delivery side.
#[derive(Debug, Clone)]
pub struct KafkaProducerConfig {
    /// Comma-separated list of broker addresses.
    pub bootstrap_servers: String,
    /// Optional SASL credentials.
    pub sasl: Option<SaslConfig>,
    /// Client id reported to the brokers.
    pub client_id: String,
    /// Records per batch before a flush.
    pub batch_size: usize,
    /// Bytes per batch before a flush.
    pub batch_bytes: u64,
    /// Flush tick for partial batches.
    pub flush_interval: Duration,
    /// Largest message the client sends.
    pub message_max_bytes: u64,
    /// Per-record delivery timeout.
    pub delivery_timeout: Duration,
    /// Additional rdkafka properties passed directly to librdkafka.
    pub kafka_properties: HashMap<String, String>,
}

impl Default for KafkaProducerConfig {
    fn default() -> Self {
        Self {
            bootstrap_servers: DEFAULT_BROKERS.to_string(),
            sasl: None,
            client_id: format!("wormhole-{}", rand::thread_rng().gen_range(0..100_000)),
            batch_size: 10,
            batch_bytes: 10 * MIB,
            flush_interval: Duration::from_secs(3),
            message_max_bytes: 200 * MIB,
            delivery_timeout: Duration::from_secs(30),
            kafka_properties: HashMap::new(),
        }
    }
}

impl KafkaProducerConfig {
    /// Parses a [`KafkaProducerConfig`] from a [`ConnectorConfig`].
    ///
    /// # Errors
    ///
    /// Returns `ConnectorError` if a value is invalid.
    pub fn from_config(config: &ConnectorConfig) -> Result<Self, ConnectorError> {
        let defaults = Self::default();
        let cfg = Self {
            bootstrap_servers: brokers(config),
            sasl: SaslConfig::from_config(config)?,
            client_id: config
                .get("kafka.producer.client.id")
                .map_or(defaults.client_id, String::from),
            batch_size: config
                .get_parsed("kafka.batch.size")?
                .unwrap_or(defaults.batch_size),
            batch_bytes: config
                .get_parsed("kafka.batch.bytes")?
                .unwrap_or(defaults.batch_bytes),
            flush_interval: config
                .get_secs("kafka.flush.interval.secs")?
                .unwrap_or(defaults.flush_interval),
            message_max_bytes: config
                .get_parsed("kafka.message.max.bytes")?
                .unwrap_or(defaults.message_max_bytes),
            delivery_timeout: config
                .get_secs("kafka.delivery.timeout.secs")?
                .unwrap_or(defaults.delivery_timeout),
            kafka_properties: config.properties_with_prefix(PASSTHROUGH_PREFIX),
        };
        cfg.validate()?;
        Ok(cfg)
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConnectorError::ConfigurationError` if the configuration is invalid.
    pub fn validate(&self) -> Result<(), ConnectorError> {
        if self.bootstrap_servers.is_empty() {
            return Err(ConnectorError::ConfigurationError(
                "kafka.addrs cannot be empty".into(),
            ));
        }
        if self.batch_size == 0 {
            return Err(ConnectorError::ConfigurationError(
                "kafka.batch.size must be > 0".into(),
            ));
        }
        if self.batch_bytes == 0 {
            return Err(ConnectorError::ConfigurationError(
                "kafka.batch.bytes must be > 0".into(),
            ));
        }
        if self.flush_interval.is_zero() {
            return Err(ConnectorError::ConfigurationError(
                "kafka.flush.interval.secs must be > 0".into(),
            ));
        }
        Ok(())
    }

    /// Builds an rdkafka [`ClientConfig`] from this configuration.
    ///
    /// Idempotence, `acks=all` and a single in-flight request are always
    /// set; pass-through properties may still override them.
    #[must_use]
    pub fn to_rdkafka_config(&self) -> ClientConfig {
        let mut config = ClientConfig::new();
        config.set("bootstrap.servers", &self.bootstrap_servers);
        config.set("client.id", &self.client_id);
        config.set("enable.idempotence", "true");
        config.set("acks", "all");
        config.set("max.in.flight.requests.per.connection", "1");
        config.set("message.max.bytes", self.message_max_bytes.to_string());
        config.set(
            "message.timeout.ms",
            self.delivery_timeout.as_millis().to_string(),
        );
        if let Some(sasl) = &self.sasl {
            sasl.apply(&mut config);
        }

        for (key, value) in &self.kafka_properties {
            config.set(key, value);
        }

        config
    }

    /// Keys read by [`from_config`](Self::from_config).
    #[must_use]
    pub fn config_keys() -> Vec<ConfigKeySpec> {
        let mut keys = common_keys();
        keys.extend([
            ConfigKeySpec::optional("kafka.producer.client.id", "Client id", "wormhole-{n}"),
            ConfigKeySpec::optional("kafka.batch.size", "Records per batch", "10"),
            ConfigKeySpec::optional("kafka.batch.bytes", "Bytes per batch", "10485760"),
            ConfigKeySpec::optional(
                "kafka.flush.interval.secs",
                "Flush tick for partial batches",
                "3",
            ),
            ConfigKeySpec::optional(
                "kafka.delivery.timeout.secs",
                "Per-record delivery timeout",
                "30",
            ),
        ]);
        keys
    }
}

fn common_keys() -> Vec<ConfigKeySpec> {
    vec![
        ConfigKeySpec::optional("kafka.addrs", "Comma-separated broker list", DEFAULT_BROKERS),
        ConfigKeySpec::optional("kafka.user", "SASL username", ""),
        ConfigKeySpec::optional("kafka.passwd", "SASL password", ""),
        ConfigKeySpec::optional("kafka.mechanism", "SASL mechanism", "PLAIN"),
        ConfigKeySpec::optional(
            "kafka.message.max.bytes",
            "Largest message accepted",
            (200 * MIB).to_string(),
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_config(extra: &[(&str, &str)]) -> ConnectorConfig {
        let mut config = ConnectorConfig::new("stargate");
        config.set("kafka.topics", "events");
        for (k, v) in extra {
            config.set(*k, *v);
        }
        config
    }

    #[test]
    fn test_consumer_defaults() {
        let cfg = KafkaConsumerConfig::from_config(&make_config(&[])).unwrap();
        assert_eq!(cfg.bootstrap_servers, DEFAULT_BROKERS);
        assert_eq!(cfg.group_id, "wormhole_stargate");
        assert_eq!(cfg.topics, vec!["events"]);
        assert_eq!(cfg.auto_offset_reset, OffsetReset::Earliest);
        assert_eq!(cfg.commit_limit, 100);
        assert_eq!(cfg.handler_retry, RetryPolicy::fixed(5, Duration::from_secs(1)));
        assert!(cfg.sasl.is_none());
    }

    #[test]
    fn test_consumer_missing_topics() {
        let config = ConnectorConfig::new("stargate");
        assert!(matches!(
            KafkaConsumerConfig::from_config(&config),
            Err(ConnectorError::MissingConfig(_))
        ));
    }

    #[test]
    fn test_multi_broker_and_topics() {
        let cfg = KafkaConsumerConfig::from_config(&make_config(&[
            ("kafka.addrs", "b1:9092, b2:9092"),
            ("kafka.topics", "a, b ,c"),
        ]))
        .unwrap();
        assert_eq!(cfg.bootstrap_servers, "b1:9092,b2:9092");
        assert_eq!(cfg.topics, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_consumer_rdkafka_config() {
        let cfg = KafkaConsumerConfig::from_config(&make_config(&[(
            "kafka.client.statistics.interval.ms",
            "1000",
        )]))
        .unwrap();
        let rd = cfg.to_rdkafka_config();
        assert_eq!(rd.get("group.id"), Some("wormhole_stargate"));
        assert_eq!(rd.get("enable.auto.commit"), Some("false"));
        assert_eq!(rd.get("fetch.min.bytes"), Some("1024"));
        assert_eq!(rd.get("max.partition.fetch.bytes"), Some("10485760"));
        assert_eq!(rd.get("fetch.max.bytes"), Some("209715200"));
        assert_eq!(rd.get("receive.message.max.bytes"), Some("220200960"));
        assert_eq!(rd.get("session.timeout.ms"), Some("120000"));
        assert_eq!(rd.get("statistics.interval.ms"), Some("1000"));
        assert_eq!(rd.get("security.protocol"), None);
    }

    #[test]
    fn test_sasl() {
        let cfg = KafkaConsumerConfig::from_config(&make_config(&[
            ("kafka.user", "relay"),
            ("kafka.passwd", "secret"),
            ("kafka.mechanism", "scram-sha-512"),
        ]))
        .unwrap();
        let sasl = cfg.sasl.clone().unwrap();
        assert_eq!(sasl.mechanism, SaslMechanism::ScramSha512);
        assert!(!format!("{sasl:?}").contains("secret"));

        let rd = cfg.to_rdkafka_config();
        assert_eq!(rd.get("security.protocol"), Some("SASL_PLAINTEXT"));
        assert_eq!(rd.get("sasl.mechanisms"), Some("SCRAM-SHA-512"));
        assert_eq!(rd.get("sasl.username"), Some("relay"));
    }

    #[test]
    fn test_sasl_requires_both() {
        let result = SaslConfig::from_config(&make_config(&[("kafka.user", "relay")]));
        assert!(result.is_err());
        assert!("KERBEROS".parse::<SaslMechanism>().is_err());
    }

    #[test]
    fn test_invalid_commit_limit() {
        let result = KafkaConsumerConfig::from_config(&make_config(&[("kafka.commit.limit", "0")]));
        assert!(result.is_err());
    }

    #[test]
    fn test_producer_defaults() {
        let cfg = KafkaProducerConfig::from_config(&ConnectorConfig::new("dimension")).unwrap();
        assert_eq!(cfg.batch_size, 10);
        assert_eq!(cfg.batch_bytes, 10 * 1024 * 1024);
        assert_eq!(cfg.flush_interval, Duration::from_secs(3));
        assert!(cfg.client_id.starts_with("wormhole-"));

        let rd = cfg.to_rdkafka_config();
        assert_eq!(rd.get("enable.idempotence"), Some("true"));
        assert_eq!(rd.get("acks"), Some("all"));
        assert_eq!(rd.get("max.in.flight.requests.per.connection"), Some("1"));
        assert_eq!(rd.get("message.max.bytes"), Some("209715200"));
    }

    #[test]
    fn test_producer_overrides() {
        let mut config = ConnectorConfig::new("dimension");
        config.set("kafka.batch.size", "500");
        config.set("kafka.flush.interval.secs", "1");
        config.set("kafka.producer.client.id", "relay-7");
        let cfg = KafkaProducerConfig::from_config(&config).unwrap();
        assert_eq!(cfg.batch_size, 500);
        assert_eq!(cfg.flush_interval, Duration::from_secs(1));
        assert_eq!(cfg.client_id, "relay-7");

        config.set("kafka.batch.size", "0");
        assert!(KafkaProducerConfig::from_config(&config).is_err());
    }

    #[test]
    fn test_offset_reset_parse() {
        assert_eq!("Latest".parse::<OffsetReset>().unwrap(), OffsetReset::Latest);
        assert_eq!("oldest".parse::<OffsetReset>().unwrap(), OffsetReset::Earliest);
        assert!("middle".parse::<OffsetReset>().is_err());
    }
}
