//! Kafka ingest module.
//!
//! Consumes the configured topics and enqueues every record as a
//! [`KafkaMessage`] JSON line for the ingest bridge.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::mpsc;
use tracing::warn;

use super::config::KafkaConsumerConfig;
use super::consumer::{KafkaConsumerAdapter, RecordHandler};
use super::metrics::KafkaConsumerMetrics;
use super::session::{ConsumedRecord, KafkaSession};
use crate::adapter::{IngestModule, Payload};
use crate::config::{ConnectorConfig, ConnectorInfo};
use crate::error::ConnectorError;
use crate::message::KafkaMessage;
use crate::metrics::ConnectorMetrics;
use crate::shutdown::ShutdownSignal;

/// Wraps consumed records in a [`KafkaMessage`] and enqueues their JSON.
#[derive(Debug, Clone)]
pub struct EnqueueHandler {
    queue: mpsc::Sender<Payload>,
}

impl EnqueueHandler {
    /// Creates a handler feeding `queue`.
    #[must_use]
    pub fn new(queue: mpsc::Sender<Payload>) -> Self {
        Self { queue }
    }
}

#[async_trait]
impl RecordHandler for EnqueueHandler {
    async fn handle(&self, record: &ConsumedRecord) -> Result<(), ConnectorError> {
        let key = record
            .key
            .as_deref()
            .map(|k| String::from_utf8_lossy(k).into_owned())
            .unwrap_or_default();
        let message = KafkaMessage::new(
            record.topic.as_str(),
            key,
            record.payload.clone(),
            record.timestamp,
        );
        let line = match message.encode() {
            Ok(line) => line,
            Err(e) => {
                // Encoding is deterministic; a retry cannot help.
                warn!(topic = %record.topic, offset = record.offset, error = %e, "dropping unencodable record");
                return Ok(());
            }
        };
        self.queue
            .send(Bytes::from(line))
            .await
            .map_err(|_| ConnectorError::Closed)
    }
}

/// The `kafka` ingest module.
#[derive(Debug, Default)]
pub struct KafkaIngest {
    config: Option<KafkaConsumerConfig>,
    queue: Option<mpsc::Sender<Payload>>,
    metrics: Option<Arc<KafkaConsumerMetrics>>,
}

impl KafkaIngest {
    /// Creates an unconfigured module.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl IngestModule for KafkaIngest {
    fn name(&self) -> &str {
        "kafka"
    }

    async fn setup(
        &mut self,
        config: &ConnectorConfig,
        queue: mpsc::Sender<Payload>,
    ) -> Result<(), ConnectorError> {
        self.config = Some(KafkaConsumerConfig::from_config(config)?);
        self.queue = Some(queue);
        Ok(())
    }

    async fn run(&mut self, shutdown: ShutdownSignal) -> Result<(), ConnectorError> {
        let (Some(config), Some(queue)) = (self.config.as_ref(), self.queue.take()) else {
            return Err(ConnectorError::InvalidState {
                expected: "Initialized".into(),
                actual: "Created".into(),
            });
        };
        let session = KafkaSession::connect(config)?;
        let mut adapter =
            KafkaConsumerAdapter::from_config(session, EnqueueHandler::new(queue), config);
        self.metrics = Some(adapter.metrics());
        adapter.run(shutdown).await
    }

    fn info(&self) -> ConnectorInfo {
        ConnectorInfo::new(
            "kafka",
            "Consumes Kafka topics as a consumer group",
            KafkaConsumerConfig::config_keys(),
        )
    }

    fn metrics(&self) -> ConnectorMetrics {
        self.metrics
            .as_ref()
            .map(|m| m.to_connector_metrics())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_handler_enqueues_envelope() {
        let (tx, mut rx) = mpsc::channel(4);
        let handler = EnqueueHandler::new(tx);
        let mut record = ConsumedRecord::new("orders", 2, 10, vec![0, 159, 146, 150]);
        record.key = Some(b"order-1".to_vec());
        record.timestamp = 1_700_000_000_000;

        handler.handle(&record).await.unwrap();
        let line = rx.recv().await.unwrap();
        let decoded = KafkaMessage::decode(&line).unwrap();
        assert_eq!(decoded.topic, "orders");
        assert_eq!(decoded.key, "order-1");
        assert_eq!(decoded.value, vec![0, 159, 146, 150]);
        assert_eq!(decoded.timestamp, 1_700_000_000_000);
    }

    #[tokio::test]
    async fn test_handler_reports_closed_queue() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let handler = EnqueueHandler::new(tx);
        let record = ConsumedRecord::new("orders", 0, 0, b"v".to_vec());
        assert!(matches!(
            handler.handle(&record).await,
            Err(ConnectorError::Closed)
        ));
    }

    #[tokio::test]
    async fn test_setup_requires_topics() {
        let (tx, _rx) = mpsc::channel(1);
        let mut module = KafkaIngest::new();
        let config = ConnectorConfig::new("stargate");
        assert!(module.setup(&config, tx).await.is_err());
        assert!(module.help().contains("kafka.topics"));
    }

    #[tokio::test]
    async fn test_run_before_setup() {
        let mut module = KafkaIngest::new();
        let (_tx, rx) = crate::shutdown::channel();
        assert!(matches!(
            module.run(rx).await,
            Err(ConnectorError::InvalidState { .. })
        ));
    }
}
