//! Kafka delivery module.
//!
//! Produces every [`KafkaMessage`](crate::message::KafkaMessage) envelope
//! back to its topic through the batching producer. Records the producer
//! gives up on are logged with their topic and key.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::error;

use super::config::KafkaProducerConfig;
use super::metrics::KafkaProducerMetrics;
use super::producer::{FailedRecord, KafkaProducerAdapter, KafkaSender};
use crate::adapter::DeliveryModule;
use crate::config::{ConnectorConfig, ConnectorInfo};
use crate::error::ConnectorError;
use crate::message::{kafka_transform, Envelope, Transform};
use crate::metrics::ConnectorMetrics;
use crate::shutdown::ShutdownSignal;

/// The `kafka` delivery module.
#[derive(Debug, Default)]
pub struct KafkaDelivery {
    config: Option<KafkaProducerConfig>,
    queue: Option<mpsc::Receiver<Envelope>>,
    metrics: Option<Arc<KafkaProducerMetrics>>,
}

impl KafkaDelivery {
    /// Creates an unconfigured module.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

/// Logs dead-lettered records until the producer drops its sender.
async fn log_failed(mut failed: mpsc::Receiver<FailedRecord>) {
    while let Some(FailedRecord { record, error }) = failed.recv().await {
        error!(
            topic = %record.topic,
            key = %record.key,
            bytes = record.value.len(),
            error = %error,
            "kafka record not delivered"
        );
    }
}

#[async_trait]
impl DeliveryModule for KafkaDelivery {
    fn name(&self) -> &str {
        "kafka"
    }

    async fn setup(
        &mut self,
        config: &ConnectorConfig,
        queue: mpsc::Receiver<Envelope>,
    ) -> Result<(), ConnectorError> {
        self.config = Some(KafkaProducerConfig::from_config(config)?);
        self.queue = Some(queue);
        Ok(())
    }

    async fn run(&mut self, shutdown: ShutdownSignal) -> Result<(), ConnectorError> {
        let (Some(config), Some(mut queue)) = (self.config.as_ref(), self.queue.take()) else {
            return Err(ConnectorError::InvalidState {
                expected: "Initialized".into(),
                actual: "Created".into(),
            });
        };

        let sender = KafkaSender::connect(config)?;
        let mut adapter = KafkaProducerAdapter::new(sender, config);
        self.metrics = Some(adapter.metrics());
        let failed = adapter
            .failed_records()
            .map(|rx| tokio::spawn(log_failed(rx)));

        let result = adapter.run(&mut queue, shutdown).await;
        drop(adapter);
        if let Some(task) = failed {
            if let Err(e) = task.await {
                error!(error = %e, "dead-letter logger panicked");
            }
        }
        result
    }

    fn transform(&self) -> Transform {
        kafka_transform()
    }

    fn info(&self) -> ConnectorInfo {
        ConnectorInfo::new(
            "kafka",
            "Produces relayed records to Kafka in batches",
            KafkaProducerConfig::config_keys(),
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
    use crate::message::KafkaMessage;

    #[tokio::test]
    async fn test_setup_parses_producer_config() {
        let (_tx, rx) = mpsc::channel(1);
        let mut module = KafkaDelivery::new();
        let mut config = ConnectorConfig::new("dimension");
        config.set("kafka.batch.size", "0");
        assert!(module.setup(&config, rx).await.is_err());

        let (_tx, rx) = mpsc::channel(1);
        config.set("kafka.batch.size", "20");
        module.setup(&config, rx).await.unwrap();
        assert_eq!(module.config.as_ref().unwrap().batch_size, 20);
    }

    #[test]
    fn test_transform_decodes_kafka_lines() {
        let module = KafkaDelivery::new();
        let line = KafkaMessage::new("t", "k", b"v".to_vec(), 5).encode().unwrap();
        let envelope = (module.transform())(&line).unwrap();
        assert_eq!(envelope.kind(), "kafka");
        assert!((module.transform())(b"not json").is_err());
    }

    #[tokio::test]
    async fn test_dead_letters_are_drained() {
        let (tx, rx) = mpsc::channel(2);
        tx.send(FailedRecord {
            record: KafkaMessage::new("t", "k", b"v".to_vec(), 0),
            error: ConnectorError::WriteError("timed out".into()),
        })
        .await
        .unwrap();
        drop(tx);
        tokio::time::timeout(std::time::Duration::from_secs(1), log_failed(rx))
            .await
            .unwrap();
    }
}
