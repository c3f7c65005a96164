//! File bridges over the spool.
//!
//! [`SpoolWriterBridge`] is the ingest side: it owns a [`SpoolWriter`] and
//! its [`MoveWorker`]. [`SpoolReaderBridge`] is the delivery side: it owns
//! a [`SpoolReader`] decoding lines with the delivery module's transform.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::info;

use crate::adapter::{DeliveryBridge, IngestBridge, Payload};
use crate::config::{ConnectorConfig, ConnectorInfo};
use crate::error::ConnectorError;
use crate::message::{Envelope, Transform};
use crate::metrics::ConnectorMetrics;
use crate::shutdown::ShutdownSignal;
use crate::spool::{
    MoveWorker, OsFs, SpoolFs, SpoolReader, SpoolReaderConfig, SpoolReaderMetrics, SpoolWriter,
    SpoolWriterConfig, SpoolWriterMetrics,
};

fn not_set_up() -> ConnectorError {
    ConnectorError::InvalidState {
        expected: "Initialized".into(),
        actual: "Created".into(),
    }
}

/// The `file` ingest bridge.
pub struct SpoolWriterBridge {
    fs: Arc<dyn SpoolFs>,
    config: Option<SpoolWriterConfig>,
    queue: Option<mpsc::Receiver<Payload>>,
    metrics: Option<Arc<SpoolWriterMetrics>>,
    mover: Option<Arc<MoveWorker>>,
}

impl std::fmt::Debug for SpoolWriterBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpoolWriterBridge")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl SpoolWriterBridge {
    /// Creates a bridge writing to the real filesystem.
    #[must_use]
    pub fn new() -> Self {
        Self::with_fs(Arc::new(OsFs))
    }

    /// Creates a bridge over the given filesystem.
    #[must_use]
    pub fn with_fs(fs: Arc<dyn SpoolFs>) -> Self {
        Self {
            fs,
            config: None,
            queue: None,
            metrics: None,
            mover: None,
        }
    }
}

impl Default for SpoolWriterBridge {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl IngestBridge for SpoolWriterBridge {
    fn name(&self) -> &str {
        "file"
    }

    async fn setup(
        &mut self,
        config: &ConnectorConfig,
        queue: mpsc::Receiver<Payload>,
    ) -> Result<(), ConnectorError> {
        self.config = Some(SpoolWriterConfig::from_config(config)?);
        self.queue = Some(queue);
        Ok(())
    }

    async fn run(&mut self, shutdown: ShutdownSignal) -> Result<(), ConnectorError> {
        let (Some(config), Some(queue)) = (self.config.clone(), self.queue.take()) else {
            return Err(not_set_up());
        };
        let mover = Arc::new(MoveWorker::spawn(
            Arc::clone(&self.fs),
            &config.handling_dir,
            config.move_queue_capacity,
        ));
        let writer = SpoolWriter::new(config, Arc::clone(&self.fs), Arc::clone(&mover))?;
        self.metrics = Some(writer.metrics());
        self.mover = Some(mover);
        writer.run(queue, shutdown).await
    }

    fn info(&self) -> ConnectorInfo {
        ConnectorInfo::new(
            "file",
            "Spools payloads into rotated files in the handling directory",
            SpoolWriterConfig::config_keys(),
        )
    }

    #[allow(clippy::cast_precision_loss)]
    fn metrics(&self) -> ConnectorMetrics {
        let mut m = self
            .metrics
            .as_ref()
            .map(|m| m.to_connector_metrics())
            .unwrap_or_default();
        if let Some(mover) = &self.mover {
            m.add_custom("spool.moves", mover.metrics().moved() as f64);
            m.add_custom("spool.moves.failed", mover.metrics().failed() as f64);
        }
        m
    }
}

/// The `file` delivery bridge.
pub struct SpoolReaderBridge {
    fs: Arc<dyn SpoolFs>,
    reader: Option<SpoolReader>,
    metrics: Option<Arc<SpoolReaderMetrics>>,
}

impl std::fmt::Debug for SpoolReaderBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpoolReaderBridge")
            .field("config", &self.reader.as_ref().map(SpoolReader::config))
            .finish_non_exhaustive()
    }
}

impl SpoolReaderBridge {
    /// Creates a bridge reading from the real filesystem.
    #[must_use]
    pub fn new() -> Self {
        Self::with_fs(Arc::new(OsFs))
    }

    /// Creates a bridge over the given filesystem.
    #[must_use]
    pub fn with_fs(fs: Arc<dyn SpoolFs>) -> Self {
        Self {
            fs,
            reader: None,
            metrics: None,
        }
    }
}

impl Default for SpoolReaderBridge {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DeliveryBridge for SpoolReaderBridge {
    fn name(&self) -> &str {
        "file"
    }

    async fn setup(
        &mut self,
        config: &ConnectorConfig,
        queue: mpsc::Sender<Envelope>,
        transform: Transform,
    ) -> Result<(), ConnectorError> {
        let config = SpoolReaderConfig::from_config(config)?;
        let reader = SpoolReader::new(config, Arc::clone(&self.fs), queue, transform)?;
        self.metrics = Some(reader.metrics());
        self.reader = Some(reader);
        Ok(())
    }

    async fn run(&mut self, shutdown: ShutdownSignal) -> Result<(), ConnectorError> {
        let reader = self.reader.take().ok_or_else(not_set_up)?;
        let result = reader.run(shutdown).await;
        info!("spool reader bridge stopped");
        result
    }

    fn info(&self) -> ConnectorInfo {
        ConnectorInfo::new(
            "file",
            "Forwards spooled files from the handling directory",
            SpoolReaderConfig::config_keys(),
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
    use crate::message::{kafka_transform, KafkaMessage};
    use crate::shutdown;
    use crate::testing::wait_until;
    use bytes::Bytes;
    use std::time::Duration;

    #[tokio::test]
    async fn test_writer_then_reader_on_disk() {
        let root = tempfile::tempdir().unwrap();
        let mut config = ConnectorConfig::new("stargate");
        config.set(
            "spool.handling.path",
            root.path().join("handling").display().to_string(),
        );
        config.set(
            "spool.staging.path",
            root.path().join("staging").display().to_string(),
        );
        config.set("spool.scan.interval.secs", "1");

        // Ingest side: two records, spooled and handed off on shutdown.
        let (tx, rx) = mpsc::channel(8);
        let mut writer = SpoolWriterBridge::new();
        writer.setup(&config, rx).await.unwrap();
        for i in 0..2u8 {
            let line = KafkaMessage::new("events", "k", vec![i, b'\n'], 0).encode().unwrap();
            tx.send(Bytes::from(line)).await.unwrap();
        }
        let (stop, signal) = shutdown::channel();
        let task = tokio::spawn(async move {
            writer.run(signal).await.unwrap();
            writer
        });
        tokio::time::sleep(Duration::from_millis(50)).await;
        stop.send(true).unwrap();
        let writer = task.await.unwrap();
        let metrics = writer.metrics();
        assert_eq!(metrics.records_total, 2);
        assert_eq!(metrics.custom_value("spool.moves"), Some(1.0));

        // Delivery side: the reader forwards both records.
        let (tx, mut rx) = mpsc::channel(8);
        let mut reader = SpoolReaderBridge::new();
        reader.setup(&config, tx, kafka_transform()).await.unwrap();
        let (stop, signal) = shutdown::channel();
        let task = tokio::spawn(async move { reader.run(signal).await });

        let mut values = Vec::new();
        for _ in 0..2 {
            let envelope = tokio::time::timeout(Duration::from_secs(5), rx.recv())
                .await
                .unwrap()
                .unwrap();
            let Envelope::Kafka(record) = envelope else {
                panic!("expected a kafka envelope");
            };
            values.push(record.value);
        }
        assert_eq!(values, vec![vec![0, b'\n'], vec![1, b'\n']]);

        let handling = root.path().join("handling");
        wait_until(Duration::from_secs(5), move || {
            std::fs::read_dir(&handling).map_or(false, |d| d.count() == 0)
        })
        .await;
        stop.send(true).unwrap();
        task.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_run_before_setup() {
        let mut writer = SpoolWriterBridge::new();
        let (_stop, signal) = shutdown::channel();
        assert!(matches!(
            writer.run(signal.clone()).await,
            Err(ConnectorError::InvalidState { .. })
        ));

        let mut reader = SpoolReaderBridge::new();
        assert!(reader.run(signal).await.is_err());
    }

    #[tokio::test]
    async fn test_setup_rejects_bad_config() {
        let mut config = ConnectorConfig::new("dimension");
        config.set("spool.reader.workers", "0");
        let (tx, _rx) = mpsc::channel(1);
        let mut reader = SpoolReaderBridge::with_fs(Arc::new(crate::spool::MemoryFs::new()));
        assert!(reader.setup(&config, tx, kafka_transform()).await.is_err());
    }
}
