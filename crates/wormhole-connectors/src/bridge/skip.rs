//! No-op bridges.
//!
//! `skip` lets either role run without a transport: the ingest side drains
//! and discards its queue, the delivery side produces nothing.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::debug;

use crate::adapter::{DeliveryBridge, IngestBridge, Payload};
use crate::config::{ConnectorConfig, ConnectorInfo};
use crate::error::ConnectorError;
use crate::message::{Envelope, Transform};
use crate::metrics::ConnectorMetrics;
use crate::shutdown::{self, ShutdownSignal};

/// The `skip` ingest bridge: discards every payload.
#[derive(Debug, Default)]
pub struct SkipWriterBridge {
    queue: Option<mpsc::Receiver<Payload>>,
    discarded: Arc<AtomicU64>,
}

impl SkipWriterBridge {
    /// Creates the bridge.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl IngestBridge for SkipWriterBridge {
    fn name(&self) -> &str {
        "skip"
    }

    async fn setup(
        &mut self,
        _config: &ConnectorConfig,
        queue: mpsc::Receiver<Payload>,
    ) -> Result<(), ConnectorError> {
        self.queue = Some(queue);
        Ok(())
    }

    async fn run(&mut self, mut shutdown: ShutdownSignal) -> Result<(), ConnectorError> {
        let Some(mut queue) = self.queue.take() else {
            return Err(ConnectorError::InvalidState {
                expected: "Initialized".into(),
                actual: "Created".into(),
            });
        };
        loop {
            tokio::select! {
                () = shutdown::requested(&mut shutdown) => break,
                next = queue.recv() => match next {
                    Some(payload) => {
                        self.discarded.fetch_add(1, Ordering::Relaxed);
                        debug!(len = payload.len(), "discarding payload");
                    }
                    None => break,
                },
            }
        }
        Ok(())
    }

    fn info(&self) -> ConnectorInfo {
        ConnectorInfo::new("skip", "Discards every payload", Vec::new())
    }

    fn metrics(&self) -> ConnectorMetrics {
        ConnectorMetrics {
            records_total: self.discarded.load(Ordering::Relaxed),
            ..ConnectorMetrics::default()
        }
    }
}

/// The `skip` delivery bridge: produces nothing until shutdown.
#[derive(Debug, Default)]
pub struct SkipReaderBridge {
    queue: Option<mpsc::Sender<Envelope>>,
}

impl SkipReaderBridge {
    /// Creates the bridge.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DeliveryBridge for SkipReaderBridge {
    fn name(&self) -> &str {
        "skip"
    }

    async fn setup(
        &mut self,
        _config: &ConnectorConfig,
        queue: mpsc::Sender<Envelope>,
        _transform: Transform,
    ) -> Result<(), ConnectorError> {
        self.queue = Some(queue);
        Ok(())
    }

    async fn run(&mut self, mut shutdown: ShutdownSignal) -> Result<(), ConnectorError> {
        shutdown::requested(&mut shutdown).await;
        // Closing the queue lets the delivery module finish.
        self.queue = None;
        Ok(())
    }

    fn info(&self) -> ConnectorInfo {
        ConnectorInfo::new("skip", "Delivers nothing", Vec::new())
    }
}
