//! Adapter traits.
//!
//! A process runs in one of two roles, each wiring exactly one module to
//! one bridge through a bounded queue:
//!
//! ```text
//! stargate:   IngestModule  --Payload-->  IngestBridge
//! dimension:  DeliveryBridge --Envelope--> DeliveryModule
//! ```
//!
//! The runtime calls `setup` once with the shared [`ConnectorConfig`] and
//! its end of the queue, then `run` with the shutdown signal. `run` returns
//! `Ok(())` on shutdown and an error only for failures the whole process
//! must be restarted for.

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::mpsc;

use crate::config::{ConnectorConfig, ConnectorInfo};
use crate::error::ConnectorError;
use crate::message::{Envelope, Transform};
use crate::metrics::ConnectorMetrics;
use crate::shutdown::ShutdownSignal;

/// One serialized envelope travelling from an ingest module to its bridge.
pub type Payload = Bytes;

/// Collects messages from the outside world (stargate role).
#[async_trait]
pub trait IngestModule: Send {
    /// Registry name of the module.
    fn name(&self) -> &str;

    /// Stores the queue and parses configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConnectorError` on invalid or missing configuration.
    async fn setup(
        &mut self,
        config: &ConnectorConfig,
        queue: mpsc::Sender<Payload>,
    ) -> Result<(), ConnectorError>;

    /// Runs until shutdown.
    ///
    /// # Errors
    ///
    /// Returns `ConnectorError` on a fatal failure.
    async fn run(&mut self, shutdown: ShutdownSignal) -> Result<(), ConnectorError>;

    /// Describes the module and its configuration keys.
    fn info(&self) -> ConnectorInfo;

    /// Renders the help text.
    fn help(&self) -> String {
        self.info().help()
    }

    /// Returns current metrics.
    fn metrics(&self) -> ConnectorMetrics {
        ConnectorMetrics::default()
    }
}

/// Carries ingest payloads away from the stargate process.
#[async_trait]
pub trait IngestBridge: Send {
    /// Registry name of the bridge.
    fn name(&self) -> &str;

    /// Stores the queue and parses configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConnectorError` on invalid or missing configuration.
    async fn setup(
        &mut self,
        config: &ConnectorConfig,
        queue: mpsc::Receiver<Payload>,
    ) -> Result<(), ConnectorError>;

    /// Runs until shutdown or until the queue closes.
    ///
    /// # Errors
    ///
    /// Returns `ConnectorError` on a fatal failure.
    async fn run(&mut self, shutdown: ShutdownSignal) -> Result<(), ConnectorError>;

    /// Describes the bridge and its configuration keys.
    fn info(&self) -> ConnectorInfo;

    /// Renders the help text.
    fn help(&self) -> String {
        self.info().help()
    }

    /// Returns current metrics.
    fn metrics(&self) -> ConnectorMetrics {
        ConnectorMetrics::default()
    }
}

/// Feeds envelopes into the dimension process.
#[async_trait]
pub trait DeliveryBridge: Send {
    /// Registry name of the bridge.
    fn name(&self) -> &str;

    /// Stores the queue and the module's transform, and parses
    /// configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConnectorError` on invalid or missing configuration.
    async fn setup(
        &mut self,
        config: &ConnectorConfig,
        queue: mpsc::Sender<Envelope>,
        transform: Transform,
    ) -> Result<(), ConnectorError>;

    /// Runs until shutdown.
    ///
    /// # Errors
    ///
    /// Returns `ConnectorError` on a fatal failure.
    async fn run(&mut self, shutdown: ShutdownSignal) -> Result<(), ConnectorError>;

    /// Describes the bridge and its configuration keys.
    fn info(&self) -> ConnectorInfo;

    /// Renders the help text.
    fn help(&self) -> String {
        self.info().help()
    }

    /// Returns current metrics.
    fn metrics(&self) -> ConnectorMetrics {
        ConnectorMetrics::default()
    }
}

/// Delivers envelopes to the outside world (dimension role).
#[async_trait]
pub trait DeliveryModule: Send {
    /// Registry name of the module.
    fn name(&self) -> &str;

    /// Stores the queue and parses configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConnectorError` on invalid or missing configuration.
    async fn setup(
        &mut self,
        config: &ConnectorConfig,
        queue: mpsc::Receiver<Envelope>,
    ) -> Result<(), ConnectorError>;

    /// Runs until shutdown.
    ///
    /// # Errors
    ///
    /// Returns `ConnectorError` on a fatal failure.
    async fn run(&mut self, shutdown: ShutdownSignal) -> Result<(), ConnectorError>;

    /// Decodes one spool line into the envelope this module consumes.
    fn transform(&self) -> Transform;

    /// Describes the module and its configuration keys.
    fn info(&self) -> ConnectorInfo;

    /// Renders the help text.
    fn help(&self) -> String {
        self.info().help()
    }

    /// Returns current metrics.
    fn metrics(&self) -> ConnectorMetrics {
        ConnectorMetrics::default()
    }
}
