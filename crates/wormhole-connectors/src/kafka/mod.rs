//! Kafka transport for Wormhole.
//!
//! Provides the `kafka` ingest module, a consumer-group adapter with
//! bounded offset-commit windows and handler retry, and the `kafka`
//! delivery module, a batching producer with multi-bound flush and
//! single-record retry of partial failures.
//!
//! # Features
//!
//! - One worker per assigned partition; a retrying record only stalls its own
//!   partition
//! - Per-partition commit windows; commits cover every marked offset
//! - Revoked partitions are committed and forgotten inside the rebalance
//!   callback
//! - Fixed-delay handler retry; exhausted records are dropped and counted
//! - Consume errors split into fatal (session ends) and transient (logged)
//! - Batch flush on record count, byte size or tick, whichever comes first
//! - Dead-letter channel for records that fail their retry
//! - SASL PLAIN/SCRAM and `kafka.client.` pass-through properties
//! - Atomic metrics counters
//!
//! # Usage
//!
//! ```rust,ignore
//! use wormhole_connectors::kafka::{KafkaConsumerAdapter, KafkaSession};
//!
//! let config = KafkaConsumerConfig::from_config(&connector_config)?;
//! let session = KafkaSession::connect(&config)?;
//! let mut adapter = KafkaConsumerAdapter::from_config(session, handler, &config);
//! adapter.run(shutdown).await?;
//! ```

pub mod batch;
pub mod config;
pub mod consumer;
pub mod delivery;
pub mod ingest;
pub mod metrics;
pub mod offsets;
pub mod producer;
pub mod session;

pub use batch::{FlushReason, ProducerBatch};
pub use config::{KafkaConsumerConfig, KafkaProducerConfig, OffsetReset, SaslConfig, SaslMechanism};
pub use consumer::{KafkaConsumerAdapter, RecordHandler};
pub use delivery::KafkaDelivery;
pub use ingest::{EnqueueHandler, KafkaIngest};
pub use metrics::{KafkaConsumerMetrics, KafkaProducerMetrics};
pub use offsets::{
    ClaimId, ClaimTable, MarkOutcome, OffsetTracker, OffsetWindow, SharedClaims,
};
pub use producer::{BatchSender, FailedRecord, KafkaProducerAdapter, KafkaSender};
pub use session::{
    CommitKind, ConsumedRecord, ConsumerSession, KafkaPartitionStream, KafkaSession,
    OffsetCommitter, PartitionStream, SessionEvent,
};

use std::sync::Arc;

use crate::adapter::{DeliveryModule, IngestModule};
use crate::registry::{DimensionRegistry, StargateRegistry};

/// Registers the `kafka` ingest module.
pub fn register_kafka_ingest(registry: &StargateRegistry) {
    registry.register_module(
        "kafka",
        KafkaIngest::new().info(),
        Arc::new(|| Box::new(KafkaIngest::new()) as Box<dyn IngestModule>),
    );
}

/// Registers the `kafka` delivery module.
pub fn register_kafka_delivery(registry: &DimensionRegistry) {
    registry.register_module(
        "kafka",
        KafkaDelivery::new().info(),
        Arc::new(|| Box::new(KafkaDelivery::new()) as Box<dyn DeliveryModule>),
    );
}
