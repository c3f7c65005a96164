//! # Wormhole Connectors
//!
//! Modules, bridges and runtimes of the Wormhole relay.
//!
//! A relay is split across two processes. The stargate process collects
//! messages and hands them to a bridge; the dimension process takes them
//! from the bridge and delivers them.
//!
//! ## Architecture
//!
//! ```text
//! stargate:   http | kafka  --Payload-->  file | skip
//!                                           |
//!                                    handling directory
//!                                           |
//! dimension:  file | skip  --Envelope-->  http | kafka
//! ```
//!
//! - [`adapter`] - Module and bridge traits
//! - [`spool`] - Durable file hand-off between the two processes
//! - [`kafka`] - Consumer-group ingest and batching producer delivery
//! - [`http`] - Request capture and replay
//! - [`registry`] - Name-keyed factories
//! - [`runtime`] - Role lifecycle
//! - [`testing`] - Mock adapters and test utilities

#![deny(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
// Common test patterns that are acceptable
#![cfg_attr(
    test,
    allow(
        clippy::field_reassign_with_default,
        clippy::manual_let_else,
        clippy::unreadable_literal,
        clippy::cast_possible_truncation,
        clippy::cast_possible_wrap,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss,
        unused_mut
    )
)]

// ── Core ──

/// Error types.
pub mod error;

/// Configuration types.
pub mod config;

/// Wire envelopes and transforms.
pub mod message;

/// Shutdown signal.
pub mod shutdown;

/// Metrics types.
pub mod metrics;

/// Fixed-delay retry.
pub mod retry;

/// Module and bridge traits.
pub mod adapter;

/// Filesystem spool.
pub mod spool;

// ── Transports ──

/// Kafka ingest and delivery modules.
#[cfg(feature = "kafka")]
pub mod kafka;

/// HTTP ingest and delivery modules.
pub mod http;

/// Spool and skip bridges.
pub mod bridge;

// ── Orchestration ──

/// Module and bridge registry with factory pattern.
pub mod registry;

/// Role runtimes.
pub mod runtime;

/// Testing utilities (mock adapters, helpers).
pub mod testing;

pub use adapter::{DeliveryBridge, DeliveryModule, IngestBridge, IngestModule, Payload};
pub use config::{ConnectorConfig, ConnectorInfo, ConnectorState};
pub use error::ConnectorError;
pub use registry::{default_dimension_registry, default_stargate_registry};
pub use runtime::{DimensionRuntime, StargateRuntime};
