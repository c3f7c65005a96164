//! Bridges between the two relay processes.
//!
//! ```text
//! stargate:  module --Payload--> SpoolWriterBridge --> handling dir
//! dimension: handling dir --> SpoolReaderBridge --Envelope--> module
//! ```
//!
//! # Modules
//!
//! - [`spool`]: the `file` bridges over the filesystem spool.
//! - [`skip`]: the `skip` bridges that carry nothing.

pub mod skip;
pub mod spool;

pub use skip::{SkipReaderBridge, SkipWriterBridge};
pub use spool::{SpoolReaderBridge, SpoolWriterBridge};

use std::sync::Arc;

use crate::adapter::{DeliveryBridge, IngestBridge};
use crate::registry::{DimensionRegistry, StargateRegistry};

/// Registers the `file` and `skip` ingest bridges.
pub fn register_ingest_bridges(registry: &StargateRegistry) {
    registry.register_bridge(
        "file",
        SpoolWriterBridge::new().info(),
        Arc::new(|| Box::new(SpoolWriterBridge::new()) as Box<dyn IngestBridge>),
    );
    registry.register_bridge(
        "skip",
        SkipWriterBridge::new().info(),
        Arc::new(|| Box::new(SkipWriterBridge::new()) as Box<dyn IngestBridge>),
    );
}

/// Registers the `file` and `skip` delivery bridges.
pub fn register_delivery_bridges(registry: &DimensionRegistry) {
    registry.register_bridge(
        "file",
        SpoolReaderBridge::new().info(),
        Arc::new(|| Box::new(SpoolReaderBridge::new()) as Box<dyn DeliveryBridge>),
    );
    registry.register_bridge(
        "skip",
        SkipReaderBridge::new().info(),
        Arc::new(|| Box::new(SkipReaderBridge::new()) as Box<dyn DeliveryBridge>),
    );
}
