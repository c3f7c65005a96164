//! HTTP transport for Wormhole.
//!
//! The `http` ingest module captures requests with an axum server; the
//! `http` delivery module replays them with reqwest against another host.

pub mod client;
pub mod config;
pub mod metrics;
pub mod server;

pub use client::HttpDelivery;
pub use config::{HttpClientConfig, HttpServerConfig};
pub use metrics::{HttpDeliveryMetrics, HttpIngestMetrics};
pub use server::{HttpIngest, Reply};

use std::sync::Arc;

use crate::adapter::{DeliveryModule, IngestModule};
use crate::registry::{DimensionRegistry, StargateRegistry};

/// Registers the `http` ingest module.
pub fn register_http_ingest(registry: &StargateRegistry) {
    registry.register_module(
        "http",
        HttpIngest::new().info(),
        Arc::new(|| Box::new(HttpIngest::new()) as Box<dyn IngestModule>),
    );
}

/// Registers the `http` delivery module.
pub fn register_http_delivery(registry: &DimensionRegistry) {
    registry.register_module(
        "http",
        HttpDelivery::new().info(),
        Arc::new(|| Box::new(HttpDelivery::new()) as Box<dyn DeliveryModule>),
    );
}
