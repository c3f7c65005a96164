//! HTTP adapter metrics.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::metrics::ConnectorMetrics;

/// Atomic counters for the ingest server.
#[derive(Debug, Default)]
pub struct HttpIngestMetrics {
    /// Requests enqueued.
    pub requests_forwarded: AtomicU64,
    /// Body bytes of enqueued requests.
    pub bytes_forwarded: AtomicU64,
    /// Requests answered with an error.
    pub requests_rejected: AtomicU64,
}

impl HttpIngestMetrics {
    /// Creates a new metrics instance with all counters at zero.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records an enqueued request with a body of `bytes`.
    pub fn record_forwarded(&self, bytes: u64) {
        self.requests_forwarded.fetch_add(1, Ordering::Relaxed);
        self.bytes_forwarded.fetch_add(bytes, Ordering::Relaxed);
    }

    /// Records a request answered with an error.
    pub fn record_rejected(&self) {
        self.requests_rejected.fetch_add(1, Ordering::Relaxed);
    }

    /// Converts to [`ConnectorMetrics`].
    #[must_use]
    pub fn to_connector_metrics(&self) -> ConnectorMetrics {
        ConnectorMetrics {
            records_total: self.requests_forwarded.load(Ordering::Relaxed),
            bytes_total: self.bytes_forwarded.load(Ordering::Relaxed),
            errors_total: self.requests_rejected.load(Ordering::Relaxed),
            ..ConnectorMetrics::default()
        }
    }
}

/// Atomic counters for the delivery client.
#[derive(Debug, Default)]
pub struct HttpDeliveryMetrics {
    /// Requests answered below 400.
    pub requests_sent: AtomicU64,
    /// Requests answered with 400 or above.
    pub requests_rejected: AtomicU64,
    /// Requests that failed in transport.
    pub requests_failed: AtomicU64,
    /// Envelopes that were not HTTP requests.
    pub envelopes_skipped: AtomicU64,
    /// Requests still in flight.
    pub in_flight: AtomicU64,
}

impl HttpDeliveryMetrics {
    /// Creates a new metrics instance with all counters at zero.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the start of a request.
    pub fn record_started(&self) {
        self.in_flight.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a request answered below 400.
    pub fn record_sent(&self) {
        self.requests_sent.fetch_add(1, Ordering::Relaxed);
        self.in_flight.fetch_sub(1, Ordering::Relaxed);
    }

    /// Records a request answered with 400 or above.
    pub fn record_rejected(&self) {
        self.requests_rejected.fetch_add(1, Ordering::Relaxed);
        self.in_flight.fetch_sub(1, Ordering::Relaxed);
    }

    /// Records a transport failure.
    pub fn record_failed(&self) {
        self.requests_failed.fetch_add(1, Ordering::Relaxed);
        self.in_flight.fetch_sub(1, Ordering::Relaxed);
    }

    /// Records an envelope of the wrong kind.
    pub fn record_skipped(&self) {
        self.envelopes_skipped.fetch_add(1, Ordering::Relaxed);
    }

    /// Converts to [`ConnectorMetrics`].
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn to_connector_metrics(&self) -> ConnectorMetrics {
        let rejected = self.requests_rejected.load(Ordering::Relaxed);
        let failed = self.requests_failed.load(Ordering::Relaxed);
        let mut m = ConnectorMetrics {
            records_total: self.requests_sent.load(Ordering::Relaxed),
            errors_total: rejected + failed,
            lag: self.in_flight.load(Ordering::Relaxed),
            ..ConnectorMetrics::default()
        };
        m.add_custom("http.rejected", rejected as f64);
        m.add_custom("http.failed", failed as f64);
        m.add_custom(
            "http.skipped",
            self.envelopes_skipped.load(Ordering::Relaxed) as f64,
        );
        m
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ingest_metrics() {
        let m = HttpIngestMetrics::new();
        m.record_forwarded(10);
        m.record_forwarded(5);
        m.record_rejected();
        let cm = m.to_connector_metrics();
        assert_eq!(cm.records_total, 2);
        assert_eq!(cm.bytes_total, 15);
        assert_eq!(cm.errors_total, 1);
    }

    #[test]
    fn test_delivery_metrics() {
        let m = HttpDeliveryMetrics::new();
        for _ in 0..4 {
            m.record_started();
        }
        m.record_sent();
        m.record_rejected();
        m.record_failed();
        m.record_skipped();
        let cm = m.to_connector_metrics();
        assert_eq!(cm.records_total, 1);
        assert_eq!(cm.errors_total, 2);
        assert_eq!(cm.lag, 1);
        assert_eq!(cm.custom_value("http.skipped"), Some(1.0));
    }
}
