//! Kafka adapter metrics.
//!
//! [`KafkaConsumerMetrics`] and [`KafkaProducerMetrics`] provide lock-free
//! atomic counters, convertible to [`ConnectorMetrics`].

use std::sync::atomic::{AtomicU64, Ordering};

use super::batch::FlushReason;
use crate::metrics::ConnectorMetrics;

/// Atomic counters for the consumer adapter.
#[derive(Debug, Default)]
pub struct KafkaConsumerMetrics {
    /// Records marked after handling (including dropped ones).
    pub records_handled: AtomicU64,
    /// Payload bytes of handled records.
    pub bytes_handled: AtomicU64,
    /// Failed handler attempts.
    pub handler_failures: AtomicU64,
    /// Records marked after the retry budget ran out.
    pub records_dropped: AtomicU64,
    /// Commits issued when a window filled.
    pub window_commits: AtomicU64,
    /// Commits issued when a session ended.
    pub cleanup_commits: AtomicU64,
    /// Commits the broker rejected.
    pub commit_failures: AtomicU64,
    /// Non-fatal consume errors.
    pub consume_errors: AtomicU64,
    /// Partitions assigned to this member.
    pub partitions_assigned: AtomicU64,
    /// Partitions revoked from this member.
    pub partitions_revoked: AtomicU64,
}

impl KafkaConsumerMetrics {
    /// Creates a new metrics instance with all counters at zero.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a marked record of `bytes` payload bytes.
    pub fn record_handled(&self, bytes: u64) {
        self.records_handled.fetch_add(1, Ordering::Relaxed);
        self.bytes_handled.fetch_add(bytes, Ordering::Relaxed);
    }

    /// Records a failed handler attempt.
    pub fn record_handler_failure(&self) {
        self.handler_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a record dropped after exhausting retries.
    pub fn record_dropped(&self) {
        self.records_dropped.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a commit triggered by a full window.
    pub fn record_window_commit(&self) {
        self.window_commits.fetch_add(1, Ordering::Relaxed);
    }

    /// Records the commit issued at session end.
    pub fn record_cleanup_commit(&self) {
        self.cleanup_commits.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a rejected commit.
    pub fn record_commit_failure(&self) {
        self.commit_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a non-fatal consume error.
    pub fn record_consume_error(&self) {
        self.consume_errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Records `n` newly assigned partitions.
    pub fn record_assigned(&self, n: u64) {
        self.partitions_assigned.fetch_add(n, Ordering::Relaxed);
    }

    /// Records `n` revoked partitions.
    pub fn record_revoked(&self, n: u64) {
        self.partitions_revoked.fetch_add(n, Ordering::Relaxed);
    }

    /// Converts to [`ConnectorMetrics`].
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn to_connector_metrics(&self) -> ConnectorMetrics {
        let mut m = ConnectorMetrics {
            records_total: self.records_handled.load(Ordering::Relaxed),
            bytes_total: self.bytes_handled.load(Ordering::Relaxed),
            errors_total: self.records_dropped.load(Ordering::Relaxed)
                + self.consume_errors.load(Ordering::Relaxed),
            lag: 0,
            custom: Vec::new(),
        };
        m.add_custom(
            "kafka.handler_failures",
            self.handler_failures.load(Ordering::Relaxed) as f64,
        );
        m.add_custom(
            "kafka.window_commits",
            self.window_commits.load(Ordering::Relaxed) as f64,
        );
        m.add_custom(
            "kafka.cleanup_commits",
            self.cleanup_commits.load(Ordering::Relaxed) as f64,
        );
        m.add_custom(
            "kafka.commit_failures",
            self.commit_failures.load(Ordering::Relaxed) as f64,
        );
        m.add_custom(
            "kafka.partitions_assigned",
            self.partitions_assigned.load(Ordering::Relaxed) as f64,
        );
        m.add_custom(
            "kafka.partitions_revoked",
            self.partitions_revoked.load(Ordering::Relaxed) as f64,
        );
        m
    }
}

/// Atomic counters for the producer adapter.
#[derive(Debug, Default)]
pub struct KafkaProducerMetrics {
    /// Records acknowledged by the broker.
    pub records_sent: AtomicU64,
    /// Payload bytes acknowledged by the broker.
    pub bytes_sent: AtomicU64,
    /// Flushes triggered by the record count bound.
    pub count_flushes: AtomicU64,
    /// Flushes triggered by the byte bound.
    pub bytes_flushes: AtomicU64,
    /// Flushes triggered by the tick.
    pub timer_flushes: AtomicU64,
    /// Flushes issued by `close`.
    pub close_flushes: AtomicU64,
    /// Individual retries of failed batch members.
    pub retries: AtomicU64,
    /// Records that failed their retry.
    pub failed_records: AtomicU64,
    /// Records skipped for an empty value.
    pub skipped_empty: AtomicU64,
    /// Records waiting in the batch.
    pub pending: AtomicU64,
}

impl KafkaProducerMetrics {
    /// Creates a new metrics instance with all counters at zero.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `records` acknowledged records totaling `bytes`.
    pub fn record_sent(&self, records: u64, bytes: u64) {
        self.records_sent.fetch_add(records, Ordering::Relaxed);
        self.bytes_sent.fetch_add(bytes, Ordering::Relaxed);
    }

    /// Records a flush of the given kind.
    pub fn record_flush(&self, reason: FlushReason) {
        self.flush_counter(reason).fetch_add(1, Ordering::Relaxed);
    }

    /// Returns the number of flushes of the given kind.
    #[must_use]
    pub fn flushes(&self, reason: FlushReason) -> u64 {
        self.flush_counter(reason).load(Ordering::Relaxed)
    }

    fn flush_counter(&self, reason: FlushReason) -> &AtomicU64 {
        match reason {
            FlushReason::Count => &self.count_flushes,
            FlushReason::Bytes => &self.bytes_flushes,
            FlushReason::Timer => &self.timer_flushes,
            FlushReason::Close => &self.close_flushes,
        }
    }

    /// Records a single-record retry.
    pub fn record_retry(&self) {
        self.retries.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a record that failed its retry.
    pub fn record_failed(&self) {
        self.failed_records.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a record skipped for an empty value.
    pub fn record_skipped(&self) {
        self.skipped_empty.fetch_add(1, Ordering::Relaxed);
    }

    /// Sets the number of records waiting in the batch.
    pub fn set_pending(&self, pending: usize) {
        self.pending.store(pending as u64, Ordering::Relaxed);
    }

    /// Converts to [`ConnectorMetrics`].
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn to_connector_metrics(&self) -> ConnectorMetrics {
        let mut m = ConnectorMetrics {
            records_total: self.records_sent.load(Ordering::Relaxed),
            bytes_total: self.bytes_sent.load(Ordering::Relaxed),
            errors_total: self.failed_records.load(Ordering::Relaxed),
            lag: self.pending.load(Ordering::Relaxed),
            custom: Vec::new(),
        };
        for (name, reason) in [
            ("kafka.flushes.count", FlushReason::Count),
            ("kafka.flushes.bytes", FlushReason::Bytes),
            ("kafka.flushes.timer", FlushReason::Timer),
            ("kafka.flushes.close", FlushReason::Close),
        ] {
            m.add_custom(name, self.flushes(reason) as f64);
        }
        m.add_custom("kafka.retries", self.retries.load(Ordering::Relaxed) as f64);
        m.add_custom(
            "kafka.skipped_empty",
            self.skipped_empty.load(Ordering::Relaxed) as f64,
        );
        m
    }
}
