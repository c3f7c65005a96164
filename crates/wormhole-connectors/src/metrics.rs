//! Adapter metrics types.
//!
//! Every component keeps lock-free atomic counters of its own and converts
//! them into a [`ConnectorMetrics`] snapshot on request. The runtime logs
//! the snapshot of both sides when a role stops.

use std::fmt;

/// Point-in-time metrics reported by a module or bridge.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConnectorMetrics {
    /// Total number of records handled.
    pub records_total: u64,

    /// Total bytes handled.
    pub bytes_total: u64,

    /// Number of records that failed or were dropped.
    pub errors_total: u64,

    /// Records waiting (pending batch, queued files).
    pub lag: u64,

    /// Additional component-specific metrics.
    pub custom: Vec<(String, f64)>,
}

impl ConnectorMetrics {
    /// Creates empty metrics.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a custom metric.
    pub fn add_custom(&mut self, name: impl Into<String>, value: f64) {
        self.custom.push((name.into(), value));
    }

    /// Looks up a custom metric by name.
    #[must_use]
    pub fn custom_value(&self, name: &str) -> Option<f64> {
        self.custom
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| *v)
    }
}

impl fmt::Display for ConnectorMetrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "records={} bytes={} errors={} lag={}",
            self.records_total, self.bytes_total, self.errors_total, self.lag
        )?;
        for (name, value) in &self.custom {
            write!(f, " {name}={value}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connector_metrics() {
        let mut metrics = ConnectorMetrics::new();
        metrics.records_total = 1000;
        metrics.bytes_total = 50_000;
        metrics.add_custom("kafka.commits", 3.0);

        assert_eq!(metrics.custom_value("kafka.commits"), Some(3.0));
        assert_eq!(metrics.custom_value("missing"), None);
    }

    #[test]
    fn test_display() {
        let mut metrics = ConnectorMetrics::new();
        metrics.records_total = 5;
        metrics.add_custom("spool.files.claimed", 2.0);
        assert_eq!(
            metrics.to_string(),
            "records=5 bytes=0 errors=0 lag=0 spool.files.claimed=2"
        );
    }
}
