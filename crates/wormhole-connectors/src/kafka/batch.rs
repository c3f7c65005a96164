//! Pending producer batch.

use crate::message::KafkaMessage;

/// What triggered a flush.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushReason {
    /// The record count bound was reached.
    Count,
    /// The byte bound was reached.
    Bytes,
    /// The flush tick fired.
    Timer,
    /// The producer is closing.
    Close,
}

/// Records waiting to be sent, with their running byte total.
///
/// The batch only accumulates; the producer takes it out whole when a bound
/// is reached or the tick fires.
#[derive(Debug, Clone)]
pub struct ProducerBatch {
    records: Vec<KafkaMessage>,
    bytes: u64,
    max_records: usize,
    max_bytes: u64,
}

impl ProducerBatch {
    /// Creates an empty batch with the given bounds.
    #[must_use]
    pub fn new(max_records: usize, max_bytes: u64) -> Self {
        Self {
            records: Vec::with_capacity(max_records),
            bytes: 0,
            max_records,
            max_bytes,
        }
    }

    /// Appends a record. Returns the bound it reached, if any.
    pub fn push(&mut self, record: KafkaMessage) -> Option<FlushReason> {
        self.bytes += record.value.len() as u64;
        self.records.push(record);
        if self.records.len() >= self.max_records {
            Some(FlushReason::Count)
        } else if self.bytes >= self.max_bytes {
            Some(FlushReason::Bytes)
        } else {
            None
        }
    }

    /// Takes every pending record, leaving the batch empty.
    pub fn take(&mut self) -> Vec<KafkaMessage> {
        self.bytes = 0;
        std::mem::replace(&mut self.records, Vec::with_capacity(self.max_records))
    }

    /// Number of pending records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns `true` if nothing is pending.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Pending value bytes.
    #[must_use]
    pub fn bytes(&self) -> u64 {
        self.bytes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(size: usize) -> KafkaMessage {
        KafkaMessage::new("events", "", vec![0u8; size], 0)
    }

    #[test]
    fn test_count_bound() {
        let mut batch = ProducerBatch::new(3, 1024);
        assert_eq!(batch.push(record(1)), None);
        assert_eq!(batch.push(record(1)), None);
        assert_eq!(batch.push(record(1)), Some(FlushReason::Count));
    }

    #[test]
    fn test_byte_bound() {
        let mut batch = ProducerBatch::new(10, 100);
        assert_eq!(batch.push(record(60)), None);
        assert_eq!(batch.push(record(40)), Some(FlushReason::Bytes));
        assert_eq!(batch.bytes(), 100);
    }

    #[test]
    fn test_take_clears() {
        let mut batch = ProducerBatch::new(10, 100);
        batch.push(record(5));
        batch.push(record(5));
        let taken = batch.take();
        assert_eq!(taken.len(), 2);
        assert!(batch.is_empty());
        assert_eq!(batch.bytes(), 0);
    }
}
