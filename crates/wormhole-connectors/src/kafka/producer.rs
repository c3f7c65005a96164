//! Batching producer adapter.
//!
//! [`KafkaProducerAdapter`] accumulates records into a mutex-guarded
//! [`ProducerBatch`] and sends it when the record count bound, the byte
//! bound or the flush tick fires, whichever comes first. Batch members the
//! broker rejects are retried once each; records failing the retry are
//! published on the dead-letter channel.
//!
//! The broker client runs idempotent with `acks=all` and a single request
//! in flight, so one send attempt is never duplicated. The single-record
//! retry can still duplicate a record whose acknowledgment was lost.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::future::join_all;
use parking_lot::Mutex;
use rdkafka::producer::{FutureProducer, FutureRecord, Producer};
use tokio::sync::mpsc;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use super::batch::{FlushReason, ProducerBatch};
use super::config::KafkaProducerConfig;
use super::metrics::KafkaProducerMetrics;
use crate::error::ConnectorError;
use crate::message::{Envelope, KafkaMessage};
use crate::shutdown::{self, ShutdownSignal};

/// Capacity of the dead-letter channel.
pub const DEFAULT_DEAD_LETTER_CAPACITY: usize = 1024;

/// A record that could not be delivered.
#[derive(Debug)]
pub struct FailedRecord {
    /// The undelivered record.
    pub record: KafkaMessage,
    /// Error of the final attempt.
    pub error: ConnectorError,
}

/// Sends records to the broker.
#[async_trait]
pub trait BatchSender: Send + Sync {
    /// Sends every record and returns the index and error of each failure.
    async fn send_batch(&self, records: &[KafkaMessage]) -> Vec<(usize, ConnectorError)>;

    /// Sends a single record.
    ///
    /// # Errors
    ///
    /// Returns `ConnectorError::WriteError` if the broker rejects it.
    async fn send_one(&self, record: &KafkaMessage) -> Result<(), ConnectorError>;

    /// Waits for everything handed to the client to be acknowledged.
    ///
    /// # Errors
    ///
    /// Returns `ConnectorError::WriteError` if the flush times out.
    async fn flush(&self) -> Result<(), ConnectorError>;
}

/// rdkafka-backed [`BatchSender`].
pub struct KafkaSender {
    producer: FutureProducer,
    delivery_timeout: Duration,
}

impl std::fmt::Debug for KafkaSender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KafkaSender")
            .field("delivery_timeout", &self.delivery_timeout)
            .finish_non_exhaustive()
    }
}

impl KafkaSender {
    /// Creates the producer client.
    ///
    /// # Errors
    ///
    /// Returns `ConnectorError::ConnectionFailed` if the client cannot be
    /// created.
    pub fn connect(config: &KafkaProducerConfig) -> Result<Self, ConnectorError> {
        let producer: FutureProducer = config.to_rdkafka_config().create().map_err(|e| {
            ConnectorError::ConnectionFailed(format!("failed to create producer: {e}"))
        })?;
        info!(
            brokers = %config.bootstrap_servers,
            client_id = %config.client_id,
            "kafka producer created"
        );
        Ok(Self {
            producer,
            delivery_timeout: config.delivery_timeout,
        })
    }
}

#[async_trait]
impl BatchSender for KafkaSender {
    async fn send_batch(&self, records: &[KafkaMessage]) -> Vec<(usize, ConnectorError)> {
        let results = join_all(records.iter().map(|r| self.send_one(r))).await;
        results
            .into_iter()
            .enumerate()
            .filter_map(|(i, r)| r.err().map(|e| (i, e)))
            .collect()
    }

    async fn send_one(&self, record: &KafkaMessage) -> Result<(), ConnectorError> {
        let mut rec = FutureRecord::to(&record.topic).payload(record.value.as_slice());
        if !record.key.is_empty() {
            rec = rec.key(record.key.as_bytes());
        }
        if record.timestamp > 0 {
            rec = rec.timestamp(record.timestamp);
        }
        self.producer
            .send(rec, self.delivery_timeout)
            .await
            .map(|_| ())
            .map_err(|(e, _)| ConnectorError::WriteError(format!("Kafka produce failed: {e}")))
    }

    async fn flush(&self) -> Result<(), ConnectorError> {
        self.producer
            .flush(self.delivery_timeout)
            .map_err(|e| ConnectorError::WriteError(format!("flush failed: {e}")))
    }
}

/// Batching producer over a [`BatchSender`].
pub struct KafkaProducerAdapter<S> {
    sender: S,
    batch: Mutex<ProducerBatch>,
    flush_interval: Duration,
    dead_letter: mpsc::Sender<FailedRecord>,
    dead_letter_rx: Option<mpsc::Receiver<FailedRecord>>,
    metrics: Arc<KafkaProducerMetrics>,
}

impl<S> std::fmt::Debug for KafkaProducerAdapter<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KafkaProducerAdapter")
            .field("pending", &self.batch.lock().len())
            .field("flush_interval", &self.flush_interval)
            .finish_non_exhaustive()
    }
}

impl<S: BatchSender> KafkaProducerAdapter<S> {
    /// Creates an adapter with the batch bounds and tick of `config`.
    #[must_use]
    pub fn new(sender: S, config: &KafkaProducerConfig) -> Self {
        let (dead_letter, dead_letter_rx) = mpsc::channel(DEFAULT_DEAD_LETTER_CAPACITY);
        Self {
            sender,
            batch: Mutex::new(ProducerBatch::new(config.batch_size, config.batch_bytes)),
            flush_interval: config.flush_interval,
            dead_letter,
            dead_letter_rx: Some(dead_letter_rx),
            metrics: Arc::new(KafkaProducerMetrics::new()),
        }
    }

    /// Takes the receiving end of the dead-letter channel.
    ///
    /// Returns `None` after the first call. When nobody drains the channel,
    /// failed records are only logged once it is full.
    pub fn failed_records(&mut self) -> Option<mpsc::Receiver<FailedRecord>> {
        self.dead_letter_rx.take()
    }

    /// Returns the shared metrics.
    #[must_use]
    pub fn metrics(&self) -> Arc<KafkaProducerMetrics> {
        Arc::clone(&self.metrics)
    }

    /// Returns the number of pending records.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.batch.lock().len()
    }

    /// Adds a record to the batch, flushing if a bound is reached.
    /// Records with an empty value are skipped.
    pub async fn append(&self, record: KafkaMessage) {
        if record.value.is_empty() {
            self.metrics.record_skipped();
            debug!(topic = %record.topic, "skipping record with empty value");
            return;
        }

        let full = {
            let mut batch = self.batch.lock();
            batch.push(record).map(|reason| (reason, batch.take()))
        };
        match full {
            Some((reason, records)) => self.send(records, reason).await,
            None => self.metrics.set_pending(self.pending()),
        }
    }

    /// Sends whatever is pending.
    pub async fn flush(&self, reason: FlushReason) {
        let records = self.batch.lock().take();
        if !records.is_empty() {
            self.send(records, reason).await;
        }
    }

    /// Flushes the pending batch and waits for the client to drain.
    ///
    /// # Errors
    ///
    /// Returns `ConnectorError::WriteError` if the client flush fails.
    pub async fn close(&self) -> Result<(), ConnectorError> {
        self.flush(FlushReason::Close).await;
        self.sender.flush().await
    }

    /// Drains the envelope queue until shutdown or until the queue closes,
    /// then closes the adapter.
    ///
    /// On shutdown the queue is closed and the envelopes already in it are
    /// still batched and sent before the final flush. Envelopes that are not
    /// Kafka records are logged and dropped.
    ///
    /// # Errors
    ///
    /// Returns `ConnectorError` if the final flush fails.
    pub async fn run(
        &self,
        queue: &mut mpsc::Receiver<Envelope>,
        mut shutdown: ShutdownSignal,
    ) -> Result<(), ConnectorError> {
        let mut ticker = time::interval_at(Instant::now() + self.flush_interval, self.flush_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                () = shutdown::requested(&mut shutdown) => break,
                next = queue.recv() => match next {
                    Some(envelope) => self.accept(envelope).await,
                    None => {
                        debug!("producer queue closed");
                        break;
                    }
                },
                _ = ticker.tick() => self.flush(FlushReason::Timer).await,
            }
        }

        // The spool deletes a file once its lines are queued, so whatever is
        // queued here exists nowhere else.
        queue.close();
        let mut drained = 0u64;
        while let Some(envelope) = queue.recv().await {
            self.accept(envelope).await;
            drained += 1;
        }
        if drained > 0 {
            info!(drained, "sent envelopes queued at shutdown");
        }

        let result = self.close().await;
        info!(metrics = %self.metrics.to_connector_metrics(), "kafka producer closed");
        result
    }

    async fn accept(&self, envelope: Envelope) {
        match envelope {
            Envelope::Kafka(record) => self.append(record).await,
            other => warn!(kind = other.kind(), "dropping non-kafka envelope"),
        }
    }

    async fn send(&self, records: Vec<KafkaMessage>, reason: FlushReason) {
        self.metrics.record_flush(reason);
        self.metrics.set_pending(self.pending());

        let failures = self.sender.send_batch(&records).await;
        let mut failed = vec![false; records.len()];
        for (index, error) in failures {
            let Some(record) = records.get(index) else {
                continue;
            };
            failed[index] = true;
            self.metrics.record_retry();
            warn!(topic = %record.topic, key = %record.key, error = %error, "retrying failed record");
            match self.sender.send_one(record).await {
                Ok(()) => failed[index] = false,
                Err(error) => self.dead_letter(record.clone(), error),
            }
        }

        let (sent, bytes) = records
            .iter()
            .zip(&failed)
            .filter(|(_, failed)| !**failed)
            .fold((0u64, 0u64), |(n, b), (r, _)| (n + 1, b + r.value.len() as u64));
        self.metrics.record_sent(sent, bytes);
        debug!(?reason, sent, failed = records.len() as u64 - sent, "batch flushed");
    }

    fn dead_letter(&self, record: KafkaMessage, error: ConnectorError) {
        self.metrics.record_failed();
        error!(topic = %record.topic, key = %record.key, error = %error, "record failed after retry");
        if let Err(e) = self.dead_letter.try_send(FailedRecord { record, error }) {
            warn!(error = %e, "dead-letter channel unavailable");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{wait_until, MockSender};
    use std::sync::atomic::Ordering;

    fn config(batch_size: usize, flush_interval: Duration) -> KafkaProducerConfig {
        KafkaProducerConfig {
            batch_size,
            flush_interval,
            ..KafkaProducerConfig::default()
        }
    }

    fn record(i: usize) -> KafkaMessage {
        KafkaMessage::new("events", format!("k{i}"), format!("v{i}"), 0)
    }

    #[tokio::test(start_paused = true)]
    async fn test_count_flushes_then_timer() {
        let sender = MockSender::new();
        let batches = sender.batches();
        let adapter = Arc::new(KafkaProducerAdapter::new(
            sender,
            &config(10, Duration::from_secs(3)),
        ));
        let metrics = adapter.metrics();

        let (tx, mut rx) = mpsc::channel(32);
        for i in 0..25 {
            tx.send(Envelope::Kafka(record(i))).await.unwrap();
        }
        let (stop, signal) = shutdown::channel();
        let a = Arc::clone(&adapter);
        let task = tokio::spawn(async move { a.run(&mut rx, signal).await });

        let m = Arc::clone(&metrics);
        wait_until(Duration::from_secs(10), move || {
            m.records_sent.load(Ordering::Relaxed) == 25
        })
        .await;

        assert_eq!(metrics.flushes(FlushReason::Count), 2);
        assert_eq!(metrics.flushes(FlushReason::Timer), 1);
        let sizes: Vec<usize> = batches.lock().iter().map(Vec::len).collect();
        assert_eq!(sizes, vec![10, 10, 5]);

        stop.send(true).unwrap();
        task.await.unwrap().unwrap();
        assert_eq!(metrics.flushes(FlushReason::Close), 0);
        drop(tx);
    }

    #[tokio::test]
    async fn test_partial_failure_retried_once() {
        let sender = MockSender::new();
        // k3 fails in the batch but passes its retry; k7 fails both times.
        sender.fail_batch_keys(["k3", "k7"]);
        sender.fail_single_keys(["k7"]);
        let singles = sender.singles();
        let mut adapter = KafkaProducerAdapter::new(sender, &config(10, Duration::from_secs(60)));
        let mut failed = adapter.failed_records().unwrap();
        assert!(adapter.failed_records().is_none());

        for i in 0..10 {
            adapter.append(record(i)).await;
        }

        let metrics = adapter.metrics();
        assert_eq!(metrics.retries.load(Ordering::Relaxed), 2);
        assert_eq!(metrics.records_sent.load(Ordering::Relaxed), 9);
        assert_eq!(metrics.failed_records.load(Ordering::Relaxed), 1);
        assert_eq!(singles.lock().len(), 2);

        let dead = failed.try_recv().unwrap();
        assert_eq!(dead.record.key, "k7");
        assert!(matches!(dead.error, ConnectorError::WriteError(_)));
        assert!(failed.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_empty_values_skipped() {
        let sender = MockSender::new();
        let batches = sender.batches();
        let adapter = KafkaProducerAdapter::new(sender, &config(2, Duration::from_secs(60)));
        adapter
            .append(KafkaMessage::new("events", "k", Vec::new(), 0))
            .await;
        assert_eq!(adapter.pending(), 0);
        assert_eq!(adapter.metrics().skipped_empty.load(Ordering::Relaxed), 1);
        assert!(batches.lock().is_empty());
    }

    #[tokio::test]
    async fn test_close_flushes_pending() {
        let sender = MockSender::new();
        let batches = sender.batches();
        let flushes = sender.client_flushes();
        let adapter = KafkaProducerAdapter::new(sender, &config(10, Duration::from_secs(60)));
        for i in 0..3 {
            adapter.append(record(i)).await;
        }
        assert_eq!(adapter.pending(), 3);

        adapter.close().await.unwrap();
        assert_eq!(adapter.pending(), 0);
        assert_eq!(batches.lock().len(), 1);
        assert_eq!(flushes.load(Ordering::SeqCst), 1);
        assert_eq!(adapter.metrics().flushes(FlushReason::Close), 1);
    }

    #[tokio::test]
    async fn test_run_closes_on_shutdown() {
        let sender = MockSender::new();
        let batches = sender.batches();
        let adapter = KafkaProducerAdapter::new(sender, &config(10, Duration::from_secs(60)));
        let (tx, mut rx) = mpsc::channel(8);
        tx.send(Envelope::Kafka(record(1))).await.unwrap();
        let (stop, signal) = shutdown::channel();

        let run = adapter.run(&mut rx, signal);
        tokio::pin!(run);
        tokio::select! {
            _ = &mut run => panic!("run returned before shutdown"),
            () = tokio::time::sleep(Duration::from_millis(50)) => {}
        }
        stop.send(true).unwrap();
        run.await.unwrap();
        assert_eq!(batches.lock().len(), 1);
        assert_eq!(adapter.metrics().flushes(FlushReason::Close), 1);
    }

    #[tokio::test]
    async fn test_shutdown_sends_queued_envelopes() {
        let sender = MockSender::new();
        let batches = sender.batches();
        let adapter = KafkaProducerAdapter::new(sender, &config(10, Duration::from_secs(60)));
        let (tx, mut rx) = mpsc::channel(8);
        for i in 0..3 {
            tx.send(Envelope::Kafka(record(i))).await.unwrap();
        }
        let (stop, signal) = shutdown::channel();
        stop.send(true).unwrap();

        adapter.run(&mut rx, signal).await.unwrap();

        let keys: Vec<String> = batches.lock().iter().flatten().map(|r| r.key.clone()).collect();
        assert_eq!(keys, vec!["k0", "k1", "k2"]);
        assert_eq!(adapter.metrics().records_sent.load(Ordering::Relaxed), 3);
        assert!(rx.try_recv().is_err());
        assert!(tx.is_closed());
    }
}
