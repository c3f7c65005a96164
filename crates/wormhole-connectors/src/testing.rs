//! Testing utilities for adapter implementations.
//!
//! Provides mock modules, bridges, a scripted consumer session and a
//! recording batch sender, so adapters and runtimes can be exercised
//! without a broker or a network peer.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use tokio::sync::mpsc;

use crate::adapter::{DeliveryBridge, DeliveryModule, IngestBridge, IngestModule, Payload};
use crate::config::{ConnectorConfig, ConnectorInfo};
use crate::error::ConnectorError;
use crate::message::{http_transform, Envelope, Transform};
use crate::metrics::ConnectorMetrics;
use crate::shutdown::{self, ShutdownSignal};

#[cfg(feature = "kafka")]
pub use self::kafka::{MockBroker, MockPartition, MockSender, MockSession, RecordedCommit};

/// Polls `condition` every 10ms until it holds.
///
/// Uses tokio's clock, so it also works under paused time.
///
/// # Panics
///
/// Panics if `condition` still fails after `timeout`.
pub async fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) {
    let deadline = tokio::time::Instant::now() + timeout;
    while !condition() {
        assert!(
            tokio::time::Instant::now() < deadline,
            "condition not met within {timeout:?}"
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

fn not_set_up() -> ConnectorError {
    ConnectorError::InvalidState {
        expected: "Initialized".into(),
        actual: "Created".into(),
    }
}

/// Ingest module that enqueues `n` payloads, then idles until shutdown.
#[derive(Debug)]
pub struct MockIngestModule {
    count: usize,
    fail_with: Option<String>,
    queue: Option<mpsc::Sender<Payload>>,
    sent: Arc<AtomicU64>,
}

impl MockIngestModule {
    /// Creates a module that enqueues `payload-0` .. `payload-{n-1}`.
    #[must_use]
    pub fn new(count: usize) -> Self {
        Self {
            count,
            fail_with: None,
            queue: None,
            sent: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Creates a module whose `run` fails immediately.
    #[must_use]
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            fail_with: Some(message.into()),
            ..Self::new(0)
        }
    }
}

#[async_trait]
impl IngestModule for MockIngestModule {
    fn name(&self) -> &str {
        "mock"
    }

    async fn setup(
        &mut self,
        _config: &ConnectorConfig,
        queue: mpsc::Sender<Payload>,
    ) -> Result<(), ConnectorError> {
        self.queue = Some(queue);
        Ok(())
    }

    async fn run(&mut self, mut shutdown: ShutdownSignal) -> Result<(), ConnectorError> {
        if let Some(message) = &self.fail_with {
            return Err(ConnectorError::Fatal(message.clone()));
        }
        let queue = self.queue.take().ok_or_else(not_set_up)?;
        for i in 0..self.count {
            if queue.send(Bytes::from(format!("payload-{i}"))).await.is_err() {
                return Err(ConnectorError::Closed);
            }
            self.sent.fetch_add(1, Ordering::Relaxed);
        }
        shutdown::requested(&mut shutdown).await;
        Ok(())
    }

    fn info(&self) -> ConnectorInfo {
        ConnectorInfo::new("mock", "Enqueues a fixed number of payloads", Vec::new())
    }

    fn metrics(&self) -> ConnectorMetrics {
        ConnectorMetrics {
            records_total: self.sent.load(Ordering::Relaxed),
            ..ConnectorMetrics::default()
        }
    }
}

/// Ingest bridge that records every payload it receives.
#[derive(Debug, Default)]
pub struct MockIngestBridge {
    queue: Option<mpsc::Receiver<Payload>>,
    received: Arc<Mutex<Vec<Bytes>>>,
}

impl MockIngestBridge {
    /// Creates an empty bridge.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Payloads received so far.
    #[must_use]
    pub fn received(&self) -> Arc<Mutex<Vec<Bytes>>> {
        Arc::clone(&self.received)
    }
}

#[async_trait]
impl IngestBridge for MockIngestBridge {
    fn name(&self) -> &str {
        "mock"
    }

    async fn setup(
        &mut self,
        _config: &ConnectorConfig,
        queue: mpsc::Receiver<Payload>,
    ) -> Result<(), ConnectorError> {
        self.queue = Some(queue);
        Ok(())
    }

    async fn run(&mut self, mut shutdown: ShutdownSignal) -> Result<(), ConnectorError> {
        let mut queue = self.queue.take().ok_or_else(not_set_up)?;
        loop {
            tokio::select! {
                () = shutdown::requested(&mut shutdown) => break,
                next = queue.recv() => match next {
                    Some(payload) => self.received.lock().push(payload),
                    None => return Ok(()),
                },
            }
        }
        queue.close();
        while let Some(payload) = queue.recv().await {
            self.received.lock().push(payload);
        }
        Ok(())
    }

    fn info(&self) -> ConnectorInfo {
        ConnectorInfo::new("mock", "Records payloads in memory", Vec::new())
    }

    fn metrics(&self) -> ConnectorMetrics {
        ConnectorMetrics {
            records_total: self.received.lock().len() as u64,
            ..ConnectorMetrics::default()
        }
    }
}

/// Delivery bridge that feeds fixed lines through the module's transform.
pub struct MockDeliveryBridge {
    lines: Vec<Vec<u8>>,
    queue: Option<mpsc::Sender<Envelope>>,
    transform: Option<Transform>,
    rejected: Arc<AtomicU64>,
}

impl std::fmt::Debug for MockDeliveryBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockDeliveryBridge")
            .field("lines", &self.lines.len())
            .finish_non_exhaustive()
    }
}

impl MockDeliveryBridge {
    /// Creates a bridge that delivers `lines` once, then idles.
    #[must_use]
    pub fn new(lines: Vec<Vec<u8>>) -> Self {
        Self {
            lines,
            queue: None,
            transform: None,
            rejected: Arc::new(AtomicU64::new(0)),
        }
    }
}

#[async_trait]
impl DeliveryBridge for MockDeliveryBridge {
    fn name(&self) -> &str {
        "mock"
    }

    async fn setup(
        &mut self,
        _config: &ConnectorConfig,
        queue: mpsc::Sender<Envelope>,
        transform: Transform,
    ) -> Result<(), ConnectorError> {
        self.queue = Some(queue);
        self.transform = Some(transform);
        Ok(())
    }

    async fn run(&mut self, mut shutdown: ShutdownSignal) -> Result<(), ConnectorError> {
        let (Some(queue), Some(transform)) = (self.queue.take(), self.transform.clone()) else {
            return Err(not_set_up());
        };
        for line in &self.lines {
            match transform(line) {
                Ok(envelope) => {
                    if queue.send(envelope).await.is_err() {
                        return Err(ConnectorError::Closed);
                    }
                }
                Err(_) => {
                    self.rejected.fetch_add(1, Ordering::Relaxed);
                }
            }
        }
        shutdown::requested(&mut shutdown).await;
        Ok(())
    }

    fn info(&self) -> ConnectorInfo {
        ConnectorInfo::new("mock", "Delivers fixed lines", Vec::new())
    }

    fn metrics(&self) -> ConnectorMetrics {
        ConnectorMetrics {
            errors_total: self.rejected.load(Ordering::Relaxed),
            ..ConnectorMetrics::default()
        }
    }
}

/// Delivery module that records every envelope it receives.
pub struct MockDeliveryModule {
    transform: Transform,
    queue: Option<mpsc::Receiver<Envelope>>,
    received: Arc<Mutex<Vec<Envelope>>>,
}

impl std::fmt::Debug for MockDeliveryModule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockDeliveryModule")
            .field("received", &self.received.lock().len())
            .finish_non_exhaustive()
    }
}

impl Default for MockDeliveryModule {
    fn default() -> Self {
        Self::new()
    }
}

impl MockDeliveryModule {
    /// Creates a module decoding HTTP lines.
    #[must_use]
    pub fn new() -> Self {
        Self::with_transform(http_transform())
    }

    /// Creates a module with the given transform.
    #[must_use]
    pub fn with_transform(transform: Transform) -> Self {
        Self {
            transform,
            queue: None,
            received: Arc::default(),
        }
    }

    /// Envelopes received so far.
    #[must_use]
    pub fn received(&self) -> Arc<Mutex<Vec<Envelope>>> {
        Arc::clone(&self.received)
    }
}

#[async_trait]
impl DeliveryModule for MockDeliveryModule {
    fn name(&self) -> &str {
        "mock"
    }

    async fn setup(
        &mut self,
        _config: &ConnectorConfig,
        queue: mpsc::Receiver<Envelope>,
    ) -> Result<(), ConnectorError> {
        self.queue = Some(queue);
        Ok(())
    }

    async fn run(&mut self, mut shutdown: ShutdownSignal) -> Result<(), ConnectorError> {
        let mut queue = self.queue.take().ok_or_else(not_set_up)?;
        loop {
            tokio::select! {
                () = shutdown::requested(&mut shutdown) => return Ok(()),
                next = queue.recv() => match next {
                    Some(envelope) => self.received.lock().push(envelope),
                    None => return Ok(()),
                },
            }
        }
    }

    fn transform(&self) -> Transform {
        Arc::clone(&self.transform)
    }

    fn info(&self) -> ConnectorInfo {
        ConnectorInfo::new("mock", "Records envelopes in memory", Vec::new())
    }

    fn metrics(&self) -> ConnectorMetrics {
        ConnectorMetrics {
            records_total: self.received.lock().len() as u64,
            ..ConnectorMetrics::default()
        }
    }
}

#[cfg(feature = "kafka")]
mod kafka {
    use std::collections::{BTreeSet, HashMap, HashSet};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, OnceLock};

    use async_trait::async_trait;
    use parking_lot::Mutex;
    use tokio::sync::mpsc;

    use crate::error::ConnectorError;
    use crate::kafka::{
        BatchSender, CommitKind, ConsumedRecord, ConsumerSession, OffsetCommitter, OffsetTracker,
        PartitionStream, SessionEvent, SharedClaims,
    };
    use crate::message::KafkaMessage;

    type Feed = mpsc::UnboundedSender<Result<ConsumedRecord, ConnectorError>>;
    type Event = Result<SessionEvent<MockPartition>, ConnectorError>;

    /// One commit observed by [`MockSession`].
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub struct RecordedCommit {
        /// Why the commit was issued.
        pub kind: CommitKind,
        /// Marked `(topic, partition, offset)` entries, sorted.
        pub offsets: Vec<(String, i32, i64)>,
    }

    /// Records of one partition assigned by a [`MockBroker`].
    #[derive(Debug)]
    pub struct MockPartition {
        records: mpsc::UnboundedReceiver<Result<ConsumedRecord, ConnectorError>>,
    }

    #[async_trait]
    impl PartitionStream for MockPartition {
        async fn recv(&mut self) -> Result<ConsumedRecord, ConnectorError> {
            match self.records.recv().await {
                Some(next) => next,
                None => std::future::pending().await,
            }
        }
    }

    /// Drives a [`MockSession`] from a test: assigns and revokes partitions,
    /// produces records and injects errors.
    #[derive(Debug, Clone)]
    pub struct MockBroker {
        events: mpsc::UnboundedSender<Event>,
        partitions: Arc<Mutex<HashMap<(String, i32), Feed>>>,
        claims: Arc<OnceLock<SharedClaims>>,
        commits: Arc<Mutex<Vec<RecordedCommit>>>,
    }

    impl MockBroker {
        /// Assigns `partitions` of `topic`, each with its own stream.
        pub fn assign(&self, topic: &str, partitions: &[i32]) {
            let mut feeds = self.partitions.lock();
            let streams = partitions
                .iter()
                .map(|&partition| {
                    let (tx, records) = mpsc::unbounded_channel();
                    feeds.insert((topic.to_string(), partition), tx);
                    (topic.to_string(), partition, MockPartition { records })
                })
                .collect();
            self.events.send(Ok(SessionEvent::Assigned(streams))).ok();
        }

        /// Revokes `partitions` of `topic` the way a rebalance does: the
        /// uncommitted marks are committed and the claims released before
        /// the session reports the revocation.
        pub fn revoke(&self, topic: &str, partitions: &[i32]) {
            let revoked: Vec<(String, i32)> = partitions
                .iter()
                .map(|&partition| (topic.to_string(), partition))
                .collect();
            if let Some(claims) = self.claims.get() {
                let pending = claims.lock().release(&revoked);
                if !pending.is_empty() {
                    self.record(&pending, CommitKind::Revoke);
                }
            }
            {
                let mut feeds = self.partitions.lock();
                for key in &revoked {
                    feeds.remove(key);
                }
            }
            self.events.send(Ok(SessionEvent::Revoked(revoked))).ok();
        }

        /// Delivers `record` on its partition stream, or on the shared queue
        /// if the partition is not assigned.
        pub fn produce(&self, record: ConsumedRecord) {
            let feeds = self.partitions.lock();
            match feeds.get(&(record.topic.clone(), record.partition)) {
                Some(feed) => {
                    feed.send(Ok(record)).ok();
                }
                None => {
                    self.events.send(Ok(SessionEvent::Record(record))).ok();
                }
            }
        }

        /// Delivers `record` on the shared queue.
        pub fn produce_shared(&self, record: ConsumedRecord) {
            self.events.send(Ok(SessionEvent::Record(record))).ok();
        }

        /// Fails the next read of a partition stream.
        pub fn fail_partition(&self, topic: &str, partition: i32, error: ConnectorError) {
            if let Some(feed) = self.partitions.lock().get(&(topic.to_string(), partition)) {
                feed.send(Err(error)).ok();
            }
        }

        /// Fails the next session read.
        pub fn fail(&self, error: ConnectorError) {
            self.events.send(Err(error)).ok();
        }

        fn record(&self, offsets: &OffsetTracker, kind: CommitKind) {
            let mut marked: Vec<(String, i32, i64)> = offsets
                .iter()
                .map(|(topic, partition, offset)| (topic.to_string(), partition, offset))
                .collect();
            marked.sort();
            self.commits.lock().push(RecordedCommit {
                kind,
                offsets: marked,
            });
        }
    }

    impl OffsetCommitter for MockBroker {
        fn commit(&self, offsets: &OffsetTracker, kind: CommitKind) -> Result<(), ConnectorError> {
            self.record(offsets, kind);
            Ok(())
        }
    }

    /// Scripted consumer session.
    ///
    /// Yields whatever its [`MockBroker`] feeds it, then pends.
    #[derive(Debug)]
    pub struct MockSession {
        events: mpsc::UnboundedReceiver<Event>,
        broker: MockBroker,
    }

    impl Default for MockSession {
        fn default() -> Self {
            Self::new()
        }
    }

    impl MockSession {
        /// Creates a session with nothing assigned.
        #[must_use]
        pub fn new() -> Self {
            let (tx, events) = mpsc::unbounded_channel();
            Self {
                events,
                broker: MockBroker {
                    events: tx,
                    partitions: Arc::default(),
                    claims: Arc::default(),
                    commits: Arc::default(),
                },
            }
        }

        /// Creates a session that assigns the partitions of `records` and
        /// yields them.
        #[must_use]
        pub fn with_records(records: Vec<ConsumedRecord>) -> Self {
            let session = Self::new();
            let assigned: BTreeSet<(String, i32)> = records
                .iter()
                .map(|r| (r.topic.clone(), r.partition))
                .collect();
            for (topic, partition) in assigned {
                session.broker.assign(&topic, &[partition]);
            }
            for record in records {
                session.broker.produce(record);
            }
            session
        }

        /// Handle driving this session.
        #[must_use]
        pub fn broker(&self) -> MockBroker {
            self.broker.clone()
        }

        /// Commits issued so far.
        #[must_use]
        pub fn commits(&self) -> Arc<Mutex<Vec<RecordedCommit>>> {
            Arc::clone(&self.broker.commits)
        }
    }

    #[async_trait]
    impl ConsumerSession for MockSession {
        type Stream = MockPartition;

        fn attach(&self, claims: SharedClaims) {
            self.broker.claims.set(claims).ok();
        }

        fn committer(&self) -> Arc<dyn OffsetCommitter> {
            Arc::new(self.broker.clone())
        }

        async fn next_event(&mut self) -> Result<SessionEvent<MockPartition>, ConnectorError> {
            match self.events.recv().await {
                Some(next) => next,
                None => std::future::pending().await,
            }
        }
    }

    /// Batch sender that records what it is given.
    ///
    /// Records whose key is listed in `fail_batch_keys` fail inside a batch;
    /// keys in `fail_single_keys` also fail their single retry.
    #[derive(Debug, Default)]
    pub struct MockSender {
        batches: Arc<Mutex<Vec<Vec<KafkaMessage>>>>,
        singles: Arc<Mutex<Vec<KafkaMessage>>>,
        fail_batch: Mutex<HashSet<String>>,
        fail_single: Mutex<HashSet<String>>,
        client_flushes: Arc<AtomicUsize>,
    }

    impl MockSender {
        /// Creates a sender that accepts everything.
        #[must_use]
        pub fn new() -> Self {
            Self::default()
        }

        /// Batches sent so far.
        #[must_use]
        pub fn batches(&self) -> Arc<Mutex<Vec<Vec<KafkaMessage>>>> {
            Arc::clone(&self.batches)
        }

        /// Single-record sends so far.
        #[must_use]
        pub fn singles(&self) -> Arc<Mutex<Vec<KafkaMessage>>> {
            Arc::clone(&self.singles)
        }

        /// Number of client flushes so far.
        #[must_use]
        pub fn client_flushes(&self) -> Arc<AtomicUsize> {
            Arc::clone(&self.client_flushes)
        }

        /// Makes records with these keys fail inside a batch.
        pub fn fail_batch_keys<'a>(&self, keys: impl IntoIterator<Item = &'a str>) {
            self.fail_batch
                .lock()
                .extend(keys.into_iter().map(String::from));
        }

        /// Makes records with these keys fail their single retry.
        pub fn fail_single_keys<'a>(&self, keys: impl IntoIterator<Item = &'a str>) {
            self.fail_single
                .lock()
                .extend(keys.into_iter().map(String::from));
        }
    }

    #[async_trait]
    impl BatchSender for MockSender {
        async fn send_batch(&self, records: &[KafkaMessage]) -> Vec<(usize, ConnectorError)> {
            self.batches.lock().push(records.to_vec());
            let fail = self.fail_batch.lock();
            records
                .iter()
                .enumerate()
                .filter(|(_, r)| fail.contains(&r.key))
                .map(|(i, r)| (i, ConnectorError::WriteError(format!("rejected {}", r.key))))
                .collect()
        }

        async fn send_one(&self, record: &KafkaMessage) -> Result<(), ConnectorError> {
            self.singles.lock().push(record.clone());
            if self.fail_single.lock().contains(&record.key) {
                return Err(ConnectorError::WriteError(format!("rejected {}", record.key)));
            }
            Ok(())
        }

        async fn flush(&self) -> Result<(), ConnectorError> {
            self.client_flushes.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_pair_moves_payloads() {
        let (tx, rx) = mpsc::channel(4);
        let mut module = MockIngestModule::new(3);
        let mut bridge = MockIngestBridge::new();
        let received = bridge.received();
        module.setup(&ConnectorConfig::new("t"), tx).await.unwrap();
        bridge.setup(&ConnectorConfig::new("t"), rx).await.unwrap();

        let (stop, signal) = shutdown::channel();
        let bridge_signal = signal.clone();
        let bridge_task = tokio::spawn(async move { bridge.run(bridge_signal).await });
        let module_task = tokio::spawn(async move { module.run(signal).await });

        let seen = Arc::clone(&received);
        wait_until(Duration::from_secs(1), move || seen.lock().len() == 3).await;
        stop.send(true).unwrap();
        module_task.await.unwrap().unwrap();
        bridge_task.await.unwrap().unwrap();
        assert_eq!(received.lock()[2], Bytes::from_static(b"payload-2"));
    }

    #[tokio::test(start_paused = true)]
    #[should_panic(expected = "condition not met")]
    async fn test_wait_until_times_out() {
        wait_until(Duration::from_millis(50), || false).await;
    }
}
