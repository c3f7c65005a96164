//! Consumer-group session.
//!
//! [`ConsumerSession`] is the seam between the consumer adapter and the
//! broker. It reports partition assignments and revocations, hands out one
//! [`PartitionStream`] per assigned partition and commits marked offsets
//! through an [`OffsetCommitter`]. [`KafkaSession`] implements it over an
//! rdkafka `StreamConsumer` with split partition queues.

use std::sync::{Arc, OnceLock, Weak};

use async_trait::async_trait;
use rdkafka::client::ClientContext;
use rdkafka::consumer::stream_consumer::StreamPartitionQueue;
use rdkafka::consumer::{CommitMode, Consumer, ConsumerContext, Rebalance, StreamConsumer};
use rdkafka::error::{KafkaError, KafkaResult, RDKafkaErrorCode};
use rdkafka::message::{BorrowedMessage, Message};
use rdkafka::TopicPartitionList;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use super::config::KafkaConsumerConfig;
use super::offsets::{OffsetTracker, SharedClaims};
use crate::error::ConnectorError;

/// A consumed record, detached from the client's buffers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsumedRecord {
    /// Source topic.
    pub topic: String,
    /// Source partition.
    pub partition: i32,
    /// Offset within the partition.
    pub offset: i64,
    /// Record key, if any.
    pub key: Option<Vec<u8>>,
    /// Record value; empty for tombstones.
    pub payload: Vec<u8>,
    /// Broker or producer timestamp in milliseconds, 0 when absent.
    pub timestamp: i64,
}

impl ConsumedRecord {
    /// Creates a keyless record.
    #[must_use]
    pub fn new(topic: impl Into<String>, partition: i32, offset: i64, payload: Vec<u8>) -> Self {
        Self {
            topic: topic.into(),
            partition,
            offset,
            key: None,
            payload,
            timestamp: 0,
        }
    }

    fn from_message(msg: &BorrowedMessage<'_>) -> Self {
        Self {
            topic: msg.topic().to_string(),
            partition: msg.partition(),
            offset: msg.offset(),
            key: msg.key().map(<[u8]>::to_vec),
            payload: msg.payload().map(<[u8]>::to_vec).unwrap_or_default(),
            timestamp: msg.timestamp().to_millis().unwrap_or(0),
        }
    }
}

/// Why a commit is issued.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitKind {
    /// A partition's offset window filled.
    Window,
    /// Partitions are being revoked.
    Revoke,
    /// The session is ending.
    Cleanup,
}

/// Something the session observed.
#[derive(Debug)]
pub enum SessionEvent<P> {
    /// Partitions newly assigned to this member, each with its own stream.
    Assigned(Vec<(String, i32, P)>),
    /// Partitions taken away. The session already committed their
    /// uncommitted marks and released their claims.
    Revoked(Vec<(String, i32)>),
    /// A record that arrived on the shared queue instead of its partition
    /// stream.
    Record(ConsumedRecord),
}

/// Records of one assigned partition.
#[async_trait]
pub trait PartitionStream: Send + 'static {
    /// Waits for the partition's next record.
    ///
    /// # Errors
    ///
    /// Returns `ConnectorError`; [`ConnectorError::is_fatal`] tells whether
    /// the session is unusable.
    async fn recv(&mut self) -> Result<ConsumedRecord, ConnectorError>;
}

/// Commits marked offsets.
pub trait OffsetCommitter: Send + Sync {
    /// Commits every offset in `offsets`.
    ///
    /// # Errors
    ///
    /// Returns `ConnectorError::CommitError` if the broker rejects the commit.
    fn commit(&self, offsets: &OffsetTracker, kind: CommitKind) -> Result<(), ConnectorError>;
}

/// A consumer-group session.
#[async_trait]
pub trait ConsumerSession: Send {
    /// Per-partition record stream.
    type Stream: PartitionStream;

    /// Hands the session the table it releases revoked partitions from.
    fn attach(&self, claims: SharedClaims);

    /// Returns a committer usable from any task.
    fn committer(&self) -> Arc<dyn OffsetCommitter>;

    /// Waits for the next assignment, revocation or shared-queue record.
    ///
    /// # Errors
    ///
    /// Returns `ConnectorError`; [`ConnectorError::is_fatal`] tells whether
    /// the session is unusable.
    async fn next_event(&mut self) -> Result<SessionEvent<Self::Stream>, ConnectorError>;
}

type KafkaConsumer = StreamConsumer<SessionContext>;

/// Client context that follows the group's rebalances.
///
/// On revocation it commits the revoked partitions' uncommitted marks and
/// releases their claims before the client gives them up. On assignment it
/// splits a queue off for every new partition.
pub struct SessionContext {
    consumer: OnceLock<Weak<KafkaConsumer>>,
    claims: OnceLock<SharedClaims>,
    events: mpsc::UnboundedSender<SessionEvent<KafkaPartitionStream>>,
}

impl SessionContext {
    fn new(events: mpsc::UnboundedSender<SessionEvent<KafkaPartitionStream>>) -> Self {
        Self {
            consumer: OnceLock::new(),
            claims: OnceLock::new(),
            events,
        }
    }

    fn consumer(&self) -> Option<Arc<KafkaConsumer>> {
        self.consumer.get().and_then(Weak::upgrade)
    }

    fn revoke(&self, partitions: Vec<(String, i32)>) {
        if let Some(claims) = self.claims.get() {
            // Held across the commit so no window commit can slip in between.
            let mut claims = claims.lock();
            let pending = claims.release(&partitions);
            if !pending.is_empty() {
                let result = match self.consumer() {
                    Some(consumer) => {
                        OffsetCommitter::commit(&*consumer, &pending, CommitKind::Revoke)
                    }
                    None => Err(ConnectorError::Closed),
                };
                match result {
                    Ok(()) => debug!(
                        partitions = pending.partition_count(),
                        "committed marks of revoked partitions"
                    ),
                    Err(e) => warn!(error = %e, "commit of revoked partitions failed"),
                }
            }
        }
        info!(partitions = ?partitions, "kafka partitions revoked");
        self.events.send(SessionEvent::Revoked(partitions)).ok();
    }

    fn assign(&self, partitions: Vec<(String, i32)>) {
        let Some(consumer) = self.consumer() else {
            return;
        };
        info!(partitions = ?partitions, "kafka partitions assigned");
        let streams = partitions
            .into_iter()
            .map(|(topic, partition)| {
                let queue = consumer.split_partition_queue(&topic, partition);
                if queue.is_none() {
                    warn!(%topic, partition, "no partition queue; records stay on the shared queue");
                }
                (topic, partition, KafkaPartitionStream { queue })
            })
            .collect();
        self.events.send(SessionEvent::Assigned(streams)).ok();
    }
}

fn partitions_of(tpl: &TopicPartitionList) -> Vec<(String, i32)> {
    tpl.elements()
        .iter()
        .map(|elem| (elem.topic().to_string(), elem.partition()))
        .collect()
}

impl ClientContext for SessionContext {}

impl ConsumerContext for SessionContext {
    fn pre_rebalance<'a>(&self, rebalance: &Rebalance<'a>) {
        if let Rebalance::Revoke(tpl) = rebalance {
            self.revoke(partitions_of(tpl));
        }
    }

    fn post_rebalance<'a>(&self, rebalance: &Rebalance<'a>) {
        match rebalance {
            Rebalance::Assign(tpl) => self.assign(partitions_of(tpl)),
            Rebalance::Revoke(_) => {}
            Rebalance::Error(e) => error!(error = %e, "kafka rebalance failed"),
        }
    }

    fn commit_callback(&self, result: KafkaResult<()>, offsets: &TopicPartitionList) {
        match result {
            Ok(()) => debug!(partitions = offsets.count(), "offsets committed"),
            Err(e) => warn!(error = %e, "offset commit failed"),
        }
    }
}

impl OffsetCommitter for KafkaConsumer {
    fn commit(&self, offsets: &OffsetTracker, kind: CommitKind) -> Result<(), ConnectorError> {
        let mode = match kind {
            CommitKind::Window => CommitMode::Async,
            CommitKind::Revoke | CommitKind::Cleanup => CommitMode::Sync,
        };
        Consumer::commit(self, &offsets.to_topic_partition_list(), mode)
            .map_err(|e| ConnectorError::CommitError(format!("offset commit failed: {e}")))
    }
}

/// Records of one partition, read from its split queue.
pub struct KafkaPartitionStream {
    queue: Option<StreamPartitionQueue<SessionContext>>,
}

impl std::fmt::Debug for KafkaPartitionStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KafkaPartitionStream")
            .field("split", &self.queue.is_some())
            .finish()
    }
}

#[async_trait]
impl PartitionStream for KafkaPartitionStream {
    async fn recv(&mut self) -> Result<ConsumedRecord, ConnectorError> {
        match &self.queue {
            Some(queue) => {
                let msg = queue.recv().await.map_err(classify)?;
                Ok(ConsumedRecord::from_message(&msg))
            }
            // Unsplit partitions are fed from the shared queue.
            None => std::future::pending().await,
        }
    }
}

/// rdkafka-backed [`ConsumerSession`].
pub struct KafkaSession {
    consumer: Arc<KafkaConsumer>,
    events: mpsc::UnboundedReceiver<SessionEvent<KafkaPartitionStream>>,
}

impl std::fmt::Debug for KafkaSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KafkaSession").finish_non_exhaustive()
    }
}

impl KafkaSession {
    /// Creates the consumer and subscribes to the configured topics.
    ///
    /// # Errors
    ///
    /// Returns `ConnectorError::ConnectionFailed` if the client cannot be
    /// created or the subscription fails.
    pub fn connect(config: &KafkaConsumerConfig) -> Result<Self, ConnectorError> {
        let (tx, events) = mpsc::unbounded_channel();
        let consumer: KafkaConsumer = config
            .to_rdkafka_config()
            .create_with_context(SessionContext::new(tx))
            .map_err(|e| {
                ConnectorError::ConnectionFailed(format!("failed to create consumer: {e}"))
            })?;
        let consumer = Arc::new(consumer);
        consumer
            .context()
            .consumer
            .set(Arc::downgrade(&consumer))
            .ok();

        let topics: Vec<&str> = config.topics.iter().map(String::as_str).collect();
        consumer.subscribe(&topics).map_err(|e| {
            ConnectorError::ConnectionFailed(format!("failed to subscribe: {e}"))
        })?;

        info!(
            brokers = %config.bootstrap_servers,
            group = %config.group_id,
            topics = ?config.topics,
            "kafka consumer subscribed"
        );
        Ok(Self { consumer, events })
    }
}

#[async_trait]
impl ConsumerSession for KafkaSession {
    type Stream = KafkaPartitionStream;

    fn attach(&self, claims: SharedClaims) {
        if self.consumer.context().claims.set(claims).is_err() {
            warn!("kafka session already attached to a claim table");
        }
    }

    fn committer(&self) -> Arc<dyn OffsetCommitter> {
        Arc::clone(&self.consumer) as Arc<dyn OffsetCommitter>
    }

    async fn next_event(&mut self) -> Result<SessionEvent<Self::Stream>, ConnectorError> {
        if let Ok(event) = self.events.try_recv() {
            return Ok(event);
        }
        // Polling the shared queue is what runs the rebalance callbacks.
        tokio::select! {
            biased;
            Some(event) = self.events.recv() => Ok(event),
            msg = self.consumer.recv() => {
                let msg = msg.map_err(classify)?;
                Ok(SessionEvent::Record(ConsumedRecord::from_message(&msg)))
            }
        }
    }
}

/// Maps a consume error onto the adapter's error classes.
///
/// Authentication, authorization and client-fatal errors end the session;
/// everything else is reported as a read error and the session continues.
#[must_use]
pub fn classify(err: KafkaError) -> ConnectorError {
    match err.rdkafka_error_code() {
        Some(
            RDKafkaErrorCode::Authentication
            | RDKafkaErrorCode::SaslAuthenticationFailed
            | RDKafkaErrorCode::TopicAuthorizationFailed
            | RDKafkaErrorCode::GroupAuthorizationFailed
            | RDKafkaErrorCode::ClusterAuthorizationFailed,
        ) => ConnectorError::AuthenticationFailed(err.to_string()),
        Some(RDKafkaErrorCode::Fatal | RDKafkaErrorCode::UnknownProtocol) => {
            ConnectorError::Fatal(err.to_string())
        }
        _ => ConnectorError::ReadError(err.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_auth_is_fatal() {
        let err = classify(KafkaError::MessageConsumption(
            RDKafkaErrorCode::GroupAuthorizationFailed,
        ));
        assert!(matches!(err, ConnectorError::AuthenticationFailed(_)));
        assert!(err.is_fatal());
    }

    #[test]
    fn test_classify_protocol_is_fatal() {
        let err = classify(KafkaError::MessageConsumption(
            RDKafkaErrorCode::UnknownProtocol,
        ));
        assert!(matches!(err, ConnectorError::Fatal(_)));
    }

    #[test]
    fn test_classify_transport_is_transient() {
        let err = classify(KafkaError::MessageConsumption(
            RDKafkaErrorCode::BrokerTransportFailure,
        ));
        assert!(matches!(err, ConnectorError::ReadError(_)));
        assert!(!err.is_fatal());
    }

    #[test]
    fn test_partitions_of_list() {
        let mut tpl = TopicPartitionList::new();
        tpl.add_partition("events", 0);
        tpl.add_partition("events", 3);
        tpl.add_partition("audit", 1);
        let mut partitions = partitions_of(&tpl);
        partitions.sort();
        assert_eq!(
            partitions,
            vec![
                ("audit".to_string(), 1),
                ("events".to_string(), 0),
                ("events".to_string(), 3),
            ]
        );
    }

    #[test]
    fn test_keyless_record() {
        let record = ConsumedRecord::new("events", 3, 42, b"v".to_vec());
        assert_eq!(record.partition, 3);
        assert!(record.key.is_none());
        assert_eq!(record.timestamp, 0);
    }
}
