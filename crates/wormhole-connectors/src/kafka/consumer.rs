//! Consumer-group adapter.
//!
//! [`KafkaConsumerAdapter`] follows a [`ConsumerSession`]: every assigned
//! partition gets its own worker task that hands each record to a
//! [`RecordHandler`] with a bounded retry, marks it and commits once the
//! partition's [`OffsetWindow`](super::offsets::OffsetWindow) is full. A
//! record stuck in retry only holds up its own partition. A final commit is
//! issued when the session ends.
//!
//! Marking happens after the handler succeeded or its retry budget ran out,
//! so a crash replays at most one window per partition. Marks are kept in a
//! [`ClaimTable`] shared with the session, which commits and forgets a
//! partition's marks when it is revoked.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use super::config::KafkaConsumerConfig;
use super::metrics::KafkaConsumerMetrics;
use super::offsets::{ClaimId, ClaimTable, MarkOutcome, OffsetTracker, SharedClaims};
use super::session::{
    CommitKind, ConsumedRecord, ConsumerSession, OffsetCommitter, PartitionStream, SessionEvent,
};
use crate::error::ConnectorError;
use crate::retry::{retry, RetryOutcome, RetryPolicy};
use crate::shutdown::{self, ShutdownSignal};

/// Shared-queue records waiting for their partition worker.
const BACKLOG_CAPACITY: usize = 64;

/// Caller-supplied processing of one consumed record.
#[async_trait]
pub trait RecordHandler: Send + Sync {
    /// Handles one record.
    ///
    /// # Errors
    ///
    /// Returns `ConnectorError` to request a retry.
    async fn handle(&self, record: &ConsumedRecord) -> Result<(), ConnectorError>;
}

/// Commits all marks and starts new windows on success.
fn commit_marks(
    claims: &mut ClaimTable,
    committer: &dyn OffsetCommitter,
    metrics: &KafkaConsumerMetrics,
    kind: CommitKind,
) {
    match committer.commit(claims.marks(), kind) {
        Ok(()) => {
            match kind {
                CommitKind::Window => metrics.record_window_commit(),
                CommitKind::Cleanup => metrics.record_cleanup_commit(),
                CommitKind::Revoke => {}
            }
            claims.reset_windows();
            debug!(?kind, partitions = claims.marks().partition_count(), "offsets committed");
        }
        Err(e) => {
            metrics.record_commit_failure();
            warn!(?kind, error = %e, "offset commit failed");
        }
    }
}

/// Handles the records of one claimed partition.
struct PartitionWorker<H> {
    claim: ClaimId,
    handler: Arc<H>,
    retry: RetryPolicy,
    claims: SharedClaims,
    committer: Arc<dyn OffsetCommitter>,
    metrics: Arc<KafkaConsumerMetrics>,
}

impl<H: RecordHandler> PartitionWorker<H> {
    async fn run<P: PartitionStream>(
        self,
        mut stream: P,
        mut backlog: mpsc::Receiver<ConsumedRecord>,
        mut stop: ShutdownSignal,
    ) -> Result<(), ConnectorError> {
        debug!(topic = %self.claim.topic, partition = self.claim.partition, "partition worker started");
        loop {
            let next = tokio::select! {
                biased;
                () = shutdown::requested(&mut stop) => break,
                Some(record) = backlog.recv() => Ok(record),
                next = stream.recv() => next,
            };
            match next {
                Ok(record) => self.consume(&record, &mut stop).await,
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    self.metrics.record_consume_error();
                    warn!(
                        topic = %self.claim.topic,
                        partition = self.claim.partition,
                        error = %e,
                        "kafka consume error"
                    );
                }
            }
        }
        debug!(topic = %self.claim.topic, partition = self.claim.partition, "partition worker stopped");
        Ok(())
    }

    async fn consume(&self, record: &ConsumedRecord, stop: &mut ShutdownSignal) {
        let handler = &self.handler;
        let metrics = &self.metrics;
        let outcome = retry(
            self.retry,
            stop,
            || handler.handle(record),
            |attempt, e| {
                metrics.record_handler_failure();
                warn!(
                    topic = %record.topic,
                    partition = record.partition,
                    offset = record.offset,
                    attempt,
                    error = %e,
                    "record handler failed"
                );
            },
        )
        .await;

        match outcome {
            RetryOutcome::Succeeded { attempts, .. } if attempts > 1 => {
                debug!(offset = record.offset, attempts, "record handled after retry");
            }
            RetryOutcome::Succeeded { .. } => {}
            RetryOutcome::Exhausted { error, attempts } => {
                self.metrics.record_dropped();
                error!(
                    topic = %record.topic,
                    partition = record.partition,
                    offset = record.offset,
                    attempts,
                    error = %error,
                    "dropping record after exhausting retries"
                );
            }
            RetryOutcome::Cancelled { error } => {
                // Left unmarked so the record is redelivered.
                warn!(
                    offset = record.offset,
                    error = %error,
                    "stopped during handler retry"
                );
                return;
            }
        }
        self.settle(record);
    }

    fn settle(&self, record: &ConsumedRecord) {
        let mut claims = self.claims.lock();
        match claims.mark(&self.claim, record.offset) {
            MarkOutcome::Stale => {
                debug!(
                    topic = %record.topic,
                    partition = record.partition,
                    offset = record.offset,
                    "partition revoked before the record was marked"
                );
                return;
            }
            MarkOutcome::Marked => {}
            MarkOutcome::WindowFull => {
                commit_marks(&mut claims, &*self.committer, &self.metrics, CommitKind::Window);
            }
        }
        self.metrics.record_handled(record.payload.len() as u64);
    }
}

struct WorkerHandle {
    stop: watch::Sender<bool>,
    backlog: mpsc::Sender<ConsumedRecord>,
}

/// Drives one consumer-group session.
pub struct KafkaConsumerAdapter<S, H> {
    session: S,
    handler: Arc<H>,
    retry: RetryPolicy,
    claims: SharedClaims,
    committer: Arc<dyn OffsetCommitter>,
    metrics: Arc<KafkaConsumerMetrics>,
}

impl<S, H> std::fmt::Debug for KafkaConsumerAdapter<S, H> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KafkaConsumerAdapter")
            .field("retry", &self.retry)
            .field("claims", &self.claims)
            .finish_non_exhaustive()
    }
}

impl<S, H> KafkaConsumerAdapter<S, H>
where
    S: ConsumerSession,
    H: RecordHandler + 'static,
{
    /// Creates an adapter committing every `commit_limit` records per
    /// partition.
    #[must_use]
    pub fn new(session: S, handler: H, commit_limit: u64, retry: RetryPolicy) -> Self {
        let claims = ClaimTable::shared(commit_limit);
        session.attach(Arc::clone(&claims));
        let committer = session.committer();
        Self {
            session,
            handler: Arc::new(handler),
            retry,
            claims,
            committer,
            metrics: Arc::new(KafkaConsumerMetrics::new()),
        }
    }

    /// Creates an adapter with the commit limit and retry policy of `config`.
    #[must_use]
    pub fn from_config(session: S, handler: H, config: &KafkaConsumerConfig) -> Self {
        Self::new(session, handler, config.commit_limit, config.handler_retry)
    }

    /// Returns the shared metrics.
    #[must_use]
    pub fn metrics(&self) -> Arc<KafkaConsumerMetrics> {
        Arc::clone(&self.metrics)
    }

    /// Returns a snapshot of the marked offsets.
    #[must_use]
    pub fn offsets(&self) -> OffsetTracker {
        self.claims.lock().marks().clone()
    }

    /// Consumes until shutdown or a fatal session error.
    ///
    /// Non-fatal consume errors are logged and the loop continues. Partition
    /// workers are stopped and the marked offsets committed before returning
    /// in both cases.
    ///
    /// # Errors
    ///
    /// Returns the fatal `ConnectorError` that ended the session.
    pub async fn run(&mut self, mut shutdown: ShutdownSignal) -> Result<(), ConnectorError> {
        info!(retry = ?self.retry, "kafka consumer session started");
        let mut workers: HashMap<(String, i32), WorkerHandle> = HashMap::new();
        let mut tasks: JoinSet<Result<(), ConnectorError>> = JoinSet::new();

        let result = loop {
            let next = tokio::select! {
                biased;
                () = shutdown::requested(&mut shutdown) => break Ok(()),
                Some(joined) = tasks.join_next(), if !tasks.is_empty() => match joined {
                    Ok(Ok(())) => continue,
                    Ok(Err(e)) => {
                        error!(error = %e, "kafka partition worker failed");
                        break Err(e);
                    }
                    Err(e) => break Err(ConnectorError::Internal(format!(
                        "partition worker panicked: {e}"
                    ))),
                },
                next = self.session.next_event() => next,
            };
            match next {
                Ok(SessionEvent::Assigned(streams)) => {
                    self.assign(streams, &mut workers, &mut tasks);
                }
                Ok(SessionEvent::Revoked(partitions)) => self.revoke(&partitions, &mut workers),
                Ok(SessionEvent::Record(record)) => {
                    Self::route(record, &workers, &mut shutdown).await;
                }
                Err(e) if e.is_fatal() => {
                    error!(error = %e, "kafka consumer session failed");
                    break Err(e);
                }
                Err(e) => {
                    self.metrics.record_consume_error();
                    warn!(error = %e, "kafka consume error");
                }
            }
        };

        for worker in workers.values() {
            worker.stop.send_replace(true);
        }
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!(error = %e, "kafka partition worker failed while stopping"),
                Err(e) => warn!(error = %e, "kafka partition worker panicked"),
            }
        }

        self.cleanup();
        info!(
            partitions = self.claims.lock().claimed(),
            "kafka consumer session ended"
        );
        result
    }

    fn assign(
        &self,
        streams: Vec<(String, i32, S::Stream)>,
        workers: &mut HashMap<(String, i32), WorkerHandle>,
        tasks: &mut JoinSet<Result<(), ConnectorError>>,
    ) {
        let count = streams.len();
        for (topic, partition, stream) in streams {
            let key = (topic, partition);
            if let Some(previous) = workers.remove(&key) {
                previous.stop.send_replace(true);
            }
            let claim = self.claims.lock().claim(&key.0, key.1);
            let (stop, signal) = shutdown::channel();
            let (backlog, backlog_rx) = mpsc::channel(BACKLOG_CAPACITY);
            let worker = PartitionWorker {
                claim,
                handler: Arc::clone(&self.handler),
                retry: self.retry,
                claims: Arc::clone(&self.claims),
                committer: Arc::clone(&self.committer),
                metrics: Arc::clone(&self.metrics),
            };
            tasks.spawn(worker.run(stream, backlog_rx, signal));
            workers.insert(key, WorkerHandle { stop, backlog });
        }
        self.metrics.record_assigned(count as u64);
        debug!(partitions = count, "partition workers started");
    }

    fn revoke(
        &self,
        partitions: &[(String, i32)],
        workers: &mut HashMap<(String, i32), WorkerHandle>,
    ) {
        // The session committed what it could. Anything still claimed here
        // was assigned and revoked before its worker started.
        let leftover = self.claims.lock().release(partitions);
        if !leftover.is_empty() {
            debug!(partitions = leftover.partition_count(), "dropping marks of revoked partitions");
        }
        for key in partitions {
            if let Some(worker) = workers.remove(key) {
                worker.stop.send_replace(true);
            }
        }
        self.metrics.record_revoked(partitions.len() as u64);
    }

    async fn route(
        record: ConsumedRecord,
        workers: &HashMap<(String, i32), WorkerHandle>,
        shutdown: &mut ShutdownSignal,
    ) {
        let Some(worker) = workers.get(&(record.topic.clone(), record.partition)) else {
            // Left unmarked; the partition's owner reads it again.
            debug!(
                topic = %record.topic,
                partition = record.partition,
                offset = record.offset,
                "skipping record of an unclaimed partition"
            );
            return;
        };
        tokio::select! {
            biased;
            () = shutdown::requested(shutdown) => {}
            _ = worker.backlog.send(record) => {}
        }
    }

    fn cleanup(&self) {
        let mut claims = self.claims.lock();
        if claims.pending() > 0 {
            commit_marks(&mut claims, &*self.committer, &self.metrics, CommitKind::Cleanup);
        }
    }
}
