//! Offset marking and commit windows.
//!
//! [`OffsetTracker`] keeps the highest marked offset for each
//! topic-partition. [`OffsetWindow`] counts records marked since the last
//! commit, and [`ClaimTable`] holds the marks and windows of the
//! partitions this member currently owns.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use rdkafka::Offset;
use rdkafka::TopicPartitionList;

/// Tracks marked offsets per topic-partition.
///
/// Offsets stored are the last-handled offset (not the next offset to fetch).
/// When committing to Kafka, `to_topic_partition_list()` returns offset+1
/// (the next offset to consume) per Kafka convention.
#[derive(Debug, Clone, Default)]
pub struct OffsetTracker {
    offsets: HashMap<(String, i32), i64>,
}

impl OffsetTracker {
    /// Creates a new empty offset tracker.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks `offset` as handled. An older offset never moves the mark back.
    pub fn mark(&mut self, topic: &str, partition: i32, offset: i64) {
        let entry = self
            .offsets
            .entry((topic.to_string(), partition))
            .or_insert(offset);
        if offset > *entry {
            *entry = offset;
        }
    }

    /// Gets the last-marked offset for a topic-partition.
    #[must_use]
    pub fn get(&self, topic: &str, partition: i32) -> Option<i64> {
        self.offsets.get(&(topic.to_string(), partition)).copied()
    }

    /// Returns the number of tracked partitions.
    #[must_use]
    pub fn partition_count(&self) -> usize {
        self.offsets.len()
    }

    /// Returns `true` if nothing has been marked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.offsets.is_empty()
    }

    /// Iterates over `(topic, partition, offset)` marks.
    pub fn iter(&self) -> impl Iterator<Item = (&str, i32, i64)> {
        self.offsets
            .iter()
            .map(|((topic, partition), offset)| (topic.as_str(), *partition, *offset))
    }

    /// Builds an rdkafka [`TopicPartitionList`] for committing.
    ///
    /// Per Kafka convention, committed offsets are next-to-fetch (offset+1).
    #[must_use]
    pub fn to_topic_partition_list(&self) -> TopicPartitionList {
        let mut tpl = TopicPartitionList::new();
        for (topic, partition, offset) in self.iter() {
            tpl.add_partition_offset(topic, partition, Offset::Offset(offset + 1))
                .ok();
        }
        tpl
    }

    /// Forgets a partition, e.g. after it was revoked.
    pub fn remove(&mut self, topic: &str, partition: i32) {
        self.offsets.remove(&(topic.to_string(), partition));
    }
}

/// Counter of records marked since the last commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OffsetWindow {
    limit: u64,
    count: u64,
}

impl OffsetWindow {
    /// Creates a window that fills after `limit` records.
    #[must_use]
    pub fn new(limit: u64) -> Self {
        Self {
            limit: limit.max(1),
            count: 0,
        }
    }

    /// Counts one marked record. Returns `true` when the window is full and
    /// a commit is due.
    pub fn record(&mut self) -> bool {
        self.count += 1;
        self.count >= self.limit
    }

    /// Starts a new window after a commit.
    pub fn reset(&mut self) {
        self.count = 0;
    }

    /// Records marked since the last commit.
    #[must_use]
    pub fn pending(&self) -> u64 {
        self.count
    }
}

/// Shared handle to a session's [`ClaimTable`].
pub type SharedClaims = Arc<Mutex<ClaimTable>>;

/// One claim of a partition by this group member.
///
/// A partition assigned again after a revocation gets a new epoch, so marks
/// carried by an older claim no longer count.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClaimId {
    /// Claimed topic.
    pub topic: String,
    /// Claimed partition.
    pub partition: i32,
    epoch: u64,
}

/// Result of [`ClaimTable::mark`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkOutcome {
    /// The offset was marked.
    Marked,
    /// The offset was marked and the partition's window is full.
    WindowFull,
    /// The claim was released; nothing was marked.
    Stale,
}

#[derive(Debug)]
struct Claim {
    epoch: u64,
    window: OffsetWindow,
}

/// Partitions currently owned by this member, with their marks and windows.
///
/// Marks are only accepted from the current claim of a partition. Releasing
/// a partition hands back its uncommitted marks and forgets it, so no later
/// commit can carry an offset for a partition another member now owns.
#[derive(Debug)]
pub struct ClaimTable {
    limit: u64,
    next_epoch: u64,
    claims: HashMap<(String, i32), Claim>,
    marks: OffsetTracker,
}

impl ClaimTable {
    /// Creates an empty table whose windows fill after `limit` records.
    #[must_use]
    pub fn new(limit: u64) -> Self {
        Self {
            limit,
            next_epoch: 0,
            claims: HashMap::new(),
            marks: OffsetTracker::new(),
        }
    }

    /// Creates an empty table behind a shared lock.
    #[must_use]
    pub fn shared(limit: u64) -> SharedClaims {
        Arc::new(Mutex::new(Self::new(limit)))
    }

    /// Claims a partition. Claiming an owned partition again starts a new
    /// epoch and keeps its marks.
    pub fn claim(&mut self, topic: &str, partition: i32) -> ClaimId {
        self.next_epoch += 1;
        let epoch = self.next_epoch;
        let limit = self.limit;
        self.claims
            .entry((topic.to_string(), partition))
            .and_modify(|claim| claim.epoch = epoch)
            .or_insert_with(|| Claim {
                epoch,
                window: OffsetWindow::new(limit),
            });
        ClaimId {
            topic: topic.to_string(),
            partition,
            epoch,
        }
    }

    /// Returns `true` while `id` is the partition's current claim.
    #[must_use]
    pub fn is_current(&self, id: &ClaimId) -> bool {
        self.claims
            .get(&(id.topic.clone(), id.partition))
            .is_some_and(|claim| claim.epoch == id.epoch)
    }

    /// Marks `offset` under claim `id`.
    pub fn mark(&mut self, id: &ClaimId, offset: i64) -> MarkOutcome {
        let Some(claim) = self
            .claims
            .get_mut(&(id.topic.clone(), id.partition))
            .filter(|claim| claim.epoch == id.epoch)
        else {
            return MarkOutcome::Stale;
        };
        let full = claim.window.record();
        self.marks.mark(&id.topic, id.partition, offset);
        if full {
            MarkOutcome::WindowFull
        } else {
            MarkOutcome::Marked
        }
    }

    /// Forgets `partitions`, returning the marks that were not committed yet.
    pub fn release(&mut self, partitions: &[(String, i32)]) -> OffsetTracker {
        let mut pending = OffsetTracker::new();
        for (topic, partition) in partitions {
            let Some(claim) = self.claims.remove(&(topic.clone(), *partition)) else {
                continue;
            };
            let offset = self.marks.get(topic, *partition);
            if let Some(offset) = offset.filter(|_| claim.window.pending() > 0) {
                pending.mark(topic, *partition, offset);
            }
            self.marks.remove(topic, *partition);
        }
        pending
    }

    /// Marks of every claimed partition.
    #[must_use]
    pub fn marks(&self) -> &OffsetTracker {
        &self.marks
    }

    /// Resets every window after a commit covering all marks.
    pub fn reset_windows(&mut self) {
        for claim in self.claims.values_mut() {
            claim.window.reset();
        }
    }

    /// Number of claimed partitions.
    #[must_use]
    pub fn claimed(&self) -> usize {
        self.claims.len()
    }

    /// Records marked across all partitions since the last commit.
    #[must_use]
    pub fn pending(&self) -> u64 {
        self.claims.values().map(|claim| claim.window.pending()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mark_and_get() {
        let mut tracker = OffsetTracker::new();
        tracker.mark("events", 0, 100);
        tracker.mark("events", 1, 200);

        assert_eq!(tracker.get("events", 0), Some(100));
        assert_eq!(tracker.get("events", 1), Some(200));
        assert_eq!(tracker.get("events", 2), None);
        assert_eq!(tracker.partition_count(), 2);
    }

    #[test]
    fn test_mark_never_moves_back() {
        let mut tracker = OffsetTracker::new();
        tracker.mark("events", 0, 200);
        tracker.mark("events", 0, 150);
        assert_eq!(tracker.get("events", 0), Some(200));
        tracker.mark("events", 0, 201);
        assert_eq!(tracker.get("events", 0), Some(201));
    }

    #[test]
    fn test_topic_partition_list() {
        let mut tracker = OffsetTracker::new();
        tracker.mark("events", 0, 99);
        tracker.mark("events", 1, 199);

        let tpl = tracker.to_topic_partition_list();
        let elements = tpl.elements();
        assert_eq!(elements.len(), 2);

        for elem in &elements {
            match elem.partition() {
                0 => assert_eq!(elem.offset(), Offset::Offset(100)),
                1 => assert_eq!(elem.offset(), Offset::Offset(200)),
                _ => panic!("unexpected partition"),
            }
        }
    }

    #[test]
    fn test_remove() {
        let mut tracker = OffsetTracker::new();
        tracker.mark("events", 0, 1);
        tracker.remove("events", 0);
        assert!(tracker.is_empty());
    }

    #[test]
    fn test_window_fills_at_limit() {
        let mut window = OffsetWindow::new(3);
        assert!(!window.record());
        assert!(!window.record());
        assert!(window.record());
        window.reset();
        assert_eq!(window.pending(), 0);
        assert!(!window.record());
    }

    #[test]
    fn test_windows_are_per_partition() {
        let mut claims = ClaimTable::new(2);
        let p0 = claims.claim("events", 0);
        let p1 = claims.claim("events", 1);
        assert_eq!(claims.mark(&p0, 10), MarkOutcome::Marked);
        assert_eq!(claims.mark(&p1, 20), MarkOutcome::Marked);
        assert_eq!(claims.mark(&p0, 11), MarkOutcome::WindowFull);
        assert_eq!(claims.claimed(), 2);
        assert_eq!(claims.pending(), 3);
        assert_eq!(claims.marks().get("events", 0), Some(11));

        claims.reset_windows();
        assert_eq!(claims.pending(), 0);
    }

    #[test]
    fn test_release_returns_uncommitted_marks() {
        let mut claims = ClaimTable::new(100);
        let p0 = claims.claim("events", 0);
        let p1 = claims.claim("events", 1);
        claims.mark(&p0, 5);
        claims.mark(&p1, 7);
        claims.reset_windows();
        claims.mark(&p0, 6);

        // Partition 1 has nothing new since the last commit.
        let released = claims.release(&[("events".into(), 0), ("events".into(), 1)]);
        assert_eq!(released.get("events", 0), Some(6));
        assert_eq!(released.get("events", 1), None);
        assert!(claims.marks().is_empty());
        assert_eq!(claims.claimed(), 0);
    }

    #[test]
    fn test_released_claim_is_stale() {
        let mut claims = ClaimTable::new(100);
        let old = claims.claim("events", 0);
        claims.release(&[("events".into(), 0)]);
        assert!(!claims.is_current(&old));
        assert_eq!(claims.mark(&old, 3), MarkOutcome::Stale);
        assert!(claims.marks().is_empty());

        // Assigned back: only the new claim may mark.
        let new = claims.claim("events", 0);
        assert_eq!(claims.mark(&old, 4), MarkOutcome::Stale);
        assert_eq!(claims.mark(&new, 9), MarkOutcome::Marked);
        assert_eq!(claims.marks().get("events", 0), Some(9));
    }

    #[test]
    fn test_reclaim_keeps_marks() {
        let mut claims = ClaimTable::new(100);
        let first = claims.claim("events", 0);
        claims.mark(&first, 1);
        let second = claims.claim("events", 0);
        assert!(!claims.is_current(&first));
        assert!(claims.is_current(&second));
        assert_eq!(claims.pending(), 1);
        assert_eq!(claims.marks().get("events", 0), Some(1));
    }
}
