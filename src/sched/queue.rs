//! Delay queue for pending expiry jobs.
//!
//! Jobs are ordered by fire time (earliest first), with FIFO tie-break by
//! sequence number. The queue deduplicates on transaction reference: while a
//! job for a reference is pending, scheduling the same reference again is a
//! no-op, so re-creation attempts can never double-schedule an expiry.

use std::collections::{BinaryHeap, HashSet};

use chrono::{DateTime, Utc};

use crate::types::TxnRef;

/// A scheduled expiry check for one transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpiryJob {
    /// The transaction to check. Also the deduplication key.
    pub reference: TxnRef,

    /// When the job becomes due.
    pub fire_at: DateTime<Utc>,

    /// Delivery attempts already made. Zero for a fresh job; incremented on
    /// each transient redelivery.
    pub attempt: u32,
}

/// Heap entry wrapping a job with its FIFO sequence number.
#[derive(Debug, Clone)]
struct QueuedJob {
    job: ExpiryJob,
    sequence: u64,
}

impl PartialEq for QueuedJob {
    fn eq(&self, other: &Self) -> bool {
        self.job.fire_at == other.job.fire_at && self.sequence == other.sequence
    }
}

impl Eq for QueuedJob {}

impl PartialOrd for QueuedJob {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for QueuedJob {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        // BinaryHeap is a max-heap; reverse both comparisons so the earliest
        // fire time (then the lowest sequence) surfaces first.
        other
            .job
            .fire_at
            .cmp(&self.job.fire_at)
            .then_with(|| other.sequence.cmp(&self.sequence))
    }
}

/// A delay queue of expiry jobs, deduplicated by transaction reference.
#[derive(Debug, Default)]
pub struct DelayQueue {
    heap: BinaryHeap<QueuedJob>,
    /// References currently pending, for dedup.
    pending: HashSet<TxnRef>,
    /// Counter for FIFO ordering among equal fire times.
    next_sequence: u64,
}

impl DelayQueue {
    /// Creates an empty queue.
    pub fn new() -> Self {
        DelayQueue {
            heap: BinaryHeap::new(),
            pending: HashSet::new(),
            next_sequence: 0,
        }
    }

    /// Number of pending jobs.
    pub fn len(&self) -> usize {
        self.heap.len()
    }

    /// True if no jobs are pending.
    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// True if a job for this reference is pending.
    pub fn contains(&self, reference: &TxnRef) -> bool {
        self.pending.contains(reference)
    }

    /// Schedules a job.
    ///
    /// Returns `true` if the job was enqueued, `false` if a job for the same
    /// reference is already pending (deduplicated no-op).
    pub fn push(&mut self, job: ExpiryJob) -> bool {
        if self.pending.contains(&job.reference) {
            return false;
        }

        let sequence = self.next_sequence;
        self.next_sequence += 1;

        self.pending.insert(job.reference);
        self.heap.push(QueuedJob { job, sequence });
        true
    }

    /// Fire time of the next job, if any.
    pub fn next_fire_at(&self) -> Option<DateTime<Utc>> {
        self.heap.peek().map(|entry| entry.job.fire_at)
    }

    /// Pops the earliest job if it is due at `now`.
    ///
    /// Popping removes the reference from the dedup set, so a later
    /// reschedule (redelivery) of the same reference is accepted.
    pub fn pop_due(&mut self, now: DateTime<Utc>) -> Option<ExpiryJob> {
        if self.next_fire_at()? > now {
            return None;
        }
        let entry = self.heap.pop()?;
        self.pending.remove(&entry.job.reference);
        Some(entry.job)
    }
}
