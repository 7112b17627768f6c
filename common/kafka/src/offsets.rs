use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use crate::message::Partition;

/// Tracks which handled messages may have their offsets stored.
///
/// Once a message on a partition is held (its downstream forward failed), no later offset
/// on that partition is released until the partition is revoked or reassigned. The
/// committed position therefore never moves past a message that was not fully handled,
/// and a restart or rebalance redelivers from the held message onwards.
#[derive(Debug, Default)]
pub struct OffsetTracker {
    held: Mutex<HashMap<Partition, i64>>,
}

impl OffsetTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a fully handled message, returning whether its offset may be stored.
    pub fn complete(&self, partition: &Partition, offset: i64) -> bool {
        let held = self.held.lock().unwrap_or_else(PoisonError::into_inner);
        match held.get(partition) {
            Some(held_at) => offset < *held_at,
            None => true,
        }
    }

    /// Record a message that must be redelivered. Returns the offset the partition is
    /// held at, which is the earliest held message.
    pub fn hold(&self, partition: &Partition, offset: i64) -> i64 {
        let mut held = self.held.lock().unwrap_or_else(PoisonError::into_inner);
        let held_at = held.entry(partition.clone()).or_insert(offset);
        if offset < *held_at {
            *held_at = offset;
        }
        *held_at
    }

    pub fn held_at(&self, partition: &Partition) -> Option<i64> {
        let held = self.held.lock().unwrap_or_else(PoisonError::into_inner);
        held.get(partition).copied()
    }

    /// Forget state for partitions leaving (or re-entering) this consumer's claim.
    pub fn release(&self, partitions: &[Partition]) {
        let mut held = self.held.lock().unwrap_or_else(PoisonError::into_inner);
        for partition in partitions {
            held.remove(partition);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn completes_freely_without_holds() {
        let tracker = OffsetTracker::new();
        let p0 = Partition::new("raw", 0);

        assert!(tracker.complete(&p0, 0));
        assert!(tracker.complete(&p0, 1));
        assert_eq!(tracker.held_at(&p0), None);
    }

    #[test]
    fn hold_blocks_later_offsets_on_the_same_partition() {
        let tracker = OffsetTracker::new();
        let p0 = Partition::new("raw", 0);
        let p1 = Partition::new("raw", 1);

        assert!(tracker.complete(&p0, 4));
        assert_eq!(tracker.hold(&p0, 5), 5);
        assert!(!tracker.complete(&p0, 6));
        assert!(!tracker.complete(&p0, 7));

        // Other partitions are unaffected
        assert!(tracker.complete(&p1, 6));
    }

    #[test]
    fn hold_keeps_the_earliest_offset() {
        let tracker = OffsetTracker::new();
        let p0 = Partition::new("raw", 0);

        tracker.hold(&p0, 9);
        assert_eq!(tracker.hold(&p0, 12), 9);
        assert_eq!(tracker.hold(&p0, 3), 3);
        assert_eq!(tracker.held_at(&p0), Some(3));
    }

    #[test]
    fn release_clears_holds() {
        let tracker = OffsetTracker::new();
        let p0 = Partition::new("raw", 0);
        let p1 = Partition::new("raw", 1);

        tracker.hold(&p0, 5);
        tracker.hold(&p1, 8);
        tracker.release(&[p0.clone()]);

        assert!(tracker.complete(&p0, 6));
        assert!(!tracker.complete(&p1, 9));
    }
}
