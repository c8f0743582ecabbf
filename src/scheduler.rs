//! Dirty tracking for whole skeletons.
//!
//! Notification handlers only ever mark a skeleton dirty; the actual work happens when the
//! queue is flushed on the next scheduling tick. Marks are deduplicated by skeleton identity,
//! so any burst of notifications between two ticks collapses into one reconciliation pass per
//! skeleton. A skeleton stays in the queue while its own pass runs, which is how re-entrant
//! marks caused by that pass's writes are recognised and dropped.

use crate::host::SkeletonId;
use smallvec::SmallVec;
use std::collections::HashSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkOutcome {
    /// Newly queued.
    Queued,
    /// Already pending; collapsed into the existing entry.
    Coalesced,
    /// The skeleton's own pass is running; the mark is an echo of it.
    Suppressed,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlushStats {
    pub passes: usize,
    /// Skeletons marked during the flush, left for the next tick.
    pub deferred: usize,
}

#[derive(Debug, Default)]
pub struct DirtyQueue {
    order: Vec<SkeletonId>,
    members: HashSet<SkeletonId>,
    in_flight: Option<SkeletonId>,
    flush_scheduled: bool,
    suppressed: u64,
}

impl DirtyQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mark_dirty(&mut self, skeleton: SkeletonId) -> MarkOutcome {
        if self.in_flight == Some(skeleton) {
            self.suppressed += 1;
            return MarkOutcome::Suppressed;
        }
        let outcome = if self.members.insert(skeleton) {
            self.order.push(skeleton);
            MarkOutcome::Queued
        } else {
            MarkOutcome::Coalesced
        };
        self.flush_scheduled = true;
        outcome
    }

    pub fn is_dirty(&self, skeleton: SkeletonId) -> bool {
        self.members.contains(&skeleton)
    }

    pub fn is_in_flight(&self, skeleton: SkeletonId) -> bool {
        self.in_flight == Some(skeleton)
    }

    pub fn in_flight(&self) -> Option<SkeletonId> {
        self.in_flight
    }

    pub fn flush_scheduled(&self) -> bool {
        self.flush_scheduled
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn pending(&self) -> &[SkeletonId] {
        &self.order
    }

    /// Total marks dropped by the re-entrancy guard.
    pub fn suppressed_marks(&self) -> u64 {
        self.suppressed
    }

    /// Runs `pass` once per skeleton pending at the start of the flush, in marking order.
    ///
    /// Each skeleton is removed only after its pass returns. The queue is handed to `pass` so
    /// that notifications routed during the pass can mark other skeletons; those are kept for
    /// the next tick.
    pub fn flush<F>(&mut self, mut pass: F) -> FlushStats
    where
        F: FnMut(SkeletonId, &mut DirtyQueue),
    {
        if !self.flush_scheduled {
            return FlushStats::default();
        }
        self.flush_scheduled = false;

        let batch: SmallVec<[SkeletonId; 8]> = self.order.iter().copied().collect();
        let mut stats = FlushStats::default();
        for skeleton in batch {
            self.run_in_flight(skeleton, &mut pass);
            stats.passes += 1;
        }
        stats.deferred = self.order.len();
        if stats.deferred > 0 {
            self.flush_scheduled = true;
        }
        stats
    }

    /// Runs `pass` for one skeleton immediately, with the re-entrancy guard held, and clears
    /// any pending mark for it afterwards.
    pub fn run_in_flight<F, T>(&mut self, skeleton: SkeletonId, pass: F) -> T
    where
        F: FnOnce(SkeletonId, &mut DirtyQueue) -> T,
    {
        debug_assert!(self.in_flight.is_none(), "reconciliation passes do not nest");
        self.in_flight = Some(skeleton);
        let result = pass(skeleton, self);
        self.in_flight = None;
        self.remove(skeleton);
        result
    }

    fn remove(&mut self, skeleton: SkeletonId) {
        if self.members.remove(&skeleton) {
            self.order.retain(|queued| *queued != skeleton);
        }
        if self.order.is_empty() {
            self.flush_scheduled = false;
        }
    }
}

/// Fixed-interval scheduling tick.
#[derive(Debug, Clone)]
pub struct TickTimer {
    interval: f32,
    elapsed: f32,
}

impl TickTimer {
    pub fn new(interval_secs: f32) -> Self {
        Self { interval: interval_secs.max(f32::EPSILON), elapsed: 0.0 }
    }

    pub fn interval(&self) -> f32 {
        self.interval
    }

    /// Advances by `dt` seconds; true when a tick boundary was crossed. Several boundaries
    /// crossed at once still produce a single tick.
    pub fn advance(&mut self, dt: f32) -> bool {
        if !dt.is_finite() || dt <= 0.0 {
            return false;
        }
        self.elapsed += dt;
        if self.elapsed >= self.interval {
            self.elapsed %= self.interval;
            true
        } else {
            false
        }
    }
}

impl Default for TickTimer {
    fn default() -> Self {
        Self::new(0.1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repeated_marks_collapse_into_one_pass() {
        let skeleton = SkeletonId::new();
        let mut queue = DirtyQueue::new();
        assert_eq!(queue.mark_dirty(skeleton), MarkOutcome::Queued);
        for _ in 0..9 {
            assert_eq!(queue.mark_dirty(skeleton), MarkOutcome::Coalesced);
        }
        let mut passes = 0;
        let stats = queue.flush(|id, _| {
            assert_eq!(id, skeleton);
            passes += 1;
        });
        assert_eq!(passes, 1);
        assert_eq!(stats.passes, 1);
        assert!(queue.is_empty());
        assert!(!queue.flush_scheduled());
    }

    #[test]
    fn flush_without_marks_does_nothing() {
        let mut queue = DirtyQueue::new();
        let stats = queue.flush(|_, _| panic!("no pass expected"));
        assert_eq!(stats, FlushStats::default());
    }

    #[test]
    fn marks_from_inside_a_pass_are_suppressed_for_that_skeleton() {
        let a = SkeletonId::new();
        let b = SkeletonId::new();
        let mut queue = DirtyQueue::new();
        queue.mark_dirty(a);
        let stats = queue.flush(|id, queue| {
            assert!(queue.is_in_flight(id));
            assert!(queue.is_dirty(id), "entry stays queued while its pass runs");
            assert_eq!(queue.mark_dirty(a), MarkOutcome::Suppressed);
            assert_eq!(queue.mark_dirty(b), MarkOutcome::Queued);
        });
        assert_eq!(stats, FlushStats { passes: 1, deferred: 1 });
        assert_eq!(queue.pending(), &[b]);
        assert!(queue.flush_scheduled());
        assert_eq!(queue.suppressed_marks(), 1);
    }

    #[test]
    fn passes_follow_marking_order() {
        let ids: Vec<SkeletonId> = (0..4).map(|_| SkeletonId::new()).collect();
        let mut queue = DirtyQueue::new();
        for id in ids.iter().rev() {
            queue.mark_dirty(*id);
        }
        queue.mark_dirty(ids[3]);
        let mut seen = Vec::new();
        queue.flush(|id, _| seen.push(id));
        let expected: Vec<SkeletonId> = ids.iter().rev().copied().collect();
        assert_eq!(seen, expected);
    }

    #[test]
    fn timer_ticks_once_per_interval() {
        let mut timer = TickTimer::new(0.1);
        assert!(!timer.advance(0.05));
        assert!(timer.advance(0.06));
        assert!(!timer.advance(0.0));
        assert!(timer.advance(0.35), "several intervals still yield one tick");
        assert!(!timer.advance(f32::NAN));
    }
}
