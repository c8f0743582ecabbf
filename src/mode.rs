use crate::host::{HostMode, SkeletonId};
use crate::scheduler::DirtyQueue;
use serde::Serialize;
use std::collections::HashMap;

/// Two-state view of the host's interaction mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum SimpleMode {
    Edit,
    Pose,
}

impl SimpleMode {
    pub fn simplify(raw: HostMode) -> Self {
        match raw {
            HostMode::Edit => SimpleMode::Edit,
            _ => SimpleMode::Pose,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            SimpleMode::Edit => "edit",
            SimpleMode::Pose => "pose",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModeObservation {
    /// First time this skeleton was seen.
    Initial(SimpleMode),
    Unchanged(SimpleMode),
    Transition { from: SimpleMode, to: SimpleMode },
}

impl ModeObservation {
    pub fn current(self) -> SimpleMode {
        match self {
            ModeObservation::Initial(mode) | ModeObservation::Unchanged(mode) => mode,
            ModeObservation::Transition { to, .. } => to,
        }
    }
}

#[derive(Debug, Default)]
pub struct ModeTracker {
    modes: HashMap<SkeletonId, SimpleMode>,
}

impl ModeTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn observe(&mut self, skeleton: SkeletonId, raw: HostMode) -> ModeObservation {
        let next = SimpleMode::simplify(raw);
        match self.modes.insert(skeleton, next) {
            None => ModeObservation::Initial(next),
            Some(previous) if previous == next => ModeObservation::Unchanged(next),
            Some(previous) => ModeObservation::Transition { from: previous, to: next },
        }
    }

    /// Observes and marks the skeleton dirty on a real transition. Returns whether it marked.
    pub fn observe_and_mark(&mut self, skeleton: SkeletonId, raw: HostMode, queue: &mut DirtyQueue) -> bool {
        match self.observe(skeleton, raw) {
            ModeObservation::Transition { from, to } => {
                tracing::debug!(%skeleton, from = from.label(), to = to.label(), "mode transition");
                queue.mark_dirty(skeleton);
                true
            }
            _ => false,
        }
    }

    pub fn current(&self, skeleton: SkeletonId) -> Option<SimpleMode> {
        self.modes.get(&skeleton).copied()
    }

    /// Tracked mode, initialising from `raw` when the skeleton is new.
    pub fn current_or_observe(&mut self, skeleton: SkeletonId, raw: HostMode) -> SimpleMode {
        *self.modes.entry(skeleton).or_insert_with(|| SimpleMode::simplify(raw))
    }

    pub fn forget(&mut self, skeleton: SkeletonId) {
        self.modes.remove(&skeleton);
    }

    pub fn reset(&mut self) {
        self.modes.clear();
    }

    pub fn len(&self) -> usize {
        self.modes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_edit_maps_to_edit() {
        assert_eq!(SimpleMode::simplify(HostMode::Edit), SimpleMode::Edit);
        for raw in [HostMode::Object, HostMode::Pose, HostMode::WeightPaint, HostMode::Sculpt] {
            assert_eq!(SimpleMode::simplify(raw), SimpleMode::Pose);
        }
    }

    #[test]
    fn first_observation_initialises_without_marking() {
        let skeleton = SkeletonId::new();
        let mut tracker = ModeTracker::new();
        let mut queue = DirtyQueue::new();
        assert!(!tracker.observe_and_mark(skeleton, HostMode::Pose, &mut queue));
        assert!(queue.is_empty());
        assert_eq!(tracker.current(skeleton), Some(SimpleMode::Pose));
    }

    #[test]
    fn object_to_pose_is_not_a_transition() {
        let skeleton = SkeletonId::new();
        let mut tracker = ModeTracker::new();
        tracker.observe(skeleton, HostMode::Object);
        assert_eq!(tracker.observe(skeleton, HostMode::Pose), ModeObservation::Unchanged(SimpleMode::Pose));
    }

    #[test]
    fn edit_round_trip_marks_twice() {
        let skeleton = SkeletonId::new();
        let mut tracker = ModeTracker::new();
        let mut queue = DirtyQueue::new();
        tracker.observe(skeleton, HostMode::Pose);
        assert!(tracker.observe_and_mark(skeleton, HostMode::Edit, &mut queue));
        queue.flush(|_, _| {});
        assert!(!tracker.observe_and_mark(skeleton, HostMode::Edit, &mut queue));
        assert!(queue.is_empty());
        assert!(tracker.observe_and_mark(skeleton, HostMode::Object, &mut queue));
        assert_eq!(queue.pending(), &[skeleton]);
    }

    #[test]
    fn reset_forgets_everything() {
        let mut tracker = ModeTracker::new();
        tracker.observe(SkeletonId::new(), HostMode::Edit);
        tracker.observe(SkeletonId::new(), HostMode::Pose);
        assert_eq!(tracker.len(), 2);
        tracker.reset();
        assert!(tracker.is_empty());
    }
}
