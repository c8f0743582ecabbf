use crate::host::{BoneId, ProxyHandle, SkeletonId};
use crate::mode::SimpleMode;
use crate::model::BodyType;
use std::fmt;

/// Something the reconciliation engine did to the host.
#[derive(Debug, Clone, PartialEq)]
pub enum RigEvent {
    HitboxCreated { skeleton: SkeletonId, bone: BoneId, handle: ProxyHandle, body_type: BodyType },
    HitboxRemoved { skeleton: SkeletonId, bone: BoneId, handle: ProxyHandle },
    ConstraintCreated { skeleton: SkeletonId, bone: BoneId, handle: ProxyHandle },
    ConstraintRemoved { skeleton: SkeletonId, bone: BoneId, handle: ProxyHandle },
    ParentDetached { skeleton: SkeletonId, bone: BoneId, saved_parent: String },
    ParentRestored { skeleton: SkeletonId, bone: BoneId, parent: Option<BoneId> },
    ModeChanged { skeleton: SkeletonId, from: SimpleMode, to: SimpleMode },
    PassCompleted { skeleton: SkeletonId, warnings: usize },
}

impl RigEvent {
    pub fn skeleton(&self) -> SkeletonId {
        match self {
            RigEvent::HitboxCreated { skeleton, .. }
            | RigEvent::HitboxRemoved { skeleton, .. }
            | RigEvent::ConstraintCreated { skeleton, .. }
            | RigEvent::ConstraintRemoved { skeleton, .. }
            | RigEvent::ParentDetached { skeleton, .. }
            | RigEvent::ParentRestored { skeleton, .. }
            | RigEvent::ModeChanged { skeleton, .. }
            | RigEvent::PassCompleted { skeleton, .. } => *skeleton,
        }
    }
}

impl fmt::Display for RigEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RigEvent::HitboxCreated { bone, handle, body_type, .. } => {
                write!(f, "HitboxCreated bone={bone} handle={handle} type={}", body_type.label())
            }
            RigEvent::HitboxRemoved { bone, handle, .. } => {
                write!(f, "HitboxRemoved bone={bone} handle={handle}")
            }
            RigEvent::ConstraintCreated { bone, handle, .. } => {
                write!(f, "ConstraintCreated bone={bone} handle={handle}")
            }
            RigEvent::ConstraintRemoved { bone, handle, .. } => {
                write!(f, "ConstraintRemoved bone={bone} handle={handle}")
            }
            RigEvent::ParentDetached { bone, saved_parent, .. } => {
                write!(f, "ParentDetached bone={bone} saved_parent={saved_parent:?}")
            }
            RigEvent::ParentRestored { bone, parent, .. } => match parent {
                Some(parent) => write!(f, "ParentRestored bone={bone} parent={parent}"),
                None => write!(f, "ParentRestored bone={bone} parent=none"),
            },
            RigEvent::ModeChanged { skeleton, from, to } => {
                write!(f, "ModeChanged skeleton={skeleton} from={} to={}", from.label(), to.label())
            }
            RigEvent::PassCompleted { skeleton, warnings } => {
                write!(f, "PassCompleted skeleton={skeleton} warnings={warnings}")
            }
        }
    }
}

#[derive(Debug, Default)]
pub struct RigEventLog {
    events: Vec<RigEvent>,
}

impl RigEventLog {
    pub fn push(&mut self, event: RigEvent) {
        tracing::trace!(target: "rigid_body_bones::events", "{event}");
        self.events.push(event);
    }

    /// Events pushed after the log held `start` entries.
    pub fn since(&self, start: usize) -> &[RigEvent] {
        self.events.get(start..).unwrap_or(&[])
    }

    pub fn drain(&mut self) -> Vec<RigEvent> {
        self.events.drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}
