//! Error types for rig reconciliation.

use crate::host::{BoneId, ProxyHandle, SkeletonId};
use thiserror::Error;

/// Result type for rig operations.
pub type RigResult<T> = Result<T, RigError>;

/// Errors raised at component boundaries of the reconciliation engine.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RigError {
    /// The host does not know the skeleton.
    #[error("unknown skeleton {0}")]
    UnknownSkeleton(SkeletonId),

    /// The host does not know the bone.
    #[error("unknown bone {0}")]
    UnknownBone(BoneId),

    /// The host does not know the proxy object.
    #[error("unknown proxy object {0}")]
    UnknownProxy(ProxyHandle),

    /// `store_parent` was called while saved-parent fields were already present.
    #[error("bone \"{bone}\" already has a saved parent")]
    SavedParentAlreadySet {
        /// Name of the offending bone.
        bone: String,
    },

    /// Only one of the two saved-parent fields is present.
    #[error(
        "bone \"{bone}\" has unpaired saved-parent fields \
         (name set: {name_set}, connect set: {connect_set})"
    )]
    UnpairedSavedParent {
        /// Name of the offending bone.
        bone: String,
        /// Whether `saved_parent_name` is present.
        name_set: bool,
        /// Whether `saved_use_connect` is present.
        connect_set: bool,
    },

    /// A required notification has no handler in the registration table.
    #[error("no handler registered for event \"{0}\"")]
    MissingHandler(String),

    /// A skeleton-wide change failed on some bones; the others were still updated.
    #[error("{failed} bone(s) failed to apply \"{property}\", first: {first}")]
    BoneFailures {
        /// Property the notification carried.
        property: String,
        /// Number of bones that failed.
        failed: usize,
        /// The first failure in bone order.
        first: Box<RigError>,
    },

    /// The host refused a structural edit.
    #[error("host rejected {operation}: {reason}")]
    Host {
        /// Operation that was attempted.
        operation: &'static str,
        /// Host-provided reason.
        reason: String,
    },
}

impl RigError {
    pub fn host(operation: &'static str, reason: impl Into<String>) -> Self {
        RigError::Host { operation, reason: reason.into() }
    }
}
