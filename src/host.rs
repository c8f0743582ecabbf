//! Capability interface onto the host scene graph.
//!
//! The reconciliation engine never owns bones or objects. Everything it reads or writes goes
//! through [`SkeletonHost`], which keeps the engine independent of any particular
//! content-creation application. [`crate::memory::MemoryHost`] is the in-process implementation.

use crate::error::RigResult;
use crate::geometry::BonePose;
use crate::model::{BodyType, BoneRigidBodyData, CollisionShape, ConstraintParams, Euler, RigidBodyParams};
use glam::Vec3;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fmt;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SkeletonId(Uuid);

impl SkeletonId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(id: Uuid) -> Self {
        Self(id)
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for SkeletonId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SkeletonId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BoneId(pub u64);

impl fmt::Display for BoneId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "bone#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ProxyHandle(pub u64);

impl fmt::Display for ProxyHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "proxy#{}", self.0)
    }
}

/// Raw interaction mode reported by the host for a skeleton object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HostMode {
    #[default]
    Object,
    Edit,
    Pose,
    WeightPaint,
    Sculpt,
}

/// Rig-level settings stored on the skeleton.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SkeletonSettings {
    pub enabled: bool,
    pub hide_hitboxes: bool,
    pub hide_active_bones: bool,
}

/// Generated groupings a skeleton's proxies are filed under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ContainerKind {
    Actives,
    Passives,
    Constraints,
}

impl ContainerKind {
    pub const ALL: [ContainerKind; 3] =
        [ContainerKind::Actives, ContainerKind::Passives, ContainerKind::Constraints];

    pub fn for_body(body_type: BodyType) -> Self {
        match body_type {
            BodyType::Active => ContainerKind::Actives,
            BodyType::Passive => ContainerKind::Passives,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ParentBinding {
    /// Parented to the skeleton object; placement is in armature space.
    Armature(SkeletonId),
    /// Parented to a bone; placement is tail-relative in bone-local axes.
    Bone(BoneId),
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub enum ProxyKind {
    Hitbox { body_type: BodyType, dimensions: Vec3 },
    ConstraintAnchor,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProxySpec {
    pub name: String,
    pub kind: ProxyKind,
    pub parent: ParentBinding,
    pub container: ContainerKind,
    /// Name for the container if the host has to create it.
    pub container_name: String,
    pub location: Vec3,
    pub rotation: Euler,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ProxyDisplay {
    Bounds(CollisionShape),
    Wire,
}

impl ProxyDisplay {
    pub fn for_shape(shape: CollisionShape) -> Self {
        if shape.shows_bounds() {
            ProxyDisplay::Bounds(shape)
        } else {
            ProxyDisplay::Wire
        }
    }
}

/// The two bodies a fixed joint connects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct ConstraintBodies {
    pub object1: Option<ProxyHandle>,
    pub object2: Option<ProxyHandle>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ObjectRef {
    Skeleton(SkeletonId),
    Proxy(ProxyHandle),
}

/// Selection shared with the interactive user session.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Selection {
    pub selected: Vec<ObjectRef>,
    pub active: Option<ObjectRef>,
}

impl Selection {
    pub fn single(object: ObjectRef) -> Self {
        Self { selected: vec![object], active: Some(object) }
    }

    pub fn contains(&self, object: ObjectRef) -> bool {
        self.selected.contains(&object)
    }
}

/// A property of a bone (or, with `bone == None`, of the whole skeleton) changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyChange {
    pub skeleton: SkeletonId,
    pub bone: Option<BoneId>,
    pub property: Cow<'static, str>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    Property(PropertyChange),
    ModeChanged { skeleton: SkeletonId },
    FileLoaded,
    UndoRedo,
}

impl Notification {
    pub fn bone(skeleton: SkeletonId, bone: BoneId, property: impl Into<Cow<'static, str>>) -> Self {
        Notification::Property(PropertyChange { skeleton, bone: Some(bone), property: property.into() })
    }

    pub fn skeleton(skeleton: SkeletonId, property: impl Into<Cow<'static, str>>) -> Self {
        Notification::Property(PropertyChange { skeleton, bone: None, property: property.into() })
    }
}

pub trait SkeletonHost {
    fn skeletons(&self) -> Vec<SkeletonId>;
    fn skeleton_settings(&self, skeleton: SkeletonId) -> Option<SkeletonSettings>;
    fn host_mode(&self, skeleton: SkeletonId) -> Option<HostMode>;
    fn bones(&self, skeleton: SkeletonId) -> Vec<BoneId>;

    fn bone_name(&self, bone: BoneId) -> Option<&str>;
    fn bone_pose(&self, bone: BoneId) -> Option<BonePose>;
    fn bone_parent(&self, bone: BoneId) -> Option<BoneId>;
    fn bone_use_connect(&self, bone: BoneId) -> bool;
    fn bone_data(&self, bone: BoneId) -> Option<&BoneRigidBodyData>;
    fn bone_data_mut(&mut self, bone: BoneId) -> Option<&mut BoneRigidBodyData>;

    fn set_bone_parent(&mut self, bone: BoneId, parent: Option<BoneId>, use_connect: bool);
    fn set_bone_hidden(&mut self, bone: BoneId, hidden: bool);
    /// Makes the bone follow `target`'s simulated transform, or releases it.
    fn bind_pose_driver(&mut self, bone: BoneId, target: Option<ProxyHandle>);

    fn create_proxy_object(&mut self, skeleton: SkeletonId, spec: &ProxySpec) -> RigResult<ProxyHandle>;
    fn proxy_exists(&self, handle: ProxyHandle) -> bool;
    fn update_proxy_geometry(&mut self, handle: ProxyHandle, dimensions: Vec3);
    fn set_proxy_placement(&mut self, handle: ProxyHandle, location: Vec3, rotation: Euler);
    fn set_proxy_display(&mut self, handle: ProxyHandle, display: ProxyDisplay);
    fn destroy_object(&mut self, handle: ProxyHandle);

    /// Registers a rigid body on `handle`. Hosts may require the proxy to be the selected
    /// object and its root container to be selectable.
    fn add_rigid_body(&mut self, handle: ProxyHandle, body_type: BodyType, kinematic: bool) -> RigResult<()>;
    /// Registers a fixed joint on `handle`; same selection requirements as `add_rigid_body`.
    fn add_fixed_constraint(&mut self, handle: ProxyHandle) -> RigResult<()>;
    fn set_collision_shape(&mut self, handle: ProxyHandle, shape: CollisionShape);
    fn apply_rigid_body(&mut self, handle: ProxyHandle, params: &RigidBodyParams);
    fn apply_constraint(&mut self, handle: ProxyHandle, params: &ConstraintParams, bodies: ConstraintBodies);

    /// Number of objects in the container, `None` when it does not exist.
    fn container_len(&self, skeleton: SkeletonId, kind: ContainerKind) -> Option<usize>;
    fn remove_container(&mut self, skeleton: SkeletonId, kind: ContainerKind);
    fn set_container_hidden(&mut self, skeleton: SkeletonId, kind: ContainerKind, hidden: bool);
    fn root_selectable(&self, skeleton: SkeletonId) -> bool;
    fn set_root_selectable(&mut self, skeleton: SkeletonId, selectable: bool);

    fn selection(&self) -> Selection;
    fn set_selection(&mut self, selection: Selection);

    /// Takes every notification queued since the last call.
    fn drain_notifications(&mut self) -> Vec<Notification>;
}
