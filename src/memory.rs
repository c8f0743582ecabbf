//! In-process [`SkeletonHost`] used by the `rig_tool` binary and by tests.
//!
//! It models just enough of a content-creation host to exercise the engine: skeletons with
//! ordered bones, proxy objects filed in per-skeleton containers, a shared selection, and a
//! notification outbox fed by the user-side mutators below.

use crate::error::{RigError, RigResult};
use crate::geometry::BonePose;
use crate::host::{
    BoneId, ConstraintBodies, ContainerKind, HostMode, Notification, ObjectRef, ParentBinding, ProxyDisplay,
    ProxyHandle, ProxyKind, ProxySpec, Selection, SkeletonHost, SkeletonId, SkeletonSettings,
};
use crate::model::{BodyType, BoneRigidBodyData, CollisionShape, ConstraintParams, Euler, RigidBodyParams};
use anyhow::{Context, Result};
use glam::Vec3;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fs;
use std::mem;
use std::path::Path;

#[derive(Debug, Clone)]
pub struct MemoryBone {
    pub skeleton: SkeletonId,
    pub name: String,
    pub pose: BonePose,
    pub parent: Option<BoneId>,
    pub use_connect: bool,
    pub hidden: bool,
    pub pose_driver: Option<ProxyHandle>,
    pub data: BoneRigidBodyData,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MemoryBody {
    pub body_type: BodyType,
    pub kinematic: bool,
    pub params: RigidBodyParams,
    pub shape: CollisionShape,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MemoryProxy {
    pub skeleton: SkeletonId,
    pub name: String,
    pub kind: ProxyKind,
    pub parent: ParentBinding,
    pub container: ContainerKind,
    pub location: Vec3,
    pub rotation: Euler,
    pub dimensions: Option<Vec3>,
    pub display: Option<ProxyDisplay>,
    pub body: Option<MemoryBody>,
    pub fixed_joint: bool,
    pub joint: Option<(ConstraintParams, ConstraintBodies)>,
}

impl MemoryProxy {
    pub fn is_hitbox(&self) -> bool {
        matches!(self.kind, ProxyKind::Hitbox { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryContainer {
    pub name: String,
    pub members: BTreeSet<ProxyHandle>,
    pub hidden: bool,
}

#[derive(Debug, Clone)]
struct MemorySkeleton {
    id: SkeletonId,
    name: String,
    settings: SkeletonSettings,
    mode: HostMode,
    bones: Vec<BoneId>,
    root_selectable: bool,
}

#[derive(Debug, Default)]
pub struct MemoryHost {
    skeletons: Vec<MemorySkeleton>,
    bones: BTreeMap<BoneId, MemoryBone>,
    proxies: BTreeMap<ProxyHandle, MemoryProxy>,
    containers: BTreeMap<(SkeletonId, ContainerKind), MemoryContainer>,
    selection: Selection,
    outbox: Vec<Notification>,
    next_bone: u64,
    next_proxy: u64,
}

impl MemoryHost {
    pub fn new() -> Self {
        Self::default()
    }

    fn skeleton(&self, id: SkeletonId) -> Option<&MemorySkeleton> {
        self.skeletons.iter().find(|skeleton| skeleton.id == id)
    }

    fn skeleton_mut(&mut self, id: SkeletonId) -> RigResult<&mut MemorySkeleton> {
        self.skeletons.iter_mut().find(|skeleton| skeleton.id == id).ok_or(RigError::UnknownSkeleton(id))
    }

    pub fn add_skeleton(&mut self, name: impl Into<String>) -> SkeletonId {
        let id = SkeletonId::new();
        self.skeletons.push(MemorySkeleton {
            id,
            name: name.into(),
            settings: SkeletonSettings::default(),
            mode: HostMode::Object,
            bones: Vec::new(),
            root_selectable: false,
        });
        id
    }

    pub fn skeleton_name(&self, id: SkeletonId) -> Option<&str> {
        self.skeleton(id).map(|skeleton| skeleton.name.as_str())
    }

    pub fn skeleton_by_name(&self, name: &str) -> Option<SkeletonId> {
        self.skeletons.iter().find(|skeleton| skeleton.name == name).map(|skeleton| skeleton.id)
    }

    pub fn add_bone(
        &mut self,
        skeleton: SkeletonId,
        name: impl Into<String>,
        pose: BonePose,
        parent: Option<BoneId>,
        use_connect: bool,
    ) -> RigResult<BoneId> {
        if let Some(parent) = parent {
            if !self.bones.contains_key(&parent) {
                return Err(RigError::UnknownBone(parent));
            }
        }
        self.next_bone += 1;
        let id = BoneId(self.next_bone);
        self.skeleton_mut(skeleton)?.bones.push(id);
        self.bones.insert(
            id,
            MemoryBone {
                skeleton,
                name: name.into(),
                pose,
                parent,
                use_connect,
                hidden: false,
                pose_driver: None,
                data: BoneRigidBodyData::default(),
            },
        );
        Ok(id)
    }

    /// Edits a bone record the way a user would, queueing the matching notification.
    pub fn edit_bone_data(
        &mut self,
        bone: BoneId,
        property: &'static str,
        edit: impl FnOnce(&mut BoneRigidBodyData),
    ) -> RigResult<()> {
        let entry = self.bones.get_mut(&bone).ok_or(RigError::UnknownBone(bone))?;
        edit(&mut entry.data);
        let skeleton = entry.skeleton;
        self.outbox.push(Notification::bone(skeleton, bone, property));
        Ok(())
    }

    /// Changes skeleton settings, queueing one notification per changed field.
    pub fn set_settings(&mut self, skeleton: SkeletonId, settings: SkeletonSettings) -> RigResult<()> {
        let entry = self.skeleton_mut(skeleton)?;
        let previous = mem::replace(&mut entry.settings, settings);
        let changes = [
            ("enabled", previous.enabled != settings.enabled),
            ("hide_hitboxes", previous.hide_hitboxes != settings.hide_hitboxes),
            ("hide_active_bones", previous.hide_active_bones != settings.hide_active_bones),
        ];
        for (property, changed) in changes {
            if changed {
                self.outbox.push(Notification::skeleton(skeleton, property));
            }
        }
        Ok(())
    }

    pub fn set_mode(&mut self, skeleton: SkeletonId, mode: HostMode) -> RigResult<()> {
        let entry = self.skeleton_mut(skeleton)?;
        if entry.mode != mode {
            entry.mode = mode;
            self.outbox.push(Notification::ModeChanged { skeleton });
        }
        Ok(())
    }

    pub fn set_bone_pose(&mut self, bone: BoneId, pose: BonePose) -> RigResult<()> {
        self.bones.get_mut(&bone).ok_or(RigError::UnknownBone(bone))?.pose = pose;
        Ok(())
    }

    pub fn rename_bone(&mut self, bone: BoneId, name: impl Into<String>) -> RigResult<()> {
        self.bones.get_mut(&bone).ok_or(RigError::UnknownBone(bone))?.name = name.into();
        Ok(())
    }

    pub fn push_notification(&mut self, notification: Notification) {
        self.outbox.push(notification);
    }

    pub fn pending_notifications(&self) -> usize {
        self.outbox.len()
    }

    pub fn bone(&self, bone: BoneId) -> Option<&MemoryBone> {
        self.bones.get(&bone)
    }

    pub fn bone_by_name(&self, skeleton: SkeletonId, name: &str) -> Option<BoneId> {
        self.skeleton(skeleton)?
            .bones
            .iter()
            .copied()
            .find(|bone| self.bones.get(bone).is_some_and(|entry| entry.name == name))
    }

    pub fn proxy(&self, handle: ProxyHandle) -> Option<&MemoryProxy> {
        self.proxies.get(&handle)
    }

    pub fn proxies_of(&self, skeleton: SkeletonId) -> impl Iterator<Item = (ProxyHandle, &MemoryProxy)> {
        self.proxies
            .iter()
            .filter(move |(_, proxy)| proxy.skeleton == skeleton)
            .map(|(handle, proxy)| (*handle, proxy))
    }

    pub fn hitbox_count(&self, skeleton: SkeletonId) -> usize {
        self.proxies_of(skeleton).filter(|(_, proxy)| proxy.is_hitbox()).count()
    }

    pub fn constraint_count(&self, skeleton: SkeletonId) -> usize {
        self.proxies_of(skeleton).filter(|(_, proxy)| !proxy.is_hitbox()).count()
    }

    pub fn container(&self, skeleton: SkeletonId, kind: ContainerKind) -> Option<&MemoryContainer> {
        self.containers.get(&(skeleton, kind))
    }

    pub fn from_rig(rig: &RigDescription) -> RigResult<Self> {
        let mut host = MemoryHost::new();
        for skeleton in &rig.skeletons {
            let id = host.add_skeleton(&skeleton.name);
            let mut ids: HashMap<&str, BoneId> = HashMap::new();
            for bone in &skeleton.bones {
                let pose = BonePose::from_head_tail(bone.head, bone.tail, bone.roll);
                let bone_id = host.add_bone(id, &bone.name, pose, None, bone.use_connect)?;
                if let Some(entry) = host.bones.get_mut(&bone_id) {
                    entry.data = bone.physics.clone();
                }
                ids.insert(bone.name.as_str(), bone_id);
            }
            for bone in &skeleton.bones {
                let Some(parent) = bone.parent.as_deref() else {
                    continue;
                };
                let parent = *ids.get(parent).ok_or_else(|| {
                    let message = format!("bone \"{}\" names unknown parent \"{parent}\"", bone.name);
                    RigError::host("from_rig", message)
                })?;
                if let Some(entry) = ids.get(bone.name.as_str()).and_then(|child| host.bones.get_mut(child)) {
                    entry.parent = Some(parent);
                }
            }
            let entry = host.skeleton_mut(id)?;
            entry.settings = skeleton.settings;
            entry.mode = skeleton.mode;
        }
        Ok(host)
    }

    fn require_selected(&self, operation: &'static str, handle: ProxyHandle) -> RigResult<()> {
        let proxy = self.proxies.get(&handle).ok_or(RigError::UnknownProxy(handle))?;
        let object = ObjectRef::Proxy(handle);
        if self.selection.active != Some(object) || self.selection.selected != [object] {
            return Err(RigError::host(operation, format!("{handle} is not the only selected object")));
        }
        let selectable = self.skeleton(proxy.skeleton).is_some_and(|skeleton| skeleton.root_selectable);
        if !selectable {
            return Err(RigError::host(operation, "root container is not selectable"));
        }
        Ok(())
    }
}

impl SkeletonHost for MemoryHost {
    fn skeletons(&self) -> Vec<SkeletonId> {
        self.skeletons.iter().map(|skeleton| skeleton.id).collect()
    }

    fn skeleton_settings(&self, skeleton: SkeletonId) -> Option<SkeletonSettings> {
        self.skeleton(skeleton).map(|skeleton| skeleton.settings)
    }

    fn host_mode(&self, skeleton: SkeletonId) -> Option<HostMode> {
        self.skeleton(skeleton).map(|skeleton| skeleton.mode)
    }

    fn bones(&self, skeleton: SkeletonId) -> Vec<BoneId> {
        self.skeleton(skeleton).map(|skeleton| skeleton.bones.clone()).unwrap_or_default()
    }

    fn bone_name(&self, bone: BoneId) -> Option<&str> {
        self.bones.get(&bone).map(|entry| entry.name.as_str())
    }

    fn bone_pose(&self, bone: BoneId) -> Option<BonePose> {
        self.bones.get(&bone).map(|entry| entry.pose)
    }

    fn bone_parent(&self, bone: BoneId) -> Option<BoneId> {
        self.bones.get(&bone).and_then(|entry| entry.parent)
    }

    fn bone_use_connect(&self, bone: BoneId) -> bool {
        self.bones.get(&bone).is_some_and(|entry| entry.use_connect)
    }

    fn bone_data(&self, bone: BoneId) -> Option<&BoneRigidBodyData> {
        self.bones.get(&bone).map(|entry| &entry.data)
    }

    fn bone_data_mut(&mut self, bone: BoneId) -> Option<&mut BoneRigidBodyData> {
        self.bones.get_mut(&bone).map(|entry| &mut entry.data)
    }

    fn set_bone_parent(&mut self, bone: BoneId, parent: Option<BoneId>, use_connect: bool) {
        let Some(entry) = self.bones.get_mut(&bone) else {
            return;
        };
        if entry.parent == parent && entry.use_connect == use_connect {
            return;
        }
        entry.parent = parent;
        entry.use_connect = use_connect;
        let skeleton = entry.skeleton;
        self.outbox.push(Notification::bone(skeleton, bone, "parent"));
    }

    fn set_bone_hidden(&mut self, bone: BoneId, hidden: bool) {
        if let Some(entry) = self.bones.get_mut(&bone) {
            entry.hidden = hidden;
        }
    }

    fn bind_pose_driver(&mut self, bone: BoneId, target: Option<ProxyHandle>) {
        if let Some(entry) = self.bones.get_mut(&bone) {
            entry.pose_driver = target;
        }
    }

    fn create_proxy_object(&mut self, skeleton: SkeletonId, spec: &ProxySpec) -> RigResult<ProxyHandle> {
        if self.skeleton(skeleton).is_none() {
            return Err(RigError::UnknownSkeleton(skeleton));
        }
        if let ParentBinding::Bone(bone) = spec.parent {
            if !self.bones.contains_key(&bone) {
                return Err(RigError::UnknownBone(bone));
            }
        }
        self.next_proxy += 1;
        let handle = ProxyHandle(self.next_proxy);
        let dimensions = match spec.kind {
            ProxyKind::Hitbox { dimensions, .. } => Some(dimensions),
            ProxyKind::ConstraintAnchor => None,
        };
        self.proxies.insert(
            handle,
            MemoryProxy {
                skeleton,
                name: spec.name.clone(),
                kind: spec.kind,
                parent: spec.parent,
                container: spec.container,
                location: spec.location,
                rotation: spec.rotation,
                dimensions,
                display: None,
                body: None,
                fixed_joint: false,
                joint: None,
            },
        );
        self.containers
            .entry((skeleton, spec.container))
            .or_insert_with(|| MemoryContainer {
                name: spec.container_name.clone(),
                members: BTreeSet::new(),
                hidden: false,
            })
            .members
            .insert(handle);
        Ok(handle)
    }

    fn proxy_exists(&self, handle: ProxyHandle) -> bool {
        self.proxies.contains_key(&handle)
    }

    fn update_proxy_geometry(&mut self, handle: ProxyHandle, dimensions: Vec3) {
        if let Some(proxy) = self.proxies.get_mut(&handle) {
            proxy.dimensions = Some(dimensions);
            if let ProxyKind::Hitbox { dimensions: current, .. } = &mut proxy.kind {
                *current = dimensions;
            }
        }
    }

    fn set_proxy_placement(&mut self, handle: ProxyHandle, location: Vec3, rotation: Euler) {
        if let Some(proxy) = self.proxies.get_mut(&handle) {
            proxy.location = location;
            proxy.rotation = rotation;
        }
    }

    fn set_proxy_display(&mut self, handle: ProxyHandle, display: ProxyDisplay) {
        if let Some(proxy) = self.proxies.get_mut(&handle) {
            proxy.display = Some(display);
        }
    }

    fn destroy_object(&mut self, handle: ProxyHandle) {
        let Some(proxy) = self.proxies.remove(&handle) else {
            return;
        };
        if let Some(container) = self.containers.get_mut(&(proxy.skeleton, proxy.container)) {
            container.members.remove(&handle);
        }
        let object = ObjectRef::Proxy(handle);
        self.selection.selected.retain(|selected| *selected != object);
        if self.selection.active == Some(object) {
            self.selection.active = None;
        }
    }

    fn add_rigid_body(&mut self, handle: ProxyHandle, body_type: BodyType, kinematic: bool) -> RigResult<()> {
        self.require_selected("add_rigid_body", handle)?;
        if let Some(proxy) = self.proxies.get_mut(&handle) {
            proxy.body = Some(MemoryBody {
                body_type,
                kinematic,
                params: RigidBodyParams::default(),
                shape: CollisionShape::default(),
            });
        }
        Ok(())
    }

    fn add_fixed_constraint(&mut self, handle: ProxyHandle) -> RigResult<()> {
        self.require_selected("add_fixed_constraint", handle)?;
        if let Some(proxy) = self.proxies.get_mut(&handle) {
            proxy.fixed_joint = true;
        }
        Ok(())
    }

    fn set_collision_shape(&mut self, handle: ProxyHandle, shape: CollisionShape) {
        if let Some(body) = self.proxies.get_mut(&handle).and_then(|proxy| proxy.body.as_mut()) {
            body.shape = shape;
        }
    }

    fn apply_rigid_body(&mut self, handle: ProxyHandle, params: &RigidBodyParams) {
        if let Some(body) = self.proxies.get_mut(&handle).and_then(|proxy| proxy.body.as_mut()) {
            body.params = *params;
        }
    }

    fn apply_constraint(&mut self, handle: ProxyHandle, params: &ConstraintParams, bodies: ConstraintBodies) {
        if let Some(proxy) = self.proxies.get_mut(&handle) {
            proxy.joint = Some((*params, bodies));
        }
    }

    fn container_len(&self, skeleton: SkeletonId, kind: ContainerKind) -> Option<usize> {
        self.containers.get(&(skeleton, kind)).map(|container| container.members.len())
    }

    fn remove_container(&mut self, skeleton: SkeletonId, kind: ContainerKind) {
        if let Some(container) = self.containers.remove(&(skeleton, kind)) {
            for handle in container.members {
                self.destroy_object(handle);
            }
        }
    }

    fn set_container_hidden(&mut self, skeleton: SkeletonId, kind: ContainerKind, hidden: bool) {
        if let Some(container) = self.containers.get_mut(&(skeleton, kind)) {
            container.hidden = hidden;
        }
    }

    fn root_selectable(&self, skeleton: SkeletonId) -> bool {
        self.skeleton(skeleton).is_some_and(|skeleton| skeleton.root_selectable)
    }

    fn set_root_selectable(&mut self, skeleton: SkeletonId, selectable: bool) {
        if let Ok(entry) = self.skeleton_mut(skeleton) {
            entry.root_selectable = selectable;
        }
    }

    fn selection(&self) -> Selection {
        self.selection.clone()
    }

    fn set_selection(&mut self, selection: Selection) {
        self.selection = selection;
    }

    fn drain_notifications(&mut self) -> Vec<Notification> {
        mem::take(&mut self.outbox)
    }
}

/// Serialized description of one or more skeletons, used to seed a [`MemoryHost`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RigDescription {
    pub skeletons: Vec<SkeletonDescription>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkeletonDescription {
    pub name: String,
    #[serde(default)]
    pub settings: SkeletonSettings,
    #[serde(default)]
    pub mode: HostMode,
    #[serde(default)]
    pub bones: Vec<BoneDescription>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoneDescription {
    pub name: String,
    pub head: Vec3,
    pub tail: Vec3,
    #[serde(default)]
    pub roll: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
    #[serde(default)]
    pub use_connect: bool,
    #[serde(default)]
    pub physics: BoneRigidBodyData,
}

impl RigDescription {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes = fs::read(path).with_context(|| format!("Failed to read rig file {}", path.display()))?;
        let rig = serde_json::from_slice(&bytes)
            .with_context(|| format!("Failed to parse rig file {}", path.display()))?;
        Ok(rig)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pose() -> BonePose {
        BonePose::from_head_tail(Vec3::ZERO, Vec3::Z, 0.0)
    }

    #[test]
    fn rigid_body_registration_requires_selection() {
        let mut host = MemoryHost::new();
        let skeleton = host.add_skeleton("Armature");
        let spec = ProxySpec {
            name: "Bone [Hitbox]".into(),
            kind: ProxyKind::Hitbox { body_type: BodyType::Active, dimensions: Vec3::ONE },
            parent: ParentBinding::Armature(skeleton),
            container: ContainerKind::Actives,
            container_name: "Actives".into(),
            location: Vec3::ZERO,
            rotation: Euler::IDENTITY,
        };
        let handle = host.create_proxy_object(skeleton, &spec).expect("create proxy");
        assert!(matches!(host.add_rigid_body(handle, BodyType::Active, false), Err(RigError::Host { .. })));

        host.set_selection(Selection::single(ObjectRef::Proxy(handle)));
        host.set_root_selectable(skeleton, true);
        host.add_rigid_body(handle, BodyType::Active, false).expect("selected proxy accepts a body");
        assert_eq!(host.container_len(skeleton, ContainerKind::Actives), Some(1));
    }

    #[test]
    fn parent_changes_queue_a_notification() {
        let mut host = MemoryHost::new();
        let skeleton = host.add_skeleton("Armature");
        let root = host.add_bone(skeleton, "Root", pose(), None, false).expect("root");
        let child = host.add_bone(skeleton, "Child", pose(), Some(root), true).expect("child");
        host.set_bone_parent(child, Some(root), true);
        assert_eq!(host.pending_notifications(), 0, "unchanged parent is silent");
        host.set_bone_parent(child, None, false);
        assert_eq!(host.drain_notifications(), vec![Notification::bone(skeleton, child, "parent")]);
    }

    #[test]
    fn rig_description_resolves_parents_by_name() {
        let json = r#"{
            "skeletons": [{
                "name": "Armature",
                "settings": { "enabled": true },
                "mode": "POSE",
                "bones": [
                    { "name": "Arm", "head": [0, 0, 1], "tail": [0, 0, 2], "parent": "Spine",
                      "physics": { "enabled": true } },
                    { "name": "Spine", "head": [0, 0, 0], "tail": [0, 0, 1] }
                ]
            }]
        }"#;
        let rig: RigDescription = serde_json::from_str(json).expect("parse rig");
        let host = MemoryHost::from_rig(&rig).expect("build host");
        let skeleton = host.skeleton_by_name("Armature").expect("skeleton");
        let arm = host.bone_by_name(skeleton, "Arm").expect("arm");
        let spine = host.bone_by_name(skeleton, "Spine").expect("spine");
        assert_eq!(host.bone_parent(arm), Some(spine));
        assert!(host.bone_data(arm).expect("arm data").enabled);
        assert_eq!(host.host_mode(skeleton), Some(HostMode::Pose));
    }
}
