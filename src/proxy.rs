//! Creation, in-place update and removal of the proxy objects generated for each bone.
//!
//! A bone owns at most one hitbox and at most one constraint anchor. Updates for a bone
//! without the relevant proxy are no-ops.

use crate::config::NamingConfig;
use crate::error::{RigError, RigResult};
use crate::events::{RigEvent, RigEventLog};
use crate::geometry::{constraint_location, hitbox_placement};
use crate::hierarchy::NameMap;
use crate::host::{
    BoneId, ConstraintBodies, ContainerKind, ObjectRef, ParentBinding, ProxyDisplay, ProxyHandle, ProxyKind,
    ProxySpec, Selection, SkeletonHost, SkeletonId,
};
use crate::model::{BodyType, BoneRigidBodyData, Euler, HitboxRef};
use crate::scope::{SelectableScope, SelectionScope};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RemovedProxies {
    pub hitbox: Option<ProxyHandle>,
    pub constraint: Option<ProxyHandle>,
}

impl RemovedProxies {
    pub fn is_empty(&self) -> bool {
        self.hitbox.is_none() && self.constraint.is_none()
    }
}

fn record<H: SkeletonHost + ?Sized>(host: &H, bone: BoneId) -> RigResult<&BoneRigidBodyData> {
    host.bone_data(bone).ok_or(RigError::UnknownBone(bone))
}

fn record_mut<H: SkeletonHost + ?Sized>(host: &mut H, bone: BoneId) -> RigResult<&mut BoneRigidBodyData> {
    host.bone_data_mut(bone).ok_or(RigError::UnknownBone(bone))
}

/// Runs `f` with `handle` as the only selected object and the skeleton's root container
/// selectable. Both are put back however `f` exits.
fn with_selected<H, T>(
    host: &mut H,
    skeleton: SkeletonId,
    handle: ProxyHandle,
    f: impl FnOnce(&mut H) -> RigResult<T>,
) -> RigResult<T>
where
    H: SkeletonHost + ?Sized,
{
    let mut selection = SelectionScope::enter(host);
    let mut selectable = SelectableScope::enter(&mut *selection, skeleton);
    selectable.set_selection(Selection::single(ObjectRef::Proxy(handle)));
    f(&mut *selectable)
}

/// Builds the hitbox for an enabled bone that has none. Returns whether one was created.
pub fn create_hitbox<H: SkeletonHost + ?Sized>(
    host: &mut H,
    naming: &NamingConfig,
    log: &mut RigEventLog,
    skeleton: SkeletonId,
    bone: BoneId,
) -> RigResult<bool> {
    let label = host.bone_name(bone).ok_or(RigError::UnknownBone(bone))?.to_string();
    let pose = host.bone_pose(bone).ok_or(RigError::UnknownBone(bone))?;
    let data = record(host, bone)?;
    if data.hitbox.is_some() {
        return Ok(false);
    }

    let body_type = data.body_type;
    let shape = data.collision_shape;
    let params = data.rigid_body;
    let placement = hitbox_placement(&pose, data, body_type);
    let container = ContainerKind::for_body(body_type);
    let parent = match body_type {
        BodyType::Active => ParentBinding::Armature(skeleton),
        BodyType::Passive => ParentBinding::Bone(bone),
    };
    let spec = ProxySpec {
        name: naming.hitbox_name(&label),
        kind: ProxyKind::Hitbox { body_type, dimensions: placement.dimensions },
        parent,
        container,
        container_name: naming.container_name(container).to_string(),
        location: placement.location,
        rotation: placement.rotation,
    };

    let handle = host.create_proxy_object(skeleton, &spec)?;
    let kinematic = body_type == BodyType::Passive;
    let registered =
        with_selected(host, skeleton, handle, |host| host.add_rigid_body(handle, body_type, kinematic));
    if let Err(err) = registered {
        host.destroy_object(handle);
        return Err(err);
    }
    host.apply_rigid_body(handle, &params);
    host.set_collision_shape(handle, shape);
    host.set_proxy_display(handle, ProxyDisplay::for_shape(shape));

    record_mut(host, bone)?.hitbox = Some(HitboxRef { handle, body_type });
    log.push(RigEvent::HitboxCreated { skeleton, bone, handle, body_type });
    Ok(true)
}

/// Builds the fixed-joint anchor for a bone that has none. Returns whether one was created.
pub fn ensure_constraint<H: SkeletonHost + ?Sized>(
    host: &mut H,
    naming: &NamingConfig,
    log: &mut RigEventLog,
    skeleton: SkeletonId,
    bone: BoneId,
) -> RigResult<bool> {
    let label = host.bone_name(bone).ok_or(RigError::UnknownBone(bone))?.to_string();
    let pose = host.bone_pose(bone).ok_or(RigError::UnknownBone(bone))?;
    let data = record(host, bone)?;
    if data.constraint.is_some() {
        return Ok(false);
    }

    let spec = ProxySpec {
        name: naming.constraint_name(&label),
        kind: ProxyKind::ConstraintAnchor,
        parent: ParentBinding::Armature(skeleton),
        container: ContainerKind::Constraints,
        container_name: naming.container_name(ContainerKind::Constraints).to_string(),
        location: constraint_location(&pose, data),
        rotation: Euler::IDENTITY,
    };
    let handle = host.create_proxy_object(skeleton, &spec)?;
    if let Err(err) = with_selected(host, skeleton, handle, |host| host.add_fixed_constraint(handle)) {
        host.destroy_object(handle);
        return Err(err);
    }

    record_mut(host, bone)?.constraint = Some(handle);
    log.push(RigEvent::ConstraintCreated { skeleton, bone, handle });
    Ok(true)
}

/// Destroys the bone's hitbox and constraint, clearing both handles.
pub fn remove_proxies<H: SkeletonHost + ?Sized>(
    host: &mut H,
    log: &mut RigEventLog,
    skeleton: SkeletonId,
    bone: BoneId,
) -> RigResult<RemovedProxies> {
    let data = record_mut(host, bone)?;
    let removed = RemovedProxies {
        hitbox: data.hitbox.take().map(|hitbox| hitbox.handle),
        constraint: data.constraint.take(),
    };
    if let Some(handle) = removed.hitbox {
        if host.proxy_exists(handle) {
            host.destroy_object(handle);
        }
        log.push(RigEvent::HitboxRemoved { skeleton, bone, handle });
    }
    if let Some(handle) = removed.constraint {
        if host.proxy_exists(handle) {
            host.destroy_object(handle);
        }
        log.push(RigEvent::ConstraintRemoved { skeleton, bone, handle });
    }
    Ok(removed)
}

/// Destroys and rebuilds the hitbox when it was built for another body type.
pub fn recreate_hitbox<H: SkeletonHost + ?Sized>(
    host: &mut H,
    naming: &NamingConfig,
    log: &mut RigEventLog,
    skeleton: SkeletonId,
    bone: BoneId,
) -> RigResult<bool> {
    let data = record(host, bone)?;
    let stale = matches!(data.hitbox, Some(hitbox) if hitbox.body_type != data.body_type);
    if !stale {
        return Ok(false);
    }
    remove_proxies(host, log, skeleton, bone)?;
    create_hitbox(host, naming, log, skeleton, bone)
}

/// Clears handles whose objects the host no longer has. Returns whether anything was cleared.
pub fn scrub_stale_handles<H: SkeletonHost + ?Sized>(host: &mut H, bone: BoneId) -> RigResult<bool> {
    let data = record(host, bone)?;
    let stale_hitbox = data.hitbox.filter(|hitbox| !host.proxy_exists(hitbox.handle));
    let stale_constraint = data.constraint.filter(|handle| !host.proxy_exists(*handle));
    if stale_hitbox.is_none() && stale_constraint.is_none() {
        return Ok(false);
    }
    let data = record_mut(host, bone)?;
    if stale_hitbox.is_some() {
        data.hitbox = None;
    }
    if stale_constraint.is_some() {
        data.constraint = None;
    }
    tracing::debug!(%bone, "cleared stale proxy handles");
    Ok(true)
}

/// Re-places the hitbox and rebuilds its geometry from the current pose.
pub fn align_hitbox<H: SkeletonHost + ?Sized>(host: &mut H, bone: BoneId) -> RigResult<bool> {
    let pose = host.bone_pose(bone).ok_or(RigError::UnknownBone(bone))?;
    let data = record(host, bone)?;
    let Some(hitbox) = data.hitbox else {
        return Ok(false);
    };
    let placement = hitbox_placement(&pose, data, hitbox.body_type);
    host.set_proxy_placement(hitbox.handle, placement.location, placement.rotation);
    host.update_proxy_geometry(hitbox.handle, placement.dimensions);
    Ok(true)
}

pub fn align_constraint<H: SkeletonHost + ?Sized>(host: &mut H, bone: BoneId) -> RigResult<bool> {
    let pose = host.bone_pose(bone).ok_or(RigError::UnknownBone(bone))?;
    let data = record(host, bone)?;
    let Some(handle) = data.constraint else {
        return Ok(false);
    };
    let location = constraint_location(&pose, data);
    host.set_proxy_placement(handle, location, Euler::IDENTITY);
    Ok(true)
}

/// Moves the hitbox (and constraint anchor) after a location or rotation edit.
pub fn update_placement<H: SkeletonHost + ?Sized>(host: &mut H, bone: BoneId) -> RigResult<bool> {
    let pose = host.bone_pose(bone).ok_or(RigError::UnknownBone(bone))?;
    let data = record(host, bone)?;
    let Some(hitbox) = data.hitbox else {
        return Ok(false);
    };
    let placement = hitbox_placement(&pose, data, hitbox.body_type);
    host.set_proxy_placement(hitbox.handle, placement.location, placement.rotation);
    align_constraint(host, bone)?;
    Ok(true)
}

/// Rebuilds hitbox extents after a scale or origin edit.
pub fn update_dimensions<H: SkeletonHost + ?Sized>(host: &mut H, bone: BoneId) -> RigResult<bool> {
    let pose = host.bone_pose(bone).ok_or(RigError::UnknownBone(bone))?;
    let data = record(host, bone)?;
    let Some(hitbox) = data.hitbox else {
        return Ok(false);
    };
    let placement = hitbox_placement(&pose, data, hitbox.body_type);
    host.update_proxy_geometry(hitbox.handle, placement.dimensions);
    // Origin moves the hitbox along the bone as well.
    host.set_proxy_placement(hitbox.handle, placement.location, placement.rotation);
    Ok(true)
}

pub fn update_shape<H: SkeletonHost + ?Sized>(host: &mut H, bone: BoneId) -> RigResult<bool> {
    let data = record(host, bone)?;
    let Some(hitbox) = data.hitbox else {
        return Ok(false);
    };
    let shape = data.collision_shape;
    host.set_collision_shape(hitbox.handle, shape);
    host.set_proxy_display(hitbox.handle, ProxyDisplay::for_shape(shape));
    Ok(true)
}

pub fn sync_rigid_body<H: SkeletonHost + ?Sized>(host: &mut H, bone: BoneId) -> RigResult<bool> {
    let data = record(host, bone)?;
    let Some(hitbox) = data.hitbox else {
        return Ok(false);
    };
    let params = data.rigid_body;
    host.apply_rigid_body(hitbox.handle, &params);
    Ok(true)
}

pub fn sync_constraint<H: SkeletonHost + ?Sized>(
    host: &mut H,
    bone: BoneId,
    bodies: ConstraintBodies,
) -> RigResult<bool> {
    let data = record(host, bone)?;
    let Some(handle) = data.constraint else {
        return Ok(false);
    };
    let params = data.rigid_body_constraint;
    host.apply_constraint(handle, &params, bodies);
    Ok(true)
}

/// Drops generated containers that no longer hold anything. Returns how many were removed.
pub fn remove_empty_containers<H: SkeletonHost + ?Sized>(host: &mut H, skeleton: SkeletonId) -> usize {
    let mut removed = 0;
    for kind in ContainerKind::ALL {
        if host.container_len(skeleton, kind) == Some(0) {
            host.remove_container(skeleton, kind);
            removed += 1;
        }
    }
    removed
}

/// Bodies joined by a bone's constraint: the saved parent's hitbox and the bone's own.
pub fn constraint_bodies<H: SkeletonHost + ?Sized>(
    host: &H,
    names: &NameMap,
    bone: BoneId,
) -> RigResult<ConstraintBodies> {
    let label = host.bone_name(bone).ok_or(RigError::UnknownBone(bone))?;
    let data = record(host, bone)?;
    let object1 = match data.saved_parent(label)? {
        Some(saved) if !saved.is_root() => names
            .get(&saved.name)
            .and_then(|parent| host.bone_data(*parent))
            .and_then(|parent| parent.hitbox)
            .map(|hitbox| hitbox.handle),
        _ => None,
    };
    Ok(ConstraintBodies { object1, object2: data.hitbox.map(|hitbox| hitbox.handle) })
}

/// Applies the skeleton's hide toggles to the hitbox containers and its active bones.
pub fn apply_visibility<H: SkeletonHost + ?Sized>(host: &mut H, skeleton: SkeletonId) -> RigResult<()> {
    let settings = host.skeleton_settings(skeleton).ok_or(RigError::UnknownSkeleton(skeleton))?;
    for kind in [ContainerKind::Actives, ContainerKind::Passives] {
        if host.container_len(skeleton, kind).is_some() {
            host.set_container_hidden(skeleton, kind, settings.hide_hitboxes);
        }
    }
    for bone in host.bones(skeleton) {
        let active = host.bone_data(bone).is_some_and(BoneRigidBodyData::is_active_body);
        host.set_bone_hidden(bone, settings.hide_active_bones && active);
    }
    Ok(())
}
