//! Registration table mapping property notifications to their handlers.
//!
//! Bone-level handlers make the targeted in-place edit and leave everything structural to the
//! reconciliation pass by marking the skeleton dirty. A notification without a bone applies to
//! every bone of the skeleton, and only while the skeleton's physics is enabled.

use crate::config::NamingConfig;
use crate::error::{RigError, RigResult};
use crate::events::RigEventLog;
use crate::hierarchy::name_map;
use crate::host::{BoneId, PropertyChange, SkeletonHost, SkeletonId};
use crate::proxy;
use crate::scheduler::DirtyQueue;
use std::collections::HashMap;

/// Everything a handler may touch while it runs.
pub struct Dispatch<'a, H> {
    pub host: &'a mut H,
    pub queue: &'a mut DirtyQueue,
    pub naming: &'a NamingConfig,
    pub log: &'a mut RigEventLog,
}

pub type EventHandler<H> = fn(&mut Dispatch<'_, H>, &PropertyChange) -> RigResult<()>;

/// Events that must have a handler before the engine starts.
pub const REQUIRED_EVENTS: &[&str] = &[
    "enabled",
    "type",
    "location",
    "rotation",
    "scale",
    "origin",
    "collision_shape",
    "rigid_body",
    "rigid_body_constraint",
    "parent",
    "update",
    "align",
    "hide_hitboxes",
    "hide_active_bones",
];

pub struct HandlerTable<H> {
    handlers: HashMap<&'static str, EventHandler<H>>,
}

impl<H: SkeletonHost> HandlerTable<H> {
    pub fn empty() -> Self {
        Self { handlers: HashMap::new() }
    }

    pub fn standard() -> Self {
        let mut table = Self::empty();
        table.register("enabled", on_enabled::<H>);
        table.register("type", on_type::<H>);
        table.register("location", on_placement::<H>);
        table.register("rotation", on_placement::<H>);
        table.register("scale", on_dimensions::<H>);
        table.register("origin", on_dimensions::<H>);
        table.register("collision_shape", on_collision_shape::<H>);
        table.register("rigid_body", on_rigid_body::<H>);
        table.register("rigid_body_constraint", on_rigid_body_constraint::<H>);
        table.register("parent", on_structure::<H>);
        table.register("update", on_structure::<H>);
        table.register("align", on_align::<H>);
        table.register("hide_hitboxes", on_visibility::<H>);
        table.register("hide_active_bones", on_visibility::<H>);
        table
    }

    /// Registers `handler` for `event`, replacing any previous one.
    pub fn register(&mut self, event: &'static str, handler: EventHandler<H>) {
        self.handlers.insert(event, handler);
    }

    pub fn unregister(&mut self, event: &str) -> bool {
        self.handlers.remove(event).is_some()
    }

    pub fn get(&self, event: &str) -> Option<EventHandler<H>> {
        self.handlers.get(event).copied()
    }

    pub fn contains(&self, event: &str) -> bool {
        self.handlers.contains_key(event)
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Fails with the first event in `required` that has no handler.
    pub fn validate(&self, required: &[&str]) -> RigResult<()> {
        match required.iter().find(|event| !self.contains(event)) {
            Some(missing) => Err(RigError::MissingHandler((*missing).to_string())),
            None => Ok(()),
        }
    }

    /// Routes a property change. Unknown properties are ignored.
    pub fn dispatch(&self, ctx: &mut Dispatch<'_, H>, change: &PropertyChange) -> RigResult<bool> {
        match self.get(&change.property) {
            Some(handler) => {
                handler(ctx, change)?;
                Ok(true)
            }
            None => {
                tracing::trace!(property = %change.property, "no handler for property change");
                Ok(false)
            }
        }
    }
}

/// Bones a change applies to. Skeleton-wide changes are dropped while physics is disabled.
fn targets<H: SkeletonHost>(host: &H, change: &PropertyChange) -> RigResult<Vec<BoneId>> {
    if let Some(bone) = change.bone {
        return Ok(vec![bone]);
    }
    if !rig_enabled(host, change.skeleton)? {
        return Ok(Vec::new());
    }
    Ok(host.bones(change.skeleton))
}

/// Applies `op` to every bone the change targets. On a skeleton-wide change a failing bone is
/// logged and skipped, and the failures come back as one error once every bone has been tried.
fn for_each_target<H, T, F>(ctx: &mut Dispatch<'_, H>, change: &PropertyChange, mut op: F) -> RigResult<()>
where
    H: SkeletonHost,
    F: FnMut(&mut Dispatch<'_, H>, BoneId) -> RigResult<T>,
{
    if let Some(bone) = change.bone {
        return op(ctx, bone).map(drop);
    }
    let mut failures = Vec::new();
    for bone in targets(ctx.host, change)? {
        if let Err(err) = op(ctx, bone) {
            let label = ctx.host.bone_name(bone).map(str::to_string).unwrap_or_else(|| bone.to_string());
            tracing::warn!(
                skeleton = %change.skeleton,
                bone = %label,
                property = %change.property,
                "bone update failed: {err}"
            );
            failures.push(err);
        }
    }
    let failed = failures.len();
    match failures.into_iter().next() {
        None => Ok(()),
        Some(first) => Err(RigError::BoneFailures {
            property: change.property.to_string(),
            failed,
            first: Box::new(first),
        }),
    }
}

fn mark(queue: &mut DirtyQueue, skeleton: SkeletonId) {
    queue.mark_dirty(skeleton);
}

fn rig_enabled<H: SkeletonHost>(host: &H, skeleton: SkeletonId) -> RigResult<bool> {
    let settings = host.skeleton_settings(skeleton).ok_or(RigError::UnknownSkeleton(skeleton))?;
    Ok(settings.enabled)
}

fn on_enabled<H: SkeletonHost>(ctx: &mut Dispatch<'_, H>, change: &PropertyChange) -> RigResult<()> {
    let rig_on = rig_enabled(ctx.host, change.skeleton)?;
    let result = for_each_target(ctx, change, |ctx, bone| {
        let enabled = ctx.host.bone_data(bone).ok_or(RigError::UnknownBone(bone))?.enabled;
        if enabled && rig_on {
            proxy::create_hitbox(ctx.host, ctx.naming, ctx.log, change.skeleton, bone)?;
        } else {
            proxy::remove_proxies(ctx.host, ctx.log, change.skeleton, bone)?;
        }
        Ok(())
    });
    proxy::remove_empty_containers(ctx.host, change.skeleton);
    mark(ctx.queue, change.skeleton);
    result
}

fn on_type<H: SkeletonHost>(ctx: &mut Dispatch<'_, H>, change: &PropertyChange) -> RigResult<()> {
    let rig_on = rig_enabled(ctx.host, change.skeleton)?;
    let result = for_each_target(ctx, change, |ctx, bone| {
        let enabled = ctx.host.bone_data(bone).ok_or(RigError::UnknownBone(bone))?.enabled;
        proxy::remove_proxies(ctx.host, ctx.log, change.skeleton, bone)?;
        if enabled && rig_on {
            proxy::create_hitbox(ctx.host, ctx.naming, ctx.log, change.skeleton, bone)?;
        }
        Ok(())
    });
    proxy::remove_empty_containers(ctx.host, change.skeleton);
    mark(ctx.queue, change.skeleton);
    result
}

fn on_placement<H: SkeletonHost>(ctx: &mut Dispatch<'_, H>, change: &PropertyChange) -> RigResult<()> {
    for_each_target(ctx, change, |ctx, bone| proxy::update_placement(ctx.host, bone))
}

fn on_dimensions<H: SkeletonHost>(ctx: &mut Dispatch<'_, H>, change: &PropertyChange) -> RigResult<()> {
    for_each_target(ctx, change, |ctx, bone| proxy::update_dimensions(ctx.host, bone))
}

fn on_collision_shape<H: SkeletonHost>(
    ctx: &mut Dispatch<'_, H>,
    change: &PropertyChange,
) -> RigResult<()> {
    for_each_target(ctx, change, |ctx, bone| proxy::update_shape(ctx.host, bone))
}

fn on_rigid_body<H: SkeletonHost>(ctx: &mut Dispatch<'_, H>, change: &PropertyChange) -> RigResult<()> {
    for_each_target(ctx, change, |ctx, bone| proxy::sync_rigid_body(ctx.host, bone))
}

fn on_rigid_body_constraint<H: SkeletonHost>(
    ctx: &mut Dispatch<'_, H>,
    change: &PropertyChange,
) -> RigResult<()> {
    let names = name_map(ctx.host, change.skeleton);
    for_each_target(ctx, change, |ctx, bone| {
        let bodies = proxy::constraint_bodies(ctx.host, &names, bone)?;
        proxy::sync_constraint(ctx.host, bone, bodies)
    })
}

fn on_structure<H: SkeletonHost>(ctx: &mut Dispatch<'_, H>, change: &PropertyChange) -> RigResult<()> {
    mark(ctx.queue, change.skeleton);
    Ok(())
}

fn on_align<H: SkeletonHost>(ctx: &mut Dispatch<'_, H>, change: &PropertyChange) -> RigResult<()> {
    for_each_target(ctx, change, |ctx, bone| {
        proxy::align_hitbox(ctx.host, bone)?;
        proxy::align_constraint(ctx.host, bone)
    })
}

fn on_visibility<H: SkeletonHost>(ctx: &mut Dispatch<'_, H>, change: &PropertyChange) -> RigResult<()> {
    if rig_enabled(ctx.host, change.skeleton)? {
        proxy::apply_visibility(ctx.host, change.skeleton)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::BonePose;
    use crate::host::SkeletonSettings;
    use crate::memory::MemoryHost;
    use crate::model::BoneRigidBodyData;
    use glam::Vec3;

    #[test]
    fn standard_table_covers_required_events() {
        let table = HandlerTable::<MemoryHost>::standard();
        table.validate(REQUIRED_EVENTS).expect("standard table is complete");
        assert_eq!(table.len(), REQUIRED_EVENTS.len());
    }

    #[test]
    fn validation_names_the_missing_event() {
        let mut table = HandlerTable::<MemoryHost>::standard();
        assert!(table.unregister("align"));
        assert_eq!(table.validate(REQUIRED_EVENTS), Err(RigError::MissingHandler("align".into())));
    }

    #[test]
    fn skeleton_wide_failures_are_collected_after_every_bone() {
        let mut host = MemoryHost::new();
        let skeleton = host.add_skeleton("Armature");
        let settings = SkeletonSettings { enabled: true, ..Default::default() };
        host.set_settings(skeleton, settings).expect("settings");
        let pose = BonePose::from_head_tail(Vec3::ZERO, Vec3::Z, 0.0);
        let first = host.add_bone(skeleton, "First", pose, None, false).expect("first");
        let second = host.add_bone(skeleton, "Second", pose, None, false).expect("second");
        for bone in [first, second] {
            let record: BoneRigidBodyData =
                serde_json::from_str(r#"{ "enabled": true, "saved_parent_name": "" }"#).expect("record");
            *host.bone_data_mut(bone).expect("bone data") = record;
        }

        let mut queue = DirtyQueue::new();
        let naming = NamingConfig::default();
        let mut log = RigEventLog::default();
        let mut ctx = Dispatch { host: &mut host, queue: &mut queue, naming: &naming, log: &mut log };
        let change = PropertyChange { skeleton, bone: None, property: "rigid_body_constraint".into() };
        let err = HandlerTable::<MemoryHost>::standard().dispatch(&mut ctx, &change).unwrap_err();

        let (property, failed, first) = match err {
            RigError::BoneFailures { property, failed, first } => (property, failed, first),
            other => panic!("expected an aggregate error, got {other:?}"),
        };
        assert_eq!(property, "rigid_body_constraint");
        assert_eq!(failed, 2);
        assert_eq!(
            *first,
            RigError::UnpairedSavedParent { bone: "First".into(), name_set: true, connect_set: false }
        );
    }
}
