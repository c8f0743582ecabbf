//! Saving and restoring a bone's native parent while physics owns its transform.
//!
//! Parents are saved by name, never by id: ids do not survive file reloads, and the host may
//! hand out fresh ones after undo. The parent's record remembers the name it had at save time
//! so a later rename still resolves through [`name_map`].

use crate::error::{RigError, RigResult};
use crate::host::{BoneId, SkeletonHost, SkeletonId};
use crate::model::SavedParent;
use std::collections::HashMap;

/// Stable bone name to bone id, for one skeleton.
pub type NameMap = HashMap<String, BoneId>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreOutcome {
    /// Not an enabled active bone; nothing recorded.
    Skipped,
    Stored { saved: SavedParent, detached: bool },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RestoreOutcome {
    NothingSaved,
    Restored { parent: Option<BoneId> },
    /// The saved parent name matched no bone; the bone was left without a parent.
    Unresolved { missing: String },
}

/// Maps every bone's stable name (its remembered name when set, its current name otherwise).
pub fn name_map<H: SkeletonHost + ?Sized>(host: &H, skeleton: SkeletonId) -> NameMap {
    let mut map = NameMap::new();
    for bone in host.bones(skeleton) {
        let remembered = host.bone_data(bone).and_then(|data| data.name.as_deref());
        if let Some(name) = remembered.or_else(|| host.bone_name(bone)) {
            map.insert(name.to_string(), bone);
        }
    }
    map
}

fn bone_label<H: SkeletonHost + ?Sized>(host: &H, bone: BoneId) -> RigResult<String> {
    host.bone_name(bone).map(str::to_string).ok_or(RigError::UnknownBone(bone))
}

pub fn store_parent<H: SkeletonHost + ?Sized>(
    host: &mut H,
    bone: BoneId,
    skeleton_enabled: bool,
) -> RigResult<StoreOutcome> {
    let label = bone_label(host, bone)?;
    let data = host.bone_data(bone).ok_or(RigError::UnknownBone(bone))?;
    data.saved_parent(&label)?;
    if data.has_saved_parent() {
        return Err(RigError::SavedParentAlreadySet { bone: label });
    }
    if !data.is_active_body() {
        return Ok(StoreOutcome::Skipped);
    }

    let name = match host.bone_parent(bone) {
        Some(parent) => {
            let name = bone_label(host, parent)?;
            if let Some(parent_data) = host.bone_data_mut(parent) {
                parent_data.name = Some(name.clone());
            }
            name
        }
        None => String::new(),
    };
    let saved = SavedParent { name, use_connect: host.bone_use_connect(bone) };
    host.bone_data_mut(bone).ok_or(RigError::UnknownBone(bone))?.set_saved_parent(saved.clone());

    if skeleton_enabled {
        host.set_bone_parent(bone, None, false);
    }
    tracing::debug!(bone = %label, parent = %saved.name, detached = skeleton_enabled, "stored parent");
    Ok(StoreOutcome::Stored { saved, detached: skeleton_enabled })
}

pub fn restore_parent<H: SkeletonHost + ?Sized>(
    host: &mut H,
    bone: BoneId,
    names: &NameMap,
    delete_after: bool,
) -> RigResult<RestoreOutcome> {
    let label = bone_label(host, bone)?;
    let data = host.bone_data(bone).ok_or(RigError::UnknownBone(bone))?;
    let Some(saved) = data.saved_parent(&label)? else {
        return Ok(RestoreOutcome::NothingSaved);
    };

    let (parent, outcome) = if saved.is_root() {
        (None, RestoreOutcome::Restored { parent: None })
    } else {
        match names.get(&saved.name) {
            Some(parent) => (Some(*parent), RestoreOutcome::Restored { parent: Some(*parent) }),
            None => {
                tracing::debug!(bone = %label, parent = %saved.name, "could not find saved parent");
                (None, RestoreOutcome::Unresolved { missing: saved.name.clone() })
            }
        }
    };
    host.set_bone_parent(bone, parent, saved.use_connect);

    let data = host.bone_data_mut(bone).ok_or(RigError::UnknownBone(bone))?;
    if delete_after {
        data.clear_saved_parent();
    }
    data.saved_parent(&label)?;
    Ok(outcome)
}

/// Restores every bone of the skeleton that has a saved parent, collecting per-bone results.
pub fn restore_all<H: SkeletonHost + ?Sized>(
    host: &mut H,
    skeleton: SkeletonId,
    delete_after: bool,
) -> Vec<(BoneId, RigResult<RestoreOutcome>)> {
    let names = name_map(host, skeleton);
    host.bones(skeleton)
        .into_iter()
        .map(|bone| (bone, restore_parent(host, bone, &names, delete_after)))
        .collect()
}

/// Stores (and, when `skeleton_enabled`, detaches) every enabled active bone of the skeleton.
pub fn store_all<H: SkeletonHost + ?Sized>(
    host: &mut H,
    skeleton: SkeletonId,
    skeleton_enabled: bool,
) -> Vec<(BoneId, RigResult<StoreOutcome>)> {
    host.bones(skeleton)
        .into_iter()
        .map(|bone| (bone, store_parent(host, bone, skeleton_enabled)))
        .collect()
}
