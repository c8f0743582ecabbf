use glam::Vec3;
use rigid_body_bones::geometry::BonePose;
use rigid_body_bones::hierarchy::{
    name_map, restore_all, restore_parent, store_all, store_parent, RestoreOutcome, StoreOutcome,
};
use rigid_body_bones::host::{BoneId, HostMode, SkeletonHost, SkeletonId, SkeletonSettings};
use rigid_body_bones::memory::MemoryHost;
use rigid_body_bones::model::{BodyType, SavedParent};
use rigid_body_bones::{RigError, RigPhysics};

struct Rig {
    host: MemoryHost,
    skeleton: SkeletonId,
    spine: BoneId,
    arm: BoneId,
}

fn rig() -> Rig {
    let mut host = MemoryHost::new();
    let skeleton = host.add_skeleton("Armature");
    let spine = host
        .add_bone(skeleton, "Spine", BonePose::from_head_tail(Vec3::ZERO, Vec3::Z, 0.0), None, false)
        .expect("spine");
    let arm_pose = BonePose::from_head_tail(Vec3::Z, Vec3::new(0.0, 0.0, 2.0), 0.0);
    let arm = host.add_bone(skeleton, "Arm", arm_pose, Some(spine), true).expect("arm");
    host.bone_data_mut(arm).expect("arm data").enabled = true;
    Rig { host, skeleton, spine, arm }
}

#[test]
fn store_then_restore_round_trips_parent_and_connect() {
    let Rig { mut host, skeleton, spine, arm } = rig();

    let stored = store_parent(&mut host, arm, true).expect("store");
    let saved = SavedParent { name: "Spine".into(), use_connect: true };
    assert_eq!(stored, StoreOutcome::Stored { saved, detached: true });
    assert_eq!(host.bone_parent(arm), None);
    assert_eq!(host.bone_data(spine).and_then(|data| data.name.clone()), Some("Spine".to_string()));

    let names = name_map(&host, skeleton);
    let restored = restore_parent(&mut host, arm, &names, true).expect("restore");
    assert_eq!(restored, RestoreOutcome::Restored { parent: Some(spine) });
    assert_eq!(host.bone_parent(arm), Some(spine));
    assert!(host.bone_use_connect(arm));
    assert!(!host.bone_data(arm).expect("arm data").has_saved_parent());
}

#[test]
fn missing_parent_is_reported_and_leaves_bone_parentless() {
    let Rig { mut host, skeleton, spine, arm } = rig();
    store_parent(&mut host, arm, true).expect("store");

    host.bone_data_mut(spine).expect("spine data").name = None;
    host.rename_bone(spine, "Torso").expect("rename");

    let names = name_map(&host, skeleton);
    assert!(!names.contains_key("Spine"));
    let restored = restore_parent(&mut host, arm, &names, true).expect("restore");
    assert_eq!(restored, RestoreOutcome::Unresolved { missing: "Spine".into() });
    assert_eq!(host.bone_parent(arm), None);
    assert!(host.bone_use_connect(arm), "saved connect flag is still applied");
}

#[test]
fn remembered_name_survives_a_rename() {
    let Rig { mut host, skeleton, spine, arm } = rig();
    store_parent(&mut host, arm, true).expect("store");
    host.rename_bone(spine, "Chest").expect("rename");

    let names = name_map(&host, skeleton);
    let restored = restore_parent(&mut host, arm, &names, true).expect("restore");
    assert_eq!(restored, RestoreOutcome::Restored { parent: Some(spine) });
}

#[test]
fn restore_without_delete_is_repeatable() {
    let Rig { mut host, skeleton, spine, arm } = rig();
    store_parent(&mut host, arm, true).expect("store");
    let names = name_map(&host, skeleton);

    for _ in 0..2 {
        let restored = restore_parent(&mut host, arm, &names, false).expect("restore");
        assert_eq!(restored, RestoreOutcome::Restored { parent: Some(spine) });
        assert!(host.bone_data(arm).expect("arm data").has_saved_parent());
    }
}

#[test]
fn storing_twice_is_a_typed_error() {
    let Rig { mut host, arm, .. } = rig();
    store_parent(&mut host, arm, true).expect("first store");
    let err = store_parent(&mut host, arm, true).unwrap_err();
    assert_eq!(err, RigError::SavedParentAlreadySet { bone: "Arm".into() });
}

#[test]
fn non_active_bones_are_skipped() {
    let Rig { mut host, spine, arm, .. } = rig();
    host.bone_data_mut(arm).expect("arm data").body_type = BodyType::Passive;
    assert_eq!(store_parent(&mut host, arm, true).expect("store"), StoreOutcome::Skipped);
    assert_eq!(host.bone_parent(arm), Some(spine));
    assert!(!host.bone_data(arm).expect("arm data").has_saved_parent());
}

#[test]
fn disabled_skeleton_records_without_detaching() {
    let Rig { mut host, spine, arm, .. } = rig();
    let stored = store_parent(&mut host, arm, false).expect("store");
    assert!(matches!(stored, StoreOutcome::Stored { detached: false, .. }));
    assert_eq!(host.bone_parent(arm), Some(spine));
}

#[test]
fn saved_fields_stay_paired_through_mode_and_enable_churn() {
    let Rig { mut host, skeleton, spine, arm } = rig();
    let mut engine = RigPhysics::<MemoryHost>::new(Default::default()).expect("engine");
    host.set_settings(skeleton, SkeletonSettings { enabled: true, ..Default::default() }).expect("settings");
    host.set_mode(skeleton, HostMode::Pose).expect("mode");

    let steps: [&dyn Fn(&mut MemoryHost); 6] = [
        &|host: &mut MemoryHost| {
            host.edit_bone_data(spine, "enabled", |data| data.enabled = true).expect("enable spine")
        },
        &|host: &mut MemoryHost| host.set_mode(skeleton, HostMode::Edit).expect("edit"),
        &|host: &mut MemoryHost| host.set_mode(skeleton, HostMode::Pose).expect("pose"),
        &|host: &mut MemoryHost| {
            host.edit_bone_data(arm, "enabled", |data| data.enabled = false).expect("disable arm")
        },
        &|host: &mut MemoryHost| {
            host.edit_bone_data(arm, "enabled", |data| data.enabled = true).expect("enable arm")
        },
        &|host: &mut MemoryHost| {
            host.set_settings(skeleton, SkeletonSettings { enabled: false, ..Default::default() })
                .expect("disable rig")
        },
    ];

    for step in steps {
        step(&mut host);
        engine.pump_notifications(&mut host);
        for report in engine.flush(&mut host) {
            assert!(report.is_clean(), "unexpected warnings: {:?}", report.warnings);
        }
        for bone in [spine, arm] {
            let name = host.bone_name(bone).expect("name").to_string();
            host.bone_data(bone).expect("data").saved_parent(&name).expect("saved fields paired");
        }
    }
    assert_eq!(host.bone_parent(arm), Some(spine), "disabled rig keeps its native hierarchy");
    assert_eq!(host.hitbox_count(skeleton), 0);
}

#[test]
fn whole_skeleton_store_and_restore() {
    let Rig { mut host, skeleton, spine, arm } = rig();
    host.bone_data_mut(spine).expect("spine data").enabled = true;

    let stored = store_all(&mut host, skeleton, true);
    assert_eq!(stored.len(), 2);
    assert!(stored.iter().all(|(_, result)| matches!(result, Ok(StoreOutcome::Stored { .. }))));
    assert_eq!(host.bone_parent(arm), None);

    let restored = restore_all(&mut host, skeleton, true);
    assert!(restored.iter().all(|(_, result)| matches!(result, Ok(RestoreOutcome::Restored { .. }))));
    assert_eq!(host.bone_parent(arm), Some(spine));
    assert_eq!(host.bone_parent(spine), None);
}
