use glam::Vec3;
use rigid_body_bones::config::RigConfig;
use rigid_body_bones::events::RigEvent;
use rigid_body_bones::geometry::BonePose;
use rigid_body_bones::host::{BoneId, HostMode, Notification, SkeletonHost, SkeletonId, SkeletonSettings};
use rigid_body_bones::memory::MemoryHost;
use rigid_body_bones::runtime::HISTORY_CAPACITY;
use rigid_body_bones::RigRuntime;

fn runtime() -> (RigRuntime<MemoryHost>, SkeletonId, BoneId) {
    let mut host = MemoryHost::new();
    let skeleton = host.add_skeleton("Armature");
    let root = host
        .add_bone(skeleton, "Root", BonePose::from_head_tail(Vec3::ZERO, Vec3::Z, 0.0), None, false)
        .expect("root");
    host.set_settings(skeleton, SkeletonSettings { enabled: true, ..Default::default() }).expect("settings");
    host.set_mode(skeleton, HostMode::Pose).expect("mode");
    let runtime = RigRuntime::new(host, RigConfig::default()).expect("runtime");
    (runtime, skeleton, root)
}

#[test]
fn flush_waits_for_the_tick_interval() {
    let (mut runtime, skeleton, root) = runtime();
    runtime.host_mut().edit_bone_data(root, "enabled", |data| data.enabled = true).expect("enable");

    runtime.update(0.05);
    assert_eq!(runtime.flush_count(), 0);
    assert!(runtime.take_reports().is_empty());
    assert_eq!(runtime.host().hitbox_count(skeleton), 1, "handlers run before the tick");
    assert!(runtime.engine().queue().is_dirty(skeleton));

    runtime.update(0.06);
    assert_eq!(runtime.flush_count(), 1);
    let reports = runtime.take_reports();
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].skeleton, skeleton);
    assert!(runtime.engine().queue().is_empty());
}

#[test]
fn idle_ticks_run_no_passes() {
    let (mut runtime, ..) = runtime();
    runtime.update(0.2);
    runtime.take_reports();
    let flushes = runtime.flush_count();

    for _ in 0..5 {
        runtime.update(0.1);
    }
    assert_eq!(runtime.flush_count(), flushes);
    assert!(runtime.take_reports().is_empty());
}

#[test]
fn immediate_reconcile_bypasses_the_clock() {
    let (mut runtime, skeleton, root) = runtime();
    let report = runtime.with_engine(|engine, host| {
        engine.pump_notifications(host);
        host.bone_data_mut(root).expect("root data").enabled = true;
        engine.reconcile_now(host, skeleton)
    });
    assert_eq!(report.hitboxes_created, 1);
    assert!(runtime.engine().queue().is_empty());
    assert_eq!(runtime.flush_count(), 0);
}

#[test]
fn custom_interval_is_honoured() {
    let mut host = MemoryHost::new();
    let skeleton = host.add_skeleton("Armature");
    let mut config = RigConfig::default();
    config.scheduler.tick_interval_secs = 0.5;
    let mut runtime = RigRuntime::new(host, config).expect("runtime");
    runtime.mark_all_dirty();

    runtime.update(0.3);
    assert_eq!(runtime.flush_count(), 0);
    runtime.update(0.3);
    assert_eq!(runtime.flush_count(), 1);
    assert_eq!(runtime.take_reports()[0].skeleton, skeleton);
}

#[test]
fn engine_events_move_into_a_bounded_history() {
    let (mut runtime, skeleton, root) = runtime();
    runtime.host_mut().edit_bone_data(root, "enabled", |data| data.enabled = true).expect("enable");
    runtime.update(0.05);
    assert!(runtime.engine().events().is_empty(), "handler events leave the engine every tick");
    assert!(runtime
        .take_events()
        .iter()
        .any(|event| matches!(event, RigEvent::HitboxCreated { bone, .. } if *bone == root)));

    for _ in 0..2000 {
        runtime.host_mut().push_notification(Notification::skeleton(skeleton, "update"));
        runtime.update(0.2);
        assert!(runtime.engine().events().is_empty());
    }

    assert!(runtime.flush_count() >= 2000);
    let events = runtime.take_events();
    assert_eq!(events.len(), HISTORY_CAPACITY, "oldest events are dropped");
    assert!(matches!(
        events.last(),
        Some(RigEvent::PassCompleted { skeleton: done, .. }) if *done == skeleton
    ));
    assert!(runtime.take_reports().len() <= HISTORY_CAPACITY);
    assert!(runtime.take_events().is_empty());
}
