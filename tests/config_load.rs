use rigid_body_bones::cli::CliOverrides;
use rigid_body_bones::config::RigConfig;
use rigid_body_bones::host::SkeletonHost;
use rigid_body_bones::memory::{MemoryHost, RigDescription};
use rigid_body_bones::RigPhysics;
use std::fs;
use tempfile::tempdir;

#[test]
fn partial_config_fills_in_defaults() {
    let dir = tempdir().expect("temp dir");
    let path = dir.path().join("rig.cfg.json");
    fs::write(
        &path,
        r#"{ "scheduler": { "tick_interval_secs": 0.25 }, "naming": { "hitbox_suffix": ".hit" } }"#,
    )
    .expect("write config");

    let config = RigConfig::load(&path).expect("load config");
    assert_eq!(config.scheduler.tick_interval_secs, 0.25);
    assert_eq!(config.naming.hitbox_suffix, ".hit");
    assert_eq!(config.naming.constraint_suffix, " [Head]");
    assert_eq!(config.mass.density, RigConfig::default().mass.density);
    assert_eq!(config.logging.filter, RigConfig::default().logging.filter);
}

#[test]
fn missing_file_falls_back_to_defaults() {
    let dir = tempdir().expect("temp dir");
    let config = RigConfig::load_or_default(dir.path().join("absent.json"));
    assert_eq!(config.scheduler.tick_interval_secs, 0.1);
    assert_eq!(config.naming.hitbox_suffix, " [Hitbox]");
}

#[test]
fn invalid_json_reports_a_parse_error() {
    let dir = tempdir().expect("temp dir");
    let path = dir.path().join("broken.json");
    fs::write(&path, "{ scheduler: ").expect("write config");
    let err = RigConfig::load(&path).unwrap_err();
    assert!(err.to_string().contains("Failed to parse config file"), "unexpected error: {err:#}");
}

#[test]
fn command_line_flags_override_the_file() {
    let dir = tempdir().expect("temp dir");
    let path = dir.path().join("rig.cfg.json");
    fs::write(&path, r#"{ "mass": { "density": 2.0 }, "logging": { "filter": "warn" } }"#)
        .expect("write config");
    let path_arg = path.to_string_lossy().into_owned();

    let args = ["--config", path_arg.as_str(), "--density", "5", "rig.json"];
    let overrides = CliOverrides::parse(args).expect("parse flags");
    let mut config = RigConfig::load(overrides.config_path().expect("config path")).expect("load config");
    assert_eq!(overrides.positional, vec!["rig.json".to_string()]);
    config.apply_overrides(&overrides.into_config_overrides());

    assert_eq!(config.mass.density, 5.0);
    assert_eq!(config.logging.filter, "warn");
}

#[test]
fn rig_file_feeds_the_engine_with_configured_names() {
    let dir = tempdir().expect("temp dir");
    let path = dir.path().join("rig.json");
    fs::write(
        &path,
        r#"{
            "skeletons": [{
                "name": "Armature",
                "settings": { "enabled": true },
                "mode": "POSE",
                "bones": [
                    { "name": "Spine", "head": [0, 0, 0], "tail": [0, 0, 1], "physics": { "enabled": true } },
                    { "name": "Tail", "head": [0, 0, 1], "tail": [0, 0, 2], "parent": "Spine",
                      "physics": { "enabled": true, "type": "PASSIVE" } }
                ]
            }]
        }"#,
    )
    .expect("write rig");

    let rig = RigDescription::load(&path).expect("load rig");
    let mut host = MemoryHost::from_rig(&rig).expect("build host");
    let skeleton = host.skeleton_by_name("Armature").expect("skeleton");

    let mut config = RigConfig::default();
    config.naming.hitbox_suffix = ".hitbox".into();
    let mut engine = RigPhysics::<MemoryHost>::new(config).expect("engine");
    engine.mark_all_dirty(&host);
    let reports = engine.flush(&mut host);

    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].hitboxes_created, 2);
    assert_eq!(reports[0].constraints_created, 0, "passive children get no joint");
    let spine = host.bone_by_name(skeleton, "Spine").expect("spine");
    let handle = host.bone_data(spine).and_then(|data| data.hitbox).expect("spine hitbox").handle;
    assert_eq!(host.proxy(handle).expect("proxy").name, "Spine.hitbox");
}

#[test]
fn unreadable_rig_file_names_the_path() {
    let dir = tempdir().expect("temp dir");
    let err = RigDescription::load(dir.path().join("missing.json")).unwrap_err();
    assert!(err.to_string().contains("Failed to read rig file"));
}
