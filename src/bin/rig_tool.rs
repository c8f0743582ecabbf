use anyhow::{anyhow, bail, Context, Result};
use rigid_body_bones::cli::CliOverrides;
use rigid_body_bones::config::RigConfig;
use rigid_body_bones::handlers::{HandlerTable, REQUIRED_EVENTS};
use rigid_body_bones::host::SkeletonHost;
use rigid_body_bones::memory::{MemoryHost, RigDescription};
use rigid_body_bones::ops::calculate_bone_mass;
use rigid_body_bones::RigRuntime;
use std::collections::HashSet;
use std::env;
use std::process;
use tracing_subscriber::EnvFilter;

fn main() {
    if let Err(err) = run() {
        eprintln!("error: {err:?}");
        process::exit(1);
    }
}

fn run() -> Result<()> {
    let mut args = env::args().skip(1);
    let Some(command) = args.next() else {
        print_usage();
        return Ok(());
    };
    if matches!(command.as_str(), "help" | "--help" | "-h") {
        print_usage();
        return Ok(());
    }

    let overrides = CliOverrides::parse(args)?;
    let mut config = match overrides.config_path() {
        Some(path) => RigConfig::load(path)?,
        None => RigConfig::default(),
    };
    let positional = overrides.positional.clone();
    let overrides = overrides.into_config_overrides();
    config.apply_overrides(&overrides);
    init_logging(&config.logging.filter);
    if !overrides.is_empty() {
        tracing::debug!(fields = ?overrides.applied_fields(), "applied command line overrides");
    }

    let rig_path = positional
        .first()
        .ok_or_else(|| anyhow!("{command} requires a rig path: rig_tool {command} <rig.json>"))?;
    match command.as_str() {
        "reconcile" => cmd_reconcile(rig_path, config),
        "validate" => cmd_validate(rig_path),
        "mass" => cmd_mass(rig_path, &config),
        other => Err(anyhow!("unknown command '{other}'")),
    }
}

fn print_usage() {
    eprintln!(
        "Rig Tool

Usage:
  rig_tool reconcile <rig.json>   Run one reconciliation tick and print the pass reports as JSON
  rig_tool validate <rig.json>    Check bone parents and saved-parent records
  rig_tool mass <rig.json>        Print the hitbox mass of every enabled bone
  rig_tool help                   Show this message

Flags:
  --config <path>          Load a rig config JSON file
  --tick-interval <secs>   Override the scheduling interval
  --density <kg/unit^3>    Override the density used by `mass`
  --log <filter>           Log filter, e.g. `debug` or `rigid_body_bones=trace`
"
    );
}

fn init_logging(filter: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).try_init();
}

fn load_host(path: &str) -> Result<MemoryHost> {
    let rig = RigDescription::load(path)?;
    MemoryHost::from_rig(&rig).with_context(|| format!("Failed to build rig from {path}"))
}

fn cmd_reconcile(path: &str, config: RigConfig) -> Result<()> {
    let interval = config.scheduler.tick_interval_secs;
    let host = load_host(path)?;
    let mut runtime = RigRuntime::new(host, config)?;
    runtime.mark_all_dirty();
    runtime.update(interval);
    let reports = runtime.take_reports();
    println!("{}", serde_json::to_string_pretty(&reports)?);

    let host = runtime.host();
    for skeleton in host.skeletons() {
        let name = host.skeleton_name(skeleton).unwrap_or("<unnamed>");
        eprintln!(
            "{name}: {} hitbox(es), {} constraint(s)",
            host.hitbox_count(skeleton),
            host.constraint_count(skeleton)
        );
    }
    Ok(())
}

fn cmd_validate(path: &str) -> Result<()> {
    let rig = RigDescription::load(path)?;
    HandlerTable::<MemoryHost>::standard().validate(REQUIRED_EVENTS)?;

    let mut issues = Vec::new();
    for skeleton in &rig.skeletons {
        let mut names = HashSet::with_capacity(skeleton.bones.len());
        for bone in &skeleton.bones {
            if !names.insert(bone.name.as_str()) {
                issues.push(format!("[{}] duplicate bone name '{}'", skeleton.name, bone.name));
            }
        }
        for bone in &skeleton.bones {
            if let Some(parent) = &bone.parent {
                if !names.contains(parent.as_str()) {
                    issues.push(format!(
                        "[{}] bone '{}' names unknown parent '{parent}'",
                        skeleton.name, bone.name
                    ));
                }
            }
            if let Err(err) = bone.physics.saved_parent(&bone.name) {
                issues.push(format!("[{}] {err}", skeleton.name));
            }
        }
    }

    if issues.is_empty() {
        let bones: usize = rig.skeletons.iter().map(|skeleton| skeleton.bones.len()).sum();
        println!("Rig OK: {} skeleton(s), {bones} bone(s)", rig.skeletons.len());
        Ok(())
    } else {
        for issue in &issues {
            eprintln!("- {issue}");
        }
        bail!("rig validation failed with {} issue(s)", issues.len());
    }
}

fn cmd_mass(path: &str, config: &RigConfig) -> Result<()> {
    let host = load_host(path)?;
    let density = config.mass.density;
    for skeleton in host.skeletons() {
        let name = host.skeleton_name(skeleton).unwrap_or("<unnamed>");
        for bone in host.bones(skeleton) {
            let Some(data) = host.bone_data(bone) else {
                continue;
            };
            if !data.enabled {
                continue;
            }
            let mass = calculate_bone_mass(&host, bone, density)?;
            let bone_name = host.bone_name(bone).unwrap_or("<unnamed>");
            println!("{name}/{bone_name}: {mass:.4} ({})", data.collision_shape.label());
        }
    }
    Ok(())
}
