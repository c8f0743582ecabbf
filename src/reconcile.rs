//! Per-skeleton reconciliation passes and the engine that schedules them.
//!
//! A pass brings one skeleton's proxies, hierarchy and bindings in line with the bone records
//! in a fixed order: stale-handle scrub, hierarchy remap, proxy structure, placement, parameter
//! sync, pose-driver binding, visibility, container cleanup. Running it twice in a row leaves
//! the host unchanged the second time apart from the hierarchy round trip.

use crate::config::{NamingConfig, RigConfig};
use crate::error::{RigError, RigResult};
use crate::events::{RigEvent, RigEventLog};
use crate::handlers::{Dispatch, HandlerTable, REQUIRED_EVENTS};
use crate::hierarchy::{self, name_map, RestoreOutcome, StoreOutcome};
use crate::host::{BoneId, ContainerKind, Notification, SkeletonHost, SkeletonId};
use crate::mode::{ModeObservation, ModeTracker, SimpleMode};
use crate::ops;
use crate::proxy;
use crate::scheduler::{DirtyQueue, MarkOutcome};
use serde::Serialize;

/// A bone-level failure that was logged and skipped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RigWarning {
    pub bone: Option<String>,
    pub message: String,
}

/// Summary of one reconciliation pass.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PassReport {
    pub skeleton: SkeletonId,
    pub hitboxes_created: usize,
    pub hitboxes_removed: usize,
    pub constraints_created: usize,
    pub constraints_removed: usize,
    pub parents_detached: usize,
    pub parents_restored: usize,
    pub warnings: Vec<RigWarning>,
}

impl PassReport {
    pub fn new(skeleton: SkeletonId) -> Self {
        Self {
            skeleton,
            hitboxes_created: 0,
            hitboxes_removed: 0,
            constraints_created: 0,
            constraints_removed: 0,
            parents_detached: 0,
            parents_restored: 0,
            warnings: Vec::new(),
        }
    }

    fn tally(&mut self, events: &[RigEvent]) {
        for event in events {
            match event {
                RigEvent::HitboxCreated { .. } => self.hitboxes_created += 1,
                RigEvent::HitboxRemoved { .. } => self.hitboxes_removed += 1,
                RigEvent::ConstraintCreated { .. } => self.constraints_created += 1,
                RigEvent::ConstraintRemoved { .. } => self.constraints_removed += 1,
                RigEvent::ParentDetached { .. } => self.parents_detached += 1,
                RigEvent::ParentRestored { .. } => self.parents_restored += 1,
                RigEvent::ModeChanged { .. } | RigEvent::PassCompleted { .. } => {}
            }
        }
    }

    fn warn(&mut self, bone: Option<String>, message: impl Into<String>) {
        let message = message.into();
        match &bone {
            Some(bone) => tracing::warn!(skeleton = %self.skeleton, %bone, "{message}"),
            None => tracing::warn!(skeleton = %self.skeleton, "{message}"),
        }
        self.warnings.push(RigWarning { bone, message });
    }

    pub fn is_clean(&self) -> bool {
        self.warnings.is_empty()
    }
}

fn display_name<H: SkeletonHost>(host: &H, bone: BoneId) -> String {
    host.bone_name(bone).map(str::to_string).unwrap_or_else(|| bone.to_string())
}

/// Records a per-bone error as a warning and yields the success value, if any.
fn check<H: SkeletonHost, T>(
    host: &H,
    report: &mut PassReport,
    bone: BoneId,
    result: RigResult<T>,
) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(err) => {
            report.warn(Some(display_name(host, bone)), err.to_string());
            None
        }
    }
}

/// Logs a restore whose saved parent no longer exists. The bone is left as a root.
fn unresolved_parent<H: SkeletonHost>(
    host: &H,
    log: &mut RigEventLog,
    report: &mut PassReport,
    bone: BoneId,
    missing: &str,
) {
    log.push(RigEvent::ParentRestored { skeleton: report.skeleton, bone, parent: None });
    let label = display_name(host, bone);
    let message = format!("[{label}] could not find parent \"{missing}\"");
    report.warn(Some(label), message);
}

/// Runs one reconciliation pass over `skeleton`. Never fails; problems end up in the report.
fn run_pass<H: SkeletonHost>(
    host: &mut H,
    modes: &mut ModeTracker,
    naming: &NamingConfig,
    log: &mut RigEventLog,
    skeleton: SkeletonId,
) -> PassReport {
    let mut report = PassReport::new(skeleton);
    let start = log.len();
    let Some(settings) = host.skeleton_settings(skeleton) else {
        report.warn(None, RigError::UnknownSkeleton(skeleton).to_string());
        return report;
    };
    let mode = modes.current_or_observe(skeleton, host.host_mode(skeleton).unwrap_or_default());
    let engaged = settings.enabled && mode == SimpleMode::Pose;
    let bones = host.bones(skeleton);
    tracing::debug!(%skeleton, bones = bones.len(), mode = mode.label(), engaged, "reconciliation pass");

    for &bone in &bones {
        let result = proxy::scrub_stale_handles(host, bone);
        check(host, &mut report, bone, result);
    }

    // Hierarchy: always restore, then record again while posing.
    let names = name_map(host, skeleton);
    for &bone in &bones {
        let result = hierarchy::restore_parent(host, bone, &names, true);
        match check(host, &mut report, bone, result) {
            Some(RestoreOutcome::Restored { parent }) => {
                log.push(RigEvent::ParentRestored { skeleton, bone, parent });
            }
            Some(RestoreOutcome::Unresolved { missing }) => {
                unresolved_parent(host, log, &mut report, bone, &missing);
            }
            Some(RestoreOutcome::NothingSaved) | None => {}
        }
    }
    if mode == SimpleMode::Pose {
        for &bone in &bones {
            let result = hierarchy::store_parent(host, bone, settings.enabled);
            let outcome = check(host, &mut report, bone, result);
            if let Some(StoreOutcome::Stored { saved, detached: true }) = outcome {
                log.push(RigEvent::ParentDetached { skeleton, bone, saved_parent: saved.name });
            }
        }
    }

    // Structure.
    for &bone in &bones {
        let Some(data) = host.bone_data(bone) else {
            report.warn(None, RigError::UnknownBone(bone).to_string());
            continue;
        };
        if !(settings.enabled && data.enabled) {
            let result = proxy::remove_proxies(host, log, skeleton, bone);
            check(host, &mut report, bone, result);
            continue;
        }
        let wants_constraint = data.is_active_body()
            && matches!(data.saved_parent(""), Ok(Some(saved)) if !saved.is_root());

        let result = proxy::recreate_hitbox(host, naming, log, skeleton, bone);
        check(host, &mut report, bone, result);
        let result = proxy::create_hitbox(host, naming, log, skeleton, bone);
        check(host, &mut report, bone, result);
        if wants_constraint {
            let result = proxy::ensure_constraint(host, naming, log, skeleton, bone);
            check(host, &mut report, bone, result);
        }
    }

    // Placement and parameters.
    let names = name_map(host, skeleton);
    for &bone in &bones {
        let result = proxy::align_hitbox(host, bone).and_then(|_| proxy::align_constraint(host, bone));
        check(host, &mut report, bone, result);
        let result = proxy::sync_rigid_body(host, bone)
            .and_then(|_| proxy::update_shape(host, bone))
            .and_then(|_| proxy::constraint_bodies(host, &names, bone))
            .and_then(|bodies| proxy::sync_constraint(host, bone, bodies));
        check(host, &mut report, bone, result);
    }

    // Pose drivers.
    for &bone in &bones {
        let target = host
            .bone_data(bone)
            .filter(|data| engaged && data.is_active_body())
            .and_then(|data| data.hitbox)
            .map(|hitbox| hitbox.handle);
        host.bind_pose_driver(bone, target);
    }

    if settings.enabled {
        if let Err(err) = proxy::apply_visibility(host, skeleton) {
            report.warn(None, err.to_string());
        }
    } else {
        for &bone in &bones {
            host.set_bone_hidden(bone, false);
        }
    }
    proxy::remove_empty_containers(host, skeleton);

    report.tally(log.since(start));
    log.push(RigEvent::PassCompleted { skeleton, warnings: report.warnings.len() });
    tracing::info!(
        %skeleton,
        created = report.hitboxes_created,
        removed = report.hitboxes_removed,
        constraints = report.constraints_created,
        warnings = report.warnings.len(),
        "reconciled skeleton"
    );
    report
}

/// Routes one host notification into handlers, the mode tracker or the dirty queue.
fn route<H: SkeletonHost>(
    host: &mut H,
    queue: &mut DirtyQueue,
    modes: &mut ModeTracker,
    handlers: &HandlerTable<H>,
    naming: &NamingConfig,
    log: &mut RigEventLog,
    notification: Notification,
) -> RigResult<()> {
    match notification {
        Notification::Property(change) => {
            if queue.is_in_flight(change.skeleton) {
                tracing::trace!(skeleton = %change.skeleton, property = %change.property, "suppressed echo");
                return Ok(());
            }
            let mut ctx = Dispatch { host, queue, naming, log };
            handlers.dispatch(&mut ctx, &change)?;
        }
        Notification::ModeChanged { skeleton } => {
            let raw = host.host_mode(skeleton).ok_or(RigError::UnknownSkeleton(skeleton))?;
            if let ModeObservation::Transition { from, to } = modes.observe(skeleton, raw) {
                log.push(RigEvent::ModeChanged { skeleton, from, to });
                queue.mark_dirty(skeleton);
            }
        }
        Notification::FileLoaded => {
            modes.reset();
            for skeleton in host.skeletons() {
                queue.mark_dirty(skeleton);
            }
        }
        Notification::UndoRedo => {
            for skeleton in host.skeletons() {
                queue.mark_dirty(skeleton);
            }
        }
    }
    Ok(())
}

/// Drains the host outbox and routes everything in it, logging failures.
fn pump<H: SkeletonHost>(
    host: &mut H,
    queue: &mut DirtyQueue,
    modes: &mut ModeTracker,
    handlers: &HandlerTable<H>,
    naming: &NamingConfig,
    log: &mut RigEventLog,
) -> usize {
    let notifications = host.drain_notifications();
    let count = notifications.len();
    for notification in notifications {
        if let Err(err) = route(host, queue, modes, handlers, naming, log, notification) {
            tracing::warn!("notification handler failed: {err}");
        }
    }
    count
}

/// The reconciliation engine: handler table, dirty queue, mode tracker and event log.
pub struct RigPhysics<H> {
    queue: DirtyQueue,
    modes: ModeTracker,
    handlers: HandlerTable<H>,
    config: RigConfig,
    log: RigEventLog,
}

impl<H: SkeletonHost> RigPhysics<H> {
    pub fn new(config: RigConfig) -> RigResult<Self> {
        Self::with_handlers(config, HandlerTable::standard())
    }

    /// Builds the engine around a custom handler table, which must cover every required event.
    pub fn with_handlers(config: RigConfig, handlers: HandlerTable<H>) -> RigResult<Self> {
        handlers.validate(REQUIRED_EVENTS)?;
        Ok(Self {
            queue: DirtyQueue::new(),
            modes: ModeTracker::new(),
            handlers,
            config,
            log: RigEventLog::default(),
        })
    }

    pub fn config(&self) -> &RigConfig {
        &self.config
    }

    pub fn queue(&self) -> &DirtyQueue {
        &self.queue
    }

    pub fn modes(&self) -> &ModeTracker {
        &self.modes
    }

    pub fn mark_dirty(&mut self, skeleton: SkeletonId) -> MarkOutcome {
        self.queue.mark_dirty(skeleton)
    }

    pub fn mark_all_dirty(&mut self, host: &H) {
        for skeleton in host.skeletons() {
            self.queue.mark_dirty(skeleton);
        }
    }

    pub fn handle_notification(&mut self, host: &mut H, notification: Notification) -> RigResult<()> {
        route(
            host,
            &mut self.queue,
            &mut self.modes,
            &self.handlers,
            &self.config.naming,
            &mut self.log,
            notification,
        )
    }

    /// Routes everything in the host outbox. Returns how many notifications were handled.
    pub fn pump_notifications(&mut self, host: &mut H) -> usize {
        pump(host, &mut self.queue, &mut self.modes, &self.handlers, &self.config.naming, &mut self.log)
    }

    /// Runs one pass per dirty skeleton. Notifications the passes cause are routed while their
    /// skeleton is still in flight, so a pass's own echoes never re-mark it.
    pub fn flush(&mut self, host: &mut H) -> Vec<PassReport> {
        let RigPhysics { queue, modes, handlers, config, log } = self;
        let mut reports = Vec::new();
        let stats = queue.flush(|skeleton, queue| {
            reports.push(run_pass(host, modes, &config.naming, log, skeleton));
            pump(host, queue, modes, handlers, &config.naming, log);
        });
        if stats.passes > 0 {
            tracing::debug!(passes = stats.passes, deferred = stats.deferred, "flushed dirty skeletons");
        }
        reports
    }

    /// Reconciles one skeleton immediately, outside the tick.
    pub fn reconcile_now(&mut self, host: &mut H, skeleton: SkeletonId) -> PassReport {
        let RigPhysics { queue, modes, handlers, config, log } = self;
        queue.run_in_flight(skeleton, |skeleton, queue| {
            let report = run_pass(host, modes, &config.naming, log, skeleton);
            pump(host, queue, modes, handlers, &config.naming, log);
            report
        })
    }

    /// Removes every generated object of the skeleton and gives bones their hierarchy back.
    pub fn remove_skeleton_physics(&mut self, host: &mut H, skeleton: SkeletonId) -> RigResult<PassReport> {
        if host.skeleton_settings(skeleton).is_none() {
            return Err(RigError::UnknownSkeleton(skeleton));
        }
        let RigPhysics { queue, modes, handlers, config, log } = self;
        let report = queue.run_in_flight(skeleton, |skeleton, queue| {
            let mut report = PassReport::new(skeleton);
            let start = log.len();
            for (bone, result) in hierarchy::restore_all(host, skeleton, true) {
                match check(host, &mut report, bone, result) {
                    Some(RestoreOutcome::Restored { parent }) => {
                        log.push(RigEvent::ParentRestored { skeleton, bone, parent });
                    }
                    Some(RestoreOutcome::Unresolved { missing }) => {
                        unresolved_parent(host, log, &mut report, bone, &missing);
                    }
                    _ => {}
                }
            }
            for bone in host.bones(skeleton) {
                let result = proxy::remove_proxies(host, log, skeleton, bone);
                check(host, &mut report, bone, result);
                host.bind_pose_driver(bone, None);
                host.set_bone_hidden(bone, false);
            }
            for kind in ContainerKind::ALL {
                if host.container_len(skeleton, kind).is_some() {
                    host.remove_container(skeleton, kind);
                }
            }
            report.tally(log.since(start));
            pump(host, queue, modes, handlers, &config.naming, log);
            report
        });
        modes.forget(skeleton);
        tracing::info!(%skeleton, removed = report.hitboxes_removed, "removed skeleton physics");
        Ok(report)
    }

    /// Copies physics settings from `source` onto `targets` and marks the skeleton dirty.
    pub fn copy_from_active(
        &mut self,
        host: &mut H,
        skeleton: SkeletonId,
        source: BoneId,
        targets: &[BoneId],
    ) -> RigResult<usize> {
        let copied = ops::copy_settings(host, source, targets)?;
        self.queue.mark_dirty(skeleton);
        Ok(copied)
    }

    pub fn events(&self) -> &RigEventLog {
        &self.log
    }

    pub fn drain_events(&mut self) -> Vec<RigEvent> {
        self.log.drain()
    }
}
