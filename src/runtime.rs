//! Periodic driver for the reconciliation engine.
//!
//! The host and the engine live as resources in a `bevy_ecs` world. Each [`RigRuntime::update`]
//! runs a chained schedule: route the host's pending notifications, advance the flush clock,
//! and flush dirty skeletons when the clock ticks. Pass reports and engine events move into
//! [`PassHistory`] every tick, which keeps the newest [`HISTORY_CAPACITY`] of each until taken.

use crate::config::RigConfig;
use crate::error::RigResult;
use crate::events::RigEvent;
use crate::host::SkeletonHost;
use crate::reconcile::{PassReport, RigPhysics};
use crate::scheduler::TickTimer;
use bevy_ecs::prelude::{Mut, Res, ResMut, Resource, Schedule, World};
use bevy_ecs::schedule::IntoSystemConfigs;
use std::collections::VecDeque;
use std::marker::PhantomData;
use std::mem;

pub const HISTORY_CAPACITY: usize = 4096;

/// Hosts that can live inside the runtime's world.
pub trait RigHost: SkeletonHost + Send + Sync + 'static {}

impl<T: SkeletonHost + Send + Sync + 'static> RigHost for T {}

pub struct HostResource<H>(pub H);

impl<H: RigHost> Resource for HostResource<H> {}

pub struct RigEngine<H>(pub RigPhysics<H>);

impl<H: RigHost> Resource for RigEngine<H> {}

#[derive(Resource, Clone, Copy)]
pub struct TickDelta(pub f32);

#[derive(Resource, Debug, Clone)]
pub struct FlushClock {
    pub timer: TickTimer,
    pub due: bool,
}

#[derive(Resource, Debug, Default)]
pub struct PassHistory {
    pub reports: VecDeque<PassReport>,
    pub events: VecDeque<RigEvent>,
    pub flushes: u64,
}

impl PassHistory {
    fn record(&mut self, reports: Vec<PassReport>, events: Vec<RigEvent>) {
        self.reports.extend(reports);
        self.events.extend(events);
        while self.reports.len() > HISTORY_CAPACITY {
            self.reports.pop_front();
        }
        while self.events.len() > HISTORY_CAPACITY {
            self.events.pop_front();
        }
    }
}

pub fn sys_pump_notifications<H: RigHost>(
    mut host: ResMut<HostResource<H>>,
    mut engine: ResMut<RigEngine<H>>,
) {
    let host = &mut host.0;
    engine.0.pump_notifications(host);
}

pub fn sys_advance_flush_clock(delta: Res<TickDelta>, mut clock: ResMut<FlushClock>) {
    clock.due = clock.timer.advance(delta.0);
}

pub fn sys_flush_dirty_rigs<H: RigHost>(
    clock: Res<FlushClock>,
    mut host: ResMut<HostResource<H>>,
    mut engine: ResMut<RigEngine<H>>,
    mut history: ResMut<PassHistory>,
) {
    let mut reports = Vec::new();
    if clock.due && engine.0.queue().flush_scheduled() {
        reports = engine.0.flush(&mut host.0);
        history.flushes += 1;
    }
    let events = engine.0.drain_events();
    if !reports.is_empty() || !events.is_empty() {
        history.record(reports, events);
    }
}

pub struct RigRuntime<H: RigHost> {
    world: World,
    schedule: Schedule,
    _host: PhantomData<H>,
}

impl<H: RigHost> RigRuntime<H> {
    pub fn new(host: H, config: RigConfig) -> RigResult<Self> {
        let timer = TickTimer::new(config.scheduler.tick_interval_secs);
        let engine = RigPhysics::<H>::new(config)?;

        let mut world = World::new();
        world.insert_resource(HostResource(host));
        world.insert_resource(RigEngine(engine));
        world.insert_resource(TickDelta(0.0));
        world.insert_resource(FlushClock { timer, due: false });
        world.insert_resource(PassHistory::default());

        let mut schedule = Schedule::default();
        schedule.add_systems(
            (sys_pump_notifications::<H>, sys_advance_flush_clock, sys_flush_dirty_rigs::<H>).chain(),
        );

        Ok(Self { world, schedule, _host: PhantomData })
    }

    pub fn update(&mut self, dt: f32) {
        self.world.resource_mut::<TickDelta>().0 = dt;
        self.schedule.run(&mut self.world);
    }

    pub fn host(&self) -> &H {
        &self.world.resource::<HostResource<H>>().0
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.world.resource_mut::<HostResource<H>>().into_inner().0
    }

    pub fn engine(&self) -> &RigPhysics<H> {
        &self.world.resource::<RigEngine<H>>().0
    }

    /// Gives `f` the engine and the host together, e.g. for an immediate reconcile.
    pub fn with_engine<T>(&mut self, f: impl FnOnce(&mut RigPhysics<H>, &mut H) -> T) -> T {
        self.world.resource_scope(|world, mut engine: Mut<RigEngine<H>>| {
            let mut host = world.resource_mut::<HostResource<H>>();
            f(&mut engine.0, &mut host.0)
        })
    }

    pub fn mark_all_dirty(&mut self) {
        self.with_engine(|engine, host| engine.mark_all_dirty(host));
    }

    pub fn flush_count(&self) -> u64 {
        self.world.resource::<PassHistory>().flushes
    }

    pub fn take_reports(&mut self) -> Vec<PassReport> {
        mem::take(&mut self.world.resource_mut::<PassHistory>().reports).into()
    }

    /// Engine events recorded since the last call, oldest first.
    pub fn take_events(&mut self) -> Vec<RigEvent> {
        mem::take(&mut self.world.resource_mut::<PassHistory>().events).into()
    }
}
