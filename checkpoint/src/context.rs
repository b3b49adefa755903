//! Per-run state shared by every agent of one run
//!
//! The stage pipeline and all accumulators live here rather than in globals, so
//! concurrent runs never interfere.

use std::fmt;

use des::dists::VariateSource;
use des::{EventLoop, PoolId, SimTime};
use serde::Serialize;

use crate::CheckpointError;
use crate::config::{StageConfig, WaitAccounting};

/// A bottleneck: one resource pool plus its service-time source
#[derive(Debug, Clone)]
pub struct Stage {
    pub name: String,
    pub pool: PoolId,
    pub service: VariateSource,
}

/// Lifecycle step of one entity
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Transition {
    Arrived,
    /// Requested a unit of `stage`
    Waiting { stage: usize },
    /// Granted a unit of `stage` after waiting `wait`
    ServiceStarted { stage: usize, wait: f64 },
    /// Left `stage` after a service of `service` time units
    ServiceCompleted { stage: usize, service: f64 },
    Departed { total_wait: f64 },
}

impl fmt::Display for Transition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Transition::Arrived => write!(f, "arrived"),
            Transition::Waiting { stage } => write!(f, "waiting for stage {stage}"),
            Transition::ServiceStarted { stage, wait } => {
                write!(f, "started stage {stage} after waiting {wait:.3}")
            }
            Transition::ServiceCompleted { stage, service } => {
                write!(f, "completed stage {stage} in {service:.3}")
            }
            Transition::Departed { total_wait } => {
                write!(f, "departed, waited {total_wait:.3} in total")
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TraceRecord {
    pub entity: u64,
    pub transition: Transition,
    pub time: SimTime,
}

pub type Observer = Box<dyn FnMut(&TraceRecord)>;

/// Wait totals for one stage
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StageTally {
    /// Entities granted a unit
    pub served: u64,
    pub total_wait: f64,
    pub max_wait: f64,
}

pub struct RunContext {
    stages: Vec<Stage>,
    tallies: Vec<StageTally>,
    accounting: WaitAccounting,
    total_wait_time: f64,
    completed_count: u64,
    arrived_count: u64,
    observer: Option<Observer>,
}

impl RunContext {
    pub fn new(accounting: WaitAccounting, observer: Option<Observer>) -> RunContext {
        RunContext {
            stages: Vec::new(),
            tallies: Vec::new(),
            accounting,
            total_wait_time: 0.0,
            completed_count: 0,
            arrived_count: 0,
            observer,
        }
    }

    pub fn stage_count(&self) -> usize {
        self.stages.len()
    }

    pub fn stage(&self, k: usize) -> &Stage {
        &self.stages[k]
    }

    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    pub fn tallies(&self) -> &[StageTally] {
        &self.tallies
    }

    pub fn total_wait_time(&self) -> f64 {
        self.total_wait_time
    }

    pub fn completed_count(&self) -> u64 {
        self.completed_count
    }

    pub fn arrived_count(&self) -> u64 {
        self.arrived_count
    }

    fn record(&mut self, entity: u64, transition: Transition, time: SimTime) {
        if let Some(observer) = self.observer.as_mut() {
            observer(&TraceRecord {
                entity,
                transition,
                time,
            });
        }
    }

    pub(crate) fn on_arrival(&mut self, entity: u64, time: SimTime) {
        self.arrived_count += 1;
        self.record(entity, Transition::Arrived, time);
    }

    pub(crate) fn on_request(&mut self, entity: u64, stage: usize, time: SimTime) {
        self.record(entity, Transition::Waiting { stage }, time);
    }

    pub(crate) fn on_grant(&mut self, entity: u64, stage: usize, wait: f64, time: SimTime) {
        let tally = &mut self.tallies[stage];
        tally.served += 1;
        tally.total_wait += wait;
        tally.max_wait = tally.max_wait.max(wait);
        if self.accounting == WaitAccounting::OnGrant {
            self.total_wait_time += wait;
        }
        self.record(entity, Transition::ServiceStarted { stage, wait }, time);
    }

    pub(crate) fn on_service_completed(
        &mut self,
        entity: u64,
        stage: usize,
        service: f64,
        time: SimTime,
    ) {
        self.record(entity, Transition::ServiceCompleted { stage, service }, time);
    }

    pub(crate) fn on_departure(&mut self, entity: u64, total_wait: f64, time: SimTime) {
        self.completed_count += 1;
        if self.accounting == WaitAccounting::CompletedOnly {
            self.total_wait_time += total_wait;
        }
        self.record(entity, Transition::Departed { total_wait }, time);
    }
}

/// Create one pool per stage, in order, and register the stages with the run
pub fn install_stages(
    event_loop: &mut EventLoop<RunContext>,
    configs: &[StageConfig],
) -> Result<(), CheckpointError> {
    for config in configs {
        let service = config.service.source()?;
        let pool = event_loop.add_pool(config.capacity)?;
        let ctx = event_loop.state_mut();
        ctx.stages.push(Stage {
            name: config.name.clone(),
            pool,
            service,
        });
        ctx.tallies.push(StageTally::default());
    }
    Ok(())
}
