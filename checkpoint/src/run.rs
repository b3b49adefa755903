//! Single runs of a facility and their results

use des::EventLoop;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::CheckpointError;
use crate::arrivals::ArrivalGenerator;
use crate::config::FacilityConfig;
use crate::context::{Observer, RunContext, TraceRecord, install_stages};

/// Counters for one stage at the end of a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageSummary {
    pub name: String,
    pub capacity: usize,
    pub served: u64,
    pub total_wait: f64,
    pub max_wait: f64,
    pub peak_queue_len: usize,
    /// Entities still queued when the horizon was reached
    pub queue_len_at_horizon: usize,
    pub in_use_at_horizon: usize,
}

impl StageSummary {
    pub fn average_wait(&self) -> Option<f64> {
        (self.served > 0).then(|| self.total_wait / self.served as f64)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperimentResult {
    pub capacities: Vec<usize>,
    pub horizon: f64,
    pub seed: u64,
    pub total_wait_time: f64,
    pub completed_count: u64,
    pub arrived_count: u64,
    /// Arrived but not departed when the clock stopped
    pub in_flight_count: u64,
    pub stages: Vec<StageSummary>,
}

impl ExperimentResult {
    /// Mean wait per completed entity
    pub fn average_wait(&self) -> Result<f64, CheckpointError> {
        if self.completed_count == 0 {
            return Err(CheckpointError::UndefinedMetric);
        }
        Ok(self.total_wait_time / self.completed_count as f64)
    }

    /// Completed entities per unit of simulated time
    pub fn throughput(&self) -> Option<f64> {
        (self.horizon > 0.0).then(|| self.completed_count as f64 / self.horizon)
    }
}

/// Run one isolated simulation of `config` up to its horizon.
pub fn run_once(config: &FacilityConfig) -> Result<ExperimentResult, CheckpointError> {
    simulate(config, None)
}

/// As [`run_once`], calling `observer` for every entity transition.
pub fn run_once_traced<F>(config: &FacilityConfig, observer: F) -> Result<ExperimentResult, CheckpointError>
where
    F: FnMut(&TraceRecord) + 'static,
{
    simulate(config, Some(Box::new(observer)))
}

fn simulate(config: &FacilityConfig, observer: Option<Observer>) -> Result<ExperimentResult, CheckpointError> {
    config.validate()?;

    let mut event_loop = EventLoop::new(RunContext::new(config.wait_accounting, observer));
    install_stages(&mut event_loop, &config.stages)?;
    let generator = ArrivalGenerator::new(&config.arrivals, config.seed)?;
    event_loop.spawn(Box::new(generator));

    debug!(
        facility = %config.name,
        capacities = ?config.capacities(),
        horizon = config.horizon,
        seed = config.seed,
        "starting run"
    );
    let summary = event_loop.run(config.horizon)?;

    let ctx = event_loop.state();
    let stages = ctx
        .stages()
        .iter()
        .zip(ctx.tallies())
        .filter_map(|(stage, tally)| {
            let pool = event_loop.pool(stage.pool)?;
            Some(StageSummary {
                name: stage.name.clone(),
                capacity: pool.capacity(),
                served: tally.served,
                total_wait: tally.total_wait,
                max_wait: tally.max_wait,
                peak_queue_len: pool.peak_queue_len(),
                queue_len_at_horizon: pool.queue_len(),
                in_use_at_horizon: pool.in_use(),
            })
        })
        .collect();

    let result = ExperimentResult {
        capacities: config.capacities(),
        horizon: config.horizon,
        seed: config.seed,
        total_wait_time: ctx.total_wait_time(),
        completed_count: ctx.completed_count(),
        arrived_count: ctx.arrived_count(),
        in_flight_count: ctx.arrived_count() - ctx.completed_count(),
        stages,
    };
    debug!(
        completed = result.completed_count,
        in_flight = result.in_flight_count,
        total_wait = result.total_wait_time,
        events = summary.events_fired,
        "run finished"
    );
    Ok(result)
}
