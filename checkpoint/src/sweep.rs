//! Capacity sweeps
//!
//! Every capacity combination is an independent run of the same base facility,
//! executed on the rayon pool through [`des::parallel::ParallelRunner`]. Results
//! come back in the order the combinations were given, whatever the thread count.

use std::ops::RangeInclusive;

use des::parallel::{ParallelRunner, simple_progress_reporter};
use serde::Serialize;
use tracing::{info, warn};

use crate::CheckpointError;
use crate::config::FacilityConfig;
use crate::run::{ExperimentResult, run_once};

/// What a sweep does when one combination fails
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SweepErrorPolicy {
    /// Return the first failure (in combination order) and nothing else
    #[default]
    Abort,
    /// Record the failure against its combination and keep going
    Continue,
}

/// Every combination taking one value from each range, last range varying fastest
pub fn capacity_grid(ranges: &[RangeInclusive<usize>]) -> Vec<Vec<usize>> {
    ranges.iter().fold(vec![Vec::new()], |combinations, range| {
        combinations
            .iter()
            .flat_map(|prefix| {
                range.clone().map(move |capacity| {
                    let mut next = prefix.clone();
                    next.push(capacity);
                    next
                })
            })
            .collect()
    })
}

pub struct Sweep {
    base: FacilityConfig,
    capacity_sets: Vec<Vec<usize>>,
    policy: SweepErrorPolicy,
    threads: Option<usize>,
}

impl Sweep {
    pub fn new(base: FacilityConfig, capacity_sets: Vec<Vec<usize>>) -> Sweep {
        Sweep {
            base,
            capacity_sets,
            policy: SweepErrorPolicy::Abort,
            threads: None,
        }
    }

    pub fn grid(base: FacilityConfig, ranges: &[RangeInclusive<usize>]) -> Sweep {
        Sweep::new(base, capacity_grid(ranges))
    }

    pub fn policy(mut self, policy: SweepErrorPolicy) -> Sweep {
        self.policy = policy;
        self
    }

    pub fn threads(mut self, n: usize) -> Sweep {
        self.threads = Some(n);
        self
    }

    pub fn run(&self) -> Result<SweepReport, CheckpointError> {
        let abort = self.policy == SweepErrorPolicy::Abort;
        info!(
            facility = %self.base.name,
            combinations = self.capacity_sets.len(),
            policy = ?self.policy,
            "starting sweep"
        );

        // configuration problems surface before any clock starts
        let mut configs = Vec::with_capacity(self.capacity_sets.len());
        let mut rejected = Vec::with_capacity(self.capacity_sets.len());
        for capacities in &self.capacity_sets {
            let prepared = self
                .base
                .with_capacities(capacities)
                .and_then(|config| config.validate().map(|()| config));
            match prepared {
                Ok(config) => {
                    configs.push(Some(config));
                    rejected.push(None);
                }
                Err(e) if abort => return Err(e),
                Err(e) => {
                    configs.push(None);
                    rejected.push(Some(e));
                }
            }
        }

        let interval = (configs.len() / 10).max(1);
        let mut runner = ParallelRunner::new(configs.len(), |i| configs[i].as_ref().map(run_once))
            .progress(simple_progress_reporter(interval));
        if let Some(n) = self.threads {
            runner = runner.num_threads(n);
        }
        let outcomes = runner.run();

        let mut entries = Vec::with_capacity(outcomes.len());
        for ((capacities, rejection), outcome) in self.capacity_sets.iter().zip(rejected).zip(outcomes) {
            let outcome = match (rejection, outcome) {
                (Some(e), _) => Err(e),
                (None, Ok(Some(result))) => result,
                (None, Ok(None)) => Err(CheckpointError::configuration("combination was not run")),
                (None, Err(panic)) => Err(CheckpointError::ScenarioPanicked(panic)),
            };
            let outcome = match outcome {
                Err(e) if abort => return Err(e),
                other => other,
            };
            if let Err(e) = &outcome {
                warn!(capacities = ?capacities, error = %e, "combination failed");
            }
            entries.push(SweepEntry {
                capacities: capacities.clone(),
                outcome,
            });
        }

        let report = SweepReport { entries };
        info!(
            runs = report.entries.len(),
            failures = report.failures(),
            "sweep finished"
        );
        Ok(report)
    }
}

/// Run `base` once per capacity set, aborting on the first failure.
pub fn run_sweep(
    base: &FacilityConfig,
    capacity_sets: &[Vec<usize>],
) -> Result<SweepReport, CheckpointError> {
    Sweep::new(base.clone(), capacity_sets.to_vec()).run()
}

#[derive(Debug)]
pub struct SweepEntry {
    pub capacities: Vec<usize>,
    pub outcome: Result<ExperimentResult, CheckpointError>,
}

impl SweepEntry {
    pub fn average_wait(&self) -> Option<f64> {
        self.outcome.as_ref().ok()?.average_wait().ok()
    }
}

#[derive(Debug, Default)]
pub struct SweepReport {
    pub entries: Vec<SweepEntry>,
}

/// Flat, serialisable view of one sweep entry
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SweepRow {
    pub capacities: String,
    pub total_wait_time: Option<f64>,
    pub completed_count: Option<u64>,
    pub arrived_count: Option<u64>,
    /// Empty when no entity completed
    pub average_wait: Option<f64>,
    pub throughput: Option<f64>,
    pub error: Option<String>,
}

impl SweepReport {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, capacities: &[usize]) -> Option<&SweepEntry> {
        self.entries.iter().find(|e| e.capacities == capacities)
    }

    pub fn failures(&self) -> usize {
        self.entries.iter().filter(|e| e.outcome.is_err()).count()
    }

    /// Combination with the lowest defined average wait; the earliest wins ties.
    pub fn best(&self) -> Option<&SweepEntry> {
        self.entries
            .iter()
            .filter_map(|e| Some((e, e.average_wait()?)))
            .fold(None, |best: Option<(&SweepEntry, f64)>, (entry, wait)| match best {
                Some((_, lowest)) if lowest <= wait => best,
                _ => Some((entry, wait)),
            })
            .map(|(entry, _)| entry)
    }

    pub fn rows(&self) -> Vec<SweepRow> {
        self.entries
            .iter()
            .map(|entry| {
                let capacities = entry
                    .capacities
                    .iter()
                    .map(usize::to_string)
                    .collect::<Vec<_>>()
                    .join(",");
                match &entry.outcome {
                    Ok(result) => SweepRow {
                        capacities,
                        total_wait_time: Some(result.total_wait_time),
                        completed_count: Some(result.completed_count),
                        arrived_count: Some(result.arrived_count),
                        average_wait: result.average_wait().ok(),
                        throughput: result.throughput(),
                        error: None,
                    },
                    Err(e) => SweepRow {
                        capacities,
                        total_wait_time: None,
                        completed_count: None,
                        arrived_count: None,
                        average_wait: None,
                        throughput: None,
                        error: Some(e.to_string()),
                    },
                }
            })
            .collect()
    }
}
