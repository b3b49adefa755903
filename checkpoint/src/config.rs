//! Facility and sweep configuration
//!
//! A [`FacilityConfig`] describes one run: the ordered stages, how entities
//! arrive, the horizon and the seed. [`ExperimentFile`] is the TOML layout read by
//! the binary, a facility plus an optional `[sweep]` table.

use std::fs;
use std::ops::RangeInclusive;
use std::path::Path;

use des::dists::VariateSpec;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::CheckpointError;

/// How waits of entities still in the facility at the horizon are counted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WaitAccounting {
    /// Add each wait to the run total as soon as the unit is granted, so
    /// entities abandoned later still contribute
    #[default]
    OnGrant,
    /// Add an entity's waits only when it departs
    CompletedOnly,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageConfig {
    pub name: String,
    pub capacity: usize,
    pub service: VariateSpec,
}

impl StageConfig {
    pub fn new(name: impl Into<String>, capacity: usize, service: VariateSpec) -> StageConfig {
        StageConfig {
            name: name.into(),
            capacity,
            service,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArrivalConfig {
    pub interarrival: VariateSpec,
    /// Entities created at t = 0 before the first inter-arrival draw
    #[serde(default)]
    pub initial_entities: usize,
    /// Stop creating entities once this many exist
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_entities: Option<usize>,
}

impl ArrivalConfig {
    pub fn new(interarrival: VariateSpec) -> ArrivalConfig {
        ArrivalConfig {
            interarrival,
            initial_entities: 0,
            max_entities: None,
        }
    }

    pub fn with_initial_entities(mut self, n: usize) -> ArrivalConfig {
        self.initial_entities = n;
        self
    }

    pub fn with_max_entities(mut self, n: usize) -> ArrivalConfig {
        self.max_entities = Some(n);
        self
    }
}

fn default_name() -> String {
    "facility".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FacilityConfig {
    #[serde(default = "default_name")]
    pub name: String,
    pub stages: Vec<StageConfig>,
    pub arrivals: ArrivalConfig,
    pub horizon: f64,
    #[serde(default)]
    pub seed: u64,
    #[serde(default)]
    pub wait_accounting: WaitAccounting,
}

impl FacilityConfig {
    /// Security checkpoint: boarding-pass check then body scanner
    pub fn airport() -> FacilityConfig {
        FacilityConfig {
            name: "airport".to_string(),
            stages: vec![
                StageConfig::new("boarding_pass", 2, VariateSpec::exponential(7.5)),
                StageConfig::new("scanner", 2, VariateSpec::uniform(5.0, 10.0)),
            ],
            arrivals: ArrivalConfig::new(VariateSpec::exponential(0.5)),
            horizon: 60.0,
            seed: 42,
            wait_accounting: WaitAccounting::OnGrant,
        }
    }

    /// Carwash: wash bay then wax bay, same timings as the checkpoint
    pub fn carwash() -> FacilityConfig {
        FacilityConfig {
            name: "carwash".to_string(),
            stages: vec![
                StageConfig::new("wash", 2, VariateSpec::exponential(7.5)),
                StageConfig::new("wax", 2, VariateSpec::uniform(5.0, 10.0)),
            ],
            ..FacilityConfig::airport()
        }
    }

    pub fn with_horizon(mut self, horizon: f64) -> FacilityConfig {
        self.horizon = horizon;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> FacilityConfig {
        self.seed = seed;
        self
    }

    pub fn with_wait_accounting(mut self, policy: WaitAccounting) -> FacilityConfig {
        self.wait_accounting = policy;
        self
    }

    /// Copy of this facility with one capacity per stage, in stage order
    pub fn with_capacities(&self, capacities: &[usize]) -> Result<FacilityConfig, CheckpointError> {
        if capacities.len() != self.stages.len() {
            return Err(CheckpointError::configuration(format!(
                "{} capacities given for {} stages",
                capacities.len(),
                self.stages.len()
            )));
        }
        let mut config = self.clone();
        for (stage, &capacity) in config.stages.iter_mut().zip(capacities) {
            stage.capacity = capacity;
        }
        Ok(config)
    }

    pub fn capacities(&self) -> Vec<usize> {
        self.stages.iter().map(|s| s.capacity).collect()
    }

    pub fn validate(&self) -> Result<(), CheckpointError> {
        let result = self.check();
        if let Err(ref e) = result {
            warn!(facility = %self.name, error = %e, "rejected configuration");
        }
        result
    }

    fn check(&self) -> Result<(), CheckpointError> {
        if self.stages.is_empty() {
            return Err(CheckpointError::configuration("at least one stage is required"));
        }
        for stage in &self.stages {
            if stage.capacity == 0 {
                return Err(CheckpointError::configuration(format!(
                    "stage '{}' has capacity 0",
                    stage.name
                )));
            }
            stage.service.validate()?;
        }
        // zero is allowed: nothing happens and the metric is undefined
        if !(self.horizon.is_finite() && self.horizon >= 0.0) {
            return Err(CheckpointError::configuration(format!(
                "horizon must be non-negative and finite, got {}",
                self.horizon
            )));
        }
        self.arrivals.interarrival.validate()?;
        if self.arrivals.max_entities.is_none() && self.arrivals.interarrival.mean() <= 0.0 {
            return Err(CheckpointError::configuration(
                "inter-arrival time must have a positive mean unless max_entities is set",
            ));
        }
        Ok(())
    }
}

/// `[sweep]` table: an inclusive capacity range per stage
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SweepSettings {
    pub capacities: Vec<[usize; 2]>,
    #[serde(default)]
    pub continue_on_error: bool,
    #[serde(default)]
    pub threads: Option<usize>,
}

impl SweepSettings {
    /// Same range `1..=max` for each of `stages` stages
    pub fn up_to(stages: usize, max: usize) -> SweepSettings {
        SweepSettings {
            capacities: vec![[1, max]; stages],
            ..SweepSettings::default()
        }
    }

    pub fn ranges(&self) -> Vec<RangeInclusive<usize>> {
        self.capacities.iter().map(|&[lo, hi]| lo..=hi).collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperimentFile {
    pub facility: FacilityConfig,
    #[serde(default)]
    pub sweep: Option<SweepSettings>,
}

impl ExperimentFile {
    pub fn from_toml_str(text: &str) -> Result<ExperimentFile, CheckpointError> {
        Ok(toml::from_str(text)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<ExperimentFile, CheckpointError> {
        let text = fs::read_to_string(path)?;
        ExperimentFile::from_toml_str(&text)
    }
}
