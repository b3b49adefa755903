//! Error types for facility runs and sweeps

use des::SimError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CheckpointError {
    /// Rejected before the clock starts
    #[error("invalid configuration: {0}")]
    Configuration(String),

    /// No entity completed the pipeline, so there is nothing to average
    #[error("average wait is undefined: no entity completed the pipeline")]
    UndefinedMetric,

    #[error("simulation error: {0}")]
    Simulation(SimError),

    #[error("scenario panicked: {0}")]
    ScenarioPanicked(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("could not parse configuration file: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<SimError> for CheckpointError {
    fn from(error: SimError) -> Self {
        match error {
            SimError::Configuration(msg) => CheckpointError::Configuration(msg),
            other => CheckpointError::Simulation(other),
        }
    }
}

impl CheckpointError {
    pub fn configuration(msg: impl Into<String>) -> Self {
        CheckpointError::Configuration(msg.into())
    }

    pub fn is_configuration(&self) -> bool {
        matches!(self, CheckpointError::Configuration(_))
    }
}
