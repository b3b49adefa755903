//! Error types for the simulation kernel

use crate::PoolId;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SimError {
    #[error("invalid configuration: {0}")]
    Configuration(String),

    #[error("cannot schedule a wake-up {delay} time units ahead")]
    InvalidDelay { delay: f64 },

    #[error("horizon {horizon} lies before the current time {now}")]
    InvalidHorizon { horizon: f64, now: f64 },

    #[error("resource pool {0:?} does not exist")]
    UnknownPool(PoolId),
}

impl SimError {
    pub fn configuration(msg: impl Into<String>) -> Self {
        SimError::Configuration(msg.into())
    }
}
