//! Random-variate sources for durations
//!
//! [`VariateSpec`] is the serialisable description found in configuration files;
//! [`VariateSpec::source`] validates it and builds a [`VariateSource`], which
//! samples with any `rand` generator. Durations are never negative.

use rand::Rng;
use rand::distr::Uniform;
use rand_distr::{Distribution, Exp};
use serde::{Deserialize, Serialize};

use crate::SimError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum VariateSpec {
    /// Exponential with the given mean (rate = 1 / mean)
    Exponential { mean: f64 },
    /// Uniform over `[low, high]`
    Uniform { low: f64, high: f64 },
    /// Always `value`; for scripted, non-random scenarios
    Constant { value: f64 },
}

impl VariateSpec {
    pub fn exponential(mean: f64) -> VariateSpec {
        VariateSpec::Exponential { mean }
    }

    pub fn uniform(low: f64, high: f64) -> VariateSpec {
        VariateSpec::Uniform { low, high }
    }

    pub fn constant(value: f64) -> VariateSpec {
        VariateSpec::Constant { value }
    }

    pub fn validate(&self) -> Result<(), SimError> {
        match *self {
            VariateSpec::Exponential { mean } => {
                if !(mean.is_finite() && mean > 0.0) {
                    return Err(SimError::configuration(format!(
                        "exponential mean must be positive and finite, got {mean}"
                    )));
                }
            }
            VariateSpec::Uniform { low, high } => {
                if !(low.is_finite() && high.is_finite()) {
                    return Err(SimError::configuration(format!(
                        "uniform bounds must be finite, got [{low}, {high}]"
                    )));
                }
                if low < 0.0 {
                    return Err(SimError::configuration(format!(
                        "uniform lower bound must not be negative, got {low}"
                    )));
                }
                if low > high {
                    return Err(SimError::configuration(format!(
                        "uniform lower bound {low} exceeds upper bound {high}"
                    )));
                }
            }
            VariateSpec::Constant { value } => {
                if !(value.is_finite() && value >= 0.0) {
                    return Err(SimError::configuration(format!(
                        "constant duration must be non-negative and finite, got {value}"
                    )));
                }
            }
        }
        Ok(())
    }

    /// Expected value of the distribution
    pub fn mean(&self) -> f64 {
        match *self {
            VariateSpec::Exponential { mean } => mean,
            VariateSpec::Uniform { low, high } => (low + high) / 2.0,
            VariateSpec::Constant { value } => value,
        }
    }

    pub fn source(&self) -> Result<VariateSource, SimError> {
        self.validate()?;
        let source = match *self {
            VariateSpec::Exponential { mean } => VariateSource::Exponential(
                Exp::new(1.0 / mean).map_err(|e| SimError::configuration(e.to_string()))?,
            ),
            VariateSpec::Uniform { low, high } => VariateSource::Uniform(
                Uniform::new_inclusive(low, high)
                    .map_err(|e| SimError::configuration(e.to_string()))?,
            ),
            VariateSpec::Constant { value } => VariateSource::Constant(value),
        };
        Ok(source)
    }
}

/// Validated sampler built from a [`VariateSpec`]
#[derive(Debug, Clone)]
pub enum VariateSource {
    Exponential(Exp<f64>),
    Uniform(Uniform<f64>),
    Constant(f64),
}

impl Distribution<f64> for VariateSource {
    fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        match self {
            VariateSource::Exponential(exp) => exp.sample(rng),
            VariateSource::Uniform(uniform) => uniform.sample(rng),
            VariateSource::Constant(value) => *value,
        }
    }
}
