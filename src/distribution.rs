//! Inter-sample delay distributions.
//!
//! A [`TransmitDistribution`] decides how long a sensor waits between two
//! samples. It holds no state of its own; randomness comes from the
//! caller's [`RandomSource`].

use serde::{Deserialize, Serialize};

use crate::random::RandomSource;
use crate::types::SimTime;

/// Distribution of the delay between two consecutive sensor samples.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum TransmitDistribution {
    /// Fixed delay
    Deterministic { value: SimTime },
    /// Uniform integer delay between min and max (inclusive)
    Uniform { min: SimTime, max: SimTime },
    /// Normal/Gaussian delay with mean and standard deviation
    /// Note: values are clamped to be non-negative
    Normal { mean: f64, std_dev: f64 },
    /// Exponential delay with the given mean (lambda = 1/mean)
    Exponential { mean: f64 },
}

impl TransmitDistribution {
    /// Creates a fixed-interval distribution.
    pub fn deterministic(value: SimTime) -> Self {
        TransmitDistribution::Deterministic { value }
    }

    /// Samples the next inter-sample delay.
    ///
    /// `Deterministic` never draws from `rng`.
    pub fn next_value(&self, rng: &mut dyn RandomSource) -> SimTime {
        match self {
            TransmitDistribution::Deterministic { value } => *value,
            TransmitDistribution::Uniform { min, max } => {
                if min >= max {
                    return *min;
                }
                let span = (max - min) as f64 + 1.0;
                let offset = (rng.next_unit() * span).floor() as SimTime;
                min.saturating_add(offset.min(max - min))
            }
            TransmitDistribution::Normal { mean, std_dev } => {
                // Box-Muller transform
                let u1 = (1.0 - rng.next_unit()).max(1e-10);
                let u2 = rng.next_unit();
                let z0 = (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos();
                let value = mean + std_dev * z0;
                value.max(0.0).round() as SimTime
            }
            TransmitDistribution::Exponential { mean } => {
                let u = (1.0 - rng.next_unit()).max(1e-10);
                let value = -mean * u.ln();
                value.max(0.0).round() as SimTime
            }
        }
    }

    /// Returns the expected delay between samples.
    pub fn mean_interval(&self) -> f64 {
        match self {
            TransmitDistribution::Deterministic { value } => *value as f64,
            TransmitDistribution::Uniform { min, max } => (*min as f64 + *max as f64) / 2.0,
            TransmitDistribution::Normal { mean, .. } => mean.max(0.0),
            TransmitDistribution::Exponential { mean } => *mean,
        }
    }

    /// Checks the parameters, returning a description of the first problem.
    pub fn validate(&self) -> Result<(), String> {
        match self {
            TransmitDistribution::Deterministic { .. } => Ok(()),
            TransmitDistribution::Uniform { min, max } if min > max => Err(format!(
                "uniform distribution has min {} greater than max {}",
                min, max
            )),
            TransmitDistribution::Uniform { .. } => Ok(()),
            TransmitDistribution::Normal { mean, std_dev } => {
                if !mean.is_finite() || !std_dev.is_finite() || *std_dev < 0.0 {
                    Err(format!(
                        "normal distribution needs finite mean and non-negative std_dev, got mean={} std_dev={}",
                        mean, std_dev
                    ))
                } else {
                    Ok(())
                }
            }
            TransmitDistribution::Exponential { mean } => {
                if !mean.is_finite() || *mean <= 0.0 {
                    Err(format!("exponential distribution needs a positive mean, got {}", mean))
                } else {
                    Ok(())
                }
            }
        }
    }
}

impl Default for TransmitDistribution {
    fn default() -> Self {
        TransmitDistribution::Deterministic { value: 5 }
    }
}
