use std::{fs, num::NonZeroUsize, path::Path};

use comms::specs::optimizer::OptimizerSpec;
use serde::{Deserialize, Serialize};

use crate::error::{MasterErr, Result};

/// The configuration of a distributed run.
///
/// ```json
/// {
///     "worker_addrs": ["127.0.0.1:9000", "127.0.0.1:9001"],
///     "learning_rate": 0.1,
///     "epsilon": 0.001,
///     "batch_size": 3,
///     "max_iterations": 400,
///     "steps": 5
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DownpourConfig {
    pub worker_addrs: Vec<String>,
    pub learning_rate: f32,
    pub epsilon: f32,
    #[serde(default = "default_batch_size")]
    pub batch_size: NonZeroUsize,
    /// Global iteration budget, summed over every worker's rounds.
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,
    /// Local steps per `run:optimize`.
    #[serde(default = "default_steps")]
    pub steps: NonZeroUsize,
}

fn default_batch_size() -> NonZeroUsize {
    NonZeroUsize::new(32).unwrap_or(NonZeroUsize::MIN)
}

fn default_max_iterations() -> usize {
    1000
}

fn default_steps() -> NonZeroUsize {
    NonZeroUsize::new(5).unwrap_or(NonZeroUsize::MIN)
}

impl DownpourConfig {
    /// Creates a new `DownpourConfig` with the default batch size, iteration budget and
    /// steps per round.
    ///
    /// # Arguments
    /// * `worker_addrs` - The addresses of the workers.
    /// * `learning_rate` - The learning rate of every worker's optimizer.
    /// * `epsilon` - The convergence threshold of every worker's optimizer.
    pub fn new(worker_addrs: Vec<String>, learning_rate: f32, epsilon: f32) -> Self {
        Self {
            worker_addrs,
            learning_rate,
            epsilon,
            batch_size: default_batch_size(),
            max_iterations: default_max_iterations(),
            steps: default_steps(),
        }
    }

    /// Parses a JSON configuration.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Reads a JSON configuration file.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let json = fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    /// Checks the values can drive a run.
    pub fn validate(&self) -> Result<()> {
        if self.worker_addrs.is_empty() {
            return Err(MasterErr::InvalidConfig(
                "at least one worker address is required".into(),
            ));
        }

        if !self.learning_rate.is_finite() || self.learning_rate <= 0. {
            return Err(MasterErr::InvalidConfig(format!(
                "learning rate must be positive and finite, got {}",
                self.learning_rate
            )));
        }

        if self.epsilon.is_nan() || self.epsilon < 0. {
            return Err(MasterErr::InvalidConfig(format!(
                "epsilon must be non-negative, got {}",
                self.epsilon
            )));
        }

        Ok(())
    }

    /// The optimizer every worker runs.
    pub fn optimizer_spec(&self) -> OptimizerSpec {
        OptimizerSpec::MiniBatchSgd {
            learning_rate: self.learning_rate,
            epsilon: self.epsilon,
            batch_size: self.batch_size,
            max_iterations: self.max_iterations,
        }
    }
}
