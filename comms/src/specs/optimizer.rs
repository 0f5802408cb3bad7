use std::num::NonZeroUsize;

use serde::{Deserialize, Serialize};

/// The specification for the worker's local step optimizer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OptimizerSpec {
    MiniBatchSgd {
        learning_rate: f32,
        epsilon: f32,
        batch_size: NonZeroUsize,
        max_iterations: usize,
    },
}
