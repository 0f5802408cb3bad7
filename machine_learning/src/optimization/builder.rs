use comms::specs::optimizer::OptimizerSpec;

use super::MiniBatchSgd;
use crate::backend::{ForwardAccumulation, GradientBackend};

/// Builds optimizers given a specification.
#[derive(Default)]
pub struct OptimizerBuilder;

impl OptimizerBuilder {
    /// Creates a new `OptimizerBuilder`.
    pub fn new() -> Self {
        Self
    }

    /// Builds a new optimizer following a spec, backed by forward accumulation.
    ///
    /// # Arguments
    /// * `spec` - The specification for the optimizer.
    pub fn build(&self, spec: OptimizerSpec) -> MiniBatchSgd<ForwardAccumulation> {
        self.build_with(spec, ForwardAccumulation::new())
    }

    /// Builds a new optimizer following a spec, computing its gradients with `backend`.
    ///
    /// # Arguments
    /// * `spec` - The specification for the optimizer.
    /// * `backend` - The gradient backend.
    pub fn build_with<B>(&self, spec: OptimizerSpec, backend: B) -> MiniBatchSgd<B>
    where
        B: GradientBackend,
    {
        match spec {
            OptimizerSpec::MiniBatchSgd { .. } => MiniBatchSgd::from_spec(backend, spec),
        }
    }
}
