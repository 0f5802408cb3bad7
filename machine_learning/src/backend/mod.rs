mod dual;
mod forward;
mod kernel;
mod reduce;

use std::collections::{BTreeMap, BTreeSet};

use comms::NodeId;

pub use dual::Dual;
pub use forward::ForwardAccumulation;
pub use kernel::{Kernel, kernel};
pub use reduce::{ReduceStrategy, Reduced};

use crate::{
    MlErr, Result,
    feed::{Batch, ParamMap},
    graph::{FlatGraph, Op},
};

/// An engine that evaluates flattened graphs.
///
/// Backends hold no per-call state, every call receives the whole graph and its inputs.
pub trait GradientBackend: Send + Sync {
    /// Whether the backend knows how to evaluate `op`.
    fn supports(&self, op: Op) -> bool;

    /// Checks that every operator in `ops` is supported.
    ///
    /// # Returns
    /// `UnsupportedOps` with the operators the backend lacks.
    fn init(&self, ops: &BTreeSet<Op>) -> Result<()> {
        let missing: Vec<_> = ops.iter().copied().filter(|&op| !self.supports(op)).collect();

        if !missing.is_empty() {
            return Err(MlErr::UnsupportedOps(missing));
        }

        Ok(())
    }

    /// Evaluates `target` for every row of `feed`.
    ///
    /// # Arguments
    /// * `graph` - The graph to evaluate.
    /// * `target` - The node whose value is wanted.
    /// * `feed` - The rows of the feeder nodes.
    /// * `variables` - The current value of every variable.
    /// * `constants` - The value of every constant.
    fn values(
        &self,
        graph: &FlatGraph,
        target: NodeId,
        feed: &Batch<'_>,
        variables: &ParamMap,
        constants: &ParamMap,
    ) -> Result<Vec<f32>>;

    /// Differentiates `target` with respect to every variable in `variables` for each row of
    /// `feed`, collapsing the per-row values with `reduce`.
    ///
    /// # Returns
    /// The reduced gradient of each variable or `EmptyFeed` if `feed` has no rows.
    fn gradients(
        &self,
        graph: &FlatGraph,
        target: NodeId,
        feed: &Batch<'_>,
        variables: &ParamMap,
        constants: &ParamMap,
        reduce: ReduceStrategy,
    ) -> Result<BTreeMap<NodeId, Reduced>>;
}
