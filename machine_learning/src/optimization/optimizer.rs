use std::sync::Arc;

use comms::NodeId;

use crate::{
    Result,
    feed::{FeedDict, ParamMap},
    graph::FlatGraph,
};

/// A single-process optimizer that improves the variables of a graph in rounds.
pub trait IterativeOptimizer {
    /// Binds the inputs that stay fixed for every following step, overwriting any
    /// previous binding.
    ///
    /// # Arguments
    /// * `graph` - The graph to optimize.
    /// * `feed` - The dataset batches are drawn from.
    /// * `constants` - The value of every constant node.
    /// * `variable_ids` - The variables to optimize.
    /// * `loss_id` - The node to minimize.
    fn init_optimizer(
        &mut self,
        graph: Arc<FlatGraph>,
        feed: FeedDict,
        constants: ParamMap,
        variable_ids: Vec<NodeId>,
        loss_id: NodeId,
    ) -> Result<()>;

    /// Resets the state of every variable to the values in `variables` and runs exactly
    /// `iterations` rounds.
    ///
    /// # Returns
    /// The resulting value of every bound variable.
    fn optimize_step(&mut self, variables: &ParamMap, iterations: usize) -> Result<ParamMap>;

    /// Resets the state of every variable to the values in `variables` and runs rounds until
    /// all of them have converged.
    fn optimize(&mut self, variables: &ParamMap) -> Result<ParamMap>;

    /// Whether every variable has converged.
    fn has_converged(&self) -> bool;
}
