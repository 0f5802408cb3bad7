use std::sync::Arc;

use comms::{
    NodeId,
    specs::{
        model::{ConstantSpec, ModelSpec},
        optimizer::OptimizerSpec,
    },
};
use log::info;

use crate::{
    MlErr, Result,
    backend::GradientBackend,
    feed::{FeedDict, ParamMap},
    graph::{FlatGraph, Op},
    optimization::IterativeOptimizer,
};

/// A computation graph together with the values of its variables and constants.
#[derive(Debug, Clone, PartialEq)]
pub struct Model {
    graph: Arc<FlatGraph>,
    variable_ids: Vec<NodeId>,
    variables: ParamMap,
    constants: ParamMap,
    loss_id: NodeId,
}

impl Model {
    /// Creates a new `Model`.
    ///
    /// # Arguments
    /// * `graph` - The validated graph.
    /// * `variables` - The initial value of every variable node.
    /// * `constants` - The value of every constant node.
    /// * `loss_id` - The id of the loss node.
    ///
    /// # Returns
    /// The model or an error if the ids don't match the kinds of the graph's nodes.
    pub fn new(
        graph: FlatGraph,
        variables: ParamMap,
        constants: ParamMap,
        loss_id: NodeId,
    ) -> Result<Self> {
        expect_op(&graph, loss_id, Op::Loss)?;

        if variables.is_empty() {
            return Err(MlErr::MissingVariables);
        }

        for &id in variables.keys() {
            expect_op(&graph, id, Op::Variable)?;
        }

        for &id in constants.keys() {
            expect_op(&graph, id, Op::Constant)?;
        }

        Ok(Self {
            graph: Arc::new(graph),
            variable_ids: variables.keys().copied().collect(),
            variables,
            constants,
            loss_id,
        })
    }

    /// Rebuilds a model out of the `set:model` message.
    ///
    /// # Returns
    /// The model, or an error if the graph is invalid or the variable values don't match
    /// the variable ids.
    pub fn from_spec(spec: &ModelSpec) -> Result<Self> {
        if spec.variable_ids.len() != spec.variable_init.len() {
            return Err(MlErr::SizeMismatch {
                a: "variable ids",
                b: "variable values",
                got: spec.variable_init.len(),
                expected: spec.variable_ids.len(),
            });
        }

        let graph = FlatGraph::try_from(spec.graph.as_slice())?;
        let variables = spec
            .variable_ids
            .iter()
            .copied()
            .zip(spec.variable_init.iter().copied())
            .collect();
        let constants = spec.constants.iter().map(|c| (c.id, c.value)).collect();

        Self::new(graph, variables, constants, spec.loss_id)
    }

    /// Builds the `set:model` payload for a worker.
    ///
    /// # Arguments
    /// * `worker_id` - The id of the receiving worker.
    /// * `optimizer` - The optimizer the worker should run.
    /// * `feed` - The worker's data partition.
    pub fn to_spec(
        &self,
        worker_id: usize,
        optimizer: OptimizerSpec,
        feed: &FeedDict,
    ) -> ModelSpec {
        ModelSpec {
            worker_id,
            optimizer,
            graph: self.graph.to_spec(),
            variable_ids: self.variable_ids.clone(),
            loss_id: self.loss_id,
            feeds: feed.to_spec(),
            variable_init: self.variable_vec(),
            constants: self
                .constants
                .iter()
                .map(|(&id, &value)| ConstantSpec { id, value })
                .collect(),
        }
    }

    pub fn graph(&self) -> &FlatGraph {
        &self.graph
    }

    /// Returns a shared handle to the graph.
    pub fn graph_arc(&self) -> Arc<FlatGraph> {
        Arc::clone(&self.graph)
    }

    /// The ids of the variables, in ascending order.
    pub fn variable_ids(&self) -> &[NodeId] {
        &self.variable_ids
    }

    pub fn variables(&self) -> &ParamMap {
        &self.variables
    }

    /// The variable values ordered as `variable_ids`.
    pub fn variable_vec(&self) -> Vec<f32> {
        self.variables.values().copied().collect()
    }

    pub fn constants(&self) -> &ParamMap {
        &self.constants
    }

    pub fn loss_id(&self) -> NodeId {
        self.loss_id
    }

    /// Overwrites the value of the given variables, ignoring ids that aren't variables
    /// of this model.
    pub fn set_variables(&mut self, values: &ParamMap) {
        for (id, value) in self.variables.iter_mut() {
            if let Some(&new) = values.get(id) {
                *value = new;
            }
        }
    }

    /// Optimizes the model on a single process until every variable converges, storing
    /// the results back into the model.
    ///
    /// # Arguments
    /// * `optimizer` - The optimizer to bind the model to.
    /// * `feed` - The whole dataset.
    pub fn optimize<O>(&mut self, optimizer: &mut O, feed: FeedDict) -> Result<()>
    where
        O: IterativeOptimizer,
    {
        optimizer.init_optimizer(
            self.graph_arc(),
            feed,
            self.constants.clone(),
            self.variable_ids.clone(),
            self.loss_id,
        )?;

        let values = optimizer.optimize(&self.variables)?;
        self.set_variables(&values);

        info!("model optimized: variables={:?}", self.variables);
        Ok(())
    }

    /// Evaluates `node` for every row of `feed` with the current variable values.
    pub fn eval<B>(&self, backend: &B, node: NodeId, feed: &FeedDict) -> Result<Vec<f32>>
    where
        B: GradientBackend,
    {
        backend.init(&self.graph.ops())?;
        backend.values(
            &self.graph,
            node,
            &feed.as_batch(),
            &self.variables,
            &self.constants,
        )
    }
}

fn expect_op(graph: &FlatGraph, id: NodeId, expected: Op) -> Result<()> {
    let got = graph.node(id)?.op;

    if got != expected {
        return Err(MlErr::WrongOp {
            node: id,
            got,
            expected,
        });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use std::num::NonZeroUsize;

    use super::*;
    use crate::graph::GraphBuilder;

    fn linear() -> (Model, NodeId, NodeId) {
        let mut gb = GraphBuilder::new();
        let x = gb.feeder();
        let theta = gb.variable(5.);
        let bias = gb.constant(0.5);
        let mul = gb.mul(x, theta);
        let out = gb.add(mul, bias);
        gb.loss(out).unwrap();

        (gb.build().unwrap(), x, theta)
    }

    #[test]
    fn spec_conversion_keeps_the_model() {
        let (model, x, _) = linear();
        let feed = FeedDict::from_iter([(x, vec![1., 2.])]);
        let optimizer = OptimizerSpec::MiniBatchSgd {
            learning_rate: 0.1,
            epsilon: 0.001,
            batch_size: NonZeroUsize::new(2).unwrap(),
            max_iterations: 10,
        };

        let spec = model.to_spec(3, optimizer, &feed);
        assert_eq!(spec.worker_id, 3);
        assert_eq!(FeedDict::from(spec.feeds.as_slice()), feed);
        assert_eq!(Model::from_spec(&spec).unwrap(), model);
    }

    #[test]
    fn from_spec_rejects_bad_ids() {
        let (model, x, _) = linear();
        let optimizer = OptimizerSpec::MiniBatchSgd {
            learning_rate: 0.1,
            epsilon: 0.001,
            batch_size: NonZeroUsize::new(2).unwrap(),
            max_iterations: 10,
        };

        let mut spec = model.to_spec(0, optimizer, &FeedDict::new());
        spec.variable_init.push(1.);
        assert!(matches!(
            Model::from_spec(&spec),
            Err(MlErr::SizeMismatch { got: 2, expected: 1, .. })
        ));

        let mut spec = model.to_spec(0, optimizer, &FeedDict::new());
        spec.loss_id = x;
        assert_eq!(
            Model::from_spec(&spec),
            Err(MlErr::WrongOp {
                node: x,
                got: Op::Feeder,
                expected: Op::Loss
            })
        );
    }

    #[test]
    fn set_variables_ignores_unknown_ids() {
        let (mut model, x, theta) = linear();
        model.set_variables(&ParamMap::from([(theta, 1.5), (x, 9.)]));

        assert_eq!(model.variables(), &ParamMap::from([(theta, 1.5)]));
    }
}
