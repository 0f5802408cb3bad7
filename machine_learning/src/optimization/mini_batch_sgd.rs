use std::{collections::BTreeMap, num::NonZeroUsize, ops::Range, sync::Arc};

use comms::{NodeId, specs::optimizer::OptimizerSpec};
use log::debug;

use super::{IterativeOptimizer, VariableState};
use crate::{
    MlErr, Result,
    backend::{GradientBackend, ReduceStrategy, Reduced},
    feed::{FeedDict, ParamMap},
    graph::{FlatGraph, Op},
};

/// Mini-batch stochastic gradient descent.
///
/// Every round draws the next `batch_size` rows of the bound feed, averages the gradient of
/// the loss over them and steps each non-converged variable against it.
pub struct MiniBatchSgd<B: GradientBackend> {
    backend: B,
    learning_rate: f32,
    epsilon: f32,
    batch_size: NonZeroUsize,
    max_iterations: usize,
    binding: Option<Binding>,
    states: BTreeMap<NodeId, VariableState>,
}

/// The inputs bound by `init_optimizer`.
struct Binding {
    graph: Arc<FlatGraph>,
    feed: FeedDict,
    constants: ParamMap,
    variable_ids: Vec<NodeId>,
    loss_id: NodeId,
    offset: usize,
}

impl Binding {
    /// The next cyclic batch, restarting from the first row once the end is reached.
    fn next_batch(&mut self, batch_size: NonZeroUsize) -> Range<usize> {
        let start = self.offset;
        let end = start + batch_size.get();

        self.offset = if end >= self.feed.len() { 0 } else { end };
        start..end
    }
}

impl<B: GradientBackend> MiniBatchSgd<B> {
    /// Creates a new `MiniBatchSgd`.
    ///
    /// # Arguments
    /// * `backend` - The engine used to compute the gradients.
    /// * `learning_rate` - The factor applied to the gradient on each step.
    /// * `epsilon` - A variable converges once a step moves it at most this much.
    /// * `batch_size` - The amount of rows used per round.
    /// * `max_iterations` - A variable converges after this many steps regardless of epsilon.
    pub fn new(
        backend: B,
        learning_rate: f32,
        epsilon: f32,
        batch_size: NonZeroUsize,
        max_iterations: usize,
    ) -> Self {
        Self {
            backend,
            learning_rate,
            epsilon,
            batch_size,
            max_iterations,
            binding: None,
            states: BTreeMap::new(),
        }
    }

    /// Creates a new `MiniBatchSgd` following its wire specification.
    pub fn from_spec(backend: B, spec: OptimizerSpec) -> Self {
        let OptimizerSpec::MiniBatchSgd {
            learning_rate,
            epsilon,
            batch_size,
            max_iterations,
        } = spec;

        Self::new(backend, learning_rate, epsilon, batch_size, max_iterations)
    }

    /// Returns the state of every variable as of the last round.
    pub fn variable_states(&self) -> &BTreeMap<NodeId, VariableState> {
        &self.states
    }

    /// Returns the current value of every variable.
    pub fn variable_values(&self) -> ParamMap {
        self.states
            .iter()
            .map(|(&id, state)| (id, state.current_value))
            .collect()
    }

    fn reset_states(&mut self, variables: &ParamMap) -> Result<()> {
        let binding = self.binding.as_ref().ok_or(MlErr::OptimizerNotInitialized)?;

        self.states = binding
            .variable_ids
            .iter()
            .map(|&id| {
                let value = variables.get(&id).copied().ok_or(MlErr::MissingValue {
                    node: id,
                    op: Op::Variable,
                })?;

                Ok((id, VariableState::new(value)))
            })
            .collect::<Result<_>>()?;

        Ok(())
    }

    fn round(&mut self) -> Result<()> {
        let binding = self.binding.as_mut().ok_or(MlErr::OptimizerNotInitialized)?;

        let range = binding.next_batch(self.batch_size);
        let batch = binding.feed.batch(range);
        let variables: ParamMap = self
            .states
            .iter()
            .map(|(&id, state)| (id, state.current_value))
            .collect();

        let gradients = self.backend.gradients(
            &binding.graph,
            binding.loss_id,
            &batch,
            &variables,
            &binding.constants,
            ReduceStrategy::Avg,
        )?;

        for (&id, state) in self.states.iter_mut() {
            let gradient = gradients
                .get(&id)
                .and_then(Reduced::scalar)
                .ok_or(MlErr::NonScalarGradient { node: id })?;

            let value = state.current_value - self.learning_rate * gradient;
            state.advance(value, self.epsilon, self.max_iterations);
        }

        Ok(())
    }
}

impl<B: GradientBackend> IterativeOptimizer for MiniBatchSgd<B> {
    fn init_optimizer(
        &mut self,
        graph: Arc<FlatGraph>,
        feed: FeedDict,
        constants: ParamMap,
        variable_ids: Vec<NodeId>,
        loss_id: NodeId,
    ) -> Result<()> {
        self.backend.init(&graph.ops())?;

        let loss = graph.node(loss_id)?;
        if loss.op != Op::Loss {
            return Err(MlErr::WrongOp {
                node: loss_id,
                got: loss.op,
                expected: Op::Loss,
            });
        }

        if variable_ids.is_empty() {
            return Err(MlErr::MissingVariables);
        }

        for &id in &variable_ids {
            let node = graph.node(id)?;
            if node.op != Op::Variable {
                return Err(MlErr::WrongOp {
                    node: id,
                    got: node.op,
                    expected: Op::Variable,
                });
            }
        }

        if feed.is_empty() {
            return Err(MlErr::EmptyFeed);
        }

        debug!(rows = feed.len(), variables = variable_ids.len(); "optimizer bound");

        self.binding = Some(Binding {
            graph,
            feed,
            constants,
            variable_ids,
            loss_id,
            offset: 0,
        });
        self.states.clear();

        Ok(())
    }

    fn optimize_step(&mut self, variables: &ParamMap, iterations: usize) -> Result<ParamMap> {
        self.reset_states(variables)?;

        for _ in 0..iterations {
            self.round()?;
        }

        Ok(self.variable_values())
    }

    fn optimize(&mut self, variables: &ParamMap) -> Result<ParamMap> {
        self.reset_states(variables)?;

        let mut rounds = 0;
        while !self.has_converged() {
            self.round()?;
            rounds += 1;
        }

        debug!(rounds = rounds; "optimizer converged");
        Ok(self.variable_values())
    }

    fn has_converged(&self) -> bool {
        self.states.values().all(|state| state.converged)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{backend::ForwardAccumulation, graph::GraphBuilder, model::Model};

    fn nz(n: usize) -> NonZeroUsize {
        NonZeroUsize::new(n).unwrap()
    }

    // loss = (theta * x - y)^2
    fn quadratic(init: f32) -> (Model, NodeId, NodeId) {
        let mut gb = GraphBuilder::new();
        let x = gb.feeder();
        let y = gb.feeder();
        let theta = gb.variable(init);
        let model = gb.mul(theta, x);
        let diff = gb.sub(model, y);
        let square = gb.mul(diff, diff);
        gb.loss(square).unwrap();

        (gb.build().unwrap(), x, y)
    }

    fn bound(
        lr: f32,
        eps: f32,
        batch: usize,
        max: usize,
    ) -> (MiniBatchSgd<ForwardAccumulation>, Model) {
        let (model, x, y) = quadratic(5.);
        let feed = FeedDict::from_iter([(x, vec![1., 2., 3.]), (y, vec![2., 4., 6.])]);

        let mut sgd = MiniBatchSgd::new(ForwardAccumulation, lr, eps, nz(batch), max);
        sgd.init_optimizer(
            model.graph_arc(),
            feed,
            model.constants().clone(),
            model.variable_ids().to_vec(),
            model.loss_id(),
        )
        .unwrap();

        (sgd, model)
    }

    #[test]
    fn stepping_before_binding_fails() {
        let mut sgd = MiniBatchSgd::new(ForwardAccumulation, 0.1, 0.001, nz(1), 10);
        let err = sgd.optimize_step(&ParamMap::new(), 1).unwrap_err();
        assert_eq!(err, MlErr::OptimizerNotInitialized);
    }

    #[test]
    fn converged_variables_are_not_mutated() {
        let (mut sgd, model) = bound(0.1, 0.5, 3, 400);
        let theta = model.variable_ids()[0];

        let short = sgd.optimize_step(model.variables(), 2).unwrap();
        assert!(sgd.has_converged());

        let long = sgd.optimize_step(model.variables(), 50).unwrap();
        assert_eq!(short, long);
        assert_eq!(sgd.variable_states()[&theta].iterations, 2);
    }

    #[test]
    fn steps_shrink_until_convergence() {
        let (mut sgd, model) = bound(0.05, 1e-4, 3, 400);
        let theta = model.variable_ids()[0];

        let mut value = model.variables()[&theta];
        let mut last_delta = f32::INFINITY;

        let mut current = model.variables().clone();
        for _ in 0..400 {
            current = sgd.optimize_step(&current, 1).unwrap();
            let delta = (current[&theta] - value).abs();
            value = current[&theta];

            if sgd.has_converged() {
                break;
            }

            assert!(delta < last_delta);
            last_delta = delta;
        }

        assert!((value - 2.).abs() < 0.01);
    }

    #[test]
    fn batches_wrap_around_the_feed() {
        let (mut sgd, model) = bound(0.01, 0., 2, 400);
        sgd.optimize_step(model.variables(), 1).unwrap();
        assert_eq!(sgd.binding.as_ref().unwrap().offset, 2);

        sgd.optimize_step(model.variables(), 1).unwrap();
        assert_eq!(sgd.binding.as_ref().unwrap().offset, 0);
    }

    #[test]
    fn binding_validates_its_inputs() {
        let (model, x, _) = quadratic(1.);
        let feed = FeedDict::from_iter([(x, vec![1.])]);
        let mut sgd = MiniBatchSgd::new(ForwardAccumulation, 0.1, 0.001, nz(1), 10);

        let err = sgd
            .init_optimizer(
                model.graph_arc(),
                feed,
                ParamMap::new(),
                vec![x],
                model.loss_id(),
            )
            .unwrap_err();
        assert_eq!(
            err,
            MlErr::WrongOp {
                node: x,
                got: Op::Feeder,
                expected: Op::Variable
            }
        );

        let err = sgd
            .init_optimizer(
                model.graph_arc(),
                FeedDict::new(),
                ParamMap::new(),
                model.variable_ids().to_vec(),
                model.loss_id(),
            )
            .unwrap_err();
        assert_eq!(err, MlErr::EmptyFeed);
    }
}
