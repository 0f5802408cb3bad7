use std::collections::{BTreeMap, HashMap};

use comms::NodeId;
use rayon::prelude::*;

use super::{Dual, GradientBackend, ReduceStrategy, Reduced, kernel};
use crate::{
    MlErr, Result,
    feed::{Batch, ParamMap},
    graph::{FlatGraph, Op},
};

/// Forward-mode automatic differentiation.
///
/// Each row is swept once per variable, seeding that variable's dual part. The sweeps of
/// different variables are independent and run in parallel.
#[derive(Debug, Clone, Copy, Default)]
pub struct ForwardAccumulation;

impl ForwardAccumulation {
    /// Creates a new `ForwardAccumulation` backend.
    pub fn new() -> Self {
        Self
    }
}

impl GradientBackend for ForwardAccumulation {
    fn supports(&self, op: Op) -> bool {
        op.is_source() || kernel(op).is_some()
    }

    fn values(
        &self,
        graph: &FlatGraph,
        target: NodeId,
        feed: &Batch<'_>,
        variables: &ParamMap,
        constants: &ParamMap,
    ) -> Result<Vec<f32>> {
        let sweep = Sweep::new(graph, target, feed, variables, constants)?;

        (0..feed.rows())
            .map(|row| sweep.run(row, None).map(|value| value.real))
            .collect()
    }

    fn gradients(
        &self,
        graph: &FlatGraph,
        target: NodeId,
        feed: &Batch<'_>,
        variables: &ParamMap,
        constants: &ParamMap,
        reduce: ReduceStrategy,
    ) -> Result<BTreeMap<NodeId, Reduced>> {
        if feed.rows() == 0 {
            return Err(MlErr::EmptyFeed);
        }

        let sweep = Sweep::new(graph, target, feed, variables, constants)?;
        let variable_ids: Vec<_> = variables.keys().copied().collect();

        variable_ids
            .par_iter()
            .map(|&id| -> Result<(NodeId, Reduced)> {
                let per_row = (0..feed.rows())
                    .map(|row| sweep.run(row, Some(id)).map(|value| value.dual))
                    .collect::<Result<Vec<_>>>()?;

                Ok((id, reduce.reduce(per_row)))
            })
            .collect()
    }
}

/// The evaluation of one target over one batch.
struct Sweep<'a> {
    graph: &'a FlatGraph,
    order: Vec<NodeId>,
    feed: &'a Batch<'a>,
    variables: &'a ParamMap,
    constants: &'a ParamMap,
}

impl<'a> Sweep<'a> {
    fn new(
        graph: &'a FlatGraph,
        target: NodeId,
        feed: &'a Batch<'a>,
        variables: &'a ParamMap,
        constants: &'a ParamMap,
    ) -> Result<Self> {
        Ok(Self {
            graph,
            order: graph.eval_order(target)?,
            feed,
            variables,
            constants,
        })
    }

    /// Evaluates the target at `row`, differentiating against `seed` if given.
    fn run(&self, row: usize, seed: Option<NodeId>) -> Result<Dual> {
        let mut values: HashMap<NodeId, Dual> = HashMap::with_capacity(self.order.len());
        let mut last = Dual::default();

        for &id in &self.order {
            let node = self.graph.node(id)?;
            let missing = MlErr::MissingValue { node: id, op: node.op };

            let value = match node.op {
                Op::Feeder => {
                    let value = self.feed.value(id, row).ok_or(missing)?;
                    Dual::constant(value)
                }
                Op::Constant => {
                    let value = self.constants.get(&id).copied().ok_or(missing)?;
                    Dual::constant(value)
                }
                Op::Variable => {
                    let value = self.variables.get(&id).copied().ok_or(missing)?;

                    if seed == Some(id) {
                        Dual::seed(value)
                    } else {
                        Dual::constant(value)
                    }
                }
                op => {
                    let kernel = kernel(op).ok_or(missing)?;
                    let inputs = node
                        .input_ids
                        .iter()
                        .map(|&input| {
                            values
                                .get(&input)
                                .copied()
                                .ok_or(MlErr::UnknownNode { node: input })
                        })
                        .collect::<Result<Vec<_>>>()?;

                    kernel(&inputs)
                }
            };

            values.insert(id, value);
            last = value;
        }

        Ok(last)
    }
}
