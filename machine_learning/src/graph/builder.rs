use std::collections::BTreeMap;

use comms::NodeId;

use super::{FlatGraph, FlatNode, Op};
use crate::{MlErr, Result, model::Model};

/// The build context of a computation graph.
///
/// Every node constructor takes the context explicitly and returns the id of the new node,
/// the finished graph is turned into a `Model` through `build`.
///
/// ```
/// use machine_learning::graph::GraphBuilder;
///
/// let mut b = GraphBuilder::new();
/// let x = b.feeder();
/// let y = b.feeder();
/// let theta = b.variable(5.0);
///
/// let model = b.mul(x, theta);
/// let diff = b.sub(model, y);
/// let square = b.mul(diff, diff);
/// b.loss(square).unwrap();
///
/// let model = b.build().unwrap();
/// assert_eq!(model.variable_ids(), &[theta]);
/// ```
#[derive(Debug, Default)]
pub struct GraphBuilder {
    next_id: NodeId,
    nodes: BTreeMap<NodeId, FlatNode>,
    variables: BTreeMap<NodeId, f32>,
    constants: BTreeMap<NodeId, f32>,
    loss: Option<NodeId>,
}

impl GraphBuilder {
    /// Creates a new empty `GraphBuilder`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a placeholder for external data supplied per example.
    pub fn feeder(&mut self) -> NodeId {
        self.push(Op::Feeder, &[])
    }

    /// Adds a trainable scalar starting at `init`.
    pub fn variable(&mut self, init: f32) -> NodeId {
        let id = self.push(Op::Variable, &[]);
        self.variables.insert(id, init);
        id
    }

    /// Adds a fixed scalar.
    pub fn constant(&mut self, value: f32) -> NodeId {
        let id = self.push(Op::Constant, &[]);
        self.constants.insert(id, value);
        id
    }

    pub fn add(&mut self, a: NodeId, b: NodeId) -> NodeId {
        self.push(Op::Add, &[a, b])
    }

    pub fn sub(&mut self, a: NodeId, b: NodeId) -> NodeId {
        self.push(Op::Sub, &[a, b])
    }

    pub fn mul(&mut self, a: NodeId, b: NodeId) -> NodeId {
        self.push(Op::Mul, &[a, b])
    }

    pub fn div(&mut self, a: NodeId, b: NodeId) -> NodeId {
        self.push(Op::Div, &[a, b])
    }

    /// `base` raised to `exponent`, both being nodes.
    pub fn pow(&mut self, base: NodeId, exponent: NodeId) -> NodeId {
        self.push(Op::Pow, &[base, exponent])
    }

    pub fn sqrt(&mut self, a: NodeId) -> NodeId {
        self.push(Op::Sqrt, &[a])
    }

    pub fn exp(&mut self, a: NodeId) -> NodeId {
        self.push(Op::Exp, &[a])
    }

    pub fn ln(&mut self, a: NodeId) -> NodeId {
        self.push(Op::Ln, &[a])
    }

    pub fn logistic(&mut self, a: NodeId) -> NodeId {
        self.push(Op::Logistic, &[a])
    }

    pub fn tanh(&mut self, a: NodeId) -> NodeId {
        self.push(Op::Tanh, &[a])
    }

    /// Marks `node` as the output to minimize.
    ///
    /// # Returns
    /// The id of the loss node or `DuplicateLoss` if the graph already has one.
    pub fn loss(&mut self, node: NodeId) -> Result<NodeId> {
        if let Some(first) = self.loss {
            return Err(MlErr::DuplicateLoss {
                first,
                second: self.next_id,
            });
        }

        let id = self.push(Op::Loss, &[node]);
        self.loss = Some(id);
        Ok(id)
    }

    /// Finishes the graph definition.
    ///
    /// # Returns
    /// The model or a configuration error if the loss or the variables are missing,
    /// or if the graph references unknown nodes.
    pub fn build(self) -> Result<Model> {
        let Self {
            nodes,
            variables,
            constants,
            loss,
            ..
        } = self;

        let loss_id = loss.ok_or(MlErr::MissingLoss)?;
        if variables.is_empty() {
            return Err(MlErr::MissingVariables);
        }

        let graph = FlatGraph::new(nodes)?;
        Model::new(graph, variables, constants, loss_id)
    }

    fn push(&mut self, op: Op, input_ids: &[NodeId]) -> NodeId {
        let id = self.next_id;
        self.next_id += 1;

        for input in input_ids {
            let Some(node) = self.nodes.get_mut(input) else {
                continue;
            };

            if !node.output_ids.contains(&id) {
                node.output_ids.push(id);
            }
        }

        let node = FlatNode {
            op,
            input_ids: input_ids.to_vec(),
            output_ids: Vec::new(),
        };

        self.nodes.insert(id, node);
        id
    }
}
