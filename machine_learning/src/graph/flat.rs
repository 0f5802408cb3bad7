use std::collections::{BTreeMap, BTreeSet, VecDeque};

use comms::{NodeId, specs::model::NodeSpec};

use super::Op;
use crate::{MlErr, Result};

/// A node of the flattened graph, its operator and its adjacency.
#[derive(Debug, Clone, PartialEq)]
pub struct FlatNode {
    pub op: Op,
    pub input_ids: Vec<NodeId>,
    pub output_ids: Vec<NodeId>,
}

/// The serializable, dependency-annotated representation of a computation graph.
///
/// A `FlatGraph` is always a valid DAG: the inputs match the operator arities, the
/// adjacency is consistent in both directions and there is at most one loss node.
#[derive(Debug, Clone, PartialEq)]
pub struct FlatGraph {
    nodes: BTreeMap<NodeId, FlatNode>,
}

impl FlatGraph {
    /// Creates a new `FlatGraph` validating its structure.
    ///
    /// # Arguments
    /// * `nodes` - The mapping from node id to node.
    ///
    /// # Returns
    /// The graph, or the first structural error found.
    pub fn new(nodes: BTreeMap<NodeId, FlatNode>) -> Result<Self> {
        let graph = Self { nodes };
        graph.validate()?;
        Ok(graph)
    }

    /// Returns the node with the given id.
    pub fn node(&self, id: NodeId) -> Result<&FlatNode> {
        self.nodes.get(&id).ok_or(MlErr::UnknownNode { node: id })
    }

    /// Returns an iterator over every node of the graph in id order.
    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &FlatNode)> {
        self.nodes.iter().map(|(&id, node)| (id, node))
    }

    /// Returns the ids of the nodes with operator `op`.
    pub fn ids_of(&self, op: Op) -> impl Iterator<Item = NodeId> + '_ {
        self.iter()
            .filter(move |(_, node)| node.op == op)
            .map(|(id, _)| id)
    }

    /// Returns the set of operators used in the graph.
    pub fn ops(&self) -> BTreeSet<Op> {
        self.nodes.values().map(|node| node.op).collect()
    }

    /// Returns the id of the loss node, if there is one.
    pub fn loss_id(&self) -> Option<NodeId> {
        self.ids_of(Op::Loss).next()
    }

    /// The amount of nodes in the graph.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the graph has no nodes.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Computes an evaluation order for `target`.
    ///
    /// Only the ancestors of `target` are visited, every node comes after all of its inputs
    /// and `target` is the last element.
    ///
    /// # Arguments
    /// * `target` - The node to evaluate.
    ///
    /// # Returns
    /// The evaluation order or `UnknownNode` if `target` isn't part of the graph.
    pub fn eval_order(&self, target: NodeId) -> Result<Vec<NodeId>> {
        self.node(target)?;

        let mut order = Vec::new();
        let mut visited = BTreeSet::new();
        let mut stack = vec![(target, false)];

        while let Some((id, expanded)) = stack.pop() {
            if expanded {
                order.push(id);
                continue;
            }

            if !visited.insert(id) {
                continue;
            }

            stack.push((id, true));

            for &input in self.node(id)?.input_ids.iter().rev() {
                if !visited.contains(&input) {
                    stack.push((input, false));
                }
            }
        }

        Ok(order)
    }

    /// Converts the graph into its wire representation.
    pub fn to_spec(&self) -> Vec<NodeSpec> {
        self.iter()
            .map(|(id, node)| NodeSpec {
                id,
                op: node.op.into(),
                input_ids: node.input_ids.clone(),
                output_ids: node.output_ids.clone(),
            })
            .collect()
    }

    // Arity and loss uniqueness are checked on every node before following any edge.
    fn validate(&self) -> Result<()> {
        let mut loss = None;

        for (id, node) in self.iter() {
            let expected = node.op.arity();
            if node.input_ids.len() != expected {
                return Err(MlErr::ArityMismatch {
                    node: id,
                    op: node.op,
                    got: node.input_ids.len(),
                    expected,
                });
            }

            if node.op == Op::Loss {
                if let Some(first) = loss {
                    return Err(MlErr::DuplicateLoss { first, second: id });
                }

                loss = Some(id);
            }
        }

        for (id, node) in self.iter() {
            for &input in &node.input_ids {
                if !self.node(input)?.output_ids.contains(&id) {
                    return Err(MlErr::InconsistentAdjacency { from: input, to: id });
                }
            }

            for &output in &node.output_ids {
                if !self.node(output)?.input_ids.contains(&id) {
                    return Err(MlErr::InconsistentAdjacency { from: id, to: output });
                }
            }
        }

        self.check_acyclic()
    }

    // Kahn's algorithm, counting edges through `input_ids` so repeated inputs
    // such as `x * x` are accounted for.
    fn check_acyclic(&self) -> Result<()> {
        let mut pending: BTreeMap<NodeId, usize> = self
            .iter()
            .map(|(id, node)| (id, node.input_ids.len()))
            .collect();

        let mut children: BTreeMap<NodeId, Vec<NodeId>> = BTreeMap::new();
        for (id, node) in self.iter() {
            for &input in &node.input_ids {
                children.entry(input).or_default().push(id);
            }
        }

        let mut ready: VecDeque<NodeId> = pending
            .iter()
            .filter(|&(_, &count)| count == 0)
            .map(|(&id, _)| id)
            .collect();

        let mut seen = 0;
        while let Some(id) = ready.pop_front() {
            seen += 1;

            for child in children.get(&id).into_iter().flatten() {
                if let Some(count) = pending.get_mut(child) {
                    *count -= 1;
                    if *count == 0 {
                        ready.push_back(*child);
                    }
                }
            }
        }

        if seen != self.nodes.len() {
            return Err(MlErr::CyclicGraph);
        }

        Ok(())
    }
}

impl TryFrom<&[NodeSpec]> for FlatGraph {
    type Error = MlErr;

    fn try_from(specs: &[NodeSpec]) -> Result<Self> {
        let mut nodes = BTreeMap::new();

        for spec in specs {
            let node = FlatNode {
                op: spec.op.into(),
                input_ids: spec.input_ids.clone(),
                output_ids: spec.output_ids.clone(),
            };

            if nodes.insert(spec.id, node).is_some() {
                return Err(MlErr::DuplicateNode { node: spec.id });
            }
        }

        Self::new(nodes)
    }
}
