use serde::{Deserialize, Serialize};

use super::optimizer::OptimizerSpec;
use crate::NodeId;

/// Wire-level operator tag of a graph node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OpSpec {
    Constant,
    Variable,
    Feeder,
    Loss,
    Add,
    Sub,
    Mul,
    Div,
    Pow,
    Sqrt,
    Exp,
    Ln,
    Logistic,
    Tanh,
}

/// A single node of a flattened computation graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeSpec {
    pub id: NodeId,
    pub op: OpSpec,
    pub input_ids: Vec<NodeId>,
    pub output_ids: Vec<NodeId>,
}

/// The column of values fed into a feeder node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedSpec {
    pub id: NodeId,
    pub values: Vec<f32>,
}

/// The fixed value of a constant node.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConstantSpec {
    pub id: NodeId,
    pub value: f32,
}

/// Everything a worker needs to start optimizing, sent in `set:model`.
///
/// Parameter vectors exchanged afterwards are ordered as `variable_ids`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelSpec {
    pub worker_id: usize,
    pub optimizer: OptimizerSpec,
    pub graph: Vec<NodeSpec>,
    pub variable_ids: Vec<NodeId>,
    pub loss_id: NodeId,
    pub feeds: Vec<FeedSpec>,
    pub variable_init: Vec<f32>,
    pub constants: Vec<ConstantSpec>,
}
