use std::{
    error::Error,
    fmt::{self, Display},
};

use comms::NodeId;

use crate::graph::Op;

/// The result type used in the entire machine learning module.
pub type Result<T> = std::result::Result<T, MlErr>;

/// The machine learning module's error type.
///
/// Every variant is a configuration or programming error, none of them is retried.
#[derive(Debug, Clone, PartialEq)]
pub enum MlErr {
    SizeMismatch {
        a: &'static str,
        b: &'static str,
        got: usize,
        expected: usize,
    },
    MissingLoss,
    MissingVariables,
    DuplicateLoss {
        first: NodeId,
        second: NodeId,
    },
    DuplicateNode {
        node: NodeId,
    },
    UnknownNode {
        node: NodeId,
    },
    ArityMismatch {
        node: NodeId,
        op: Op,
        got: usize,
        expected: usize,
    },
    InconsistentAdjacency {
        from: NodeId,
        to: NodeId,
    },
    CyclicGraph,
    WrongOp {
        node: NodeId,
        got: Op,
        expected: Op,
    },
    MissingValue {
        node: NodeId,
        op: Op,
    },
    UnsupportedOps(Vec<Op>),
    UnsupportedReduceStrategy(String),
    NonScalarGradient {
        node: NodeId,
    },
    EmptyFeed,
    OptimizerNotInitialized,
}

impl Display for MlErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MlErr::SizeMismatch {
                a,
                b,
                got,
                expected,
            } => write!(
                f,
                "There's a size mismatch between {a} and {b}, got {got} and expected {expected}"
            ),
            MlErr::MissingLoss => {
                f.write_str("Incomplete model definition, the loss node is missing")
            }
            MlErr::MissingVariables => {
                f.write_str("Incomplete model definition, there are no variables to optimize")
            }
            MlErr::DuplicateLoss { first, second } => write!(
                f,
                "Cannot define more than one loss per model, node {first} already is the loss and got {second}"
            ),
            MlErr::DuplicateNode { node } => write!(f, "Node {node} is defined more than once"),
            MlErr::UnknownNode { node } => write!(f, "Node {node} is not part of the graph"),
            MlErr::ArityMismatch {
                node,
                op,
                got,
                expected,
            } => write!(f, "Node {node} ({op}) has {got} inputs, expected {expected}"),
            MlErr::InconsistentAdjacency { from, to } => {
                write!(f, "The edge {from} -> {to} is only present on one of its ends")
            }
            MlErr::CyclicGraph => f.write_str("The computation graph has a cycle"),
            MlErr::WrongOp { node, got, expected } => {
                write!(f, "Node {node} is a {got} node, expected a {expected} node")
            }
            MlErr::MissingValue { node, op } => {
                write!(f, "There's no value for the {op} node {node}")
            }
            MlErr::UnsupportedOps(ops) => {
                let names: Vec<_> = ops.iter().map(|op| op.name()).collect();
                write!(
                    f,
                    "Operations not implemented by the backend: {}",
                    names.join(", ")
                )
            }
            MlErr::UnsupportedReduceStrategy(name) => {
                write!(f, "Reduce strategy {name} is not implemented")
            }
            MlErr::NonScalarGradient { node } => write!(
                f,
                "Expected a reduced gradient for variable {node}, got the raw sequence"
            ),
            MlErr::EmptyFeed => f.write_str("The feed dict has no rows"),
            MlErr::OptimizerNotInitialized => {
                f.write_str("The optimizer was stepped before being initialized")
            }
        }
    }
}

impl Error for MlErr {}
