use std::fmt::{self, Display};

use comms::specs::model::OpSpec;

/// The closed set of operator kinds a graph node can have.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Op {
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

impl Op {
    /// Every operator kind, in declaration order.
    pub const ALL: [Op; 14] = [
        Op::Constant,
        Op::Variable,
        Op::Feeder,
        Op::Loss,
        Op::Add,
        Op::Sub,
        Op::Mul,
        Op::Div,
        Op::Pow,
        Op::Sqrt,
        Op::Exp,
        Op::Ln,
        Op::Logistic,
        Op::Tanh,
    ];

    /// The amount of inputs a node of this kind takes.
    pub fn arity(self) -> usize {
        match self {
            Op::Constant | Op::Variable | Op::Feeder => 0,
            Op::Loss | Op::Sqrt | Op::Exp | Op::Ln | Op::Logistic | Op::Tanh => 1,
            Op::Add | Op::Sub | Op::Mul | Op::Div | Op::Pow => 2,
        }
    }

    /// Whether the node's value comes from outside the graph.
    pub fn is_source(self) -> bool {
        self.arity() == 0
    }

    /// The wire name of the operator.
    pub fn name(self) -> &'static str {
        match self {
            Op::Constant => "constant",
            Op::Variable => "variable",
            Op::Feeder => "feeder",
            Op::Loss => "loss",
            Op::Add => "add",
            Op::Sub => "sub",
            Op::Mul => "mul",
            Op::Div => "div",
            Op::Pow => "pow",
            Op::Sqrt => "sqrt",
            Op::Exp => "exp",
            Op::Ln => "ln",
            Op::Logistic => "logistic",
            Op::Tanh => "tanh",
        }
    }
}

impl Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl From<OpSpec> for Op {
    fn from(spec: OpSpec) -> Self {
        match spec {
            OpSpec::Constant => Op::Constant,
            OpSpec::Variable => Op::Variable,
            OpSpec::Feeder => Op::Feeder,
            OpSpec::Loss => Op::Loss,
            OpSpec::Add => Op::Add,
            OpSpec::Sub => Op::Sub,
            OpSpec::Mul => Op::Mul,
            OpSpec::Div => Op::Div,
            OpSpec::Pow => Op::Pow,
            OpSpec::Sqrt => Op::Sqrt,
            OpSpec::Exp => Op::Exp,
            OpSpec::Ln => Op::Ln,
            OpSpec::Logistic => Op::Logistic,
            OpSpec::Tanh => Op::Tanh,
        }
    }
}

impl From<Op> for OpSpec {
    fn from(op: Op) -> Self {
        match op {
            Op::Constant => OpSpec::Constant,
            Op::Variable => OpSpec::Variable,
            Op::Feeder => OpSpec::Feeder,
            Op::Loss => OpSpec::Loss,
            Op::Add => OpSpec::Add,
            Op::Sub => OpSpec::Sub,
            Op::Mul => OpSpec::Mul,
            Op::Div => OpSpec::Div,
            Op::Pow => OpSpec::Pow,
            Op::Sqrt => OpSpec::Sqrt,
            Op::Exp => OpSpec::Exp,
            Op::Ln => OpSpec::Ln,
            Op::Logistic => OpSpec::Logistic,
            Op::Tanh => OpSpec::Tanh,
        }
    }
}
