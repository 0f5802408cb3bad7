use super::Dual;
use crate::graph::Op;

/// Evaluates a non-source node given the values of its inputs, in `input_ids` order.
pub type Kernel = fn(&[Dual]) -> Dual;

/// Maps every operator kind to its dual-number kernel.
///
/// Source operators (`constant`, `variable`, `feeder`) take their value from outside
/// the graph and have no kernel.
pub fn kernel(op: Op) -> Option<Kernel> {
    let kernel: Kernel = match op {
        Op::Constant | Op::Variable | Op::Feeder => return None,
        Op::Loss => |x| x[0],
        Op::Add => |x| x[0] + x[1],
        Op::Sub => |x| x[0] - x[1],
        Op::Mul => |x| x[0] * x[1],
        Op::Div => |x| x[0] / x[1],
        Op::Pow => |x| x[0].pow(x[1]),
        Op::Sqrt => |x| x[0].sqrt(),
        Op::Exp => |x| x[0].exp(),
        Op::Ln => |x| x[0].ln(),
        Op::Logistic => |x| x[0].logistic(),
        Op::Tanh => |x| x[0].tanh(),
    };

    Some(kernel)
}
