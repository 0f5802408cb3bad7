mod builder;
mod flat;
mod op;

pub use builder::GraphBuilder;
pub use flat::{FlatGraph, FlatNode};
pub use op::Op;
