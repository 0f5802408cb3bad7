mod builder;
mod mini_batch_sgd;
mod optimizer;
mod variable;

pub use builder::OptimizerBuilder;
pub use mini_batch_sgd::MiniBatchSgd;
pub use optimizer::IterativeOptimizer;
pub use variable::VariableState;
