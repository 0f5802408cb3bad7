pub mod model;
pub mod optimizer;
