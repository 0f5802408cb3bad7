pub mod backend;
pub mod error;
pub mod feed;
pub mod graph;
pub mod model;
pub mod optimization;
mod test;

pub use error::{MlErr, Result};
pub use feed::{FeedDict, ParamMap};
pub use model::Model;
