pub mod error;
pub mod state;
pub mod worker;

pub use error::{Result, WorkerErr};
pub use state::WorkerState;
pub use worker::Worker;
