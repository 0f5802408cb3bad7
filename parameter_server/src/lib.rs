pub mod config;
pub mod coordination;
pub mod error;

pub use config::DownpourConfig;
pub use coordination::{GlobalParams, Master};
pub use error::{MasterErr, Result};
