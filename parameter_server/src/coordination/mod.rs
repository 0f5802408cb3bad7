mod global;
mod master;
mod session;

pub use global::GlobalParams;
pub use master::Master;
