//! Framing between the master and its workers.
//!
//! Every message travels as one frame:
//!
//! ```text
//! | body length: u64 BE | kind: u32 BE | kind specific body ... |
//! ```
//!
//! `set:*` commands carry a JSON body, `run:optimize` carries a u64 step count followed by the
//! raw `f32` parameters and `err` carries UTF-8 text. See `msg::Msg` for the kinds.

mod align;
mod deserialize;
pub mod msg;
mod receiver;
mod sender;
mod serialize;
pub mod specs;

use tokio::io::{AsyncRead, AsyncWrite};

pub use align::{Align1, Align4};
pub use deserialize::Deserialize;
pub use receiver::WireReceiver;
pub use sender::WireSender;
pub use serialize::Serialize;

/// Identifier of a node inside a flattened computation graph.
pub type NodeId = usize;

type LenType = u64;
const LEN_TYPE_SIZE: usize = size_of::<LenType>();

/// The largest frame body accepted from a peer, in bytes.
pub const MAX_FRAME_LEN: usize = 1 << 30;

/// Wraps the two halves of a master/worker connection into framed endpoints.
///
/// # Arguments
/// * `rx` - The half frames are read from.
/// * `tx` - The half frames are written to.
pub fn channel<R, W>(rx: R, tx: W) -> (WireReceiver<R>, WireSender<W>)
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    (WireReceiver::new(rx), WireSender::new(tx))
}
