use std::io;

/// Decodes a frame body, starting at its `kind` header, borrowing from the receive buffer.
pub trait Deserialize<'a>: Sized {
    fn deserialize(buf: &'a [u8]) -> io::Result<Self>;
}
