use std::io;

use tokio::io::{AsyncRead, AsyncReadExt};

use crate::{Align4, Deserialize, LEN_TYPE_SIZE, LenType, MAX_FRAME_LEN};

/// Reads length-prefixed frames and decodes their `kind` header and body.
pub struct WireReceiver<R: AsyncRead + Unpin> {
    rx: R,
}

impl<R: AsyncRead + Unpin> WireReceiver<R> {
    pub(super) fn new(rx: R) -> Self {
        Self { rx }
    }

    /// Waits for the next frame and decodes it.
    ///
    /// The body is read into `buf`, reusing its allocation. Parameter slices of `run:optimize`
    /// are borrowed straight from it, so its elements must be 4 byte aligned.
    ///
    /// # Arguments
    /// * `buf` - The storage for the frame body, the decoded value borrows from it.
    ///
    /// # Returns
    /// The decoded message, or `InvalidData` if the length prefix exceeds `MAX_FRAME_LEN`
    /// or the body doesn't decode.
    pub async fn recv_into<'buf, T, B>(&mut self, buf: &'buf mut Vec<B>) -> io::Result<T>
    where
        T: Deserialize<'buf>,
        B: Align4,
    {
        let mut size_buf = [0; LEN_TYPE_SIZE];
        self.rx.read_exact(&mut size_buf).await?;
        let len = LenType::from_be_bytes(size_buf);

        let len = usize::try_from(len)
            .ok()
            .filter(|&len| len <= MAX_FRAME_LEN)
            .ok_or_else(|| {
                io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("frame of {len} bytes exceeds the {MAX_FRAME_LEN} bytes limit"),
                )
            })?;

        let needed_amount = len.div_ceil(size_of::<B>());
        buf.clear();
        buf.resize(needed_amount, B::zeroed());

        let view: &mut [u8] = bytemuck::cast_slice_mut(buf);
        let slice = &mut view[..len];
        self.rx.read_exact(slice).await?;

        T::deserialize(slice)
    }
}
