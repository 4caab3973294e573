//! Frame codec for the debug server's Tcl RPC port
//!
//! # Wire Format
//!
//! ```text
//! <utf-8 text> 0x1A
//! ```
//!
//! There is no length prefix and no escaping. Text containing 0x1A cannot be
//! sent unambiguously; [`encode_frame`] does not try.

use crate::traits::{OcdError, Result};
use bytes::BytesMut;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::debug;

/// Byte terminating every frame in both directions
pub const FRAME_TERMINATOR: u8 = 0x1A;

/// Initial capacity of the decode buffer
pub const INITIAL_BUFFER_CAPACITY: usize = 4096;

/// Default upper bound for a single frame (1 MiB)
pub const DEFAULT_MAX_FRAME_SIZE: usize = 1024 * 1024;

/// Encode a command into a terminated frame
pub fn encode_frame(text: &str) -> Vec<u8> {
    let mut frame = Vec::with_capacity(text.len() + 1);
    frame.extend_from_slice(text.as_bytes());
    frame.push(FRAME_TERMINATOR);
    frame
}

/// Split the first complete frame off the front of `buf`
///
/// Returns `Ok(None)` while no terminator has arrived. The payload is
/// decoded lossily and trimmed of surrounding whitespace.
///
/// # Errors
/// [`OcdError::FrameTooLarge`] once more than `max_frame_size` bytes are
/// buffered without a terminator.
pub fn decode_frame(buf: &mut BytesMut, max_frame_size: usize) -> Result<Option<String>> {
    match buf.iter().position(|&b| b == FRAME_TERMINATOR) {
        Some(end) => {
            let frame = buf.split_to(end + 1);
            let text = String::from_utf8_lossy(&frame[..end]);
            Ok(Some(text.trim().to_string()))
        }
        None if buf.len() > max_frame_size => Err(OcdError::FrameTooLarge {
            limit: max_frame_size,
        }),
        None => Ok(None),
    }
}

/// Write one frame and flush
pub async fn write_frame<W>(writer: &mut W, text: &str) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    writer.write_all(&encode_frame(text)).await?;
    writer.flush().await?;
    Ok(())
}

/// Accumulates bytes from a stream and yields complete frames
///
/// The buffer starts at [`INITIAL_BUFFER_CAPACITY`] and grows as needed up to
/// the configured frame limit. All partial-read state lives in the reader,
/// so [`FrameReader::next_frame`] is safe to cancel inside `tokio::select!`.
pub struct FrameReader<R> {
    reader: R,
    buf: BytesMut,
    max_frame_size: usize,
}

impl<R> FrameReader<R>
where
    R: AsyncRead + Unpin,
{
    pub fn new(reader: R, max_frame_size: usize) -> Self {
        Self {
            reader,
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            max_frame_size,
        }
    }

    /// Read until a complete frame is available
    ///
    /// Returns `Ok(None)` when the peer closed the stream. Bytes of an
    /// unterminated trailing frame are discarded at that point.
    pub async fn next_frame(&mut self) -> Result<Option<String>> {
        loop {
            if let Some(frame) = decode_frame(&mut self.buf, self.max_frame_size)? {
                return Ok(Some(frame));
            }

            if self.buf.capacity() == self.buf.len() {
                self.buf.reserve(INITIAL_BUFFER_CAPACITY);
            }

            let n = self.reader.read_buf(&mut self.buf).await?;
            if n == 0 {
                if !self.buf.is_empty() {
                    debug!("Peer closed with {} bytes of partial frame", self.buf.len());
                    self.buf.clear();
                }
                return Ok(None);
            }
        }
    }

    /// Decode a frame that is already buffered, without touching the stream
    pub fn try_next_frame(&mut self) -> Result<Option<String>> {
        decode_frame(&mut self.buf, self.max_frame_size)
    }

    /// Number of bytes received but not yet decoded
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }
}
