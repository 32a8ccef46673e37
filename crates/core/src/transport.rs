//! Fixed-size block transport over a byte stream.
//!
//! TCP gives a byte stream with no message boundaries; this protocol keeps
//! framing trivial by mapping every logical frame onto exactly one
//! [`BLOCK_SIZE`]-byte block, zero-padded on send and trimmed on receive.
//!
//! # Receive
//!
//! Accumulate bytes until a full block has arrived, absorbing partial
//! reads. A zero-byte read before the block completes means the peer
//! closed ([`TransportError::ConnectionClosed`]). The frame's own
//! `total_length` field then selects the meaningful prefix; trailing
//! padding is discarded.
//!
//! # Send
//!
//! A frame larger than one block is rejected before any bytes hit the
//! wire — the block is a hard ceiling on frame size, not a recoverable
//! condition. Otherwise the encoded frame is padded to [`BLOCK_SIZE`] and
//! written out in a loop that absorbs short writes.

use crate::error::{Result, TransportError};
use crate::packet::Frame;
use std::io::{Read, Write};

/// Bytes per logical exchange in either direction.
pub const BLOCK_SIZE: usize = 8192;

/// Frame-per-block adapter over any synchronous byte stream.
///
/// Generic over `Read + Write` so handlers can be exercised against
/// in-memory streams in tests; production code wraps a `&TcpStream`.
pub struct BlockStream<S> {
    inner: S,
}

impl<S: Read + Write> BlockStream<S> {
    pub fn new(inner: S) -> Self {
        Self { inner }
    }

    /// Unwrap the underlying stream.
    pub fn into_inner(self) -> S {
        self.inner
    }

    /// Receive one logical frame.
    ///
    /// Blocks until a full [`BLOCK_SIZE`] block has been read, then decodes
    /// the frame from its `total_length`-byte prefix.
    ///
    /// # Errors
    /// - [`TransportError::ConnectionClosed`] on a zero-byte read
    /// - Any [`crate::error::CodecError`] from decoding the prefix
    /// - I/O errors from the underlying stream
    pub fn recv_frame(&mut self) -> Result<Frame> {
        let mut block = [0u8; BLOCK_SIZE];
        let mut filled = 0;

        while filled < BLOCK_SIZE {
            let n = self.inner.read(&mut block[filled..])?;
            if n == 0 {
                return Err(TransportError::ConnectionClosed.into());
            }
            filled += n;
        }

        let declared = u16::from_le_bytes([block[2], block[3]]) as usize;
        let declared = declared.min(BLOCK_SIZE);
        Frame::decode(&block[..declared])
    }

    /// Send one logical frame, padded to a full block.
    ///
    /// # Errors
    /// - [`TransportError::FrameTooLarge`] if the encoded frame exceeds
    ///   [`BLOCK_SIZE`]; nothing is written in that case
    /// - I/O errors from the underlying stream
    pub fn send_frame(&mut self, frame: &Frame) -> Result<()> {
        let size = frame.encoded_len();
        if size > BLOCK_SIZE {
            return Err(TransportError::FrameTooLarge {
                size,
                max: BLOCK_SIZE,
            }
            .into());
        }

        let mut block = vec![0u8; BLOCK_SIZE];
        block[..size].copy_from_slice(&frame.encode());

        // write_all loops over short writes for us.
        self.inner.write_all(&block)?;
        self.inner.flush()?;
        Ok(())
    }
}
