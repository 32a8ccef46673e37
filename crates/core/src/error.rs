//! Error types for the bet intake server.
//!
//! All operations return structured errors rather than panicking.
//! Every error is fatal to the worker that hit it and to nothing else:
//! a bad frame closes one connection, never the accept loop.

use thiserror::Error;

/// Top-level error type for all operations in the system.
///
/// Each variant corresponds to a specific failure domain:
/// - Codec: packet encoding/decoding (the malformed-frame family)
/// - Transport: block-level socket send/receive
/// - I/O: any other socket or OS-level fault
#[derive(Debug, Error)]
pub enum Error {
    /// Packet could not be decoded or violates the wire format
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    /// Block transport failure (peer closed, oversized frame)
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// Socket-level OS error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Agency id outside the configured range
    #[error("agency {agency} outside expected range 1..={max}")]
    UnknownAgency { agency: u8, max: u8 },

    /// A shared lock was poisoned by a panicking worker
    #[error("lock poisoned: {0}")]
    Lock(&'static str),
}

/// Packet codec errors.
///
/// Anything in here means the peer sent bytes that do not form a valid
/// frame; the connection handler closes the socket in response.
#[derive(Debug, Error)]
pub enum CodecError {
    /// First header byte is not a known packet type
    #[error("unknown packet type: {0}")]
    UnknownType(u8),

    /// Buffer is too short to contain a frame header
    #[error("frame too short: need at least {required} bytes, got {actual}")]
    FrameTooShort { required: usize, actual: usize },

    /// Declared total length disagrees with the bytes available
    #[error("frame length mismatch: header says {declared}, got {actual}")]
    LengthMismatch { declared: usize, actual: usize },

    /// Payload did not split into the expected number of fields
    #[error("field count mismatch: expected {expected} fields, got {actual}")]
    FieldCount { expected: usize, actual: usize },

    /// Payload bytes are not valid UTF-8
    #[error("payload is not valid UTF-8")]
    InvalidUtf8(#[from] std::string::FromUtf8Error),

    /// A sub-frame's declared length runs past the end of the batch payload
    #[error("truncated batch: sub-frame at offset {offset} declares {declared} bytes, {remaining} remain")]
    TruncatedBatch {
        offset: usize,
        declared: usize,
        remaining: usize,
    },

    /// A packet type arrived where the protocol does not allow it
    #[error("unexpected packet type {actual} (expected {expected})")]
    UnexpectedType { expected: &'static str, actual: u8 },

    /// Payload present on a packet type defined to carry none
    #[error("unexpected payload on {kind} packet ({len} bytes)")]
    UnexpectedPayload { kind: &'static str, len: usize },
}

/// Block transport errors.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Peer closed the connection (zero-byte read)
    #[error("connection closed by peer")]
    ConnectionClosed,

    /// Encoded frame does not fit in one block; rejected before transmission
    #[error("frame size {size} exceeds block size {max}")]
    FrameTooLarge { size: usize, max: usize },
}

/// Type alias for Result with our Error type
pub type Result<T> = std::result::Result<T, Error>;
