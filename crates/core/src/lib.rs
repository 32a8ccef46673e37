//! tombola-core: bet intake over a fixed-block binary TCP protocol
//!
//! This library implements the server side of a lottery intake system:
//! independent agencies submit batches of bets over TCP, announce when
//! they are done, and poll for their winning tickets. Winners are only
//! disclosed once every expected agency has finished — a synchronization
//! barrier across independent client connections.
//!
//! # Architecture
//!
//! The system is designed around clear module boundaries:
//! - `packet`: typed packets and the binary frame codec
//! - `transport`: fixed-size block framing over a byte stream
//! - `handler`: per-connection state machine
//! - `barrier`: agency readiness barrier and shutdown flag
//! - `server`: accept loop, worker threads, join-on-exit
//! - `winner`: winner resolution against the stored bets
//! - `storage`: store and drawing-rule collaborator traits
//! - `metrics`: run-wide event counters
//!
//! # Design Principles
//!
//! - **No panics**: all errors are structured; a failure is fatal to its
//!   own connection worker and to nothing else
//! - **One block per frame**: every logical message occupies exactly one
//!   fixed-size network block, so framing never straddles reads
//! - **Client-driven waiting**: the barrier never blocks a worker; agencies
//!   poll for winners and back off on their side

pub mod barrier;
pub mod error;
pub mod handler;
pub mod metrics;
pub mod packet;
pub mod server;
pub mod storage;
pub mod transport;
pub mod winner;

// Re-export commonly used types
pub use error::{Error, Result};
pub use transport::BLOCK_SIZE;
