//! Per-connection state machine.
//!
//! One handler owns one agency connection and loops READING -> DISPATCH
//! -> READING until the peer closes, a frame is malformed, the shutdown
//! flag is raised, or winners are disclosed.
//!
//! Dispatch rules:
//! - `BET`: store the single bet, ack it echoing document and number.
//! - `BATCH`: store every bet, ack with status "1".
//! - `FINISHED`: mark the agency ready on the barrier, ack, and keep the
//!   connection open — the agency will come back with winner queries.
//! - `WINNER_QUERY`: while the barrier is closed, answer "not ready" and
//!   keep reading (clients poll with their own backoff). Once every
//!   agency has finished, disclose the winners and close.
//! - Server-to-client packet kinds arriving inbound are protocol
//!   violations and close the connection.
//!
//! The shutdown flag is checked before each read, never mid-block: a
//! handler blocked inside one receive finishes that read first.
//!
//! Errors returned from [`ConnectionHandler::run`] are fatal to this
//! connection only. The owning worker logs them and shuts the socket
//! down unconditionally.

use crate::barrier::{AgencyBarrier, ShutdownFlag};
use crate::error::{CodecError, Error, Result, TransportError};
use crate::metrics::{self, IntakeMetrics};
use crate::packet::{Frame, Packet, STATUS_OK};
use crate::storage::{BetStore, DrawRule};
use crate::transport::BlockStream;
use crate::winner::winning_numbers;
use std::io::{Read, Write};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Shared collaborators handed to every connection worker.
#[derive(Clone)]
pub struct SharedState {
    pub barrier: Arc<AgencyBarrier>,
    pub store: Arc<dyn BetStore>,
    pub rule: Arc<dyn DrawRule>,
    pub shutdown: Arc<ShutdownFlag>,
    pub metrics: Arc<IntakeMetrics>,
}

/// Drives the protocol for a single accepted connection.
///
/// Generic over the stream so tests can run the full state machine
/// against in-memory bytes.
pub struct ConnectionHandler<S> {
    stream: BlockStream<S>,
    shared: SharedState,
}

impl<S: Read + Write> ConnectionHandler<S> {
    pub fn new(stream: S, shared: SharedState) -> Self {
        Self {
            stream: BlockStream::new(stream),
            shared,
        }
    }

    /// Run the connection to completion.
    ///
    /// Returns `Ok(())` on every orderly exit (peer closed, shutdown
    /// requested, winners disclosed) and an error on protocol or I/O
    /// failure. The caller owns socket shutdown either way.
    pub fn run(&mut self) -> Result<()> {
        loop {
            if self.shared.shutdown.is_triggered() {
                debug!("shutdown requested, closing connection");
                return Ok(());
            }

            let frame = match self.stream.recv_frame() {
                Ok(frame) => frame,
                Err(Error::Transport(TransportError::ConnectionClosed)) => {
                    debug!("peer closed connection");
                    return Ok(());
                }
                Err(Error::Codec(err)) => {
                    metrics::inc(&self.shared.metrics.malformed_frames);
                    return Err(err.into());
                }
                Err(err) => return Err(err),
            };
            metrics::inc(&self.shared.metrics.frames_received);

            if self.dispatch(frame)? == Flow::Close {
                return Ok(());
            }
        }
    }

    fn dispatch(&mut self, frame: Frame) -> Result<Flow> {
        let agency = frame.sender;
        let packet = match Packet::from_frame(&frame) {
            Ok(packet) => packet,
            Err(err) => {
                metrics::inc(&self.shared.metrics.malformed_frames);
                return Err(err);
            }
        };

        match packet {
            Packet::Bet(bet) => {
                let ack = Packet::BetAck {
                    document: bet.document.clone(),
                    number: bet.number.clone(),
                    status: STATUS_OK.to_string(),
                };
                self.shared.store.append(std::slice::from_ref(&bet))?;
                metrics::inc(&self.shared.metrics.bets_stored);
                debug!(agency, document = %bet.document, "bet stored");
                self.stream.send_frame(&ack.into_frame(agency))?;
                Ok(Flow::Continue)
            }
            Packet::Batch(bets) => {
                self.shared.store.append(&bets)?;
                metrics::inc(&self.shared.metrics.batches_stored);
                metrics::add(&self.shared.metrics.bets_stored, bets.len() as u64);
                info!(agency, bets = bets.len(), "batch stored");
                self.send_status_ack(agency)?;
                Ok(Flow::Continue)
            }
            Packet::Finished => {
                self.shared.barrier.mark_ready(agency)?;
                metrics::inc(&self.shared.metrics.agencies_finished);
                info!(
                    agency,
                    ready = self.shared.barrier.ready_count()?,
                    "agency finished submitting"
                );
                self.send_status_ack(agency)?;
                Ok(Flow::Continue)
            }
            Packet::WinnerQuery => {
                metrics::inc(&self.shared.metrics.winner_queries);
                if !self.shared.barrier.is_fully_ready()? {
                    debug!(agency, "winner query before all agencies finished");
                    let pending = Packet::WinnerResult {
                        ready: false,
                        numbers: Vec::new(),
                    };
                    self.stream.send_frame(&pending.into_frame(agency))?;
                    return Ok(Flow::Continue);
                }

                let numbers = winning_numbers(
                    self.shared.store.as_ref(),
                    self.shared.rule.as_ref(),
                    agency,
                )?;
                metrics::inc(&self.shared.metrics.winners_disclosed);
                info!(agency, winners = numbers.len(), "winners disclosed");
                let result = Packet::WinnerResult {
                    ready: true,
                    numbers,
                };
                self.stream.send_frame(&result.into_frame(agency))?;
                Ok(Flow::Close)
            }
            // Reply kinds are never valid inbound.
            Packet::BetAck { .. } | Packet::BatchAck { .. } | Packet::WinnerResult { .. } => {
                warn!(agency, kind = frame.kind as u8, "client sent a server-only packet");
                metrics::inc(&self.shared.metrics.malformed_frames);
                Err(CodecError::UnexpectedType {
                    expected: "BET, BATCH, FINISHED or WINNER_QUERY",
                    actual: frame.kind as u8,
                }
                .into())
            }
        }
    }

    fn send_status_ack(&mut self, agency: u8) -> Result<()> {
        let ack = Packet::BatchAck {
            status: STATUS_OK.to_string(),
        };
        self.stream.send_frame(&ack.into_frame(agency))
    }
}

#[derive(Debug, PartialEq, Eq)]
enum Flow {
    Continue,
    Close,
}
