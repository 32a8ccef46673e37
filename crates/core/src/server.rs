//! Server loop: accept N agency connections, one worker thread each.
//!
//! A run accepts exactly as many connections as there are expected
//! agencies, hands each to its own worker thread, and join-waits for all
//! of them before returning. Workers share the readiness barrier, the
//! bet store, the shutdown flag and the metrics by `Arc`.
//!
//! # Shutdown
//!
//! The accept loop polls a non-blocking listener with a short sleep in
//! between, so an externally triggered [`ShutdownFlag`] is observed
//! within one poll interval without needing to close the listener from
//! another thread. In-flight workers observe the flag at their next
//! frame boundary; a worker blocked inside a single receive completes
//! that read first. A stalled peer can therefore hold its worker slot
//! indefinitely — an accepted protocol limitation, there are no
//! timeouts.

use crate::barrier::{AgencyBarrier, ShutdownFlag};
use crate::error::Result;
use crate::handler::{ConnectionHandler, SharedState};
use crate::metrics::{self, IntakeMetrics};
use crate::storage::{BetStore, DrawRule};
use std::net::{Shutdown, SocketAddr, TcpListener, TcpStream};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// How long the accept loop sleeps between polls of the listener.
const ACCEPT_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind, e.g. `0.0.0.0:12345` (port 0 picks a free one)
    pub bind_addr: SocketAddr,

    /// Number of agencies expected this run; also the connection bound
    pub agencies: u8,
}

/// The intake server for one lottery run.
pub struct Server {
    listener: TcpListener,
    agencies: u8,
    shared: SharedState,
}

impl Server {
    /// Bind the listener and set up the shared per-run state.
    pub fn bind(
        config: &ServerConfig,
        store: Arc<dyn BetStore>,
        rule: Arc<dyn DrawRule>,
    ) -> Result<Self> {
        let listener = TcpListener::bind(config.bind_addr)?;
        info!(addr = %listener.local_addr()?, agencies = config.agencies, "listening");

        Ok(Self {
            listener,
            agencies: config.agencies,
            shared: SharedState {
                barrier: Arc::new(AgencyBarrier::new(config.agencies)),
                store,
                rule,
                shutdown: Arc::new(ShutdownFlag::new()),
                metrics: Arc::new(IntakeMetrics::new()),
            },
        })
    }

    /// Address the listener actually bound (useful with port 0).
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Handle used by the shutdown controller (signal handler) to request
    /// termination.
    pub fn shutdown_flag(&self) -> Arc<ShutdownFlag> {
        Arc::clone(&self.shared.shutdown)
    }

    /// Run metrics, shared with all workers.
    pub fn metrics(&self) -> Arc<IntakeMetrics> {
        Arc::clone(&self.shared.metrics)
    }

    /// Accept up to the configured number of agencies, then join every
    /// worker. Returns once all workers have exited.
    ///
    /// Worker failures are logged, never propagated: one bad connection
    /// must not take down the run.
    pub fn run(&self) -> Result<()> {
        self.listener.set_nonblocking(true)?;

        let mut workers: Vec<JoinHandle<()>> = Vec::with_capacity(self.agencies as usize);

        while workers.len() < self.agencies as usize {
            if self.shared.shutdown.is_triggered() {
                info!("shutdown requested, no longer accepting connections");
                break;
            }

            match self.listener.accept() {
                Ok((stream, peer)) => {
                    metrics::inc(&self.shared.metrics.connections_accepted);
                    info!(%peer, "connection accepted");
                    workers.push(self.spawn_worker(stream, peer)?);
                }
                Err(err) if err.kind() == std::io::ErrorKind::WouldBlock => {
                    thread::sleep(ACCEPT_POLL_INTERVAL);
                }
                Err(err) => {
                    // Transient accept faults affect no existing worker.
                    warn!(error = %err, "accept failed");
                    thread::sleep(ACCEPT_POLL_INTERVAL);
                }
            }
        }

        debug!(workers = workers.len(), "waiting for workers to finish");
        for worker in workers {
            if worker.join().is_err() {
                error!("connection worker panicked");
            }
        }
        info!("all workers finished, run complete");
        Ok(())
    }

    fn spawn_worker(&self, stream: TcpStream, peer: SocketAddr) -> Result<JoinHandle<()>> {
        // The listener is non-blocking; accepted sockets must not be.
        stream.set_nonblocking(false)?;

        let shared = self.shared.clone();
        let handle = thread::Builder::new()
            .name(format!("agency-conn-{peer}"))
            .spawn(move || {
                let mut handler = ConnectionHandler::new(&stream, shared);
                if let Err(err) = handler.run() {
                    error!(%peer, error = %err, "connection failed");
                }
                // Unconditional close, also on error paths. Errors here
                // mean the peer is already gone.
                let _ = stream.shutdown(Shutdown::Both);
                debug!(%peer, "connection closed");
            })?;
        Ok(handle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{FixedDraw, MemoryStore};
    use std::net::{IpAddr, Ipv4Addr};

    fn config(agencies: u8) -> ServerConfig {
        ServerConfig {
            bind_addr: SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 0),
            agencies,
        }
    }

    fn bind(agencies: u8) -> Server {
        Server::bind(
            &config(agencies),
            Arc::new(MemoryStore::new()),
            Arc::new(FixedDraw::new("7574")),
        )
        .unwrap()
    }

    #[test]
    fn test_bind_picks_a_port() {
        let server = bind(3);
        assert_ne!(server.local_addr().unwrap().port(), 0);
    }

    #[test]
    fn test_run_returns_after_shutdown_with_no_connections() {
        let server = bind(3);
        let flag = server.shutdown_flag();

        let runner = thread::spawn(move || server.run());
        thread::sleep(Duration::from_millis(20));
        flag.trigger();

        runner.join().unwrap().unwrap();
    }

    #[test]
    fn test_run_returns_once_all_agencies_disconnect() {
        let server = bind(2);
        let addr = server.local_addr().unwrap();

        let runner = thread::spawn(move || server.run());

        // Two agencies connect and immediately hang up.
        for _ in 0..2 {
            let stream = TcpStream::connect(addr).unwrap();
            drop(stream);
        }

        runner.join().unwrap().unwrap();
    }
}
