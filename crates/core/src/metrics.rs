//! Metrics collection for one intake run.
//!
//! Counters for the interesting events of a run: connections, frames,
//! batches, stored bets, protocol violations, barrier progress and winner
//! disclosure.
//!
//! # Thread Safety
//!
//! Every connection worker updates the same instance through an `Arc`, so
//! all counters are atomics; no lock is taken on the hot path.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// Run-wide event counters shared by all connection workers.
#[derive(Debug)]
pub struct IntakeMetrics {
    /// When the server run started
    start_time: Instant,

    // === Connections ===
    /// Connections accepted by the server loop
    pub connections_accepted: AtomicU64,

    // === Frames ===
    /// Frames successfully received across all connections
    pub frames_received: AtomicU64,

    /// Frames rejected as malformed (connection closed in response)
    pub malformed_frames: AtomicU64,

    // === Intake ===
    /// BATCH packets stored
    pub batches_stored: AtomicU64,

    /// Individual bet records stored (single BETs and batch members)
    pub bets_stored: AtomicU64,

    /// FINISHED packets that marked an agency ready
    pub agencies_finished: AtomicU64,

    // === Winners ===
    /// WINNER_QUERY packets received
    pub winner_queries: AtomicU64,

    /// Winner results actually disclosed (barrier open)
    pub winners_disclosed: AtomicU64,
}

impl IntakeMetrics {
    /// Create new metrics with start time set to now.
    pub fn new() -> Self {
        Self {
            start_time: Instant::now(),
            connections_accepted: AtomicU64::new(0),
            frames_received: AtomicU64::new(0),
            malformed_frames: AtomicU64::new(0),
            batches_stored: AtomicU64::new(0),
            bets_stored: AtomicU64::new(0),
            agencies_finished: AtomicU64::new(0),
            winner_queries: AtomicU64::new(0),
            winners_disclosed: AtomicU64::new(0),
        }
    }

    /// Export counters as a simple text format (for logging/testing).
    pub fn export_text(&self) -> String {
        format!(
            "uptime_ms={}\n\
             connections_accepted={}\n\
             frames_received={}\n\
             malformed_frames={}\n\
             batches_stored={}\n\
             bets_stored={}\n\
             agencies_finished={}\n\
             winner_queries={}\n\
             winners_disclosed={}\n",
            self.start_time.elapsed().as_millis(),
            self.connections_accepted.load(Ordering::Relaxed),
            self.frames_received.load(Ordering::Relaxed),
            self.malformed_frames.load(Ordering::Relaxed),
            self.batches_stored.load(Ordering::Relaxed),
            self.bets_stored.load(Ordering::Relaxed),
            self.agencies_finished.load(Ordering::Relaxed),
            self.winner_queries.load(Ordering::Relaxed),
            self.winners_disclosed.load(Ordering::Relaxed),
        )
    }
}

impl Default for IntakeMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Relaxed increment helper; counters are independent, no ordering needed.
pub(crate) fn inc(counter: &AtomicU64) {
    counter.fetch_add(1, Ordering::Relaxed);
}

/// Relaxed add helper for bulk counts.
pub(crate) fn add(counter: &AtomicU64, n: u64) {
    counter.fetch_add(n, Ordering::Relaxed);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_counters_start_at_zero() {
        let metrics = IntakeMetrics::new();
        let text = metrics.export_text();
        assert!(text.contains("connections_accepted=0"));
        assert!(text.contains("bets_stored=0"));
    }

    #[test]
    fn test_concurrent_increments() {
        let metrics = Arc::new(IntakeMetrics::new());

        let workers: Vec<_> = (0..8)
            .map(|_| {
                let metrics = Arc::clone(&metrics);
                thread::spawn(move || {
                    for _ in 0..100 {
                        inc(&metrics.frames_received);
                    }
                    add(&metrics.bets_stored, 5);
                })
            })
            .collect();
        for worker in workers {
            worker.join().unwrap();
        }

        assert_eq!(metrics.frames_received.load(Ordering::Relaxed), 800);
        assert_eq!(metrics.bets_stored.load(Ordering::Relaxed), 40);
    }

    #[test]
    fn test_export_text_reflects_counts() {
        let metrics = IntakeMetrics::new();
        inc(&metrics.winner_queries);
        inc(&metrics.winner_queries);
        inc(&metrics.winners_disclosed);

        let text = metrics.export_text();
        assert!(text.contains("winner_queries=2"));
        assert!(text.contains("winners_disclosed=1"));
    }
}
