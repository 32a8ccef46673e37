//! Storage and drawing-rule collaborator contracts.
//!
//! Persistence and the lottery rule live outside this core; the handler
//! only depends on these traits. Both are driven from multiple worker
//! threads, so implementations must be `Send + Sync` and serialize their
//! own access — [`MemoryStore`] does it with a single mutex, which also
//! guarantees that batches from different agencies never interleave at
//! the record level.

use crate::error::{Error, Result};
use crate::packet::Bet;
use std::sync::Mutex;

/// Append-and-scan store for bet records.
pub trait BetStore: Send + Sync {
    /// Append a batch of bets. All-or-nothing with respect to other
    /// appends: records from two calls never interleave.
    fn append(&self, bets: &[Bet]) -> Result<()>;

    /// Snapshot of every stored bet, in insertion order.
    fn scan_all(&self) -> Result<Vec<Bet>>;
}

/// Lottery-eligibility predicate.
pub trait DrawRule: Send + Sync {
    fn has_won(&self, bet: &Bet) -> bool;
}

/// In-memory [`BetStore`] guarded by one lock shared across all workers.
#[derive(Default)]
pub struct MemoryStore {
    bets: Mutex<Vec<Bet>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl BetStore for MemoryStore {
    fn append(&self, bets: &[Bet]) -> Result<()> {
        let mut stored = self.bets.lock().map_err(|_| Error::Lock("bet store"))?;
        stored.extend_from_slice(bets);
        Ok(())
    }

    fn scan_all(&self) -> Result<Vec<Bet>> {
        let stored = self.bets.lock().map_err(|_| Error::Lock("bet store"))?;
        Ok(stored.clone())
    }
}

/// [`DrawRule`] that compares the bet number against one winning number.
pub struct FixedDraw {
    winning_number: String,
}

impl FixedDraw {
    pub fn new(winning_number: impl Into<String>) -> Self {
        Self {
            winning_number: winning_number.into(),
        }
    }
}

impl DrawRule for FixedDraw {
    fn has_won(&self, bet: &Bet) -> bool {
        bet.number == self.winning_number
    }
}
