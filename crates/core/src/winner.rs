//! Winner resolution for one agency.
//!
//! A pure function of stored state: only called once the readiness
//! barrier is open, after which the stored bets no longer change, so
//! results are stable for the remainder of the run.

use crate::error::Result;
use crate::packet::Bet;
use crate::storage::{BetStore, DrawRule};

/// Winning bet numbers for `agency`: full scan, filter by the drawing rule
/// and the agency id, project to the bet number. Storage iteration order is
/// preserved; no additional sort.
pub fn winning_numbers(store: &dyn BetStore, rule: &dyn DrawRule, agency: u8) -> Result<Vec<String>> {
    let numbers = store
        .scan_all()?
        .into_iter()
        .filter(|bet| bet.agency == agency && rule.has_won(bet))
        .map(|bet| bet.number)
        .collect();
    Ok(numbers)
}
