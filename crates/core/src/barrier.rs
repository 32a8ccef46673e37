//! Cross-connection synchronization: readiness barrier and shutdown flag.
//!
//! Winner disclosure is gated on "every expected agency has sent
//! FINISHED". The barrier is a fixed array of booleans, one slot per
//! agency, shared by all connection workers behind a single mutex.
//!
//! Slots only ever transition `false -> true`; once all are true the
//! barrier stays open for the rest of the run. There is deliberately no
//! blocking wait here: clients poll with repeated WINNER_QUERY
//! round-trips and back off on their side, so the server never parks a
//! worker on a condition variable.
//!
//! [`ShutdownFlag`] is the run-wide termination signal: single writer,
//! many readers, set once, checked by every worker between frames.

use crate::error::{Error, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

/// Tracks which agencies have finished submitting bets.
pub struct AgencyBarrier {
    /// Slot `i` belongs to agency `i + 1`.
    slots: Mutex<Vec<bool>>,
}

impl AgencyBarrier {
    /// Create a barrier expecting agencies `1..=agencies`.
    pub fn new(agencies: u8) -> Self {
        Self {
            slots: Mutex::new(vec![false; agencies as usize]),
        }
    }

    /// Mark one agency as finished. Idempotent; marking twice is not an
    /// error, the slot just stays `true`.
    ///
    /// # Errors
    /// [`Error::UnknownAgency`] if the id is 0 or beyond the configured
    /// count; [`Error::Lock`] if a worker panicked while holding the lock.
    pub fn mark_ready(&self, agency: u8) -> Result<()> {
        let mut slots = self.slots.lock().map_err(|_| Error::Lock("barrier"))?;

        let index = self.slot_index(agency, slots.len())?;
        slots[index] = true;
        Ok(())
    }

    /// True iff every expected agency has finished.
    ///
    /// The scan runs under the same lock as [`Self::mark_ready`], but a
    /// mark by another worker right after this returns is only observed on
    /// the next query — eventually consistent by design, there is no push
    /// notification.
    pub fn is_fully_ready(&self) -> Result<bool> {
        let slots = self.slots.lock().map_err(|_| Error::Lock("barrier"))?;
        Ok(slots.iter().all(|&ready| ready))
    }

    /// Number of agencies that have finished so far.
    pub fn ready_count(&self) -> Result<usize> {
        let slots = self.slots.lock().map_err(|_| Error::Lock("barrier"))?;
        Ok(slots.iter().filter(|&&ready| ready).count())
    }

    fn slot_index(&self, agency: u8, max: usize) -> Result<usize> {
        if agency == 0 || agency as usize > max {
            return Err(Error::UnknownAgency {
                agency,
                max: max as u8,
            });
        }
        Ok(agency as usize - 1)
    }
}

/// Run-wide cooperative termination signal.
///
/// `false -> true` only, set once by the shutdown controller, observed by
/// every worker at its next frame boundary. Atomic, so readers take no
/// lock.
#[derive(Debug, Default)]
pub struct ShutdownFlag(AtomicBool);

impl ShutdownFlag {
    pub fn new() -> Self {
        Self(AtomicBool::new(false))
    }

    /// Request termination. Safe to call more than once.
    pub fn trigger(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_triggered(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_barrier_opens_only_after_all_marks() {
        let barrier = AgencyBarrier::new(3);

        barrier.mark_ready(1).unwrap();
        barrier.mark_ready(2).unwrap();
        assert!(!barrier.is_fully_ready().unwrap());
        assert_eq!(barrier.ready_count().unwrap(), 2);

        barrier.mark_ready(3).unwrap();
        assert!(barrier.is_fully_ready().unwrap());
    }

    #[test]
    fn test_mark_order_does_not_matter() {
        let barrier = AgencyBarrier::new(3);
        for agency in [3, 1, 2] {
            assert!(!barrier.is_fully_ready().unwrap());
            barrier.mark_ready(agency).unwrap();
        }
        assert!(barrier.is_fully_ready().unwrap());
    }

    #[test]
    fn test_mark_is_idempotent() {
        let barrier = AgencyBarrier::new(2);
        barrier.mark_ready(1).unwrap();
        barrier.mark_ready(1).unwrap();
        assert_eq!(barrier.ready_count().unwrap(), 1);
        assert!(!barrier.is_fully_ready().unwrap());
    }

    #[test]
    fn test_out_of_range_agency_rejected() {
        let barrier = AgencyBarrier::new(3);
        assert!(matches!(
            barrier.mark_ready(0),
            Err(Error::UnknownAgency { agency: 0, max: 3 })
        ));
        assert!(matches!(
            barrier.mark_ready(4),
            Err(Error::UnknownAgency { agency: 4, max: 3 })
        ));
    }

    #[test]
    fn test_concurrent_marks_lose_no_updates() {
        const AGENCIES: u8 = 16;
        let barrier = Arc::new(AgencyBarrier::new(AGENCIES));

        let workers: Vec<_> = (1..=AGENCIES)
            .map(|agency| {
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || barrier.mark_ready(agency).unwrap())
            })
            .collect();

        for worker in workers {
            worker.join().unwrap();
        }

        assert_eq!(barrier.ready_count().unwrap(), AGENCIES as usize);
        assert!(barrier.is_fully_ready().unwrap());
    }

    #[test]
    fn test_shutdown_flag_set_once_visible_everywhere() {
        let flag = Arc::new(ShutdownFlag::new());
        assert!(!flag.is_triggered());

        let writer = {
            let flag = Arc::clone(&flag);
            thread::spawn(move || flag.trigger())
        };
        writer.join().unwrap();

        assert!(flag.is_triggered());
        flag.trigger(); // re-triggering is harmless
        assert!(flag.is_triggered());
    }
}
