//! Load sequencing.

use std::sync::atomic::{AtomicU64, Ordering};

/// Hands out strictly increasing tickets for collection loads.
///
/// Ticket `0` is never issued; it marks a collection nothing has been applied to.
#[derive(Debug, Default)]
pub struct LoadSequencer {
    issued: AtomicU64,
}

impl LoadSequencer {
    /// Creates a sequencer with no tickets issued.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            issued: AtomicU64::new(0),
        }
    }

    /// Issues the next ticket.
    pub fn issue(&self) -> u64 {
        self.issued.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// The most recently issued ticket, or `0`.
    #[must_use]
    pub fn latest(&self) -> u64 {
        self.issued.load(Ordering::SeqCst)
    }
}
