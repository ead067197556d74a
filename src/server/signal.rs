//! Fleet-Wide Stop Signal
//!
//! One flag, set at most a handful of times and meaningful exactly once,
//! tells every session and the accept loop that the search is over. The
//! answer slot is write-once: the first `FN` report to land claims it and
//! every later report is a no-op, so concurrent winners need no lock.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::OnceLock;

/// The process-wide "search is over" flag plus the write-once answer.
///
/// Components receive this by `Arc` at construction; nothing reads ambient
/// global state. Readers never block: the flag is an atomic load and the
/// answer a `OnceLock` peek.
#[derive(Debug, Default)]
pub struct StopSignal {
    stopped: AtomicBool,
    answer: OnceLock<u64>,
}

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a successful candidate and stops the fleet.
    ///
    /// First writer wins; returns whether this call was the one that claimed
    /// the answer slot. Losing calls still leave the stop flag set.
    pub fn try_set(&self, candidate: u64) -> bool {
        let won = self.answer.set(candidate).is_ok();
        self.stopped.store(true, Ordering::SeqCst);
        won
    }

    /// Stops the fleet without an answer (queue exhaustion, external
    /// shutdown). A report racing in afterwards can still claim the answer
    /// slot via `try_set`.
    pub fn request_stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
    }

    pub fn is_set(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    pub fn answer(&self) -> Option<u64> {
        self.answer.get().copied()
    }
}
