//! Parallel Range Search
//!
//! Evaluates every candidate in an assigned range across a bounded pool of
//! concurrent lanes. The coordination is one shared cancellation flag plus
//! the first `Some` result observed: a lane that finds the match flips the
//! flag, every other lane stops scheduling new candidates at its next check,
//! and nothing is ever interrupted mid-evaluation.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::task::JoinSet;

use crate::queue::Range;

use super::types::CandidateTest;

/// Shared level-triggered cancellation flag.
///
/// Cloned into every search lane and held by the agent, so both a sibling
/// lane's match and an unsolicited stop notice from the server cancel the
/// same way.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_set(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Fans an assigned range out across up to `lanes` concurrent search lanes.
#[derive(Clone)]
pub struct SearchExecutor {
    lanes: usize,
    test: CandidateTest,
}

impl SearchExecutor {
    pub fn new(lanes: usize, test: CandidateTest) -> Self {
        Self {
            lanes: lanes.max(1),
            test,
        }
    }

    /// Searches the range, returning the first match any lane observes, or
    /// `None` once every candidate has been evaluated (or the flag was set
    /// with nothing found).
    ///
    /// Candidate evaluation is CPU-bound, so lanes run on the blocking pool.
    /// Two lanes matching in the same instant resolve to whichever joins
    /// first; any match is equally valid, so the race is harmless.
    pub async fn run(&self, range: Range, cancel: CancelFlag) -> Option<u64> {
        let slices = range.split(self.lanes);
        tracing::debug!("searching {} across {} lane(s)", range, slices.len());

        let mut lanes = JoinSet::new();
        for slice in slices {
            let test = self.test.clone();
            let cancel = cancel.clone();
            lanes.spawn_blocking(move || scan_lane(slice, test, cancel));
        }

        while let Some(joined) = lanes.join_next().await {
            match joined {
                Ok(Some(candidate)) => {
                    // Remaining lanes wind down on their own via the flag.
                    tracing::info!("match found: {}", candidate);
                    return Some(candidate);
                }
                Ok(None) => {}
                Err(e) => tracing::error!("search lane failed: {}", e),
            }
        }

        None
    }
}

/// One lane: walk the slice, re-checking the flag before every candidate.
fn scan_lane(slice: Range, test: CandidateTest, cancel: CancelFlag) -> Option<u64> {
    for candidate in slice.start..=slice.end {
        if cancel.is_set() {
            return None;
        }
        if test(candidate) {
            cancel.set();
            return Some(candidate);
        }
    }
    None
}
