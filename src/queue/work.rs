//! The Shared Work Queue
//!
//! One mutex serializes every operation: a pop that has to push a
//! non-contiguous chunk back is a single critical section, so no caller ever
//! observes a torn queue. The lock is a plain blocking mutex: operations are
//! pure deque surgery and never held across an await point.

use std::collections::VecDeque;

use parking_lot::Mutex;

use super::range::Range;

/// The ordered, disjoint set of not-yet-assigned ranges.
///
/// At construction the queued ranges partition `[domain_start, domain_end]`
/// exactly: ascending, gap-free, non-overlapping. From then on ranges only
/// leave via `pop_contiguous` and come back via `requeue`; the queue never
/// reshapes them.
pub struct WorkQueue {
    chunks: Mutex<VecDeque<Range>>,
}

impl WorkQueue {
    /// Eagerly partitions the domain into consecutive `chunk_size`-sized
    /// ranges, the last one truncated to `domain_end`.
    pub fn new(domain_start: u64, domain_end: u64, chunk_size: u64) -> Self {
        assert!(chunk_size > 0, "chunk size must be positive");
        assert!(
            domain_start <= domain_end,
            "domain start {} past end {}",
            domain_start,
            domain_end
        );

        let mut chunks = VecDeque::new();
        let mut cursor = domain_start;
        while cursor <= domain_end {
            let end = domain_end.min(cursor.saturating_add(chunk_size - 1));
            chunks.push_back(Range::new(cursor, end));
            cursor = match end.checked_add(1) {
                Some(next) => next,
                None => break,
            };
        }

        tracing::debug!(
            "partitioned domain {}-{} into {} chunk(s) of up to {}",
            domain_start,
            domain_end,
            chunks.len(),
            chunk_size
        );

        Self {
            chunks: Mutex::new(chunks),
        }
    }

    /// Pops up to `max_chunks` ranges off the front, stopping early at the
    /// first chunk that does not directly continue the previous one
    /// (`prev.end + 1 != next.start`); that chunk goes back to the front.
    ///
    /// The returned list therefore always coalesces into one contiguous
    /// range. An empty queue yields an empty list; emptiness is the
    /// caller's signal, not an error.
    pub fn pop_contiguous(&self, max_chunks: usize) -> Vec<Range> {
        let mut chunks = self.chunks.lock();
        let mut popped: Vec<Range> = Vec::new();

        for _ in 0..max_chunks {
            let Some(chunk) = chunks.pop_front() else {
                break;
            };

            if let Some(prev) = popped.last() {
                if prev.end + 1 != chunk.start {
                    tracing::debug!(
                        "chunk {} does not continue {}, leaving it queued",
                        chunk,
                        prev
                    );
                    chunks.push_front(chunk);
                    break;
                }
            }

            popped.push(chunk);
        }

        popped
    }

    /// Returns a forward-ordered list of chunks to the front of the queue.
    ///
    /// The list is prepended chunk by chunk in reverse, which restores the
    /// original ascending order since the chunks were popped front-to-back.
    pub fn requeue(&self, returned: Vec<Range>) {
        if returned.is_empty() {
            return;
        }

        let mut chunks = self.chunks.lock();
        for chunk in returned.into_iter().rev() {
            chunks.push_front(chunk);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.lock().is_empty()
    }

    /// Number of chunks currently queued.
    pub fn len(&self) -> usize {
        self.chunks.lock().len()
    }

    /// Copies out the queued chunks in order. Accessor for testing.
    pub fn snapshot(&self) -> Vec<Range> {
        self.chunks.lock().iter().copied().collect()
    }
}
