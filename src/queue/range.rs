use std::fmt;

/// An inclusive, contiguous slice of the search domain.
///
/// Ranges are immutable once created: the queue partitions the domain exactly
/// once, and afterwards ranges only change owner (queued, assigned, returned),
/// never shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Range {
    pub start: u64,
    pub end: u64,
}

impl Range {
    /// Builds an inclusive range. `start` must not be past `end`.
    pub fn new(start: u64, end: u64) -> Self {
        debug_assert!(start <= end, "range start {} past end {}", start, end);
        Self { start, end }
    }

    /// Number of candidate values the range contains (never zero: ranges are
    /// inclusive).
    pub fn count(&self) -> u64 {
        self.end - self.start + 1
    }

    pub fn contains(&self, candidate: u64) -> bool {
        self.start <= candidate && candidate <= self.end
    }

    /// Collapses a list of contiguous ranges into the single range they span.
    ///
    /// Callers get their list from `WorkQueue::pop_contiguous`, which
    /// guarantees `prev.end + 1 == next.start` for every consecutive pair, so
    /// `first.start..=last.end` covers exactly the popped values.
    pub fn coalesce(ranges: &[Range]) -> Option<Range> {
        let first = ranges.first()?;
        let last = ranges.last()?;
        Some(Range::new(first.start, last.end))
    }

    /// Splits the range into up to `parts` contiguous slices of near-equal
    /// size, never more slices than there are candidates.
    pub fn split(&self, parts: usize) -> Vec<Range> {
        let total = self.count();
        let parts = (parts.max(1) as u64).min(total);
        let base = total / parts;
        let extra = total % parts;

        let mut slices = Vec::with_capacity(parts as usize);
        let mut cursor = self.start;
        for index in 0..parts {
            let size = base + u64::from(index < extra);
            let end = cursor + size - 1;
            slices.push(Range::new(cursor, end));
            cursor = end.saturating_add(1);
        }
        slices
    }
}

impl fmt::Display for Range {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.start, self.end)
    }
}
