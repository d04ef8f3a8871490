/// One interval as seen by the sweep/scan algorithms.
///
/// - `chr`: natural-order rank of the sequence id (see `sorts::SeqCodes`)
/// - `start`, `end`: 1-based inclusive coordinates
/// - `idx`: position of the originating record in its input vector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Interval {
    pub chr: i64,
    pub start: i64,
    pub end: i64,
    pub idx: i64,
}

/// A run of overlapping or abutting spans folded into one.
/// `count` is how many raw spans went into it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MergedSpan {
    pub chr: i64,
    pub start: i64,
    pub end: i64,
    pub count: i64,
}

/// An uncovered stretch of a sequence, the complement of the merged spans.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Gap {
    pub chr: i64,
    pub start: i64,
    pub end: i64,
}
