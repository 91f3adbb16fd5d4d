use serde::{Deserialize, Serialize};
use std::fmt;

/// Inclusive sample range `[start, end]`.
///
/// An interval only has meaning together with the coordinate space it was
/// taken from (original signal, start signal, or a stage output).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "(usize, usize)", into = "(usize, usize)")]
pub struct Interval {
    pub start: usize,
    pub end: usize,
}

#[allow(clippy::len_without_is_empty)]
impl Interval {
    /// Builds an interval, swapping the bounds if they are reversed.
    pub fn new(a: usize, b: usize) -> Self {
        if a <= b {
            Interval { start: a, end: b }
        } else {
            Interval { start: b, end: a }
        }
    }

    pub fn len(&self) -> usize {
        self.end - self.start + 1
    }

    pub fn contains(&self, idx: usize) -> bool {
        self.start <= idx && idx <= self.end
    }
}

impl From<(usize, usize)> for Interval {
    fn from((a, b): (usize, usize)) -> Self {
        Interval::new(a, b)
    }
}

impl From<Interval> for (usize, usize) {
    fn from(iv: Interval) -> Self {
        (iv.start, iv.end)
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.start, self.end)
    }
}

/// Sort, optionally clamp to `[0, bound-1]`, and merge touching or
/// overlapping intervals.
///
/// Intervals lying entirely past the bound are dropped. With `bound == Some(0)`
/// the result is always empty.
pub fn normalize(intervals: &[Interval], bound: Option<usize>) -> Vec<Interval> {
    let mut xs: Vec<Interval> = intervals
        .iter()
        .map(|iv| Interval::new(iv.start, iv.end))
        .collect();

    if let Some(length) = bound {
        xs = xs
            .into_iter()
            .filter(|iv| iv.start < length)
            .map(|iv| Interval {
                start: iv.start,
                end: iv.end.min(length - 1),
            })
            .collect();
    }

    merge(&xs, 0)
}

/// Alias of [`normalize`] with a mandatory bound.
pub fn clamp(intervals: &[Interval], length: usize) -> Vec<Interval> {
    normalize(intervals, Some(length))
}

/// Sort by start and merge intervals separated by at most `gap` samples.
///
/// `gap == 0` merges only touching or overlapping intervals.
pub fn merge(intervals: &[Interval], gap: usize) -> Vec<Interval> {
    if intervals.is_empty() {
        return Vec::new();
    }

    let mut sorted = intervals.to_vec();
    sorted.sort_by_key(|iv| iv.start);

    let mut out = Vec::with_capacity(sorted.len());
    let mut cur = sorted[0];
    for iv in &sorted[1..] {
        // saturating: a span ending at usize::MAX absorbs everything after it
        if iv.start <= cur.end.saturating_add(gap).saturating_add(1) {
            cur.end = cur.end.max(iv.end);
        } else {
            out.push(cur);
            cur = *iv;
        }
    }
    out.push(cur);
    out
}

/// Maximal intervals of `[0, length-1]` not covered by `removed`.
pub fn complement(removed: &[Interval], length: usize) -> Vec<Interval> {
    if length == 0 {
        return Vec::new();
    }

    let removed = normalize(removed, Some(length));
    let mut kept = Vec::with_capacity(removed.len() + 1);
    let mut cur = 0;
    for iv in &removed {
        if cur < iv.start {
            kept.push(Interval::new(cur, iv.start - 1));
        }
        cur = iv.end + 1;
    }
    if cur < length {
        kept.push(Interval::new(cur, length - 1));
    }
    kept
}

/// Total number of samples covered by a normalized set.
pub fn total_len(intervals: &[Interval]) -> usize {
    intervals.iter().map(Interval::len).sum()
}
