use crate::intervals::{self, Interval};
use log::trace;
use serde::Serialize;
use thiserror::Error;

/// A surviving input range and the output range it was renumbered to.
///
/// Both ranges are inclusive and always have the same length.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct KeptSpan {
    pub in_start: usize,
    pub in_end: usize,
    pub out_start: usize,
    pub out_end: usize,
}

#[allow(clippy::len_without_is_empty)]
impl KeptSpan {
    pub fn len(&self) -> usize {
        self.in_end - self.in_start + 1
    }

    pub fn input(&self) -> Interval {
        Interval::new(self.in_start, self.in_end)
    }

    pub fn output(&self) -> Interval {
        Interval::new(self.out_start, self.out_end)
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IndexMapError {
    #[error("cannot compose maps: second map expects {expected} input samples but the first produces {actual}")]
    LengthMismatch { expected: usize, actual: usize },

    #[error("output index {index} is outside the mapped output range (length {len})")]
    OutOfRange { index: usize, len: usize },

    #[error("kept span {0} overlaps or precedes the previous kept span")]
    UnsortedSpans(Interval),

    #[error("kept span {span} exceeds input length {len}")]
    SpanOutOfBounds { span: Interval, len: usize },
}

/// Coordinate transform induced by deleting ranges from a sequence.
///
/// Kept spans are stored ascending in both input and output space, and their
/// output ranges tile `[0, output_len - 1]` without gaps. Every lookup below
/// binary-searches `kept`, so that ordering is load-bearing: it is checked
/// after construction and after composition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IndexMap {
    kept: Vec<KeptSpan>,
    input_len: usize,
    output_len: usize,
}

impl IndexMap {
    /// Map of a sequence of `len` samples from which nothing was removed.
    pub fn identity(len: usize) -> Self {
        Self::from_sorted(&intervals::complement(&[], len), len)
    }

    /// Builds a map from the input ranges that survive a deletion.
    ///
    /// Output positions are assigned by concatenating the kept ranges in
    /// order. `kept_in` must be ascending, non-overlapping and inside
    /// `[0, input_len - 1]`.
    pub fn from_kept_spans(kept_in: &[Interval], input_len: usize) -> Result<Self, IndexMapError> {
        let mut prev_end: Option<usize> = None;
        for iv in kept_in {
            if iv.start > iv.end || prev_end.is_some_and(|p| iv.start <= p) {
                return Err(IndexMapError::UnsortedSpans(*iv));
            }
            if iv.end >= input_len {
                return Err(IndexMapError::SpanOutOfBounds {
                    span: *iv,
                    len: input_len,
                });
            }
            prev_end = Some(iv.end);
        }
        Ok(Self::from_sorted(kept_in, input_len))
    }

    /// Builds a map from the input ranges that were deleted.
    ///
    /// `removed_in` may be unsorted or overlapping; it is normalized against
    /// `input_len` first.
    pub fn from_removed_spans(removed_in: &[Interval], input_len: usize) -> Self {
        Self::from_sorted(&intervals::complement(removed_in, input_len), input_len)
    }

    fn from_sorted(kept_in: &[Interval], input_len: usize) -> Self {
        let mut kept = Vec::with_capacity(kept_in.len());
        let mut out_pos = 0;
        for iv in kept_in {
            let len = iv.len();
            kept.push(KeptSpan {
                in_start: iv.start,
                in_end: iv.end,
                out_start: out_pos,
                out_end: out_pos + len - 1,
            });
            out_pos += len;
        }

        let map = IndexMap {
            kept: coalesce(kept),
            input_len,
            output_len: out_pos,
        };
        debug_assert!(map.invariants_hold(), "kept spans out of order: {:?}", map.kept);
        map
    }

    pub fn kept(&self) -> &[KeptSpan] {
        &self.kept
    }

    pub fn input_len(&self) -> usize {
        self.input_len
    }

    pub fn output_len(&self) -> usize {
        self.output_len
    }

    pub fn is_identity(&self) -> bool {
        self.input_len == self.output_len
    }

    /// Input ranges that this map deletes.
    pub fn removed(&self) -> Vec<Interval> {
        let kept: Vec<Interval> = self.kept.iter().map(KeptSpan::input).collect();
        intervals::complement(&kept, self.input_len)
    }

    /// Translates input-space intervals to output space.
    ///
    /// Samples that fall in a removed region, or past the end of the input,
    /// have no image and are dropped without error. A query lying entirely in
    /// removed space therefore maps to an empty set.
    pub fn project_forward(&self, intervals_in: &[Interval]) -> Vec<Interval> {
        let mut res = Vec::new();
        for iv in intervals_in {
            let iv = Interval::new(iv.start, iv.end);
            res.extend(self.forward_pieces(iv.start, iv.end).map(|p| p.output()));
        }
        intervals::normalize(&res, None)
    }

    /// Translates output-space intervals back to input space.
    ///
    /// Every output index belongs to exactly one kept span, so nothing is
    /// dropped. An index at or past `output_len` is a caller error.
    pub fn project_backward(&self, intervals_out: &[Interval]) -> Result<Vec<Interval>, IndexMapError> {
        let mut res = Vec::new();
        for iv in intervals_out {
            let iv = Interval::new(iv.start, iv.end);
            if iv.end >= self.output_len {
                return Err(IndexMapError::OutOfRange {
                    index: iv.end,
                    len: self.output_len,
                });
            }
            res.extend(self.backward_pieces(iv.start, iv.end).map(|p| p.input()));
        }
        Ok(intervals::normalize(&res, None))
    }

    /// Collapses `self: A -> B` followed by `other: B -> C` into `A -> C`.
    pub fn compose(&self, other: &IndexMap) -> Result<IndexMap, IndexMapError> {
        if other.input_len != self.output_len {
            return Err(IndexMapError::LengthMismatch {
                expected: other.input_len,
                actual: self.output_len,
            });
        }

        let mut spans = Vec::new();
        for k in &self.kept {
            // p.in_* are B positions inside this span's output range; the
            // matching A position sits at the same offset from in_start.
            for p in other.forward_pieces(k.out_start, k.out_end) {
                let in_start = k.in_start + (p.in_start - k.out_start);
                spans.push(KeptSpan {
                    in_start,
                    in_end: in_start + p.len() - 1,
                    out_start: p.out_start,
                    out_end: p.out_end,
                });
            }
        }
        spans.sort_by_key(|s| (s.in_start, s.out_start));

        let map = IndexMap {
            kept: coalesce(spans),
            input_len: self.input_len,
            output_len: other.output_len,
        };
        trace!(
            "composed {} x {} kept spans into {}",
            self.kept.len(),
            other.kept.len(),
            map.kept.len()
        );
        debug_assert!(map.invariants_hold(), "composition broke ordering: {:?}", map.kept);
        Ok(map)
    }

    /// Surviving pieces of input range `[s, e]`, clipped to kept spans.
    fn forward_pieces(&self, s: usize, e: usize) -> impl Iterator<Item = KeptSpan> + '_ {
        let first = self.kept.partition_point(|k| k.in_end < s);
        self.kept[first..]
            .iter()
            .take_while(move |k| k.in_start <= e)
            .map(move |k| {
                let a = s.max(k.in_start);
                let b = e.min(k.in_end);
                KeptSpan {
                    in_start: a,
                    in_end: b,
                    out_start: k.out_start + (a - k.in_start),
                    out_end: k.out_start + (b - k.in_start),
                }
            })
    }

    /// Pieces of output range `[s, e]`, clipped to kept spans.
    fn backward_pieces(&self, s: usize, e: usize) -> impl Iterator<Item = KeptSpan> + '_ {
        let first = self.kept.partition_point(|k| k.out_end < s);
        self.kept[first..]
            .iter()
            .take_while(move |k| k.out_start <= e)
            .map(move |k| {
                let a = s.max(k.out_start);
                let b = e.min(k.out_end);
                KeptSpan {
                    in_start: k.in_start + (a - k.out_start),
                    in_end: k.in_start + (b - k.out_start),
                    out_start: a,
                    out_end: b,
                }
            })
    }

    fn invariants_hold(&self) -> bool {
        let mut next_out = 0;
        let mut prev_in: Option<usize> = None;
        for k in &self.kept {
            if k.in_end < k.in_start
                || k.in_end - k.in_start != k.out_end.wrapping_sub(k.out_start)
                || k.out_start != next_out
                || k.in_end >= self.input_len
                || prev_in.is_some_and(|p| k.in_start <= p)
            {
                return false;
            }
            next_out = k.out_end + 1;
            prev_in = Some(k.in_end);
        }
        next_out == self.output_len
    }
}

/// Merges neighbours that are contiguous in both spaces at once.
fn coalesce(spans: Vec<KeptSpan>) -> Vec<KeptSpan> {
    let mut merged: Vec<KeptSpan> = Vec::with_capacity(spans.len());
    for span in spans {
        match merged.last_mut() {
            Some(prev) if prev.in_end + 1 == span.in_start && prev.out_end + 1 == span.out_start => {
                prev.in_end = span.in_end;
                prev.out_end = span.out_end;
            }
            _ => merged.push(span),
        }
    }
    merged
}
