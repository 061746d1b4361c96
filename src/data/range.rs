use std::ops;

use serde::{Deserialize, Serialize};

use super::model::{Sample, Spectrum};
use crate::error::ValidationError;

// ---------------------------------------------------------------------------
// Range – a closed wavenumber interval
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Range {
    pub low: f64,
    pub high: f64,
}

impl Range {
    pub fn contains(&self, wavenumber: f64) -> bool {
        self.low <= wavenumber && wavenumber <= self.high
    }
}

/// The samples a range owns inside one spectrum: a contiguous index slice.
#[derive(Debug, Clone, PartialEq)]
pub struct Segment {
    pub range_index: usize,
    pub range: Range,
    pub indices: ops::Range<usize>,
}

impl Segment {
    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }
}

// ---------------------------------------------------------------------------
// RangeSet – validated, sorted, pairwise non-overlapping ranges
// ---------------------------------------------------------------------------

/// Ranges a single operation is scoped to. Only constructible through
/// [`RangeSet::validate`] (or [`RangeSet::full`]), so every instance holds
/// sorted, non-overlapping intervals.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RangeSet {
    ranges: Vec<Range>,
}

impl RangeSet {
    /// Check user-entered `(low, high)` pairs and sort them by low bound.
    /// Touching endpoints (`b.low == a.high`) are not an overlap.
    pub fn validate(pairs: &[(f64, f64)]) -> Result<Self, ValidationError> {
        let mut ranges = Vec::with_capacity(pairs.len());
        for (index, &(low, high)) in pairs.iter().enumerate() {
            if !(low.is_finite() && high.is_finite() && low < high) {
                return Err(ValidationError::InvalidRange { index, low, high });
            }
            ranges.push(Range { low, high });
        }

        ranges.sort_by(|a, b| a.low.total_cmp(&b.low));

        // Sorted by low, so checking neighbours is enough.
        if let Some(w) = ranges.windows(2).find(|w| w[1].low < w[0].high) {
            return Err(ValidationError::OverlappingRange {
                first_low: w[0].low,
                first_high: w[0].high,
                second_low: w[1].low,
                second_high: w[1].high,
            });
        }

        Ok(RangeSet { ranges })
    }

    /// A single range spanning the whole spectrum (empty set for spectra
    /// with fewer than two samples).
    pub fn full(spectrum: &Spectrum) -> Self {
        match spectrum.range() {
            Some((low, high)) if low < high => RangeSet {
                ranges: vec![Range { low, high }],
            },
            _ => RangeSet::default(),
        }
    }

    pub fn ranges(&self) -> &[Range] {
        &self.ranges
    }

    pub fn len(&self) -> usize {
        self.ranges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    pub fn contains(&self, wavenumber: f64) -> bool {
        self.ranges.iter().any(|r| r.contains(wavenumber))
    }

    /// Split `spectrum` into the index slices owned by each range.
    ///
    /// A sample sitting on a shared endpoint goes to the lower range only,
    /// so segments never share samples. Ranges that miss the spectrum yield
    /// empty segments.
    pub fn segments(&self, spectrum: &Spectrum) -> Vec<Segment> {
        let x = spectrum.wavenumbers();
        let mut claimed = 0;
        self.ranges
            .iter()
            .enumerate()
            .map(|(range_index, range)| {
                let start = x.partition_point(|&v| v < range.low).max(claimed);
                let end = x.partition_point(|&v| v <= range.high).max(start);
                claimed = end;
                Segment {
                    range_index,
                    range: *range,
                    indices: start..end,
                }
            })
            .collect()
    }

    /// Every sample covered by the set, tagged with its range index.
    pub fn restrict_to(&self, spectrum: &Spectrum) -> Vec<(Sample, usize)> {
        self.segments(spectrum)
            .into_iter()
            .flat_map(|seg| {
                seg.indices
                    .filter_map(|i| spectrum.sample(i))
                    .map(move |s| (s, seg.range_index))
                    .collect::<Vec<_>>()
            })
            .collect()
    }
}

/// Normalise loosely entered pairs: order each pair, then merge pairs that
/// overlap or lie within `gap` of each other. Result is sorted.
pub fn merge_overlapping(pairs: &[(f64, f64)], gap: f64) -> Vec<(f64, f64)> {
    let mut sorted: Vec<(f64, f64)> = pairs
        .iter()
        .map(|&(a, b)| if a <= b { (a, b) } else { (b, a) })
        .collect();
    sorted.sort_by(|a, b| a.0.total_cmp(&b.0));

    let mut merged: Vec<(f64, f64)> = Vec::with_capacity(sorted.len());
    for (low, high) in sorted {
        match merged.last_mut() {
            Some(last) if low <= last.1 + gap => {
                log::debug!("merging [{low:.2}, {high:.2}] into [{:.2}, {:.2}]", last.0, last.1);
                last.1 = last.1.max(high);
            }
            _ => merged.push((low, high)),
        }
    }
    merged
}
