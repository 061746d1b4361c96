//! Processing layer: range-scoped stages, peak detection and peak windows.
//!
//! ```text
//!   Spectrum + RangeSet
//!        │
//!        ▼
//!   ┌──────────┐
//!   │ baseline  │  per-range correction (optional)
//!   └──────────┘
//!        │
//!        ▼
//!   ┌──────────┐
//!   │ smoothing │  per-range smoothing (optional)
//!   └──────────┘
//!        │
//!        ▼
//!   ┌──────────┐
//!   │  peaks    │  local extrema → Vec<Peak>
//!   └──────────┘
//!        │
//!        ▼
//!   ┌──────────┐
//!   │ boundary  │  midpoint windows → Vec<PeakBoundary>
//!   └──────────┘
//! ```

pub mod baseline;
pub mod boundary;
pub mod numeric;
pub mod params;
pub mod peaks;
pub mod smoothing;

pub use baseline::BaselineEngine;
pub use boundary::{PeakAnalysis, PeakBoundaryAnalyzer};
pub use params::{
    BaselineMethod, PeakDirection, PeakParameters, ProcessingParameters, SmoothingMethod,
};
pub use peaks::PeakDetector;
pub use smoothing::SmoothingEngine;

use crate::data::model::Spectrum;
use crate::data::range::RangeSet;
use crate::error::{PipelineError, PipelineResult, Stage};

// ---------------------------------------------------------------------------
// Pluggable per-range algorithm
// ---------------------------------------------------------------------------

/// An algorithm that rewrites the intensities of one contiguous segment.
/// Implementations must be deterministic: the same input always gives
/// bit-identical output.
pub trait SegmentAlgorithm {
    fn stage(&self) -> Stage;

    /// Fewest samples one segment must hold.
    fn min_samples(&self) -> usize;

    /// New intensities for the segment, same length as `y`.
    fn process(&self, x: &[f64], y: &[f64]) -> Result<Vec<f64>, String>;
}

/// Run `algorithm` over every segment owned by `ranges`, leaving samples
/// outside all ranges untouched. Segments are processed independently so no
/// algorithm window ever spans two ranges.
pub fn apply_in_ranges<A>(
    spectrum: &Spectrum,
    ranges: &RangeSet,
    algorithm: &A,
) -> PipelineResult<Spectrum>
where
    A: SegmentAlgorithm + ?Sized,
{
    if ranges.is_empty() {
        return Ok(spectrum.clone());
    }

    let stage = algorithm.stage();
    let required = algorithm.min_samples();
    let segments = ranges.segments(spectrum);

    // Size check for every range before touching any of them.
    if let Some(seg) = segments.iter().find(|s| s.len() < required) {
        return Err(PipelineError::InsufficientSamples {
            stage,
            low: seg.range.low,
            high: seg.range.high,
            samples: seg.len(),
            required,
        });
    }

    let x = spectrum.wavenumbers();
    let source = spectrum.intensities();
    let mut y = source.to_vec();

    for seg in &segments {
        let idx = seg.indices.clone();
        let out = algorithm
            .process(&x[idx.clone()], &source[idx.clone()])
            .map_err(|message| PipelineError::stage(stage, message))?;

        if out.len() != idx.len() {
            return Err(PipelineError::stage(
                stage,
                format!("produced {} values for {} samples", out.len(), idx.len()),
            ));
        }
        if out.iter().any(|v| !v.is_finite()) {
            return Err(PipelineError::stage(
                stage,
                format!(
                    "non-finite output in range [{}, {}]",
                    seg.range.low, seg.range.high
                ),
            ));
        }
        y[idx].copy_from_slice(&out);
    }

    Ok(spectrum.with_intensities(y))
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Doubler;

    impl SegmentAlgorithm for Doubler {
        fn stage(&self) -> Stage {
            Stage::Smoothing
        }
        fn min_samples(&self) -> usize {
            2
        }
        fn process(&self, _x: &[f64], y: &[f64]) -> Result<Vec<f64>, String> {
            Ok(y.iter().map(|v| v * 2.0).collect())
        }
    }

    struct Broken;

    impl SegmentAlgorithm for Broken {
        fn stage(&self) -> Stage {
            Stage::Baseline
        }
        fn min_samples(&self) -> usize {
            1
        }
        fn process(&self, _x: &[f64], _y: &[f64]) -> Result<Vec<f64>, String> {
            Err("diverged".into())
        }
    }

    fn spectrum() -> Spectrum {
        let x: Vec<f64> = (0..10).map(|i| 100.0 + i as f64).collect();
        Spectrum::new(x, vec![1.0; 10]).unwrap()
    }

    #[test]
    fn empty_rangeset_is_identity() {
        let sp = spectrum();
        let out = apply_in_ranges(&sp, &RangeSet::default(), &Doubler).unwrap();
        assert_eq!(out, sp);
    }

    #[test]
    fn only_samples_inside_ranges_change() {
        let sp = spectrum();
        let ranges = RangeSet::validate(&[(102.0, 103.0), (107.0, 109.0)]).unwrap();
        let out = apply_in_ranges(&sp, &ranges, &Doubler).unwrap();
        assert_eq!(
            out.intensities(),
            &[1.0, 1.0, 2.0, 2.0, 1.0, 1.0, 1.0, 2.0, 2.0, 2.0]
        );
    }

    #[test]
    fn small_range_reports_insufficient_samples() {
        let sp = spectrum();
        let ranges = RangeSet::validate(&[(100.0, 105.0), (108.5, 109.5)]).unwrap();
        let err = apply_in_ranges(&sp, &ranges, &Doubler).unwrap_err();
        assert!(matches!(
            err,
            PipelineError::InsufficientSamples { samples: 1, required: 2, .. }
        ));
    }

    #[test]
    fn algorithm_failure_is_a_stage_error() {
        let sp = spectrum();
        let err = apply_in_ranges(&sp, &RangeSet::full(&sp), &Broken).unwrap_err();
        assert_eq!(err, PipelineError::stage(Stage::Baseline, "diverged"));
    }
}
