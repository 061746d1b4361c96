use serde::{Deserialize, Serialize};

use crate::data::model::{Peak, PeakBoundary, Spectrum};
use crate::error::{PipelineError, PipelineResult, Stage, ValidationError};

// ---------------------------------------------------------------------------
// PeakBoundaryAnalyzer
// ---------------------------------------------------------------------------

/// Splits the spectrum range into one window per peak, bounded by the
/// midpoints to the neighbouring peaks.
#[derive(Debug, Clone, Copy, Default)]
pub struct PeakBoundaryAnalyzer;

impl PeakBoundaryAnalyzer {
    /// `peaks` must be ordered by ascending wavenumber and lie inside
    /// `spectrum_range`. The returned windows are contiguous and cover the
    /// whole range.
    pub fn compute_boundaries(
        &self,
        peaks: &[Peak],
        spectrum_range: (f64, f64),
    ) -> PipelineResult<Vec<PeakBoundary>> {
        let n = peaks.len();
        if n == 0 {
            return Err(PipelineError::EmptyPeakSet);
        }

        let (min, max) = spectrum_range;
        if !(min.is_finite() && max.is_finite() && min < max) {
            return Err(ValidationError::InvalidRange {
                index: 0,
                low: min,
                high: max,
            }
            .into());
        }
        if let Some(i) = (1..n).find(|&i| peaks[i].wavenumber <= peaks[i - 1].wavenumber) {
            return Err(ValidationError::UnorderedPeaks {
                index: i,
                wavenumber: peaks[i].wavenumber,
            }
            .into());
        }
        if let Some(p) = peaks.iter().find(|p| p.wavenumber < min || p.wavenumber > max) {
            return Err(ValidationError::parameter(
                "peaks",
                format!("peak at {} lies outside [{min}, {max}]", p.wavenumber),
            )
            .into());
        }

        let boundaries = if n == 1 {
            vec![PeakBoundary {
                peak: peaks[0],
                lower_bound: min,
                upper_bound: max,
            }]
        } else {
            (0..n)
                .map(|i| {
                    let lower_bound = if i == 0 {
                        min
                    } else {
                        midpoint(peaks[i - 1].wavenumber, peaks[i].wavenumber)
                    };
                    let upper_bound = if i == n - 1 {
                        max
                    } else {
                        midpoint(peaks[i].wavenumber, peaks[i + 1].wavenumber)
                    };
                    PeakBoundary {
                        peak: peaks[i],
                        lower_bound,
                        upper_bound,
                    }
                })
                .collect()
        };

        log::debug!("computed {} peak window(s) over [{min}, {max}]", n);
        Ok(boundaries)
    }

    /// Heights and areas of one peak within its window, raw and relative to
    /// a straight line joining the window's first and last samples.
    pub fn analyze_peak(&self, spectrum: &Spectrum, boundary: &PeakBoundary) -> PipelineResult<PeakAnalysis> {
        let window: Vec<(f64, f64)> = spectrum
            .samples()
            .filter(|s| s.wavenumber >= boundary.lower_bound && s.wavenumber <= boundary.upper_bound)
            .map(|s| (s.wavenumber, s.intensity))
            .collect();

        let (Some(&(x0, y0)), Some(&(x1, y1))) = (window.first(), window.last()) else {
            return Err(insufficient(boundary, 0));
        };
        if window.len() < 2 {
            return Err(insufficient(boundary, window.len()));
        }

        let slope = (y1 - y0) / (x1 - x0);
        let line = |x: f64| y0 + slope * (x - x0);

        let uncorrected_area = trapezoid(window.iter().copied());
        let corrected_area = trapezoid(window.iter().map(|&(x, y)| (x, y - line(x))));

        let peak = boundary.peak;
        Ok(PeakAnalysis {
            wavenumber: peak.wavenumber,
            uncorrected_height: peak.intensity,
            corrected_height: peak.intensity - line(peak.wavenumber),
            uncorrected_area,
            corrected_area,
            lower_bound: boundary.lower_bound,
            upper_bound: boundary.upper_bound,
        })
    }

    /// Analyse every window. Windows that cannot be analysed are reported
    /// and left out.
    pub fn analyze_all(&self, spectrum: &Spectrum, boundaries: &[PeakBoundary]) -> Vec<PeakAnalysis> {
        boundaries
            .iter()
            .filter_map(|b| match self.analyze_peak(spectrum, b) {
                Ok(a) => Some(a),
                Err(e) => {
                    e.report();
                    None
                }
            })
            .collect()
    }
}

fn midpoint(a: f64, b: f64) -> f64 {
    a + (b - a) / 2.0
}

fn insufficient(boundary: &PeakBoundary, samples: usize) -> PipelineError {
    PipelineError::InsufficientSamples {
        stage: Stage::PeakAnalysis,
        low: boundary.lower_bound,
        high: boundary.upper_bound,
        samples,
        required: 2,
    }
}

fn trapezoid(points: impl Iterator<Item = (f64, f64)>) -> f64 {
    let mut area = 0.0;
    let mut prev: Option<(f64, f64)> = None;
    for (x, y) in points {
        if let Some((px, py)) = prev {
            area += (x - px) * (y + py) / 2.0;
        }
        prev = Some((x, y));
    }
    area
}

// ---------------------------------------------------------------------------
// PeakAnalysis
// ---------------------------------------------------------------------------

/// Measurements of one peak inside its window.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PeakAnalysis {
    pub wavenumber: f64,
    pub uncorrected_height: f64,
    /// Height above the window's linear baseline.
    pub corrected_height: f64,
    pub uncorrected_area: f64,
    pub corrected_area: f64,
    pub lower_bound: f64,
    pub upper_bound: f64,
}
