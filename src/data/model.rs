use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

// ---------------------------------------------------------------------------
// Sample – one (wavenumber, intensity) point
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub wavenumber: f64,
    pub intensity: f64,
}

// ---------------------------------------------------------------------------
// Spectrum – immutable, strictly increasing wavenumber axis
// ---------------------------------------------------------------------------

/// A single spectrum. Every processing stage produces a new `Spectrum`;
/// nothing mutates one after construction.
#[derive(Debug, Clone, PartialEq)]
pub struct Spectrum {
    /// Wavenumber axis (x), strictly increasing.
    x: Vec<f64>,
    /// Intensity axis (y) – same length as `x`.
    y: Vec<f64>,
}

impl Spectrum {
    /// Build a spectrum from an ascending wavenumber axis.
    pub fn new(x: Vec<f64>, y: Vec<f64>) -> Result<Self, ValidationError> {
        if x.len() != y.len() {
            return Err(ValidationError::MalformedSpectrum(format!(
                "x has {} values but y has {}",
                x.len(),
                y.len()
            )));
        }
        if let Some(i) = x.iter().chain(y.iter()).position(|v| !v.is_finite()) {
            return Err(ValidationError::MalformedSpectrum(format!(
                "non-finite value at position {}",
                i % x.len().max(1)
            )));
        }
        if let Some(i) = x.windows(2).position(|w| w[1] <= w[0]) {
            return Err(ValidationError::MalformedSpectrum(format!(
                "wavenumbers must be strictly increasing ({} then {})",
                x[i],
                x[i + 1]
            )));
        }
        Ok(Spectrum { x, y })
    }

    /// Like [`Spectrum::new`] but accepts a descending axis (4000 → 400 cm⁻¹
    /// exports) and flips it.
    pub fn from_unordered(mut x: Vec<f64>, mut y: Vec<f64>) -> Result<Self, ValidationError> {
        if x.len() >= 2 && x[0] > x[x.len() - 1] {
            x.reverse();
            y.reverse();
        }
        Spectrum::new(x, y)
    }

    /// A new spectrum on the same axis with replaced intensities.
    pub(crate) fn with_intensities(&self, y: Vec<f64>) -> Spectrum {
        debug_assert_eq!(y.len(), self.x.len());
        Spectrum {
            x: self.x.clone(),
            y,
        }
    }

    pub fn wavenumbers(&self) -> &[f64] {
        &self.x
    }

    pub fn intensities(&self) -> &[f64] {
        &self.y
    }

    pub fn sample(&self, index: usize) -> Option<Sample> {
        Some(Sample {
            wavenumber: *self.x.get(index)?,
            intensity: *self.y.get(index)?,
        })
    }

    pub fn samples(&self) -> impl Iterator<Item = Sample> + '_ {
        self.x.iter().zip(&self.y).map(|(&wavenumber, &intensity)| Sample {
            wavenumber,
            intensity,
        })
    }

    /// Number of samples.
    pub fn len(&self) -> usize {
        self.x.len()
    }

    pub fn is_empty(&self) -> bool {
        self.x.is_empty()
    }

    /// `(min, max)` wavenumber, `None` for an empty spectrum.
    pub fn range(&self) -> Option<(f64, f64)> {
        Some((*self.x.first()?, *self.x.last()?))
    }
}

// ---------------------------------------------------------------------------
// Peaks and their analysis windows
// ---------------------------------------------------------------------------

/// A detected extremum. Regenerated whenever detection runs.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Peak {
    pub wavenumber: f64,
    pub intensity: f64,
    /// Position of the sample in the spectrum it was detected in.
    pub index: usize,
}

/// Analysis window of one peak, bounded by the midpoints to its neighbours.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PeakBoundary {
    pub peak: Peak,
    pub lower_bound: f64,
    pub upper_bound: f64,
}

impl PeakBoundary {
    pub fn width(&self) -> f64 {
        self.upper_bound - self.lower_bound
    }
}
