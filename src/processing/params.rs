use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

// ---------------------------------------------------------------------------
// Smoothing
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum SmoothingMethod {
    SavitzkyGolay { window_length: usize, polyorder: usize },
    MovingAverage { window_length: usize },
    Median { window_length: usize },
    Gaussian { sigma: f64 },
    Lowess { frac: f64, iterations: usize },
}

impl SmoothingMethod {
    pub fn name(&self) -> &'static str {
        match self {
            SmoothingMethod::SavitzkyGolay { .. } => "savitzky_golay",
            SmoothingMethod::MovingAverage { .. } => "moving_average",
            SmoothingMethod::Median { .. } => "median",
            SmoothingMethod::Gaussian { .. } => "gaussian",
            SmoothingMethod::Lowess { .. } => "lowess",
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        match *self {
            SmoothingMethod::SavitzkyGolay {
                window_length,
                polyorder,
            } => {
                if window_length < 3 || window_length % 2 == 0 {
                    return Err(ValidationError::parameter(
                        "window_length",
                        format!("must be odd and at least 3, got {window_length}"),
                    ));
                }
                if polyorder >= window_length {
                    return Err(ValidationError::parameter(
                        "polyorder",
                        format!("must be below window_length ({window_length}), got {polyorder}"),
                    ));
                }
            }
            SmoothingMethod::MovingAverage { window_length } => {
                if window_length == 0 {
                    return Err(ValidationError::parameter("window_length", "must be at least 1"));
                }
            }
            SmoothingMethod::Median { window_length } => {
                if window_length % 2 == 0 {
                    return Err(ValidationError::parameter(
                        "window_length",
                        format!("must be odd, got {window_length}"),
                    ));
                }
            }
            SmoothingMethod::Gaussian { sigma } => {
                if !(sigma.is_finite() && sigma > 0.0) {
                    return Err(ValidationError::parameter(
                        "sigma",
                        format!("must be positive, got {sigma}"),
                    ));
                }
            }
            SmoothingMethod::Lowess { frac, iterations } => {
                if !(frac > 0.0 && frac <= 1.0) {
                    return Err(ValidationError::parameter(
                        "frac",
                        format!("must be in (0, 1], got {frac}"),
                    ));
                }
                if iterations == 0 {
                    return Err(ValidationError::parameter("iterations", "must be at least 1"));
                }
            }
        }
        Ok(())
    }

    /// Fewest samples a single range must hold for this method.
    pub fn min_samples(&self) -> usize {
        match *self {
            SmoothingMethod::SavitzkyGolay { window_length, .. }
            | SmoothingMethod::MovingAverage { window_length }
            | SmoothingMethod::Median { window_length } => window_length,
            SmoothingMethod::Gaussian { .. } | SmoothingMethod::Lowess { .. } => 3,
        }
    }
}

// ---------------------------------------------------------------------------
// Baseline correction
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum BaselineMethod {
    Rubberband,
    Modpoly {
        poly_order: usize,
        #[serde(default = "default_max_iter")]
        max_iter: usize,
        #[serde(default = "default_tol")]
        tol: f64,
    },
    Imodpoly {
        poly_order: usize,
        #[serde(default = "default_max_iter")]
        max_iter: usize,
        #[serde(default = "default_tol")]
        tol: f64,
    },
    Asls {
        lam: f64,
        p: f64,
        #[serde(default = "default_max_iter")]
        max_iter: usize,
    },
}

fn default_max_iter() -> usize {
    50
}

fn default_tol() -> f64 {
    1e-3
}

impl BaselineMethod {
    pub fn name(&self) -> &'static str {
        match self {
            BaselineMethod::Rubberband => "rubberband",
            BaselineMethod::Modpoly { .. } => "modpoly",
            BaselineMethod::Imodpoly { .. } => "imodpoly",
            BaselineMethod::Asls { .. } => "asls",
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        match *self {
            BaselineMethod::Rubberband => {}
            BaselineMethod::Modpoly {
                poly_order,
                max_iter,
                tol,
            }
            | BaselineMethod::Imodpoly {
                poly_order,
                max_iter,
                tol,
            } => {
                if poly_order == 0 {
                    return Err(ValidationError::parameter("poly_order", "must be at least 1"));
                }
                if max_iter == 0 {
                    return Err(ValidationError::parameter("max_iter", "must be at least 1"));
                }
                if !(tol.is_finite() && tol > 0.0) {
                    return Err(ValidationError::parameter(
                        "tol",
                        format!("must be positive, got {tol}"),
                    ));
                }
            }
            BaselineMethod::Asls { lam, p, max_iter } => {
                if !(lam.is_finite() && lam > 0.0) {
                    return Err(ValidationError::parameter(
                        "lam",
                        format!("must be positive, got {lam}"),
                    ));
                }
                if !(p > 0.0 && p < 1.0) {
                    return Err(ValidationError::parameter(
                        "p",
                        format!("must be in (0, 1), got {p}"),
                    ));
                }
                if max_iter == 0 {
                    return Err(ValidationError::parameter("max_iter", "must be at least 1"));
                }
            }
        }
        Ok(())
    }

    pub fn min_samples(&self) -> usize {
        match *self {
            BaselineMethod::Rubberband | BaselineMethod::Asls { .. } => 3,
            BaselineMethod::Modpoly { poly_order, .. } | BaselineMethod::Imodpoly { poly_order, .. } => {
                poly_order + 2
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Peak detection
// ---------------------------------------------------------------------------

/// Maxima for absorbance-style spectra, minima for transmittance.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PeakDirection {
    #[default]
    Maxima,
    Minima,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeakParameters {
    #[serde(default)]
    pub direction: PeakDirection,
    /// Maxima: minimum intensity. Minima: maximum intensity.
    #[serde(default)]
    pub threshold: Option<f64>,
    #[serde(default)]
    pub min_prominence: Option<f64>,
    /// Minimum distance between peaks, in samples.
    #[serde(default = "default_min_distance")]
    pub min_distance: usize,
}

fn default_min_distance() -> usize {
    1
}

impl Default for PeakParameters {
    fn default() -> Self {
        Self {
            direction: PeakDirection::Maxima,
            threshold: None,
            min_prominence: None,
            min_distance: 1,
        }
    }
}

impl PeakParameters {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.min_distance == 0 {
            return Err(ValidationError::parameter("min_distance", "must be at least 1"));
        }
        if let Some(t) = self.threshold {
            if !t.is_finite() {
                return Err(ValidationError::parameter("threshold", "must be finite"));
            }
        }
        if let Some(p) = self.min_prominence {
            if !(p.is_finite() && p >= 0.0) {
                return Err(ValidationError::parameter(
                    "min_prominence",
                    format!("must be non-negative, got {p}"),
                ));
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// ProcessingParameters – one request's full configuration
// ---------------------------------------------------------------------------

/// Immutable per-request configuration, compared by value for preview reuse.
/// A `None` stage is skipped; peaks (and boundaries) are only produced when
/// `peaks` is set.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessingParameters {
    pub baseline: Option<BaselineMethod>,
    pub smoothing: Option<SmoothingMethod>,
    pub peaks: Option<PeakParameters>,
}

impl ProcessingParameters {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if let Some(b) = &self.baseline {
            b.validate()?;
        }
        if let Some(s) = &self.smoothing {
            s.validate()?;
        }
        if let Some(p) = &self.peaks {
            p.validate()?;
        }
        Ok(())
    }
}
