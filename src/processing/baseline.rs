use super::numeric::{polyfit, polyval, relative_difference, scale_to_unit, solve_pentadiagonal, std_dev};
use super::params::BaselineMethod;
use super::{apply_in_ranges, SegmentAlgorithm};
use crate::data::model::Spectrum;
use crate::data::range::RangeSet;
use crate::error::{PipelineResult, Stage};

// ---------------------------------------------------------------------------
// BaselineEngine
// ---------------------------------------------------------------------------

/// Subtracts a [`BaselineMethod`] estimate independently inside each range.
#[derive(Debug, Clone, Copy, Default)]
pub struct BaselineEngine;

impl BaselineEngine {
    pub fn apply(
        &self,
        spectrum: &Spectrum,
        ranges: &RangeSet,
        method: &BaselineMethod,
    ) -> PipelineResult<Spectrum> {
        method.validate()?;
        let out = apply_in_ranges(spectrum, ranges, method)?;
        log::info!(
            "baseline correction ({}) applied over {} range(s)",
            method.name(),
            ranges.len()
        );
        Ok(out)
    }
}

impl SegmentAlgorithm for BaselineMethod {
    fn stage(&self) -> Stage {
        Stage::Baseline
    }

    fn min_samples(&self) -> usize {
        BaselineMethod::min_samples(self)
    }

    fn process(&self, x: &[f64], y: &[f64]) -> Result<Vec<f64>, String> {
        let baseline = estimate(self, x, y)?;
        Ok(y.iter().zip(&baseline).map(|(v, b)| v - b).collect())
    }
}

/// The baseline itself (not the corrected signal) for one segment.
fn estimate(method: &BaselineMethod, x: &[f64], y: &[f64]) -> Result<Vec<f64>, String> {
    match *method {
        BaselineMethod::Rubberband => Ok(rubberband(x, y)),
        BaselineMethod::Modpoly {
            poly_order,
            max_iter,
            tol,
        } => modpoly(x, y, poly_order, max_iter, tol),
        BaselineMethod::Imodpoly {
            poly_order,
            max_iter,
            tol,
        } => imodpoly(x, y, poly_order, max_iter, tol),
        BaselineMethod::Asls { lam, p, max_iter } => asls(y, lam, p, max_iter),
    }
}

// ---------------------------------------------------------------------------
// Rubberband – lower convex hull
// ---------------------------------------------------------------------------

fn rubberband(x: &[f64], y: &[f64]) -> Vec<f64> {
    let cross = |o: usize, a: usize, b: usize| {
        (x[a] - x[o]) * (y[b] - y[o]) - (y[a] - y[o]) * (x[b] - x[o])
    };

    // Monotone chain over the already sorted axis.
    let mut hull: Vec<usize> = Vec::new();
    for i in 0..x.len() {
        while hull.len() >= 2 && cross(hull[hull.len() - 2], hull[hull.len() - 1], i) <= 0.0 {
            hull.pop();
        }
        hull.push(i);
    }

    let mut baseline = vec![0.0; x.len()];
    for pair in hull.windows(2) {
        let (a, b) = (pair[0], pair[1]);
        let slope = (y[b] - y[a]) / (x[b] - x[a]);
        for i in a..=b {
            baseline[i] = y[a] + slope * (x[i] - x[a]);
        }
    }
    if let [only] = hull[..] {
        baseline[only] = y[only];
    }
    baseline
}

// ---------------------------------------------------------------------------
// Modified polyfit family
// ---------------------------------------------------------------------------

fn fit(t: &[f64], y: &[f64], order: usize) -> Result<Vec<f64>, String> {
    let coeffs = polyfit(t, y, None, order).ok_or("singular polynomial fit")?;
    Ok(t.iter().map(|&v| polyval(&coeffs, v)).collect())
}

/// Clip the signal to the fitted polynomial each iteration until the fit
/// stops moving.
fn modpoly(x: &[f64], y: &[f64], order: usize, max_iter: usize, tol: f64) -> Result<Vec<f64>, String> {
    let t = scale_to_unit(x);
    let mut signal = y.to_vec();
    let mut baseline = fit(&t, &signal, order)?;

    for _ in 0..max_iter {
        for (s, b) in signal.iter_mut().zip(&baseline) {
            *s = s.min(*b);
        }
        let next = fit(&t, &signal, order)?;
        let converged = relative_difference(&baseline, &next) < tol;
        baseline = next;
        if converged {
            break;
        }
    }
    Ok(baseline)
}

/// Like [`modpoly`] but clips to `fit + σ(residual)`, converging on the
/// change in σ.
fn imodpoly(x: &[f64], y: &[f64], order: usize, max_iter: usize, tol: f64) -> Result<Vec<f64>, String> {
    let t = scale_to_unit(x);
    let mut signal = y.to_vec();
    let mut baseline = fit(&t, &signal, order)?;
    let residual: Vec<f64> = signal.iter().zip(&baseline).map(|(s, b)| s - b).collect();
    let mut deviation = std_dev(&residual);

    for _ in 0..max_iter {
        for (s, b) in signal.iter_mut().zip(&baseline) {
            *s = s.min(b + deviation);
        }
        baseline = fit(&t, &signal, order)?;
        let residual: Vec<f64> = signal.iter().zip(&baseline).map(|(s, b)| s - b).collect();
        let next = std_dev(&residual);
        let change = (next - deviation).abs() / next.max(f64::MIN_POSITIVE);
        deviation = next;
        if change < tol {
            break;
        }
    }
    Ok(baseline)
}

// ---------------------------------------------------------------------------
// Asymmetric least squares (Whittaker smoother)
// ---------------------------------------------------------------------------

/// Solve `(W + λ·DᵀD)·z = W·y` with `D` the second-difference operator,
/// reweighting points above the baseline by `p` and below by `1 − p`.
fn asls(y: &[f64], lam: f64, p: f64, max_iter: usize) -> Result<Vec<f64>, String> {
    let n = y.len();

    // DᵀD is pentadiagonal; accumulate its three distinct bands.
    let mut dtd_diag = vec![0.0; n];
    let mut dtd_off1 = vec![0.0; n.saturating_sub(1)];
    let mut dtd_off2 = vec![0.0; n.saturating_sub(2)];
    let stencil = [1.0, -2.0, 1.0];
    for r in 0..n.saturating_sub(2) {
        for a in 0..3 {
            dtd_diag[r + a] += stencil[a] * stencil[a];
            if a + 1 < 3 {
                dtd_off1[r + a] += stencil[a] * stencil[a + 1];
            }
            if a + 2 < 3 {
                dtd_off2[r + a] += stencil[a] * stencil[a + 2];
            }
        }
    }
    let off1: Vec<f64> = dtd_off1.iter().map(|v| lam * v).collect();
    let off2: Vec<f64> = dtd_off2.iter().map(|v| lam * v).collect();

    let mut weights = vec![1.0; n];
    let mut baseline = y.to_vec();
    for _ in 0..max_iter {
        let diag: Vec<f64> = weights
            .iter()
            .zip(&dtd_diag)
            .map(|(w, d)| w + lam * d)
            .collect();
        let rhs: Vec<f64> = weights.iter().zip(y).map(|(w, v)| w * v).collect();
        baseline = solve_pentadiagonal(&diag, &off1, &off2, &rhs)
            .ok_or("Whittaker system is not positive definite")?;

        let next: Vec<f64> = y
            .iter()
            .zip(&baseline)
            .map(|(v, z)| if v > z { p } else { 1.0 - p })
            .collect();
        if next == weights {
            break;
        }
        weights = next;
    }
    Ok(baseline)
}
