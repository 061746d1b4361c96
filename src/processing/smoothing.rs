use super::numeric::{median, polyfit, polyval, solve_dense};
use super::params::SmoothingMethod;
use super::{apply_in_ranges, SegmentAlgorithm};
use crate::data::model::Spectrum;
use crate::data::range::RangeSet;
use crate::error::{PipelineResult, Stage};

// ---------------------------------------------------------------------------
// SmoothingEngine
// ---------------------------------------------------------------------------

/// Applies a [`SmoothingMethod`] independently inside each range.
#[derive(Debug, Clone, Copy, Default)]
pub struct SmoothingEngine;

impl SmoothingEngine {
    pub fn apply(
        &self,
        spectrum: &Spectrum,
        ranges: &RangeSet,
        method: &SmoothingMethod,
    ) -> PipelineResult<Spectrum> {
        method.validate()?;
        let out = apply_in_ranges(spectrum, ranges, method)?;
        log::info!(
            "smoothing ({}) applied over {} range(s)",
            method.name(),
            ranges.len()
        );
        Ok(out)
    }
}

impl SegmentAlgorithm for SmoothingMethod {
    fn stage(&self) -> Stage {
        Stage::Smoothing
    }

    fn min_samples(&self) -> usize {
        SmoothingMethod::min_samples(self)
    }

    fn process(&self, x: &[f64], y: &[f64]) -> Result<Vec<f64>, String> {
        match *self {
            SmoothingMethod::SavitzkyGolay {
                window_length,
                polyorder,
            } => savitzky_golay(y, window_length, polyorder),
            SmoothingMethod::MovingAverage { window_length } => Ok(moving_average(y, window_length)),
            SmoothingMethod::Median { window_length } => Ok(median_filter(y, window_length)),
            SmoothingMethod::Gaussian { sigma } => Ok(gaussian(y, sigma)),
            SmoothingMethod::Lowess { frac, iterations } => Ok(lowess(x, y, frac, iterations)),
        }
    }
}

// ---------------------------------------------------------------------------
// Savitzky-Golay
// ---------------------------------------------------------------------------

/// Least-squares polynomial smoothing. Interior points use the convolution
/// coefficients of the centre sample; the first and last half-windows are
/// evaluated from a polynomial fitted to the edge window.
fn savitzky_golay(y: &[f64], window: usize, order: usize) -> Result<Vec<f64>, String> {
    let n = y.len();
    let half = window / 2;
    let offsets: Vec<f64> = (0..window).map(|j| j as f64 - half as f64).collect();

    // Row 0 of (AᵀA)⁻¹Aᵀ: solve (AᵀA)·v = e₀, then c_t = Σ v_k t^k.
    let terms = order + 1;
    let mut ata = vec![vec![0.0; terms]; terms];
    for &t in &offsets {
        for (r, row) in ata.iter_mut().enumerate() {
            for (c, cell) in row.iter_mut().enumerate() {
                *cell += t.powi((r + c) as i32);
            }
        }
    }
    let mut e0 = vec![0.0; terms];
    e0[0] = 1.0;
    let v = solve_dense(ata, e0).ok_or("singular Savitzky-Golay system")?;
    let coeffs: Vec<f64> = offsets.iter().map(|&t| polyval(&v, t)).collect();

    let mut out = y.to_vec();
    for i in half..n - half {
        out[i] = coeffs
            .iter()
            .zip(&y[i - half..=i + half])
            .map(|(c, v)| c * v)
            .sum();
    }

    let head = polyfit(&offsets, &y[..window], None, order).ok_or("singular edge fit")?;
    for (i, slot) in out.iter_mut().enumerate().take(half) {
        *slot = polyval(&head, offsets[i]);
    }
    let tail = polyfit(&offsets, &y[n - window..], None, order).ok_or("singular edge fit")?;
    for j in window - half..window {
        out[n - window + j] = polyval(&tail, offsets[j]);
    }
    Ok(out)
}

// ---------------------------------------------------------------------------
// Moving average / median (windows truncated at the edges)
// ---------------------------------------------------------------------------

fn window_bounds(i: usize, n: usize, window: usize) -> (usize, usize) {
    let left = (window - 1) / 2;
    let right = window / 2;
    (i.saturating_sub(left), (i + right + 1).min(n))
}

fn moving_average(y: &[f64], window: usize) -> Vec<f64> {
    let n = y.len();
    (0..n)
        .map(|i| {
            let (lo, hi) = window_bounds(i, n, window);
            y[lo..hi].iter().sum::<f64>() / (hi - lo) as f64
        })
        .collect()
}

fn median_filter(y: &[f64], window: usize) -> Vec<f64> {
    let n = y.len();
    (0..n)
        .map(|i| {
            let (lo, hi) = window_bounds(i, n, window);
            median(&y[lo..hi])
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Gaussian
// ---------------------------------------------------------------------------

/// Half-sample symmetric reflection (`d c b a | a b c d | d c b a`).
fn reflect(i: isize, n: usize) -> usize {
    let period = 2 * n as isize;
    let m = i.rem_euclid(period) as usize;
    if m < n {
        m
    } else {
        2 * n - 1 - m
    }
}

fn gaussian(y: &[f64], sigma: f64) -> Vec<f64> {
    let n = y.len();
    // Reflection repeats every 2n samples, so offsets past two periods only
    // revisit samples already in the window.
    let radius = ((4.0 * sigma + 0.5) as isize).min(2 * n as isize);
    let mut kernel: Vec<f64> = (-radius..=radius)
        .map(|k| (-0.5 * (k as f64 / sigma).powi(2)).exp())
        .collect();
    let total: f64 = kernel.iter().sum();
    kernel.iter_mut().for_each(|w| *w /= total);

    (0..n as isize)
        .map(|i| {
            kernel
                .iter()
                .zip(-radius..=radius)
                .map(|(w, k)| w * y[reflect(i + k, n)])
                .sum()
        })
        .collect()
}

// ---------------------------------------------------------------------------
// LOWESS
// ---------------------------------------------------------------------------

/// Locally weighted linear regression with tricube distance weights and
/// `iterations` bisquare robustifying passes.
fn lowess(x: &[f64], y: &[f64], frac: f64, iterations: usize) -> Vec<f64> {
    let n = y.len();
    let k = ((frac * n as f64 + 1e-10) as usize).clamp(2, n);
    let mut robustness = vec![1.0; n];
    let mut fitted = vec![0.0; n];

    for pass in 0..=iterations {
        let mut lo = 0;
        for i in 0..n {
            // Slide the k-neighbourhood so it stays centred on x[i].
            while lo + k < n && x[i] - x[lo] > x[lo + k] - x[i] {
                lo += 1;
            }
            let hi = lo + k;
            let h = (x[i] - x[lo]).max(x[hi - 1] - x[i]);

            let (mut sw, mut swx, mut swy, mut swxx, mut swxy) = (0.0, 0.0, 0.0, 0.0, 0.0);
            for j in lo..hi {
                let d = if h > 0.0 { (x[j] - x[i]).abs() / h } else { 0.0 };
                let tricube = if d < 1.0 { (1.0 - d.powi(3)).powi(3) } else { 0.0 };
                let w = tricube * robustness[j];
                // Offsets from x[i] keep the moments small.
                let dx = x[j] - x[i];
                sw += w;
                swx += w * dx;
                swy += w * y[j];
                swxx += w * dx * dx;
                swxy += w * dx * y[j];
            }

            fitted[i] = if sw <= 0.0 {
                y[i]
            } else {
                let mean_x = swx / sw;
                let mean_y = swy / sw;
                let var = swxx / sw - mean_x * mean_x;
                if var <= 1e-12 * h.max(1.0).powi(2) {
                    mean_y
                } else {
                    let slope = (swxy / sw - mean_x * mean_y) / var;
                    mean_y - slope * mean_x
                }
            };
        }

        if pass == iterations {
            break;
        }
        let residuals: Vec<f64> = y.iter().zip(&fitted).map(|(a, b)| a - b).collect();
        let abs: Vec<f64> = residuals.iter().map(|r| r.abs()).collect();
        let scale = 6.0 * median(&abs);
        if scale <= 0.0 {
            break;
        }
        for (rw, r) in robustness.iter_mut().zip(&residuals) {
            let b = r / scale;
            *rw = if b.abs() < 1.0 { (1.0 - b * b).powi(2) } else { 0.0 };
        }
    }
    fitted
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noisy(n: usize) -> Spectrum {
        let x: Vec<f64> = (0..n).map(|i| 1000.0 + i as f64 * 2.0).collect();
        let y = (0..n)
            .map(|i| {
                let base = ((i as f64) / 8.0).sin();
                if i % 2 == 0 {
                    base + 0.1
                } else {
                    base - 0.1
                }
            })
            .collect();
        Spectrum::new(x, y).unwrap()
    }

    fn roughness(y: &[f64]) -> f64 {
        y.windows(3).map(|w| (w[0] - 2.0 * w[1] + w[2]).abs()).sum()
    }

    #[test]
    fn savgol_preserves_cubic_exactly() {
        let y: Vec<f64> = (0..15)
            .map(|i| {
                let t = i as f64;
                0.01 * t * t * t - 0.2 * t * t + t
            })
            .collect();
        let out = savitzky_golay(&y, 7, 3).unwrap();
        for (a, b) in y.iter().zip(&out) {
            assert!((a - b).abs() < 1e-8, "{a} vs {b}");
        }
    }

    #[test]
    fn gaussian_with_huge_sigma_tends_to_the_segment_mean() {
        let x: Vec<f64> = (0..40).map(|i| 1000.0 + i as f64).collect();
        let y: Vec<f64> = (0..40).map(|i| i as f64).collect();
        let sp = Spectrum::new(x, y).unwrap();
        let m = SmoothingMethod::Gaussian { sigma: 1e15 };
        assert!(m.validate().is_ok());

        let out = SmoothingEngine.apply(&sp, &RangeSet::full(&sp), &m).unwrap();
        for v in out.intensities() {
            assert!((v - 19.5).abs() < 0.5, "{v}");
        }
    }

    #[test]
    fn every_method_reduces_roughness() {
        let sp = noisy(80);
        let full = RangeSet::full(&sp);
        let methods = [
            SmoothingMethod::SavitzkyGolay { window_length: 11, polyorder: 3 },
            SmoothingMethod::MovingAverage { window_length: 5 },
            SmoothingMethod::Gaussian { sigma: 1.5 },
            SmoothingMethod::Lowess { frac: 0.2, iterations: 2 },
        ];
        for m in methods {
            let out = SmoothingEngine.apply(&sp, &full, &m).unwrap();
            assert!(
                roughness(out.intensities()) < roughness(sp.intensities()),
                "{} did not smooth",
                m.name()
            );
        }
    }

    #[test]
    fn samples_outside_ranges_are_bit_identical() {
        let sp = noisy(60);
        let ranges = RangeSet::validate(&[(1020.0, 1040.0), (1080.0, 1100.0)]).unwrap();
        let m = SmoothingMethod::Gaussian { sigma: 2.0 };
        let out = SmoothingEngine.apply(&sp, &ranges, &m).unwrap();
        for (i, &wn) in sp.wavenumbers().iter().enumerate() {
            if !ranges.contains(wn) {
                assert_eq!(out.intensities()[i].to_bits(), sp.intensities()[i].to_bits());
            }
        }
    }

    #[test]
    fn window_larger_than_range_is_reported() {
        let sp = noisy(60);
        let ranges = RangeSet::validate(&[(1000.0, 1010.0)]).unwrap(); // 6 samples
        let m = SmoothingMethod::SavitzkyGolay { window_length: 11, polyorder: 3 };
        let err = SmoothingEngine.apply(&sp, &ranges, &m).unwrap_err();
        assert!(matches!(
            err,
            crate::error::PipelineError::InsufficientSamples { samples: 6, required: 11, .. }
        ));
    }

    #[test]
    fn deterministic_output() {
        let sp = noisy(50);
        let full = RangeSet::full(&sp);
        let m = SmoothingMethod::Lowess { frac: 0.3, iterations: 3 };
        let a = SmoothingEngine.apply(&sp, &full, &m).unwrap();
        let b = SmoothingEngine.apply(&sp, &full, &m).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn median_removes_spikes() {
        let out = median_filter(&[1.0, 1.0, 1.0, 10.0, 1.0, 1.0, 1.0], 3);
        assert_eq!(out, vec![1.0; 7]);
    }

    #[test]
    fn reflect_mirrors_both_ends() {
        assert_eq!(reflect(-1, 4), 0);
        assert_eq!(reflect(-2, 4), 1);
        assert_eq!(reflect(4, 4), 3);
        assert_eq!(reflect(5, 4), 2);
    }

    #[test]
    fn moving_average_truncates_at_edges() {
        assert_eq!(moving_average(&[3.0, 6.0, 9.0], 3), vec![4.5, 6.0, 7.5]);
    }
}
