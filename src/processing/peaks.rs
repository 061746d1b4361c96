use super::params::{PeakDirection, PeakParameters};
use crate::data::model::{Peak, Spectrum};
use crate::error::{PipelineError, PipelineResult};

// ---------------------------------------------------------------------------
// PeakDetector
// ---------------------------------------------------------------------------

/// Finds local extrema filtered by threshold, distance and prominence.
#[derive(Debug, Clone, Copy, Default)]
pub struct PeakDetector;

impl PeakDetector {
    /// Peaks ordered by ascending wavenumber. An empty result means "no
    /// peaks found" and is not an error.
    pub fn detect(&self, spectrum: &Spectrum, params: &PeakParameters) -> PipelineResult<Vec<Peak>> {
        let n = spectrum.len();
        if n < 2 {
            return Err(PipelineError::InsufficientData {
                samples: n,
                required: 2,
            });
        }
        params.validate()?;

        // Work on a signal where the wanted extrema are always maxima.
        let signal: Vec<f64> = match params.direction {
            PeakDirection::Maxima => spectrum.intensities().to_vec(),
            PeakDirection::Minima => spectrum.intensities().iter().map(|v| -v).collect(),
        };

        let mut candidates = local_maxima(&signal);

        if let Some(threshold) = params.threshold {
            candidates.retain(|&i| match params.direction {
                PeakDirection::Maxima => spectrum.intensities()[i] >= threshold,
                PeakDirection::Minima => spectrum.intensities()[i] <= threshold,
            });
        }

        if params.min_distance > 1 {
            candidates = select_by_distance(&signal, &candidates, params.min_distance);
        }

        if let Some(min_prominence) = params.min_prominence {
            candidates.retain(|&i| prominence(&signal, i) >= min_prominence);
        }

        let peaks: Vec<Peak> = candidates
            .into_iter()
            .map(|index| Peak {
                wavenumber: spectrum.wavenumbers()[index],
                intensity: spectrum.intensities()[index],
                index,
            })
            .collect();

        if peaks.is_empty() {
            log::info!("no peaks found");
        } else {
            log::info!("found {} peak(s)", peaks.len());
        }
        Ok(peaks)
    }
}

/// Strict local maxima; a flat top resolves to the middle of the plateau.
/// The first and last samples never qualify.
fn local_maxima(s: &[f64]) -> Vec<usize> {
    let n = s.len();
    let mut peaks = Vec::new();
    if n < 3 {
        return peaks;
    }
    let last = n - 1;
    let mut i = 1;
    while i < last {
        if s[i - 1] < s[i] {
            let mut ahead = i + 1;
            while ahead < last && s[ahead] == s[i] {
                ahead += 1;
            }
            if s[ahead] < s[i] {
                peaks.push((i + ahead - 1) / 2);
                i = ahead;
            }
        }
        i += 1;
    }
    peaks
}

/// Drop peaks closer than `distance` samples to a stronger one.
fn select_by_distance(s: &[f64], peaks: &[usize], distance: usize) -> Vec<usize> {
    let m = peaks.len();
    let mut keep = vec![true; m];

    let mut order: Vec<usize> = (0..m).collect();
    order.sort_by(|&a, &b| s[peaks[b]].total_cmp(&s[peaks[a]]).then(a.cmp(&b)));

    for &k in &order {
        if !keep[k] {
            continue;
        }
        let mut j = k;
        while j > 0 && peaks[k] - peaks[j - 1] < distance {
            keep[j - 1] = false;
            j -= 1;
        }
        let mut j = k + 1;
        while j < m && peaks[j] - peaks[k] < distance {
            keep[j] = false;
            j += 1;
        }
    }

    peaks
        .iter()
        .zip(keep)
        .filter_map(|(&p, kept)| kept.then_some(p))
        .collect()
}

/// Height of a peak above the higher of the two lowest points reached
/// before the signal climbs above the peak on either side.
fn prominence(s: &[f64], peak: usize) -> f64 {
    let height = s[peak];

    let mut left_min = height;
    for &v in s[..peak].iter().rev() {
        if v > height {
            break;
        }
        left_min = left_min.min(v);
    }

    let mut right_min = height;
    for &v in &s[peak + 1..] {
        if v > height {
            break;
        }
        right_min = right_min.min(v);
    }

    height - left_min.max(right_min)
}
