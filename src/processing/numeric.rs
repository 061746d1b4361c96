//! Small dense/banded solvers shared by the smoothing and baseline stages.

/// Solve `a · v = b` by Gaussian elimination with partial pivoting.
/// Returns `None` for a (numerically) singular system.
pub fn solve_dense(mut a: Vec<Vec<f64>>, mut b: Vec<f64>) -> Option<Vec<f64>> {
    let n = b.len();
    for col in 0..n {
        let pivot = (col..n).max_by(|&i, &j| a[i][col].abs().total_cmp(&a[j][col].abs()))?;
        if a[pivot][col].abs() < 1e-300 {
            return None;
        }
        a.swap(col, pivot);
        b.swap(col, pivot);
        for row in col + 1..n {
            let factor = a[row][col] / a[col][col];
            if factor == 0.0 {
                continue;
            }
            for k in col..n {
                a[row][k] -= factor * a[col][k];
            }
            b[row] -= factor * b[col];
        }
    }

    let mut v = vec![0.0; n];
    for row in (0..n).rev() {
        let tail: f64 = (row + 1..n).map(|k| a[row][k] * v[k]).sum();
        v[row] = (b[row] - tail) / a[row][row];
    }
    v.iter().all(|c| c.is_finite()).then_some(v)
}

/// Weighted least-squares polynomial fit. Coefficients are in ascending
/// power order. `weights = None` means unit weights.
pub fn polyfit(x: &[f64], y: &[f64], weights: Option<&[f64]>, order: usize) -> Option<Vec<f64>> {
    let terms = order + 1;
    let mut ata = vec![vec![0.0; terms]; terms];
    let mut aty = vec![0.0; terms];
    let mut powers = vec![0.0; 2 * terms - 1];

    for (i, (&xi, &yi)) in x.iter().zip(y).enumerate() {
        let w = weights.map_or(1.0, |w| w[i]);
        let mut p = w;
        for slot in powers.iter_mut() {
            *slot = p;
            p *= xi;
        }
        for r in 0..terms {
            aty[r] += powers[r] * yi;
            for c in 0..terms {
                ata[r][c] += powers[r + c];
            }
        }
    }
    solve_dense(ata, aty)
}

/// Evaluate ascending-order coefficients at `x` (Horner).
pub fn polyval(coeffs: &[f64], x: f64) -> f64 {
    coeffs.iter().rev().fold(0.0, |acc, &c| acc * x + c)
}

/// Map `x` linearly onto `[-1, 1]`, which keeps polynomial normal
/// equations well conditioned.
pub fn scale_to_unit(x: &[f64]) -> Vec<f64> {
    let (Some(&min), Some(&max)) = (x.first(), x.last()) else {
        return Vec::new();
    };
    let span = max - min;
    if span <= 0.0 {
        return vec![0.0; x.len()];
    }
    x.iter().map(|&v| 2.0 * (v - min) / span - 1.0).collect()
}

/// Solve the symmetric positive-definite pentadiagonal system
/// `A · z = b` where `diag[i] = A[i][i]`, `off1[i] = A[i][i+1]` and
/// `off2[i] = A[i][i+2]`, via banded LDLᵀ.
pub fn solve_pentadiagonal(diag: &[f64], off1: &[f64], off2: &[f64], b: &[f64]) -> Option<Vec<f64>> {
    let n = diag.len();
    let at = |v: &[f64], i: usize| v.get(i).copied().unwrap_or(0.0);

    let mut d = vec![0.0; n];
    // l1[i] = L[i][i-1], l2[i] = L[i][i-2]
    let mut l1 = vec![0.0; n + 1];
    let mut l2 = vec![0.0; n + 2];

    for i in 0..n {
        let mut di = diag[i];
        if i >= 1 {
            di -= l1[i] * l1[i] * d[i - 1];
        }
        if i >= 2 {
            di -= l2[i] * l2[i] * d[i - 2];
        }
        if !(di.is_finite() && di > 0.0) {
            return None;
        }
        d[i] = di;

        if i + 2 < n {
            l2[i + 2] = at(off2, i) / di;
        }
        if i + 1 < n {
            let mut a = at(off1, i);
            if i >= 1 {
                a -= l2[i + 1] * l1[i] * d[i - 1];
            }
            l1[i + 1] = a / di;
        }
    }

    let mut u = vec![0.0; n];
    for i in 0..n {
        let mut ui = b[i];
        if i >= 1 {
            ui -= l1[i] * u[i - 1];
        }
        if i >= 2 {
            ui -= l2[i] * u[i - 2];
        }
        u[i] = ui;
    }

    let mut z = vec![0.0; n];
    for i in (0..n).rev() {
        let mut zi = u[i] / d[i];
        if i + 1 < n {
            zi -= l1[i + 1] * z[i + 1];
        }
        if i + 2 < n {
            zi -= l2[i + 2] * z[i + 2];
        }
        z[i] = zi;
    }
    z.iter().all(|v| v.is_finite()).then_some(z)
}

/// Median of a slice (mean of the middle pair for even lengths).
pub fn median(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 1 {
        sorted[mid]
    } else {
        0.5 * (sorted[mid - 1] + sorted[mid])
    }
}

/// Population standard deviation.
pub fn std_dev(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    (values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n).sqrt()
}

/// `‖a − b‖ / ‖b‖`, the convergence measure used by the iterative fits.
pub fn relative_difference(old: &[f64], new: &[f64]) -> f64 {
    let diff: f64 = old.iter().zip(new).map(|(a, b)| (a - b).powi(2)).sum::<f64>().sqrt();
    let norm: f64 = new.iter().map(|v| v * v).sum::<f64>().sqrt();
    diff / norm.max(f64::MIN_POSITIVE)
}
