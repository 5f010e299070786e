//! Dense linear algebra helpers for small row-major d×d matrices.
//!
//! The feature dimension is expected to stay small (the default is 10),
//! so direct Gauss-Jordan elimination is used instead of pulling in a
//! full linear algebra crate.

/// Pivot threshold below which a column is treated as zero
const PIVOT_EPSILON: f64 = 1e-12;

/// Dot product of two equal-length vectors
pub(crate) fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

/// Matrix-vector multiply: `a` is d×d row-major, `v` has length d
pub(crate) fn mat_vec_mul(a: &[f64], v: &[f64], d: usize) -> Vec<f64> {
    (0..d).map(|i| dot(&a[i * d..(i + 1) * d], v)).collect()
}

/// The d×d identity matrix, row-major
pub(crate) fn identity(d: usize) -> Vec<f64> {
    let mut m = vec![0.0; d * d];
    for i in 0..d {
        m[i * d + i] = 1.0;
    }
    m
}

/// Invert a d×d row-major matrix via Gauss-Jordan elimination with
/// partial pivoting.
///
/// Returns `None` when no usable pivot exists (a truly singular
/// matrix); callers decide the degraded policy, typically substituting
/// the identity so a routing decision can still be produced.
pub(crate) fn invert(a: &[f64], d: usize) -> Option<Vec<f64>> {
    let width = 2 * d;
    let mut aug = vec![0.0; d * width];

    // Augmented [A | I]
    for i in 0..d {
        aug[i * width..i * width + d].copy_from_slice(&a[i * d..(i + 1) * d]);
        aug[i * width + d + i] = 1.0;
    }

    for col in 0..d {
        // Partial pivot: largest magnitude in this column
        let mut max_row = col;
        let mut max_val = aug[col * width + col].abs();
        for row in (col + 1)..d {
            let val = aug[row * width + col].abs();
            if val > max_val {
                max_val = val;
                max_row = row;
            }
        }

        if max_val < PIVOT_EPSILON || !max_val.is_finite() {
            return None;
        }

        if max_row != col {
            for j in 0..width {
                aug.swap(col * width + j, max_row * width + j);
            }
        }

        let pivot = aug[col * width + col];
        for j in 0..width {
            aug[col * width + j] /= pivot;
        }

        for row in 0..d {
            if row == col {
                continue;
            }
            let factor = aug[row * width + col];
            if factor == 0.0 {
                continue;
            }
            for j in 0..width {
                aug[row * width + j] -= factor * aug[col * width + j];
            }
        }
    }

    let mut inv = vec![0.0; d * d];
    for i in 0..d {
        inv[i * d..(i + 1) * d].copy_from_slice(&aug[i * width + d..(i + 1) * width]);
    }
    Some(inv)
}

#[cfg(test)]
pub(crate) fn max_abs_diff(a: &[f64], b: &[f64]) -> f64 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| (x - y).abs())
        .fold(0.0, f64::max)
}
