// ─────────────────────────────────────────────────────────────────────
// SCPN Grad-Shafranov Core — Tridiag
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Thomas algorithm for tridiagonal systems.
//!
//! Used for the second-derivative systems of the cubic splines.

use gs_types::error::{GsError, GsResult};

/// Solve tridiagonal system Ax = d using the Thomas algorithm.
///
/// - `a`: sub-diagonal \[n\] (a\[0\] unused)
/// - `b`: main diagonal \[n\]
/// - `c`: super-diagonal \[n\] (c\[n-1\] unused)
/// - `d`: right-hand side \[n\]
///
/// Fails with [`GsError::LinAlg`] on a zero pivot and with
/// [`GsError::ShapeMismatch`] if the diagonals disagree in length.
pub fn thomas_solve(a: &[f64], b: &[f64], c: &[f64], d: &[f64]) -> GsResult<Vec<f64>> {
    let n = d.len();
    if n == 0 {
        return Ok(Vec::new());
    }
    for (name, len) in [("sub-diagonal", a.len()), ("diagonal", b.len()), ("super-diagonal", c.len())] {
        if len != n {
            return Err(GsError::ShapeMismatch {
                context: format!("tridiagonal {name}"),
                expected: (n, 1),
                got: (len, 1),
            });
        }
    }

    let mut c_prime = vec![0.0; n];
    let mut d_prime = vec![0.0; n];

    let mut den = b[0];
    for i in 0..n {
        if i > 0 {
            den = b[i] - a[i] * c_prime[i - 1];
        }
        if den == 0.0 || !den.is_finite() {
            return Err(GsError::LinAlg(format!("zero pivot at row {i} of tridiagonal system")));
        }
        if i < n - 1 {
            c_prime[i] = c[i] / den;
        }
        let carry = if i > 0 { a[i] * d_prime[i - 1] } else { 0.0 };
        d_prime[i] = (d[i] - carry) / den;
    }

    // Back substitution
    let mut x = vec![0.0; n];
    x[n - 1] = d_prime[n - 1];
    for i in (0..n - 1).rev() {
        x[i] = d_prime[i] - c_prime[i] * x[i + 1];
    }

    Ok(x)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_thomas_identity() {
        let n = 5;
        let d = vec![1.0, 2.0, 3.0, 4.0, 5.0];
        let x = thomas_solve(&vec![0.0; n], &vec![1.0; n], &vec![0.0; n], &d).unwrap();
        for i in 0..n {
            assert!((x[i] - d[i]).abs() < 1e-12, "x[{i}] should equal d[{i}]");
        }
    }

    #[test]
    fn test_thomas_spline_system() {
        // Interior rows of a uniform cubic spline: [1 4 1]
        let n = 6;
        let a: Vec<f64> = (0..n).map(|i| if i > 0 { 1.0 } else { 0.0 }).collect();
        let b = vec![4.0; n];
        let c: Vec<f64> = (0..n).map(|i| if i < n - 1 { 1.0 } else { 0.0 }).collect();
        let d = vec![6.0, 0.0, -6.0, 6.0, 0.0, 12.0];
        let x = thomas_solve(&a, &b, &c, &d).unwrap();

        for i in 0..n {
            let mut ax = b[i] * x[i];
            if i > 0 {
                ax += a[i] * x[i - 1];
            }
            if i < n - 1 {
                ax += c[i] * x[i + 1];
            }
            assert!((ax - d[i]).abs() < 1e-10, "Ax[{i}] = {ax}, expected {}", d[i]);
        }
    }

    #[test]
    fn test_thomas_zero_pivot() {
        let r = thomas_solve(&[0.0, 1.0], &[0.0, 1.0], &[1.0, 0.0], &[1.0, 1.0]);
        assert!(matches!(r, Err(GsError::LinAlg(_))));
    }

    #[test]
    fn test_thomas_length_mismatch() {
        let r = thomas_solve(&[0.0], &[1.0, 1.0], &[0.0, 0.0], &[1.0, 1.0]);
        assert!(matches!(r, Err(GsError::ShapeMismatch { .. })));
    }
}
