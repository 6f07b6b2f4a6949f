//! Dense and banded linear algebra.
//!
//! - [`BandedLu`]: LU factorisation without pivoting for banded systems,
//!   used for the exact coarsest-level multigrid solve.
//! - [`svd_small`] / [`lstsq_svd`]: one-sided Jacobi SVD and truncated
//!   least squares for the small coil-response systems of constraints.

use gs_types::error::{GsError, GsResult};
use ndarray::{s, Array1, Array2};

use crate::sparse::CsrMatrix;

/// Pivots below this magnitude are treated as singular.
const PIVOT_EPS: f64 = 1e-300;

/// LU factors of a banded matrix, stored row-wise in a dense band.
///
/// Row `i` keeps columns `i - bw ..= i + bw`. No pivoting: intended for
/// (weakly) diagonally dominant operators such as Δ* with identity
/// Dirichlet rows, where elimination without row exchange is stable.
#[derive(Debug, Clone)]
pub struct BandedLu {
    n: usize,
    bw: usize,
    data: Vec<f64>,
}

impl BandedLu {
    #[inline]
    fn idx(&self, i: usize, j: usize) -> usize {
        i * (2 * self.bw + 1) + (j + self.bw - i)
    }

    /// Factorise `a` in place of a copy of its band.
    pub fn factor(a: &CsrMatrix) -> GsResult<Self> {
        let n = a.n();
        let bw = a.bandwidth();
        let mut lu = BandedLu {
            n,
            bw,
            data: vec![0.0; n * (2 * bw + 1)],
        };

        for i in 0..n {
            let (cols, vals) = a.row(i);
            for (&j, &v) in cols.iter().zip(vals) {
                let k = lu.idx(i, j);
                lu.data[k] += v;
            }
        }

        for k in 0..n {
            let pivot = lu.data[lu.idx(k, k)];
            if !pivot.is_finite() || pivot.abs() < PIVOT_EPS {
                return Err(GsError::LinAlg(format!(
                    "zero pivot at row {k} of banded LU (n = {n}, bw = {bw})"
                )));
            }
            let end = n.min(k + bw + 1);
            for i in k + 1..end {
                let ik = lu.idx(i, k);
                let l = lu.data[ik] / pivot;
                if l == 0.0 {
                    continue;
                }
                lu.data[ik] = l;
                for j in k + 1..end {
                    let kj = lu.data[lu.idx(k, j)];
                    if kj != 0.0 {
                        let ij = lu.idx(i, j);
                        lu.data[ij] -= l * kj;
                    }
                }
            }
        }

        Ok(lu)
    }

    /// Solve `A x = b` with the stored factors.
    pub fn solve(&self, b: &[f64]) -> Vec<f64> {
        debug_assert_eq!(b.len(), self.n);
        let n = self.n;
        let bw = self.bw;

        // Forward: L y = b (unit lower)
        let mut x = b.to_vec();
        for i in 0..n {
            let start = i.saturating_sub(bw);
            let mut sum = x[i];
            for j in start..i {
                sum -= self.data[self.idx(i, j)] * x[j];
            }
            x[i] = sum;
        }

        // Backward: U x = y
        for i in (0..n).rev() {
            let end = n.min(i + bw + 1);
            let mut sum = x[i];
            for j in i + 1..end {
                sum -= self.data[self.idx(i, j)] * x[j];
            }
            x[i] = sum / self.data[self.idx(i, i)];
        }

        x
    }
}

/// Thin SVD of a small dense matrix via Jacobi rotations on AᵀA.
///
/// Returns `(U, σ, Vᵀ)` with σ sorted descending, `A ≈ U·diag(σ)·Vᵀ`.
/// Adequate for the (2·n_points × n_coils) response matrices of
/// constraints; not meant for large systems.
pub fn svd_small(a: &Array2<f64>) -> (Array2<f64>, Array1<f64>, Array2<f64>) {
    let (m, n) = a.dim();
    let k = m.min(n);

    let mut ata = a.t().dot(a);
    let mut v = Array2::<f64>::eye(n);
    // Tolerances relative to ‖AᵀA‖
    let scale = ata.iter().map(|x| x * x).sum::<f64>().sqrt();
    if scale == 0.0 {
        let vt = Array2::<f64>::eye(n).slice(s![..k, ..]).to_owned();
        return (Array2::zeros((m, k)), Array1::zeros(k), vt);
    }

    for _sweep in 0..100 {
        let off: f64 = (0..n)
            .flat_map(|i| (i + 1..n).map(move |j| (i, j)))
            .map(|(i, j)| ata[[i, j]].abs())
            .sum();
        if off <= 1e-15 * scale {
            break;
        }

        for i in 0..n {
            for j in i + 1..n {
                let aij = ata[[i, j]];
                if aij.abs() <= 1e-18 * scale {
                    continue;
                }
                let tau = (ata[[j, j]] - ata[[i, i]]) / (2.0 * aij);
                let t = tau.signum() / (tau.abs() + (1.0 + tau * tau).sqrt());
                let t = if tau == 0.0 { 1.0 } else { t };
                let c = 1.0 / (1.0 + t * t).sqrt();
                let s = t * c;

                let aii = ata[[i, i]];
                let ajj = ata[[j, j]];
                ata[[i, i]] = c * c * aii - 2.0 * s * c * aij + s * s * ajj;
                ata[[j, j]] = s * s * aii + 2.0 * s * c * aij + c * c * ajj;
                ata[[i, j]] = 0.0;
                ata[[j, i]] = 0.0;

                for r in 0..n {
                    if r != i && r != j {
                        let ri = ata[[r, i]];
                        let rj = ata[[r, j]];
                        ata[[r, i]] = c * ri - s * rj;
                        ata[[i, r]] = ata[[r, i]];
                        ata[[r, j]] = s * ri + c * rj;
                        ata[[j, r]] = ata[[r, j]];
                    }
                    let vi = v[[r, i]];
                    let vj = v[[r, j]];
                    v[[r, i]] = c * vi - s * vj;
                    v[[r, j]] = s * vi + c * vj;
                }
            }
        }
    }

    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&i, &j| ata[[j, j]].total_cmp(&ata[[i, i]]));

    let mut sigma = Array1::zeros(k);
    let mut vt = Array2::zeros((k, n));
    for (idx, &col) in order.iter().take(k).enumerate() {
        sigma[idx] = ata[[col, col]].max(0.0).sqrt();
        for j in 0..n {
            vt[[idx, j]] = v[[j, col]];
        }
    }

    // U = A V Σ⁻¹
    let mut u = Array2::zeros((m, k));
    let sigma_max = sigma.iter().copied().fold(0.0_f64, f64::max);
    for idx in 0..k {
        if sigma[idx] > 1e-14 * sigma_max {
            let col = a.dot(&vt.row(idx)) / sigma[idx];
            u.column_mut(idx).assign(&col);
        }
    }

    (u, sigma, vt)
}

/// Minimum-norm least-squares solution of `A x ≈ b`, discarding singular
/// values below `sv_cutoff · σ_max`.
pub fn lstsq_svd(a: &Array2<f64>, b: &Array1<f64>, sv_cutoff: f64) -> GsResult<Array1<f64>> {
    let (m, n) = a.dim();
    if b.len() != m {
        return Err(GsError::ShapeMismatch {
            context: "lstsq_svd rhs".to_string(),
            expected: (m, 1),
            got: (b.len(), 1),
        });
    }
    let (u, sigma, vt) = svd_small(a);
    let sigma_max = sigma.iter().copied().fold(0.0_f64, f64::max);

    let mut x = Array1::zeros(n);
    for idx in 0..sigma.len() {
        if sigma[idx] > sv_cutoff * sigma_max && sigma[idx] > 0.0 {
            let coeff = u.column(idx).dot(b) / sigma[idx];
            x.scaled_add(coeff, &vt.row(idx));
        }
    }
    Ok(x)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn tridiag(n: usize) -> CsrMatrix {
        let mut a = CsrMatrix::with_capacity(n, 3 * n);
        for i in 0..n {
            let mut row = vec![(i, 4.0)];
            if i > 0 {
                row.push((i - 1, -1.0));
            }
            if i + 1 < n {
                row.push((i + 1, -1.5));
            }
            a.push_row(&row);
        }
        a
    }

    #[test]
    fn test_banded_lu_tridiagonal() {
        let a = tridiag(12);
        let lu = BandedLu::factor(&a).unwrap();
        let x_true: Vec<f64> = (0..12).map(|i| (i as f64 * 0.7).sin()).collect();
        let mut b = vec![0.0; 12];
        a.matvec(&x_true, &mut b);
        let x = lu.solve(&b);
        for i in 0..12 {
            assert!((x[i] - x_true[i]).abs() < 1e-12, "x[{i}] = {}", x[i]);
        }
    }

    #[test]
    fn test_banded_lu_wide_band() {
        // 2D-like band: couplings at ±1 and ±5
        let n = 30;
        let mut a = CsrMatrix::with_capacity(n, 5 * n);
        for i in 0..n {
            let mut row = vec![(i, -4.5)];
            for off in [1usize, 5] {
                if i >= off {
                    row.push((i - off, 1.0));
                }
                if i + off < n {
                    row.push((i + off, 1.1));
                }
            }
            a.push_row(&row);
        }
        let lu = BandedLu::factor(&a).unwrap();
        let x_true: Vec<f64> = (0..n).map(|i| 1.0 + i as f64 * 0.1).collect();
        let mut b = vec![0.0; n];
        a.matvec(&x_true, &mut b);
        let x = lu.solve(&b);
        for i in 0..n {
            assert!((x[i] - x_true[i]).abs() < 1e-10);
        }
    }

    #[test]
    fn test_banded_lu_zero_pivot() {
        let mut a = CsrMatrix::with_capacity(2, 2);
        a.push_row(&[(0, 0.0), (1, 1.0)]);
        a.push_row(&[(0, 1.0), (1, 0.0)]);
        assert!(matches!(BandedLu::factor(&a), Err(GsError::LinAlg(_))));
    }

    #[test]
    fn test_svd_reconstructs() {
        let a = array![[3.0, 1.0], [1.0, 3.0], [0.5, -0.5]];
        let (u, sigma, vt) = svd_small(&a);
        assert!(sigma[0] >= sigma[1]);
        let recon = u.dot(&Array2::from_diag(&sigma)).dot(&vt);
        for (x, y) in recon.iter().zip(a.iter()) {
            assert!((x - y).abs() < 1e-10, "{x} vs {y}");
        }
    }

    #[test]
    fn test_lstsq_exact_system() {
        let a = array![[2.0, 0.0], [0.0, 4.0]];
        let b = array![2.0, 2.0];
        let x = lstsq_svd(&a, &b, 1e-12).unwrap();
        assert!((x[0] - 1.0).abs() < 1e-12);
        assert!((x[1] - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_lstsq_underdetermined_min_norm() {
        // x + y = 2 → minimum-norm solution (1, 1)
        let a = array![[1.0, 1.0]];
        let b = array![2.0];
        let x = lstsq_svd(&a, &b, 1e-12).unwrap();
        assert!((x[0] - 1.0).abs() < 1e-10);
        assert!((x[1] - 1.0).abs() < 1e-10);
    }
}
