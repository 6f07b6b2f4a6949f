// ─────────────────────────────────────────────────────────────────────
// SCPN Grad-Shafranov Core — Elliptic Operator
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Sparse discretisation of the Grad-Shafranov elliptic operator
//!
//!   Δ*ψ = R ∂/∂R (1/R ∂ψ/∂R) + ∂²ψ/∂Z²
//!
//! on a uniform (R, Z) mesh, 5-point stencil with the toroidal 1/R
//! correction. Edge rows are identity rows so that Dirichlet values are
//! carried structurally in the right-hand side.
//!
//! Unknowns are ordered R-major: point `(ix, iy)` is row `ix * ny + iy`,
//! which gives a half-bandwidth of `ny`.

use gs_types::error::{GsError, GsResult};
use gs_types::state::{is_pow2_plus_one, Grid2D};

use crate::sparse::CsrMatrix;

/// Produces the operator matrix for a given resolution.
///
/// Multigrid asks for one matrix per level, so generators hold only the
/// physical extent and rediscretise at whatever size is requested.
pub trait OperatorGenerator: Send + Sync {
    fn generate(&self, nx: usize, ny: usize) -> GsResult<CsrMatrix>;
}

/// Grad-Shafranov Δ* operator over a fixed rectangle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GsSparse {
    pub r_min: f64,
    pub r_max: f64,
    pub z_min: f64,
    pub z_max: f64,
}

impl GsSparse {
    pub fn new(r_min: f64, r_max: f64, z_min: f64, z_max: f64) -> Self {
        GsSparse {
            r_min,
            r_max,
            z_min,
            z_max,
        }
    }

    pub fn from_grid(grid: &Grid2D) -> Self {
        GsSparse::new(grid.r_min, grid.r_max, grid.z_min, grid.z_max)
    }
}

impl OperatorGenerator for GsSparse {
    fn generate(&self, nx: usize, ny: usize) -> GsResult<CsrMatrix> {
        if !is_pow2_plus_one(nx) || !is_pow2_plus_one(ny) {
            return Err(GsError::ConfigError(format!(
                "operator resolution must be 2^n + 1, got {nx} x {ny}"
            )));
        }
        if self.r_min <= 0.0 {
            return Err(GsError::ConfigError(format!(
                "operator needs R_min > 0, got {}",
                self.r_min
            )));
        }

        let dr = (self.r_max - self.r_min) / (nx - 1) as f64;
        let dz = (self.z_max - self.z_min) / (ny - 1) as f64;
        let inv_dr2 = 1.0 / (dr * dr);
        let inv_dz2 = 1.0 / (dz * dz);
        let center = -2.0 * (inv_dr2 + inv_dz2);

        let n = nx * ny;
        let mut a = CsrMatrix::with_capacity(n, 5 * n);

        for ix in 0..nx {
            let r = self.r_min + dr * ix as f64;
            // 1/R correction: (1/dR² ± 1/(2 R dR)) on the R∓1 neighbours
            let c_r_minus = inv_dr2 + 1.0 / (2.0 * r * dr);
            let c_r_plus = inv_dr2 - 1.0 / (2.0 * r * dr);

            for iy in 0..ny {
                let row = ix * ny + iy;
                if ix == 0 || ix == nx - 1 || iy == 0 || iy == ny - 1 {
                    a.push_row(&[(row, 1.0)]);
                } else {
                    a.push_row(&[
                        (row - ny, c_r_minus),
                        (row - 1, inv_dz2),
                        (row, center),
                        (row + 1, inv_dz2),
                        (row + ny, c_r_plus),
                    ]);
                }
            }
        }

        Ok(a)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    fn apply(a: &CsrMatrix, field: &Array2<f64>) -> Array2<f64> {
        let (nx, ny) = field.dim();
        let x: Vec<f64> = field.iter().copied().collect();
        let mut out = vec![0.0; nx * ny];
        a.matvec(&x, &mut out);
        Array2::from_shape_vec((nx, ny), out).unwrap()
    }

    #[test]
    fn test_operator_shape_and_band() {
        let op = GsSparse::new(0.1, 2.0, -1.0, 1.0);
        let a = op.generate(17, 33).unwrap();
        assert_eq!(a.n(), 17 * 33);
        assert!(a.is_complete());
        assert_eq!(a.bandwidth(), 33);
        // boundary rows: 2*17 + 2*31 identity rows, rest 5-point
        let n_boundary = 2 * 17 + 2 * 31;
        assert_eq!(a.nnz(), n_boundary + 5 * (17 * 33 - n_boundary));
    }

    #[test]
    fn test_r_squared_in_kernel() {
        // Δ*(R²) = 2 - (1/R)(2R) = 0, and central differences are exact on quadratics
        let grid = Grid2D::new(17, 17, 0.5, 2.5, -1.0, 1.0).unwrap();
        let a = GsSparse::from_grid(&grid).generate(17, 17).unwrap();
        let psi = grid.rr.mapv(|r| r * r);
        let out = apply(&a, &psi);
        for ix in 1..16 {
            for iy in 1..16 {
                assert!(out[[ix, iy]].abs() < 1e-9, "Δ*R² = {}", out[[ix, iy]]);
            }
        }
    }

    #[test]
    fn test_z_squared_gives_two() {
        let grid = Grid2D::new(9, 9, 1.0, 2.0, -1.0, 1.0).unwrap();
        let a = GsSparse::from_grid(&grid).generate(9, 9).unwrap();
        let psi = grid.zz.mapv(|z| z * z);
        let out = apply(&a, &psi);
        for ix in 1..8 {
            for iy in 1..8 {
                assert!((out[[ix, iy]] - 2.0).abs() < 1e-10);
            }
        }
        // Edge rows reproduce the field itself
        assert_eq!(out[[0, 3]], psi[[0, 3]]);
        assert_eq!(out[[5, 8]], psi[[5, 8]]);
    }

    #[test]
    fn test_rejects_bad_sizes() {
        let op = GsSparse::new(0.1, 2.0, -1.0, 1.0);
        assert!(op.generate(16, 17).is_err());
        assert!(GsSparse::new(0.0, 2.0, -1.0, 1.0).generate(9, 9).is_err());
    }
}
