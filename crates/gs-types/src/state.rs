// ─────────────────────────────────────────────────────────────────────
// SCPN Grad-Shafranov Core — State
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
use ndarray::{Array1, Array2};

use crate::error::{GsError, GsResult};

/// True when `n = 2^k + 1` for some k ≥ 1 (3, 5, 9, 17, 33, 65, ...).
///
/// This is the size constraint shared by the multigrid restriction chain
/// and Romberg quadrature.
pub fn is_pow2_plus_one(n: usize) -> bool {
    n >= 3 && (n - 1).is_power_of_two()
}

/// Rectangular (R, Z) mesh.
///
/// Axis convention: axis 0 is R (`nx` points), axis 1 is Z (`ny` points),
/// so `rr[[ix, iy]] == r[ix]` and `zz[[ix, iy]] == z[iy]`.
#[derive(Debug, Clone)]
pub struct Grid2D {
    pub nx: usize,
    pub ny: usize,
    pub r_min: f64,
    pub r_max: f64,
    pub z_min: f64,
    pub z_max: f64,
    pub r: Array1<f64>,  // [nx] linspace(R_min, R_max)
    pub z: Array1<f64>,  // [ny] linspace(Z_min, Z_max)
    pub dr: f64,
    pub dz: f64,
    pub rr: Array2<f64>, // [nx, ny]
    pub zz: Array2<f64>, // [nx, ny]
}

impl Grid2D {
    /// Build a grid, failing fast on sizes that are not 2^k + 1, on
    /// R_min ≤ 0 and on empty or inverted extents.
    pub fn new(
        nx: usize,
        ny: usize,
        r_min: f64,
        r_max: f64,
        z_min: f64,
        z_max: f64,
    ) -> GsResult<Self> {
        if !is_pow2_plus_one(nx) || !is_pow2_plus_one(ny) {
            return Err(GsError::ConfigError(format!(
                "grid resolution must be 2^n + 1 in both directions, got {nx} x {ny}"
            )));
        }
        if ![r_min, r_max, z_min, z_max].iter().all(|v| v.is_finite()) {
            return Err(GsError::ConfigError(
                "grid extents must be finite".to_string(),
            ));
        }
        if r_min <= 0.0 {
            return Err(GsError::ConfigError(format!(
                "R_min must be strictly positive, got {r_min}"
            )));
        }
        if r_max <= r_min || z_max <= z_min {
            return Err(GsError::ConfigError(format!(
                "grid extents inverted: R [{r_min}, {r_max}], Z [{z_min}, {z_max}]"
            )));
        }

        let r = Array1::linspace(r_min, r_max, nx);
        let z = Array1::linspace(z_min, z_max, ny);
        let dr = (r_max - r_min) / (nx - 1) as f64;
        let dz = (z_max - z_min) / (ny - 1) as f64;

        let rr = Array2::from_shape_fn((nx, ny), |(ix, _)| r[ix]);
        let zz = Array2::from_shape_fn((nx, ny), |(_, iy)| z[iy]);

        Ok(Grid2D {
            nx,
            ny,
            r_min,
            r_max,
            z_min,
            z_max,
            r,
            z,
            dr,
            dz,
            rr,
            zz,
        })
    }

    /// Same physical extent at a different resolution.
    pub fn with_resolution(&self, nx: usize, ny: usize) -> GsResult<Self> {
        Grid2D::new(nx, ny, self.r_min, self.r_max, self.z_min, self.z_max)
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.nx, self.ny)
    }

    /// Iterator over the `(ix, iy)` indices of the domain edge, each point once.
    pub fn boundary_indices(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        let (nx, ny) = (self.nx, self.ny);
        let bottom = (0..nx).map(|ix| (ix, 0));
        let top = (0..nx).map(move |ix| (ix, ny - 1));
        let left = (1..ny - 1).map(|iy| (0, iy));
        let right = (1..ny - 1).map(move |iy| (nx - 1, iy));
        bottom.chain(top).chain(left).chain(right)
    }
}
