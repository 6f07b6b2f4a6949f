// ─────────────────────────────────────────────────────────────────────
// SCPN Grad-Shafranov Core — Toroidal Green's Functions
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Green's functions of the Δ* operator for a circular current filament.
//!
//! `G(Rc, Zc; R, Z)` is the poloidal flux per radian at (R, Z) produced by a
//! unit toroidal current at (Rc, Zc):
//!
//!   G = (μ0 / 2π) · √(R Rc) · ((2 − k²) K(k²) − 2 E(k²)) / k,
//!   k² = 4 R Rc / ((R + Rc)² + (Z − Zc)²)
//!
//! with k² clipped to [1e-10, 1 − 1e-10] so coincident points stay finite.
//! Field components follow Br = −(1/R) ∂G/∂Z, Bz = (1/R) ∂G/∂R, evaluated
//! with the closed-form filament expressions.

use gs_types::constants::MU0;
use gs_types::error::{ensure_shape, GsError, GsResult};
use ndarray::Array2;
use rayon::prelude::*;
use std::f64::consts::PI;

use crate::elliptic::{ellipe, ellipk, M_MAX, M_MIN};

#[inline]
fn modulus_sq(rc: f64, zc: f64, r: f64, z: f64) -> (f64, f64) {
    let dz = z - zc;
    let q = (r + rc).mul_add(r + rc, dz * dz);
    let k2 = (4.0 * r * rc / q).clamp(M_MIN, M_MAX);
    (k2, q)
}

/// Poloidal flux per radian at (R, Z) from a unit current at (Rc, Zc).
pub fn greens(rc: f64, zc: f64, r: f64, z: f64) -> f64 {
    let (k2, _) = modulus_sq(rc, zc, r, z);
    let k = k2.sqrt();
    (MU0 / (2.0 * PI)) * (r * rc).sqrt() * ((2.0 - k2) * ellipk(k2) - 2.0 * ellipe(k2)) / k
}

/// Radial field at (R, Z) from a unit current at (Rc, Zc).
pub fn greens_br(rc: f64, zc: f64, r: f64, z: f64) -> f64 {
    let dz = z - zc;
    let (k2, q) = modulus_sq(rc, zc, r, z);
    let s = ellipe(k2) / (1.0 - k2);
    let a0 = 2.0 / q.sqrt();
    let hr = (dz / r) * a0 * ((s / q) * (rc * rc + r * r + dz * dz) - ellipk(k2));
    MU0 / (4.0 * PI) * hr
}

/// Vertical field at (R, Z) from a unit current at (Rc, Zc).
pub fn greens_bz(rc: f64, zc: f64, r: f64, z: f64) -> f64 {
    let dz = z - zc;
    let (k2, q) = modulus_sq(rc, zc, r, z);
    let s = ellipe(k2) / (1.0 - k2);
    let a0 = 2.0 / q.sqrt();
    let hz = a0 * ((s / q) * (rc * rc - r * r - dz * dz) + ellipk(k2));
    MU0 / (4.0 * PI) * hz
}

/// Evaluate `kernel(rc, zc, R, Z)` at every point of the (R, Z) meshgrid,
/// in parallel.
pub fn greens_field(
    kernel: fn(f64, f64, f64, f64) -> f64,
    rc: f64,
    zc: f64,
    r: &Array2<f64>,
    z: &Array2<f64>,
) -> GsResult<Array2<f64>> {
    ensure_shape("Green's function Z mesh", r.dim(), z.dim())?;
    let points: Vec<(f64, f64)> = r.iter().copied().zip(z.iter().copied()).collect();
    let values: Vec<f64> = points
        .par_iter()
        .map(|&(ri, zi)| kernel(rc, zc, ri, zi))
        .collect();
    Array2::from_shape_vec(r.dim(), values).map_err(|e| GsError::LinAlg(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_greens_symmetric_in_source_and_target() {
        let a = greens(1.2, 0.3, 0.8, -0.4);
        let b = greens(0.8, -0.4, 1.2, 0.3);
        assert!((a - b).abs() < 1e-15 * a.abs().max(1.0), "{a} vs {b}");
        assert!(a > 0.0, "Flux from positive current is positive");
    }

    #[test]
    fn test_greens_finite_at_source() {
        let g = greens(1.0, 0.0, 1.0, 0.0);
        assert!(g.is_finite() && g > 0.0);
    }

    #[test]
    fn test_field_matches_flux_derivatives() {
        let (rc, zc) = (1.3, 0.2);
        let (r, z) = (0.9, -0.35);
        let eps = 1e-5;
        let dgdr = (greens(rc, zc, r + eps, z) - greens(rc, zc, r - eps, z)) / (2.0 * eps);
        let dgdz = (greens(rc, zc, r, z + eps) - greens(rc, zc, r, z - eps)) / (2.0 * eps);

        let bz = greens_bz(rc, zc, r, z);
        let br = greens_br(rc, zc, r, z);
        // Central differences with eps = 1e-5 limit agreement
        assert!((bz - dgdr / r).abs() < 1e-4 * bz.abs(), "Bz {bz} vs {}", dgdr / r);
        assert!((br + dgdz / r).abs() < 1e-4 * br.abs(), "Br {br} vs {}", -dgdz / r);
    }

    #[test]
    fn test_loop_centre_field() {
        // Bz at the centre of a loop of radius a: μ0 I / (2a)
        let a = 0.7;
        let bz = greens_bz(a, 0.0, 1e-6, 0.0);
        let expected = MU0 / (2.0 * a);
        assert!((bz - expected).abs() < 1e-4 * expected, "{bz} vs {expected}");
    }

    #[test]
    fn test_greens_field_shape() {
        let r = Array2::from_shape_fn((5, 3), |(i, _)| 0.5 + 0.1 * i as f64);
        let z = Array2::from_shape_fn((5, 3), |(_, j)| -0.1 + 0.1 * j as f64);
        let g = greens_field(greens, 1.0, 0.0, &r, &z).unwrap();
        assert_eq!(g.dim(), (5, 3));
        assert!((g[[2, 1]] - greens(1.0, 0.0, r[[2, 1]], z[[2, 1]])).abs() < 1e-18);
        assert!(greens_field(greens, 1.0, 0.0, &r, &Array2::zeros((3, 5))).is_err());
    }
}
