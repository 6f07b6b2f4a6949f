// ─────────────────────────────────────────────────────────────────────
// SCPN Grad-Shafranov Core — Boundary Conditions
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Edge values of the plasma flux.
//!
//! - [`FixedBoundary`]: ψ = 0 on all four edges.
//! - [`FreeBoundary`]: edge ψ from the Green's-function integral of the
//!   plasma current over the whole domain.
//! - [`FreeBoundaryHagenow`]: edge ψ from the von Hagenow method, which
//!   replaces the area integral by a contour integral of the normal
//!   derivative of an auxiliary fixed-boundary solution.
//!
//! Appliers write only the edge entries of the plasma flux array.

use std::f64::consts::PI;
use std::sync::Arc;

use gs_math::greens::greens;
use gs_math::romberg::romb2d;
use gs_types::config::BoundaryKind;
use gs_types::constants::MU0;
use gs_types::error::{ensure_shape, GsError, GsResult};
use gs_types::state::Grid2D;
use ndarray::Array2;
use rayon::prelude::*;

use crate::equilibrium::Equilibrium;

/// Strategy for the plasma-flux edge values.
pub trait BoundaryCondition: Send + Sync {
    /// Overwrite the edge entries of `psi` given the current density `jtor`.
    fn apply(&self, eq: &Equilibrium, jtor: &Array2<f64>, psi: &mut Array2<f64>) -> GsResult<()>;

    /// Reject grids this strategy cannot work on. Called when an
    /// equilibrium is built, before any solve.
    fn check_grid(&self, _grid: &Grid2D) -> GsResult<()> {
        Ok(())
    }

    fn name(&self) -> &'static str;
}

/// Boundary applier for a configuration choice.
pub fn from_kind(kind: BoundaryKind) -> Arc<dyn BoundaryCondition> {
    match kind {
        BoundaryKind::Fixed => Arc::new(FixedBoundary),
        BoundaryKind::Free => Arc::new(FreeBoundary),
        BoundaryKind::FreeHagenow => Arc::new(FreeBoundaryHagenow),
    }
}

fn check_inputs(eq: &Equilibrium, jtor: &Array2<f64>, psi: &Array2<f64>) -> GsResult<()> {
    let shape = eq.grid().shape();
    ensure_shape("boundary current density", shape, jtor.dim())?;
    ensure_shape("boundary flux", shape, psi.dim())
}

/// Zero flux on the computational boundary.
#[derive(Debug, Clone, Copy, Default)]
pub struct FixedBoundary;

impl BoundaryCondition for FixedBoundary {
    fn apply(&self, eq: &Equilibrium, jtor: &Array2<f64>, psi: &mut Array2<f64>) -> GsResult<()> {
        check_inputs(eq, jtor, psi)?;
        for (ix, iy) in eq.grid().boundary_indices() {
            psi[[ix, iy]] = 0.0;
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "fixed"
    }
}

/// Free boundary by direct Green's-function integration:
///
///   ψ(R_b, Z_b) = ∫∫ G(R, Z; R_b, Z_b) Jtor(R, Z) dR dZ
///
/// with the (singular) grid cell at the boundary point itself excluded.
#[derive(Debug, Clone, Copy, Default)]
pub struct FreeBoundary;

impl BoundaryCondition for FreeBoundary {
    fn apply(&self, eq: &Equilibrium, jtor: &Array2<f64>, psi: &mut Array2<f64>) -> GsResult<()> {
        check_inputs(eq, jtor, psi)?;
        let grid = eq.grid();
        let points: Vec<(usize, usize)> = grid.boundary_indices().collect();

        let values = points
            .par_iter()
            .map(|&(bx, by)| {
                let (rb, zb) = (grid.r[bx], grid.z[by]);
                let mut integrand = Array2::zeros(jtor.dim());
                for ((ix, iy), v) in integrand.indexed_iter_mut() {
                    let j = jtor[[ix, iy]];
                    if j != 0.0 && (ix, iy) != (bx, by) {
                        *v = greens(grid.r[ix], grid.z[iy], rb, zb) * j;
                    }
                }
                romb2d(&integrand, grid.dr, grid.dz)
            })
            .collect::<GsResult<Vec<f64>>>()?;

        for (&(ix, iy), value) in points.iter().zip(values) {
            psi[[ix, iy]] = value;
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "free"
    }
}

/// Free boundary by the von Hagenow method.
///
/// 1. Solve Δ*U = −μ0 R Jtor with U = 0 on the edge, using the
///    equilibrium's own linear solver.
/// 2. Take the outward normal derivative of U on each edge with the
///    one-sided stencil (11U₀ − 18U₁ + 9U₂ − 2U₃) / 6h.
/// 3. ψ(r_b) = −(1/μ0) ∮ G(r′; r_b) (∂U/∂n)(r′) / R′ dl′, integrated by
///    the trapezoid rule along each edge. The logarithmic singularity at
///    r′ = r_b is replaced by the average of G over the boundary segment,
///    (μ0/2π) R (ln(16R/h) − 1).
#[derive(Debug, Clone, Copy, Default)]
pub struct FreeBoundaryHagenow;

/// A boundary node with its contour weight and the integrand factor
/// (∂U/∂n)/R′ · dl′.
#[derive(Debug, Clone, Copy)]
struct ContourNode {
    ix: usize,
    iy: usize,
    weight: f64,
    seg: f64,
}

/// The four-point edge stencil needs an interior point beyond it.
const HAGENOW_MIN_POINTS: usize = 5;

fn edge_derivative(u0: f64, u1: f64, u2: f64, u3: f64, h: f64) -> f64 {
    (11.0 * u0 - 18.0 * u1 + 9.0 * u2 - 2.0 * u3) / (6.0 * h)
}

fn trapezoid_weight(i: usize, n: usize, h: f64) -> f64 {
    if i == 0 || i == n - 1 {
        0.5 * h
    } else {
        h
    }
}

impl FreeBoundaryHagenow {
    fn contour(eq: &Equilibrium, u: &Array2<f64>) -> Vec<ContourNode> {
        let grid = eq.grid();
        let (nx, ny) = grid.shape();
        let (dr, dz) = (grid.dr, grid.dz);
        let mut nodes = Vec::with_capacity(2 * (nx + ny));

        // Inner (R = Rmin) and outer (R = Rmax) edges
        for iy in 0..ny {
            let w = trapezoid_weight(iy, ny, dz);
            let d_in = edge_derivative(u[[0, iy]], u[[1, iy]], u[[2, iy]], u[[3, iy]], dr);
            let d_out = edge_derivative(
                u[[nx - 1, iy]],
                u[[nx - 2, iy]],
                u[[nx - 3, iy]],
                u[[nx - 4, iy]],
                dr,
            );
            nodes.push(ContourNode {
                ix: 0,
                iy,
                weight: w * d_in / grid.r[0],
                seg: dz,
            });
            nodes.push(ContourNode {
                ix: nx - 1,
                iy,
                weight: w * d_out / grid.r[nx - 1],
                seg: dz,
            });
        }
        // Lower and upper edges
        for ix in 0..nx {
            let w = trapezoid_weight(ix, nx, dr);
            let d_lo = edge_derivative(u[[ix, 0]], u[[ix, 1]], u[[ix, 2]], u[[ix, 3]], dz);
            let d_hi = edge_derivative(
                u[[ix, ny - 1]],
                u[[ix, ny - 2]],
                u[[ix, ny - 3]],
                u[[ix, ny - 4]],
                dz,
            );
            nodes.push(ContourNode {
                ix,
                iy: 0,
                weight: w * d_lo / grid.r[ix],
                seg: dr,
            });
            nodes.push(ContourNode {
                ix,
                iy: ny - 1,
                weight: w * d_hi / grid.r[ix],
                seg: dr,
            });
        }
        nodes
    }
}

impl BoundaryCondition for FreeBoundaryHagenow {
    fn check_grid(&self, grid: &Grid2D) -> GsResult<()> {
        if grid.nx < HAGENOW_MIN_POINTS || grid.ny < HAGENOW_MIN_POINTS {
            return Err(GsError::ConfigError(format!(
                "von Hagenow boundary needs at least {HAGENOW_MIN_POINTS}x{HAGENOW_MIN_POINTS} points, got {}x{}",
                grid.nx, grid.ny
            )));
        }
        Ok(())
    }

    fn apply(&self, eq: &Equilibrium, jtor: &Array2<f64>, psi: &mut Array2<f64>) -> GsResult<()> {
        check_inputs(eq, jtor, psi)?;
        let grid = eq.grid();
        self.check_grid(grid)?;

        let mut rhs = &grid.rr * jtor * (-MU0);
        for (ix, iy) in grid.boundary_indices() {
            rhs[[ix, iy]] = 0.0;
        }
        let u = eq.call_solver(&Array2::zeros(grid.shape()), &rhs)?;

        let nodes = Self::contour(eq, &u);
        let points: Vec<(usize, usize)> = grid.boundary_indices().collect();

        let values: Vec<f64> = points
            .par_iter()
            .map(|&(bx, by)| {
                let (rb, zb) = (grid.r[bx], grid.z[by]);
                let integral: f64 = nodes
                    .iter()
                    .filter(|n| n.weight != 0.0)
                    .map(|n| {
                        let g = if (n.ix, n.iy) == (bx, by) {
                            MU0 / (2.0 * PI) * rb * ((16.0 * rb / n.seg).ln() - 1.0)
                        } else {
                            greens(grid.r[n.ix], grid.z[n.iy], rb, zb)
                        };
                        g * n.weight
                    })
                    .sum();
                -integral / MU0
            })
            .collect();

        for (&(ix, iy), value) in points.iter().zip(values) {
            psi[[ix, iy]] = value;
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "free-hagenow"
    }
}
