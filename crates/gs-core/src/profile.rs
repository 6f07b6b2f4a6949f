//! Plasma profile collaborator.
//!
//! The Picard driver only ever calls [`Profile::jtor`]; the flux-function
//! accessors are passed through by [`crate::equilibrium::Equilibrium`].
//! Flux-function arguments are normalised flux, 0 on axis and 1 at the
//! plasma edge.

use gs_types::error::{ensure_shape, GsError, GsResult};
use gs_types::state::Grid2D;
use ndarray::Array2;

/// Source of toroidal current density and flux functions.
pub trait Profile: Send + Sync {
    /// Toroidal current density on the (R, Z) mesh for total flux `psi`.
    ///
    /// Must return an array of the same shape as `r`. May update internal
    /// state (e.g. locations of the magnetic axis and separatrix).
    fn jtor(
        &mut self,
        r: &Array2<f64>,
        z: &Array2<f64>,
        psi: &Array2<f64>,
    ) -> GsResult<Array2<f64>>;

    /// dp/dψ at normalised flux.
    fn pprime(&self, _psi_norm: f64) -> f64 {
        0.0
    }

    /// F dF/dψ at normalised flux.
    fn ffprime(&self, _psi_norm: f64) -> f64 {
        0.0
    }

    /// Plasma pressure at normalised flux.
    fn pressure(&self, _psi_norm: f64) -> f64 {
        0.0
    }

    /// Poloidal current function F = R·Bφ at normalised flux.
    fn fpol(&self, _psi_norm: f64) -> f64 {
        self.fvac()
    }

    /// Vacuum F = R·Bφ outside the plasma.
    fn fvac(&self) -> f64;

    fn clone_box(&self) -> Box<dyn Profile>;
}

/// A prescribed current density, independent of ψ.
///
/// Useful for fixed-source solves and as a seed for nonlinear profiles.
#[derive(Debug, Clone)]
pub struct FixedCurrent {
    jtor: Array2<f64>,
    fvac: f64,
}

impl FixedCurrent {
    pub fn new(jtor: Array2<f64>) -> Self {
        FixedCurrent { jtor, fvac: 0.0 }
    }

    /// Zero current on a `shape` grid.
    pub fn zeros(shape: (usize, usize)) -> Self {
        Self::new(Array2::zeros(shape))
    }

    /// Gaussian current blob centred at (r0, z0) with width `sigma`,
    /// scaled so its Romberg integral over the grid is `ip`.
    pub fn gaussian(grid: &Grid2D, r0: f64, z0: f64, sigma: f64, ip: f64) -> GsResult<Self> {
        if !(sigma.is_finite() && sigma > 0.0) {
            return Err(GsError::ConfigError(format!(
                "Gaussian width must be finite and > 0, got {sigma}"
            )));
        }
        let mut j = Array2::zeros(grid.shape());
        for ((ix, iy), v) in j.indexed_iter_mut() {
            let d2 = (grid.r[ix] - r0).powi(2) + (grid.z[iy] - z0).powi(2);
            *v = (-d2 / (2.0 * sigma * sigma)).exp();
        }
        // Edge rows carry no current
        for (ix, iy) in grid.boundary_indices() {
            j[[ix, iy]] = 0.0;
        }
        let total = gs_math::romberg::romb2d(&j, grid.dr, grid.dz)?;
        if total <= 0.0 {
            return Err(GsError::ConfigError(
                "Gaussian current has no weight inside the grid".to_string(),
            ));
        }
        j.mapv_inplace(|v| v * ip / total);
        Ok(Self::new(j))
    }

    pub fn with_fvac(mut self, fvac: f64) -> Self {
        self.fvac = fvac;
        self
    }

    pub fn current_density(&self) -> &Array2<f64> {
        &self.jtor
    }
}

impl Profile for FixedCurrent {
    fn jtor(
        &mut self,
        r: &Array2<f64>,
        _z: &Array2<f64>,
        _psi: &Array2<f64>,
    ) -> GsResult<Array2<f64>> {
        ensure_shape("prescribed current density", r.dim(), self.jtor.dim())?;
        Ok(self.jtor.clone())
    }

    fn fvac(&self) -> f64 {
        self.fvac
    }

    fn clone_box(&self) -> Box<dyn Profile> {
        Box::new(self.clone())
    }
}
