//! Coil-current constraints applied around each Picard step.
//!
//! Any `FnMut(&mut Equilibrium) -> GsResult<()>` is a [`Constraint`];
//! [`XPointConstraint`] is the stock one, placing magnetic nulls by
//! adjusting control-coil currents.

use gs_math::linalg::lstsq_svd;
use gs_types::error::{ensure_shape, GsError, GsResult};
use ndarray::{Array1, Array2};

use crate::equilibrium::Equilibrium;

/// Adjusts an equilibrium (typically its coil currents) in place.
pub trait Constraint {
    fn constrain(&mut self, eq: &mut Equilibrium) -> GsResult<()>;
}

impl<F> Constraint for F
where
    F: FnMut(&mut Equilibrium) -> GsResult<()>,
{
    fn constrain(&mut self, eq: &mut Equilibrium) -> GsResult<()> {
        self(eq)
    }
}

/// Request Br = Bz = 0 at a set of (R, Z) points.
///
/// Each call linearises the field in the control currents and applies
/// the least-squares current change
///
///   ΔI = argmin ‖A ΔI + b‖² + γ² ‖ΔI‖²
///
/// where `b` stacks the present Br and Bz at the points and `A` the
/// per-ampere responses of the control coils.
#[derive(Debug, Clone)]
pub struct XPointConstraint {
    points: Vec<(f64, f64)>,
    /// Tikhonov regularisation γ (default: 1e-12).
    pub gamma: f64,
    /// Relative singular-value cutoff (default: 1e-10).
    pub sv_cutoff: f64,
    /// Symmetric bound on each control current (A), if any.
    pub current_limit: Option<f64>,
}

impl XPointConstraint {
    pub fn new(points: Vec<(f64, f64)>) -> GsResult<Self> {
        if points.is_empty() {
            return Err(GsError::ConfigError(
                "X-point constraint needs at least one point".to_string(),
            ));
        }
        for &(r, z) in &points {
            if !(r.is_finite() && z.is_finite()) || r <= 0.0 {
                return Err(GsError::DomainError {
                    r,
                    z,
                    message: "X-point target must have finite R > 0".to_string(),
                });
            }
        }
        Ok(XPointConstraint {
            points,
            gamma: 1e-12,
            sv_cutoff: 1e-10,
            current_limit: None,
        })
    }

    pub fn with_gamma(mut self, gamma: f64) -> Self {
        self.gamma = gamma;
        self
    }

    pub fn with_current_limit(mut self, limit: f64) -> Self {
        self.current_limit = Some(limit.abs());
        self
    }

    pub fn points(&self) -> &[(f64, f64)] {
        &self.points
    }
}

impl Constraint for XPointConstraint {
    fn constrain(&mut self, eq: &mut Equilibrium) -> GsResult<()> {
        let currents = eq.machine().control_currents();
        let n = currents.len();
        if n == 0 {
            log::warn!("X-point constraint has no control coils to adjust");
            return Ok(());
        }
        let m = 2 * self.points.len();

        // Rows: Br at each point, then Bz; regularisation rows below
        let mut a = Array2::zeros((m + n, n));
        let mut rhs = Array1::zeros(m + n);
        for (k, &(r, z)) in self.points.iter().enumerate() {
            let br = eq.machine().control_br(r, z);
            let bz = eq.machine().control_bz(r, z);
            ensure_shape("control coil Br response", (n, 1), (br.len(), 1))?;
            ensure_shape("control coil Bz response", (n, 1), (bz.len(), 1))?;
            for c in 0..n {
                a[[k, c]] = br[c];
                a[[self.points.len() + k, c]] = bz[c];
            }
            rhs[k] = -eq.br(r, z)?;
            rhs[self.points.len() + k] = -eq.bz(r, z)?;
        }
        for c in 0..n {
            a[[m + c, c]] = self.gamma;
        }

        let delta = lstsq_svd(&a, &rhs, self.sv_cutoff)?;
        let updated: Vec<f64> = currents
            .iter()
            .zip(delta.iter())
            .map(|(&i0, &di)| {
                let i = i0 + di;
                match self.current_limit {
                    Some(limit) => i.clamp(-limit, limit),
                    None => i,
                }
            })
            .collect();

        log::debug!("X-point constraint: control currents {currents:?} -> {updated:?}");
        eq.machine_mut().set_control_currents(&updated)
    }
}
