// ─────────────────────────────────────────────────────────────────────
// SCPN Grad-Shafranov Core — Picard Iteration
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Picard (fixed-point) iteration for the nonlinear Grad-Shafranov problem.
//!
//! Each iteration:
//! 1. Current density from the profiles at the present total flux
//! 2. Edge values from the boundary strategy
//! 3. Linear solve for the plasma flux, plasma current recomputed
//! 4. Constraints re-applied, optional blending with the previous flux
//! 5. Relative change max|Δψ| / (max ψ − min ψ) of the total flux
//!
//! The loop ends when the relative change drops below `rtol` or after
//! `max_iterations`; the latter is reported, not raised.

use gs_types::config::PicardConfig;
use gs_types::error::{GsError, GsResult};
use ndarray::Array2;

use crate::constraint::Constraint;
use crate::equilibrium::Equilibrium;
use crate::profile::Profile;

/// How a Picard run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PicardStatus {
    Converged,
    /// `max_iterations` reached without meeting `rtol`.
    MaxIterations,
}

/// Outcome of [`solve`].
#[derive(Debug, Clone)]
pub struct PicardReport {
    pub status: PicardStatus,
    /// Number of linear solves performed.
    pub iterations: usize,
    /// Relative change of the total flux after each iteration.
    pub history: Vec<f64>,
}

impl PicardReport {
    pub fn converged(&self) -> bool {
        self.status == PicardStatus::Converged
    }

    pub fn final_change(&self) -> Option<f64> {
        self.history.last().copied()
    }
}

/// Relative change between two flux maps, normalised by the range of
/// `current`. A flat field counts as unchanged only if nothing changed.
pub fn relative_change(previous: &Array2<f64>, current: &Array2<f64>) -> f64 {
    let change = previous
        .iter()
        .zip(current.iter())
        .map(|(a, b)| (a - b).abs())
        .fold(0.0, f64::max);
    let max = current.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let min = current.iter().copied().fold(f64::INFINITY, f64::min);
    let range = max - min;

    if range > 0.0 {
        change / range
    } else if change == 0.0 {
        0.0
    } else {
        f64::INFINITY
    }
}

fn check_finite(eq: &Equilibrium, iteration: usize) -> GsResult<()> {
    if eq.plasma_psi().iter().any(|v| !v.is_finite()) {
        return Err(GsError::SolverDiverged {
            iteration,
            message: "NaN or Inf detected in plasma psi".to_string(),
        });
    }
    if !eq.plasma_current().is_finite() {
        return Err(GsError::SolverDiverged {
            iteration,
            message: "non-finite plasma current".to_string(),
        });
    }
    Ok(())
}

/// Iterate `eq` towards a self-consistent equilibrium for `profiles`.
///
/// `profiles` is attached to `eq` and stays attached afterwards. If a
/// constraint is given it is applied before the first iteration and
/// after every linear solve.
pub fn solve(
    eq: &mut Equilibrium,
    profiles: Box<dyn Profile>,
    mut constrain: Option<&mut dyn Constraint>,
    config: &PicardConfig,
) -> GsResult<PicardReport> {
    config.validate()?;
    eq.set_profiles(profiles);

    if let Some(c) = constrain.as_deref_mut() {
        c.constrain(eq)?;
    }

    let mut psi = eq.psi()?;
    let mut history = Vec::new();

    for iteration in 0..config.max_iterations {
        let psi_last = psi;
        let plasma_last = eq.plasma_psi().clone();

        eq.solve()?;
        check_finite(eq, iteration)?;

        if let Some(c) = constrain.as_deref_mut() {
            c.constrain(eq)?;
        }

        if config.blend > 0.0 {
            let blended = eq.plasma_psi() * (1.0 - config.blend) + &plasma_last * config.blend;
            eq.update_plasma_psi(blended)?;
        }

        psi = eq.psi()?;
        if psi.iter().any(|v| !v.is_finite()) {
            return Err(GsError::SolverDiverged {
                iteration,
                message: "NaN or Inf detected in total psi".to_string(),
            });
        }

        let change = psi_last
            .iter()
            .zip(psi.iter())
            .map(|(a, b)| (a - b).abs())
            .fold(0.0, f64::max);
        let relative = relative_change(&psi_last, &psi);
        log::info!("Maximum change in psi: {change:e}. Relative: {relative:e}");
        history.push(relative);

        if relative < config.rtol {
            return Ok(PicardReport {
                status: PicardStatus::Converged,
                iterations: iteration + 1,
                history,
            });
        }
    }

    log::warn!(
        "Picard iteration did not converge in {} iterations (last relative change {:e})",
        config.max_iterations,
        history.last().copied().unwrap_or(f64::NAN)
    );
    Ok(PicardReport {
        status: PicardStatus::MaxIterations,
        iterations: config.max_iterations,
        history,
    })
}
