// ─────────────────────────────────────────────────────────────────────
// SCPN Grad-Shafranov Core — Machine
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Vacuum flux sources: coil sets and the coil-free machine.
//!
//! A [`Machine`] supplies the flux and field of external conductors. The
//! equilibrium asks it once for a table of Green's functions on the grid
//! ([`PsiGreens`]) and afterwards recombines that table with the present
//! coil currents, so control-current changes never re-evaluate elliptic
//! integrals over the whole grid.

use gs_math::greens::{greens, greens_br, greens_bz, greens_field};
use gs_types::error::{ensure_shape, GsError, GsResult};
use ndarray::Array2;

/// Per-coil Green's function tables on the equilibrium grid.
///
/// Entry `i` is the flux per ampere of coil `i` (turns included).
#[derive(Debug, Clone)]
pub struct PsiGreens {
    shape: (usize, usize),
    tables: Vec<Array2<f64>>,
}

impl PsiGreens {
    pub fn new(shape: (usize, usize), tables: Vec<Array2<f64>>) -> GsResult<Self> {
        for table in &tables {
            ensure_shape("Green's function table", shape, table.dim())?;
        }
        Ok(PsiGreens { shape, tables })
    }

    pub fn shape(&self) -> (usize, usize) {
        self.shape
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}

/// External conductors contributing vacuum flux.
pub trait Machine: Send + Sync {
    /// Tabulate per-coil flux responses at every (R, Z) grid point.
    fn create_psi_greens(&self, r: &Array2<f64>, z: &Array2<f64>) -> GsResult<PsiGreens>;

    /// Vacuum flux on the grid for the present coil currents.
    fn calc_psi_from_greens(&self, greens: &PsiGreens) -> GsResult<Array2<f64>>;

    /// Vacuum poloidal flux at a point.
    fn psi(&self, r: f64, z: f64) -> f64;

    /// Vacuum radial field at a point.
    fn br(&self, r: f64, z: f64) -> f64;

    /// Vacuum vertical field at a point.
    fn bz(&self, r: f64, z: f64) -> f64;

    /// Currents of the coils available to constraints, in order.
    fn control_currents(&self) -> Vec<f64>;

    /// Replace the control currents (same order and length as
    /// [`Machine::control_currents`]).
    fn set_control_currents(&mut self, currents: &[f64]) -> GsResult<()>;

    /// Radial field per ampere of each control coil at a point.
    fn control_br(&self, r: f64, z: f64) -> Vec<f64>;

    /// Vertical field per ampere of each control coil at a point.
    fn control_bz(&self, r: f64, z: f64) -> Vec<f64>;

    fn clone_box(&self) -> Box<dyn Machine>;
}

/// Axisymmetric circular coil (filament).
#[derive(Debug, Clone, PartialEq)]
pub struct Coil {
    /// Major radius (m).
    pub r: f64,
    /// Vertical position (m).
    pub z: f64,
    /// Current per turn (A).
    pub current: f64,
    /// Number of turns (default: 1).
    pub turns: f64,
    /// Whether constraints may adjust this coil's current (default: true).
    pub control: bool,
}

impl Coil {
    pub fn new(r: f64, z: f64) -> Self {
        Coil {
            r,
            z,
            current: 0.0,
            turns: 1.0,
            control: true,
        }
    }

    pub fn with_current(mut self, current: f64) -> Self {
        self.current = current;
        self
    }

    pub fn with_turns(mut self, turns: f64) -> Self {
        self.turns = turns;
        self
    }

    /// Exclude from constraint control.
    pub fn fixed(mut self) -> Self {
        self.control = false;
        self
    }

    fn validate(&self, index: usize) -> GsResult<()> {
        if !(self.r.is_finite() && self.r > 0.0) {
            return Err(GsError::ConfigError(format!(
                "coil {index}: radius must be finite and > 0, got {}",
                self.r
            )));
        }
        if !(self.z.is_finite() && self.current.is_finite() && self.turns.is_finite()) {
            return Err(GsError::ConfigError(format!(
                "coil {index}: position, current and turns must be finite"
            )));
        }
        Ok(())
    }
}

/// A set of circular coils.
#[derive(Debug, Clone, Default)]
pub struct CoilSet {
    coils: Vec<Coil>,
}

impl CoilSet {
    pub fn new(coils: Vec<Coil>) -> GsResult<Self> {
        for (i, coil) in coils.iter().enumerate() {
            coil.validate(i)?;
        }
        Ok(CoilSet { coils })
    }

    pub fn coils(&self) -> &[Coil] {
        &self.coils
    }

    fn sum_over(&self, kernel: fn(f64, f64, f64, f64) -> f64, r: f64, z: f64) -> f64 {
        self.coils
            .iter()
            .map(|c| c.current * c.turns * kernel(c.r, c.z, r, z))
            .sum()
    }

    fn control_response(&self, kernel: fn(f64, f64, f64, f64) -> f64, r: f64, z: f64) -> Vec<f64> {
        self.coils
            .iter()
            .filter(|c| c.control)
            .map(|c| c.turns * kernel(c.r, c.z, r, z))
            .collect()
    }
}

impl Machine for CoilSet {
    fn create_psi_greens(&self, r: &Array2<f64>, z: &Array2<f64>) -> GsResult<PsiGreens> {
        let tables = self
            .coils
            .iter()
            .map(|c| greens_field(greens, c.r, c.z, r, z).map(|g| g * c.turns))
            .collect::<GsResult<Vec<_>>>()?;
        PsiGreens::new(r.dim(), tables)
    }

    fn calc_psi_from_greens(&self, greens: &PsiGreens) -> GsResult<Array2<f64>> {
        if greens.len() != self.coils.len() {
            return Err(GsError::ShapeMismatch {
                context: "Green's function tables per coil".to_string(),
                expected: (self.coils.len(), 1),
                got: (greens.len(), 1),
            });
        }
        let mut psi = Array2::zeros(greens.shape());
        for (coil, table) in self.coils.iter().zip(&greens.tables) {
            psi.scaled_add(coil.current, table);
        }
        Ok(psi)
    }

    fn psi(&self, r: f64, z: f64) -> f64 {
        self.sum_over(greens, r, z)
    }

    fn br(&self, r: f64, z: f64) -> f64 {
        self.sum_over(greens_br, r, z)
    }

    fn bz(&self, r: f64, z: f64) -> f64 {
        self.sum_over(greens_bz, r, z)
    }

    fn control_currents(&self) -> Vec<f64> {
        self.coils
            .iter()
            .filter(|c| c.control)
            .map(|c| c.current)
            .collect()
    }

    fn set_control_currents(&mut self, currents: &[f64]) -> GsResult<()> {
        let n_control = self.coils.iter().filter(|c| c.control).count();
        if currents.len() != n_control {
            return Err(GsError::ShapeMismatch {
                context: "control currents".to_string(),
                expected: (n_control, 1),
                got: (currents.len(), 1),
            });
        }
        if currents.iter().any(|c| !c.is_finite()) {
            return Err(GsError::ConfigError(
                "control currents must be finite".to_string(),
            ));
        }
        for (coil, &current) in self.coils.iter_mut().filter(|c| c.control).zip(currents) {
            coil.current = current;
        }
        Ok(())
    }

    fn control_br(&self, r: f64, z: f64) -> Vec<f64> {
        self.control_response(greens_br, r, z)
    }

    fn control_bz(&self, r: f64, z: f64) -> Vec<f64> {
        self.control_response(greens_bz, r, z)
    }

    fn clone_box(&self) -> Box<dyn Machine> {
        Box::new(self.clone())
    }
}

/// A machine with no coils: zero vacuum flux everywhere.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmptyTokamak;

impl Machine for EmptyTokamak {
    fn create_psi_greens(&self, r: &Array2<f64>, z: &Array2<f64>) -> GsResult<PsiGreens> {
        ensure_shape("Green's function Z mesh", r.dim(), z.dim())?;
        PsiGreens::new(r.dim(), Vec::new())
    }

    fn calc_psi_from_greens(&self, greens: &PsiGreens) -> GsResult<Array2<f64>> {
        Ok(Array2::zeros(greens.shape()))
    }

    fn psi(&self, _r: f64, _z: f64) -> f64 {
        0.0
    }

    fn br(&self, _r: f64, _z: f64) -> f64 {
        0.0
    }

    fn bz(&self, _r: f64, _z: f64) -> f64 {
        0.0
    }

    fn control_currents(&self) -> Vec<f64> {
        Vec::new()
    }

    fn set_control_currents(&mut self, currents: &[f64]) -> GsResult<()> {
        if !currents.is_empty() {
            return Err(GsError::ShapeMismatch {
                context: "control currents".to_string(),
                expected: (0, 1),
                got: (currents.len(), 1),
            });
        }
        Ok(())
    }

    fn control_br(&self, _r: f64, _z: f64) -> Vec<f64> {
        Vec::new()
    }

    fn control_bz(&self, _r: f64, _z: f64) -> Vec<f64> {
        Vec::new()
    }

    fn clone_box(&self) -> Box<dyn Machine> {
        Box::new(*self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mesh() -> (Array2<f64>, Array2<f64>) {
        let r = Array2::from_shape_fn((9, 9), |(i, _)| 0.5 + 0.125 * i as f64);
        let z = Array2::from_shape_fn((9, 9), |(_, j)| -0.5 + 0.125 * j as f64);
        (r, z)
    }

    fn two_coils() -> CoilSet {
        CoilSet::new(vec![
            Coil::new(2.0, 1.0).with_current(1e4).with_turns(2.0),
            Coil::new(2.0, -1.0).with_current(-5e3).fixed(),
        ])
        .unwrap()
    }

    #[test]
    fn test_greens_table_matches_pointwise() {
        let coils = two_coils();
        let (r, z) = mesh();
        let table = coils.create_psi_greens(&r, &z).unwrap();
        assert_eq!(table.len(), 2);
        let psi = coils.calc_psi_from_greens(&table).unwrap();
        for &(i, j) in &[(0, 0), (4, 4), (8, 2)] {
            let direct = coils.psi(r[[i, j]], z[[i, j]]);
            assert!(
                (psi[[i, j]] - direct).abs() < 1e-12 * direct.abs().max(1e-9),
                "table {} vs direct {direct}",
                psi[[i, j]]
            );
        }
    }

    #[test]
    fn test_table_reused_after_current_change() {
        let mut coils = two_coils();
        let (r, z) = mesh();
        let table = coils.create_psi_greens(&r, &z).unwrap();
        coils.set_control_currents(&[0.0]).unwrap();
        let psi = coils.calc_psi_from_greens(&table).unwrap();
        let expected = -5e3 * greens(2.0, -1.0, r[[3, 3]], z[[3, 3]]);
        assert!((psi[[3, 3]] - expected).abs() < 1e-12 * expected.abs());
    }

    #[test]
    fn test_control_subset() {
        let coils = two_coils();
        assert_eq!(coils.control_currents(), vec![1e4]);
        assert_eq!(coils.control_br(1.0, 0.0).len(), 1);
        let mut coils = coils;
        assert!(coils.set_control_currents(&[1.0, 2.0]).is_err());
    }

    #[test]
    fn test_invalid_coil_rejected() {
        assert!(CoilSet::new(vec![Coil::new(-1.0, 0.0)]).is_err());
        assert!(CoilSet::new(vec![Coil::new(1.0, f64::NAN)]).is_err());
    }

    #[test]
    fn test_empty_tokamak_zero() {
        let (r, z) = mesh();
        let table = EmptyTokamak.create_psi_greens(&r, &z).unwrap();
        assert!(table.is_empty());
        let psi = EmptyTokamak.calc_psi_from_greens(&table).unwrap();
        assert_eq!(psi.dim(), (9, 9));
        assert!(psi.iter().all(|&v| v == 0.0));
        assert_eq!(EmptyTokamak.br(1.0, 0.0), 0.0);
    }
}
