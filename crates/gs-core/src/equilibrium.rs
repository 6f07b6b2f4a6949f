// ─────────────────────────────────────────────────────────────────────
// SCPN Grad-Shafranov Core — Equilibrium
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Equilibrium state: grid, plasma flux, linear solver and coil coupling.
//!
//! The plasma flux is the only mutable field; [`Equilibrium::update_plasma_psi`]
//! replaces it and rebuilds the spline interpolator in one step, so every
//! point query sees a spline consistent with the stored array. Total flux
//! is plasma flux plus the vacuum flux of the machine's coils, recombined
//! from a Green's-function table computed once at construction.

use std::sync::Arc;

use gs_math::multigrid::{create_vcycle, interpolate, restrict, LinearSolver};
use gs_math::operator::GsSparse;
use gs_math::romberg::romb2d;
use gs_math::spline::BicubicSpline;
use gs_types::config::{EquilibriumConfig, SolverConfig};
use gs_types::constants::MU0;
use gs_types::error::{ensure_shape, GsError, GsResult};
use gs_types::state::Grid2D;
use ndarray::Array2;

use crate::boundary::{self, BoundaryCondition};
use crate::machine::{Machine, PsiGreens};
use crate::profile::Profile;

/// Width of the Gaussian initial flux in unit-normalised coordinates.
const INITIAL_PSI_WIDTH: f64 = 0.4;

/// Plasma equilibrium on a rectangular (R, Z) grid.
pub struct Equilibrium {
    grid: Grid2D,
    plasma_psi: Array2<f64>,
    spline: BicubicSpline,
    solver: Box<dyn LinearSolver>,
    solver_config: SolverConfig,
    boundary: Arc<dyn BoundaryCondition>,
    machine: Box<dyn Machine>,
    profiles: Option<Box<dyn Profile>>,
    psi_greens: PsiGreens,
    current: f64,
    /// A caller-supplied solver replaced the one built from `solver_config`.
    custom_solver: bool,
}

/// Initial plasma flux: a Gaussian centred mid-radius at Z = 0 on
/// unit-normalised coordinates, zero on the edge.
pub fn initial_psi(grid: &Grid2D) -> Array2<f64> {
    let (nx, ny) = grid.shape();
    let y_mid = -grid.z_min / (grid.z_max - grid.z_min);
    let w2 = INITIAL_PSI_WIDTH * INITIAL_PSI_WIDTH;

    let mut psi = Array2::from_shape_fn((nx, ny), |(ix, iy)| {
        let x = ix as f64 / (nx - 1) as f64;
        let y = iy as f64 / (ny - 1) as f64;
        (-((x - 0.5).powi(2) + (y - y_mid).powi(2)) / w2).exp()
    });
    for (ix, iy) in grid.boundary_indices() {
        psi[[ix, iy]] = 0.0;
    }
    psi
}

impl Equilibrium {
    /// Build an equilibrium with the Gaussian initial flux.
    ///
    /// Fails with `ConfigError` if the solver configuration cannot be
    /// realised on this grid.
    pub fn new(
        machine: Box<dyn Machine>,
        grid: Grid2D,
        boundary: Arc<dyn BoundaryCondition>,
        solver_config: &SolverConfig,
    ) -> GsResult<Self> {
        let psi = initial_psi(&grid);
        Self::with_psi(machine, grid, boundary, solver_config, psi)
    }

    /// Build an equilibrium with a caller-supplied initial plasma flux.
    pub fn with_psi(
        machine: Box<dyn Machine>,
        grid: Grid2D,
        boundary: Arc<dyn BoundaryCondition>,
        solver_config: &SolverConfig,
        psi: Array2<f64>,
    ) -> GsResult<Self> {
        ensure_shape("initial plasma psi", grid.shape(), psi.dim())?;
        boundary.check_grid(&grid)?;
        let solver = build_solver(&grid, solver_config)?;
        let psi_greens = machine.create_psi_greens(&grid.rr, &grid.zz)?;
        let spline = BicubicSpline::from_grid(&grid, &psi)?;

        log::debug!(
            "Equilibrium {}x{} on R [{}, {}], Z [{}, {}], {} boundary, {} coil tables",
            grid.nx,
            grid.ny,
            grid.r_min,
            grid.r_max,
            grid.z_min,
            grid.z_max,
            boundary.name(),
            psi_greens.len()
        );

        Ok(Equilibrium {
            grid,
            plasma_psi: psi,
            spline,
            solver,
            solver_config: solver_config.clone(),
            boundary,
            machine,
            profiles: None,
            psi_greens,
            current: 0.0,
            custom_solver: false,
        })
    }

    /// Build grid, boundary strategy and solver from a configuration.
    pub fn from_config(config: &EquilibriumConfig, machine: Box<dyn Machine>) -> GsResult<Self> {
        config.validate()?;
        let grid = config.create_grid()?;
        Self::new(
            machine,
            grid,
            boundary::from_kind(config.boundary),
            &config.solver,
        )
    }

    // ── State ────────────────────────────────────────────────────────

    pub fn grid(&self) -> &Grid2D {
        &self.grid
    }

    pub fn plasma_psi(&self) -> &Array2<f64> {
        &self.plasma_psi
    }

    /// Replace the plasma flux and rebuild the interpolator.
    pub fn update_plasma_psi(&mut self, psi: Array2<f64>) -> GsResult<()> {
        ensure_shape("plasma psi", self.grid.shape(), psi.dim())?;
        self.spline = BicubicSpline::from_grid(&self.grid, &psi)?;
        self.plasma_psi = psi;
        Ok(())
    }

    /// Toroidal plasma current from the last linear solve (A).
    pub fn plasma_current(&self) -> f64 {
        self.current
    }

    pub fn boundary(&self) -> &Arc<dyn BoundaryCondition> {
        &self.boundary
    }

    pub fn machine(&self) -> &dyn Machine {
        self.machine.as_ref()
    }

    /// Mutable machine access, e.g. to change coil currents. The vacuum
    /// flux follows automatically.
    pub fn machine_mut(&mut self) -> &mut dyn Machine {
        self.machine.as_mut()
    }

    pub fn solver_config(&self) -> &SolverConfig {
        &self.solver_config
    }

    // ── Linear solver ────────────────────────────────────────────────

    /// Substitute any linear solver built for this grid's shape.
    ///
    /// `solver_config` is left as it was; [`Self::refine`] and [`Self::coarsen`] cannot
    /// resize an arbitrary solver and rebuild a multigrid from that config.
    pub fn set_solver(&mut self, solver: Box<dyn LinearSolver>) -> GsResult<()> {
        ensure_shape("linear solver", self.grid.shape(), solver.shape())?;
        self.solver = solver;
        self.custom_solver = true;
        Ok(())
    }

    /// Rebuild the multigrid solver with new settings.
    pub fn set_solver_vcycle(&mut self, config: &SolverConfig) -> GsResult<()> {
        self.solver = build_solver(&self.grid, config)?;
        self.solver_config = config.clone();
        self.custom_solver = false;
        Ok(())
    }

    /// Whether the active solver came from [`Equilibrium::set_solver`]
    /// rather than from `solver_config`.
    pub fn has_custom_solver(&self) -> bool {
        self.custom_solver
    }

    /// Run the linear solver on `rhs` starting from `psi`.
    pub fn call_solver(&self, psi: &Array2<f64>, rhs: &Array2<f64>) -> GsResult<Array2<f64>> {
        self.solver.solve(psi, rhs)
    }

    // ── Profiles ─────────────────────────────────────────────────────

    pub fn set_profiles(&mut self, profiles: Box<dyn Profile>) {
        self.profiles = Some(profiles);
    }

    pub fn profiles(&self) -> Option<&dyn Profile> {
        self.profiles.as_deref()
    }

    fn require_profiles(&self) -> GsResult<&dyn Profile> {
        self.profiles.as_deref().ok_or(GsError::MissingProfiles)
    }

    pub fn pprime(&self, psi_norm: f64) -> GsResult<f64> {
        Ok(self.require_profiles()?.pprime(psi_norm))
    }

    pub fn ffprime(&self, psi_norm: f64) -> GsResult<f64> {
        Ok(self.require_profiles()?.ffprime(psi_norm))
    }

    pub fn pressure(&self, psi_norm: f64) -> GsResult<f64> {
        Ok(self.require_profiles()?.pressure(psi_norm))
    }

    pub fn fpol(&self, psi_norm: f64) -> GsResult<f64> {
        Ok(self.require_profiles()?.fpol(psi_norm))
    }

    pub fn fvac(&self) -> GsResult<f64> {
        Ok(self.require_profiles()?.fvac())
    }

    /// Safety factor. Always zero: field-line tracing is not modelled.
    pub fn q(&self, _psi_norm: f64) -> f64 {
        0.0
    }

    // ── Linear step ──────────────────────────────────────────────────

    /// One linear solve with the attached profiles.
    pub fn solve(&mut self) -> GsResult<()> {
        let mut profiles = self.profiles.take().ok_or(GsError::MissingProfiles)?;
        let result = self.solve_with(profiles.as_mut());
        self.profiles = Some(profiles);
        result
    }

    /// One linear solve: current density from `profiles` at the present
    /// total flux, edge values from the boundary strategy, then the
    /// interior from the linear solver.
    pub fn solve_with(&mut self, profiles: &mut dyn Profile) -> GsResult<()> {
        let psi_total = self.psi()?;
        let jtor = profiles.jtor(&self.grid.rr, &self.grid.zz, &psi_total)?;
        ensure_shape("profile current density", self.grid.shape(), jtor.dim())?;

        let mut psi = self.plasma_psi.clone();
        self.boundary.apply(self, &jtor, &mut psi)?;

        let mut rhs = &self.grid.rr * &jtor * (-MU0);
        for (ix, iy) in self.grid.boundary_indices() {
            rhs[[ix, iy]] = psi[[ix, iy]];
        }

        let solved = self.solver.solve(&psi, &rhs)?;
        ensure_shape("linear solver output", self.grid.shape(), solved.dim())?;
        self.update_plasma_psi(solved)?;
        self.current = romb2d(&jtor, self.grid.dr, self.grid.dz)?;
        Ok(())
    }

    // ── Flux and field queries ───────────────────────────────────────

    /// Total flux on the grid: plasma plus coils.
    pub fn psi(&self) -> GsResult<Array2<f64>> {
        let vacuum = self.machine.calc_psi_from_greens(&self.psi_greens)?;
        ensure_shape("vacuum psi", self.grid.shape(), vacuum.dim())?;
        Ok(&self.plasma_psi + &vacuum)
    }

    /// Total flux at a point.
    pub fn psi_rz(&self, r: f64, z: f64) -> GsResult<f64> {
        Ok(self.spline.eval(r, z)? + self.machine.psi(r, z))
    }

    /// Plasma flux at a point.
    pub fn plasma_psi_rz(&self, r: f64, z: f64) -> GsResult<f64> {
        self.spline.eval(r, z)
    }

    /// Radial field of the plasma current: −(1/R) ∂ψ/∂Z.
    pub fn plasma_br(&self, r: f64, z: f64) -> GsResult<f64> {
        Ok(-self.spline.eval_dz(r, z)? / r)
    }

    /// Vertical field of the plasma current: (1/R) ∂ψ/∂R.
    pub fn plasma_bz(&self, r: f64, z: f64) -> GsResult<f64> {
        Ok(self.spline.eval_dr(r, z)? / r)
    }

    /// Total radial field.
    pub fn br(&self, r: f64, z: f64) -> GsResult<f64> {
        Ok(self.plasma_br(r, z)? + self.machine.br(r, z))
    }

    /// Total vertical field.
    pub fn bz(&self, r: f64, z: f64) -> GsResult<f64> {
        Ok(self.plasma_bz(r, z)? + self.machine.bz(r, z))
    }
}

fn build_solver(grid: &Grid2D, config: &SolverConfig) -> GsResult<Box<dyn LinearSolver>> {
    let generator = GsSparse::from_grid(grid);
    Ok(Box::new(create_vcycle(grid.nx, grid.ny, &generator, config)?))
}

/// Largest level count ≤ `config.nlevels` that the grid supports.
fn fit_solver_config(config: &SolverConfig, nx: usize, ny: usize) -> SolverConfig {
    let mut fitted = config.clone();
    while fitted.nlevels > 1 && fitted.validate_for(nx, ny).is_err() {
        fitted.nlevels -= 1;
    }
    fitted
}

fn resample(eq: &Equilibrium, grid: Grid2D, psi: Array2<f64>) -> GsResult<Equilibrium> {
    if eq.custom_solver {
        log::warn!(
            "Custom linear solver is not carried to the {}x{} grid; rebuilding multigrid from the solver config",
            grid.nx,
            grid.ny
        );
    }
    let config = fit_solver_config(&eq.solver_config, grid.nx, grid.ny);
    let mut result = Equilibrium::with_psi(
        eq.machine.clone_box(),
        grid,
        Arc::clone(&eq.boundary),
        &config,
        psi,
    )?;
    if let Some(profiles) = &eq.profiles {
        result.set_profiles(profiles.clone_box());
    }
    result.current = eq.current;
    Ok(result)
}

/// New equilibrium at double resolution (2n − 1 points per axis), plasma
/// flux bilinearly interpolated.
pub fn refine(eq: &Equilibrium) -> GsResult<Equilibrium> {
    let grid = eq.grid.with_resolution(2 * eq.grid.nx - 1, 2 * eq.grid.ny - 1)?;
    let psi = interpolate(&eq.plasma_psi)?;
    resample(eq, grid, psi)
}

/// New equilibrium at half resolution ((n + 1) / 2 points per axis),
/// plasma flux restricted by full weighting.
pub fn coarsen(eq: &Equilibrium) -> GsResult<Equilibrium> {
    let grid = eq.grid.with_resolution((eq.grid.nx + 1) / 2, (eq.grid.ny + 1) / 2)?;
    let psi = restrict(&eq.plasma_psi)?;
    resample(eq, grid, psi)
}
