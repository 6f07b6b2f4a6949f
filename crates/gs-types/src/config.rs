// ─────────────────────────────────────────────────────────────────────
// SCPN Grad-Shafranov Core — Config
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
use serde::{Deserialize, Serialize};

use crate::constants::{DEFAULT_JACOBI_OMEGA, DEFAULT_PICARD_RTOL};
use crate::error::{GsError, GsResult};
use crate::state::{is_pow2_plus_one, Grid2D};

/// Top-level equilibrium run configuration (JSON).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EquilibriumConfig {
    pub name: String,
    /// `[nx, ny]`, each 2^n + 1.
    pub grid_resolution: [usize; 2],
    pub dimensions: GridDimensions,
    #[serde(default)]
    pub boundary: BoundaryKind,
    #[serde(default)]
    pub solver: SolverConfig,
    pub picard: PicardConfig,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct GridDimensions {
    #[serde(rename = "R_min")]
    pub r_min: f64,
    #[serde(rename = "R_max")]
    pub r_max: f64,
    #[serde(rename = "Z_min")]
    pub z_min: f64,
    #[serde(rename = "Z_max")]
    pub z_max: f64,
}

/// Which boundary strategy an equilibrium is built with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BoundaryKind {
    /// ψ_plasma = 0 on the domain edge.
    Fixed,
    /// Edge ψ_plasma from the Green's-function integral of J_tor.
    #[default]
    Free,
    /// Edge ψ_plasma from von Hagenow's boundary-current method.
    FreeHagenow,
}

/// Linear (multigrid) solver parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SolverConfig {
    /// Resolution levels including the finest one.
    #[serde(default = "default_nlevels")]
    pub nlevels: usize,
    /// V-cycles per solve at the finest level.
    #[serde(default = "default_ncycle")]
    pub ncycle: usize,
    /// Jacobi sweeps per smoothing stage.
    #[serde(default = "default_niter")]
    pub niter: usize,
    /// Exact (banded LU) solve on the coarsest level instead of Jacobi sweeps.
    #[serde(default = "default_direct")]
    pub direct: bool,
    /// Jacobi damping factor.
    #[serde(default = "default_omega")]
    pub omega: f64,
    /// Log a warning when ‖b − Aψ‖∞ / ‖b‖∞ exceeds this after a solve.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub residual_warning: Option<f64>,
}

fn default_nlevels() -> usize {
    1
}
fn default_ncycle() -> usize {
    1
}
fn default_niter() -> usize {
    2
}
fn default_direct() -> bool {
    true
}
fn default_omega() -> f64 {
    DEFAULT_JACOBI_OMEGA
}

impl Default for SolverConfig {
    fn default() -> Self {
        SolverConfig {
            nlevels: default_nlevels(),
            ncycle: default_ncycle(),
            niter: default_niter(),
            direct: default_direct(),
            omega: default_omega(),
            residual_warning: None,
        }
    }
}

impl SolverConfig {
    pub fn vcycle(nlevels: usize, ncycle: usize, niter: usize, direct: bool) -> Self {
        SolverConfig {
            nlevels,
            ncycle,
            niter,
            direct,
            ..SolverConfig::default()
        }
    }

    /// Check the level count against a grid of `nx × ny` points.
    ///
    /// Every level must keep both dimensions of the form 2^n + 1.
    pub fn validate_for(&self, nx: usize, ny: usize) -> GsResult<()> {
        if self.nlevels == 0 {
            return Err(GsError::ConfigError(
                "multigrid needs at least one level".to_string(),
            ));
        }
        if self.ncycle == 0 {
            return Err(GsError::ConfigError(
                "multigrid needs at least one V-cycle".to_string(),
            ));
        }
        if !self.omega.is_finite() || self.omega <= 0.0 || self.omega > 1.0 {
            return Err(GsError::ConfigError(format!(
                "Jacobi damping must lie in (0, 1], got {}",
                self.omega
            )));
        }
        let (mut cx, mut cy) = (nx, ny);
        for level in 1..self.nlevels {
            if !is_pow2_plus_one(cx) || !is_pow2_plus_one(cy) || cx < 5 || cy < 5 {
                return Err(GsError::ConfigError(format!(
                    "cannot coarsen {cx} x {cy} grid to multigrid level {level} of {}",
                    self.nlevels
                )));
            }
            cx = (cx + 1) / 2;
            cy = (cy + 1) / 2;
        }
        Ok(())
    }
}

/// Nonlinear (Picard) iteration parameters.
///
/// `max_iterations` has no default: callers state how long they are
/// prepared to wait for convergence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PicardConfig {
    pub max_iterations: usize,
    /// Relative tolerance: max|Δψ| / (max ψ − min ψ).
    #[serde(default = "default_rtol")]
    pub rtol: f64,
    /// ψ_{n+1} ← (1 − blend) ψ_{n+1} + blend ψ_n
    #[serde(default)]
    pub blend: f64,
}

fn default_rtol() -> f64 {
    DEFAULT_PICARD_RTOL
}

impl PicardConfig {
    pub fn new(max_iterations: usize) -> Self {
        PicardConfig {
            max_iterations,
            rtol: DEFAULT_PICARD_RTOL,
            blend: 0.0,
        }
    }

    pub fn with_rtol(mut self, rtol: f64) -> Self {
        self.rtol = rtol;
        self
    }

    pub fn with_blend(mut self, blend: f64) -> Self {
        self.blend = blend;
        self
    }

    pub fn validate(&self) -> GsResult<()> {
        if self.max_iterations == 0 {
            return Err(GsError::ConfigError(
                "max_iterations must be at least 1".to_string(),
            ));
        }
        if !self.rtol.is_finite() || self.rtol <= 0.0 {
            return Err(GsError::ConfigError(format!(
                "rtol must be finite and > 0, got {}",
                self.rtol
            )));
        }
        if !(0.0..1.0).contains(&self.blend) {
            return Err(GsError::ConfigError(format!(
                "blend must lie in [0, 1), got {}",
                self.blend
            )));
        }
        Ok(())
    }
}

impl EquilibriumConfig {
    /// Load from a JSON file and validate.
    pub fn from_file(path: &str) -> GsResult<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> GsResult<()> {
        let [nx, ny] = self.grid_resolution;
        // Grid construction carries the size / extent checks.
        self.create_grid()?;
        if self.boundary == BoundaryKind::FreeHagenow && (nx < 5 || ny < 5) {
            return Err(GsError::ConfigError(format!(
                "free-hagenow boundary needs at least 5x5 points, got {nx}x{ny}"
            )));
        }
        self.solver.validate_for(nx, ny)?;
        self.picard.validate()
    }

    pub fn create_grid(&self) -> GsResult<Grid2D> {
        Grid2D::new(
            self.grid_resolution[0],
            self.grid_resolution[1],
            self.dimensions.r_min,
            self.dimensions.r_max,
            self.dimensions.z_min,
            self.dimensions.z_max,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    /// CARGO_MANIFEST_DIR is crates/gs-types/, the workspace root is two up.
    fn project_root() -> PathBuf {
        PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("..").join("..")
    }

    fn config_path(relative: &str) -> String {
        project_root().join(relative).to_string_lossy().to_string()
    }

    #[test]
    fn test_load_example_config() {
        let cfg = EquilibriumConfig::from_file(&config_path("configs/free_boundary_65.json"))
            .unwrap();
        assert_eq!(cfg.grid_resolution, [65, 65]);
        assert_eq!(cfg.boundary, BoundaryKind::Free);
        assert_eq!(cfg.picard.max_iterations, 200);
        assert!((cfg.dimensions.r_min - 0.1).abs() < 1e-12);
        assert_eq!(cfg.solver.nlevels, 4);
    }

    #[test]
    fn test_load_fixed_config() {
        let cfg = EquilibriumConfig::from_file(&config_path("configs/fixed_boundary_33.json"))
            .unwrap();
        assert_eq!(cfg.boundary, BoundaryKind::Fixed);
        // Solver section omitted: defaults apply
        assert_eq!(cfg.solver.nlevels, 1);
        assert!(cfg.solver.direct);
    }

    #[test]
    fn test_max_iterations_is_required() {
        let json = r#"{
            "name": "no-cap",
            "grid_resolution": [33, 33],
            "dimensions": {"R_min": 0.1, "R_max": 2.0, "Z_min": -1.0, "Z_max": 1.0},
            "picard": {"rtol": 1e-3}
        }"#;
        assert!(serde_json::from_str::<EquilibriumConfig>(json).is_err());
    }

    #[test]
    fn test_picard_defaults() {
        let picard: PicardConfig = serde_json::from_str(r#"{"max_iterations": 50}"#).unwrap();
        assert_eq!(picard.max_iterations, 50);
        assert!((picard.rtol - 1e-3).abs() < 1e-15);
        assert_eq!(picard.blend, 0.0);
        assert!(picard.validate().is_ok());
        assert!(PicardConfig::new(10).with_blend(1.0).validate().is_err());
        assert!(PicardConfig::new(0).validate().is_err());
    }

    #[test]
    fn test_solver_levels_validated_against_grid() {
        assert!(SolverConfig::vcycle(4, 2, 2, true).validate_for(65, 65).is_ok());
        // 9 → 5 → 3: a fourth level would need a 2-point grid
        assert!(SolverConfig::vcycle(3, 1, 2, true).validate_for(9, 9).is_ok());
        assert!(SolverConfig::vcycle(4, 1, 2, true).validate_for(9, 9).is_err());
        assert!(SolverConfig::vcycle(0, 1, 2, true).validate_for(9, 9).is_err());
    }

    #[test]
    fn test_roundtrip_serialization() {
        let cfg = EquilibriumConfig::from_file(&config_path("configs/free_boundary_65.json"))
            .unwrap();
        let json = serde_json::to_string_pretty(&cfg).unwrap();
        let cfg2: EquilibriumConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(cfg.name, cfg2.name);
        assert_eq!(cfg.grid_resolution, cfg2.grid_resolution);
        assert_eq!(cfg.boundary, cfg2.boundary);
        assert_eq!(cfg.solver.ncycle, cfg2.solver.ncycle);
    }

    #[test]
    fn test_invalid_grid_rejected_on_validate() {
        let mut cfg = EquilibriumConfig::from_file(&config_path("configs/free_boundary_65.json"))
            .unwrap();
        cfg.grid_resolution = [64, 64];
        assert!(matches!(cfg.validate(), Err(GsError::ConfigError(_))));
    }

    #[test]
    fn test_hagenow_needs_five_points() {
        let mut cfg = EquilibriumConfig::from_file(&config_path("configs/free_boundary_65.json"))
            .unwrap();
        cfg.solver = SolverConfig::default();
        cfg.boundary = BoundaryKind::FreeHagenow;
        cfg.grid_resolution = [3, 5];
        assert!(matches!(cfg.validate(), Err(GsError::ConfigError(_))));
        cfg.grid_resolution = [5, 5];
        assert!(cfg.validate().is_ok());
        cfg.boundary = BoundaryKind::Free;
        cfg.grid_resolution = [3, 3];
        assert!(cfg.validate().is_ok());
    }
}
