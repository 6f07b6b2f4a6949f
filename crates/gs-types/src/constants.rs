// ─────────────────────────────────────────────────────────────────────
// SCPN Grad-Shafranov Core — Constants
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
/// Vacuum permeability (H/m), exact pre-2019 SI value 4π·10⁻⁷.
pub const MU0: f64 = 4.0e-7 * std::f64::consts::PI;

/// Default relative tolerance on the change in ψ between Picard iterations.
pub const DEFAULT_PICARD_RTOL: f64 = 1e-3;

/// Default damping factor for the multigrid Jacobi smoother.
pub const DEFAULT_JACOBI_OMEGA: f64 = 2.0 / 3.0;
