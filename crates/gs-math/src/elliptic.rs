// ─────────────────────────────────────────────────────────────────────
// SCPN Grad-Shafranov Core — Elliptic Integrals
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Complete elliptic integrals K(m) and E(m) for filament Green's functions.
//!
//! The parameter is m = k², with k² = 4 R R_c / ((R + R_c)² + (Z − Z_c)²)
//! for a coil at (R_c, Z_c) seen from (R, Z). Both integrals come from the
//! arithmetic-geometric mean, which converges quadratically and stays
//! close to machine precision on [`M_MIN`, `M_MAX`].
//!
//! k² reaches 1 on the filament itself, where K diverges, and 0 on the
//! axis, where the flux expression divides by k. Callers evaluating the
//! Green's functions clamp k² to [`M_MIN`, `M_MAX`] first.

use std::f64::consts::FRAC_PI_2;

/// Smallest k² passed to the Green's function kernels.
pub const M_MIN: f64 = 1e-10;
/// Largest k² passed to the Green's function kernels.
pub const M_MAX: f64 = 1.0 - 1e-10;

const AGM_MAX_ITER: usize = 64;

/// AGM(1, √(1 − m)) together with Σ 2ⁿ⁻¹ cₙ² over the iteration.
fn agm(m: f64) -> (f64, f64) {
    let mut a = 1.0;
    let mut b = (1.0 - m).sqrt();
    let mut sum = 0.5 * m;
    let mut weight = 0.5;
    for _ in 0..AGM_MAX_ITER {
        let c = 0.5 * (a - b);
        if c.abs() <= f64::EPSILON * a {
            break;
        }
        weight *= 2.0;
        sum += weight * c * c;
        let next = 0.5 * (a + b);
        b = (a * b).sqrt();
        a = next;
    }
    (a, sum)
}

/// Complete elliptic integral of the first kind, K(m) = π / (2 AGM(1, √(1 − m))).
///
/// Same parameter convention as `scipy.special.ellipk`. Diverges as m → 1.
pub fn ellipk(m: f64) -> f64 {
    debug_assert!(
        (0.0..1.0).contains(&m),
        "ellipk requires 0 <= m < 1, got {m}"
    );
    let (a, _) = agm(m);
    FRAC_PI_2 / a
}

/// Complete elliptic integral of the second kind, E(m) = K(m) (1 − Σ 2ⁿ⁻¹ cₙ²).
///
/// Same parameter convention as `scipy.special.ellipe`.
pub fn ellipe(m: f64) -> f64 {
    debug_assert!(
        (0.0..=1.0).contains(&m),
        "ellipe requires 0 <= m <= 1, got {m}"
    );
    if m >= 1.0 {
        return 1.0;
    }
    let (a, sum) = agm(m);
    FRAC_PI_2 / a * (1.0 - sum)
}
