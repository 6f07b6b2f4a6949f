//! Bicubic interpolation of flux fields.
//!
//! Tensor product of natural cubic splines on a uniform rectangular grid.
//! Each node stores f, ∂²f/∂x², ∂²f/∂y² and ∂⁴f/∂x²∂y²; evaluation in a
//! cell combines the four corner nodes with the standard cubic-spline
//! basis (A, B, C, D) along each axis. Points outside the grid are
//! extrapolated from the nearest edge cell.
//!
//! The first coordinate is the major radius R and must be strictly
//! positive.

use gs_types::error::{ensure_shape, GsError, GsResult};
use gs_types::state::Grid2D;
use ndarray::Array2;

use crate::tridiag::thomas_solve;

/// Uniform axis description.
#[derive(Debug, Clone, Copy)]
struct Axis {
    start: f64,
    step: f64,
    n: usize,
}

impl Axis {
    fn new(coords: &[f64], name: &str) -> GsResult<Self> {
        let n = coords.len();
        if n < 2 {
            return Err(GsError::ConfigError(format!(
                "spline {name} axis needs at least 2 points, got {n}"
            )));
        }
        let step = (coords[n - 1] - coords[0]) / (n - 1) as f64;
        if !(step.is_finite() && step > 0.0) {
            return Err(GsError::ConfigError(format!(
                "spline {name} axis must be finite and strictly increasing"
            )));
        }
        Ok(Axis {
            start: coords[0],
            step,
            n,
        })
    }

    /// Cell index and basis weights (for values, then second derivatives)
    /// of order `deriv` at `t`.
    fn basis(&self, t: f64, deriv: u8) -> (usize, [f64; 4]) {
        let h = self.step;
        let cell = ((t - self.start) / h).floor();
        let i = cell.clamp(0.0, (self.n - 2) as f64) as usize;
        let x_hi = self.start + (i + 1) as f64 * h;

        let a = (x_hi - t) / h;
        let b = 1.0 - a;
        let w = match deriv {
            0 => [
                a,
                b,
                (a * a * a - a) * h * h / 6.0,
                (b * b * b - b) * h * h / 6.0,
            ],
            _ => [
                -1.0 / h,
                1.0 / h,
                -(3.0 * a * a - 1.0) * h / 6.0,
                (3.0 * b * b - 1.0) * h / 6.0,
            ],
        };
        (i, w)
    }
}

/// Second derivatives of the natural cubic spline through `values`
/// (uniform spacing `h`, zero curvature at both ends).
fn natural_second_derivatives(values: &[f64], h: f64) -> GsResult<Vec<f64>> {
    let n = values.len();
    let mut m = vec![0.0; n];
    if n < 3 {
        return Ok(m);
    }
    let k = n - 2;
    let sub: Vec<f64> = (0..k).map(|i| if i > 0 { 1.0 } else { 0.0 }).collect();
    let diag = vec![4.0; k];
    let sup: Vec<f64> = (0..k).map(|i| if i + 1 < k { 1.0 } else { 0.0 }).collect();
    let scale = 6.0 / (h * h);
    let rhs: Vec<f64> = (1..n - 1)
        .map(|i| scale * (values[i + 1] - 2.0 * values[i] + values[i - 1]))
        .collect();

    let interior = thomas_solve(&sub, &diag, &sup, &rhs)?;
    m[1..n - 1].copy_from_slice(&interior);
    Ok(m)
}

/// Bicubic spline interpolant of a field on a uniform (R, Z) grid.
#[derive(Debug, Clone)]
pub struct BicubicSpline {
    x: Axis,
    y: Axis,
    f: Array2<f64>,
    fxx: Array2<f64>,
    fyy: Array2<f64>,
    fxxyy: Array2<f64>,
}

impl BicubicSpline {
    /// Fit to `f[[i, j]] = f(x[i], y[j])`.
    pub fn new(x: &[f64], y: &[f64], f: &Array2<f64>) -> GsResult<Self> {
        let xa = Axis::new(x, "R")?;
        let ya = Axis::new(y, "Z")?;
        ensure_shape("spline samples", (xa.n, ya.n), f.dim())?;

        let mut fxx = Array2::zeros(f.dim());
        for (j, col) in f.columns().into_iter().enumerate() {
            let m = natural_second_derivatives(&col.to_vec(), xa.step)?;
            for (i, v) in m.into_iter().enumerate() {
                fxx[[i, j]] = v;
            }
        }

        let mut fyy = Array2::zeros(f.dim());
        let mut fxxyy = Array2::zeros(f.dim());
        for i in 0..xa.n {
            let m = natural_second_derivatives(&f.row(i).to_vec(), ya.step)?;
            fyy.row_mut(i).assign(&ndarray::Array1::from(m));
            let m = natural_second_derivatives(&fxx.row(i).to_vec(), ya.step)?;
            fxxyy.row_mut(i).assign(&ndarray::Array1::from(m));
        }

        Ok(BicubicSpline {
            x: xa,
            y: ya,
            f: f.to_owned(),
            fxx,
            fyy,
            fxxyy,
        })
    }

    /// Fit a field sampled on `grid`.
    pub fn from_grid(grid: &Grid2D, f: &Array2<f64>) -> GsResult<Self> {
        let r = grid.r.to_vec();
        let z = grid.z.to_vec();
        Self::new(&r, &z, f)
    }

    fn evaluate(&self, r: f64, z: f64, dr: u8, dz: u8) -> GsResult<f64> {
        if !(r.is_finite() && z.is_finite()) {
            return Err(GsError::DomainError {
                r,
                z,
                message: "non-finite coordinate".to_string(),
            });
        }
        if r <= 0.0 {
            return Err(GsError::DomainError {
                r,
                z,
                message: "major radius must be positive".to_string(),
            });
        }

        let (i, wx) = self.x.basis(r, dr);
        let (j, wy) = self.y.basis(z, dz);

        let mut sum = 0.0;
        for (p, &u) in wx.iter().enumerate() {
            let ix = i + p % 2;
            for (q, &v) in wy.iter().enumerate() {
                let iy = j + q % 2;
                let node = match (p >= 2, q >= 2) {
                    (false, false) => self.f[[ix, iy]],
                    (true, false) => self.fxx[[ix, iy]],
                    (false, true) => self.fyy[[ix, iy]],
                    (true, true) => self.fxxyy[[ix, iy]],
                };
                sum += u * v * node;
            }
        }
        Ok(sum)
    }

    /// Interpolated value at (R, Z).
    pub fn eval(&self, r: f64, z: f64) -> GsResult<f64> {
        self.evaluate(r, z, 0, 0)
    }

    /// ∂f/∂R at (R, Z).
    pub fn eval_dr(&self, r: f64, z: f64) -> GsResult<f64> {
        self.evaluate(r, z, 1, 0)
    }

    /// ∂f/∂Z at (R, Z).
    pub fn eval_dz(&self, r: f64, z: f64) -> GsResult<f64> {
        self.evaluate(r, z, 0, 1)
    }

    /// ∂²f/∂R∂Z at (R, Z).
    pub fn eval_drdz(&self, r: f64, z: f64) -> GsResult<f64> {
        self.evaluate(r, z, 1, 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn axis(n: usize, lo: f64, hi: f64) -> Vec<f64> {
        (0..n)
            .map(|i| lo + (hi - lo) * i as f64 / (n - 1) as f64)
            .collect()
    }

    fn sample(x: &[f64], y: &[f64], f: impl Fn(f64, f64) -> f64) -> Array2<f64> {
        Array2::from_shape_fn((x.len(), y.len()), |(i, j)| f(x[i], y[j]))
    }

    #[test]
    fn test_reproduces_nodes() {
        let x = axis(9, 0.5, 1.5);
        let y = axis(17, -1.0, 1.0);
        let f = sample(&x, &y, |r, z| (3.0 * r).sin() * z.exp());
        let s = BicubicSpline::new(&x, &y, &f).unwrap();
        for i in 0..x.len() {
            for j in 0..y.len() {
                let v = s.eval(x[i], y[j]).unwrap();
                assert!((v - f[[i, j]]).abs() < 1e-12, "node ({i},{j}): {v}");
            }
        }
    }

    #[test]
    fn test_bilinear_exact_with_derivatives() {
        let x = axis(5, 1.0, 2.0);
        let y = axis(9, -0.5, 0.5);
        let f = sample(&x, &y, |r, z| 1.0 + 2.0 * r - 3.0 * z + 0.5 * r * z);
        let s = BicubicSpline::new(&x, &y, &f).unwrap();
        for &(r, z) in &[(1.13, 0.21), (1.77, -0.44), (1.5, 0.0), (2.3, 0.7)] {
            let v = s.eval(r, z).unwrap();
            assert!((v - (1.0 + 2.0 * r - 3.0 * z + 0.5 * r * z)).abs() < 1e-12);
            assert!((s.eval_dr(r, z).unwrap() - (2.0 + 0.5 * z)).abs() < 1e-12);
            assert!((s.eval_dz(r, z).unwrap() - (-3.0 + 0.5 * r)).abs() < 1e-12);
            assert!((s.eval_drdz(r, z).unwrap() - 0.5).abs() < 1e-12);
        }
    }

    #[test]
    fn test_smooth_field_accuracy() {
        let x = axis(33, 0.5, 1.5);
        let y = axis(33, -0.5, 0.5);
        let f = sample(&x, &y, |r, z| (2.0 * r).sin() * (3.0 * z).cos());
        let s = BicubicSpline::new(&x, &y, &f).unwrap();

        let (r, z) = (1.0123, 0.0789);
        let v = s.eval(r, z).unwrap();
        let dr = s.eval_dr(r, z).unwrap();
        let dz = s.eval_dz(r, z).unwrap();
        assert!((v - (2.0 * r).sin() * (3.0 * z).cos()).abs() < 1e-5, "value {v}");
        assert!((dr - 2.0 * (2.0 * r).cos() * (3.0 * z).cos()).abs() < 1e-3, "dR {dr}");
        assert!((dz + 3.0 * (2.0 * r).sin() * (3.0 * z).sin()).abs() < 1e-3, "dZ {dz}");
    }

    #[test]
    fn test_domain_errors() {
        let x = axis(5, 0.5, 1.5);
        let y = axis(5, -0.5, 0.5);
        let s = BicubicSpline::new(&x, &y, &Array2::zeros((5, 5))).unwrap();
        assert!(matches!(s.eval(0.0, 0.0), Err(GsError::DomainError { .. })));
        assert!(matches!(s.eval(-1.0, 0.0), Err(GsError::DomainError { .. })));
        assert!(matches!(s.eval_dr(1.0, f64::NAN), Err(GsError::DomainError { .. })));
    }

    #[test]
    fn test_shape_checked() {
        let x = axis(5, 0.5, 1.5);
        let y = axis(9, -0.5, 0.5);
        let r = BicubicSpline::new(&x, &y, &Array2::zeros((9, 5)));
        assert!(matches!(r, Err(GsError::ShapeMismatch { .. })));
    }
}
