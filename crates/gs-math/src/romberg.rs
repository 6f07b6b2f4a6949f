//! Romberg integration over equally spaced samples.
//!
//! Sample counts must be 2^k + 1; the result is the Richardson-extrapolated
//! trapezoid sequence, exact for polynomials of degree ≤ 2k + 1.

use gs_types::error::{GsError, GsResult};
use ndarray::Array2;

fn intervals_log2(nsamples: usize) -> GsResult<u32> {
    let intervals = nsamples.saturating_sub(1);
    if intervals == 0 || !intervals.is_power_of_two() {
        return Err(GsError::ConfigError(format!(
            "Romberg integration needs 2^k + 1 samples, got {nsamples}"
        )));
    }
    Ok(intervals.trailing_zeros())
}

/// Romberg integral of samples `y` spaced `dx` apart.
pub fn romb(y: &[f64], dx: f64) -> GsResult<f64> {
    let k = intervals_log2(y.len())? as usize;
    let intervals = y.len() - 1;

    let mut h = intervals as f64 * dx;
    // Previous row of the Romberg tableau
    let mut prev_row = vec![0.5 * (y[0] + y[intervals]) * h];

    let mut start = intervals;
    let mut step = intervals;
    for i in 1..=k {
        start >>= 1;
        let midpoints: f64 = y[start..intervals].iter().step_by(step).sum();
        let mut row = Vec::with_capacity(i + 1);
        row.push(0.5 * (prev_row[0] + h * midpoints));
        step >>= 1;
        for j in 1..=i {
            let prev = row[j - 1];
            let denom = ((1u64 << (2 * j)) - 1) as f64;
            row.push(prev + (prev - prev_row[j - 1]) / denom);
        }
        prev_row = row;
        h *= 0.5;
    }

    Ok(prev_row[k])
}

/// 2-D Romberg integral of a field sampled on an (R, Z) grid: integrate
/// along Z (axis 1) for every R, then along R, and scale by `dr · dz`.
pub fn romb2d(field: &Array2<f64>, dr: f64, dz: f64) -> GsResult<f64> {
    let (nx, ny) = field.dim();
    intervals_log2(nx)?;
    intervals_log2(ny)?;

    let along_z = field
        .outer_iter()
        .map(|row| romb(&row.to_vec(), 1.0))
        .collect::<GsResult<Vec<f64>>>()?;
    Ok(romb(&along_z, 1.0)? * dr * dz)
}
