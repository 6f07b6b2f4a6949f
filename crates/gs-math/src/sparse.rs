//! Compressed-sparse-row matrix for the assembled elliptic operator.
//!
//! Rows are appended in order; products are parallel over rows.

use rayon::prelude::*;

/// Square CSR matrix.
#[derive(Debug, Clone)]
pub struct CsrMatrix {
    n: usize,
    indptr: Vec<usize>,
    indices: Vec<usize>,
    values: Vec<f64>,
}

impl CsrMatrix {
    /// Empty matrix expecting `n` rows, reserving `nnz_hint` entries.
    pub fn with_capacity(n: usize, nnz_hint: usize) -> Self {
        let mut indptr = Vec::with_capacity(n + 1);
        indptr.push(0);
        CsrMatrix {
            n,
            indptr,
            indices: Vec::with_capacity(nnz_hint),
            values: Vec::with_capacity(nnz_hint),
        }
    }

    /// Append the next row. Entries need not be sorted.
    pub fn push_row(&mut self, entries: &[(usize, f64)]) {
        debug_assert!(self.indptr.len() <= self.n, "too many rows pushed");
        for &(col, val) in entries {
            debug_assert!(col < self.n, "column {col} out of range");
            self.indices.push(col);
            self.values.push(val);
        }
        self.indptr.push(self.indices.len());
    }

    pub fn n(&self) -> usize {
        self.n
    }

    pub fn nnz(&self) -> usize {
        self.values.len()
    }

    /// Whether every row has been pushed.
    pub fn is_complete(&self) -> bool {
        self.indptr.len() == self.n + 1
    }

    /// Column indices and values of row `i`.
    #[inline]
    pub fn row(&self, i: usize) -> (&[usize], &[f64]) {
        let (start, end) = (self.indptr[i], self.indptr[i + 1]);
        (&self.indices[start..end], &self.values[start..end])
    }

    /// Diagonal entries (zero where absent).
    pub fn diagonal(&self) -> Vec<f64> {
        (0..self.n)
            .map(|i| {
                let (cols, vals) = self.row(i);
                cols.iter()
                    .zip(vals)
                    .filter(|&(&c, _)| c == i)
                    .map(|(_, &v)| v)
                    .sum()
            })
            .collect()
    }

    /// Rows whose only non-zero is the diagonal (Dirichlet rows).
    pub fn identity_rows(&self) -> Vec<bool> {
        (0..self.n)
            .map(|i| {
                let (cols, vals) = self.row(i);
                cols.iter().zip(vals).all(|(&c, &v)| c == i || v == 0.0)
            })
            .collect()
    }

    /// Half-bandwidth: max |i − j| over stored entries.
    pub fn bandwidth(&self) -> usize {
        (0..self.n)
            .map(|i| {
                let (cols, _) = self.row(i);
                cols.iter().map(|&c| c.abs_diff(i)).max().unwrap_or(0)
            })
            .max()
            .unwrap_or(0)
    }

    /// out = A · x
    pub fn matvec(&self, x: &[f64], out: &mut [f64]) {
        debug_assert_eq!(x.len(), self.n);
        debug_assert_eq!(out.len(), self.n);
        out.par_iter_mut().enumerate().for_each(|(i, o)| {
            let (cols, vals) = self.row(i);
            *o = cols.iter().zip(vals).map(|(&c, &v)| v * x[c]).sum();
        });
    }

    /// r = b − A · x
    pub fn residual(&self, x: &[f64], b: &[f64]) -> Vec<f64> {
        debug_assert_eq!(b.len(), self.n);
        let mut r = vec![0.0; self.n];
        self.matvec(x, &mut r);
        r.par_iter_mut().zip(b.par_iter()).for_each(|(ri, &bi)| *ri = bi - *ri);
        r
    }
}
