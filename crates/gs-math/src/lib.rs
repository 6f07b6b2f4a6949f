//! Numerical building blocks for the Grad-Shafranov solver: the assembled
//! Δ* operator, multigrid linear solvers, bicubic splines, Romberg
//! integration and toroidal Green's functions.

pub mod elliptic;
pub mod greens;
pub mod linalg;
pub mod multigrid;
pub mod operator;
pub mod romberg;
pub mod sparse;
pub mod spline;
pub mod tridiag;
