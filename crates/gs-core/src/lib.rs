//! Grad-Shafranov equilibrium core: flux state, boundary conditions,
//! coil coupling and the Picard driver.

pub mod boundary;
pub mod constraint;
pub mod equilibrium;
pub mod machine;
pub mod picard;
pub mod profile;

pub use equilibrium::{coarsen, refine, Equilibrium};
pub use picard::{PicardReport, PicardStatus};
