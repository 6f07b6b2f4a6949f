use thiserror::Error;

#[derive(Error, Debug)]
pub enum GsError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Domain error at (R={r}, Z={z}): {message}")]
    DomainError { r: f64, z: f64, message: String },

    #[error("Shape mismatch in {context}: expected {expected:?}, got {got:?}")]
    ShapeMismatch {
        context: String,
        expected: (usize, usize),
        got: (usize, usize),
    },

    #[error("Solver diverged at iteration {iteration}: {message}")]
    SolverDiverged { iteration: usize, message: String },

    #[error("Linear algebra error: {0}")]
    LinAlg(String),

    #[error("No plasma profiles attached to the equilibrium")]
    MissingProfiles,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type GsResult<T> = Result<T, GsError>;

/// Fail with [`GsError::ShapeMismatch`] unless `got == expected`.
pub fn ensure_shape(context: &str, expected: (usize, usize), got: (usize, usize)) -> GsResult<()> {
    if expected != got {
        return Err(GsError::ShapeMismatch {
            context: context.to_string(),
            expected,
            got,
        });
    }
    Ok(())
}
