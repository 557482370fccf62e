use thiserror::Error;

/// Errors raised while setting up or running a calibration.
#[derive(Debug, Error)]
pub enum CalibrationError {
    #[error("time grid is empty")]
    EmptyTimeGrid,

    #[error("shape mismatch: expected {expected} {what}, got {actual}")]
    ShapeMismatch {
        what: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("unknown model variant id {id} (valid: 1..=5)")]
    UnknownVariant { id: u8 },

    #[error("parameter '{name}' needs finite bounds for this solver")]
    InvalidBounds { name: String },

    #[error("adaptive step size underflowed at t = {t}")]
    StepUnderflow { t: f64 },

    #[error("solver failed: {0}")]
    Solver(String),
}
