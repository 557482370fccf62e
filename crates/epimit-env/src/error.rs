use thiserror::Error;

use epimit_core::CoreError;

/// Errors raised by the simulation environment.
#[derive(Debug, Error)]
pub enum EnvError {
    #[error("action {value} outside the valid range 0..=11")]
    InvalidAction { value: i64 },

    #[error(transparent)]
    Core(#[from] CoreError),
}
