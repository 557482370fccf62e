use thiserror::Error;

/// Errors raised while constructing or querying the shared data model.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("dataset contains no rows")]
    EmptyDataset,

    #[error("dataset dates are not strictly increasing at row {row}")]
    NonMonotonicDates { row: usize },

    #[error("negative count {value} for {column} at row {row}")]
    NegativeCount {
        row: usize,
        column: &'static str,
        value: f64,
    },

    #[error("epoch index {index} out of range (0..{max})")]
    EpochOutOfRange { index: usize, max: usize },
}
