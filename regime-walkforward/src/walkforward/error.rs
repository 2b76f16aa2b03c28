use polars::prelude::PolarsError;
use thiserror::Error;

use crate::data::{LoaderError, TableError};

#[derive(Error, Debug)]
pub enum WalkForwardError {
    /// Fatal problem detected before the loop starts.
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Loader error: {0}")]
    Loader(LoaderError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Polars error: {0}")]
    Polars(#[from] PolarsError),
}

/// A table without its target, return or date column, or without rows, can
/// never be evaluated. Those are configuration errors; the rest stay loader
/// errors.
impl From<LoaderError> for WalkForwardError {
    fn from(err: LoaderError) -> Self {
        match err {
            LoaderError::MissingColumn(column) => {
                WalkForwardError::Configuration(format!("Required column {} is absent", column))
            }
            LoaderError::Table(TableError::Empty) => {
                WalkForwardError::Configuration("Table is empty".to_string())
            }
            other => WalkForwardError::Loader(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_loader_errors_are_configuration() {
        let missing = WalkForwardError::from(LoaderError::MissingColumn("SPY_Target".into()));
        assert!(matches!(missing, WalkForwardError::Configuration(m) if m.contains("SPY_Target")));

        let empty = WalkForwardError::from(LoaderError::Table(TableError::Empty));
        assert!(matches!(empty, WalkForwardError::Configuration(_)));

        let other = WalkForwardError::from(LoaderError::InvalidData("bad".into()));
        assert!(matches!(other, WalkForwardError::Loader(_)));
    }
}
