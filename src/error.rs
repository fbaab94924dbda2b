//! Error types for the forecasting pipeline

use thiserror::Error;

/// Errors raised by feature engineering, training and prediction.
///
/// Every variant is raised synchronously to the immediate caller. The
/// computations are deterministic, so nothing in the pipeline retries.
#[derive(Debug, Error)]
pub enum ForecastError {
    /// Feature columns at predict time differ from the ones seen during training
    #[error("Schema mismatch: expected columns {expected:?}, got {actual:?}")]
    SchemaMismatch {
        expected: Vec<String>,
        actual: Vec<String>,
    },

    /// Not enough rows for the requested split, window or training run
    #[error("Insufficient data: {required} rows required, {available} available")]
    InsufficientData { required: usize, available: usize },

    #[error("Model not fit: call train before evaluate, predict or save")]
    NotTrained,

    #[error("Row count mismatch: {features} feature rows, {targets} targets")]
    RowCountMismatch { features: usize, targets: usize },

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Invalid series: {0}")]
    InvalidSeries(String),

    /// Failure reported by the regression backend
    #[error("Estimator error: {0}")]
    Estimator(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Artifact error: {0}")]
    Artifact(#[from] bincode::Error),
}

/// Result type used across the pipeline
pub type Result<T> = std::result::Result<T, ForecastError>;
