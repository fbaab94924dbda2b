//! Machine Learning Module
//!
//! Regression capability and the forecasting model lifecycle:
//! - `Regressor` / `FittedRegressor` traits, the only seam between the
//!   pipeline and a concrete algorithm
//! - SmartCore backends (random forest, linear regression)
//! - `ForecastModel`: chronological split, train, evaluate, predict
//! - Artifact persistence for serving

use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::error::Result;
use crate::forecast::{FeatureMatrix, ForecastMetrics};

pub mod artifact;
pub mod smartcore;
pub mod training;

pub use self::smartcore::{LinearRegression, RandomForest};
pub use artifact::{load_predictor, read_metadata, ModelArtifact};
pub use training::{DemandPredictor, EvaluationReport, ForecastModel, TrainTestSplit};

/// ML Model Type
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ModelType {
    RandomForest,
    LinearRegression,
}

/// Regression algorithm that can be fit on a feature matrix
pub trait Regressor: Send + Sync {
    type Fitted: FittedRegressor;

    fn model_type(&self) -> ModelType;

    /// Fit on `x` (one row per observation) against `y`
    fn fit(&self, x: &FeatureMatrix, y: &[f64]) -> Result<Self::Fitted>;
}

/// Fitted estimator state, serializable so it can live in an artifact
pub trait FittedRegressor: Send + Sync + Serialize + DeserializeOwned {
    /// One prediction per row of `x`
    fn predict(&self, x: &FeatureMatrix) -> Result<Vec<f64>>;
}

/// Facts about a fitted model, stored alongside it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelMetadata {
    pub model_id: String,
    pub model_type: ModelType,
    pub version: String,
    pub trained_at: DateTime<Utc>,
    pub training_samples: usize,
    /// Feature columns in training order; predict input must match exactly
    pub feature_names: Vec<String>,
    pub target: Option<String>,
    /// In-sample accuracy on the training partition
    pub training_metrics: ForecastMetrics,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_model_type_names() {
        assert_eq!(ModelType::RandomForest.to_string(), "random_forest");
        assert_eq!(
            ModelType::from_str("linear_regression").unwrap(),
            ModelType::LinearRegression
        );
        assert_eq!(
            serde_json::to_string(&ModelType::RandomForest).unwrap(),
            "\"random_forest\""
        );
    }
}
