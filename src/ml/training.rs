//! Forecast model lifecycle
//!
//! `ForecastModel` owns one regressor and moves from untrained to trained.
//! Splits are chronological: the test partition is always the most recent
//! suffix of the table, never a shuffled sample.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Instant;
use tracing::{debug, info};
use uuid::Uuid;

use super::artifact::{save_artifact, ModelArtifact};
use super::{FittedRegressor, ModelMetadata, Regressor};
use crate::error::{ForecastError, Result};
use crate::forecast::{FeatureMatrix, FeatureTable, Fold, ForecastMetrics, TimeSeriesCrossValidation};

pub const DEFAULT_TEST_FRACTION: f64 = 0.2;

/// Chronological train/test partition of a feature table
#[derive(Debug, Clone, PartialEq)]
pub struct TrainTestSplit {
    pub x_train: FeatureMatrix,
    pub x_test: FeatureMatrix,
    pub y_train: Vec<f64>,
    pub y_test: Vec<f64>,
    pub train_timestamps: Vec<DateTime<Utc>>,
    pub test_timestamps: Vec<DateTime<Utc>>,
    pub target: String,
}

impl TrainTestSplit {
    /// `(x_train, x_test, y_train, y_test)`
    pub fn into_parts(self) -> (FeatureMatrix, FeatureMatrix, Vec<f64>, Vec<f64>) {
        (self.x_train, self.x_test, self.y_train, self.y_test)
    }
}

/// Split `table` at `floor(len * (1 - test_fraction))`.
///
/// Rows before the cutoff train, rows from it on test. Both partitions must
/// be non-empty.
pub fn train_test_split(table: &FeatureTable, test_fraction: f64) -> Result<TrainTestSplit> {
    if !(test_fraction > 0.0 && test_fraction < 1.0) {
        return Err(ForecastError::InvalidParameter(format!(
            "test_fraction must be in (0, 1), got {}",
            test_fraction
        )));
    }
    if 1.0 - test_fraction >= 1.0 {
        return Err(ForecastError::InvalidParameter(format!(
            "test_fraction {} is too small to hold out any row",
            test_fraction
        )));
    }

    let n = table.len();
    let split = split_index(n, test_fraction);
    if split == 0 || split >= n {
        return Err(ForecastError::InsufficientData {
            required: min_split_rows(test_fraction),
            available: n,
        });
    }

    let (train, test) = table.split_at(split);
    debug!(
        train_rows = train.len(),
        test_rows = test.len(),
        test_fraction,
        "chronological split"
    );

    Ok(TrainTestSplit {
        x_train: train.features(),
        x_test: test.features(),
        y_train: train.targets(),
        y_test: test.targets(),
        train_timestamps: train.timestamps().to_vec(),
        test_timestamps: test.timestamps().to_vec(),
        target: table.target_name().to_string(),
    })
}

fn split_index(n: usize, test_fraction: f64) -> usize {
    (n as f64 * (1.0 - test_fraction)).floor() as usize
}

/// Fewest rows that leave both partitions non-empty at `test_fraction`
fn min_split_rows(test_fraction: f64) -> usize {
    let start = ((1.0 / (1.0 - test_fraction)).ceil() as usize).max(2);
    (start..=start.saturating_mul(2))
        .find(|&n| {
            let split = split_index(n, test_fraction);
            split > 0 && split < n
        })
        .unwrap_or(start)
}

/// Predictions on a held-out partition together with their accuracy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationReport {
    pub actual: Vec<f64>,
    pub predicted: Vec<f64>,
    pub metrics: ForecastMetrics,
}

/// Accuracy of one cross-validation fold
#[derive(Debug, Clone, PartialEq)]
pub struct FoldReport {
    pub fold: Fold,
    pub metrics: ForecastMetrics,
}

struct Trained<F> {
    fitted: F,
    metadata: ModelMetadata,
}

/// Read-only prediction capability, shared by the serving layer
pub trait DemandPredictor: Send + Sync {
    fn metadata(&self) -> Option<&ModelMetadata>;

    fn predict(&self, x: &FeatureMatrix) -> Result<Vec<f64>>;
}

/// Regression model over engineered demand features
pub struct ForecastModel<R: Regressor> {
    regressor: R,
    state: Option<Trained<R::Fitted>>,
}

impl<R: Regressor> ForecastModel<R> {
    pub fn new(regressor: R) -> Self {
        Self {
            regressor,
            state: None,
        }
    }

    pub fn is_trained(&self) -> bool {
        self.state.is_some()
    }

    pub fn metadata(&self) -> Option<&ModelMetadata> {
        self.state.as_ref().map(|trained| &trained.metadata)
    }

    /// Feature columns seen at training time
    pub fn feature_names(&self) -> Option<&[String]> {
        self.metadata().map(|m| m.feature_names.as_slice())
    }

    pub fn train_test_split(
        &self,
        table: &FeatureTable,
        test_fraction: f64,
    ) -> Result<TrainTestSplit> {
        train_test_split(table, test_fraction)
    }

    /// Fit a fresh estimator, replacing any previous fit
    pub fn train(&mut self, x_train: &FeatureMatrix, y_train: &[f64]) -> Result<&ModelMetadata> {
        self.fit_and_store(x_train, y_train, None)
    }

    /// Train on the train partition of `split`, recording the target name
    pub fn train_split(&mut self, split: &TrainTestSplit) -> Result<&ModelMetadata> {
        self.fit_and_store(&split.x_train, &split.y_train, Some(split.target.clone()))
    }

    fn fit_and_store(
        &mut self,
        x_train: &FeatureMatrix,
        y_train: &[f64],
        target: Option<String>,
    ) -> Result<&ModelMetadata> {
        if x_train.n_rows() != y_train.len() {
            return Err(ForecastError::RowCountMismatch {
                features: x_train.n_rows(),
                targets: y_train.len(),
            });
        }
        if x_train.is_empty() {
            return Err(ForecastError::InsufficientData {
                required: 1,
                available: 0,
            });
        }

        let started = Instant::now();
        let fitted = self.regressor.fit(x_train, y_train)?;
        let in_sample = fitted.predict(x_train)?;
        let training_metrics = ForecastMetrics::calculate(y_train, &in_sample)?;

        let model_type = self.regressor.model_type();
        let metadata = ModelMetadata {
            model_id: format!("{}_{}", model_type, Uuid::new_v4()),
            model_type,
            version: env!("CARGO_PKG_VERSION").to_string(),
            trained_at: Utc::now(),
            training_samples: x_train.n_rows(),
            feature_names: x_train.columns().to_vec(),
            target,
            training_metrics,
        };

        info!(
            model_id = %metadata.model_id,
            samples = metadata.training_samples,
            features = metadata.feature_names.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            training = %metadata.training_metrics,
            "model trained"
        );

        let trained = self.state.insert(Trained { fitted, metadata });
        Ok(&trained.metadata)
    }

    /// Predict one demand value per row of `x`
    pub fn predict(&self, x: &FeatureMatrix) -> Result<Vec<f64>> {
        let (fitted, metadata) = self.trained()?;
        check_schema(&metadata.feature_names, x)?;
        fitted.predict(x)
    }

    /// Score predictions for `x_test` against `y_test`
    pub fn evaluate(&self, x_test: &FeatureMatrix, y_test: &[f64]) -> Result<EvaluationReport> {
        let predicted = self.predict(x_test)?;
        if predicted.len() != y_test.len() {
            return Err(ForecastError::RowCountMismatch {
                features: predicted.len(),
                targets: y_test.len(),
            });
        }
        let metrics = ForecastMetrics::calculate(y_test, &predicted)?;
        info!(test = %metrics, "model evaluated");

        Ok(EvaluationReport {
            actual: y_test.to_vec(),
            predicted,
            metrics,
        })
    }

    /// Expanding-window cross-validation with fresh estimators.
    ///
    /// The model's own fit is left untouched.
    pub fn cross_validate(
        &self,
        table: &FeatureTable,
        n_folds: usize,
        min_train_size: usize,
    ) -> Result<Vec<FoldReport>> {
        let cv = TimeSeriesCrossValidation::new(n_folds, min_train_size)?;
        let mut reports = Vec::with_capacity(n_folds);

        for fold in cv.split(table.len())? {
            let train = table.slice(fold.train.clone());
            let test = table.slice(fold.test.clone());
            let fitted = self.regressor.fit(&train.features(), &train.targets())?;
            let predicted = fitted.predict(&test.features())?;
            let metrics = ForecastMetrics::calculate(&test.targets(), &predicted)?;
            debug!(train_rows = train.len(), test_rows = test.len(), %metrics, "fold scored");
            reports.push(FoldReport { fold, metrics });
        }

        Ok(reports)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let (fitted, metadata) = self.trained()?;
        save_artifact(path, metadata, fitted)
    }

    /// Restore a trained model saved by `save`
    pub fn load(regressor: R, path: &Path) -> Result<Self> {
        let artifact = ModelArtifact::<R::Fitted>::load(path)?;
        Self::from_artifact(regressor, artifact)
    }

    pub fn from_artifact(regressor: R, artifact: ModelArtifact<R::Fitted>) -> Result<Self> {
        if artifact.metadata.model_type != regressor.model_type() {
            return Err(ForecastError::InvalidParameter(format!(
                "artifact holds a {} model, expected {}",
                artifact.metadata.model_type,
                regressor.model_type()
            )));
        }
        Ok(Self {
            regressor,
            state: Some(Trained {
                fitted: artifact.fitted,
                metadata: artifact.metadata,
            }),
        })
    }

    fn trained(&self) -> Result<(&R::Fitted, &ModelMetadata)> {
        self.state
            .as_ref()
            .map(|trained| (&trained.fitted, &trained.metadata))
            .ok_or(ForecastError::NotTrained)
    }
}

impl<R: Regressor> DemandPredictor for ForecastModel<R> {
    fn metadata(&self) -> Option<&ModelMetadata> {
        ForecastModel::metadata(self)
    }

    fn predict(&self, x: &FeatureMatrix) -> Result<Vec<f64>> {
        ForecastModel::predict(self, x)
    }
}

fn check_schema(expected: &[String], x: &FeatureMatrix) -> Result<()> {
    if expected != x.columns() {
        return Err(ForecastError::SchemaMismatch {
            expected: expected.to_vec(),
            actual: x.columns().to_vec(),
        });
    }
    Ok(())
}
