//! SmartCore regression backends
//!
//! `RandomForest` is the default estimator. Its parameters default to 100
//! trees with a fixed seed, so two fits on identical data give identical
//! predictions. `LinearRegression` is an ordinary least squares baseline.

use serde::{Deserialize, Serialize};
use smartcore::ensemble::random_forest_regressor::{
    RandomForestRegressor, RandomForestRegressorParameters,
};
use smartcore::linalg::basic::matrix::DenseMatrix;
use smartcore::linear::linear_regression::{
    LinearRegression as OlsRegressor, LinearRegressionParameters, LinearRegressionSolverName,
};

use super::{FittedRegressor, ModelType, Regressor};
use crate::config::ModelConfig;
use crate::error::{ForecastError, Result};
use crate::forecast::FeatureMatrix;

type ForestModel = RandomForestRegressor<f64, f64, DenseMatrix<f64>, Vec<f64>>;
type OlsModel = OlsRegressor<f64, f64, DenseMatrix<f64>, Vec<f64>>;

fn to_dense(x: &FeatureMatrix) -> Result<DenseMatrix<f64>> {
    if x.is_empty() || x.n_features() == 0 {
        return Err(ForecastError::InsufficientData {
            required: 1,
            available: x.n_rows().min(x.n_features()),
        });
    }
    Ok(DenseMatrix::new(x.n_rows(), x.n_features(), x.to_flat(), false))
}

fn check_width(expected: usize, x: &FeatureMatrix) -> Result<()> {
    if x.n_features() != expected {
        return Err(ForecastError::Estimator(format!(
            "estimator was fit on {} features, got {}",
            expected,
            x.n_features()
        )));
    }
    Ok(())
}

/// Random forest regressor settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RandomForest {
    pub n_trees: usize,
    pub max_depth: Option<u16>,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    /// Features tried per split; `None` uses the SmartCore default
    pub m: Option<usize>,
    pub seed: u64,
}

impl Default for RandomForest {
    fn default() -> Self {
        Self {
            n_trees: 100,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            m: None,
            seed: 42,
        }
    }
}

impl RandomForest {
    /// Settings for constrained hosts: fewer, shallower trees
    pub fn compact() -> Self {
        Self {
            n_trees: 50,
            max_depth: Some(10),
            min_samples_split: 5,
            min_samples_leaf: 2,
            m: None,
            seed: 42,
        }
    }

    pub fn from_config(config: &ModelConfig) -> Self {
        Self {
            n_trees: config.n_trees,
            max_depth: config.max_depth,
            min_samples_split: config.min_samples_split,
            min_samples_leaf: config.min_samples_leaf,
            m: None,
            seed: config.seed,
        }
    }

    pub fn parameters(&self) -> RandomForestRegressorParameters {
        RandomForestRegressorParameters {
            max_depth: self.max_depth,
            min_samples_leaf: self.min_samples_leaf,
            min_samples_split: self.min_samples_split,
            n_trees: self.n_trees,
            m: self.m,
            keep_samples: false, // Don't store training samples (saves memory)
            seed: self.seed,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct FittedRandomForest {
    model: ForestModel,
    n_features: usize,
}

impl Regressor for RandomForest {
    type Fitted = FittedRandomForest;

    fn model_type(&self) -> ModelType {
        ModelType::RandomForest
    }

    fn fit(&self, x: &FeatureMatrix, y: &[f64]) -> Result<Self::Fitted> {
        let dense = to_dense(x)?;
        let model = ForestModel::fit(&dense, &y.to_vec(), self.parameters())
            .map_err(|e| ForecastError::Estimator(format!("random forest training failed: {:?}", e)))?;
        Ok(FittedRandomForest {
            model,
            n_features: x.n_features(),
        })
    }
}

impl FittedRegressor for FittedRandomForest {
    fn predict(&self, x: &FeatureMatrix) -> Result<Vec<f64>> {
        check_width(self.n_features, x)?;
        let dense = to_dense(x)?;
        self.model
            .predict(&dense)
            .map_err(|e| ForecastError::Estimator(format!("random forest prediction failed: {:?}", e)))
    }
}

/// Ordinary least squares, solved by SVD so collinear calendar columns
/// do not break the fit
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinearRegression;

#[derive(Debug, Serialize, Deserialize)]
pub struct FittedLinearRegression {
    model: OlsModel,
    n_features: usize,
}

impl Regressor for LinearRegression {
    type Fitted = FittedLinearRegression;

    fn model_type(&self) -> ModelType {
        ModelType::LinearRegression
    }

    fn fit(&self, x: &FeatureMatrix, y: &[f64]) -> Result<Self::Fitted> {
        let dense = to_dense(x)?;
        let params =
            LinearRegressionParameters::default().with_solver(LinearRegressionSolverName::SVD);
        let model = OlsModel::fit(&dense, &y.to_vec(), params)
            .map_err(|e| ForecastError::Estimator(format!("linear regression failed: {:?}", e)))?;
        Ok(FittedLinearRegression {
            model,
            n_features: x.n_features(),
        })
    }
}

impl FittedRegressor for FittedLinearRegression {
    fn predict(&self, x: &FeatureMatrix) -> Result<Vec<f64>> {
        check_width(self.n_features, x)?;
        let dense = to_dense(x)?;
        self.model
            .predict(&dense)
            .map_err(|e| ForecastError::Estimator(format!("linear prediction failed: {:?}", e)))
    }
}
