//! Forecast accuracy metrics and chronological cross-validation folds

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Range;

use crate::error::{ForecastError, Result};

/// Accuracy of a set of predictions against observed demand
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastMetrics {
    /// Mean Absolute Error
    pub mae: f64,
    /// Root Mean Square Error
    pub rmse: f64,
    /// R² (coefficient of determination)
    pub r2: f64,
    /// Mean Absolute Percentage Error (%), zero actuals skipped
    pub mape: f64,
    pub max_error: f64,
    pub min_error: f64,
    /// Standard deviation of the signed errors
    pub error_std: f64,
    pub sample_count: usize,
}

impl ForecastMetrics {
    /// Compare `predicted` against `actual`
    pub fn calculate(actual: &[f64], predicted: &[f64]) -> Result<Self> {
        if actual.len() != predicted.len() {
            return Err(ForecastError::RowCountMismatch {
                features: predicted.len(),
                targets: actual.len(),
            });
        }
        if actual.is_empty() {
            return Err(ForecastError::InsufficientData {
                required: 1,
                available: 0,
            });
        }

        let n = actual.len() as f64;
        let errors: Vec<f64> = actual
            .iter()
            .zip(predicted)
            .map(|(a, p)| a - p)
            .collect();

        let mae = errors.iter().map(|e| e.abs()).sum::<f64>() / n;

        let ss_res: f64 = errors.iter().map(|e| e * e).sum();
        let rmse = (ss_res / n).sqrt();

        let mean_actual = actual.iter().sum::<f64>() / n;
        let ss_tot: f64 = actual.iter().map(|a| (a - mean_actual).powi(2)).sum();
        // Constant actuals: a perfect fit scores 1, anything else 0
        let r2 = if ss_tot > 0.0 {
            1.0 - ss_res / ss_tot
        } else if ss_res == 0.0 {
            1.0
        } else {
            0.0
        };

        let percentage: Vec<f64> = actual
            .iter()
            .zip(&errors)
            .filter(|(a, _)| a.abs() > 1e-6)
            .map(|(a, e)| (e / a).abs() * 100.0)
            .collect();
        let mape = if percentage.is_empty() {
            0.0
        } else {
            percentage.iter().sum::<f64>() / percentage.len() as f64
        };

        let max_error = errors.iter().map(|e| e.abs()).fold(0.0f64, f64::max);
        let min_error = errors.iter().map(|e| e.abs()).fold(f64::INFINITY, f64::min);

        let mean_error = errors.iter().sum::<f64>() / n;
        let error_std =
            (errors.iter().map(|e| (e - mean_error).powi(2)).sum::<f64>() / n).sqrt();

        Ok(Self {
            mae,
            rmse,
            r2,
            mape,
            max_error,
            min_error,
            error_std,
            sample_count: actual.len(),
        })
    }

    /// Qualitative rating from MAPE
    pub fn quality(&self) -> ForecastQuality {
        match self.mape {
            m if m < 5.0 => ForecastQuality::Excellent,
            m if m < 10.0 => ForecastQuality::Good,
            m if m < 20.0 => ForecastQuality::Fair,
            m if m < 50.0 => ForecastQuality::Poor,
            _ => ForecastQuality::VeryPoor,
        }
    }
}

impl fmt::Display for ForecastMetrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "MAE={:.2}, RMSE={:.2}, R²={:.3}, MAPE={:.2}% ({:?}, n={})",
            self.mae,
            self.rmse,
            self.r2,
            self.mape,
            self.quality(),
            self.sample_count
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ForecastQuality {
    Excellent, // MAPE < 5%
    Good,      // MAPE 5-10%
    Fair,      // MAPE 10-20%
    Poor,      // MAPE 20-50%
    VeryPoor,  // MAPE > 50%
}

/// One expanding-window fold: train on a prefix, test on the block after it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fold {
    pub train: Range<usize>,
    pub test: Range<usize>,
}

/// Expanding-window cross-validation for time series
#[derive(Debug, Clone, Copy)]
pub struct TimeSeriesCrossValidation {
    n_folds: usize,
    min_train_size: usize,
}

impl TimeSeriesCrossValidation {
    pub fn new(n_folds: usize, min_train_size: usize) -> Result<Self> {
        if n_folds == 0 {
            return Err(ForecastError::InvalidParameter(
                "cross-validation needs at least one fold".to_string(),
            ));
        }
        if min_train_size == 0 {
            return Err(ForecastError::InvalidParameter(
                "minimum training size must be positive".to_string(),
            ));
        }
        Ok(Self {
            n_folds,
            min_train_size,
        })
    }

    /// Folds over `data_len` rows. Test blocks are equal-sized; the last one
    /// absorbs the remainder.
    pub fn split(&self, data_len: usize) -> Result<Vec<Fold>> {
        if data_len < self.min_train_size + self.n_folds {
            return Err(ForecastError::InsufficientData {
                required: self.min_train_size + self.n_folds,
                available: data_len,
            });
        }

        let test_size = (data_len - self.min_train_size) / self.n_folds;
        let folds = (0..self.n_folds)
            .map(|fold| {
                let train_end = self.min_train_size + fold * test_size;
                let test_end = if fold + 1 == self.n_folds {
                    data_len
                } else {
                    train_end + test_size
                };
                Fold {
                    train: 0..train_end,
                    test: train_end..test_end,
                }
            })
            .collect();

        Ok(folds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_perfect_forecast() {
        let actual = vec![1.0, 2.0, 3.0, 4.0, 5.0];
        let metrics = ForecastMetrics::calculate(&actual, &actual).unwrap();

        assert_eq!(metrics.mae, 0.0);
        assert_eq!(metrics.rmse, 0.0);
        assert_eq!(metrics.r2, 1.0);
        assert_eq!(metrics.mape, 0.0);
        assert_eq!(metrics.quality(), ForecastQuality::Excellent);
    }

    #[test]
    fn test_forecast_with_errors() {
        let actual = vec![100.0, 200.0, 300.0, 400.0, 500.0];
        let predicted = vec![110.0, 190.0, 310.0, 390.0, 510.0];

        let metrics = ForecastMetrics::calculate(&actual, &predicted).unwrap();

        assert_eq!(metrics.mae, 10.0);
        assert_eq!(metrics.rmse, 10.0);
        assert!((metrics.r2 - (1.0 - 500.0 / 100_000.0)).abs() < 1e-12);
        assert_eq!(metrics.max_error, 10.0);
        assert_eq!(metrics.min_error, 10.0);
        assert_eq!(metrics.sample_count, 5);
    }

    #[test]
    fn test_constant_actuals() {
        let actual = vec![3.0, 3.0, 3.0];
        assert_eq!(ForecastMetrics::calculate(&actual, &actual).unwrap().r2, 1.0);
        let off = vec![3.0, 3.0, 4.0];
        assert_eq!(ForecastMetrics::calculate(&actual, &off).unwrap().r2, 0.0);
    }

    #[test]
    fn test_dimension_mismatch() {
        let result = ForecastMetrics::calculate(&[1.0, 2.0, 3.0], &[1.0, 2.0]);
        assert!(matches!(result, Err(ForecastError::RowCountMismatch { .. })));
        assert!(ForecastMetrics::calculate(&[], &[]).is_err());
    }

    #[test]
    fn test_time_series_cross_validation() {
        let cv = TimeSeriesCrossValidation::new(3, 10).unwrap();
        let folds = cv.split(41).unwrap();

        assert_eq!(folds.len(), 3);
        assert_eq!(folds[0].train, 0..10);
        assert_eq!(folds[0].test, 10..20);
        assert_eq!(folds[2].test, 30..41);
        for fold in &folds {
            assert!(!fold.test.is_empty());
            assert_eq!(fold.train.end, fold.test.start);
        }
    }

    #[test]
    fn test_cross_validation_needs_data() {
        let cv = TimeSeriesCrossValidation::new(5, 10).unwrap();
        assert!(matches!(
            cv.split(12),
            Err(ForecastError::InsufficientData { .. })
        ));
        assert!(TimeSeriesCrossValidation::new(0, 10).is_err());
    }
}
