//! Feature tables and model input matrices
//!
//! A `FeatureTable` is the dense, timestamp-ordered output of feature
//! engineering (or a prepared CSV). A `FeatureMatrix` is the row-major view
//! handed to a regressor: named columns, no target.

use std::collections::HashSet;
use std::ops::Range;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{ForecastError, Result};

/// Named dense column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    pub values: Vec<f64>,
}

impl Column {
    pub fn new(name: impl Into<String>, values: Vec<f64>) -> Self {
        Self {
            name: name.into(),
            values,
        }
    }
}

/// Row-major feature matrix with named columns
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureMatrix {
    columns: Vec<String>,
    rows: Vec<Vec<f64>>,
}

impl FeatureMatrix {
    pub fn new(columns: Vec<String>, rows: Vec<Vec<f64>>) -> Result<Self> {
        if let Some((i, row)) = rows
            .iter()
            .enumerate()
            .find(|(_, row)| row.len() != columns.len())
        {
            return Err(ForecastError::InvalidParameter(format!(
                "row {} has {} values, expected {}",
                i,
                row.len(),
                columns.len()
            )));
        }
        Ok(Self { columns, rows })
    }

    /// One-row matrix, the shape used by the serving layer
    pub fn single_row(columns: Vec<String>, values: Vec<f64>) -> Result<Self> {
        Self::new(columns, vec![values])
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<f64>] {
        &self.rows
    }

    pub fn n_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn n_features(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Row-major flattened values
    pub fn to_flat(&self) -> Vec<f64> {
        let mut flat = Vec::with_capacity(self.n_rows() * self.n_features());
        for row in &self.rows {
            flat.extend_from_slice(row);
        }
        flat
    }

    /// Rows `range` as a new matrix with the same columns
    pub fn slice(&self, range: Range<usize>) -> Self {
        Self {
            columns: self.columns.clone(),
            rows: self.rows[range].to_vec(),
        }
    }
}

/// Dense, timestamp-ordered feature table with one target column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureTable {
    timestamps: Vec<DateTime<Utc>>,
    columns: Vec<Column>,
    target: String,
}

impl FeatureTable {
    pub fn new(
        timestamps: Vec<DateTime<Utc>>,
        columns: Vec<Column>,
        target: impl Into<String>,
    ) -> Result<Self> {
        let target = target.into();

        let mut seen = HashSet::new();
        for column in &columns {
            if !seen.insert(column.name.as_str()) {
                return Err(ForecastError::InvalidSeries(format!(
                    "duplicate column '{}'",
                    column.name
                )));
            }
            if column.values.len() != timestamps.len() {
                return Err(ForecastError::InvalidSeries(format!(
                    "column '{}' has {} values, expected {}",
                    column.name,
                    column.values.len(),
                    timestamps.len()
                )));
            }
        }
        if !seen.contains(target.as_str()) {
            return Err(ForecastError::InvalidSeries(format!(
                "target column '{}' not found",
                target
            )));
        }
        if timestamps.windows(2).any(|pair| pair[1] <= pair[0]) {
            return Err(ForecastError::InvalidSeries(
                "timestamps must be strictly increasing".to_string(),
            ));
        }

        Ok(Self {
            timestamps,
            columns,
            target,
        })
    }

    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    pub fn timestamps(&self) -> &[DateTime<Utc>] {
        &self.timestamps
    }

    pub fn target_name(&self) -> &str {
        &self.target
    }

    /// All column names, target included, in table order
    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    /// Column names without the target, in table order
    pub fn feature_names(&self) -> Vec<String> {
        self.columns
            .iter()
            .filter(|c| c.name != self.target)
            .map(|c| c.name.clone())
            .collect()
    }

    pub fn column(&self, name: &str) -> Option<&[f64]> {
        self.columns
            .iter()
            .find(|c| c.name == name)
            .map(|c| c.values.as_slice())
    }

    pub fn targets(&self) -> Vec<f64> {
        self.column(&self.target)
            .map(|values| values.to_vec())
            .unwrap_or_default()
    }

    /// Feature matrix: every column except the target, row-major
    pub fn features(&self) -> FeatureMatrix {
        let feature_columns: Vec<&Column> = self
            .columns
            .iter()
            .filter(|c| c.name != self.target)
            .collect();

        let rows = (0..self.len())
            .map(|row| feature_columns.iter().map(|c| c.values[row]).collect())
            .collect();

        FeatureMatrix {
            columns: feature_columns.iter().map(|c| c.name.clone()).collect(),
            rows,
        }
    }

    pub fn slice(&self, range: Range<usize>) -> Self {
        Self {
            timestamps: self.timestamps[range.clone()].to_vec(),
            columns: self
                .columns
                .iter()
                .map(|c| Column::new(c.name.clone(), c.values[range.clone()].to_vec()))
                .collect(),
            target: self.target.clone(),
        }
    }

    /// Split into rows `[0, at)` and `[at, len)`, preserving order
    pub fn split_at(&self, at: usize) -> (Self, Self) {
        let at = at.min(self.len());
        (self.slice(0..at), self.slice(at..self.len()))
    }

    /// Append `other` after `self`; both must share columns and target
    pub fn concat(&self, other: &FeatureTable) -> Result<Self> {
        if self.column_names() != other.column_names() || self.target != other.target {
            return Err(ForecastError::SchemaMismatch {
                expected: self.column_names(),
                actual: other.column_names(),
            });
        }

        let mut timestamps = self.timestamps.clone();
        timestamps.extend_from_slice(&other.timestamps);

        let columns = self
            .columns
            .iter()
            .zip(other.columns.iter())
            .map(|(a, b)| {
                let mut values = a.values.clone();
                values.extend_from_slice(&b.values);
                Column::new(a.name.clone(), values)
            })
            .collect();

        Self::new(timestamps, columns, self.target.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn table(n: usize) -> FeatureTable {
        let start = Utc.with_ymd_and_hms(2021, 3, 1, 0, 0, 0).unwrap();
        let timestamps = (0..n).map(|i| start + Duration::hours(i as i64)).collect();
        let x: Vec<f64> = (0..n).map(|i| i as f64).collect();
        let y: Vec<f64> = (0..n).map(|i| 2.0 * i as f64).collect();
        FeatureTable::new(
            timestamps,
            vec![Column::new("x", x), Column::new("load", y)],
            "load",
        )
        .unwrap()
    }

    #[test]
    fn test_features_exclude_target() {
        let t = table(4);
        let x = t.features();
        assert_eq!(x.columns(), &["x".to_string()]);
        assert_eq!(x.rows()[3], vec![3.0]);
        assert_eq!(t.targets(), vec![0.0, 2.0, 4.0, 6.0]);
        assert_eq!(t.feature_names(), vec!["x".to_string()]);
    }

    #[test]
    fn test_split_and_concat_roundtrip() {
        let t = table(10);
        let (head, tail) = t.split_at(7);
        assert_eq!(head.len(), 7);
        assert_eq!(tail.len(), 3);
        assert_eq!(head.concat(&tail).unwrap(), t);
    }

    #[test]
    fn test_missing_target_rejected() {
        let start = Utc.with_ymd_and_hms(2021, 3, 1, 0, 0, 0).unwrap();
        let result = FeatureTable::new(vec![start], vec![Column::new("x", vec![1.0])], "load");
        assert!(matches!(result, Err(ForecastError::InvalidSeries(_))));
    }

    #[test]
    fn test_ragged_matrix_rejected() {
        let result = FeatureMatrix::new(
            vec!["a".to_string(), "b".to_string()],
            vec![vec![1.0, 2.0], vec![3.0]],
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_flat_is_row_major() {
        let m = FeatureMatrix::new(
            vec!["a".to_string(), "b".to_string()],
            vec![vec![1.0, 2.0], vec![3.0, 4.0]],
        )
        .unwrap();
        assert_eq!(m.to_flat(), vec![1.0, 2.0, 3.0, 4.0]);
        assert_eq!(m.slice(1..2).rows(), &[vec![3.0, 4.0]]);
    }
}
