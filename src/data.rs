//! CSV ingestion
//!
//! Reads an hourly demand CSV into a `RawTable`: one timestamp column plus
//! named numeric columns where empty cells are missing values. The raw table
//! becomes either a `DemandSeries` for feature engineering or, for files that
//! already carry features, a `FeatureTable`.

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::debug;

use crate::domain::{DemandSeries, TimeSeriesRecord};
use crate::error::{ForecastError, Result};
use crate::forecast::{Column, FeatureMatrix, FeatureTable};

const NAIVE_FORMATS: [&str; 3] = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"];

/// Parse RFC 3339 or a naive `YYYY-MM-DD HH:MM[:SS]` timestamp (taken as UTC)
pub fn parse_timestamp(value: &str) -> Result<DateTime<Utc>> {
    let value = value.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(value) {
        return Ok(ts.with_timezone(&Utc));
    }
    NAIVE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
        .map(|naive| Utc.from_utc_datetime(&naive))
        .ok_or_else(|| ForecastError::InvalidSeries(format!("unparseable timestamp '{}'", value)))
}

fn parse_cell(value: &str, row: usize, column: &str) -> Result<Option<f64>> {
    let value = value.trim();
    if value.is_empty() || value.eq_ignore_ascii_case("nan") {
        return Ok(None);
    }
    value.parse::<f64>().map(Some).map_err(|_| {
        ForecastError::InvalidSeries(format!(
            "row {}: column '{}' has non-numeric value '{}'",
            row, column, value
        ))
    })
}

/// Timestamps plus named numeric columns, in file order
#[derive(Debug, Clone, PartialEq)]
pub struct RawTable {
    timestamps: Vec<DateTime<Utc>>,
    columns: Vec<(String, Vec<Option<f64>>)>,
}

impl RawTable {
    pub fn from_csv_path(path: &Path, timestamp_column: &str) -> Result<Self> {
        let table = Self::from_reader(File::open(path)?, timestamp_column)?;
        debug!(
            path = %path.display(),
            rows = table.len(),
            columns = table.columns.len(),
            "csv loaded"
        );
        Ok(table)
    }

    pub fn from_reader<R: Read>(reader: R, timestamp_column: &str) -> Result<Self> {
        let mut csv = csv::ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::All)
            .from_reader(reader);

        let headers = csv.headers()?.clone();
        let ts_idx = headers
            .iter()
            .position(|h| h == timestamp_column)
            .ok_or_else(|| {
                ForecastError::InvalidSeries(format!(
                    "timestamp column '{}' not found",
                    timestamp_column
                ))
            })?;

        let names: Vec<(usize, String)> = headers
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != ts_idx)
            .map(|(i, h)| (i, h.to_string()))
            .collect();

        let mut timestamps = Vec::new();
        let mut values: Vec<Vec<Option<f64>>> = vec![Vec::new(); names.len()];

        for (row, record) in csv.records().enumerate() {
            let record = record?;
            let ts = record.get(ts_idx).unwrap_or_default();
            timestamps.push(parse_timestamp(ts)?);
            for (slot, (idx, name)) in names.iter().enumerate() {
                let cell = record.get(*idx).unwrap_or_default();
                values[slot].push(parse_cell(cell, row, name)?);
            }
        }

        let columns = names
            .into_iter()
            .map(|(_, name)| name)
            .zip(values)
            .collect();

        Ok(Self {
            timestamps,
            columns,
        })
    }

    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|(name, _)| name.as_str()).collect()
    }

    pub fn column(&self, name: &str) -> Option<&[Option<f64>]> {
        self.columns
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, values)| values.as_slice())
    }

    pub fn timestamps(&self) -> &[DateTime<Utc>] {
        &self.timestamps
    }

    /// Rows of the named columns, in the order given; other columns are ignored
    pub fn select_features(&self, names: &[String]) -> Result<FeatureMatrix> {
        let selected = names
            .iter()
            .map(|name| {
                self.column(name).ok_or_else(|| ForecastError::SchemaMismatch {
                    expected: names.to_vec(),
                    actual: self.column_names().into_iter().map(String::from).collect(),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let rows = (0..self.len())
            .map(|row| {
                selected
                    .iter()
                    .zip(names)
                    .map(|(values, name)| {
                        values[row].ok_or_else(|| {
                            ForecastError::InvalidSeries(format!(
                                "row {}: missing value in column '{}'",
                                row, name
                            ))
                        })
                    })
                    .collect::<Result<Vec<f64>>>()
            })
            .collect::<Result<Vec<_>>>()?;

        FeatureMatrix::new(names.to_vec(), rows)
    }

    /// Demand series with `target` as demand and every other column as a covariate
    pub fn into_series(self, target: &str) -> Result<DemandSeries> {
        let target_idx = self
            .columns
            .iter()
            .position(|(name, _)| name == target)
            .ok_or_else(|| ForecastError::InvalidSeries(format!("target column '{}' not found", target)))?;

        let mut columns = self.columns;
        let (_, demand) = columns.remove(target_idx);
        let covariate_names = columns.iter().map(|(name, _)| name.clone()).collect();

        let records = self
            .timestamps
            .into_iter()
            .zip(demand)
            .enumerate()
            .map(|(row, (timestamp, demand))| {
                let demand = demand.ok_or_else(|| {
                    ForecastError::InvalidSeries(format!("row {}: missing {} value", row, target))
                })?;
                let covariates = columns.iter().map(|(_, values)| values[row]).collect();
                Ok(TimeSeriesRecord::new(timestamp, demand).with_covariates(covariates))
            })
            .collect::<Result<Vec<_>>>()?;

        DemandSeries::new(target, covariate_names, records)
    }

    /// Feature table for files that already hold engineered features
    pub fn into_feature_table(self, target: &str) -> Result<FeatureTable> {
        let columns = self
            .columns
            .into_iter()
            .map(|(name, values)| {
                let dense = values
                    .into_iter()
                    .enumerate()
                    .map(|(row, v)| {
                        v.ok_or_else(|| {
                            ForecastError::InvalidSeries(format!(
                                "row {}: missing value in column '{}'",
                                row, name
                            ))
                        })
                    })
                    .collect::<Result<Vec<f64>>>()?;
                Ok(Column::new(name, dense))
            })
            .collect::<Result<Vec<_>>>()?;

        FeatureTable::new(self.timestamps, columns, target)
    }
}
