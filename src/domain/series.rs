use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{ForecastError, Result};
use crate::forecast::CALENDAR_COLUMNS;

/// Expected sampling interval of a demand series
pub const SAMPLING_INTERVAL_HOURS: i64 = 1;

/// One observation of the raw demand series
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeSeriesRecord {
    pub timestamp: DateTime<Utc>,
    /// Observed demand (the forecasting target)
    pub demand: f64,
    /// Exogenous covariates, aligned with `DemandSeries::covariate_names`
    pub covariates: Vec<Option<f64>>,
}

impl TimeSeriesRecord {
    pub fn new(timestamp: DateTime<Utc>, demand: f64) -> Self {
        Self {
            timestamp,
            demand,
            covariates: Vec::new(),
        }
    }

    pub fn with_covariates(mut self, covariates: Vec<Option<f64>>) -> Self {
        self.covariates = covariates;
        self
    }
}

/// Time-indexed demand series with optional covariates.
///
/// Timestamps are strictly increasing. Gaps are kept as they are: lag and
/// window features count rows, not wall-clock hours.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DemandSeries {
    target: String,
    covariate_names: Vec<String>,
    records: Vec<TimeSeriesRecord>,
}

impl DemandSeries {
    pub fn new(
        target: impl Into<String>,
        covariate_names: Vec<String>,
        records: Vec<TimeSeriesRecord>,
    ) -> Result<Self> {
        let target = target.into();

        if let Some(name) = covariate_names
            .iter()
            .find(|name| CALENDAR_COLUMNS.contains(&name.as_str()))
        {
            return Err(ForecastError::InvalidSeries(format!(
                "covariate '{}' collides with a calendar feature column",
                name
            )));
        }

        if let Some((i, name)) = covariate_names
            .iter()
            .enumerate()
            .find(|(i, name)| covariate_names[..*i].contains(name))
        {
            return Err(ForecastError::InvalidSeries(format!(
                "covariate '{}' appears more than once (column {})",
                name, i
            )));
        }

        if covariate_names.iter().any(|name| *name == target) {
            return Err(ForecastError::InvalidSeries(format!(
                "covariate '{}' collides with the target column",
                target
            )));
        }

        for (i, record) in records.iter().enumerate() {
            if record.covariates.len() != covariate_names.len() {
                return Err(ForecastError::InvalidSeries(format!(
                    "row {} has {} covariates, expected {}",
                    i,
                    record.covariates.len(),
                    covariate_names.len()
                )));
            }
            if !record.demand.is_finite() {
                return Err(ForecastError::InvalidSeries(format!(
                    "row {} has a non-finite {} value",
                    i, target
                )));
            }
        }

        let expected_step = Duration::hours(SAMPLING_INTERVAL_HOURS);
        let mut irregular = 0usize;
        for (i, pair) in records.windows(2).enumerate() {
            let step = pair[1].timestamp - pair[0].timestamp;
            if step <= Duration::zero() {
                return Err(ForecastError::InvalidSeries(format!(
                    "timestamps must be strictly increasing (row {} at {} follows {})",
                    i + 1,
                    pair[1].timestamp,
                    pair[0].timestamp
                )));
            }
            if step != expected_step {
                irregular += 1;
            }
        }
        if irregular > 0 {
            warn!(
                series = %target,
                irregular_steps = irregular,
                "series is not evenly sampled at {}h; gaps are not filled",
                SAMPLING_INTERVAL_HOURS
            );
        }

        Ok(Self {
            target,
            covariate_names,
            records,
        })
    }

    /// Build an hourly series without covariates starting at `start`
    pub fn hourly(target: impl Into<String>, start: DateTime<Utc>, demand: &[f64]) -> Result<Self> {
        let records = demand
            .iter()
            .enumerate()
            .map(|(i, value)| {
                TimeSeriesRecord::new(
                    start + Duration::hours(i as i64 * SAMPLING_INTERVAL_HOURS),
                    *value,
                )
            })
            .collect();
        Self::new(target, Vec::new(), records)
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn covariate_names(&self) -> &[String] {
        &self.covariate_names
    }

    pub fn records(&self) -> &[TimeSeriesRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn timestamps(&self) -> Vec<DateTime<Utc>> {
        self.records.iter().map(|r| r.timestamp).collect()
    }

    pub fn demand(&self) -> Vec<f64> {
        self.records.iter().map(|r| r.demand).collect()
    }

    /// Values of one covariate in timestamp order
    pub fn covariate(&self, name: &str) -> Option<Vec<Option<f64>>> {
        let idx = self.covariate_names.iter().position(|n| n == name)?;
        Some(self.records.iter().map(|r| r.covariates[idx]).collect())
    }
}
