//! Feature engineering for load forecasting models
//!
//! Turns a raw demand series into a leakage-free feature table:
//! calendar features, lagged demand and trailing rolling statistics. No
//! feature at row `i` reads the demand at row `i` or later.

use chrono::{DateTime, Datelike, Timelike, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::FeaturesConfig;
use crate::domain::DemandSeries;
use crate::error::{ForecastError, Result};

use super::table::{Column, FeatureTable};

/// Default lags in hours: previous hour, same hour yesterday, same hour last week
pub const DEFAULT_LAGS: [usize; 3] = [1, 24, 168];

/// Default rolling windows in hours
pub const DEFAULT_WINDOWS: [usize; 3] = [3, 24, 168];

/// Days counted as weekend (0=Monday): Saturday and Sunday
pub const WEEKEND_DAYS: [u32; 2] = [5, 6];

pub const HOUR: &str = "hour";
pub const DAY_OF_WEEK: &str = "dayofweek";
pub const MONTH: &str = "month";
pub const WEEKEND: &str = "weekend";

/// Smallest rolling window with a defined sample standard deviation
pub const MIN_ROLLING_WINDOW: usize = 2;

/// Columns written by `add_time_features`; covariates may not use these names
pub const CALENDAR_COLUMNS: [&str; 4] = [HOUR, DAY_OF_WEEK, MONTH, WEEKEND];

/// Calendar features of a single timestamp
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarFeatures {
    /// Hour of day (0-23)
    pub hour_of_day: u32,
    /// Day of week (0=Monday, 6=Sunday)
    pub day_of_week: u32,
    /// Month (1-12)
    pub month: u32,
    pub is_weekend: bool,
}

impl CalendarFeatures {
    pub fn from_timestamp(timestamp: DateTime<Utc>) -> Self {
        let day_of_week = timestamp.weekday().num_days_from_monday();
        Self {
            hour_of_day: timestamp.hour(),
            day_of_week,
            month: timestamp.month(),
            is_weekend: WEEKEND_DAYS.contains(&day_of_week),
        }
    }
}

pub fn lag_column_name(target: &str, lag: usize) -> String {
    format!("{}_lag_{}", target, lag)
}

pub fn rolling_mean_column_name(target: &str, window: usize) -> String {
    format!("{}_rollmean_{}", target, window)
}

pub fn rolling_std_column_name(target: &str, window: usize) -> String {
    format!("{}_rollstd_{}", target, window)
}

/// Value `lag` steps earlier, `None` where history is too short
pub fn lagged(values: &[f64], lag: usize) -> Vec<Option<f64>> {
    (0..values.len())
        .map(|i| i.checked_sub(lag).map(|j| values[j]))
        .collect()
}

/// Mean and sample standard deviation over the `window` values strictly
/// preceding each position, `None` where fewer than `window` exist
pub fn trailing_statistics(values: &[f64], window: usize) -> Vec<Option<(f64, f64)>> {
    (0..values.len())
        .map(|i| {
            if window < 2 || i < window {
                return None;
            }
            let slice = &values[i - window..i];
            let n = slice.len() as f64;
            let mean = slice.iter().sum::<f64>() / n;
            let variance = slice.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / (n - 1.0);
            Some((mean, variance.sqrt()))
        })
        .collect()
}

#[derive(Debug, Clone)]
struct PendingColumn {
    name: String,
    values: Vec<Option<f64>>,
}

/// Builder that derives a `FeatureTable` from a `DemandSeries`.
///
/// Stages consume and return the engineer, so the caller's series is never
/// touched. Call order is time -> lag -> rolling -> `finalize`; only
/// `finalize` drops rows.
///
/// ```no_run
/// # use load_forecaster::forecast::{FeatureEngineer, DEFAULT_LAGS, DEFAULT_WINDOWS};
/// # fn demo(series: &load_forecaster::domain::DemandSeries) -> load_forecaster::error::Result<()> {
/// let table = FeatureEngineer::new(series)
///     .add_time_features()
///     .add_lag_features(&DEFAULT_LAGS)?
///     .add_rolling_features(&DEFAULT_WINDOWS)?
///     .finalize()?;
/// # Ok(()) }
/// ```
#[derive(Debug, Clone)]
pub struct FeatureEngineer {
    target: String,
    timestamps: Vec<DateTime<Utc>>,
    demand: Vec<f64>,
    columns: Vec<PendingColumn>,
    /// Leading entries of `columns` that came from the series
    n_covariates: usize,
    /// Largest lag or window applied so far
    max_history: usize,
}

impl FeatureEngineer {
    pub fn new(series: &DemandSeries) -> Self {
        let columns: Vec<PendingColumn> = series
            .covariate_names()
            .iter()
            .filter_map(|name| {
                series.covariate(name).map(|values| PendingColumn {
                    name: name.clone(),
                    values,
                })
            })
            .collect();

        Self {
            target: series.target().to_string(),
            timestamps: series.timestamps(),
            demand: series.demand(),
            n_covariates: columns.len(),
            columns,
            max_history: 0,
        }
    }

    /// Run the full pipeline with configured lags and windows
    pub fn run(series: &DemandSeries, config: &FeaturesConfig) -> Result<FeatureTable> {
        Self::new(series)
            .add_time_features()
            .add_lag_features(&config.lags)?
            .add_rolling_features(&config.windows)?
            .finalize()
    }

    /// Add `hour`, `dayofweek`, `month` and `weekend`
    pub fn add_time_features(mut self) -> Self {
        let calendar: Vec<CalendarFeatures> = self
            .timestamps
            .iter()
            .map(|ts| CalendarFeatures::from_timestamp(*ts))
            .collect();

        let hour = calendar.iter().map(|c| Some(c.hour_of_day as f64)).collect();
        let day_of_week = calendar.iter().map(|c| Some(c.day_of_week as f64)).collect();
        let month = calendar.iter().map(|c| Some(c.month as f64)).collect();
        let weekend = calendar
            .iter()
            .map(|c| Some(if c.is_weekend { 1.0 } else { 0.0 }))
            .collect();

        self.upsert(HOUR, hour);
        self.upsert(DAY_OF_WEEK, day_of_week);
        self.upsert(MONTH, month);
        self.upsert(WEEKEND, weekend);
        debug!(rows = self.timestamps.len(), "added calendar features");
        self
    }

    /// Add `{target}_lag_{L}` for each lag
    pub fn add_lag_features(mut self, lags: &[usize]) -> Result<Self> {
        if let Some(bad) = lags.iter().find(|lag| **lag == 0) {
            return Err(ForecastError::InvalidParameter(format!(
                "lags must be positive, got {}",
                bad
            )));
        }

        for &lag in lags {
            let name = lag_column_name(&self.target, lag);
            self.check_not_covariate(&name)?;
            self.upsert(&name, lagged(&self.demand, lag));
            self.max_history = self.max_history.max(lag);
        }
        debug!(?lags, "added lag features");
        Ok(self)
    }

    /// Add `{target}_rollmean_{W}` and `{target}_rollstd_{W}` for each window
    pub fn add_rolling_features(mut self, windows: &[usize]) -> Result<Self> {
        if let Some(bad) = windows.iter().find(|w| **w < MIN_ROLLING_WINDOW) {
            return Err(ForecastError::InvalidParameter(format!(
                "rolling windows need at least 2 values for a standard deviation, got {}",
                bad
            )));
        }

        for &window in windows {
            let stats = trailing_statistics(&self.demand, window);
            let means = stats.iter().map(|s| s.map(|(mean, _)| mean)).collect();
            let stds = stats.iter().map(|s| s.map(|(_, std)| std)).collect();
            let mean_name = rolling_mean_column_name(&self.target, window);
            let std_name = rolling_std_column_name(&self.target, window);
            self.check_not_covariate(&mean_name)?;
            self.check_not_covariate(&std_name)?;
            self.upsert(&mean_name, means);
            self.upsert(&std_name, stds);
            self.max_history = self.max_history.max(window);
        }
        debug!(?windows, "added rolling features");
        Ok(self)
    }

    /// Drop every row with a missing value and return the dense table
    pub fn finalize(self) -> Result<FeatureTable> {
        let total = self.timestamps.len();
        let keep: Vec<bool> = (0..total)
            .map(|row| self.columns.iter().all(|c| c.values[row].is_some()))
            .collect();
        let kept = keep.iter().filter(|k| **k).count();

        if kept == 0 {
            return Err(ForecastError::InsufficientData {
                required: self.max_history + 1,
                available: total,
            });
        }

        let timestamps = self
            .timestamps
            .iter()
            .zip(&keep)
            .filter(|(_, k)| **k)
            .map(|(ts, _)| *ts)
            .collect();

        let mut columns: Vec<Column> = self
            .columns
            .iter()
            .map(|c| {
                let values = c
                    .values
                    .iter()
                    .zip(&keep)
                    .filter_map(|(v, k)| if *k { *v } else { None })
                    .collect();
                Column::new(c.name.clone(), values)
            })
            .collect();

        let target_values = self
            .demand
            .iter()
            .zip(&keep)
            .filter(|(_, k)| **k)
            .map(|(v, _)| *v)
            .collect();
        columns.push(Column::new(self.target.clone(), target_values));

        info!(
            rows_in = total,
            rows_out = kept,
            dropped = total - kept,
            columns = columns.len(),
            "feature table finalized"
        );

        FeatureTable::new(timestamps, columns, self.target)
    }

    /// Names of the columns built so far, target excluded
    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    /// Values of a column built so far, including missing entries
    pub fn column(&self, name: &str) -> Option<&[Option<f64>]> {
        self.columns
            .iter()
            .find(|c| c.name == name)
            .map(|c| c.values.as_slice())
    }

    fn check_not_covariate(&self, name: &str) -> Result<()> {
        if self.columns[..self.n_covariates].iter().any(|c| c.name == name) {
            return Err(ForecastError::InvalidSeries(format!(
                "covariate '{}' collides with a generated feature column",
                name
            )));
        }
        Ok(())
    }

    fn upsert(&mut self, name: &str, values: Vec<Option<f64>>) {
        match self.columns.iter_mut().find(|c| c.name == name) {
            Some(column) => column.values = values,
            None => self.columns.push(PendingColumn {
                name: name.to_string(),
                values,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::TimeSeriesRecord;
    use chrono::{Duration, TimeZone};
    use proptest::prelude::*;
    use rstest::rstest;

    fn start() -> DateTime<Utc> {
        // A Monday
        Utc.with_ymd_and_hms(2020, 1, 6, 0, 0, 0).unwrap()
    }

    fn series(values: &[f64]) -> DemandSeries {
        DemandSeries::hourly("nat_demand", start(), values).unwrap()
    }

    fn ramp(n: usize) -> Vec<f64> {
        (0..n).map(|i| 1000.0 + (i as f64 * 0.7).sin() * 50.0 + i as f64).collect()
    }

    #[rstest]
    #[case(0, 0, 0, false)] // Monday midnight
    #[case(5 * 24 + 13, 13, 5, true)] // Saturday 13:00
    #[case(6 * 24 + 23, 23, 6, true)] // Sunday 23:00
    #[case(7 * 24, 0, 0, false)] // next Monday
    fn test_calendar_features(
        #[case] offset_hours: i64,
        #[case] hour: u32,
        #[case] day_of_week: u32,
        #[case] weekend: bool,
    ) {
        let features = CalendarFeatures::from_timestamp(start() + Duration::hours(offset_hours));
        assert_eq!(features.hour_of_day, hour);
        assert_eq!(features.day_of_week, day_of_week);
        assert_eq!(features.month, 1);
        assert_eq!(features.is_weekend, weekend);
    }

    #[test]
    fn test_time_features_idempotent() {
        let s = series(&ramp(48));
        let once = FeatureEngineer::new(&s).add_time_features();
        let twice = once.clone().add_time_features();
        assert_eq!(once.column_names(), twice.column_names());
        assert_eq!(once.column(HOUR), twice.column(HOUR));
        assert_eq!(once.column(WEEKEND), twice.column(WEEKEND));
    }

    #[test]
    fn test_lagged() {
        let values = vec![1.0, 2.0, 3.0, 4.0, 5.0];
        assert_eq!(
            lagged(&values, 2),
            vec![None, None, Some(1.0), Some(2.0), Some(3.0)]
        );
    }

    #[test]
    fn test_trailing_statistics_exclude_current_row() {
        let values = vec![1.0, 2.0, 3.0, 100.0];
        let stats = trailing_statistics(&values, 3);
        assert_eq!(stats[..3], [None, None, None]);
        let (mean, std) = stats[3].unwrap();
        assert_eq!(mean, 2.0); // Mean of [1.0, 2.0, 3.0]
        assert!((std - 1.0).abs() < 1e-12); // Sample std of [1.0, 2.0, 3.0]
    }

    #[test]
    fn test_rejects_zero_lag_and_short_window() {
        let s = series(&ramp(10));
        assert!(matches!(
            FeatureEngineer::new(&s).add_lag_features(&[1, 0]),
            Err(ForecastError::InvalidParameter(_))
        ));
        assert!(matches!(
            FeatureEngineer::new(&s).add_rolling_features(&[1]),
            Err(ForecastError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_finalize_row_count_and_columns() {
        let s = series(&ramp(200));
        let table = FeatureEngineer::new(&s)
            .add_time_features()
            .add_lag_features(&DEFAULT_LAGS)
            .unwrap()
            .add_rolling_features(&DEFAULT_WINDOWS)
            .unwrap()
            .finalize()
            .unwrap();

        assert_eq!(table.len(), 200 - 168);
        assert_eq!(table.timestamps()[0], start() + Duration::hours(168));
        assert_eq!(
            table.column_names(),
            vec![
                "hour",
                "dayofweek",
                "month",
                "weekend",
                "nat_demand_lag_1",
                "nat_demand_lag_24",
                "nat_demand_lag_168",
                "nat_demand_rollmean_3",
                "nat_demand_rollstd_3",
                "nat_demand_rollmean_24",
                "nat_demand_rollstd_24",
                "nat_demand_rollmean_168",
                "nat_demand_rollstd_168",
                "nat_demand",
            ]
        );

        // First kept row is index 168: its lag_168 is the very first demand value
        let demand = s.demand();
        assert_eq!(table.column("nat_demand_lag_168").unwrap()[0], demand[0]);
        assert_eq!(table.column("nat_demand_lag_1").unwrap()[0], demand[167]);
        assert_eq!(table.column("nat_demand").unwrap()[0], demand[168]);
    }

    #[test]
    fn test_covariates_pass_through_first() {
        let records = (0..30)
            .map(|i| {
                TimeSeriesRecord::new(start() + Duration::hours(i), 500.0 + i as f64)
                    .with_covariates(vec![Some(20.0 + i as f64)])
            })
            .collect();
        let s = DemandSeries::new("nat_demand", vec!["T2M_toc".to_string()], records).unwrap();
        let table = FeatureEngineer::new(&s)
            .add_time_features()
            .add_lag_features(&[2])
            .unwrap()
            .add_rolling_features(&[3])
            .unwrap()
            .finalize()
            .unwrap();

        assert_eq!(table.len(), 27);
        assert_eq!(table.column_names()[0], "T2M_toc");
        assert_eq!(table.column("T2M_toc").unwrap()[0], 23.0);
    }

    #[test]
    fn test_covariate_named_like_lag_is_rejected() {
        let records = (0..10)
            .map(|i| {
                TimeSeriesRecord::new(start() + Duration::hours(i), 500.0 + i as f64)
                    .with_covariates(vec![Some(99.0), Some(7.0)])
            })
            .collect();
        let s = DemandSeries::new(
            "nat_demand",
            vec!["nat_demand_lag_1".to_string(), "nat_demand_rollstd_3".to_string()],
            records,
        )
        .unwrap();

        assert!(matches!(
            FeatureEngineer::new(&s).add_lag_features(&[1]),
            Err(ForecastError::InvalidSeries(_))
        ));
        assert!(matches!(
            FeatureEngineer::new(&s).add_rolling_features(&[3]),
            Err(ForecastError::InvalidSeries(_))
        ));

        // Unrelated generated columns leave the covariates untouched
        let engineer = FeatureEngineer::new(&s)
            .add_time_features()
            .add_lag_features(&[2])
            .unwrap();
        assert_eq!(engineer.column("nat_demand_lag_1").unwrap(), &[Some(99.0); 10]);
        assert_eq!(engineer.column_names()[..2], ["nat_demand_lag_1", "nat_demand_rollstd_3"]);
    }

    #[test]
    fn test_missing_covariate_rows_dropped() {
        let records = (0..10)
            .map(|i| {
                let temp = if i == 7 { None } else { Some(10.0) };
                TimeSeriesRecord::new(start() + Duration::hours(i), i as f64)
                    .with_covariates(vec![temp])
            })
            .collect();
        let s = DemandSeries::new("nat_demand", vec!["T2M_toc".to_string()], records).unwrap();
        let table = FeatureEngineer::new(&s)
            .add_lag_features(&[1])
            .unwrap()
            .finalize()
            .unwrap();
        assert_eq!(table.len(), 8);
        assert!(!table.column("nat_demand").unwrap().contains(&7.0));
    }

    #[test]
    fn test_finalize_insufficient_data() {
        let s = series(&ramp(100));
        let result = FeatureEngineer::new(&s)
            .add_lag_features(&DEFAULT_LAGS)
            .unwrap()
            .finalize();
        assert!(matches!(
            result,
            Err(ForecastError::InsufficientData {
                required: 169,
                available: 100
            })
        ));
    }

    #[test]
    fn test_caller_series_untouched() {
        let s = series(&ramp(30));
        let before = s.clone();
        let _ = FeatureEngineer::new(&s)
            .add_time_features()
            .add_lag_features(&[1])
            .unwrap()
            .finalize()
            .unwrap();
        assert_eq!(s, before);
    }

    proptest! {
        #[test]
        fn prop_lags_ignore_future_rows(
            values in proptest::collection::vec(0.0f64..1000.0, 20..60),
            lag in 1usize..10,
            cut in 0usize..20,
            bump in 1.0f64..500.0,
        ) {
            let cut = cut.min(values.len() - 1);
            let mut changed = values.clone();
            for v in changed.iter_mut().skip(cut + 1) {
                *v += bump;
            }

            let a = FeatureEngineer::new(&series(&values)).add_lag_features(&[lag]).unwrap();
            let b = FeatureEngineer::new(&series(&changed)).add_lag_features(&[lag]).unwrap();
            let name = lag_column_name("nat_demand", lag);
            let col_a = a.column(&name).unwrap();
            let col_b = b.column(&name).unwrap();
            prop_assert_eq!(&col_a[..=cut], &col_b[..=cut]);
        }

        #[test]
        fn prop_rolling_ignores_current_row(
            values in proptest::collection::vec(0.0f64..1000.0, 20..60),
            window in 2usize..8,
            row in 0usize..20,
            bump in 1.0f64..500.0,
        ) {
            let row = row.min(values.len() - 1);
            let mut changed = values.clone();
            for v in changed.iter_mut().skip(row) {
                *v += bump;
            }

            let a = FeatureEngineer::new(&series(&values)).add_rolling_features(&[window]).unwrap();
            let b = FeatureEngineer::new(&series(&changed)).add_rolling_features(&[window]).unwrap();
            for name in [
                rolling_mean_column_name("nat_demand", window),
                rolling_std_column_name("nat_demand", window),
            ] {
                let col_a = a.column(&name).unwrap();
                let col_b = b.column(&name).unwrap();
                prop_assert_eq!(&col_a[..=row], &col_b[..=row]);
            }
        }

        #[test]
        fn prop_finalize_drops_max_history(
            n in 30usize..80,
            lag in 1usize..12,
            window in 2usize..12,
        ) {
            let table = FeatureEngineer::new(&series(&ramp(n)))
                .add_time_features()
                .add_lag_features(&[lag])
                .unwrap()
                .add_rolling_features(&[window])
                .unwrap()
                .finalize()
                .unwrap();
            prop_assert_eq!(table.len(), n - lag.max(window));
        }
    }
}
