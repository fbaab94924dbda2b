//! Hourly electricity load forecasting.
//!
//! Raw demand history flows through [`forecast::FeatureEngineer`] into a
//! [`forecast::FeatureTable`], is split chronologically and fit by a
//! [`ml::ForecastModel`], and is served from a saved artifact by [`api`].

pub mod api;
pub mod cli;
pub mod config;
pub mod data;
pub mod domain;
pub mod error;
pub mod forecast;
pub mod ml;
pub mod telemetry;

pub use error::{ForecastError, Result};
