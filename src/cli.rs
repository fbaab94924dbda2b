//! Command-line interface
//!
//! `train` builds and saves a model artifact from a CSV, `predict` scores a
//! prepared CSV with a saved artifact, `serve` exposes an artifact over HTTP.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::config::{Config, DEFAULT_CONFIG_PATH};
use crate::data::RawTable;
use crate::forecast::{FeatureEngineer, FeatureTable};
use crate::ml::training::FoldReport;
use crate::ml::{
    load_predictor, EvaluationReport, ForecastModel, LinearRegression, ModelMetadata, ModelType,
    RandomForest, Regressor,
};

#[derive(Debug, Parser)]
#[command(name = "load-forecaster")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Hourly electricity demand forecasting")]
pub struct Cli {
    /// Configuration file (TOML)
    #[arg(short, long, global = true, default_value = DEFAULT_CONFIG_PATH)]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Engineer features, train, evaluate and save a model
    Train {
        /// Input CSV
        #[arg(short, long)]
        data: PathBuf,

        /// Treat the CSV as an already-featured table
        #[arg(long)]
        prepared: bool,

        /// Artifact path (defaults to model.artifact_path)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Expanding-window cross-validation folds to report
        #[arg(long)]
        cv_folds: Option<usize>,
    },

    /// Predict every row of a prepared CSV
    Predict {
        /// Prepared CSV holding the model's feature columns
        #[arg(short, long)]
        data: PathBuf,

        /// Artifact path (defaults to model.artifact_path)
        #[arg(short, long)]
        model: Option<PathBuf>,
    },

    /// Serve predictions over HTTP
    Serve {
        /// Artifact path (defaults to model.artifact_path)
        #[arg(short, long)]
        model: Option<PathBuf>,
    },
}

/// Result of a `train` run
#[derive(Debug)]
pub struct TrainSummary {
    pub metadata: ModelMetadata,
    pub evaluation: EvaluationReport,
    pub folds: Vec<FoldReport>,
    pub artifact: PathBuf,
}

/// Feature table for training: engineered from raw demand unless `prepared`
pub fn load_training_table(cfg: &Config, data: &Path, prepared: bool) -> Result<FeatureTable> {
    let raw = RawTable::from_csv_path(data, &cfg.data.timestamp_column)
        .with_context(|| format!("reading {}", data.display()))?;

    let table = if prepared {
        raw.into_feature_table(&cfg.data.target)?
    } else {
        let series = raw.into_series(&cfg.data.target)?;
        FeatureEngineer::run(&series, &cfg.features)?
    };
    Ok(table)
}

pub fn train(
    cfg: &Config,
    data: &Path,
    prepared: bool,
    output: Option<&Path>,
    cv_folds: Option<usize>,
) -> Result<TrainSummary> {
    let table = load_training_table(cfg, data, prepared)?;
    let artifact = output.unwrap_or(&cfg.model.artifact_path).to_path_buf();

    match cfg.model.kind {
        ModelType::RandomForest => train_model(
            ForecastModel::new(RandomForest::from_config(&cfg.model)),
            cfg,
            &table,
            cv_folds,
            artifact,
        ),
        ModelType::LinearRegression => train_model(
            ForecastModel::new(LinearRegression),
            cfg,
            &table,
            cv_folds,
            artifact,
        ),
    }
}

fn train_model<R: Regressor>(
    mut model: ForecastModel<R>,
    cfg: &Config,
    table: &FeatureTable,
    cv_folds: Option<usize>,
    artifact: PathBuf,
) -> Result<TrainSummary> {
    let split = model.train_test_split(table, cfg.model.test_fraction)?;
    info!(
        train_rows = split.y_train.len(),
        test_rows = split.y_test.len(),
        features = split.x_train.n_features(),
        "training"
    );

    let metadata = model.train_split(&split)?.clone();
    let evaluation = model.evaluate(&split.x_test, &split.y_test)?;

    let folds = match cv_folds {
        Some(n) => {
            let min_train = (table.len() / (n + 1)).max(1);
            model.cross_validate(table, n, min_train)?
        }
        None => Vec::new(),
    };

    model
        .save(&artifact)
        .with_context(|| format!("saving model to {}", artifact.display()))?;

    Ok(TrainSummary {
        metadata,
        evaluation,
        folds,
        artifact,
    })
}

pub fn print_train_summary<W: Write>(out: &mut W, summary: &TrainSummary) -> Result<()> {
    writeln!(out, "model:    {}", summary.metadata.model_id)?;
    writeln!(out, "features: {}", summary.metadata.feature_names.join(", "))?;
    writeln!(out, "train:    {}", summary.metadata.training_metrics)?;
    writeln!(out, "test:     {}", summary.evaluation.metrics)?;
    for (i, fold) in summary.folds.iter().enumerate() {
        writeln!(
            out,
            "fold {}:   train {:?} test {:?} {}",
            i + 1,
            fold.fold.train,
            fold.fold.test,
            fold.metrics
        )?;
    }
    writeln!(out, "saved:    {}", summary.artifact.display())?;
    Ok(())
}

/// Score a prepared CSV; one `(timestamp, prediction)` per row
pub fn predict(cfg: &Config, data: &Path, model: Option<&Path>) -> Result<Vec<(String, f64)>> {
    let path = model.unwrap_or(&cfg.model.artifact_path);
    let predictor =
        load_predictor(path).with_context(|| format!("loading model {}", path.display()))?;
    let feature_names = predictor
        .metadata()
        .map(|m| m.feature_names.clone())
        .unwrap_or_default();

    let raw = RawTable::from_csv_path(data, &cfg.data.timestamp_column)
        .with_context(|| format!("reading {}", data.display()))?;
    let x = raw.select_features(&feature_names)?;
    let predicted = predictor.predict(&x)?;

    Ok(raw
        .timestamps()
        .iter()
        .map(|ts| ts.to_rfc3339())
        .zip(predicted)
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_train() {
        let cli = Cli::try_parse_from([
            "load-forecaster",
            "train",
            "--data",
            "data.csv",
            "--prepared",
            "--cv-folds",
            "3",
        ])
        .unwrap();
        assert_eq!(cli.config, PathBuf::from(DEFAULT_CONFIG_PATH));
        match cli.command {
            Commands::Train {
                data,
                prepared,
                output,
                cv_folds,
            } => {
                assert_eq!(data, PathBuf::from("data.csv"));
                assert!(prepared);
                assert!(output.is_none());
                assert_eq!(cv_folds, Some(3));
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_parse_global_config() {
        let cli =
            Cli::try_parse_from(["load-forecaster", "serve", "--config", "prod.toml"]).unwrap();
        assert_eq!(cli.config, PathBuf::from("prod.toml"));
        assert!(matches!(cli.command, Commands::Serve { model: None }));
    }

    #[test]
    fn test_predict_requires_data() {
        assert!(Cli::try_parse_from(["load-forecaster", "predict"]).is_err());
    }
}
