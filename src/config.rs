use anyhow::Result;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use crate::forecast::{DEFAULT_LAGS, DEFAULT_WINDOWS, MIN_ROLLING_WINDOW};
use crate::ml::ModelType;

pub const DEFAULT_CONFIG_PATH: &str = "config/default.toml";
pub const ENV_PREFIX: &str = "LOADFC__";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub data: DataConfig,
    #[serde(default)]
    pub features: FeaturesConfig,
    #[serde(default)]
    pub model: ModelConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub request_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8000,
            request_timeout_secs: 10,
        }
    }
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr> {
        Ok(format!("{}:{}", self.host, self.port).parse()?)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataConfig {
    /// Demand column used as the forecasting target
    pub target: String,
    pub timestamp_column: String,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            target: "nat_demand".to_string(),
            timestamp_column: "datetime".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeaturesConfig {
    pub lags: Vec<usize>,
    pub windows: Vec<usize>,
}

impl Default for FeaturesConfig {
    fn default() -> Self {
        Self {
            lags: DEFAULT_LAGS.to_vec(),
            windows: DEFAULT_WINDOWS.to_vec(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    pub kind: ModelType,
    pub test_fraction: f64,
    pub n_trees: usize,
    pub max_depth: Option<u16>,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    pub seed: u64,
    pub artifact_path: PathBuf,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            kind: ModelType::RandomForest,
            test_fraction: 0.2,
            n_trees: 100,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            seed: 42,
            artifact_path: PathBuf::from("models/random_forest_load_forecaster.bin"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub directory: PathBuf,
    /// File under `directory` receiving one line per served prediction
    pub prediction_file: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("logs"),
            prediction_file: "predictions.log".to_string(),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::load_from(Path::new(DEFAULT_CONFIG_PATH))
    }

    /// Defaults, then the TOML file at `path` (if present), then `LOADFC__*` env vars
    pub fn load_from(path: &Path) -> Result<Self> {
        let figment = Figment::from(Serialized::defaults(Config::default()))
            .merge(Toml::file(path))
            .merge(Env::prefixed(ENV_PREFIX).split("__"));
        let config: Config = figment.extract()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.features.lags.is_empty() && self.features.windows.is_empty() {
            anyhow::bail!("features.lags and features.windows cannot both be empty");
        }
        if let Some(bad) = self.features.lags.iter().find(|lag| **lag == 0) {
            anyhow::bail!("features.lags must be positive, got {}", bad);
        }
        if let Some(bad) = self
            .features
            .windows
            .iter()
            .find(|w| **w < MIN_ROLLING_WINDOW)
        {
            anyhow::bail!(
                "features.windows must be at least {}, got {}",
                MIN_ROLLING_WINDOW,
                bad
            );
        }
        if !(self.model.test_fraction > 0.0 && self.model.test_fraction < 1.0) {
            anyhow::bail!(
                "model.test_fraction must be in (0, 1), got {}",
                self.model.test_fraction
            );
        }
        if self.model.n_trees == 0 {
            anyhow::bail!("model.n_trees must be positive");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.data.target, "nat_demand");
        assert_eq!(config.features.lags, vec![1, 24, 168]);
        assert_eq!(config.features.windows, vec![3, 24, 168]);
        assert_eq!(config.model.n_trees, 100);
        assert_eq!(config.model.seed, 42);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_layering() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "forecaster.toml",
                r#"
                [server]
                host = "0.0.0.0"
                port = 9000
                request_timeout_secs = 5

                [features]
                lags = [1, 2]
                windows = [4]

                [model]
                kind = "linear_regression"
                test_fraction = 0.25
                n_trees = 10
                min_samples_split = 2
                min_samples_leaf = 1
                seed = 7
                artifact_path = "out/model.bin"
                "#,
            )?;
            jail.set_env("LOADFC__SERVER__PORT", "9100");

            let config = Config::load_from(Path::new("forecaster.toml"))
                .map_err(|e| figment::Error::from(e.to_string()))?;
            assert_eq!(config.server.host, "0.0.0.0");
            assert_eq!(config.server.port, 9100);
            assert_eq!(config.features.lags, vec![1, 2]);
            assert_eq!(config.model.kind, ModelType::LinearRegression);
            assert_eq!(config.model.test_fraction, 0.25);
            // Untouched sections keep their defaults
            assert_eq!(config.data.timestamp_column, "datetime");
            assert_eq!(config.logging.prediction_file, "predictions.log");
            Ok(())
        });
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        Jail::expect_with(|_jail| {
            let config = Config::load_from(Path::new("does-not-exist.toml"))
                .map_err(|e| figment::Error::from(e.to_string()))?;
            assert_eq!(config.server.port, 8000);
            Ok(())
        });
    }

    #[test]
    fn test_invalid_feature_lists() {
        let mut config = Config::default();
        config.features.lags = vec![1, 0];
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.features.windows = vec![1];
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.features.lags = Vec::new();
        config.features.windows = vec![2];
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_lag_from_env_rejected() {
        Jail::expect_with(|jail| {
            jail.set_env("LOADFC__FEATURES__LAGS", "[0]");
            assert!(Config::load_from(Path::new("does-not-exist.toml")).is_err());
            Ok(())
        });
    }

    #[test]
    fn test_invalid_test_fraction() {
        let mut config = Config::default();
        config.model.test_fraction = 1.0;
        assert!(config.validate().is_err());
    }
}
