//! Model artifact persistence
//!
//! An artifact is the fitted estimator plus its metadata, encoded with
//! bincode. Readers treat it as an opaque blob.

use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;
use std::sync::Arc;
use tracing::info;

use super::training::{DemandPredictor, ForecastModel};
use super::{FittedRegressor, LinearRegression, ModelMetadata, ModelType, RandomForest};
use crate::error::{ForecastError, Result};

/// Artifact format version, bumped on incompatible layout changes
pub const ARTIFACT_VERSION: u32 = 1;

#[derive(Debug, Deserialize)]
#[serde(bound = "F: FittedRegressor")]
pub struct ModelArtifact<F> {
    pub format_version: u32,
    pub metadata: ModelMetadata,
    pub fitted: F,
}

// Leading fields of `ModelArtifact`; bincode ignores the trailing estimator
#[derive(Deserialize)]
struct ArtifactHeader {
    format_version: u32,
    metadata: ModelMetadata,
}

// Same field layout as `ModelArtifact`, borrowed for writing
#[derive(Serialize)]
struct ArtifactRef<'a, F> {
    format_version: u32,
    metadata: &'a ModelMetadata,
    fitted: &'a F,
}

pub fn write_artifact<W: Write, F: FittedRegressor>(
    writer: W,
    metadata: &ModelMetadata,
    fitted: &F,
) -> Result<()> {
    let artifact = ArtifactRef {
        format_version: ARTIFACT_VERSION,
        metadata,
        fitted,
    };
    bincode::serialize_into(writer, &artifact)?;
    Ok(())
}

impl<F: FittedRegressor> ModelArtifact<F> {
    pub fn read_from<R: Read>(reader: R) -> Result<Self> {
        let artifact: Self = bincode::deserialize_from(reader)?;
        check_version(artifact.format_version)?;
        Ok(artifact)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let artifact = Self::read_from(BufReader::new(File::open(path)?))?;
        info!(
            path = %path.display(),
            model_id = %artifact.metadata.model_id,
            model_type = %artifact.metadata.model_type,
            "model artifact loaded"
        );
        Ok(artifact)
    }
}

fn check_version(found: u32) -> Result<()> {
    if found != ARTIFACT_VERSION {
        return Err(ForecastError::InvalidParameter(format!(
            "unsupported artifact version {} (expected {})",
            found, ARTIFACT_VERSION
        )));
    }
    Ok(())
}

/// Metadata of the artifact at `path`, without decoding the estimator
pub fn read_metadata(path: &Path) -> Result<ModelMetadata> {
    let header: ArtifactHeader = bincode::deserialize_from(BufReader::new(File::open(path)?))?;
    check_version(header.format_version)?;
    Ok(header.metadata)
}

/// Load whichever estimator the artifact at `path` holds, ready for serving
pub fn load_predictor(path: &Path) -> Result<Arc<dyn DemandPredictor>> {
    let predictor: Arc<dyn DemandPredictor> = match read_metadata(path)?.model_type {
        ModelType::RandomForest => Arc::new(ForecastModel::load(RandomForest::default(), path)?),
        ModelType::LinearRegression => Arc::new(ForecastModel::load(LinearRegression, path)?),
    };
    Ok(predictor)
}

/// Write an artifact to `path`, creating parent directories as needed
pub fn save_artifact<F: FittedRegressor>(
    path: &Path,
    metadata: &ModelMetadata,
    fitted: &F,
) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let mut writer = BufWriter::new(File::create(path)?);
    write_artifact(&mut writer, metadata, fitted)?;
    writer.flush()?;
    info!(
        path = %path.display(),
        model_id = %metadata.model_id,
        "model artifact saved"
    );
    Ok(())
}
