//! On-disk model artifact.
//!
//! One bincode file holds the scaler parameters, the forest and its
//! metadata, tagged with a format version and the training fingerprint so a
//! stale artifact is never served under a different configuration.

use crate::error::{AppError, Result};
use crate::ml::forest::RandomForestRegressor;
use crate::ml::models::{ModelMetadata, TrainingFingerprint};
use crate::ml::scaler::ScalerParameters;
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

/// Bumped whenever the serialized layout changes.
pub const ARTIFACT_FORMAT_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelArtifact {
    pub format_version: u32,
    pub fingerprint: TrainingFingerprint,
    pub scaler: ScalerParameters,
    pub regressor: RandomForestRegressor,
    pub metadata: ModelMetadata,
}

impl ModelArtifact {
    /// Write atomically: serialize to a sibling temp file, then rename.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let tmp_path = path.with_extension("tmp");
        {
            let mut writer = BufWriter::new(File::create(&tmp_path)?);
            bincode::serialize_into(&mut writer, self)?;
            writer.flush()?;
        }
        fs::rename(&tmp_path, path)?;
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        let reader = BufReader::new(File::open(path)?);
        let artifact: ModelArtifact = bincode::deserialize_from(reader)?;

        if artifact.format_version != ARTIFACT_FORMAT_VERSION {
            return Err(AppError::Serialization(format!(
                "artifact format {} is not supported (expected {})",
                artifact.format_version, ARTIFACT_FORMAT_VERSION
            )));
        }
        if !artifact.regressor.is_trained() {
            return Err(AppError::Serialization(
                "artifact holds an untrained regressor".to_string(),
            ));
        }

        Ok(artifact)
    }
}
