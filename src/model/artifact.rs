//! On-disk form of a fitted model.

use std::path::Path;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};
use crate::training::types::TrainingReport;

/// Bumped whenever the artifact layout changes incompatibly.
pub const ARTIFACT_FORMAT_VERSION: u8 = 1;

/// A fitted model plus the report of the run that produced it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelArtifact<M> {
    pub format_version: u8,
    pub report: TrainingReport,
    pub model: M,
}

impl<M> ModelArtifact<M> {
    pub fn new(model: M, report: TrainingReport) -> Self {
        Self {
            format_version: ARTIFACT_FORMAT_VERSION,
            report,
            model,
        }
    }
}

impl<M: Serialize> ModelArtifact<M> {
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir).map_err(|e| Error::io(dir, e))?;
        }
        let body = serde_json::to_vec(self)?;
        std::fs::write(path, body).map_err(|e| Error::io(path, e))?;
        debug!(path = %path.display(), "Model artifact written");
        Ok(())
    }
}

impl<M: DeserializeOwned> ModelArtifact<M> {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read(path).map_err(|e| Error::io(path, e))?;
        let artifact: Self = serde_json::from_slice(&content)?;
        if artifact.format_version != ARTIFACT_FORMAT_VERSION {
            return Err(Error::Model(format!(
                "unsupported artifact format version {} (expected {})",
                artifact.format_version, ARTIFACT_FORMAT_VERSION
            )));
        }
        Ok(artifact)
    }
}
