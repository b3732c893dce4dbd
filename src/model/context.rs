//! Loaded serving state.

use std::path::Path;

use serde::de::DeserializeOwned;
use tracing::info;

use crate::error::{ConfigError, Result};
use crate::model::{FittedModel, ModelArtifact};
use crate::schema::FeatureSchema;
use crate::training::types::TrainingReport;

/// The model and feature schema, loaded once at startup and read-only after.
///
/// Pass it by reference to whatever serves predictions; there is no reload
/// in place.
#[derive(Debug)]
pub struct ModelContext<M> {
    model: M,
    schema: FeatureSchema,
    report: Option<TrainingReport>,
}

impl<M: FittedModel> ModelContext<M> {
    /// Wraps an in-memory model.
    pub fn new(model: M, schema: FeatureSchema) -> Self {
        Self {
            model,
            schema,
            report: None,
        }
    }

    pub fn model(&self) -> &M {
        &self.model
    }

    pub fn schema(&self) -> &FeatureSchema {
        &self.schema
    }

    /// The training report stored with the artifact, if loaded from disk.
    pub fn report(&self) -> Option<&TrainingReport> {
        self.report.as_ref()
    }
}

impl<M: FittedModel + DeserializeOwned> ModelContext<M> {
    /// Loads the schema, then the model artifact.
    ///
    /// # Errors
    ///
    /// A schema file without exactly five names is [`ConfigError`]; so is a
    /// schema that disagrees with the features the artifact was trained on,
    /// or a model that cannot score rows of the schema's width. Either way
    /// nothing can be served.
    pub fn load(model_path: impl AsRef<Path>, schema_path: impl AsRef<Path>) -> Result<Self> {
        let schema_path = schema_path.as_ref();
        let schema = FeatureSchema::load(schema_path)?;
        let artifact: ModelArtifact<M> = ModelArtifact::load(model_path.as_ref())?;

        if artifact.report.features != schema.names() {
            return Err(ConfigError::Invalid {
                path: schema_path.display().to_string(),
                message: format!(
                    "schema {:?} does not match model features {:?}",
                    schema.names(),
                    artifact.report.features
                ),
            }
            .into());
        }

        artifact
            .model
            .check_input_width(schema.len())
            .map_err(|message| ConfigError::Invalid {
                path: model_path.as_ref().display().to_string(),
                message,
            })?;

        info!(
            model = %model_path.as_ref().display(),
            features = ?schema.names(),
            trained_at = %artifact.report.trained_at,
            "Model context loaded"
        );

        Ok(Self {
            model: artifact.model,
            schema,
            report: Some(artifact.report),
        })
    }
}
