#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! PPE analysis pipeline.
//!
//! Orchestrates one detection request end to end:
//!
//! 1. decode the upload on the blocking pool (rejecting anything that is
//!    not an image before the detector is called);
//! 2. call the cloud detector, then delete the uploaded copy whatever the
//!    outcome;
//! 3. annotate, crop and assemble every person concurrently, keeping the
//!    detector's person order;
//! 4. hand the written artifacts to the lifecycle manager for deferred
//!    deletion.

pub mod assemble;
pub mod pipeline;
pub mod upload;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use ppe_vision_artifacts::ArtifactRegistry;
use ppe_vision_detection::{DetectionError, DetectionRequest, PpeDetector};
use ppe_vision_models::{ComplianceSummary, EquipmentType, ImageMetadata, PersonResult};
use thiserror::Error;

use crate::pipeline::{PersonContext, process_persons};
use crate::upload::{MAX_PERSONS, UploadedFile};

/// File name of the placeholder image inside the artifact directory.
pub const PLACEHOLDER_FILE_NAME: &str = "placeholder.jpg";

/// Errors that can end a detection request.
#[derive(Debug, Error)]
pub enum AnalysisError {
    /// The upload was rejected before any detector call.
    #[error("Validation error: {message}")]
    Validation {
        /// Description shown to the caller.
        message: String,
    },

    /// The cloud detector failed.
    #[error("External service error: {0}")]
    ExternalService(#[from] DetectionError),

    /// Anything else. The message is for logs only.
    #[error("Internal error: {message}")]
    Internal {
        /// Description of what went wrong.
        message: String,
    },
}

impl AnalysisError {
    /// Builds a [`Self::Validation`] error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Builds a [`Self::Internal`] error from any displayable cause.
    pub fn internal(cause: impl std::fmt::Display) -> Self {
        Self::Internal {
            message: cause.to_string(),
        }
    }
}

/// Output of one successful request.
#[derive(Debug, Clone)]
pub struct Analysis {
    /// Per-person results in detector order.
    pub results: Vec<PersonResult>,
    /// Dimensions and format of the upload.
    pub image_metadata: ImageMetadata,
    /// Compliance counts over `results`.
    pub summary: ComplianceSummary,
    /// Artifacts written for this request.
    pub artifacts: Vec<PathBuf>,
    /// Wall time spent on the request.
    pub processing_time: Duration,
}

/// Runs detection requests against one detector and artifact store.
pub struct Analyzer {
    detector: Arc<dyn PpeDetector>,
    registry: Arc<ArtifactRegistry>,
    placeholder_url: String,
}

impl Analyzer {
    /// Creates an analyzer.
    #[must_use]
    pub fn new(detector: Arc<dyn PpeDetector>, registry: Arc<ArtifactRegistry>) -> Self {
        let placeholder_url = registry.url_for(PLACEHOLDER_FILE_NAME);
        Self {
            detector,
            registry,
            placeholder_url,
        }
    }

    /// The artifact store used for crops.
    #[must_use]
    pub const fn registry(&self) -> &Arc<ArtifactRegistry> {
        &self.registry
    }

    /// URL substituted when a person's crop cannot be produced.
    #[must_use]
    pub fn placeholder_url(&self) -> &str {
        &self.placeholder_url
    }

    /// Analyzes one uploaded image.
    ///
    /// The uploaded copy is deleted as soon as the detector call returns,
    /// and on every early exit. Either the full result set is produced or
    /// an error is returned; per-person rendering failures only swap in
    /// the placeholder image.
    ///
    /// # Errors
    ///
    /// * [`AnalysisError::Validation`] if the upload is not a decodable
    ///   image. The detector is not called.
    /// * [`AnalysisError::ExternalService`] if the detector fails.
    /// * [`AnalysisError::Internal`] if a worker fails.
    pub async fn analyze(
        &self,
        mut upload: UploadedFile,
        threshold: f64,
    ) -> Result<Analysis, AnalysisError> {
        let started = Instant::now();

        let bytes = upload.shared_bytes();
        let decoded = tokio::task::spawn_blocking(move || ppe_vision_annotate::decode(&bytes))
            .await
            .map_err(AnalysisError::internal)?
            .map_err(|e| {
                log::info!("Rejecting upload {}: {e}", upload.path().display());
                AnalysisError::validation("Uploaded file is not a valid JPEG or PNG image")
            })?;

        #[allow(clippy::cast_possible_truncation)]
        let request = DetectionRequest {
            image: upload.bytes(),
            min_confidence: threshold as f32,
            required_equipment: EquipmentType::REQUIRED,
        };
        let detected = self.detector.detect(&request).await;
        upload.remove();

        let mut persons = detected.map_err(|e| {
            log::error!("PPE detection failed: {e}");
            AnalysisError::ExternalService(e)
        })?;

        if persons.len() > MAX_PERSONS {
            log::warn!(
                "Detector returned {} persons; keeping the first {MAX_PERSONS}",
                persons.len()
            );
            persons.truncate(MAX_PERSONS);
        }
        log::info!(
            "Detected {} person(s) in {}x{} {} image",
            persons.len(),
            decoded.metadata.width,
            decoded.metadata.height,
            decoded.metadata.format
        );

        let ctx = Arc::new(PersonContext {
            source: Arc::new(decoded.pixels),
            threshold,
            required: EquipmentType::REQUIRED,
            registry: Arc::clone(&self.registry),
            placeholder_url: self.placeholder_url.clone(),
        });
        let outcomes = process_persons(ctx, persons).await?;

        let (results, artifacts): (Vec<_>, Vec<_>) = outcomes
            .into_iter()
            .map(|o| (o.result, o.artifact))
            .unzip();
        let artifacts: Vec<PathBuf> = artifacts.into_iter().flatten().collect();

        Ok(Analysis {
            summary: ComplianceSummary::from_results(&results),
            results,
            image_metadata: decoded.metadata,
            artifacts,
            processing_time: started.elapsed(),
        })
    }
}
