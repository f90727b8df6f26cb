#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Cloud PPE detector abstraction.
//!
//! All recognition is delegated to an external service. This crate hides
//! that service behind the [`PpeDetector`] trait so the rest of the
//! pipeline only ever sees [`ppe_vision_models::Person`] records.
//!
//! Supports AWS Rekognition `DetectProtectiveEquipment` (feature-gated)
//! and a static fixture provider for offline runs and tests.

pub mod providers;

use ppe_vision_models::{EquipmentType, Person};
use thiserror::Error;

/// Errors that can occur while calling the detector.
#[derive(Debug, Error)]
pub enum DetectionError {
    /// The provider is missing configuration or credentials.
    #[error("Configuration error: {message}")]
    Config {
        /// Description.
        message: String,
    },

    /// The service call failed (transport, auth, quota, throttling).
    #[error("Detection service error: {message}")]
    Service {
        /// Description of what went wrong.
        message: String,
    },

    /// The service answered with something that could not be interpreted.
    #[error("Invalid detection response: {message}")]
    InvalidResponse {
        /// Description of what was wrong with the response.
        message: String,
    },
}

/// A single detection call.
#[derive(Debug, Clone, Copy)]
pub struct DetectionRequest<'a> {
    /// Encoded image bytes (JPEG or PNG).
    pub image: &'a [u8],
    /// Minimum confidence, 0-100, used by the service when summarizing.
    pub min_confidence: f32,
    /// Equipment the service should look for.
    pub required_equipment: &'a [EquipmentType],
}

impl<'a> DetectionRequest<'a> {
    /// Builds a request for all [`EquipmentType::REQUIRED`] types.
    #[must_use]
    pub const fn new(image: &'a [u8], min_confidence: f32) -> Self {
        Self {
            image,
            min_confidence,
            required_equipment: EquipmentType::REQUIRED,
        }
    }
}

/// Trait for PPE detection providers.
#[async_trait::async_trait]
pub trait PpeDetector: Send + Sync {
    /// Detects persons and their protective equipment in an image.
    ///
    /// Persons are returned in service order; callers rely on that order
    /// being stable for the lifetime of the request.
    ///
    /// # Errors
    ///
    /// Returns [`DetectionError`] if the service call fails or the
    /// response cannot be interpreted.
    async fn detect(&self, request: &DetectionRequest<'_>) -> Result<Vec<Person>, DetectionError>;
}
