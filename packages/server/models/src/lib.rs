#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! API request and response types for the PPE vision server.
//!
//! Response envelopes use `snake_case` keys; the per-person records inside
//! them keep the `camelCase` shape of [`PersonResult`].

use ppe_vision_models::{ComplianceSummary, ImageMetadata, PersonResult};
use serde::{Deserialize, Serialize};

/// Health check response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiHealth {
    /// Always `ok` while the process serves requests.
    pub status: String,
}

impl ApiHealth {
    /// The only health answer the server gives.
    #[must_use]
    pub fn ok() -> Self {
        Self {
            status: "ok".to_string(),
        }
    }
}

/// Static capability descriptor for `GET /config`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Accepted image formats.
    pub supported_formats: Vec<String>,
    /// Largest accepted upload in bytes.
    pub max_file_size: usize,
    /// Most persons reported per image.
    pub max_persons: usize,
    /// Lowest threshold offered to users.
    pub min_confidence: f64,
    /// Highest threshold offered to users.
    pub max_confidence: f64,
    /// Threshold applied when a request omits one.
    pub default_confidence: f64,
}

/// Successful response envelope.
#[derive(Debug, Clone, Serialize)]
pub struct ApiResponse<T> {
    /// Always `true`.
    pub success: bool,
    /// Payload.
    pub data: T,
    /// Human-readable summary.
    pub message: String,
}

impl<T> ApiResponse<T> {
    /// Wraps a payload.
    pub fn ok(data: T, message: impl Into<String>) -> Self {
        Self {
            success: true,
            data,
            message: message.into(),
        }
    }
}

/// Payload of `POST /detect`.
#[derive(Debug, Clone, Serialize)]
pub struct DetectData {
    /// One record per detected person, in detector order.
    pub results: Vec<PersonResult>,
    /// Server-side processing time in seconds.
    pub processing_time: f64,
    /// Dimensions and format of the upload.
    pub image_metadata: ImageMetadata,
    /// Compliance counts over `results`.
    pub summary: ComplianceSummary,
}

/// Payload of `POST /cleanup`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CleanupData {
    /// Number of artifact files removed.
    pub deleted: usize,
}

/// Failure response envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Always `false`.
    pub success: bool,
    /// Machine-readable error kind, e.g. `validation_error`.
    pub error: String,
    /// Human-readable description safe to show to users.
    pub message: String,
}

impl ErrorResponse {
    /// Builds a failure envelope.
    pub fn new(error: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            success: false,
            error: error.into(),
            message: message.into(),
        }
    }
}
