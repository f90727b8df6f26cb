//! Detector provider implementations and environment-driven selection.

pub mod fixture;
#[cfg(feature = "rekognition")]
pub mod rekognition;

use crate::{DetectionError, PpeDetector};

/// Creates a detector based on environment variables.
///
/// `PPE_DETECTOR` selects the provider (default `rekognition`):
///
/// - `rekognition` / `aws`: AWS Rekognition, region from `AWS_REGION` or
///   `AWS_DEFAULT_REGION`, credentials from the standard AWS chain.
/// - `fixture`: canned persons read from the JSON file named by
///   `PPE_FIXTURE_PATH`.
///
/// # Errors
///
/// Returns [`DetectionError::Config`] if the provider is unknown, not
/// compiled in, or missing its configuration.
#[allow(clippy::unused_async)] // async is needed when rekognition feature is enabled
pub async fn create_detector_from_env() -> Result<Box<dyn PpeDetector>, DetectionError> {
    let provider = std::env::var("PPE_DETECTOR").unwrap_or_else(|_| "rekognition".to_string());

    match provider.to_lowercase().as_str() {
        #[cfg(feature = "rekognition")]
        "rekognition" | "aws" => {
            let region = std::env::var("AWS_REGION")
                .or_else(|_| std::env::var("AWS_DEFAULT_REGION"))
                .ok();
            if region.is_none() {
                log::info!("No AWS_REGION set; relying on the AWS config chain for Rekognition");
            }
            let detector = rekognition::RekognitionDetector::new(region).await;
            Ok(Box::new(detector))
        }
        #[cfg(not(feature = "rekognition"))]
        "rekognition" | "aws" => Err(DetectionError::Config {
            message: "Rekognition support not compiled. Rebuild with --features rekognition"
                .to_string(),
        }),
        "fixture" => {
            let path = std::env::var("PPE_FIXTURE_PATH").map_err(|_| DetectionError::Config {
                message: "PPE_FIXTURE_PATH environment variable not set".to_string(),
            })?;
            let detector = fixture::StaticDetector::from_json_file(std::path::Path::new(&path))?;
            log::warn!("Using fixture detector from {path}; results are canned");
            Ok(Box::new(detector))
        }
        other => Err(DetectionError::Config {
            message: format!("Unknown PPE detector: {other}. Use 'rekognition' or 'fixture'."),
        }),
    }
}
