//! Static fixture provider.
//!
//! Answers every request with the same canned persons. Used for offline
//! runs (`PPE_DETECTOR=fixture`) and as the detector in tests.

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};

use ppe_vision_models::Person;

use crate::{DetectionError, DetectionRequest, PpeDetector};

/// Detector that returns canned persons, or a canned failure.
pub struct StaticDetector {
    outcome: Result<Vec<Person>, String>,
    calls: AtomicUsize,
}

impl StaticDetector {
    /// Creates a detector that always returns `persons`.
    #[must_use]
    pub const fn new(persons: Vec<Person>) -> Self {
        Self {
            outcome: Ok(persons),
            calls: AtomicUsize::new(0),
        }
    }

    /// Creates a detector whose every call fails with
    /// [`DetectionError::Service`].
    #[must_use]
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            outcome: Err(message.into()),
            calls: AtomicUsize::new(0),
        }
    }

    /// Loads canned persons from a JSON array of [`Person`] records.
    ///
    /// # Errors
    ///
    /// Returns [`DetectionError::Config`] if the file cannot be read or
    /// parsed.
    pub fn from_json_file(path: &Path) -> Result<Self, DetectionError> {
        let text = std::fs::read_to_string(path).map_err(|e| DetectionError::Config {
            message: format!("Failed to read fixture {}: {e}", path.display()),
        })?;
        let persons: Vec<Person> =
            serde_json::from_str(&text).map_err(|e| DetectionError::Config {
                message: format!("Failed to parse fixture {}: {e}", path.display()),
            })?;
        Ok(Self::new(persons))
    }

    /// Number of `detect` calls served so far.
    #[must_use]
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl PpeDetector for StaticDetector {
    async fn detect(&self, request: &DetectionRequest<'_>) -> Result<Vec<Person>, DetectionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        log::debug!(
            "Fixture detect: {} bytes, min_confidence={}",
            request.image.len(),
            request.min_confidence
        );

        match &self.outcome {
            Ok(persons) => Ok(persons.clone()),
            Err(message) => Err(DetectionError::Service {
                message: message.clone(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use ppe_vision_models::{BodyPart, BodyPartName, BoundingBox};

    use super::*;

    fn person(id: i32) -> Person {
        Person {
            id,
            confidence: 99.0,
            bounding_box: BoundingBox::new(0.1, 0.1, 0.5, 0.5),
            body_parts: vec![BodyPart {
                name: BodyPartName::Head,
                confidence: 98.0,
                equipment_detections: Vec::new(),
            }],
        }
    }

    #[tokio::test]
    async fn returns_canned_persons_and_counts_calls() {
        let detector = StaticDetector::new(vec![person(0), person(1)]);
        let request = DetectionRequest::new(b"img", 80.0);

        let first = detector.detect(&request).await.unwrap();
        let second = detector.detect(&request).await.unwrap();

        assert_eq!(first.len(), 2);
        assert_eq!(first, second);
        assert_eq!(detector.calls(), 2);
    }

    #[tokio::test]
    async fn failing_detector_reports_service_error() {
        let detector = StaticDetector::failing("quota exceeded");
        let err = detector
            .detect(&DetectionRequest::new(b"img", 80.0))
            .await
            .unwrap_err();

        assert!(matches!(err, DetectionError::Service { .. }));
        assert!(err.to_string().contains("quota exceeded"));
        assert_eq!(detector.calls(), 1);
    }

    #[test]
    fn loads_persons_from_json_file() {
        let path = std::env::temp_dir().join(format!(
            "ppe_fixture_test_{}.json",
            std::process::id()
        ));
        std::fs::write(&path, serde_json::to_string(&vec![person(7)]).unwrap()).unwrap();

        let detector = StaticDetector::from_json_file(&path).unwrap();
        let _ = std::fs::remove_file(&path);

        match &detector.outcome {
            Ok(persons) => assert_eq!(persons[0].id, 7),
            Err(e) => panic!("unexpected failure outcome: {e}"),
        }
    }

    #[test]
    fn missing_fixture_is_config_error() {
        let result = StaticDetector::from_json_file(Path::new("/nonexistent/fixture.json"));
        assert!(matches!(result, Err(DetectionError::Config { .. })));
    }
}
