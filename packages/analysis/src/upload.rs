//! Upload validation and the transient copy of an uploaded image.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::AnalysisError;

/// MIME types accepted for upload.
pub const SUPPORTED_MIME_TYPES: &[&str] = &["image/jpeg", "image/png"];

/// Format names reported by the capability descriptor.
pub const SUPPORTED_FORMATS: &[&str] = &["jpeg", "png"];

/// Largest accepted upload. The detector accepts at most 5 MB inline.
pub const MAX_FILE_SIZE: usize = 5 * 1024 * 1024;

/// Most persons reported per image.
pub const MAX_PERSONS: usize = 15;

/// Lowest threshold offered by the UI.
pub const MIN_CONFIDENCE: f64 = 50.0;

/// Highest threshold offered by the UI.
pub const MAX_CONFIDENCE: f64 = 95.0;

/// Threshold used when the request does not give one.
pub const DEFAULT_CONFIDENCE: f64 = 80.0;

/// Checks an upload's declared type and size.
///
/// # Errors
///
/// Returns [`AnalysisError::Validation`] if the MIME type is missing or
/// unsupported, or the body is empty or too large.
pub fn validate(content_type: Option<&str>, size: usize) -> Result<(), AnalysisError> {
    let Some(content_type) = content_type else {
        return Err(AnalysisError::validation("Missing image content type"));
    };
    if !SUPPORTED_MIME_TYPES.contains(&content_type.to_ascii_lowercase().as_str()) {
        return Err(AnalysisError::validation(format!(
            "Unsupported file type {content_type}. Upload a JPEG or PNG image."
        )));
    }
    if size == 0 {
        return Err(AnalysisError::validation("Uploaded file is empty"));
    }
    if size > MAX_FILE_SIZE {
        return Err(AnalysisError::validation(format!(
            "File too large ({size} bytes). Maximum is {MAX_FILE_SIZE} bytes."
        )));
    }
    Ok(())
}

/// Normalizes a requested threshold.
///
/// The UI range is advisory: any finite value is accepted and clamped to
/// 0-100. Missing or non-finite values fall back to
/// [`DEFAULT_CONFIDENCE`].
#[must_use]
pub fn normalize_threshold(threshold: Option<f64>) -> f64 {
    threshold
        .filter(|t| t.is_finite())
        .map_or(DEFAULT_CONFIDENCE, |t| t.clamp(0.0, 100.0))
}

/// An uploaded image held on disk for the duration of one request.
///
/// The file is removed by [`UploadedFile::remove`] or, on any other exit
/// path, when the value is dropped.
pub struct UploadedFile {
    path: PathBuf,
    bytes: Arc<[u8]>,
    content_type: String,
    removed: bool,
}

impl UploadedFile {
    /// Validates an upload and writes it under `dir` with a unique name.
    ///
    /// Nothing is written if validation fails.
    ///
    /// # Errors
    ///
    /// Returns [`AnalysisError::Validation`] for a rejected upload and
    /// [`AnalysisError::Internal`] if the file cannot be written.
    pub fn persist(
        dir: &Path,
        content_type: Option<&str>,
        bytes: Vec<u8>,
    ) -> Result<Self, AnalysisError> {
        validate(content_type, bytes.len())?;
        let content_type = content_type.unwrap_or_default().to_ascii_lowercase();
        let extension = if content_type == "image/png" { "png" } else { "jpg" };

        std::fs::create_dir_all(dir).map_err(AnalysisError::internal)?;
        let path = dir.join(format!("upload_{}.{extension}", uuid::Uuid::new_v4().simple()));
        std::fs::write(&path, &bytes).map_err(AnalysisError::internal)?;

        Ok(Self {
            path,
            bytes: bytes.into(),
            content_type,
            removed: false,
        })
    }

    /// Location of the transient copy.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Uploaded bytes.
    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Uploaded bytes as a shared buffer, for handing to worker threads.
    #[must_use]
    pub fn shared_bytes(&self) -> Arc<[u8]> {
        Arc::clone(&self.bytes)
    }

    /// Declared MIME type, lower-cased.
    #[must_use]
    pub fn content_type(&self) -> &str {
        &self.content_type
    }

    /// Deletes the transient copy now. Safe to call more than once.
    pub fn remove(&mut self) {
        if self.removed {
            return;
        }
        self.removed = true;
        match std::fs::remove_file(&self.path) {
            Ok(()) => log::debug!("Removed upload {}", self.path.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => log::warn!("Failed to remove upload {}: {e}", self.path.display()),
        }
    }
}

impl Drop for UploadedFile {
    fn drop(&mut self) {
        self.remove();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_dir() -> PathBuf {
        std::env::temp_dir().join(format!("ppe_uploads_{}", uuid::Uuid::new_v4().simple()))
    }

    #[test]
    fn rejects_wrong_mime_type() {
        let err = validate(Some("application/pdf"), 10).unwrap_err();
        assert!(matches!(err, AnalysisError::Validation { .. }));
        assert!(validate(None, 10).is_err());
        assert!(validate(Some("IMAGE/PNG"), 10).is_ok());
    }

    #[test]
    fn rejects_empty_and_oversized() {
        assert!(validate(Some("image/jpeg"), 0).is_err());
        assert!(validate(Some("image/jpeg"), MAX_FILE_SIZE).is_ok());
        assert!(validate(Some("image/jpeg"), MAX_FILE_SIZE + 1).is_err());
    }

    #[test]
    fn normalizes_thresholds() {
        assert!((normalize_threshold(None) - 80.0).abs() < f64::EPSILON);
        assert!((normalize_threshold(Some(f64::NAN)) - 80.0).abs() < f64::EPSILON);
        assert!((normalize_threshold(Some(30.0)) - 30.0).abs() < f64::EPSILON);
        assert!((normalize_threshold(Some(250.0)) - 100.0).abs() < f64::EPSILON);
    }

    #[test]
    fn upload_is_removed_on_drop() {
        let dir = temp_dir();
        let upload = UploadedFile::persist(&dir, Some("image/png"), vec![1, 2, 3]).unwrap();
        let path = upload.path().to_path_buf();
        assert!(path.exists());
        assert!(path.extension().is_some_and(|e| e == "png"));

        drop(upload);

        assert!(!path.exists());
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn explicit_remove_is_idempotent() {
        let dir = temp_dir();
        let mut upload = UploadedFile::persist(&dir, Some("image/jpeg"), vec![1]).unwrap();
        upload.remove();
        upload.remove();
        assert!(!upload.path().exists());
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn invalid_upload_writes_nothing() {
        let dir = temp_dir();
        assert!(UploadedFile::persist(&dir, Some("text/plain"), vec![1]).is_err());
        assert!(!dir.exists());
    }
}
