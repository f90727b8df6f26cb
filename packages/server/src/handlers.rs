//! HTTP handler functions for the PPE vision API.

use actix_multipart::{Field, Multipart};
use actix_web::{HttpResponse, web};
use futures::TryStreamExt as _;
use ppe_vision_analysis::AnalysisError;
use ppe_vision_analysis::upload::{
    DEFAULT_CONFIDENCE, MAX_CONFIDENCE, MAX_FILE_SIZE, MAX_PERSONS, MIN_CONFIDENCE,
    SUPPORTED_FORMATS, UploadedFile, normalize_threshold,
};
use ppe_vision_server_models::{ApiConfig, ApiHealth, ApiResponse, CleanupData, DetectData};

use crate::{ApiError, AppState};

/// Longest accepted value for a non-file form field.
const MAX_TEXT_FIELD: usize = 64;

/// Parsed `POST /detect` form.
#[derive(Debug, Default)]
struct DetectForm {
    image: Option<ImagePart>,
    confidence: Option<f64>,
}

#[derive(Debug)]
struct ImagePart {
    content_type: Option<String>,
    bytes: Vec<u8>,
}

/// `POST /detect`
///
/// Accepts a multipart form with an `image` file and an optional numeric
/// `confidence` threshold, and returns one result per detected person.
pub async fn detect(
    state: web::Data<AppState>,
    payload: Multipart,
) -> Result<HttpResponse, ApiError> {
    let form = read_detect_form(payload).await?;
    let Some(image) = form.image else {
        return Err(AnalysisError::validation("No image file provided").into());
    };
    let threshold = normalize_threshold(form.confidence);

    let upload = UploadedFile::persist(
        &state.config.upload_dir,
        image.content_type.as_deref(),
        image.bytes,
    )?;
    log::debug!(
        "Received {} upload ({} bytes), threshold {threshold}",
        upload.content_type(),
        upload.bytes().len()
    );

    let analysis = state.analyzer.analyze(upload, threshold).await?;

    ppe_vision_artifacts::schedule_deletion(
        state.analyzer.registry(),
        analysis.artifacts.clone(),
        state.config.lifecycle.ttl,
    );

    let processing_time = analysis.processing_time.as_secs_f64();
    let message = format!(
        "Detected {} person(s) in {processing_time:.2}s",
        analysis.results.len()
    );
    Ok(HttpResponse::Ok().json(ApiResponse::ok(
        DetectData {
            results: analysis.results,
            processing_time,
            image_metadata: analysis.image_metadata,
            summary: analysis.summary,
        },
        message,
    )))
}

/// `GET /health`
pub async fn health() -> HttpResponse {
    HttpResponse::Ok().json(ApiHealth::ok())
}

/// `GET /config`
///
/// Returns the static capability descriptor.
pub async fn config() -> HttpResponse {
    HttpResponse::Ok().json(ApiConfig {
        supported_formats: SUPPORTED_FORMATS.iter().map(ToString::to_string).collect(),
        max_file_size: MAX_FILE_SIZE,
        max_persons: MAX_PERSONS,
        min_confidence: MIN_CONFIDENCE,
        max_confidence: MAX_CONFIDENCE,
        default_confidence: DEFAULT_CONFIDENCE,
    })
}

/// `POST /cleanup`
///
/// Deletes every generated artifact immediately.
pub async fn cleanup(state: web::Data<AppState>) -> HttpResponse {
    let deleted = state.analyzer.registry().sweep_all();
    log::info!("Manual cleanup removed {deleted} artifact(s)");
    HttpResponse::Ok().json(ApiResponse::ok(
        CleanupData { deleted },
        format!("Removed {deleted} artifact(s)"),
    ))
}

async fn read_detect_form(mut payload: Multipart) -> Result<DetectForm, AnalysisError> {
    let mut form = DetectForm::default();

    while let Some(mut field) = payload.try_next().await.map_err(malformed)? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "image" | "file" => {
                let content_type = field.content_type().map(|m| m.essence_str().to_string());
                let bytes = read_field(&mut field, MAX_FILE_SIZE).await?;
                form.image = Some(ImagePart {
                    content_type,
                    bytes,
                });
            }
            "confidence" => {
                let raw = read_field(&mut field, MAX_TEXT_FIELD).await?;
                form.confidence = parse_confidence(&raw)?;
            }
            _ => while field.try_next().await.map_err(malformed)?.is_some() {},
        }
    }

    Ok(form)
}

/// Reads a field body, stopping once it exceeds `limit` bytes. The caller
/// rejects oversized values.
async fn read_field(field: &mut Field, limit: usize) -> Result<Vec<u8>, AnalysisError> {
    let mut bytes = Vec::new();
    while let Some(chunk) = field.try_next().await.map_err(malformed)? {
        bytes.extend_from_slice(&chunk);
        if bytes.len() > limit {
            break;
        }
    }
    Ok(bytes)
}

fn parse_confidence(raw: &[u8]) -> Result<Option<f64>, AnalysisError> {
    let text = std::str::from_utf8(raw)
        .map_err(|_| AnalysisError::validation("Confidence must be a number"))?
        .trim();
    if text.is_empty() {
        return Ok(None);
    }
    text.parse::<f64>()
        .map(Some)
        .map_err(|_| AnalysisError::validation(format!("Confidence must be a number, got {text}")))
}

fn malformed(e: actix_multipart::MultipartError) -> AnalysisError {
    AnalysisError::validation(format!("Malformed upload: {e}"))
}
