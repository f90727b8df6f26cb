//! Mapping of pipeline failures to HTTP responses.

use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use ppe_vision_analysis::AnalysisError;
use ppe_vision_server_models::ErrorResponse;
use thiserror::Error;

/// A failed request, rendered as an [`ErrorResponse`].
#[derive(Debug, Error)]
#[error(transparent)]
pub struct ApiError(#[from] pub AnalysisError);

impl ApiError {
    /// Machine-readable error kind for the response body.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match &self.0 {
            AnalysisError::Validation { .. } => "validation_error",
            AnalysisError::ExternalService(_) => "external_service_error",
            AnalysisError::Internal { .. } => "internal_error",
        }
    }

    fn public_message(&self) -> String {
        match &self.0 {
            AnalysisError::Validation { message } => message.clone(),
            AnalysisError::ExternalService(_) => {
                "The PPE detection service failed. Please try again later.".to_string()
            }
            AnalysisError::Internal { .. } => {
                "An unexpected error occurred while processing the image.".to_string()
            }
        }
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match &self.0 {
            AnalysisError::Validation { .. } => StatusCode::BAD_REQUEST,
            AnalysisError::ExternalService(_) => StatusCode::BAD_GATEWAY,
            AnalysisError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        match &self.0 {
            AnalysisError::Validation { .. } => log::info!("Rejected request: {}", self.0),
            _ => log::error!("Request failed: {}", self.0),
        }
        HttpResponse::build(self.status_code())
            .json(ErrorResponse::new(self.kind(), self.public_message()))
    }
}

#[cfg(test)]
mod tests {
    use ppe_vision_detection::DetectionError;

    use super::*;

    #[test]
    fn statuses_by_kind() {
        let validation = ApiError(AnalysisError::validation("bad"));
        let external = ApiError(AnalysisError::ExternalService(DetectionError::Service {
            message: "throttled".to_string(),
        }));
        let internal = ApiError(AnalysisError::internal("/srv/data/x.jpg: disk full"));

        assert_eq!(validation.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(external.status_code(), StatusCode::BAD_GATEWAY);
        assert_eq!(internal.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(external.kind(), "external_service_error");
        assert_eq!(internal.kind(), "internal_error");
    }

    #[test]
    fn internal_details_are_not_exposed() {
        let internal = ApiError(AnalysisError::internal("/srv/data/x.jpg: disk full"));
        assert!(!internal.public_message().contains("/srv"));
    }
}
