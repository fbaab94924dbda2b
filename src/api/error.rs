use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::error::ForecastError;

/// Body returned for any failure inside the model
pub const PREDICTION_FAILED: &str = "Something went wrong. Check logs.";

/// API error types that can be returned from handlers
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Prediction failed: {0}")]
    PredictionFailed(#[from] ForecastError),
}

/// Error response that gets serialized to JSON
#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
}

impl ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::ValidationError(_) => StatusCode::BAD_REQUEST,
            ApiError::PredictionFailed(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        let body = match &self {
            ApiError::ValidationError(message) => {
                tracing::debug!(error = %self, "Client error");
                ErrorResponse {
                    error: "ValidationError".to_string(),
                    message: Some(message.clone()),
                }
            }
            ApiError::PredictionFailed(_) => {
                tracing::error!(error = %self, "API error occurred");
                ErrorResponse {
                    error: PREDICTION_FAILED.to_string(),
                    message: None,
                }
            }
        };

        (status, Json(body)).into_response()
    }
}

impl From<validator::ValidationErrors> for ApiError {
    fn from(errors: validator::ValidationErrors) -> Self {
        ApiError::ValidationError(errors.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_status_codes() {
        assert_eq!(
            ApiError::ValidationError("test".to_string()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::from(ForecastError::NotTrained).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_error_display() {
        let error = ApiError::ValidationError("hourOfDay out of range".to_string());
        assert_eq!(error.to_string(), "Validation error: hourOfDay out of range");
    }

    #[test]
    fn test_prediction_body_hides_cause() {
        let body = ErrorResponse {
            error: PREDICTION_FAILED.to_string(),
            message: None,
        };
        assert_eq!(
            serde_json::to_value(&body).unwrap(),
            serde_json::json!({"error": "Something went wrong. Check logs."})
        );
    }
}
