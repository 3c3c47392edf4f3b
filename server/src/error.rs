use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use tts_core::SynthesisError;

/// API Error types
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("TTS error: {0}")]
    TtsError(#[from] SynthesisError),
}

/// Error response structure
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    code: u16,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            ApiError::InvalidInput(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::TtsError(e) => {
                let status = match &e {
                    SynthesisError::InvalidInput(_) | SynthesisError::UnknownVoice(_) => {
                        StatusCode::BAD_REQUEST
                    }
                    SynthesisError::Unavailable(_) | SynthesisError::ResourceExhausted(_) => {
                        StatusCode::SERVICE_UNAVAILABLE
                    }
                    SynthesisError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
                    SynthesisError::Encoding(_) | SynthesisError::Engine(_) => {
                        StatusCode::INTERNAL_SERVER_ERROR
                    }
                };
                if status.is_server_error() {
                    tracing::error!("TTS error: {}", e);
                }
                (status, format!("TTS error: {}", e))
            }
        };

        let body = Json(ErrorResponse {
            error: error_message,
            code: status.as_u16(),
        });

        (status, body).into_response()
    }
}
