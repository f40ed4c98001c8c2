pub mod device_auth;
pub mod devices;
pub mod health;
pub mod suspicious;

use axum::http::StatusCode;
use serde::Serialize;
use telecare_auth::DeviceAuthError;

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

impl ErrorResponse {
    pub fn new(error: &str, message: &str) -> Self {
        Self {
            error: error.to_string(),
            message: message.to_string(),
        }
    }
}

/// Status/code mapping for the JSON endpoints. The HTML endpoints never use
/// this; they answer 200 with a rendered page no matter what.
pub fn map_auth_error(err: &DeviceAuthError) -> (StatusCode, &'static str) {
    match err {
        DeviceAuthError::MissingParameters => (StatusCode::BAD_REQUEST, "missing_parameters"),
        DeviceAuthError::InvalidLink => (StatusCode::BAD_REQUEST, "invalid_link"),
        DeviceAuthError::NotFound => (StatusCode::NOT_FOUND, "not_found"),
        DeviceAuthError::AlreadyProcessed { .. } => (StatusCode::CONFLICT, "already_processed"),
        DeviceAuthError::Expired => (StatusCode::GONE, "expired"),
        DeviceAuthError::Dispatch(_) => (StatusCode::INTERNAL_SERVER_ERROR, "dispatch_failed"),
        DeviceAuthError::Database(_) | DeviceAuthError::Internal(_) => {
            (StatusCode::INTERNAL_SERVER_ERROR, "internal_error")
        }
    }
}
