//! Device-management endpoints backing the trusted-device list in account
//! settings.

use crate::handlers::{map_auth_error, ErrorResponse};
use crate::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;
use std::sync::Arc;
use telecare_models::DeviceSummary;
use tracing::error;
use uuid::Uuid;

#[derive(Debug, Serialize)]
pub struct DeviceListResponse {
    pub devices: Vec<DeviceSummary>,
}

/// GET /api/users/:user_id/devices (trusted devices only).
pub async fn list_trusted_devices(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<Uuid>,
) -> Result<Json<DeviceListResponse>, (StatusCode, Json<ErrorResponse>)> {
    let devices = state
        .trust_service
        .get_trusted_devices(user_id)
        .await
        .map_err(|e| {
            error!("Failed to list trusted devices: {}", e);
            let (status, code) = map_auth_error(&e);
            (status, Json(ErrorResponse::new(code, &e.to_string())))
        })?;

    Ok(Json(DeviceListResponse {
        devices: devices.iter().map(DeviceSummary::from).collect(),
    }))
}

#[derive(Debug, Serialize)]
pub struct RemoveDeviceResponse {
    pub success: bool,
}

/// DELETE /api/users/:user_id/devices/:device_id. Idempotent: removing an
/// unknown device still succeeds.
pub async fn remove_trusted_device(
    State(state): State<Arc<AppState>>,
    Path((user_id, device_id)): Path<(Uuid, String)>,
) -> Result<Json<RemoveDeviceResponse>, (StatusCode, Json<ErrorResponse>)> {
    state
        .trust_service
        .remove_trusted_device(user_id, &device_id)
        .await
        .map_err(|e| {
            error!("Failed to remove trusted device: {}", e);
            let (status, code) = map_auth_error(&e);
            (status, Json(ErrorResponse::new(code, &e.to_string())))
        })?;

    Ok(Json(RemoveDeviceResponse { success: true }))
}
