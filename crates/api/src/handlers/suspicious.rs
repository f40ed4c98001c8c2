//! Suspicious-login verification endpoints: report a flagged session, read
//! the newest unresolved record, and resolve it either way.

use crate::handlers::{map_auth_error, ErrorResponse};
use crate::AppState;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use telecare_models::{ReportSuspiciousLogin, SuspiciousLogin};
use tracing::error;
use uuid::Uuid;

#[derive(Debug, Serialize)]
pub struct SuspiciousLoginResponse {
    pub success: bool,
    pub record: SuspiciousLogin,
}

/// POST /api/suspicious-logins, called by the login service's heuristics.
pub async fn report_suspicious_login(
    State(state): State<Arc<AppState>>,
    Json(body): Json<ReportSuspiciousLogin>,
) -> Result<(StatusCode, Json<SuspiciousLoginResponse>), (StatusCode, Json<ErrorResponse>)> {
    let record = state
        .suspicious_service
        .report(&body)
        .await
        .map_err(|e| {
            error!("Failed to record suspicious login: {}", e);
            let (status, code) = map_auth_error(&e);
            (status, Json(ErrorResponse::new(code, &e.to_string())))
        })?;

    Ok((
        StatusCode::CREATED,
        Json(SuspiciousLoginResponse {
            success: true,
            record,
        }),
    ))
}

#[derive(Debug, Deserialize)]
pub struct LatestQuery {
    #[serde(rename = "userId")]
    pub user_id: Uuid,
}

#[derive(Debug, Serialize)]
pub struct LatestResponse {
    pub record: Option<SuspiciousLogin>,
}

/// GET /api/suspicious-logins/latest?userId
///
/// At most one record: the newest unverified one. Older unverified records
/// surface only after it is resolved.
pub async fn latest_unverified(
    State(state): State<Arc<AppState>>,
    Query(query): Query<LatestQuery>,
) -> Result<Json<LatestResponse>, (StatusCode, Json<ErrorResponse>)> {
    let record = state
        .suspicious_service
        .latest_unverified(query.user_id)
        .await
        .map_err(|e| {
            error!("Failed to read suspicious logins: {}", e);
            let (status, code) = map_auth_error(&e);
            (status, Json(ErrorResponse::new(code, &e.to_string())))
        })?;

    Ok(Json(LatestResponse { record }))
}

/// POST /api/suspicious-logins/:id/confirm: "this was me". The linked
/// session becomes trusted.
pub async fn confirm_suspicious_login(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<SuspiciousLoginResponse>, (StatusCode, Json<ErrorResponse>)> {
    let record = state.suspicious_service.confirm(id).await.map_err(|e| {
        let (status, code) = map_auth_error(&e);
        (status, Json(ErrorResponse::new(code, &e.to_string())))
    })?;

    Ok(Json(SuspiciousLoginResponse {
        success: true,
        record,
    }))
}

/// POST /api/suspicious-logins/:id/reject: "this wasn't me". The linked
/// session is deleted outright.
pub async fn reject_suspicious_login(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<SuspiciousLoginResponse>, (StatusCode, Json<ErrorResponse>)> {
    let record = state.suspicious_service.reject(id).await.map_err(|e| {
        let (status, code) = map_auth_error(&e);
        (status, Json(ErrorResponse::new(code, &e.to_string())))
    })?;

    Ok(Json(SuspiciousLoginResponse {
        success: true,
        record,
    }))
}
