//! The login-approval HTTP surface.
//!
//! The approve/deny endpoints are reached by clicking the emailed links and
//! carry no authentication beyond the link's identifiers and secret token:
//! the approver is assumed to be the account owner because only they received
//! the email. Both always answer 200 with a complete styled page (errors are
//! rendered, not status-coded), and both tolerate double invocation from
//! browser prefetchers and email link-scanner bots.

use crate::handlers::{map_auth_error, ErrorResponse};
use crate::AppState;
use askama::Template;
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::Html,
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use telecare_auth::DeviceAuthError;
use telecare_models::{CreateLoginRequest, DeviceMetadata, DeviceTrust, LoginRequest};
use tracing::{error, info, warn};
use uuid::Uuid;
use validator::Validate;

#[derive(Template)]
#[template(path = "approval_result.html")]
struct ApprovalResultTemplate {
    title: String,
    heading: String,
    message: String,
    success: bool,
    login_url: String,
}

fn render_page(template: ApprovalResultTemplate) -> Html<String> {
    Html(template.render().unwrap_or_else(|e| {
        error!("Template render error: {}", e);
        "Error rendering page".to_string()
    }))
}

fn render_failure(err: &DeviceAuthError, login_url: &str) -> Html<String> {
    let (heading, message) = match err {
        DeviceAuthError::MissingParameters => (
            "Invalid link",
            "This link is missing required information. Use the buttons in the most recent approval email.".to_string(),
        ),
        DeviceAuthError::InvalidLink => (
            "Invalid link",
            "This approval link is not valid. Use the most recent email, or start a new sign-in on the device.".to_string(),
        ),
        DeviceAuthError::NotFound => (
            "Request not found",
            "We couldn't find this login request. It may have been replaced by a newer sign-in attempt.".to_string(),
        ),
        DeviceAuthError::AlreadyProcessed { .. } => (
            "Already handled",
            format!("{}. No further action is needed.", err),
        ),
        DeviceAuthError::Expired => (
            "Link expired",
            "This login request has expired. Start a new sign-in on the device to get a fresh email.".to_string(),
        ),
        _ => (
            "Something went wrong",
            "We couldn't process this request. Please try again in a moment.".to_string(),
        ),
    };

    render_page(ApprovalResultTemplate {
        title: format!("{} - TeleCare", heading),
        heading: heading.to_string(),
        message,
        success: false,
        login_url: login_url.to_string(),
    })
}

// ============================================================================
// Emailed-link endpoints (HTML)
// ============================================================================

/// All-optional so malformed links still get a rendered page instead of an
/// extractor rejection.
#[derive(Debug, Deserialize)]
pub struct ApproveLoginQuery {
    pub uid: Option<String>,
    #[serde(rename = "deviceId")]
    pub device_id: Option<String>,
    #[serde(rename = "requestId")]
    pub request_id: Option<String>,
    pub token: Option<String>,
}

/// GET /device-auth/approve-login?uid&deviceId&requestId&token
pub async fn approve_login(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ApproveLoginQuery>,
) -> Html<String> {
    let (uid, device_id, request_id, token) = match (
        params.uid,
        params.device_id,
        params.request_id,
        params.token,
    ) {
        (Some(uid), Some(device_id), Some(request_id), Some(token)) => {
            (uid, device_id, request_id, token)
        }
        _ => {
            warn!("Approve link hit with missing parameters");
            return render_failure(&DeviceAuthError::MissingParameters, &state.login_url);
        }
    };

    let user_id: Uuid = match uid.parse() {
        Ok(user_id) => user_id,
        Err(_) => {
            warn!("Approve link hit with malformed uid");
            return render_failure(&DeviceAuthError::InvalidLink, &state.login_url);
        }
    };

    match state
        .approval_service
        .approve_login_request(&request_id, &token, user_id, &device_id)
        .await
    {
        Ok(request) => {
            info!(request_id = %request.id, "Device approved via emailed link");
            render_page(ApprovalResultTemplate {
                title: "Device approved - TeleCare".to_string(),
                heading: "Device approved".to_string(),
                message: format!(
                    "{} can now sign in to your account. The waiting device will continue automatically.",
                    request.device_metadata.display_name()
                ),
                success: true,
                login_url: state.login_url.clone(),
            })
        }
        Err(err) => {
            warn!(request_id = %request_id, "Approve attempt failed: {}", err);
            render_failure(&err, &state.login_url)
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct DenyLoginQuery {
    #[serde(rename = "requestId")]
    pub request_id: Option<String>,
    pub token: Option<String>,
}

/// GET /device-auth/deny-login?requestId&token
///
/// Denial records the refusal in the ledger; it does not revoke any session
/// (none was granted; the device never got in) and the page copy says so.
pub async fn deny_login(
    State(state): State<Arc<AppState>>,
    Query(params): Query<DenyLoginQuery>,
) -> Html<String> {
    let (request_id, token) = match (params.request_id, params.token) {
        (Some(request_id), Some(token)) => (request_id, token),
        _ => {
            warn!("Deny link hit with missing parameters");
            return render_failure(&DeviceAuthError::MissingParameters, &state.login_url);
        }
    };

    match state
        .approval_service
        .deny_login_request(&request_id, &token)
        .await
    {
        Ok(request) => {
            info!(request_id = %request.id, "Sign-in denied via emailed link");
            render_page(ApprovalResultTemplate {
                title: "Sign-in denied - TeleCare".to_string(),
                heading: "Sign-in denied".to_string(),
                message: "The sign-in attempt was blocked and the device was not trusted. \
                          If you didn't expect this email, consider changing your password."
                    .to_string(),
                success: true,
                login_url: state.login_url.clone(),
            })
        }
        Err(err) => {
            warn!(request_id = %request_id, "Deny attempt failed: {}", err);
            render_failure(&err, &state.login_url)
        }
    }
}

// ============================================================================
// JSON endpoints
// ============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateLoginResponse {
    pub success: bool,
    pub request_id: String,
    pub created: bool,
}

/// POST /device-auth/login-requests
pub async fn create_login_request(
    State(state): State<Arc<AppState>>,
    Json(body): Json<CreateLoginRequest>,
) -> Result<Json<CreateLoginResponse>, (StatusCode, Json<ErrorResponse>)> {
    body.validate().map_err(|e| {
        (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse::new("invalid_request", &e.to_string())),
        )
    })?;

    let outcome = state
        .approval_service
        .create_login_request(&body)
        .await
        .map_err(|e| {
            error!("Failed to create login request: {}", e);
            let (status, code) = map_auth_error(&e);
            (status, Json(ErrorResponse::new(code, &e.to_string())))
        })?;

    Ok(Json(CreateLoginResponse {
        success: true,
        request_id: outcome.request_id,
        created: outcome.created,
    }))
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SendApprovalEmailRequest {
    pub user_id: Uuid,

    #[validate(email)]
    pub email: String,

    #[validate(length(min = 1))]
    pub device_id: String,

    #[validate(length(min = 1))]
    pub request_id: String,

    #[serde(default)]
    #[allow(dead_code)]
    pub device_metadata: DeviceMetadata,

    pub ip_address: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SendApprovalEmailResponse {
    pub success: bool,
    pub message: String,
}

/// POST /device-auth/send-approval-email
///
/// The body carries the caller's view of the handshake; it must match the
/// stored request. The link token itself is generated server-side and only
/// ever leaves through the email.
pub async fn send_approval_email(
    State(state): State<Arc<AppState>>,
    Json(body): Json<SendApprovalEmailRequest>,
) -> Result<Json<SendApprovalEmailResponse>, (StatusCode, Json<SendApprovalEmailResponse>)> {
    let fail = |status: StatusCode, message: String| {
        (
            status,
            Json(SendApprovalEmailResponse {
                success: false,
                message,
            }),
        )
    };

    body.validate()
        .map_err(|e| fail(StatusCode::BAD_REQUEST, e.to_string()))?;

    let request = state
        .approval_service
        .get_login_request(&body.request_id)
        .await
        .map_err(|e| {
            error!("Failed to load login request: {}", e);
            fail(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        })?
        .ok_or_else(|| fail(StatusCode::NOT_FOUND, "Login request not found".to_string()))?;

    if request.user_id != body.user_id
        || request.device_id != body.device_id
        || request.email != body.email
    {
        return Err(fail(
            StatusCode::BAD_REQUEST,
            "Request does not match the supplied identifiers".to_string(),
        ));
    }

    state
        .approval_service
        .send_approval_email(&body.request_id)
        .await
        .map_err(|e| {
            warn!(request_id = %body.request_id, "Approval email dispatch failed: {}", e);
            let (status, _) = map_auth_error(&e);
            fail(status, e.to_string())
        })?;

    Ok(Json(SendApprovalEmailResponse {
        success: true,
        message: "Approval email sent".to_string(),
    }))
}

#[derive(Debug, Deserialize)]
pub struct StatusQuery {
    #[serde(rename = "userId")]
    pub user_id: Uuid,
    #[serde(rename = "deviceId")]
    pub device_id: String,
}

#[derive(Debug, Serialize)]
pub struct RequestStatusResponse {
    pub request: Option<LoginRequest>,
}

/// GET /device-auth/requests?userId&deviceId
///
/// Raw poller read: terminal and expired-pending requests come back verbatim
/// so the waiting room can observe the outcome and apply expiry itself.
pub async fn get_login_request(
    State(state): State<Arc<AppState>>,
    Query(query): Query<StatusQuery>,
) -> Result<Json<RequestStatusResponse>, (StatusCode, Json<ErrorResponse>)> {
    let request = state
        .approval_service
        .find_login_request(query.user_id, &query.device_id)
        .await
        .map_err(|e| {
            error!("Failed to read login request: {}", e);
            let (status, code) = map_auth_error(&e);
            (status, Json(ErrorResponse::new(code, &e.to_string())))
        })?;

    Ok(Json(RequestStatusResponse { request }))
}

/// GET /device-auth/trust?userId&deviceId
pub async fn check_trust(
    State(state): State<Arc<AppState>>,
    Query(query): Query<StatusQuery>,
) -> Result<Json<DeviceTrust>, (StatusCode, Json<ErrorResponse>)> {
    let trust = state
        .trust_service
        .check_device_trust(query.user_id, &query.device_id)
        .await
        .map_err(|e| {
            error!("Failed to check device trust: {}", e);
            let (status, code) = map_auth_error(&e);
            (status, Json(ErrorResponse::new(code, &e.to_string())))
        })?;

    Ok(Json(trust))
}
