use crate::handlers;
use crate::AppState;
use axum::{
    routing::{delete, get, post},
    Router,
};
use std::sync::Arc;

pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        // Health check
        .route("/health", get(handlers::health::health_check))
        // Login-approval handshake
        .route(
            "/device-auth/login-requests",
            post(handlers::device_auth::create_login_request),
        )
        .route(
            "/device-auth/send-approval-email",
            post(handlers::device_auth::send_approval_email),
        )
        // Emailed-link endpoints: HTML pages, authenticated only by the link
        .route(
            "/device-auth/approve-login",
            get(handlers::device_auth::approve_login),
        )
        .route(
            "/device-auth/deny-login",
            get(handlers::device_auth::deny_login),
        )
        // Read-only poller endpoints
        .route(
            "/device-auth/requests",
            get(handlers::device_auth::get_login_request),
        )
        .route("/device-auth/trust", get(handlers::device_auth::check_trust))
        // Device management
        .route(
            "/api/users/:user_id/devices",
            get(handlers::devices::list_trusted_devices),
        )
        .route(
            "/api/users/:user_id/devices/:device_id",
            delete(handlers::devices::remove_trusted_device),
        )
        // Suspicious-login verification
        .route(
            "/api/suspicious-logins",
            post(handlers::suspicious::report_suspicious_login),
        )
        .route(
            "/api/suspicious-logins/latest",
            get(handlers::suspicious::latest_unverified),
        )
        .route(
            "/api/suspicious-logins/:id/confirm",
            post(handlers::suspicious::confirm_suspicious_login),
        )
        .route(
            "/api/suspicious-logins/:id/reject",
            post(handlers::suspicious::reject_suspicious_login),
        )
        .with_state(state)
}
