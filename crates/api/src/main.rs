// TeleCare device-auth API server
// Login approval, device trust, and suspicious-login verification.

mod config;
mod handlers;
mod routes;

use anyhow::Context;
use config::Config;
use dotenvy::dotenv;
use std::sync::Arc;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

pub struct AppState {
    pub approval_service: telecare_auth::LoginApprovalService,
    pub trust_service: telecare_auth::DeviceTrustService,
    pub suspicious_service: telecare_auth::SuspiciousLoginService,
    /// Where the "back to sign in" links on the result pages point.
    pub login_url: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            std::env::var("RUST_LOG")
                .unwrap_or_else(|_| "info,telecare_api=debug,tower_http=debug".to_string()),
        )
        .init();

    tracing::info!("Starting TeleCare device-auth API");
    tracing::info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let config = Config::from_env();
    tracing::info!("Server: {}:{}", config.server_host, config.server_port);
    tracing::info!("Base URL: {}", config.base_url);

    let database = telecare_database::Database::new(config.database.clone())
        .await
        .context("Failed to connect to database")?;
    database.ping().await.context("Database ping failed")?;
    tracing::info!("Database connected");

    let email_service = match std::env::var("EMAIL_PROVIDER").as_deref() {
        Ok("disabled") => {
            tracing::warn!("Email delivery disabled, approval emails will not be sent");
            None
        }
        _ => Some(
            telecare_auth::EmailService::from_env()
                .context("Failed to initialize email service")?,
        ),
    };
    tracing::info!("Email service initialized");

    let approval_service = telecare_auth::LoginApprovalService::new(
        &database,
        email_service,
        config.base_url.clone(),
    );
    let trust_service = telecare_auth::DeviceTrustService::new(&database);
    let suspicious_service = telecare_auth::SuspiciousLoginService::new(&database);
    tracing::info!("Device-auth services initialized");

    let state = Arc::new(AppState {
        approval_service,
        trust_service,
        suspicious_service,
        login_url: format!("{}/login", config.base_url.trim_end_matches('/')),
    });

    let app = routes::create_router(state)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http());

    tracing::info!("Routes configured:");
    tracing::info!("   GET  /health");
    tracing::info!("   POST /device-auth/login-requests");
    tracing::info!("   POST /device-auth/send-approval-email");
    tracing::info!("   GET  /device-auth/approve-login");
    tracing::info!("   GET  /device-auth/deny-login");
    tracing::info!("   GET  /device-auth/requests");
    tracing::info!("   GET  /device-auth/trust");

    let addr = format!("{}:{}", config.server_host, config.server_port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    tracing::info!("Server ready at http://{}", addr);

    axum::serve(listener, app).await.context("Server error")?;

    Ok(())
}
