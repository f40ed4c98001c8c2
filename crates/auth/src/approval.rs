//! Login-approval handshake: ledger operations plus the approval dispatcher.
//!
//! The flow: an untrusted device opens a handshake, the account owner gets an
//! email with approve/deny links (carrying a per-dispatch secret token), and
//! whichever link is clicked drives the single terminal transition. The
//! original device observes the outcome by polling.

use crate::email::{templates, EmailMessage, EmailService};
use crate::error::{DeviceAuthError, Result};
use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use sha2::{Digest, Sha256};
use telecare_database::{Database, LoginRequestRepository};
use telecare_models::{
    CreateLoginRequest, LoginRequest, LoginRequestCreated, LoginRequestStatus,
};
use uuid::Uuid;

/// Handshakes die ten minutes after creation. Expiry is lazy: nothing sweeps
/// expired rows, they are rejected when acted upon.
pub const LOGIN_REQUEST_TTL_MINUTES: i64 = 10;

const APPROVAL_TOKEN_LENGTH: usize = 48;

pub struct LoginApprovalService {
    requests: LoginRequestRepository,
    /// None disables delivery (tests, headless dev); the ledger still works.
    email_service: Option<EmailService>,
    base_url: String,
}

impl LoginApprovalService {
    pub fn new(db: &Database, email_service: Option<EmailService>, base_url: String) -> Self {
        Self {
            requests: LoginRequestRepository::new(db.pool().clone()),
            email_service,
            base_url,
        }
    }

    /// Open a handshake for an untrusted device.
    ///
    /// Re-attempts while a live pending request exists coalesce onto it:
    /// the same request id comes back and the expiry window is not extended.
    pub async fn create_login_request(
        &self,
        request: &CreateLoginRequest,
    ) -> Result<LoginRequestCreated> {
        let outcome = self
            .requests
            .upsert_pending(request, Duration::minutes(LOGIN_REQUEST_TTL_MINUTES))
            .await?;

        if outcome.created {
            tracing::info!(
                request_id = %outcome.request_id,
                user_id = %request.user_id,
                "Login request created"
            );
        } else {
            tracing::debug!(
                request_id = %outcome.request_id,
                "Coalesced onto existing pending login request"
            );
        }

        Ok(outcome)
    }

    /// Raw ledger read; expired pending rows come back unchanged. Expiry
    /// policy lives with the callers (approval endpoint, waiting-room poller).
    pub async fn get_login_request(&self, request_id: &str) -> Result<Option<LoginRequest>> {
        Ok(self.requests.find(request_id).await?)
    }

    /// The handshake for a (user, device) pair, terminal states included, so
    /// pollers can observe the outcome.
    pub async fn find_login_request(
        &self,
        user_id: Uuid,
        device_id: &str,
    ) -> Result<Option<LoginRequest>> {
        Ok(self.requests.find_by_user_device(user_id, device_id).await?)
    }

    /// Dispatch the approve/deny email for a pending handshake.
    ///
    /// Rotates the request's link token on every dispatch: the stored hash is
    /// replaced, so links from earlier emails stop working. Delivery failure
    /// surfaces as `Dispatch` and is not retried here.
    pub async fn send_approval_email(&self, request_id: &str) -> Result<()> {
        let request = self
            .requests
            .find(request_id)
            .await?
            .ok_or(DeviceAuthError::NotFound)?;

        let now = Utc::now();
        self.ensure_actionable(&request, now)?;

        let token = generate_token(APPROVAL_TOKEN_LENGTH);
        let updated = self
            .requests
            .set_token_hash(request_id, &hash_token(&token))
            .await?;
        if updated == 0 {
            // Lost a race with a terminal transition between read and write.
            return Err(self.read_terminal_error(request_id).await?);
        }

        let (approve_url, deny_url) = build_approval_links(&self.base_url, &request, &token);
        let (text_body, html_body) = templates::login_approval(
            &request.device_metadata.display_name(),
            request.ip_address.as_deref().unwrap_or("unknown"),
            &approve_url,
            &deny_url,
            &request.expires_at,
        );

        if let Some(ref email_service) = self.email_service {
            email_service
                .send(EmailMessage {
                    to: request.email.clone(),
                    to_name: None,
                    subject: "Approve sign-in from a new device".to_string(),
                    text_body,
                    html_body: Some(html_body),
                })
                .await?;
        } else {
            tracing::warn!(request_id, "Email delivery disabled, approval email not sent");
        }

        tracing::info!(request_id, email = %request.email, "Approval email dispatched");
        Ok(())
    }

    /// Terminal transition to `approved`, plus the trust grant.
    ///
    /// The storage-level conditional update serializes racing clicks: the
    /// second click fails with `AlreadyProcessed` instead of silently
    /// succeeding. An expired pending request is rejected with `Expired` and
    /// left pending in storage.
    pub async fn approve_login_request(
        &self,
        request_id: &str,
        token: &str,
        user_id: Uuid,
        device_id: &str,
    ) -> Result<LoginRequest> {
        let request = self
            .requests
            .find(request_id)
            .await?
            .ok_or(DeviceAuthError::NotFound)?;

        verify_link(&request, token, Some((user_id, device_id)))?;

        let now = Utc::now();
        self.ensure_actionable(&request, now)?;

        if !self.requests.approve(request_id, now).await? {
            return Err(self.read_terminal_error(request_id).await?);
        }

        tracing::info!(
            request_id,
            user_id = %request.user_id,
            device_id = %request.device_id,
            "Login request approved, device trusted"
        );

        self.requests
            .find(request_id)
            .await?
            .ok_or(DeviceAuthError::NotFound)
    }

    /// Terminal transition to `denied`. Never touches the device record: a
    /// denied device is simply never marked trusted.
    pub async fn deny_login_request(&self, request_id: &str, token: &str) -> Result<LoginRequest> {
        let request = self
            .requests
            .find(request_id)
            .await?
            .ok_or(DeviceAuthError::NotFound)?;

        verify_link(&request, token, None)?;

        match request.status() {
            Some(LoginRequestStatus::Pending) => {}
            Some(status) => return Err(DeviceAuthError::already(status)),
            None => {
                return Err(DeviceAuthError::Internal(format!(
                    "Invalid login request status: {}",
                    request.status
                )))
            }
        }

        if !self.requests.deny(request_id, Utc::now()).await? {
            return Err(self.read_terminal_error(request_id).await?);
        }

        tracing::info!(
            request_id,
            user_id = %request.user_id,
            device_id = %request.device_id,
            "Login request denied"
        );

        self.requests
            .find(request_id)
            .await?
            .ok_or(DeviceAuthError::NotFound)
    }

    fn ensure_actionable(&self, request: &LoginRequest, now: DateTime<Utc>) -> Result<()> {
        match request.status() {
            Some(LoginRequestStatus::Pending) => {}
            Some(status) => return Err(DeviceAuthError::already(status)),
            None => {
                return Err(DeviceAuthError::Internal(format!(
                    "Invalid login request status: {}",
                    request.status
                )))
            }
        }

        if request.is_expired(now) {
            return Err(DeviceAuthError::Expired);
        }

        Ok(())
    }

    /// After a conditional update affected no rows, re-read to name the
    /// state that won the race.
    async fn read_terminal_error(&self, request_id: &str) -> Result<DeviceAuthError> {
        let request = match self.requests.find(request_id).await? {
            Some(request) => request,
            None => return Ok(DeviceAuthError::NotFound),
        };

        Ok(match request.status() {
            Some(LoginRequestStatus::Pending) => DeviceAuthError::Expired,
            Some(status) => DeviceAuthError::already(status),
            None => DeviceAuthError::Internal(format!(
                "Invalid login request status: {}",
                request.status
            )),
        })
    }
}

/// Check the link secret and, where supplied, the identifiers carried in the
/// link against the stored request.
fn verify_link(
    request: &LoginRequest,
    token: &str,
    identifiers: Option<(Uuid, &str)>,
) -> Result<()> {
    match &request.approval_token_hash {
        Some(stored) if *stored == hash_token(token) => {}
        _ => return Err(DeviceAuthError::InvalidLink),
    }

    if let Some((user_id, device_id)) = identifiers {
        if request.user_id != user_id || request.device_id != device_id {
            return Err(DeviceAuthError::InvalidLink);
        }
    }

    Ok(())
}

/// Build the approve and deny URLs embedded in the email. Query values are
/// url-encoded; the token travels in cleartext and is validated against its
/// stored hash server-side.
fn build_approval_links(base_url: &str, request: &LoginRequest, token: &str) -> (String, String) {
    let base = base_url.trim_end_matches('/');

    let approve = format!(
        "{}/device-auth/approve-login?uid={}&deviceId={}&requestId={}&token={}",
        base,
        request.user_id,
        urlencoding::encode(&request.device_id),
        urlencoding::encode(&request.id),
        token,
    );

    let deny = format!(
        "{}/device-auth/deny-login?requestId={}&token={}",
        base,
        urlencoding::encode(&request.id),
        token,
    );

    (approve, deny)
}

/// Random alphanumeric link secret.
fn generate_token(length: usize) -> String {
    use rand::distributions::Alphanumeric;
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(length)
        .map(char::from)
        .collect()
}

/// SHA-256 hex digest; only the digest is persisted.
pub fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}
