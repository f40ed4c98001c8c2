use crate::device::DeviceMetadata;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

/// Lifecycle of one approval handshake.
///
/// `Pending` may only move forward to `Approved` or `Denied`, never back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoginRequestStatus {
    Pending,
    Approved,
    Denied,
}

impl LoginRequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Denied => "denied",
        }
    }
}

impl std::fmt::Display for LoginRequestStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for LoginRequestStatus {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "approved" => Ok(Self::Approved),
            "denied" => Ok(Self::Denied),
            _ => Err(()),
        }
    }
}

/// One approval handshake instance for a (user, device) pair.
///
/// Keyed by the deterministic string `{user_id}_{device_id}`, so at most one
/// request exists per pair and a re-attempt reuses the same key. Expiry is
/// soft: an expired row keeps `status = pending` in storage and callers check
/// `expires_at` themselves.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    pub id: String,
    pub user_id: Uuid,
    pub email: String,
    pub device_id: String,

    pub status: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub approved_at: Option<DateTime<Utc>>,
    pub denied_at: Option<DateTime<Utc>>,

    #[sqlx(json)]
    pub device_metadata: DeviceMetadata,

    pub ip_address: Option<String>,

    /// SHA-256 of the secret embedded in the emailed approve/deny links.
    /// Rotated on every dispatch; never serialized out.
    #[serde(skip_serializing, default)]
    pub approval_token_hash: Option<String>,
}

impl LoginRequest {
    /// Deterministic ledger key for a (user, device) pair.
    pub fn key_for(user_id: Uuid, device_id: &str) -> String {
        format!("{}_{}", user_id, device_id)
    }

    pub fn status(&self) -> Option<LoginRequestStatus> {
        self.status.parse().ok()
    }

    pub fn is_pending(&self) -> bool {
        self.status == LoginRequestStatus::Pending.as_str()
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at < now
    }
}

/// Inbound body for opening a handshake from an untrusted device.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateLoginRequest {
    pub user_id: Uuid,

    #[validate(email)]
    pub email: String,

    #[validate(length(min = 1, max = 128))]
    pub device_id: String,

    #[serde(default)]
    pub device_metadata: DeviceMetadata,

    pub ip_address: Option<String>,
}

/// Outcome of `create_login_request`: `created = false` means an existing
/// pending handshake was coalesced onto and its expiry was left untouched.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequestCreated {
    pub request_id: String,
    pub created: bool,
}
