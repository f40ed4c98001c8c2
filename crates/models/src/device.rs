use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Free-form device fingerprint captured by the client at approval time.
///
/// All fields are best-effort strings; none of them is verified.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub browser_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub os_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub screen_size: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timezone: Option<String>,

    #[serde(flatten)]
    pub custom: serde_json::Map<String, serde_json::Value>,
}

impl DeviceMetadata {
    /// Short human-readable label for emails and device lists.
    pub fn display_name(&self) -> String {
        match (&self.browser_name, &self.os_name) {
            (Some(browser), Some(os)) => format!("{} on {}", browser, os),
            (Some(browser), None) => browser.clone(),
            (None, Some(os)) => os.clone(),
            (None, None) => "Unknown device".to_string(),
        }
    }
}

/// One browser/device known for one user.
///
/// A device with `trusted = true` always carries a non-null `approved_at`;
/// the trust flag is only ever flipped by the login-approval path.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct TrustedDevice {
    pub user_id: Uuid,
    pub device_id: String,

    pub trusted: bool,
    pub approved_at: Option<DateTime<Utc>>,
    pub last_used: DateTime<Utc>,

    #[sqlx(json)]
    pub device_metadata: DeviceMetadata,

    pub ip_address: Option<String>,
}

/// Result of a trust check. Absence of a record and `trusted != true`
/// both collapse to `is_trusted = false`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceTrust {
    pub is_trusted: bool,
    pub device: Option<TrustedDevice>,
}

impl DeviceTrust {
    pub fn untrusted() -> Self {
        Self {
            is_trusted: false,
            device: None,
        }
    }
}

/// Trimmed device view for the user-facing device-management list.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceSummary {
    pub device_id: String,
    pub name: String,
    pub approved_at: Option<DateTime<Utc>>,
    pub last_used: DateTime<Utc>,
    pub ip_address: Option<String>,
}

impl From<&TrustedDevice> for DeviceSummary {
    fn from(device: &TrustedDevice) -> Self {
        Self {
            device_id: device.device_id.clone(),
            name: device.device_metadata.display_name(),
            approved_at: device.approved_at,
            last_used: device.last_used,
            ip_address: device.ip_address.clone(),
        }
    }
}
