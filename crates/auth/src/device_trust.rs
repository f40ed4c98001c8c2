//! Device trust store: the sole source of truth for "is this device allowed
//! in without re-approval".

use crate::error::Result;
use chrono::Utc;
use telecare_database::{Database, DeviceRepository};
use telecare_models::{DeviceMetadata, DeviceTrust, Session, TrustedDevice};
use uuid::Uuid;

pub struct DeviceTrustService {
    devices: DeviceRepository,
}

impl DeviceTrustService {
    pub fn new(db: &Database) -> Self {
        Self {
            devices: DeviceRepository::new(db.pool().clone()),
        }
    }

    /// Absence of a record and `trusted != true` both come back untrusted.
    pub async fn check_device_trust(&self, user_id: Uuid, device_id: &str) -> Result<DeviceTrust> {
        match self.devices.find(user_id, device_id).await? {
            Some(device) if device.trusted => Ok(DeviceTrust {
                is_trusted: true,
                device: Some(device),
            }),
            _ => Ok(DeviceTrust::untrusted()),
        }
    }

    /// Idempotent merge upsert: metadata fields absent from the call are
    /// preserved, `approved_at` is set once, `last_used` is refreshed.
    pub async fn register_trusted_device(
        &self,
        user_id: Uuid,
        device_id: &str,
        metadata: &DeviceMetadata,
        ip_address: Option<&str>,
    ) -> Result<TrustedDevice> {
        let device = self
            .devices
            .upsert_trusted(user_id, device_id, metadata, ip_address, Utc::now())
            .await?;

        tracing::info!(%user_id, device_id, "Device registered as trusted");
        Ok(device)
    }

    pub async fn get_trusted_devices(&self, user_id: Uuid) -> Result<Vec<TrustedDevice>> {
        Ok(self.devices.list_trusted(user_id).await?)
    }

    /// Hard delete; removing an unknown device succeeds quietly.
    pub async fn remove_trusted_device(&self, user_id: Uuid, device_id: &str) -> Result<()> {
        let removed = self.devices.delete(user_id, device_id).await?;
        if removed > 0 {
            tracing::info!(%user_id, device_id, "Trusted device removed");
        }
        Ok(())
    }

    /// Refresh `last_used` for a device that just signed in.
    pub async fn touch_device(&self, user_id: Uuid, device_id: &str) -> Result<()> {
        self.devices.touch(user_id, device_id, Utc::now()).await?;
        Ok(())
    }

    /// Trust the device behind an existing session, identified by the
    /// session-derived fallback id (see [`derived_device_id`]).
    pub async fn trust_device_from_session(
        &self,
        user_id: Uuid,
        session: &Session,
    ) -> Result<TrustedDevice> {
        let device_id = derived_device_id(
            user_id,
            session.device_name.as_deref(),
            session.ip_address.as_deref(),
        );

        let metadata = DeviceMetadata {
            browser_name: session.device_name.clone(),
            ..DeviceMetadata::default()
        };

        self.register_trusted_device(user_id, &device_id, &metadata, session.ip_address.as_deref())
            .await
    }

    pub async fn is_session_device_trusted(&self, user_id: Uuid, session: &Session) -> Result<bool> {
        let device_id = derived_device_id(
            user_id,
            session.device_name.as_deref(),
            session.ip_address.as_deref(),
        );

        Ok(self.check_device_trust(user_id, &device_id).await?.is_trusted)
    }
}

/// Deterministic synthetic device id for sessions with no persisted client
/// device id: the device-name string and IP, squashed to an identifier-safe
/// alphabet, suffixed with a prefix of the user id.
///
/// Weak by construction: collidable, and it shifts whenever the IP does.
/// Swap for a persisted session-to-device mapping without touching callers.
pub fn derived_device_id(user_id: Uuid, device_name: Option<&str>, ip_address: Option<&str>) -> String {
    let raw = format!(
        "{}_{}",
        device_name.unwrap_or("unknown"),
        ip_address.unwrap_or("noip")
    );

    let sanitized: String = raw
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_lowercase()
            } else {
                '_'
            }
        })
        .collect();

    let user_prefix: String = user_id.simple().to_string().chars().take(8).collect();

    format!("{}_{}", sanitized, user_prefix)
}
