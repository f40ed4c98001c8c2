use crate::error::Result;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::PgPool;
use telecare_models::{DeviceMetadata, TrustedDevice};
use uuid::Uuid;

pub struct DeviceRepository {
    pool: PgPool,
}

impl DeviceRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn find(&self, user_id: Uuid, device_id: &str) -> Result<Option<TrustedDevice>> {
        let device = sqlx::query_as::<_, TrustedDevice>(
            "SELECT * FROM devices WHERE user_id = $1 AND device_id = $2",
        )
        .bind(user_id)
        .bind(device_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(device)
    }

    /// Idempotent merge upsert granting trust.
    ///
    /// Metadata keys absent from the call are preserved, `approved_at` is
    /// set once and kept, `last_used` is always refreshed.
    pub async fn upsert_trusted(
        &self,
        user_id: Uuid,
        device_id: &str,
        metadata: &DeviceMetadata,
        ip_address: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<TrustedDevice> {
        let device = sqlx::query_as::<_, TrustedDevice>(
            r#"
            INSERT INTO devices (
                user_id, device_id, trusted, approved_at, last_used,
                device_metadata, ip_address
            )
            VALUES ($1, $2, TRUE, $3, $3, $4, $5)
            ON CONFLICT (user_id, device_id) DO UPDATE SET
                trusted = TRUE,
                approved_at = COALESCE(devices.approved_at, EXCLUDED.approved_at),
                last_used = EXCLUDED.last_used,
                device_metadata = devices.device_metadata || EXCLUDED.device_metadata,
                ip_address = COALESCE(EXCLUDED.ip_address, devices.ip_address)
            RETURNING *
            "#,
        )
        .bind(user_id)
        .bind(device_id)
        .bind(now)
        .bind(Json(metadata))
        .bind(ip_address)
        .fetch_one(&self.pool)
        .await?;

        Ok(device)
    }

    /// Only `trusted = true` rows; untrusted or partial records never reach
    /// the user-facing device list.
    pub async fn list_trusted(&self, user_id: Uuid) -> Result<Vec<TrustedDevice>> {
        let devices = sqlx::query_as::<_, TrustedDevice>(
            r#"
            SELECT * FROM devices
            WHERE user_id = $1 AND trusted = TRUE
            ORDER BY last_used DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(devices)
    }

    /// Hard delete. Removing an absent device is not an error.
    pub async fn delete(&self, user_id: Uuid, device_id: &str) -> Result<u64> {
        let result = sqlx::query("DELETE FROM devices WHERE user_id = $1 AND device_id = $2")
            .bind(user_id)
            .bind(device_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    /// Refresh `last_used` for a device that just signed in.
    pub async fn touch(&self, user_id: Uuid, device_id: &str, now: DateTime<Utc>) -> Result<()> {
        sqlx::query(
            "UPDATE devices SET last_used = $3 WHERE user_id = $1 AND device_id = $2",
        )
        .bind(user_id)
        .bind(device_id)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
