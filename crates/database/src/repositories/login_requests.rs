use crate::error::Result;
use chrono::{DateTime, Duration, Utc};
use sqlx::types::Json;
use sqlx::PgPool;
use telecare_models::{CreateLoginRequest, LoginRequest, LoginRequestCreated};
use uuid::Uuid;

pub struct LoginRequestRepository {
    pool: PgPool,
}

impl LoginRequestRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create a handshake, or coalesce onto a live pending one.
    ///
    /// If the deterministic key already holds a pending, unexpired request,
    /// the existing id is returned and its timestamps are left untouched.
    /// A terminal or expired-pending row is overwritten with a fresh
    /// pending record.
    pub async fn upsert_pending(
        &self,
        request: &CreateLoginRequest,
        ttl: Duration,
    ) -> Result<LoginRequestCreated> {
        let id = LoginRequest::key_for(request.user_id, &request.device_id);
        let now = Utc::now();

        if let Some(existing) = self.find(&id).await? {
            if existing.is_pending() && !existing.is_expired(now) {
                return Ok(LoginRequestCreated {
                    request_id: id,
                    created: false,
                });
            }
        }

        sqlx::query(
            r#"
            INSERT INTO login_requests (
                id, user_id, email, device_id, status,
                created_at, expires_at, device_metadata, ip_address
            )
            VALUES ($1, $2, $3, $4, 'pending', $5, $6, $7, $8)
            ON CONFLICT (id) DO UPDATE SET
                email = EXCLUDED.email,
                status = 'pending',
                created_at = EXCLUDED.created_at,
                expires_at = EXCLUDED.expires_at,
                approved_at = NULL,
                denied_at = NULL,
                device_metadata = EXCLUDED.device_metadata,
                ip_address = EXCLUDED.ip_address,
                approval_token_hash = NULL
            "#,
        )
        .bind(&id)
        .bind(request.user_id)
        .bind(&request.email)
        .bind(&request.device_id)
        .bind(now)
        .bind(now + ttl)
        .bind(Json(&request.device_metadata))
        .bind(&request.ip_address)
        .execute(&self.pool)
        .await?;

        Ok(LoginRequestCreated {
            request_id: id,
            created: true,
        })
    }

    /// Raw read. Expired pending rows come back verbatim; expiry policy
    /// belongs to the callers.
    pub async fn find(&self, request_id: &str) -> Result<Option<LoginRequest>> {
        let request = sqlx::query_as::<_, LoginRequest>(
            "SELECT * FROM login_requests WHERE id = $1",
        )
        .bind(request_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(request)
    }

    /// The request for a (user, device) pair, terminal states included;
    /// pollers read this to observe the outcome.
    pub async fn find_by_user_device(
        &self,
        user_id: Uuid,
        device_id: &str,
    ) -> Result<Option<LoginRequest>> {
        self.find(&LoginRequest::key_for(user_id, device_id)).await
    }

    /// Store a fresh approval-link token hash. Refuses silently (0 rows)
    /// once the request has left `pending`.
    pub async fn set_token_hash(&self, request_id: &str, token_hash: &str) -> Result<u64> {
        let result = sqlx::query(
            r#"
            UPDATE login_requests
            SET approval_token_hash = $2
            WHERE id = $1 AND status = 'pending'
            "#,
        )
        .bind(request_id)
        .bind(token_hash)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    /// Terminal transition to `approved` plus the trust grant, as one
    /// transaction. The conditional update is the tie-break for racing
    /// approval clicks: the loser sees `false` here, never a silent success.
    ///
    /// Returns `false` without writing anything when the row is no longer
    /// pending or has expired; the expired row is left `pending` in storage.
    pub async fn approve(&self, request_id: &str, now: DateTime<Utc>) -> Result<bool> {
        let mut tx = self.pool.begin().await?;

        let updated = sqlx::query(
            r#"
            UPDATE login_requests
            SET status = 'approved', approved_at = $2
            WHERE id = $1 AND status = 'pending' AND expires_at > $2
            "#,
        )
        .bind(request_id)
        .bind(now)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        if updated == 0 {
            tx.rollback().await?;
            return Ok(false);
        }

        sqlx::query(
            r#"
            INSERT INTO devices (
                user_id, device_id, trusted, approved_at, last_used,
                device_metadata, ip_address
            )
            SELECT user_id, device_id, TRUE, $2, $2, device_metadata, ip_address
            FROM login_requests
            WHERE id = $1
            ON CONFLICT (user_id, device_id) DO UPDATE SET
                trusted = TRUE,
                approved_at = COALESCE(devices.approved_at, EXCLUDED.approved_at),
                last_used = EXCLUDED.last_used,
                device_metadata = devices.device_metadata || EXCLUDED.device_metadata,
                ip_address = COALESCE(EXCLUDED.ip_address, devices.ip_address)
            "#,
        )
        .bind(request_id)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(true)
    }

    /// Terminal transition to `denied`. No expiry check: a deny click on a
    /// stale link still records the refusal. Never touches the device row.
    pub async fn deny(&self, request_id: &str, now: DateTime<Utc>) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE login_requests
            SET status = 'denied', denied_at = $2
            WHERE id = $1 AND status = 'pending'
            "#,
        )
        .bind(request_id)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }
}
