use crate::error::Result;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::PgPool;
use telecare_models::{ReportSuspiciousLogin, SuspiciousLogin, SuspiciousLoginStatus};
use uuid::Uuid;

pub struct SuspiciousLoginRepository {
    pool: PgPool,
}

impl SuspiciousLoginRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn insert(
        &self,
        report: &ReportSuspiciousLogin,
        now: DateTime<Utc>,
    ) -> Result<SuspiciousLogin> {
        let record = sqlx::query_as::<_, SuspiciousLogin>(
            r#"
            INSERT INTO suspicious_logins (
                id, user_id, session_id, status, device_info, ip_address, created_at
            )
            VALUES ($1, $2, $3, 'unverified', $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(report.user_id)
        .bind(report.session_id)
        .bind(Json(&report.device_info))
        .bind(&report.ip_address)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;

        Ok(record)
    }

    pub async fn find(&self, id: Uuid) -> Result<Option<SuspiciousLogin>> {
        let record = sqlx::query_as::<_, SuspiciousLogin>(
            "SELECT * FROM suspicious_logins WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(record)
    }

    /// The single newest unverified record for a user.
    ///
    /// Deliberate policy (`ORDER BY created_at DESC LIMIT 1`): older
    /// unverified records stay out of sight until the newest one resolves.
    pub async fn latest_unverified(&self, user_id: Uuid) -> Result<Option<SuspiciousLogin>> {
        let record = sqlx::query_as::<_, SuspiciousLogin>(
            r#"
            SELECT * FROM suspicious_logins
            WHERE user_id = $1 AND status = 'unverified'
            ORDER BY created_at DESC
            LIMIT 1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(record)
    }

    /// Conditional move out of `unverified`; a second resolution attempt
    /// affects no rows and returns `false`.
    pub async fn resolve(&self, id: Uuid, to: SuspiciousLoginStatus) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE suspicious_logins
            SET status = $2
            WHERE id = $1 AND status = 'unverified'
            "#,
        )
        .bind(id)
        .bind(to.as_str())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }
}
