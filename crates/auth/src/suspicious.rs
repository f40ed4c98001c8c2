//! Suspicious-login re-verification: a parallel flow that shares the trust
//! store's storage but acts on live sessions instead of the login ledger.
//!
//! Verification marks the flagged session trusted; rejection deletes it
//! outright. This is the one path that actually revokes anything.

use crate::error::{DeviceAuthError, Result};
use sqlx::PgPool;
use std::time::Duration;
use telecare_database::{Database, SessionRepository, SuspiciousLoginRepository};
use telecare_models::{ReportSuspiciousLogin, SuspiciousLogin, SuspiciousLoginStatus};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use uuid::Uuid;

pub struct SuspiciousLoginService {
    suspicious: SuspiciousLoginRepository,
    sessions: SessionRepository,
}

impl SuspiciousLoginService {
    pub fn new(db: &Database) -> Self {
        Self {
            suspicious: SuspiciousLoginRepository::new(db.pool().clone()),
            sessions: SessionRepository::new(db.pool().clone()),
        }
    }

    /// Record a flagged session. The heuristics that decide what counts as
    /// suspicious live with the login service, not here.
    pub async fn report(&self, report: &ReportSuspiciousLogin) -> Result<SuspiciousLogin> {
        let record = self.suspicious.insert(report, chrono::Utc::now()).await?;

        tracing::info!(
            id = %record.id,
            user_id = %record.user_id,
            session_id = %record.session_id,
            "Suspicious login recorded"
        );
        Ok(record)
    }

    /// The single newest unverified record for the user, or None.
    ///
    /// Policy: `limit 1, order desc(created_at)`. Older unverified records
    /// wait until the newest one is resolved.
    pub async fn latest_unverified(&self, user_id: Uuid) -> Result<Option<SuspiciousLogin>> {
        Ok(self.suspicious.latest_unverified(user_id).await?)
    }

    /// "This was me": mark verified and flag the linked session trusted.
    ///
    /// The session write follows the status flip without a transaction;
    /// worst case is a verified record whose session missed the flag, which
    /// the next sign-in re-flags.
    pub async fn confirm(&self, id: Uuid) -> Result<SuspiciousLogin> {
        let record = self.resolve(id, SuspiciousLoginStatus::Verified).await?;

        let updated = self.sessions.set_trusted(record.session_id).await?;
        if updated == 0 {
            tracing::warn!(
                session_id = %record.session_id,
                "Verified a suspicious login whose session no longer exists"
            );
        }

        tracing::info!(id = %record.id, session_id = %record.session_id, "Suspicious login verified");
        Ok(record)
    }

    /// "This wasn't me": mark rejected and delete the linked session
    /// (immediate hard revocation).
    pub async fn reject(&self, id: Uuid) -> Result<SuspiciousLogin> {
        let record = self.resolve(id, SuspiciousLoginStatus::Rejected).await?;

        self.sessions.delete(record.session_id).await?;

        tracing::info!(id = %record.id, session_id = %record.session_id, "Suspicious login rejected, session revoked");
        Ok(record)
    }

    async fn resolve(&self, id: Uuid, to: SuspiciousLoginStatus) -> Result<SuspiciousLogin> {
        if self.suspicious.find(id).await?.is_none() {
            return Err(DeviceAuthError::NotFound);
        }

        if !self.suspicious.resolve(id, to).await? {
            // Raced another resolution; report the state that won.
            let current = self
                .suspicious
                .find(id)
                .await?
                .ok_or(DeviceAuthError::NotFound)?;
            return Err(DeviceAuthError::already(current.status));
        }

        self.suspicious
            .find(id)
            .await?
            .ok_or(DeviceAuthError::NotFound)
    }
}

/// Live subscription over the newest unverified record for one user.
///
/// Callers depend on the subscription interface; underneath, a background
/// task re-reads the store on an interval and emits each newly observed
/// record. Dropping the subscription (or `unsubscribe`) stops the task.
pub struct SuspiciousLoginWatcher {
    pool: PgPool,
    poll_interval: Duration,
}

impl SuspiciousLoginWatcher {
    pub fn new(db: &Database) -> Self {
        Self {
            pool: db.pool().clone(),
            poll_interval: Duration::from_secs(2),
        }
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn subscribe(&self, user_id: Uuid) -> SuspiciousLoginSubscription {
        let (tx, rx) = mpsc::channel(8);
        let repo = SuspiciousLoginRepository::new(self.pool.clone());
        let poll_interval = self.poll_interval;

        let task = tokio::spawn(async move {
            let mut last_seen: Option<Uuid> = None;
            let mut ticker = tokio::time::interval(poll_interval);

            loop {
                ticker.tick().await;

                match repo.latest_unverified(user_id).await {
                    Ok(Some(record)) if last_seen != Some(record.id) => {
                        last_seen = Some(record.id);
                        if tx.send(record).await.is_err() {
                            break;
                        }
                    }
                    Ok(_) => {}
                    Err(e) => {
                        tracing::warn!(%user_id, "Suspicious-login watch read failed: {}", e);
                    }
                }
            }
        });

        SuspiciousLoginSubscription { rx, task }
    }
}

pub struct SuspiciousLoginSubscription {
    rx: mpsc::Receiver<SuspiciousLogin>,
    task: JoinHandle<()>,
}

impl SuspiciousLoginSubscription {
    /// Next newly observed unverified record; None once unsubscribed.
    pub async fn recv(&mut self) -> Option<SuspiciousLogin> {
        self.rx.recv().await
    }

    pub fn unsubscribe(self) {
        self.task.abort();
    }
}

impl Drop for SuspiciousLoginSubscription {
    fn drop(&mut self) {
        self.task.abort();
    }
}
