//! Waiting-room poller: after a sign-in attempt from an untrusted device,
//! watch the trust store and the login-request ledger until the handshake
//! resolves.

use chrono::{DateTime, Utc};
use std::time::Duration;
use telecare_models::{LoginRequest, LoginRequestStatus};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::warn;
use uuid::Uuid;

/// Fixed polling cadence; there is no backoff and no retry cap. The poller
/// runs until a terminal state or cancellation.
pub const POLL_INTERVAL: Duration = Duration::from_secs(2);

#[derive(Debug, Error)]
#[error("{0}")]
pub struct SourceError(pub String);

impl From<reqwest::Error> for SourceError {
    fn from(err: reqwest::Error) -> Self {
        Self(err.to_string())
    }
}

/// Read-only view of the handshake, as the poller sees it. Implementations
/// must never mutate anything; concurrent pollers on the same pair rely on
/// that.
#[allow(async_fn_in_trait)]
pub trait ApprovalStatusSource {
    async fn check_trust(
        &self,
        user_id: Uuid,
        device_id: &str,
    ) -> std::result::Result<bool, SourceError>;

    async fn fetch_request(
        &self,
        user_id: Uuid,
        device_id: &str,
    ) -> std::result::Result<Option<LoginRequest>, SourceError>;
}

/// Waiting-room states. `Checking` and `Pending` keep the poller alive;
/// everything else ends it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitState {
    Checking,
    Pending,
    Approved,
    Denied,
    Expired,
    Error,
}

impl WaitState {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, WaitState::Checking | WaitState::Pending)
    }
}

pub struct ApprovalWaiter<S> {
    source: S,
    user_id: Uuid,
    device_id: String,
    interval: Duration,
}

impl<S: ApprovalStatusSource> ApprovalWaiter<S> {
    pub fn new(source: S, user_id: Uuid, device_id: impl Into<String>) -> Self {
        Self {
            source,
            user_id,
            device_id: device_id.into(),
            interval: POLL_INTERVAL,
        }
    }

    /// Tests shrink the interval; production keeps [`POLL_INTERVAL`].
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// One tick of the state machine.
    ///
    /// Trust wins over the ledger: a trusted device is `Approved` even while
    /// the request row still reads pending. A missing request row triggers
    /// one extra trust check (the approve path may have been observed
    /// mid-write) before settling on `Expired`.
    pub async fn poll_once(&self, now: DateTime<Utc>) -> WaitState {
        let trusted = match self.source.check_trust(self.user_id, &self.device_id).await {
            Ok(trusted) => trusted,
            Err(e) => {
                warn!("Failed to check approval status: {}", e);
                return WaitState::Error;
            }
        };
        if trusted {
            return WaitState::Approved;
        }

        let request = match self.source.fetch_request(self.user_id, &self.device_id).await {
            Ok(request) => request,
            Err(e) => {
                warn!("Failed to check approval status: {}", e);
                return WaitState::Error;
            }
        };

        let Some(request) = request else {
            return match self.source.check_trust(self.user_id, &self.device_id).await {
                Ok(true) => WaitState::Approved,
                Ok(false) => WaitState::Expired,
                Err(e) => {
                    warn!("Failed to check approval status: {}", e);
                    WaitState::Error
                }
            };
        };

        match request.status() {
            Some(LoginRequestStatus::Approved) => WaitState::Approved,
            Some(LoginRequestStatus::Denied) => WaitState::Denied,
            Some(LoginRequestStatus::Pending) if request.is_expired(now) => WaitState::Expired,
            Some(LoginRequestStatus::Pending) => WaitState::Pending,
            None => {
                warn!("Unknown login request status: {}", request.status);
                WaitState::Error
            }
        }
    }

    /// Poll until a terminal state, or None if cancelled first. Cancellation
    /// is the navigation/unmount analogue and the only way out of a handshake
    /// that never resolves.
    pub async fn wait(&self, cancel: CancellationToken) -> Option<WaitState> {
        let mut ticker = tokio::time::interval(self.interval);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => return None,
                _ = ticker.tick() => {
                    let state = self.poll_once(Utc::now()).await;
                    if state.is_terminal() {
                        return Some(state);
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use telecare_models::DeviceMetadata;

    fn user() -> Uuid {
        "6f2c0b9e-3d4a-4c9e-8a68-0d2f6f1c9a11".parse().unwrap()
    }

    fn request(status: &str, expires_in_minutes: i64) -> LoginRequest {
        let now = Utc::now();
        LoginRequest {
            id: LoginRequest::key_for(user(), "dev_1"),
            user_id: user(),
            email: "pat@example.com".to_string(),
            device_id: "dev_1".to_string(),
            status: status.to_string(),
            created_at: now,
            expires_at: now + ChronoDuration::minutes(expires_in_minutes),
            approved_at: None,
            denied_at: None,
            device_metadata: DeviceMetadata::default(),
            ip_address: None,
            approval_token_hash: None,
        }
    }

    /// Scripted status source: pops one answer per call.
    struct Scripted {
        trust: Mutex<VecDeque<bool>>,
        requests: Mutex<VecDeque<Option<LoginRequest>>>,
    }

    impl Scripted {
        fn new(
            trust: impl IntoIterator<Item = bool>,
            requests: impl IntoIterator<Item = Option<LoginRequest>>,
        ) -> Self {
            Self {
                trust: Mutex::new(trust.into_iter().collect()),
                requests: Mutex::new(requests.into_iter().collect()),
            }
        }
    }

    impl ApprovalStatusSource for Scripted {
        async fn check_trust(&self, _: Uuid, _: &str) -> Result<bool, SourceError> {
            Ok(self.trust.lock().unwrap().pop_front().unwrap_or(false))
        }

        async fn fetch_request(
            &self,
            _: Uuid,
            _: &str,
        ) -> Result<Option<LoginRequest>, SourceError> {
            Ok(self.requests.lock().unwrap().pop_front().unwrap_or(None))
        }
    }

    fn waiter(source: Scripted) -> ApprovalWaiter<Scripted> {
        ApprovalWaiter::new(source, user(), "dev_1")
    }

    #[tokio::test]
    async fn test_trusted_device_wins_over_pending_request() {
        // Trust was granted by another path while the ledger still says
        // pending; the poller must settle on Approved, not Pending.
        let source = Scripted::new([true], [Some(request("pending", 5))]);
        assert_eq!(waiter(source).poll_once(Utc::now()).await, WaitState::Approved);
    }

    #[tokio::test]
    async fn test_pending_request_keeps_waiting() {
        let source = Scripted::new([false], [Some(request("pending", 5))]);
        assert_eq!(waiter(source).poll_once(Utc::now()).await, WaitState::Pending);
    }

    #[tokio::test]
    async fn test_terminal_statuses_map_directly() {
        let source = Scripted::new([false], [Some(request("approved", 5))]);
        assert_eq!(waiter(source).poll_once(Utc::now()).await, WaitState::Approved);

        let source = Scripted::new([false], [Some(request("denied", 5))]);
        assert_eq!(waiter(source).poll_once(Utc::now()).await, WaitState::Denied);
    }

    #[tokio::test]
    async fn test_expired_pending_request() {
        let source = Scripted::new([false], [Some(request("pending", -1))]);
        assert_eq!(waiter(source).poll_once(Utc::now()).await, WaitState::Expired);
    }

    #[tokio::test]
    async fn test_missing_request_rechecks_trust() {
        // Request row not visible yet, but the trust flip already landed.
        let source = Scripted::new([false, true], []);
        assert_eq!(waiter(source).poll_once(Utc::now()).await, WaitState::Approved);

        // No request and no trust: the handshake is gone.
        let source = Scripted::new([false, false], []);
        assert_eq!(waiter(source).poll_once(Utc::now()).await, WaitState::Expired);
    }

    #[tokio::test]
    async fn test_wait_reaches_terminal_state() {
        let source = Scripted::new(
            [false, false, true],
            [Some(request("pending", 5)), Some(request("pending", 5))],
        );
        let waiter = waiter(source).with_interval(Duration::from_millis(5));

        let state = waiter.wait(CancellationToken::new()).await;
        assert_eq!(state, Some(WaitState::Approved));
    }

    #[tokio::test]
    async fn test_wait_cancellation() {
        let source = Scripted::new(
            std::iter::repeat(false).take(64),
            std::iter::repeat_with(|| Some(request("pending", 5))).take(64),
        );
        let waiter = waiter(source).with_interval(Duration::from_millis(5));

        let cancel = CancellationToken::new();
        let handle = {
            let cancel = cancel.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(20)).await;
                cancel.cancel();
            })
        };

        let state = waiter.wait(cancel).await;
        assert_eq!(state, None);
        handle.await.unwrap();
    }
}
