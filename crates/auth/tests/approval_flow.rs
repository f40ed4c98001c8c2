//! End-to-end ledger and trust-store flows against a live Postgres.
//!
//! All tests are `#[ignore]`d; run them with a database available:
//!
//! ```sh
//! DATABASE_URL=postgresql://... cargo test -p telecare-auth -- --ignored
//! ```

use chrono::{Duration, Utc};
use telecare_auth::approval::hash_token;
use telecare_auth::{
    DeviceAuthError, DeviceTrustService, LoginApprovalService, SuspiciousLoginService,
    SuspiciousLoginWatcher,
};
use telecare_database::{Database, DatabaseConfig, LoginRequestRepository, SessionRepository};
use telecare_models::{CreateLoginRequest, DeviceMetadata, ReportSuspiciousLogin};
use uuid::Uuid;

const TEST_TOKEN: &str = "integration-test-token";

async fn setup() -> Database {
    let db = Database::new(DatabaseConfig::from_env())
        .await
        .expect("Failed to connect to database");

    sqlx::raw_sql(include_str!("../../../migrations/0001_device_trust.sql"))
        .execute(db.pool())
        .await
        .expect("Failed to apply schema");

    db
}

fn approval_service(db: &Database) -> LoginApprovalService {
    LoginApprovalService::new(db, None, "http://localhost:8080".to_string())
}

fn new_request(user_id: Uuid, device_id: &str) -> CreateLoginRequest {
    CreateLoginRequest {
        user_id,
        email: "pat@example.com".to_string(),
        device_id: device_id.to_string(),
        device_metadata: DeviceMetadata {
            browser_name: Some("Firefox".to_string()),
            os_name: Some("Linux".to_string()),
            ..DeviceMetadata::default()
        },
        ip_address: Some("203.0.113.7".to_string()),
    }
}

/// Point the stored link secret at a known token so tests can click the link.
async fn stamp_token(db: &Database, request_id: &str) {
    let updated = LoginRequestRepository::new(db.pool().clone())
        .set_token_hash(request_id, &hash_token(TEST_TOKEN))
        .await
        .expect("Failed to stamp token hash");
    assert_eq!(updated, 1);
}

async fn backdate_expiry(db: &Database, request_id: &str, minutes: i64) {
    sqlx::query("UPDATE login_requests SET expires_at = $2 WHERE id = $1")
        .bind(request_id)
        .bind(Utc::now() - Duration::minutes(minutes))
        .execute(db.pool())
        .await
        .expect("Failed to backdate expiry");
}

#[tokio::test]
#[ignore]
async fn test_create_is_idempotent_while_pending() {
    let db = setup().await;
    let service = approval_service(&db);
    let user_id = Uuid::new_v4();

    let first = service
        .create_login_request(&new_request(user_id, "dev_a"))
        .await
        .unwrap();
    assert!(first.created);

    let stored = service
        .get_login_request(&first.request_id)
        .await
        .unwrap()
        .expect("request should exist");
    assert_eq!(stored.status, "pending");

    // expires ~= now + 10 minutes
    let ttl = stored.expires_at - Utc::now();
    assert!(ttl > Duration::minutes(9) && ttl <= Duration::minutes(10));

    // A re-attempt coalesces: same id, expiry untouched.
    let second = service
        .create_login_request(&new_request(user_id, "dev_a"))
        .await
        .unwrap();
    assert_eq!(second.request_id, first.request_id);
    assert!(!second.created);

    let after = service
        .get_login_request(&first.request_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(after.expires_at, stored.expires_at);
}

#[tokio::test]
#[ignore]
async fn test_expired_pending_request_is_replaced() {
    let db = setup().await;
    let service = approval_service(&db);
    let user_id = Uuid::new_v4();

    let first = service
        .create_login_request(&new_request(user_id, "dev_a"))
        .await
        .unwrap();
    backdate_expiry(&db, &first.request_id, 1).await;

    let second = service
        .create_login_request(&new_request(user_id, "dev_a"))
        .await
        .unwrap();
    assert_eq!(second.request_id, first.request_id);
    assert!(second.created);

    let stored = service
        .get_login_request(&second.request_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.status, "pending");
    assert!(stored.expires_at > Utc::now());
}

#[tokio::test]
#[ignore]
async fn test_approve_grants_trust_exactly_once() {
    let db = setup().await;
    let service = approval_service(&db);
    let trust = DeviceTrustService::new(&db);
    let user_id = Uuid::new_v4();

    let created = service
        .create_login_request(&new_request(user_id, "dev_a"))
        .await
        .unwrap();
    stamp_token(&db, &created.request_id).await;

    assert!(!trust
        .check_device_trust(user_id, "dev_a")
        .await
        .unwrap()
        .is_trusted);

    let approved = service
        .approve_login_request(&created.request_id, TEST_TOKEN, user_id, "dev_a")
        .await
        .unwrap();
    assert_eq!(approved.status, "approved");
    assert!(approved.approved_at.is_some());

    // Approval implies trust, and a trusted device knows when it was approved.
    let check = trust.check_device_trust(user_id, "dev_a").await.unwrap();
    assert!(check.is_trusted);
    let device = check.device.unwrap();
    assert!(device.approved_at.is_some());
    assert_eq!(device.device_metadata.browser_name.as_deref(), Some("Firefox"));

    // No backward transition: the second click names the terminal state.
    let again = service
        .approve_login_request(&created.request_id, TEST_TOKEN, user_id, "dev_a")
        .await;
    match again {
        Err(err @ DeviceAuthError::AlreadyProcessed { .. }) => {
            assert_eq!(err.to_string(), "Request already approved");
        }
        other => panic!("expected AlreadyProcessed, got {:?}", other.map(|r| r.status)),
    }

    // A later sign-in from the trusted device refreshes last_used.
    trust.touch_device(user_id, "dev_a").await.unwrap();
    let touched = trust
        .check_device_trust(user_id, "dev_a")
        .await
        .unwrap()
        .device
        .unwrap();
    assert!(touched.last_used >= device.last_used);
}

#[tokio::test]
#[ignore]
async fn test_expired_approve_leaves_device_untrusted() {
    let db = setup().await;
    let service = approval_service(&db);
    let trust = DeviceTrustService::new(&db);
    let user_id = Uuid::new_v4();

    let created = service
        .create_login_request(&new_request(user_id, "dev_a"))
        .await
        .unwrap();
    stamp_token(&db, &created.request_id).await;
    backdate_expiry(&db, &created.request_id, 1).await;

    let result = service
        .approve_login_request(&created.request_id, TEST_TOKEN, user_id, "dev_a")
        .await;
    match result {
        Err(err @ DeviceAuthError::Expired) => {
            assert_eq!(err.to_string(), "Login request has expired");
        }
        other => panic!("expected Expired, got {:?}", other.map(|r| r.status)),
    }

    // Soft expiry: the row stays pending in storage, and no trust was granted.
    let stored = service
        .get_login_request(&created.request_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.status, "pending");
    assert!(!trust
        .check_device_trust(user_id, "dev_a")
        .await
        .unwrap()
        .is_trusted);
}

#[tokio::test]
#[ignore]
async fn test_deny_records_refusal_without_trust() {
    let db = setup().await;
    let service = approval_service(&db);
    let trust = DeviceTrustService::new(&db);
    let user_id = Uuid::new_v4();

    let created = service
        .create_login_request(&new_request(user_id, "dev_a"))
        .await
        .unwrap();
    stamp_token(&db, &created.request_id).await;

    let denied = service
        .deny_login_request(&created.request_id, TEST_TOKEN)
        .await
        .unwrap();
    assert_eq!(denied.status, "denied");
    assert!(denied.denied_at.is_some());

    assert!(!trust
        .check_device_trust(user_id, "dev_a")
        .await
        .unwrap()
        .is_trusted);

    let again = service
        .deny_login_request(&created.request_id, TEST_TOKEN)
        .await;
    match again {
        Err(err @ DeviceAuthError::AlreadyProcessed { .. }) => {
            assert_eq!(err.to_string(), "Request already denied");
        }
        other => panic!("expected AlreadyProcessed, got {:?}", other.map(|r| r.status)),
    }
}

#[tokio::test]
#[ignore]
async fn test_link_token_is_required_and_bound() {
    let db = setup().await;
    let service = approval_service(&db);
    let user_id = Uuid::new_v4();

    let created = service
        .create_login_request(&new_request(user_id, "dev_a"))
        .await
        .unwrap();

    // No email dispatched yet: nothing can approve the request.
    let undispatched = service
        .approve_login_request(&created.request_id, TEST_TOKEN, user_id, "dev_a")
        .await;
    assert!(matches!(undispatched, Err(DeviceAuthError::InvalidLink)));

    stamp_token(&db, &created.request_id).await;

    let wrong_token = service
        .approve_login_request(&created.request_id, "guessed", user_id, "dev_a")
        .await;
    assert!(matches!(wrong_token, Err(DeviceAuthError::InvalidLink)));

    let wrong_device = service
        .approve_login_request(&created.request_id, TEST_TOKEN, user_id, "dev_b")
        .await;
    assert!(matches!(wrong_device, Err(DeviceAuthError::InvalidLink)));
}

#[tokio::test]
#[ignore]
async fn test_trusted_listing_and_idempotent_removal() {
    let db = setup().await;
    let trust = DeviceTrustService::new(&db);
    let user_id = Uuid::new_v4();

    // An untrusted device row, as created implicitly by a pending handshake.
    sqlx::query(
        "INSERT INTO devices (user_id, device_id, trusted, last_used) VALUES ($1, $2, FALSE, NOW())",
    )
    .bind(user_id)
    .bind("dev_untrusted")
    .execute(db.pool())
    .await
    .unwrap();

    trust
        .register_trusted_device(user_id, "dev_trusted", &DeviceMetadata::default(), None)
        .await
        .unwrap();

    let listed = trust.get_trusted_devices(user_id).await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].device_id, "dev_trusted");

    // Removal is idempotent, including for never-existing devices.
    trust.remove_trusted_device(user_id, "dev_trusted").await.unwrap();
    trust.remove_trusted_device(user_id, "dev_trusted").await.unwrap();
    trust.remove_trusted_device(user_id, "dev_never").await.unwrap();

    assert!(trust.get_trusted_devices(user_id).await.unwrap().is_empty());
}

#[tokio::test]
#[ignore]
async fn test_suspicious_login_resolution() {
    let db = setup().await;
    let service = SuspiciousLoginService::new(&db);
    let user_id = Uuid::new_v4();

    let confirmed_session = Uuid::new_v4();
    let rejected_session = Uuid::new_v4();
    for session_id in [confirmed_session, rejected_session] {
        sqlx::query(
            "INSERT INTO sessions (id, user_id, device_name, trusted) VALUES ($1, $2, 'Chrome on Windows', FALSE)",
        )
        .bind(session_id)
        .bind(user_id)
        .execute(db.pool())
        .await
        .unwrap();
    }

    let first = service
        .report(&ReportSuspiciousLogin {
            user_id,
            session_id: confirmed_session,
            device_info: DeviceMetadata::default(),
            ip_address: None,
        })
        .await
        .unwrap();
    let second = service
        .report(&ReportSuspiciousLogin {
            user_id,
            session_id: rejected_session,
            device_info: DeviceMetadata::default(),
            ip_address: None,
        })
        .await
        .unwrap();

    // Only the newest unverified record surfaces.
    let latest = service.latest_unverified(user_id).await.unwrap().unwrap();
    assert_eq!(latest.id, second.id);

    // "This wasn't me": record rejected, session hard-deleted.
    let rejected = service.reject(second.id).await.unwrap();
    assert_eq!(rejected.status, "rejected");
    let gone: Option<(Uuid,)> = sqlx::query_as("SELECT id FROM sessions WHERE id = $1")
        .bind(rejected_session)
        .fetch_optional(db.pool())
        .await
        .unwrap();
    assert!(gone.is_none());

    // The older record surfaces once the newer one resolves.
    let latest = service.latest_unverified(user_id).await.unwrap().unwrap();
    assert_eq!(latest.id, first.id);

    // "This was me": record verified, session trusted.
    let verified = service.confirm(first.id).await.unwrap();
    assert_eq!(verified.status, "verified");
    let (trusted,): (bool,) = sqlx::query_as("SELECT trusted FROM sessions WHERE id = $1")
        .bind(confirmed_session)
        .fetch_one(db.pool())
        .await
        .unwrap();
    assert!(trusted);

    // Re-resolving names the state that won.
    let again = service.confirm(first.id).await;
    match again {
        Err(err @ DeviceAuthError::AlreadyProcessed { .. }) => {
            assert_eq!(err.to_string(), "Request already verified");
        }
        other => panic!("expected AlreadyProcessed, got {:?}", other.map(|r| r.status)),
    }

    assert!(service.latest_unverified(user_id).await.unwrap().is_none());
}

#[tokio::test]
#[ignore]
async fn test_session_derived_device_trust() {
    let db = setup().await;
    let trust = DeviceTrustService::new(&db);
    let sessions = SessionRepository::new(db.pool().clone());
    let user_id = Uuid::new_v4();
    let session_id = Uuid::new_v4();

    sqlx::query(
        "INSERT INTO sessions (id, user_id, device_name, ip_address, trusted) \
         VALUES ($1, $2, 'Chrome on Windows', '203.0.113.7', FALSE)",
    )
    .bind(session_id)
    .bind(user_id)
    .execute(db.pool())
    .await
    .unwrap();

    let session = sessions.find(session_id).await.unwrap().unwrap();

    assert!(!trust
        .is_session_device_trusted(user_id, &session)
        .await
        .unwrap());

    trust.trust_device_from_session(user_id, &session).await.unwrap();
    assert!(trust
        .is_session_device_trusted(user_id, &session)
        .await
        .unwrap());

    // The same physical session maps onto the same device record every time.
    trust.trust_device_from_session(user_id, &session).await.unwrap();
    assert_eq!(trust.get_trusted_devices(user_id).await.unwrap().len(), 1);
}

#[tokio::test]
#[ignore]
async fn test_watcher_emits_newest_unverified() {
    let db = setup().await;
    let service = SuspiciousLoginService::new(&db);
    let watcher =
        SuspiciousLoginWatcher::new(&db).with_poll_interval(std::time::Duration::from_millis(50));
    let user_id = Uuid::new_v4();
    let session_id = Uuid::new_v4();

    sqlx::query("INSERT INTO sessions (id, user_id, trusted) VALUES ($1, $2, FALSE)")
        .bind(session_id)
        .bind(user_id)
        .execute(db.pool())
        .await
        .unwrap();

    let mut subscription = watcher.subscribe(user_id);

    let record = service
        .report(&ReportSuspiciousLogin {
            user_id,
            session_id,
            device_info: DeviceMetadata::default(),
            ip_address: None,
        })
        .await
        .unwrap();

    let seen = tokio::time::timeout(std::time::Duration::from_secs(2), subscription.recv())
        .await
        .expect("watcher should emit within the timeout")
        .expect("subscription should still be live");
    assert_eq!(seen.id, record.id);

    subscription.unsubscribe();
}
