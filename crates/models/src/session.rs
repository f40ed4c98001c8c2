use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// A live sign-in session. Owned by the platform's session service; this
/// subsystem only reads it, flips its `trusted` flag, or deletes it.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub id: Uuid,
    pub user_id: Uuid,

    /// Human-readable device label captured at session creation
    /// (e.g. "Chrome on Windows").
    pub device_name: Option<String>,
    pub ip_address: Option<String>,

    pub trusted: bool,
    pub created_at: DateTime<Utc>,
}
