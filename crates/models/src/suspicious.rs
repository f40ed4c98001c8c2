use crate::device::DeviceMetadata;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Resolution state of a flagged sign-in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SuspiciousLoginStatus {
    Unverified,
    Verified,
    Rejected,
}

impl SuspiciousLoginStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unverified => "unverified",
            Self::Verified => "verified",
            Self::Rejected => "rejected",
        }
    }
}

impl std::fmt::Display for SuspiciousLoginStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for SuspiciousLoginStatus {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "unverified" => Ok(Self::Unverified),
            "verified" => Ok(Self::Verified),
            "rejected" => Ok(Self::Rejected),
            _ => Err(()),
        }
    }
}

/// One flagged session awaiting the account owner's "this was me" /
/// "this wasn't me" answer.
///
/// Unlike a login request, resolving this record acts on a live session:
/// verification marks the session trusted, rejection deletes it outright.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct SuspiciousLogin {
    pub id: Uuid,
    pub user_id: Uuid,
    pub session_id: Uuid,

    pub status: String,

    #[sqlx(json)]
    pub device_info: DeviceMetadata,

    pub ip_address: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl SuspiciousLogin {
    pub fn status(&self) -> Option<SuspiciousLoginStatus> {
        self.status.parse().ok()
    }

    pub fn is_unverified(&self) -> bool {
        self.status == SuspiciousLoginStatus::Unverified.as_str()
    }
}

/// Inbound body from the (out-of-scope) login heuristics that flag a session.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportSuspiciousLogin {
    pub user_id: Uuid,
    pub session_id: Uuid,

    #[serde(default)]
    pub device_info: DeviceMetadata,

    pub ip_address: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_round_trip() {
        for status in [
            SuspiciousLoginStatus::Unverified,
            SuspiciousLoginStatus::Verified,
            SuspiciousLoginStatus::Rejected,
        ] {
            let parsed: SuspiciousLoginStatus = status.as_str().parse().unwrap();
            assert_eq!(parsed, status);
        }

        assert!("flagged".parse::<SuspiciousLoginStatus>().is_err());
    }
}
