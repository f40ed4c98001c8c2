use thiserror::Error;

pub type Result<T> = std::result::Result<T, DeviceAuthError>;

#[derive(Debug, Error)]
pub enum DeviceAuthError {
    #[error("Missing required parameters")]
    MissingParameters,

    #[error("Login request not found")]
    NotFound,

    /// The request already reached a terminal state; surfaced distinctly so
    /// repeat clicks don't read as generic failures.
    #[error("Request already {status}")]
    AlreadyProcessed { status: String },

    #[error("Login request has expired")]
    Expired,

    /// The link's secret token (or its identifiers) don't match the request.
    #[error("This approval link is not valid")]
    InvalidLink,

    #[error("Failed to send approval email: {0}")]
    Dispatch(String),

    #[error("Database error: {0}")]
    Database(#[from] telecare_database::DatabaseError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl DeviceAuthError {
    pub fn already(status: impl std::fmt::Display) -> Self {
        Self::AlreadyProcessed {
            status: status.to_string(),
        }
    }
}
