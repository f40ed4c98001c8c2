pub mod connection;
pub mod error;
pub mod repositories;

pub use connection::{Database, DatabaseConfig};
pub use error::{DatabaseError, Result};
pub use repositories::{
    devices::DeviceRepository, login_requests::LoginRequestRepository,
    sessions::SessionRepository, suspicious_logins::SuspiciousLoginRepository,
};
