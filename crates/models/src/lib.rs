pub mod device;
pub mod login_request;
pub mod session;
pub mod suspicious;

pub use device::{DeviceMetadata, DeviceSummary, DeviceTrust, TrustedDevice};
pub use login_request::{
    CreateLoginRequest, LoginRequest, LoginRequestCreated, LoginRequestStatus,
};
pub use session::Session;
pub use suspicious::{ReportSuspiciousLogin, SuspiciousLogin, SuspiciousLoginStatus};
