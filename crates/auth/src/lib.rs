pub mod approval;
pub mod device_trust;
pub mod email;
pub mod error;
pub mod suspicious;

pub use approval::LoginApprovalService;
pub use device_trust::{derived_device_id, DeviceTrustService};
pub use email::{EmailMessage, EmailProvider, EmailService};
pub use error::{DeviceAuthError, Result};
pub use suspicious::{
    SuspiciousLoginService, SuspiciousLoginSubscription, SuspiciousLoginWatcher,
};
