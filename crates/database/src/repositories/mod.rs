pub mod devices;
pub mod login_requests;
pub mod sessions;
pub mod suspicious_logins;
