//! Client-side pieces of the device-trust flow: the persisted device
//! identity and the waiting-room poller that watches an approval handshake
//! until it resolves.

pub mod http;
pub mod identity;
pub mod poller;

pub use http::HttpStatusSource;
pub use identity::{DeviceIdentityProvider, FileStore, IdentityError, KeyValueStore};
pub use poller::{ApprovalStatusSource, ApprovalWaiter, SourceError, WaitState};
