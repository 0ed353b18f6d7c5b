//! Session Management Module
//!
//! - Session registry keyed by opaque ids, guarded by a reader/writer lock
//! - Asset lookup and audit collaborators
//! - Background reaper for idle and over-age sessions

mod asset;
mod audit;
mod clock;
mod reaper;
mod registry;
#[cfg(test)]
pub(crate) mod test_support;
mod types;

pub use asset::{
    AssetDirectory, AssetEndpoint, AssetError, StaticAssetDirectory, DEFAULT_HOST,
    DEFAULT_SSH_PORT,
};
pub use audit::{AuditEvent, AuditSink, TracingAuditSink};
pub use clock::{Clock, ManualClock, SystemClock};
pub use reaper::{ReaperHandle, ReaperPolicy, SessionReaper};
pub use registry::SessionRegistry;
pub use types::{CloseReason, CreateSessionRequest, SessionInfo, SessionRecord};
