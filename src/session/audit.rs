//! Audit events for session lifecycle
//!
//! The gateway only emits; storing the trail belongs to the host application.

use serde::Serialize;
use tracing::info;

use super::types::CloseReason;

/// One lifecycle event
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum AuditEvent {
    Connect {
        session_id: String,
        asset_id: String,
        caller: String,
        target: String,
    },
    ConnectFailed {
        asset_id: String,
        caller: String,
        target: String,
        error: String,
    },
    Disconnect {
        session_id: String,
        asset_id: String,
        caller: String,
        duration_secs: u64,
        reason: CloseReason,
    },
}

impl AuditEvent {
    /// Event name as written to the trail
    pub fn kind(&self) -> &'static str {
        match self {
            AuditEvent::Connect { .. } => "connect",
            AuditEvent::ConnectFailed { .. } => "connect_failed",
            AuditEvent::Disconnect { .. } => "disconnect",
        }
    }
}

/// Write-only, fire-and-forget audit destination.
///
/// Called inline on the session path, so implementations must not block;
/// hand off to a channel if the backing store is slow.
pub trait AuditSink: Send + Sync {
    fn record(&self, event: AuditEvent);
}

/// Writes audit events to the `termgate::audit` tracing target
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn record(&self, event: AuditEvent) {
        match serde_json::to_string(&event) {
            Ok(json) => info!(target: "termgate::audit", kind = event.kind(), "{}", json),
            Err(e) => info!(target: "termgate::audit", kind = event.kind(), "unserializable event: {}", e),
        }
    }
}
