//! Session Types and Data Structures

use std::fmt;
use std::time::{Duration, Instant};

use bytes::Bytes;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::credential::CredentialRequest;
use crate::ssh::{ConnectTarget, ShellInput, TerminalGeometry};

/// Request to open a terminal session on an asset
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateSessionRequest {
    /// Target asset identifier
    pub asset_id: String,
    /// Authenticated caller identity
    pub caller: String,
    #[serde(flatten)]
    pub credential: CredentialRequest,
    /// Initial terminal columns (non-positive or absent means 80)
    #[serde(default)]
    pub cols: Option<i64>,
    /// Initial terminal rows (non-positive or absent means 24)
    #[serde(default)]
    pub rows: Option<i64>,
}

impl CreateSessionRequest {
    pub fn new(
        asset_id: impl Into<String>,
        caller: impl Into<String>,
        credential: CredentialRequest,
    ) -> Self {
        Self {
            asset_id: asset_id.into(),
            caller: caller.into(),
            credential,
            cols: None,
            rows: None,
        }
    }

    pub fn with_size(mut self, cols: i64, rows: i64) -> Self {
        self.cols = Some(cols);
        self.rows = Some(rows);
        self
    }

    pub fn geometry(&self) -> TerminalGeometry {
        TerminalGeometry::normalized(self.cols.unwrap_or(0), self.rows.unwrap_or(0))
    }
}

/// Why a session was torn down
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CloseReason {
    /// Client socket went away
    ClientClosed,
    /// Remote shell or connection ended
    RemoteEnded,
    IdleTimeout,
    MaxAge,
    Shutdown,
    /// Writing to the remote input failed
    WriteFailed,
    /// Explicit close from the host application
    Requested,
}

impl CloseReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            CloseReason::ClientClosed => "client_closed",
            CloseReason::RemoteEnded => "remote_ended",
            CloseReason::IdleTimeout => "idle_timeout",
            CloseReason::MaxAge => "max_age",
            CloseReason::Shutdown => "shutdown",
            CloseReason::WriteFailed => "write_failed",
            CloseReason::Requested => "requested",
        }
    }
}

impl fmt::Display for CloseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One live session.
///
/// Owns the shell input handle and, until the multiplexer attaches, the
/// output stream. Dropping the last reference releases the transport.
pub struct SessionRecord {
    pub id: String,
    pub asset_id: String,
    pub caller: String,
    pub target: ConnectTarget,
    input: ShellInput,
    output: Mutex<Option<mpsc::Receiver<Bytes>>>,
    geometry: Mutex<TerminalGeometry>,
    created_at: Instant,
    created_wall: DateTime<Utc>,
    last_activity: Mutex<Instant>,
}

impl SessionRecord {
    pub(crate) fn new(
        id: String,
        request: &CreateSessionRequest,
        target: ConnectTarget,
        input: ShellInput,
        output: mpsc::Receiver<Bytes>,
        geometry: TerminalGeometry,
        now: Instant,
    ) -> Self {
        Self {
            id,
            asset_id: request.asset_id.clone(),
            caller: request.caller.clone(),
            target,
            input,
            output: Mutex::new(Some(output)),
            geometry: Mutex::new(geometry),
            created_at: now,
            created_wall: Utc::now(),
            last_activity: Mutex::new(now),
        }
    }

    pub fn input(&self) -> &ShellInput {
        &self.input
    }

    /// Take the output stream; `None` once taken
    pub(crate) fn take_output(&self) -> Option<mpsc::Receiver<Bytes>> {
        self.output.lock().take()
    }

    pub fn geometry(&self) -> TerminalGeometry {
        *self.geometry.lock()
    }

    pub(crate) fn set_geometry(&self, geometry: TerminalGeometry) {
        *self.geometry.lock() = geometry;
    }

    /// Record activity at `now`
    pub fn touch(&self, now: Instant) {
        let mut last = self.last_activity.lock();
        if now > *last {
            *last = now;
        }
    }

    pub fn created_at(&self) -> Instant {
        self.created_at
    }

    pub fn last_activity(&self) -> Instant {
        *self.last_activity.lock()
    }

    pub fn idle(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.last_activity())
    }

    pub fn age(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.created_at)
    }

    pub fn info(&self) -> SessionInfo {
        let active_for = self.last_activity().saturating_duration_since(self.created_at);
        let last_active_at = self.created_wall
            + chrono::Duration::from_std(active_for).unwrap_or_else(|_| chrono::Duration::zero());

        SessionInfo {
            id: self.id.clone(),
            asset_id: self.asset_id.clone(),
            caller: self.caller.clone(),
            target: self.target.to_string(),
            geometry: self.geometry(),
            created_at: self.created_wall,
            last_active_at,
        }
    }
}

impl fmt::Debug for SessionRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionRecord")
            .field("id", &self.id)
            .field("asset_id", &self.asset_id)
            .field("caller", &self.caller)
            .field("target", &self.target)
            .field("geometry", &self.geometry())
            .finish_non_exhaustive()
    }
}

/// Session snapshot for listings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionInfo {
    pub id: String,
    pub asset_id: String,
    pub caller: String,
    pub target: String,
    pub geometry: TerminalGeometry,
    pub created_at: DateTime<Utc>,
    pub last_active_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ssh::RemoteShell;

    #[test]
    fn test_request_geometry_defaults() {
        let request = CreateSessionRequest::new("a", "c", CredentialRequest::inline("u", "p"));
        assert_eq!(request.geometry(), TerminalGeometry { cols: 80, rows: 24 });

        let sized = request.with_size(-1, 50);
        assert_eq!(sized.geometry(), TerminalGeometry { cols: 80, rows: 50 });
    }

    #[test]
    fn test_request_deserialize_flattened_credential() {
        let request: CreateSessionRequest = serde_json::from_str(
            r#"{"asset_id":"web-01","caller":"alice","username":"root","password":"pw","cols":120}"#,
        )
        .unwrap();

        assert_eq!(request.credential.username.as_deref(), Some("root"));
        assert!(request.credential.credential_id.is_none());
        assert_eq!(request.geometry(), TerminalGeometry { cols: 120, rows: 24 });
    }

    #[test]
    fn test_close_reason_names() {
        assert_eq!(CloseReason::MaxAge.to_string(), "max_age");
        assert_eq!(
            serde_json::to_string(&CloseReason::ClientClosed).unwrap(),
            r#""client_closed""#
        );
    }

    #[test]
    fn test_record_activity_tracking() {
        let (shell, _transport) = RemoteShell::channel_pair();
        let now = Instant::now();
        let request = CreateSessionRequest::new("a", "c", CredentialRequest::inline("u", "p"));
        let record = SessionRecord::new(
            "s1".to_string(),
            &request,
            ConnectTarget::new("localhost", 22),
            shell.input,
            shell.output,
            TerminalGeometry::default(),
            now,
        );

        let later = now + Duration::from_secs(600);
        assert_eq!(record.idle(later), Duration::from_secs(600));

        record.touch(later);
        assert_eq!(record.idle(later), Duration::ZERO);
        assert_eq!(record.age(later), Duration::from_secs(600));

        // Activity never moves backwards
        record.touch(now);
        assert_eq!(record.last_activity(), later);

        assert!(record.take_output().is_some());
        assert!(record.take_output().is_none());
    }
}
