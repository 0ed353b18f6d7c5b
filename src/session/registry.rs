//! Session Registry
//!
//! Table of live sessions behind a reader/writer lock. The lock guards the
//! map only: every transport call happens on a cloned record handle after
//! the guard is dropped.

use std::collections::HashMap;
use std::sync::Arc;

use bytes::Bytes;
use parking_lot::RwLock;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::asset::AssetDirectory;
use super::audit::{AuditEvent, AuditSink, TracingAuditSink};
use super::clock::{Clock, SystemClock};
use super::types::{CloseReason, CreateSessionRequest, SessionInfo, SessionRecord};
use crate::bridge::{spawn_output_multiplexer, BatchPolicy};
use crate::credential::CredentialResolver;
use crate::error::GatewayError;
use crate::ssh::{ShellConnector, TerminalGeometry};

pub struct SessionRegistry {
    sessions: RwLock<HashMap<String, Arc<SessionRecord>>>,
    resolver: CredentialResolver,
    assets: Arc<dyn AssetDirectory>,
    connector: Arc<dyn ShellConnector>,
    audit: Arc<dyn AuditSink>,
    clock: Arc<dyn Clock>,
    batch_policy: BatchPolicy,
}

impl SessionRegistry {
    pub fn new(
        resolver: CredentialResolver,
        assets: Arc<dyn AssetDirectory>,
        connector: Arc<dyn ShellConnector>,
    ) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            resolver,
            assets,
            connector,
            audit: Arc::new(TracingAuditSink),
            clock: Arc::new(SystemClock),
            batch_policy: BatchPolicy::default(),
        }
    }

    pub fn with_audit(mut self, audit: Arc<dyn AuditSink>) -> Self {
        self.audit = audit;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_batch_policy(mut self, policy: BatchPolicy) -> Self {
        self.batch_policy = policy;
        self
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// Open a shell on the requested asset and register it.
    ///
    /// The resolved credential is moved into the connector and gone by the
    /// time this returns.
    pub async fn create(&self, request: CreateSessionRequest) -> Result<String, GatewayError> {
        let endpoint = self.assets.lookup(&request.asset_id).await?;
        let target = endpoint.target();
        let credential = self.resolver.resolve(&request.credential).await?;
        let geometry = request.geometry();

        debug!(
            "Opening session for {} on asset {} ({}, {}x{})",
            request.caller, request.asset_id, target, geometry.cols, geometry.rows
        );

        let shell = match self.connector.open_shell(&target, credential, geometry).await {
            Ok(shell) => shell,
            Err(e) => {
                warn!(
                    "Connect to asset {} ({}) failed for {}: {}",
                    request.asset_id, target, request.caller, e
                );
                self.audit.record(AuditEvent::ConnectFailed {
                    asset_id: request.asset_id.clone(),
                    caller: request.caller.clone(),
                    target: target.to_string(),
                    error: e.to_string(),
                });
                return Err(GatewayError::Connect(e));
            }
        };

        let session_id = Uuid::new_v4().to_string();
        let record = Arc::new(SessionRecord::new(
            session_id.clone(),
            &request,
            target.clone(),
            shell.input,
            shell.output,
            geometry,
            self.clock.now(),
        ));

        self.sessions.write().insert(session_id.clone(), record);

        info!(
            "Session {} created: {} -> {} ({})",
            session_id, request.caller, request.asset_id, target
        );
        self.audit.record(AuditEvent::Connect {
            session_id: session_id.clone(),
            asset_id: request.asset_id,
            caller: request.caller,
            target: target.to_string(),
        });

        Ok(session_id)
    }

    pub fn get(&self, session_id: &str) -> Result<Arc<SessionRecord>, GatewayError> {
        self.sessions
            .read()
            .get(session_id)
            .cloned()
            .ok_or_else(|| GatewayError::SessionNotFound(session_id.to_string()))
    }

    pub fn contains(&self, session_id: &str) -> bool {
        self.sessions.read().contains_key(session_id)
    }

    /// Forward client input to the remote shell.
    ///
    /// A dead transport tears the session down before the error is returned.
    pub async fn write(&self, session_id: &str, data: Bytes) -> Result<(), GatewayError> {
        let record = self.get(session_id)?;

        if let Err(e) = record.input().write(data).await {
            warn!("Write to session {} failed: {}", session_id, e);
            if let Err(close_err) = self.close(session_id, CloseReason::WriteFailed) {
                debug!("Session {} already gone: {}", session_id, close_err);
            }
            return Err(GatewayError::Transport(e));
        }

        record.touch(self.clock.now());
        Ok(())
    }

    /// Change the remote PTY size.
    ///
    /// Waits for the remote to answer the window change; the recorded
    /// geometry only changes once it has been accepted.
    pub async fn resize(&self, session_id: &str, cols: u32, rows: u32) -> Result<(), GatewayError> {
        let record = self.get(session_id)?;
        let geometry =
            TerminalGeometry::new(cols, rows).ok_or(GatewayError::InvalidGeometry { cols, rows })?;

        record
            .input()
            .resize(geometry)
            .await
            .map_err(GatewayError::Transport)?;
        record.set_geometry(geometry);

        debug!("Session {} resized to {}x{}", session_id, cols, rows);
        Ok(())
    }

    /// Remove a session and release its transport.
    ///
    /// Only the caller that removes the entry tears it down and emits the
    /// disconnect event; any later close reports `SessionNotFound`.
    pub fn close(&self, session_id: &str, reason: CloseReason) -> Result<(), GatewayError> {
        let record = self
            .sessions
            .write()
            .remove(session_id)
            .ok_or_else(|| GatewayError::SessionNotFound(session_id.to_string()))?;

        record.input().close();

        let duration = record.age(self.clock.now());
        info!(
            "Session {} closed ({}) after {}s",
            session_id,
            reason,
            duration.as_secs()
        );
        self.audit.record(AuditEvent::Disconnect {
            session_id: record.id.clone(),
            asset_id: record.asset_id.clone(),
            caller: record.caller.clone(),
            duration_secs: duration.as_secs(),
            reason,
        });

        Ok(())
    }

    /// Start forwarding the session's output into `sink`.
    ///
    /// Each session has one output stream, so this succeeds once.
    pub fn attach_output(
        self: &Arc<Self>,
        session_id: &str,
        sink: mpsc::Sender<Bytes>,
    ) -> Result<(), GatewayError> {
        let record = self.get(session_id)?;
        let output = record
            .take_output()
            .ok_or_else(|| GatewayError::OutputAlreadyAttached(session_id.to_string()))?;

        spawn_output_multiplexer(self.clone(), record, output, sink, self.batch_policy);
        debug!("Output multiplexer attached for session {}", session_id);
        Ok(())
    }

    pub fn list(&self) -> Vec<SessionInfo> {
        self.sessions.read().values().map(|r| r.info()).collect()
    }

    /// Handles to every live session
    pub fn snapshot(&self) -> Vec<Arc<SessionRecord>> {
        self.sessions.read().values().cloned().collect()
    }

    pub fn count(&self) -> usize {
        self.sessions.read().len()
    }

    /// Close every session; returns how many this call closed
    pub fn close_all(&self, reason: CloseReason) -> usize {
        let ids: Vec<String> = self.sessions.read().keys().cloned().collect();
        ids.iter()
            .filter(|id| self.close(id, reason).is_ok())
            .count()
    }
}
