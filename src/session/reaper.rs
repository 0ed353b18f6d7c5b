//! Session Reaper
//!
//! Periodically closes sessions that sat idle too long or outlived the
//! absolute age cap. Activity only resets the idle timer; the age cap is
//! unconditional.

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use super::registry::SessionRegistry;
use super::types::{CloseReason, SessionRecord};

/// Expiry limits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReaperPolicy {
    /// Seconds between sweeps
    #[serde(default = "default_interval")]
    pub interval_secs: u64,
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_secs: u64,
    #[serde(default = "default_max_age")]
    pub max_age_secs: u64,
}

fn default_interval() -> u64 {
    300
}

fn default_idle_timeout() -> u64 {
    30 * 60
}

fn default_max_age() -> u64 {
    2 * 60 * 60
}

impl Default for ReaperPolicy {
    fn default() -> Self {
        Self {
            interval_secs: default_interval(),
            idle_timeout_secs: default_idle_timeout(),
            max_age_secs: default_max_age(),
        }
    }
}

impl ReaperPolicy {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs.max(1))
    }

    /// Whether a record has expired at `now`, and why
    pub fn verdict(&self, record: &SessionRecord, now: Instant) -> Option<CloseReason> {
        if record.age(now) > Duration::from_secs(self.max_age_secs) {
            Some(CloseReason::MaxAge)
        } else if record.idle(now) > Duration::from_secs(self.idle_timeout_secs) {
            Some(CloseReason::IdleTimeout)
        } else {
            None
        }
    }
}

pub struct SessionReaper {
    registry: Arc<SessionRegistry>,
    policy: ReaperPolicy,
}

impl SessionReaper {
    pub fn new(registry: Arc<SessionRegistry>, policy: ReaperPolicy) -> Self {
        Self { registry, policy }
    }

    /// One pass over the registry; returns the sessions this pass closed.
    ///
    /// Expired ids are collected from a snapshot, then closed one by one, so
    /// the map lock is never held across a teardown.
    pub fn sweep(&self) -> Vec<(String, CloseReason)> {
        let now = self.registry.clock().now();
        let expired: Vec<(String, CloseReason)> = self
            .registry
            .snapshot()
            .iter()
            .filter_map(|record| {
                self.policy
                    .verdict(record, now)
                    .map(|reason| (record.id.clone(), reason))
            })
            .collect();

        expired
            .into_iter()
            .filter(|(id, reason)| match self.registry.close(id, *reason) {
                Ok(()) => true,
                Err(e) => {
                    // Closed by another path between snapshot and close
                    debug!("Reaper skipped session {}: {}", id, e);
                    false
                }
            })
            .collect()
    }

    /// Run sweeps on the policy interval until the handle is shut down
    pub fn spawn(self) -> ReaperHandle {
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel::<()>();
        let period = self.policy.interval();

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
            info!("Session reaper started (every {}s)", period.as_secs());

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let reaped = self.sweep();
                        if !reaped.is_empty() {
                            info!("Reaper closed {} expired session(s)", reaped.len());
                        }
                    }
                    _ = &mut shutdown_rx => break,
                }
            }

            info!("Session reaper stopped");
        });

        ReaperHandle {
            shutdown_tx: Some(shutdown_tx),
            task,
        }
    }
}

/// Control handle for a running reaper
pub struct ReaperHandle {
    shutdown_tx: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
}

impl ReaperHandle {
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        let _ = self.task.await;
    }
}
