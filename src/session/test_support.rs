//! In-process fakes shared by the session tests

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::oneshot;
use uuid::Uuid;

use super::asset::{AssetEndpoint, StaticAssetDirectory};
use super::audit::{AuditEvent, AuditSink};
use super::clock::ManualClock;
use super::registry::SessionRegistry;
use crate::credential::{CredentialResolver, CredentialStore, ResolveError, ResolvedCredential, StoredCredential};
use crate::crypto::SecretCipher;
use crate::ssh::{
    ConnectTarget, RemoteShell, ShellCommand, ShellConnector, ShellTransport, SshError,
    TerminalGeometry,
};

type FailureFactory = Box<dyn Fn() -> SshError + Send + Sync>;

/// Shell that echoes input back and exits on `exit`
#[derive(Default)]
pub(crate) struct FakeConnector {
    dials: AtomicUsize,
    stall_input: AtomicBool,
    refuse_resize: AtomicBool,
    failure: Mutex<Option<FailureFactory>>,
    resizes: Arc<Mutex<Vec<TerminalGeometry>>>,
    kill_switches: Mutex<Vec<oneshot::Sender<()>>>,
}

impl FakeConnector {
    pub(crate) fn dial_count(&self) -> usize {
        self.dials.load(Ordering::SeqCst)
    }

    pub(crate) fn fail_with(&self, factory: impl Fn() -> SshError + Send + Sync + 'static) {
        *self.failure.lock() = Some(Box::new(factory));
    }

    pub(crate) fn resizes(&self) -> Vec<TerminalGeometry> {
        self.resizes.lock().clone()
    }

    /// New shells hang forever on their first input chunk
    pub(crate) fn stall_input(&self) {
        self.stall_input.store(true, Ordering::SeqCst);
    }

    /// New shells answer window changes with an error
    pub(crate) fn refuse_resize(&self) {
        self.refuse_resize.store(true, Ordering::SeqCst);
    }

    /// Drop every live fake transport
    pub(crate) fn kill_all(&self) {
        for switch in self.kill_switches.lock().drain(..) {
            let _ = switch.send(());
        }
    }
}

#[async_trait]
impl ShellConnector for FakeConnector {
    async fn open_shell(
        &self,
        _target: &ConnectTarget,
        _credential: ResolvedCredential,
        _geometry: TerminalGeometry,
    ) -> Result<RemoteShell, SshError> {
        self.dials.fetch_add(1, Ordering::SeqCst);
        let failure = self.failure.lock().as_ref().map(|factory| factory());
        if let Some(e) = failure {
            return Err(e);
        }

        let (shell, transport) = RemoteShell::channel_pair();
        let ShellTransport {
            mut commands,
            output,
            closed,
        } = transport;
        let (kill_tx, mut kill_rx) = oneshot::channel();
        self.kill_switches.lock().push(kill_tx);
        let resizes = self.resizes.clone();
        let stall = self.stall_input.load(Ordering::SeqCst);
        let refuse_resize = self.refuse_resize.load(Ordering::SeqCst);

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = closed.cancelled() => break,
                    cmd = commands.recv() => match cmd {
                        // Stuck remote: holds the output stream and ignores close
                        Some(ShellCommand::Data(_)) if stall => std::future::pending::<()>().await,
                        Some(ShellCommand::Data(data)) if data == "exit" => break,
                        Some(ShellCommand::Data(data)) => {
                            if output.send(data).await.is_err() {
                                break;
                            }
                        }
                        Some(ShellCommand::Resize(geometry, ack)) => {
                            if refuse_resize {
                                let _ = ack.send(Err(SshError::ProtocolError(
                                    "window change refused".into(),
                                )));
                            } else {
                                resizes.lock().push(geometry);
                                let _ = ack.send(Ok(()));
                            }
                        }
                        None => break,
                    },
                    _ = &mut kill_rx => break,
                }
            }
        });

        Ok(shell)
    }
}

#[derive(Default)]
pub(crate) struct RecordingAudit {
    events: Mutex<Vec<AuditEvent>>,
}

impl RecordingAudit {
    pub(crate) fn events(&self) -> Vec<AuditEvent> {
        self.events.lock().clone()
    }

    pub(crate) fn kinds(&self) -> Vec<&'static str> {
        self.events.lock().iter().map(AuditEvent::kind).collect()
    }
}

impl AuditSink for RecordingAudit {
    fn record(&self, event: AuditEvent) {
        self.events.lock().push(event);
    }
}

struct EmptyStore;

#[async_trait]
impl CredentialStore for EmptyStore {
    async fn fetch(&self, _id: Uuid) -> Result<Option<StoredCredential>, ResolveError> {
        Ok(None)
    }
}

pub(crate) struct Harness {
    pub registry: SessionRegistry,
    pub connector: Arc<FakeConnector>,
    pub audit: Arc<RecordingAudit>,
    pub clock: Arc<ManualClock>,
}

/// Registry over fakes with one asset, `web-01`
pub(crate) fn harness() -> Harness {
    let cipher = Arc::new(SecretCipher::from_passphrase("session-tests").unwrap());
    let resolver = CredentialResolver::new(Arc::new(EmptyStore), cipher);
    let assets = StaticAssetDirectory::new().with_asset("web-01", AssetEndpoint::new("10.0.0.1", 22));
    let connector = Arc::new(FakeConnector::default());
    let audit = Arc::new(RecordingAudit::default());
    let clock = Arc::new(ManualClock::new());

    let registry = SessionRegistry::new(resolver, Arc::new(assets), connector.clone())
        .with_audit(audit.clone())
        .with_clock(clock.clone());

    Harness {
        registry,
        connector,
        audit,
        clock,
    }
}
