//! SSH shell session
//!
//! A live shell is owned by exactly one channel task. The task holds both the
//! connection `Handle` and the session `Channel`, so the transport is torn
//! down once, when the task exits, whichever side ended it.

use std::time::Duration;

use bytes::Bytes;
use russh::client::{Handle, Msg};
use russh::{Channel, ChannelMsg, Disconnect};
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::client::ClientHandler;
use super::error::SshError;
use super::config::TerminalGeometry;

/// Output chunks buffered between the channel task and the multiplexer
pub const OUTPUT_CHANNEL_CAPACITY: usize = 1024;
/// Pending commands (input, resize) per shell
const COMMAND_CHANNEL_CAPACITY: usize = 1024;
/// Upper bound for EOF, channel close and disconnect on teardown
const TEARDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// Commands that can be sent to the shell task
#[derive(Debug)]
pub enum ShellCommand {
    /// Bytes for the remote PTY input
    Data(Bytes),
    /// Window change request; the outcome is reported on the sender
    Resize(TerminalGeometry, oneshot::Sender<Result<(), SshError>>),
}

/// Write side of a remote shell (input, resize, close)
///
/// Close does not travel through the command queue: it cancels a token the
/// transport watches ahead of any pending input.
#[derive(Debug, Clone)]
pub struct ShellInput {
    cmd_tx: mpsc::Sender<ShellCommand>,
    closed: CancellationToken,
}

impl ShellInput {
    pub fn new(cmd_tx: mpsc::Sender<ShellCommand>, closed: CancellationToken) -> Self {
        Self { cmd_tx, closed }
    }

    /// Queue bytes for the remote input stream
    pub async fn write(&self, data: Bytes) -> Result<(), SshError> {
        tokio::select! {
            biased;
            _ = self.closed.cancelled() => Err(SshError::Disconnected),
            sent = self.cmd_tx.send(ShellCommand::Data(data)) => {
                sent.map_err(|_| SshError::Disconnected)
            }
        }
    }

    /// Change the PTY window and wait for the remote to accept it
    pub async fn resize(&self, geometry: TerminalGeometry) -> Result<(), SshError> {
        let (ack_tx, ack_rx) = oneshot::channel();
        let request = async {
            if self
                .cmd_tx
                .send(ShellCommand::Resize(geometry, ack_tx))
                .await
                .is_err()
            {
                return Err(SshError::Disconnected);
            }
            ack_rx.await.unwrap_or(Err(SshError::Disconnected))
        };

        tokio::select! {
            biased;
            _ = self.closed.cancelled() => Err(SshError::Disconnected),
            result = request => result,
        }
    }

    /// Shut the shell down. Never waits, and overtakes queued input.
    pub fn close(&self) {
        if self.closed.is_cancelled() {
            debug!("Close on already closed shell");
        }
        self.closed.cancel();
    }

    /// Resolves once [`ShellInput::close`] has been called
    pub async fn closed(&self) {
        self.closed.cancelled().await
    }

    /// Whether the shell was closed or its task has exited
    pub fn is_closed(&self) -> bool {
        self.closed.is_cancelled() || self.cmd_tx.is_closed()
    }
}

/// An interactive remote shell: input handle plus output stream
#[derive(Debug)]
pub struct RemoteShell {
    pub input: ShellInput,
    pub output: mpsc::Receiver<Bytes>,
}

/// The ends a transport task drives for a [`RemoteShell`]
#[derive(Debug)]
pub struct ShellTransport {
    pub commands: mpsc::Receiver<ShellCommand>,
    pub output: mpsc::Sender<Bytes>,
    /// Cancelled when the shell is closed
    pub closed: CancellationToken,
}

impl RemoteShell {
    /// Build a shell around fresh channels, plus its transport end
    pub fn channel_pair() -> (Self, ShellTransport) {
        let (cmd_tx, cmd_rx) = mpsc::channel(COMMAND_CHANNEL_CAPACITY);
        let (output_tx, output_rx) = mpsc::channel(OUTPUT_CHANNEL_CAPACITY);
        let closed = CancellationToken::new();
        (
            Self {
                input: ShellInput::new(cmd_tx, closed.clone()),
                output: output_rx,
            },
            ShellTransport {
                commands: cmd_rx,
                output: output_tx,
                closed,
            },
        )
    }
}

/// Spawn the channel task for a started shell and return its handles
pub(crate) fn spawn_shell_task(
    handle: Handle<ClientHandler>,
    channel: Channel<Msg>,
    label: String,
) -> RemoteShell {
    let (shell, transport) = RemoteShell::channel_pair();
    tokio::spawn(run_shell_task(handle, channel, transport, label));
    shell
}

async fn run_shell_task(
    handle: Handle<ClientHandler>,
    mut channel: Channel<Msg>,
    transport: ShellTransport,
    label: String,
) {
    let ShellTransport {
        commands: mut cmd_rx,
        output: output_tx,
        closed,
    } = transport;

    debug!("Shell channel task started for {}", label);

    loop {
        tokio::select! {
            biased;

            _ = closed.cancelled() => {
                info!("Close requested for {}", label);
                break;
            }

            cmd = cmd_rx.recv() => {
                match cmd {
                    Some(ShellCommand::Data(data)) => {
                        // A full remote window parks here; close must still get through
                        let written = tokio::select! {
                            biased;
                            _ = closed.cancelled() => None,
                            result = channel.data(&data[..]) => Some(result),
                        };
                        match written {
                            Some(Ok(())) => {}
                            Some(Err(e)) => {
                                warn!("Failed to write to SSH channel for {}: {}", label, e);
                                break;
                            }
                            None => {
                                info!("Close requested for {} with input pending", label);
                                break;
                            }
                        }
                    }
                    Some(ShellCommand::Resize(geometry, ack)) => {
                        let result = channel
                            .window_change(geometry.cols, geometry.rows, 0, 0)
                            .await
                            .map_err(SshError::from);
                        match &result {
                            Ok(()) => debug!(
                                "PTY resized to {}x{} for {}",
                                geometry.cols, geometry.rows, label
                            ),
                            Err(e) => warn!("Failed to resize PTY for {}: {}", label, e),
                        }
                        let _ = ack.send(result);
                    }
                    None => {
                        debug!("All shell inputs dropped for {}", label);
                        break;
                    }
                }
            }

            msg = channel.wait() => {
                match msg {
                    Some(ChannelMsg::Data { data }) => {
                        if output_tx.send(Bytes::copy_from_slice(&data)).await.is_err() {
                            debug!("Output receiver dropped for {}", label);
                            break;
                        }
                    }
                    Some(ChannelMsg::ExtendedData { data, ext }) => {
                        // ext 1 is stderr; the PTY merges it into the terminal
                        if ext == 1
                            && output_tx.send(Bytes::copy_from_slice(&data)).await.is_err()
                        {
                            break;
                        }
                    }
                    Some(ChannelMsg::ExitStatus { exit_status }) => {
                        info!("Remote shell exited with status {} for {}", exit_status, label);
                    }
                    Some(ChannelMsg::Eof) | Some(ChannelMsg::Close) | None => {
                        info!("SSH channel closed by remote for {}", label);
                        break;
                    }
                    Some(_) => {}
                }
            }
        }
    }

    // Output receiver sees end-of-stream from here on
    drop(output_tx);
    drop(cmd_rx);

    let teardown = async {
        let _ = channel.eof().await;
        let _ = channel.close().await;
        let _ = handle
            .disconnect(Disconnect::ByApplication, "Session closed", "en")
            .await;
    };
    if tokio::time::timeout(TEARDOWN_TIMEOUT, teardown).await.is_err() {
        warn!("Transport teardown timed out for {}", label);
    }

    info!("Shell channel task terminated for {}", label);
}
