//! WebSocket Server for the terminal bridge
//!
//! Clients connect to `<path_prefix><session-id>` after creating a session
//! out of band. Server-to-client frames are binary batches of remote output;
//! client frames are parsed by [`ClientFrame`].

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tokio_tungstenite::{accept_hdr_async, WebSocketStream};
use tracing::{debug, error, info, warn};

use super::protocol::{error_payload, ClientFrame};
use crate::error::GatewayError;
use crate::session::{CloseReason, SessionRegistry};
use crate::ssh::SshError;

/// WebSocket handshake timeout (seconds)
const WS_ACCEPT_TIMEOUT_SECS: u64 = 10;

/// Listener settings for the client duplex
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BridgeConfig {
    /// Address the WebSocket listener binds to
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,

    /// Request path prefix; the session id follows it
    #[serde(default = "default_path_prefix")]
    pub path_prefix: String,

    /// Outbound frames buffered per connection
    #[serde(default = "default_frame_channel_capacity")]
    pub frame_channel_capacity: usize,

    /// A client that cannot take a frame within this many seconds is dropped
    #[serde(default = "default_send_timeout")]
    pub send_timeout_secs: u64,
}

fn default_listen_addr() -> String {
    "127.0.0.1:7681".to_string()
}

fn default_path_prefix() -> String {
    "/ws/".to_string()
}

fn default_frame_channel_capacity() -> usize {
    4096
}

fn default_send_timeout() -> u64 {
    5
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            path_prefix: default_path_prefix(),
            frame_channel_capacity: default_frame_channel_capacity(),
            send_timeout_secs: default_send_timeout(),
        }
    }
}

/// Extract the session id from a request path
fn session_id_from_path<'a>(path: &'a str, prefix: &str) -> Option<&'a str> {
    let id = path.strip_prefix(prefix)?.trim_end_matches('/');
    (!id.is_empty() && !id.contains('/')).then_some(id)
}

/// Running WebSocket listener
pub struct BridgeServer {
    local_addr: SocketAddr,
    shutdown_tx: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
}

impl BridgeServer {
    /// Bind the listener and start accepting clients
    pub async fn bind(
        config: BridgeConfig,
        registry: Arc<SessionRegistry>,
    ) -> Result<Self, GatewayError> {
        let listener = TcpListener::bind(&config.listen_addr).await?;
        let local_addr = listener.local_addr()?;

        info!("WebSocket bridge listening on {}", local_addr);

        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let task = tokio::spawn(Self::run(listener, Arc::new(config), registry, shutdown_rx));

        Ok(Self {
            local_addr,
            shutdown_tx: Some(shutdown_tx),
            task,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Stop accepting; live connections end with their sessions
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        let _ = self.task.await;
    }

    async fn run(
        listener: TcpListener,
        config: Arc<BridgeConfig>,
        registry: Arc<SessionRegistry>,
        mut shutdown_rx: oneshot::Receiver<()>,
    ) {
        loop {
            tokio::select! {
                _ = &mut shutdown_rx => break,

                accepted = listener.accept() => match accepted {
                    Ok((stream, addr)) => {
                        // Disable Nagle's algorithm for low-latency interactive terminal
                        if let Err(e) = stream.set_nodelay(true) {
                            warn!("Failed to set TCP_NODELAY: {}", e);
                        }
                        debug!("WebSocket connection from {}", addr);

                        let config = config.clone();
                        let registry = registry.clone();
                        tokio::spawn(async move {
                            if let Err(e) = Self::handle_connection(stream, config, registry).await {
                                warn!("WebSocket connection from {} failed: {}", addr, e);
                            }
                        });
                    }
                    Err(e) => {
                        error!("Failed to accept WebSocket connection: {}", e);
                    }
                },
            }
        }

        info!("WebSocket bridge stopped");
    }

    async fn handle_connection(
        stream: TcpStream,
        config: Arc<BridgeConfig>,
        registry: Arc<SessionRegistry>,
    ) -> Result<(), WsError> {
        let mut path = String::new();
        let handshake = accept_hdr_async(stream, |req: &Request, resp: Response| {
            path = req.uri().path().to_string();
            Ok::<Response, ErrorResponse>(resp)
        });

        let ws_stream = match tokio::time::timeout(
            Duration::from_secs(WS_ACCEPT_TIMEOUT_SECS),
            handshake,
        )
        .await
        {
            Ok(result) => result?,
            Err(_) => {
                warn!("WebSocket handshake timeout");
                return Ok(());
            }
        };

        let session_id = match session_id_from_path(&path, &config.path_prefix) {
            Some(id) => id.to_string(),
            None => return reject(ws_stream, &format!("Invalid session path: {}", path)).await,
        };

        let (frame_tx, frame_rx) = mpsc::channel::<Bytes>(config.frame_channel_capacity.max(1));
        if let Err(e) = registry.attach_output(&session_id, frame_tx) {
            return reject(ws_stream, &e.to_string()).await;
        }

        info!("Client attached to session {}", session_id);
        Self::pump(ws_stream, frame_rx, &session_id, &config, &registry).await;

        if registry.close(&session_id, CloseReason::ClientClosed).is_err() {
            debug!("Session {} already closed when client left", session_id);
        }
        info!("WebSocket bridge terminated for session {}", session_id);
        Ok(())
    }

    /// Run the sender task and the input loop until either ends
    async fn pump(
        ws_stream: WebSocketStream<TcpStream>,
        mut frame_rx: mpsc::Receiver<Bytes>,
        session_id: &str,
        config: &BridgeConfig,
        registry: &SessionRegistry,
    ) {
        let (mut ws_sender, mut ws_receiver) = ws_stream.split();
        let send_timeout = Duration::from_secs(config.send_timeout_secs.max(1));

        // Task: WebSocket sender (drains frame_rx)
        let sid_out = session_id.to_string();
        let mut sender_task = tokio::spawn(async move {
            while let Some(frame) = frame_rx.recv().await {
                // Use timeout to detect dead clients
                let send = ws_sender.send(Message::Binary(frame.to_vec()));
                match tokio::time::timeout(send_timeout, send).await {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => {
                        debug!("WebSocket send failed for session {}: {}", sid_out, e);
                        return;
                    }
                    Err(_) => {
                        warn!(
                            "WebSocket send timeout after {}s for session {}, disconnecting",
                            send_timeout.as_secs(),
                            sid_out
                        );
                        return;
                    }
                }
            }

            // Output ended: the session is gone, close the socket
            let _ = ws_sender.send(Message::Close(None)).await;
            let _ = ws_sender.close().await;
            debug!("WebSocket sender task stopped for session {}", sid_out);
        });

        // Input loop: client frames -> remote shell
        let input = async {
            while let Some(msg) = ws_receiver.next().await {
                let frame = match msg {
                    Ok(Message::Binary(data)) => ClientFrame::from_binary(data),
                    Ok(Message::Text(text)) => ClientFrame::from_text(text),
                    Ok(Message::Close(_)) => {
                        info!("WebSocket close message received for session {}", session_id);
                        break;
                    }
                    Ok(Message::Ping(_)) | Ok(Message::Pong(_)) | Ok(Message::Frame(_)) => continue,
                    Err(e) => {
                        warn!("WebSocket receive error: {} for session {}", e, session_id);
                        break;
                    }
                };

                match frame {
                    ClientFrame::Input(data) => {
                        if let Err(e) = registry.write(session_id, data).await {
                            debug!("Input for session {} dropped: {}", session_id, e);
                            break;
                        }
                    }
                    ClientFrame::Resize { cols, rows } => {
                        match (u32::try_from(cols), u32::try_from(rows)) {
                            (Ok(c), Ok(r)) if c > 0 && r > 0 => {
                                if let Err(e) = registry.resize(session_id, c, r).await {
                                    warn!("Resize failed for session {}: {}", session_id, e);
                                    // A refused window change leaves the session usable
                                    if matches!(
                                        e,
                                        GatewayError::SessionNotFound(_)
                                            | GatewayError::Transport(SshError::Disconnected)
                                    ) {
                                        break;
                                    }
                                }
                            }
                            _ => warn!(
                                "Ignoring resize to {}x{} for session {}",
                                cols, rows, session_id
                            ),
                        }
                    }
                }
            }
        };

        tokio::select! {
            _ = &mut sender_task => {
                debug!("Sender task completed for session {}", session_id);
            }
            _ = input => {
                debug!("Input loop completed for session {}", session_id);
                sender_task.abort();
            }
        }
    }
}

/// Tell the client why it was refused, then close
async fn reject(mut ws_stream: WebSocketStream<TcpStream>, reason: &str) -> Result<(), WsError> {
    warn!("Rejecting WebSocket client: {}", reason);
    ws_stream.send(Message::Text(error_payload(reason))).await?;
    ws_stream.close(None).await
}
