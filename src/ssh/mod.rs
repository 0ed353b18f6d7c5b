//! SSH module - remote shell connector
//!
//! Dials a registered asset with `russh`, authenticates with the resolved
//! credential, allocates a PTY and starts an interactive shell. The live
//! shell is owned by a single channel task; callers talk to it through
//! [`ShellInput`] and read its output from [`RemoteShell::output`].
//!
//! # Features
//! - Password and public-key authentication (optionally passphrase protected)
//! - Bounded connect timeout and transport keepalive
//! - Configurable host key policy (see [`HostKeyPolicy`])

mod client;
mod config;
mod error;
mod session;

pub use client::{host_key_fingerprint, ClientHandler, RusshConnector, ShellConnector};
pub use config::{ConnectTarget, HostKeyPolicy, SshSettings, TerminalGeometry};
pub use error::SshError;
pub use session::{RemoteShell, ShellCommand, ShellInput, ShellTransport, OUTPUT_CHANNEL_CAPACITY};
