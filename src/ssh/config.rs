//! SSH Configuration

use std::fmt;

use serde::{Deserialize, Serialize};

/// Connector settings shared by every session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SshSettings {
    /// Dial + handshake timeout in seconds
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    /// Transport keepalive interval in seconds (0 disables)
    #[serde(default = "default_keepalive_interval")]
    pub keepalive_interval_secs: u64,

    /// Missed keepalives before the transport is dropped
    #[serde(default = "default_keepalive_max")]
    pub keepalive_max: usize,

    /// How server host keys are checked
    #[serde(default)]
    pub host_key_policy: HostKeyPolicy,
}

/// Host key verification policy.
///
/// `AcceptAny` skips verification entirely. It is the default because assets
/// are registered without their host keys; deployments that know them should
/// switch to `Fingerprints`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum HostKeyPolicy {
    #[default]
    AcceptAny,
    /// Only accept keys whose SHA256 fingerprint (`SHA256:<base64>`) is listed
    Fingerprints { allowed: Vec<String> },
}

impl HostKeyPolicy {
    /// Whether a server key with this fingerprint may be trusted
    pub fn permits(&self, fingerprint: &str) -> bool {
        match self {
            HostKeyPolicy::AcceptAny => true,
            HostKeyPolicy::Fingerprints { allowed } => allowed.iter().any(|f| f == fingerprint),
        }
    }
}

/// Network endpoint of the asset to dial
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectTarget {
    pub host: String,
    pub port: u16,
}

impl ConnectTarget {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

impl fmt::Display for ConnectTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Terminal size in character cells, both strictly positive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TerminalGeometry {
    pub cols: u32,
    pub rows: u32,
}

impl TerminalGeometry {
    /// Exact geometry; `None` if either dimension is zero
    pub fn new(cols: u32, rows: u32) -> Option<Self> {
        (cols > 0 && rows > 0).then_some(Self { cols, rows })
    }

    /// Geometry from untrusted request values, non-positive dimensions fall
    /// back to 80x24 individually
    pub fn normalized(cols: i64, rows: i64) -> Self {
        let default = Self::default();
        Self {
            cols: clamp_dimension(cols).unwrap_or(default.cols),
            rows: clamp_dimension(rows).unwrap_or(default.rows),
        }
    }
}

fn clamp_dimension(value: i64) -> Option<u32> {
    (value > 0).then(|| u32::try_from(value).unwrap_or(u32::MAX))
}

impl Default for TerminalGeometry {
    fn default() -> Self {
        Self {
            cols: default_cols(),
            rows: default_rows(),
        }
    }
}

fn default_connect_timeout() -> u64 {
    10
}

fn default_keepalive_interval() -> u64 {
    30
}

fn default_keepalive_max() -> usize {
    3
}

fn default_cols() -> u32 {
    80
}

fn default_rows() -> u32 {
    24
}

impl Default for SshSettings {
    fn default() -> Self {
        Self {
            connect_timeout_secs: default_connect_timeout(),
            keepalive_interval_secs: default_keepalive_interval(),
            keepalive_max: default_keepalive_max(),
            host_key_policy: HostKeyPolicy::default(),
        }
    }
}
