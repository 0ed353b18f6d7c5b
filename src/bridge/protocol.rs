//! Client frame parsing
//!
//! Text frames are either a resize control message
//! (`{"type":"resize","cols":N,"rows":N}`) or literal terminal input.
//! Binary frames are always input.

use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// Control messages recognised in text frames.
///
/// Sizes are any JSON number; browser clients may send `120.0`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ControlMessage {
    Resize { cols: f64, rows: f64 },
}

/// A decoded client frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientFrame {
    /// Bytes for the remote shell
    Input(Bytes),
    /// Requested window size, not yet validated
    Resize { cols: i64, rows: i64 },
}

impl ClientFrame {
    pub fn from_text(text: String) -> Self {
        match serde_json::from_str::<ControlMessage>(&text) {
            // Fractions truncate toward zero
            Ok(ControlMessage::Resize { cols, rows }) => ClientFrame::Resize {
                cols: cols as i64,
                rows: rows as i64,
            },
            Err(_) => ClientFrame::Input(Bytes::from(text)),
        }
    }

    pub fn from_binary(data: Vec<u8>) -> Self {
        ClientFrame::Input(Bytes::from(data))
    }
}

/// Error frame sent to clients before closing (`{"error": "..."}`)
pub fn error_payload(message: &str) -> String {
    serde_json::json!({ "error": message }).to_string()
}
