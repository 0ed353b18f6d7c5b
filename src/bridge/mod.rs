//! WebSocket Bridge Module
//!
//! Connects browser terminals to live sessions: batched remote output out,
//! keystrokes and resize requests in.

mod batcher;
mod multiplexer;
mod protocol;
mod server;

pub use batcher::{BatchPolicy, OutputBatcher};
pub(crate) use multiplexer::spawn_output_multiplexer;
pub use protocol::{error_payload, ClientFrame, ControlMessage};
pub use server::{BridgeConfig, BridgeServer};
