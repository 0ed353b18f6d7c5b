//! Output Multiplexer
//!
//! One task per session: drains the remote output stream through the
//! batcher into the client frame channel. Stream end flushes the remainder
//! once and tears the session down.

use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tracing::debug;

use super::batcher::{BatchPolicy, OutputBatcher};
use crate::session::{CloseReason, SessionRecord, SessionRegistry};

pub(crate) fn spawn_output_multiplexer(
    registry: Arc<SessionRegistry>,
    record: Arc<SessionRecord>,
    output: mpsc::Receiver<Bytes>,
    sink: mpsc::Sender<Bytes>,
    policy: BatchPolicy,
) {
    tokio::spawn(run_output_multiplexer(registry, record, output, sink, policy));
}

async fn run_output_multiplexer(
    registry: Arc<SessionRegistry>,
    record: Arc<SessionRecord>,
    mut output: mpsc::Receiver<Bytes>,
    sink: mpsc::Sender<Bytes>,
    policy: BatchPolicy,
) {
    let session_id = record.id.clone();
    let input = record.input().clone();
    let mut batcher = OutputBatcher::new(policy);
    let mut ticker = tokio::time::interval(policy.flush_interval());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    // None: the session was closed elsewhere
    let reason = loop {
        tokio::select! {
            biased;

            _ = input.closed() => break None,

            chunk = output.recv() => match chunk {
                Some(data) => {
                    record.touch(registry.clock().now());
                    if let Some(batch) = batcher.append(&data) {
                        if sink.send(batch).await.is_err() {
                            break Some(CloseReason::ClientClosed);
                        }
                    }
                }
                None => break Some(CloseReason::RemoteEnded),
            },

            _ = ticker.tick() => {
                if let Some(batch) = batcher.flush_on_tick() {
                    if sink.send(batch).await.is_err() {
                        break Some(CloseReason::ClientClosed);
                    }
                }
            }
        }
    };

    let Some(reason) = reason else {
        debug!("Multiplexer for session {} stopped after close", session_id);
        return;
    };

    if let Some(rest) = batcher.drain() {
        let _ = sink.send(rest).await;
    }

    // Close before dropping the sink so the client sees the session gone
    // by the time its socket closes
    match registry.close(&session_id, reason) {
        Ok(()) => debug!("Multiplexer ended session {} ({})", session_id, reason),
        Err(_) => debug!("Multiplexer for session {} stopped after close", session_id),
    }
    drop(sink);
}
