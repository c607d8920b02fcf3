//! Host-side liveness check.
//!
//! Every `interval` the host sends a Heartbeat packet over the reliable
//! channel and counts it as missed. A background reader resets the count
//! whenever the client echoes a heartbeat back. Once the count reaches
//! `max_missed` the session is declared dead.
//!
//! ```text
//!  t=0   check(0<5) send #1 missed=1 ─┐
//!                                     └─ echo #1 arrives → missed=0, rtt/2 recorded
//!  t=2s  check(0<5) send #2 missed=1
//!  ...   (client goes silent)
//!  t=10s check(4<5) send #6 missed=5
//!  t=12s check(5≥5) → MissedHeartbeats(5)
//! ```
//!
//! A send that has not completed after one interval means the peer stopped
//! reading without closing the socket. The session ends with
//! [`HeartbeatExit::LinkFailed`] carrying [`TransportError::Stalled`].
//!
//! [`TransportError::Stalled`]: crate::transport::TransportError::Stalled

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bridge_core::{current_timestamp_ms, EventType, InputPacket, SequenceCounter};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use super::latency::{halved_round_trip, LatencyFeed};
use crate::channel::{LinkError, PacketChannel};

/// How long to wait for the echo reader to wind down after the loop ends.
const READER_SHUTDOWN_GRACE: Duration = Duration::from_millis(500);

#[derive(Debug, Clone, Copy)]
pub struct HeartbeatConfig {
    pub interval: Duration,
    pub max_missed: u32,
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(2000),
            max_missed: 5,
        }
    }
}

/// Why [`run_heartbeat`] returned.
#[derive(Debug)]
pub enum HeartbeatExit {
    /// The client stopped echoing.
    MissedHeartbeats(u32),
    /// Sending or receiving on the reliable channel failed.
    LinkFailed(LinkError),
    /// The caller's token fired.
    Cancelled,
}

/// Runs the heartbeat loop on `channel` until one of the [`HeartbeatExit`]
/// conditions occurs.
///
/// The reliable channel's receive side is owned by this function for its
/// whole run; nothing else should read from it concurrently.
pub async fn run_heartbeat(
    channel: &PacketChannel,
    config: &HeartbeatConfig,
    latency: &LatencyFeed,
    cancel: &CancellationToken,
) -> HeartbeatExit {
    let missed = Arc::new(AtomicU32::new(0));
    let reader_cancel = cancel.child_token();
    let mut reader = Some(spawn_echo_reader(
        channel.clone(),
        Arc::clone(&missed),
        latency.clone(),
        reader_cancel.clone(),
    ));
    let sequence = SequenceCounter::new();

    let exit = loop {
        let count = missed.load(Ordering::Acquire);
        if count >= config.max_missed {
            warn!(missed = count, "client stopped answering heartbeats");
            break HeartbeatExit::MissedHeartbeats(count);
        }

        let beat = InputPacket::heartbeat(sequence.next()).with_timestamp(current_timestamp_ms());
        let sent = tokio::select! {
            _ = cancel.cancelled() => break HeartbeatExit::Cancelled,
            sent = channel.send_within(&beat, config.interval) => sent,
        };
        if let Err(e) = sent {
            warn!(error = %e, "heartbeat send failed");
            break HeartbeatExit::LinkFailed(e);
        }
        missed.fetch_add(1, Ordering::AcqRel);
        trace!(seq = beat.sequence, "heartbeat sent");

        tokio::select! {
            _ = cancel.cancelled() => break HeartbeatExit::Cancelled,
            finished = wait_reader(&mut reader) => {
                match finished {
                    Some(e) => break HeartbeatExit::LinkFailed(e),
                    // The reader only stops cleanly when cancelled.
                    None => break HeartbeatExit::Cancelled,
                }
            }
            _ = tokio::time::sleep(config.interval) => {}
        }
    };

    reader_cancel.cancel();
    if let Some(mut handle) = reader {
        if tokio::time::timeout(READER_SHUTDOWN_GRACE, &mut handle).await.is_err() {
            debug!("echo reader did not stop in time, aborting");
            handle.abort();
        }
    }
    exit
}

/// Awaits the reader task once; afterwards the slot is empty and this future
/// never resolves, so the select loop stops polling a finished handle.
async fn wait_reader(slot: &mut Option<JoinHandle<Option<LinkError>>>) -> Option<LinkError> {
    let Some(handle) = slot.as_mut() else {
        return std::future::pending().await;
    };
    let result = handle.await;
    *slot = None;
    match result {
        Ok(outcome) => outcome,
        Err(join) => {
            warn!(error = %join, "heartbeat echo reader panicked");
            None
        }
    }
}

fn spawn_echo_reader(
    channel: PacketChannel,
    missed: Arc<AtomicU32>,
    latency: LatencyFeed,
    cancel: CancellationToken,
) -> JoinHandle<Option<LinkError>> {
    tokio::spawn(async move {
        loop {
            let packet = tokio::select! {
                _ = cancel.cancelled() => return None,
                received = channel.recv() => match received {
                    Ok(packet) => packet,
                    Err(e) => {
                        warn!(error = %e, "reliable channel failed");
                        return Some(e);
                    }
                },
            };

            if packet.event_type != EventType::Heartbeat {
                trace!(event = ?packet.event_type, "ignoring non-heartbeat packet from client");
                continue;
            }
            missed.store(0, Ordering::Release);
            if let Some(sample) = halved_round_trip(current_timestamp_ms(), packet.timestamp_ms) {
                latency.record(sample);
            }
            trace!(seq = packet.sequence, "heartbeat echo received");
        }
    })
}

// ── Tests ─────────────────────────────────────────────────────────────────────
