//! PacketListener: drains both transports of a session into the dispatcher.
//!
//! Two receive loops run side by side for one connection:
//!
//! - **Reliable stream** – heartbeats are echoed straight back (the channel
//!   re-seals them under a fresh nonce); every other packet is dispatched.
//! - **Datagrams** – packets pass through a [`SequenceWindow`] first, so a
//!   late or duplicated mouse packet never replays an older position.
//!
//! Any receive failure (transport fault, an envelope that does not
//! authenticate, a malformed packet) ends the listener: a corrupted or
//! desynchronised stream cannot be trusted for the next packet either. A
//! failed injection, on the other hand, is logged and the loop continues.

use std::sync::Arc;

use bridge_core::{current_timestamp_ms, EventType, InputPacket, SequenceWindow};
use bridge_net::session::one_way_delay;
use bridge_net::{LatencyFeed, LinkError, PacketChannel};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use super::dispatch_input::InputDispatcher;

/// Why [`PacketListener::run`] returned.
#[derive(Debug)]
pub enum ListenerExit {
    Cancelled,
    /// The reliable stream failed.
    Reliable(LinkError),
    /// The datagram path failed.
    Datagram(LinkError),
}

pub struct PacketListener {
    dispatcher: Arc<InputDispatcher>,
}

impl PacketListener {
    pub fn new(dispatcher: Arc<InputDispatcher>) -> Self {
        Self { dispatcher }
    }

    pub fn dispatcher(&self) -> &Arc<InputDispatcher> {
        &self.dispatcher
    }

    /// Runs both receive loops until one fails or `cancel` fires.
    pub async fn run(
        &self,
        reliable: &PacketChannel,
        datagram: &PacketChannel,
        latency: &LatencyFeed,
        cancel: &CancellationToken,
    ) -> ListenerExit {
        tokio::select! {
            _ = cancel.cancelled() => ListenerExit::Cancelled,
            e = self.reliable_loop(reliable, latency) => ListenerExit::Reliable(e),
            e = self.datagram_loop(datagram, latency) => ListenerExit::Datagram(e),
        }
    }

    async fn reliable_loop(&self, channel: &PacketChannel, latency: &LatencyFeed) -> LinkError {
        loop {
            let packet = match channel.recv().await {
                Ok(packet) => packet,
                Err(e) => {
                    warn!(error = %e, "reliable stream failed");
                    return e;
                }
            };
            self.observe_latency(&packet, latency);

            if packet.event_type == EventType::Heartbeat {
                if let Err(e) = channel.send(&packet).await {
                    warn!(error = %e, "heartbeat echo failed");
                    return e;
                }
                trace!(seq = packet.sequence, "heartbeat echoed");
                continue;
            }
            self.dispatch(&packet);
        }
    }

    async fn datagram_loop(&self, channel: &PacketChannel, latency: &LatencyFeed) -> LinkError {
        let mut window = SequenceWindow::new();
        loop {
            let packet = match channel.recv().await {
                Ok(packet) => packet,
                Err(e) => {
                    warn!(error = %e, "datagram path failed");
                    return e;
                }
            };
            if !window.accept(packet.sequence) {
                trace!(seq = packet.sequence, "dropping stale datagram");
                continue;
            }
            self.observe_latency(&packet, latency);
            self.dispatch(&packet);
        }
    }

    fn observe_latency(&self, packet: &InputPacket, latency: &LatencyFeed) {
        if let Some(sample) = one_way_delay(current_timestamp_ms(), packet.timestamp_ms) {
            latency.record(sample);
        }
    }

    fn dispatch(&self, packet: &InputPacket) {
        if let Err(e) = self.dispatcher.dispatch(packet) {
            warn!(event = ?packet.event_type, error = %e, "input injection failed");
        } else {
            debug!(event = ?packet.event_type, seq = packet.sequence, "input injected");
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
