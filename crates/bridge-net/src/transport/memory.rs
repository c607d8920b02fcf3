//! In-process transport pair.
//!
//! Used by tests of the heartbeat loop, packet listener, and router so they
//! can run without binding sockets. Each end sees what the other sends.

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::{mpsc, Mutex};

use super::{Transport, TransportError};

pub struct MemoryTransport {
    outbound: mpsc::UnboundedSender<Vec<u8>>,
    inbound: Mutex<mpsc::UnboundedReceiver<Vec<u8>>>,
    connected: AtomicBool,
}

impl MemoryTransport {
    /// Returns two connected ends.
    pub fn pair() -> (Self, Self) {
        let (a_tx, a_rx) = mpsc::unbounded_channel();
        let (b_tx, b_rx) = mpsc::unbounded_channel();
        (Self::new(a_tx, b_rx), Self::new(b_tx, a_rx))
    }

    fn new(outbound: mpsc::UnboundedSender<Vec<u8>>, inbound: mpsc::UnboundedReceiver<Vec<u8>>) -> Self {
        Self {
            outbound,
            inbound: Mutex::new(inbound),
            connected: AtomicBool::new(true),
        }
    }

    /// Makes this end report disconnected and refuse further sends.
    pub fn close(&self) {
        self.connected.store(false, Ordering::Release);
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn send(&self, payload: &[u8]) -> Result<(), TransportError> {
        if !self.is_connected() {
            return Err(TransportError::Closed);
        }
        self.outbound
            .send(payload.to_vec())
            .map_err(|_| TransportError::Closed)
    }

    async fn receive(&self) -> Result<Vec<u8>, TransportError> {
        let mut inbound = self.inbound.lock().await;
        inbound.recv().await.ok_or(TransportError::Closed)
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }
}
