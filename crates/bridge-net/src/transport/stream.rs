//! Length-prefixed message framing over TCP.
//!
//! Wire format per message:
//! ```text
//! [len:4 little-endian][payload:len]
//! ```

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::{
    io::{AsyncRead, AsyncReadExt, AsyncWriteExt},
    net::{
        tcp::{OwnedReadHalf, OwnedWriteHalf},
        TcpStream,
    },
    sync::Mutex,
};
use tracing::debug;

use super::{Transport, TransportError, MAX_MESSAGE_LEN};

/// Reliable, ordered transport over one TCP connection.
///
/// The read and write halves sit behind separate locks so a heartbeat
/// sender and a receive loop never block each other.
pub struct StreamTransport {
    reader: Mutex<OwnedReadHalf>,
    writer: Mutex<OwnedWriteHalf>,
    peer: SocketAddr,
    connected: AtomicBool,
}

impl StreamTransport {
    /// Takes ownership of a connected stream and disables Nagle's algorithm.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Io`] if the socket options or peer address
    /// cannot be read (typically because the peer already hung up).
    pub fn new(stream: TcpStream) -> Result<Self, TransportError> {
        stream.set_nodelay(true)?;
        let peer = stream.peer_addr()?;
        let (reader, writer) = stream.into_split();
        Ok(Self {
            reader: Mutex::new(reader),
            writer: Mutex::new(writer),
            peer,
            connected: AtomicBool::new(true),
        })
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.peer
    }

    /// Marks the transport dead and shuts down the write half so the peer
    /// sees end-of-stream.
    ///
    /// If a send is stuck on a full socket it holds the writer; the shutdown
    /// is skipped then and the write half closes when the transport drops.
    pub async fn close(&self) {
        if self.connected.swap(false, Ordering::AcqRel) {
            debug!(peer = %self.peer, "closing stream transport");
        }
        match self.writer.try_lock() {
            Ok(mut writer) => {
                let _ = writer.shutdown().await;
            }
            Err(_) => debug!(peer = %self.peer, "writer busy, skipping shutdown"),
        }
    }

    fn mark_failed<T>(&self, result: Result<T, TransportError>) -> Result<T, TransportError> {
        if result.is_err() {
            self.connected.store(false, Ordering::Release);
        }
        result
    }
}

#[async_trait]
impl Transport for StreamTransport {
    async fn send(&self, payload: &[u8]) -> Result<(), TransportError> {
        if !self.is_connected() {
            return Err(TransportError::Closed);
        }
        if payload.len() > MAX_MESSAGE_LEN {
            return Err(TransportError::FrameTooLarge(payload.len()));
        }

        let mut frame = Vec::with_capacity(4 + payload.len());
        frame.extend_from_slice(&(payload.len() as u32).to_le_bytes());
        frame.extend_from_slice(payload);

        let mut writer = self.writer.lock().await;
        let mut abandoned = AbandonedWrite::arm(&self.connected);
        let result: Result<(), TransportError> = async {
            writer.write_all(&frame).await?;
            writer.flush().await?;
            Ok(())
        }
        .await;
        abandoned.disarm();
        self.mark_failed(result)
    }

    async fn receive(&self) -> Result<Vec<u8>, TransportError> {
        let mut reader = self.reader.lock().await;
        let result = read_frame(&mut *reader).await;
        self.mark_failed(result)
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }
}

/// Marks the transport failed if a send future is dropped mid-write, since
/// part of a frame may already be on the wire.
struct AbandonedWrite<'a> {
    connected: &'a AtomicBool,
    armed: bool,
}

impl<'a> AbandonedWrite<'a> {
    fn arm(connected: &'a AtomicBool) -> Self {
        Self {
            connected,
            armed: true,
        }
    }

    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for AbandonedWrite<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.connected.store(false, Ordering::Release);
        }
    }
}

/// Reads one length-prefixed frame.
async fn read_frame<R: AsyncRead + Unpin>(reader: &mut R) -> Result<Vec<u8>, TransportError> {
    let mut header = [0u8; 4];
    read_full(reader, &mut header).await?;

    let len = u32::from_le_bytes(header) as usize;
    if len > MAX_MESSAGE_LEN {
        return Err(TransportError::FrameTooLarge(len));
    }

    let mut payload = vec![0u8; len];
    read_full(reader, &mut payload).await?;
    Ok(payload)
}

/// Fills `buf` completely, looping over partial reads. A zero-byte read means
/// the peer closed the stream.
async fn read_full<R: AsyncRead + Unpin>(
    reader: &mut R,
    buf: &mut [u8],
) -> Result<(), TransportError> {
    let mut filled = 0;
    while filled < buf.len() {
        let n = reader.read(&mut buf[filled..]).await?;
        if n == 0 {
            return Err(TransportError::Closed);
        }
        filled += n;
    }
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────
