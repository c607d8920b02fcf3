//! Latency estimates derived from packet timestamps.
//!
//! Timestamps are wall-clock milliseconds from two different machines, so
//! the one-way figure is only as good as their clock sync. Values outside a
//! plausible window are discarded rather than published.

use std::sync::Arc;

use tokio::sync::watch;

/// Largest one-way delay treated as real, exclusive, in milliseconds.
pub const MAX_ONE_WAY_MS: i64 = 1000;

/// Largest round trip treated as real, exclusive, in milliseconds.
pub const MAX_ROUND_TRIP_MS: i64 = 2000;

/// Receiver-side estimate: `now - sent` when it lies strictly between 0 and
/// [`MAX_ONE_WAY_MS`].
pub fn one_way_delay(now_ms: i64, sent_ms: i64) -> Option<u32> {
    let delay = now_ms.checked_sub(sent_ms)?;
    (delay > 0 && delay < MAX_ONE_WAY_MS).then_some(delay as u32)
}

/// Sender-side estimate from an echoed heartbeat: half the round trip, when
/// the round trip lies in `[0, MAX_ROUND_TRIP_MS)`.
pub fn halved_round_trip(now_ms: i64, sent_ms: i64) -> Option<u32> {
    let rtt = now_ms.checked_sub(sent_ms)?;
    (0..MAX_ROUND_TRIP_MS).contains(&rtt).then_some((rtt / 2) as u32)
}

/// Latest latency sample, in milliseconds. `None` until the first sample.
#[derive(Clone)]
pub struct LatencyFeed {
    tx: Arc<watch::Sender<Option<u32>>>,
}

impl LatencyFeed {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(None);
        Self {
            tx: Arc::new(tx),
        }
    }

    pub fn record(&self, sample_ms: u32) {
        self.tx.send_replace(Some(sample_ms));
    }

    pub fn latest(&self) -> Option<u32> {
        *self.tx.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<u32>> {
        self.tx.subscribe()
    }
}

impl Default for LatencyFeed {
    fn default() -> Self {
        Self::new()
    }
}
