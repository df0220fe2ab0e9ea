//! Protocol counters, written by the UDP loop and read by the monitor.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::Serialize;

#[derive(Clone, Default)]
pub struct ProtocolStats {
    inner: Arc<Counters>,
}

#[derive(Default)]
struct Counters {
    handshakes: AtomicU64,
    resolves: AtomicU64,
    resolved_records: AtomicU64,
    dropped: AtomicU64,
    recv_errors: AtomicU64,
}

/// Copy of the counters at one instant.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    /// Registrations that reached the registry.
    pub handshakes: u64,
    /// Resolve queries answered.
    pub resolves: u64,
    /// Records sent across all resolve replies.
    pub resolved_records: u64,
    /// Datagrams dropped without effect (empty, short, unknown, rejected).
    pub dropped: u64,
    /// Failed socket reads.
    pub recv_errors: u64,
}

impl ProtocolStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_handshake(&self) {
        self.inner.handshakes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_resolve(&self, hits: usize) {
        self.inner.resolves.fetch_add(1, Ordering::Relaxed);
        self.inner
            .resolved_records
            .fetch_add(hits as u64, Ordering::Relaxed);
    }

    pub fn record_drop(&self) {
        self.inner.dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_recv_error(&self) {
        self.inner.recv_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            handshakes: self.inner.handshakes.load(Ordering::Relaxed),
            resolves: self.inner.resolves.load(Ordering::Relaxed),
            resolved_records: self.inner.resolved_records.load(Ordering::Relaxed),
            dropped: self.inner.dropped.load(Ordering::Relaxed),
            recv_errors: self.inner.recv_errors.load(Ordering::Relaxed),
        }
    }
}
