//! Monitor handlers: read-only views of the rendezvous registry.

pub mod dashboard;
pub mod status;

use std::sync::Arc;
use std::time::Instant;

use punch_services::{PeerRegistry, ProtocolStats, RegistryEntry};

use crate::auth::Credentials;

#[derive(Clone)]
pub struct ApiState {
    /// Read with `enumerate` and the counters only. Never mutated here.
    pub registry: PeerRegistry,
    pub stats: ProtocolStats,
    /// Port the rendezvous socket listens on, for display.
    pub udp_port: u16,
    /// Port this monitor listens on, for display.
    pub web_port: u16,
    pub started_at: Instant,
    pub credentials: Arc<Credentials>,
}

// ── Shared helpers ────────────────────────────────────────────────────────────

/// Registry snapshot, most recently registered first.
fn peers_newest_first(registry: &PeerRegistry) -> Vec<RegistryEntry> {
    let mut entries = registry.enumerate();
    entries.sort_by(|a, b| b.registered_at.cmp(&a.registered_at));
    entries
}

pub use dashboard::handle_dashboard;
pub use status::{handle_overview, handle_peers, handle_status};
