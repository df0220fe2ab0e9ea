//! Rendezvous protocol handler: one datagram in, at most one datagram out.
//!
//! Stateless between datagrams; everything that persists lives in the
//! registry. The handler never touches a socket: the listener feeds it
//! bytes plus the transport-reported source, and sends back whatever
//! `Outcome::Reply` carries.

use std::net::{SocketAddr, SocketAddrV4};
use std::sync::Arc;

use bytes::{Bytes, BytesMut};

use punch_core::wire::{MessageType, PeerKey, PeerRecord, KEY_LEN, MAX_UDP_PAYLOAD, RECORD_LEN};
use punch_services::{Admission, PeerRegistry, ProtocolStats, RegistrationPolicy};

/// What became of one datagram.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Handshake accepted; the sender's address is now on record. No reply.
    Registered,
    /// Resolve answered. Send this back to the source, even when empty.
    Reply(Bytes),
    /// Nothing happened. Never reported to the sender.
    Dropped(DropReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    Empty,
    /// Handshake payload shorter than one key.
    ShortHandshake,
    /// Source cannot be written as an IPv4 record.
    NonIpv4Source,
    Rejected(&'static str),
    UnknownType(u8),
}

pub struct RendezvousHandler {
    registry: PeerRegistry,
    policy: Arc<dyn RegistrationPolicy>,
    stats: ProtocolStats,
    max_reply_bytes: usize,
}

impl RendezvousHandler {
    pub fn new(
        registry: PeerRegistry,
        policy: Arc<dyn RegistrationPolicy>,
        stats: ProtocolStats,
    ) -> Self {
        Self {
            registry,
            policy,
            stats,
            max_reply_bytes: MAX_UDP_PAYLOAD,
        }
    }

    /// Cap resolve replies at `bytes`. Records past the cap are left out.
    pub fn with_max_reply_bytes(mut self, bytes: usize) -> Self {
        self.max_reply_bytes = bytes;
        self
    }

    /// Process one datagram received from `source`.
    pub fn handle(&self, datagram: &[u8], source: SocketAddr) -> Outcome {
        let outcome = self.dispatch(datagram, source);

        match &outcome {
            Outcome::Registered => self.stats.record_handshake(),
            Outcome::Reply(reply) => self.stats.record_resolve(reply.len() / RECORD_LEN),
            Outcome::Dropped(reason) => {
                self.stats.record_drop();
                tracing::trace!(%source, len = datagram.len(), ?reason, "datagram dropped");
            }
        }

        outcome
    }

    fn dispatch(&self, datagram: &[u8], source: SocketAddr) -> Outcome {
        let Some((&tag, payload)) = datagram.split_first() else {
            return Outcome::Dropped(DropReason::Empty);
        };

        match MessageType::try_from(tag) {
            Ok(MessageType::Handshake) => self.handle_handshake(payload, source),
            Ok(MessageType::Resolve) => self.handle_resolve(payload),
            Err(_) => Outcome::Dropped(DropReason::UnknownType(tag)),
        }
    }

    fn handle_handshake(&self, payload: &[u8], source: SocketAddr) -> Outcome {
        // Bytes past the first key are ignored.
        let Some(key) = PeerKey::from_prefix(payload) else {
            return Outcome::Dropped(DropReason::ShortHandshake);
        };

        let Some(source) = ipv4_source(source) else {
            return Outcome::Dropped(DropReason::NonIpv4Source);
        };

        if let Admission::Reject(reason) = self.policy.admit(&key, source) {
            tracing::debug!(peer = key.short(), %source, reason, "registration rejected");
            return Outcome::Dropped(DropReason::Rejected(reason));
        }

        self.registry.upsert(PeerRecord::new(key, source));
        tracing::debug!(peer = key.short(), %source, "peer registered");
        Outcome::Registered
    }

    fn handle_resolve(&self, payload: &[u8]) -> Outcome {
        let queried = payload.len() / KEY_LEN;
        let mut reply =
            BytesMut::with_capacity((queried * RECORD_LEN).min(self.max_reply_bytes));

        // A trailing partial key is ignored by chunks_exact.
        for key in payload.chunks_exact(KEY_LEN).filter_map(PeerKey::from_prefix) {
            // Checked before the lookup so a key left out is not freshened.
            if reply.len() + RECORD_LEN > self.max_reply_bytes {
                tracing::debug!(
                    queried,
                    max_reply_bytes = self.max_reply_bytes,
                    "resolve reply full, remaining keys skipped"
                );
                break;
            }
            let Some(record) = self.registry.lookup(&key) else {
                continue;
            };
            reply.extend_from_slice(&record.encode());
        }

        tracing::trace!(queried, resolved = reply.len() / RECORD_LEN, "resolve answered");
        Outcome::Reply(reply.freeze())
    }
}

/// The address to store for a registration. IPv4-mapped IPv6 sources from a
/// dual-stack socket count as IPv4.
fn ipv4_source(source: SocketAddr) -> Option<SocketAddrV4> {
    match source {
        SocketAddr::V4(v4) => Some(v4),
        SocketAddr::V6(v6) => v6
            .ip()
            .to_ipv4_mapped()
            .map(|ip| SocketAddrV4::new(ip, v6.port())),
    }
}
