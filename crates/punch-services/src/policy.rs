//! Registration policy: decides whether a handshake may touch the registry.
//!
//! Registrations are unauthenticated: whoever sends a key first owns its
//! address until someone else sends it. This trait is where a proof of key
//! ownership plugs in later; the registry and the dispatcher only see
//! `Admission`.

use std::collections::HashSet;
use std::net::SocketAddrV4;

use punch_core::wire::PeerKey;

/// Verdict on one registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Accept,
    /// Dropped silently. The reason only goes to the log.
    Reject(&'static str),
}

/// Trait for deciding which registrations reach the registry.
pub trait RegistrationPolicy: Send + Sync {
    fn admit(&self, key: &PeerKey, source: SocketAddrV4) -> Admission;
}

/// Accept everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct OpenRegistration;

impl RegistrationPolicy for OpenRegistration {
    fn admit(&self, _key: &PeerKey, _source: SocketAddrV4) -> Admission {
        Admission::Accept
    }
}

/// Reject a fixed set of keys, accept the rest.
#[derive(Debug, Clone, Default)]
pub struct DenyList {
    blocked: HashSet<PeerKey>,
}

impl DenyList {
    pub fn new(blocked: impl IntoIterator<Item = PeerKey>) -> Self {
        Self {
            blocked: blocked.into_iter().collect(),
        }
    }

    /// Build from hex keys as written in the config file.
    /// Malformed entries are logged and skipped.
    pub fn from_hex_keys(keys: &[String]) -> Self {
        let mut blocked = HashSet::new();
        for hex_key in keys {
            match hex_key.parse::<PeerKey>() {
                Ok(key) => {
                    tracing::info!(peer = key.short(), "blocked peer from config");
                    blocked.insert(key);
                }
                Err(e) => {
                    tracing::warn!(entry = %hex_key, error = %e, "ignoring malformed blocked key");
                }
            }
        }
        Self { blocked }
    }

    pub fn len(&self) -> usize {
        self.blocked.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocked.is_empty()
    }
}

impl RegistrationPolicy for DenyList {
    fn admit(&self, key: &PeerKey, _source: SocketAddrV4) -> Admission {
        if self.blocked.contains(key) {
            Admission::Reject("key is blocked")
        } else {
            Admission::Accept
        }
    }
}
