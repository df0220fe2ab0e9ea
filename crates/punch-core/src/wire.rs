//! udppunch wire format: the rendezvous datagrams and the peer record.
//!
//! One message per UDP datagram. Byte 0 is the message tag, the rest is the
//! payload:
//!
//!   Handshake: tag ‖ key (32 bytes)
//!   Resolve:   tag ‖ key ‖ key ‖ ...   (N × 32 bytes)
//!
//! A resolve reply carries no tag at all: it is the plain concatenation of
//! 38-byte `PeerRecord`s, one per key the server could resolve, in query
//! order. Clients already deployed depend on every size and offset here.

use std::fmt;
use std::net::{Ipv4Addr, SocketAddrV4};
use std::str::FromStr;

use static_assertions::assert_eq_size;
use zerocopy::{AsBytes, FromBytes, FromZeroes};

// ── Peer Key ──────────────────────────────────────────────────────────────────

/// Length of a peer identity key in bytes.
pub const KEY_LEN: usize = 32;

/// Opaque client identity. Chosen by the client, never validated here.
///
/// Usually a WireGuard public key, but the server treats it as 32 opaque
/// bytes compared byte for byte.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PeerKey(pub [u8; KEY_LEN]);

impl PeerKey {
    /// Read a key from the first 32 bytes of `bytes`.
    /// Returns None when fewer than 32 bytes are available.
    pub fn from_prefix(bytes: &[u8]) -> Option<Self> {
        let head: [u8; KEY_LEN] = bytes.get(..KEY_LEN)?.try_into().ok()?;
        Some(Self(head))
    }

    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.0
    }

    /// First 8 bytes as hex. Used in log lines.
    pub fn short(&self) -> String {
        hex::encode(&self.0[..8])
    }
}

impl From<[u8; KEY_LEN]> for PeerKey {
    fn from(bytes: [u8; KEY_LEN]) -> Self {
        Self(bytes)
    }
}

impl fmt::Display for PeerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl fmt::Debug for PeerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PeerKey({})", self.short())
    }
}

impl FromStr for PeerKey {
    type Err = WireError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = hex::decode(s.trim()).map_err(|_| WireError::InvalidKeyHex(s.to_string()))?;
        let arr: [u8; KEY_LEN] = bytes
            .try_into()
            .map_err(|b: Vec<u8>| WireError::InvalidKeyLength(b.len()))?;
        Ok(Self(arr))
    }
}

// ── Peer Record ───────────────────────────────────────────────────────────────

/// Where a peer was last seen: its key plus the public IPv4 endpoint the
/// server observed the registration from.
///
/// The struct layout is the wire layout. Resolve replies are built by
/// copying `as_bytes()` of each record, no per-field encoding.
///
/// Wire size: 38 bytes.
#[derive(Clone, Copy, PartialEq, Eq, AsBytes, FromBytes, FromZeroes)]
#[repr(C)]
pub struct PeerRecord {
    /// Identity the record was registered under.
    pub key: [u8; KEY_LEN],

    /// IPv4 octets in network order.
    pub ip: [u8; 4],

    /// UDP port, big-endian (high byte first).
    pub port: [u8; 2],
}

// Compile-time size guard. If this fails, the wire format has silently changed.
assert_eq_size!(PeerRecord, [u8; 38]);

/// Encoded size of a `PeerRecord`.
pub const RECORD_LEN: usize = std::mem::size_of::<PeerRecord>();

impl PeerRecord {
    pub fn new(key: PeerKey, addr: SocketAddrV4) -> Self {
        Self {
            key: key.0,
            ip: addr.ip().octets(),
            port: addr.port().to_be_bytes(),
        }
    }

    pub fn key(&self) -> PeerKey {
        PeerKey(self.key)
    }

    pub fn ip(&self) -> Ipv4Addr {
        Ipv4Addr::from(self.ip)
    }

    pub fn port(&self) -> u16 {
        u16::from_be_bytes(self.port)
    }

    pub fn addr(&self) -> SocketAddrV4 {
        SocketAddrV4::new(self.ip(), self.port())
    }

    /// The 38-byte wire encoding.
    pub fn encode(&self) -> [u8; RECORD_LEN] {
        let mut out = [0u8; RECORD_LEN];
        out.copy_from_slice(self.as_bytes());
        out
    }

    /// Decode a record from the front of `bytes`. Extra bytes are ignored.
    pub fn decode(bytes: &[u8]) -> Result<Self, WireError> {
        Self::read_from_prefix(bytes).ok_or(WireError::Truncated {
            expected: RECORD_LEN,
            actual: bytes.len(),
        })
    }
}

impl fmt::Debug for PeerRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PeerRecord")
            .field("key", &self.key())
            .field("addr", &self.addr())
            .finish()
    }
}

impl fmt::Display for PeerRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.key(), self.addr())
    }
}

// ── Message Type ──────────────────────────────────────────────────────────────

/// Tag byte at offset 0 of every client datagram.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum MessageType {
    /// Register the sender's observed address under the key in the payload.
    /// Fire-and-forget: the server never answers.
    Handshake = 0x01,

    /// Look up every key in the payload. Answered with one reply datagram.
    Resolve = 0x02,
}

impl TryFrom<u8> for MessageType {
    type Error = WireError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0x01 => Ok(MessageType::Handshake),
            0x02 => Ok(MessageType::Resolve),
            other => Err(WireError::UnknownMessageType(other)),
        }
    }
}

impl From<MessageType> for u8 {
    fn from(t: MessageType) -> u8 {
        t as u8
    }
}

// ── Constants ─────────────────────────────────────────────────────────────────

/// Shortest datagram the server will accept as a registration.
pub const MIN_HANDSHAKE_LEN: usize = 1 + KEY_LEN;

/// Default receive buffer size. Anything past this is cut by the kernel.
pub const MAX_DATAGRAM: usize = 8 * 1024;

/// Largest UDP payload over IPv4.
pub const MAX_UDP_PAYLOAD: usize = 65_507;

/// Default rendezvous port.
pub const DEFAULT_UDP_PORT: u16 = 19993;

// ── Client datagrams ──────────────────────────────────────────────────────────

/// Build a registration datagram for `key`.
pub fn handshake_datagram(key: &PeerKey) -> Vec<u8> {
    let mut buf = Vec::with_capacity(MIN_HANDSHAKE_LEN);
    buf.push(MessageType::Handshake.into());
    buf.extend_from_slice(key.as_bytes());
    buf
}

/// Build a resolve datagram asking for every key in `keys`, in order.
pub fn resolve_datagram(keys: &[PeerKey]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(1 + keys.len() * KEY_LEN);
    buf.push(MessageType::Resolve.into());
    for key in keys {
        buf.extend_from_slice(key.as_bytes());
    }
    buf
}

/// Split a resolve reply into records.
///
/// The server only ever sends whole records, so a length that is not a
/// multiple of 38 means the reply was cut or is not from a rendezvous server.
pub fn decode_reply(reply: &[u8]) -> Result<Vec<PeerRecord>, WireError> {
    if reply.len() % RECORD_LEN != 0 {
        return Err(WireError::TrailingBytes(reply.len() % RECORD_LEN));
    }
    reply.chunks_exact(RECORD_LEN).map(PeerRecord::decode).collect()
}

// ── Errors ────────────────────────────────────────────────────────────────────

/// Errors that can arise when interpreting wire-format data.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WireError {
    #[error("unknown message type: 0x{0:02x}")]
    UnknownMessageType(u8),

    #[error("truncated record: expected {expected} bytes, got {actual}")]
    Truncated { expected: usize, actual: usize },

    #[error("reply has {0} trailing bytes after the last whole record")]
    TrailingBytes(usize),

    #[error("peer key is not valid hex: {0}")]
    InvalidKeyHex(String),

    #[error("peer key must be {} bytes, got {0}", KEY_LEN)]
    InvalidKeyLength(usize),
}

// ── Tests ─────────────────────────────────────────────────────────────────────
