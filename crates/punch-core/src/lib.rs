//! punch-core: wire format and configuration shared by every udppunch crate.

pub mod config;
pub mod wire;

pub use config::PunchConfig;
pub use wire::{MessageType, PeerKey, PeerRecord, WireError};
