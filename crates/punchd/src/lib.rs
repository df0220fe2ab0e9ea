//! punchd: UDP rendezvous daemon for NAT hole punching.
//!
//! The library half holds the protocol handler and the receive loop so the
//! integration tests can run a server in-process.

pub mod dump;
pub mod handler;
pub mod listener;

pub use handler::{DropReason, Outcome, RendezvousHandler};
pub use listener::{bind_socket, ListenerError, ListenerSettings, UdpListener};
