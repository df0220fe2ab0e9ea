//! UDP rendezvous listener.
//!
//! One task, one socket, datagrams handled strictly in arrival order. Read
//! errors are split into transient (log, keep serving) and fatal (the
//! socket is gone, stop). A run of transient errors with no successful
//! read in between is escalated to fatal so a broken socket cannot spin
//! the loop forever.

use std::io;
use std::net::SocketAddr;

use socket2::{Domain, Protocol, Socket, Type};
use tokio::net::UdpSocket;
use tokio::sync::broadcast;

use crate::handler::{Outcome, RendezvousHandler};
use punch_core::wire::MAX_DATAGRAM;
use punch_services::ProtocolStats;

#[derive(Debug, thiserror::Error)]
pub enum ListenerError {
    #[error("failed to bind rendezvous socket on {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },

    #[error("rendezvous socket failed: {0}")]
    Fatal(#[source] io::Error),

    #[error("giving up after {count} consecutive receive errors, last: {last}")]
    TooManyErrors {
        count: u32,
        #[source]
        last: io::Error,
    },
}

/// How a failed `recv_from` should be treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecvFailure {
    /// Log and keep receiving.
    Transient,
    /// The socket is unusable; stop the listener.
    Fatal,
}

/// Sort a receive error into transient or fatal.
///
/// ICMP feedback for earlier replies (refused, reset, unreachable) and
/// buffer pressure are transient. A closed or invalid descriptor is fatal,
/// as is anything unrecognised.
pub fn classify_recv_error(err: &io::Error) -> RecvFailure {
    use io::ErrorKind::*;

    match err.kind() {
        Interrupted | WouldBlock | TimedOut | ConnectionRefused | ConnectionReset
        | ConnectionAborted | OutOfMemory => return RecvFailure::Transient,
        _ => {}
    }

    match err.raw_os_error() {
        Some(libc::ENOBUFS) | Some(libc::ENOMEM) | Some(libc::EHOSTUNREACH)
        | Some(libc::ENETUNREACH) => RecvFailure::Transient,
        _ => RecvFailure::Fatal,
    }
}

/// Counts consecutive transient receive errors.
#[derive(Debug)]
pub struct ErrorBudget {
    limit: u32,
    consecutive: u32,
}

impl ErrorBudget {
    pub fn new(limit: u32) -> Self {
        Self {
            limit,
            consecutive: 0,
        }
    }

    /// A datagram arrived; the run of errors is over.
    pub fn reset(&mut self) {
        self.consecutive = 0;
    }

    /// Account for a failed read. Err means the listener must stop.
    pub fn absorb(&mut self, err: io::Error) -> Result<(), ListenerError> {
        if classify_recv_error(&err) == RecvFailure::Fatal {
            return Err(ListenerError::Fatal(err));
        }

        self.consecutive += 1;
        if self.consecutive >= self.limit {
            return Err(ListenerError::TooManyErrors {
                count: self.consecutive,
                last: err,
            });
        }

        tracing::warn!(
            error = %err,
            consecutive = self.consecutive,
            "recv_from failed, continuing"
        );
        Ok(())
    }
}

/// Tunables for the receive loop.
#[derive(Debug, Clone, Copy)]
pub struct ListenerSettings {
    pub max_datagram: usize,
    pub max_consecutive_errors: u32,
}

impl Default for ListenerSettings {
    fn default() -> Self {
        Self {
            max_datagram: MAX_DATAGRAM,
            max_consecutive_errors: 64,
        }
    }
}

/// Create the rendezvous socket. Must be called inside a tokio runtime.
pub fn bind_socket(addr: SocketAddr, recv_buffer_bytes: usize) -> Result<UdpSocket, ListenerError> {
    let bind_err = |source| ListenerError::Bind { addr, source };

    let socket = Socket::new(Domain::for_address(addr), Type::DGRAM, Some(Protocol::UDP))
        .map_err(bind_err)?;
    if recv_buffer_bytes > 0 {
        socket
            .set_recv_buffer_size(recv_buffer_bytes)
            .map_err(bind_err)?;
    }
    socket.set_nonblocking(true).map_err(bind_err)?;
    socket.bind(&addr.into()).map_err(bind_err)?;

    UdpSocket::from_std(socket.into()).map_err(bind_err)
}

pub struct UdpListener {
    socket: UdpSocket,
    handler: RendezvousHandler,
    settings: ListenerSettings,
    stats: ProtocolStats,
    shutdown: broadcast::Receiver<()>,
}

impl UdpListener {
    pub fn new(
        socket: UdpSocket,
        handler: RendezvousHandler,
        settings: ListenerSettings,
        stats: ProtocolStats,
        shutdown: broadcast::Receiver<()>,
    ) -> Self {
        Self {
            socket,
            handler,
            settings,
            stats,
            shutdown,
        }
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// Serve until shutdown (Ok) or until the socket fails for good (Err).
    pub async fn run(mut self) -> Result<(), ListenerError> {
        let mut buf = vec![0u8; self.settings.max_datagram];
        let mut budget = ErrorBudget::new(self.settings.max_consecutive_errors);

        if let Ok(addr) = self.socket.local_addr() {
            tracing::info!(%addr, "rendezvous listener starting");
        }

        loop {
            tokio::select! {
                _ = self.shutdown.recv() => {
                    tracing::info!("rendezvous listener shutting down");
                    return Ok(());
                }

                result = self.socket.recv_from(&mut buf) => {
                    let (len, source) = match result {
                        Ok(r) => {
                            budget.reset();
                            r
                        }
                        Err(e) => {
                            self.stats.record_recv_error();
                            budget.absorb(e)?;
                            continue;
                        }
                    };

                    if let Outcome::Reply(reply) = self.handler.handle(&buf[..len], source) {
                        if let Err(e) = self.socket.send_to(&reply, source).await {
                            tracing::warn!(error = %e, %source, "failed to send resolve reply");
                        }
                    }
                }
            }
        }
    }
}
