//! punchd integration test harness.
//!
//! Every test runs its own server in-process on loopback: the rendezvous
//! socket and the monitor both bind port 0, so tests never collide and need
//! no privileges.
//!
//!   cargo test --test integration

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use tokio::net::{TcpListener, UdpSocket};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use punch_api::{ApiState, Credentials};
use punch_core::wire::{handshake_datagram, resolve_datagram, PeerKey, MAX_UDP_PAYLOAD};
use punch_services::{OpenRegistration, PeerRegistry, ProtocolStats};
use punchd::{bind_socket, ListenerError, ListenerSettings, RendezvousHandler, UdpListener};

mod monitor;
mod rendezvous;

// ── Harness ───────────────────────────────────────────────────────────────────

pub const MONITOR_USER: &str = "admin";
pub const MONITOR_PASS: &str = "s3cret";

/// How long to wait for anything the server should do promptly.
pub const PATIENCE: Duration = Duration::from_secs(2);

/// A running punchd: rendezvous listener plus monitor.
pub struct TestServer {
    pub udp_addr: SocketAddr,
    pub http_addr: SocketAddr,
    pub registry: PeerRegistry,
    pub stats: ProtocolStats,
    shutdown: broadcast::Sender<()>,
    listener: JoinHandle<Result<(), ListenerError>>,
    monitor: JoinHandle<Result<()>>,
}

impl TestServer {
    pub async fn start(capacity: usize) -> Result<Self> {
        let registry = PeerRegistry::new(capacity);
        let stats = ProtocolStats::new();
        let (shutdown, _) = broadcast::channel(1);

        let socket = bind_socket("127.0.0.1:0".parse()?, 0)?;
        let handler = RendezvousHandler::new(
            registry.clone(),
            Arc::new(OpenRegistration),
            stats.clone(),
        );
        let listener = UdpListener::new(
            socket,
            handler,
            ListenerSettings::default(),
            stats.clone(),
            shutdown.subscribe(),
        );
        let udp_addr = listener.local_addr()?;
        let listener = tokio::spawn(listener.run());

        let tcp = TcpListener::bind("127.0.0.1:0").await?;
        let http_addr = tcp.local_addr()?;
        let state = ApiState {
            registry: registry.clone(),
            stats: stats.clone(),
            udp_port: udp_addr.port(),
            web_port: http_addr.port(),
            started_at: Instant::now(),
            credentials: Arc::new(Credentials::new(MONITOR_USER, MONITOR_PASS)),
        };
        let monitor = tokio::spawn(punch_api::serve_listener(tcp, state, shutdown.subscribe()));

        Ok(Self {
            udp_addr,
            http_addr,
            registry,
            stats,
            shutdown,
            listener,
            monitor,
        })
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.http_addr, path)
    }

    /// Signal shutdown and wait for both tasks. Fails if either did not
    /// stop cleanly.
    pub async fn stop(self) -> Result<()> {
        let _ = self.shutdown.send(());
        tokio::time::timeout(PATIENCE, self.listener)
            .await
            .context("listener did not stop")??
            .context("listener returned an error")?;
        tokio::time::timeout(PATIENCE, self.monitor)
            .await
            .context("monitor did not stop")???;
        Ok(())
    }

    /// Block until `key` is registered at `addr`.
    pub async fn wait_registered(&self, key: &PeerKey, addr: SocketAddr) -> Result<()> {
        let deadline = Instant::now() + PATIENCE;
        loop {
            // enumerate, not lookup: waiting must not change eviction order
            let registered = self
                .registry
                .enumerate()
                .iter()
                .any(|e| e.record.key() == *key && SocketAddr::V4(e.record.addr()) == addr);
            if registered {
                return Ok(());
            }
            if Instant::now() > deadline {
                bail!("{} never registered at {addr}", key.short());
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }
}

/// A client socket on loopback.
pub async fn client() -> Result<UdpSocket> {
    Ok(UdpSocket::bind("127.0.0.1:0").await?)
}

pub fn key(fill: u8) -> PeerKey {
    PeerKey([fill; 32])
}

/// Register `key` from `socket` and wait until the server has it.
pub async fn register(server: &TestServer, socket: &UdpSocket, key: &PeerKey) -> Result<()> {
    socket.send_to(&handshake_datagram(key), server.udp_addr).await?;
    server.wait_registered(key, socket.local_addr()?).await
}

/// Send raw bytes and wait for one reply.
pub async fn exchange(server: &TestServer, socket: &UdpSocket, datagram: &[u8]) -> Result<Vec<u8>> {
    socket.send_to(datagram, server.udp_addr).await?;
    let mut buf = vec![0u8; MAX_UDP_PAYLOAD];
    let (len, from) = tokio::time::timeout(PATIENCE, socket.recv_from(&mut buf))
        .await
        .context("no reply from server")??;
    assert_eq!(from, server.udp_addr, "reply came from the wrong address");
    buf.truncate(len);
    Ok(buf)
}

/// Resolve `keys` and return the raw reply.
pub async fn resolve(server: &TestServer, socket: &UdpSocket, keys: &[PeerKey]) -> Result<Vec<u8>> {
    exchange(server, socket, &resolve_datagram(keys)).await
}
