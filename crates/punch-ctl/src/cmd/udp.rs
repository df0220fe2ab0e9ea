//! Rendezvous protocol commands: register, resolve.

use std::net::SocketAddr;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use tokio::net::UdpSocket;
use tokio::time::Instant;

use punch_core::wire::{decode_reply, handshake_datagram, resolve_datagram, PeerKey, MAX_UDP_PAYLOAD};

const REPLY_TIMEOUT: Duration = Duration::from_secs(2);

fn parse_keys(keys: &[&str]) -> Result<Vec<PeerKey>> {
    keys.iter()
        .map(|k| k.parse::<PeerKey>().with_context(|| format!("bad key {k}")))
        .collect()
}

/// First IPv4 address `server` resolves to. The server only speaks IPv4.
async fn server_addr(server: &str) -> Result<SocketAddr> {
    tokio::net::lookup_host(server)
        .await
        .with_context(|| format!("cannot resolve {server}"))?
        .find(SocketAddr::is_ipv4)
        .with_context(|| format!("{server} has no IPv4 address"))
}

/// Wait for one datagram from `server`. Datagrams from anyone else are
/// ignored.
async fn recv_reply(socket: &UdpSocket, server: SocketAddr, timeout: Duration) -> Result<Vec<u8>> {
    let deadline = Instant::now() + timeout;
    let mut buf = vec![0u8; MAX_UDP_PAYLOAD];
    loop {
        let (len, from) = tokio::time::timeout_at(deadline, socket.recv_from(&mut buf))
            .await
            .with_context(|| format!("no reply from {server} within {}s", timeout.as_secs()))?
            .context("failed to receive reply")?;
        if from == server {
            buf.truncate(len);
            return Ok(buf);
        }
    }
}

async fn ephemeral_socket() -> Result<UdpSocket> {
    UdpSocket::bind("0.0.0.0:0")
        .await
        .context("failed to bind local UDP socket")
}

pub async fn cmd_register(server: &str, key: &str) -> Result<()> {
    let key: PeerKey = key.parse().with_context(|| format!("bad key {key}"))?;
    let server = server_addr(server).await?;
    let socket = ephemeral_socket().await?;
    socket
        .send_to(&handshake_datagram(&key), server)
        .await
        .with_context(|| format!("failed to send handshake to {server}"))?;

    println!("Registered {} from {}", key.short(), socket.local_addr()?);
    Ok(())
}

pub async fn cmd_resolve(server: &str, keys: &[&str]) -> Result<()> {
    if keys.is_empty() {
        bail!("resolve needs at least one key");
    }
    let keys = parse_keys(keys)?;
    let server = server_addr(server).await?;
    let socket = ephemeral_socket().await?;
    socket
        .send_to(&resolve_datagram(&keys), server)
        .await
        .with_context(|| format!("failed to send resolve to {server}"))?;

    let reply = recv_reply(&socket, server, REPLY_TIMEOUT).await?;
    let records = decode_reply(&reply)?;
    if records.is_empty() {
        println!("No keys resolved.");
    }
    for record in &records {
        println!("{record}");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_keys_reports_the_bad_one() {
        let good = "ab".repeat(32);
        assert_eq!(parse_keys(&[&good]).unwrap(), vec![PeerKey([0xab; 32])]);

        let err = parse_keys(&[&good, "nothex"]).unwrap_err();
        assert!(err.to_string().contains("nothex"));
    }

    #[tokio::test]
    async fn reply_from_a_stranger_is_ignored() {
        let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let server = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let stranger = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let me = socket.local_addr().unwrap();

        stranger.send_to(&[0xEE; 38], me).await.unwrap();
        server.send_to(&[0x11; 38], me).await.unwrap();

        let reply = recv_reply(&socket, server.local_addr().unwrap(), Duration::from_secs(2))
            .await
            .unwrap();
        assert_eq!(reply, vec![0x11; 38]);
    }

    #[tokio::test]
    async fn silence_times_out() {
        let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let server = UdpSocket::bind("127.0.0.1:0").await.unwrap();

        let err = recv_reply(&socket, server.local_addr().unwrap(), Duration::from_millis(50))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("no reply"));
    }
}
