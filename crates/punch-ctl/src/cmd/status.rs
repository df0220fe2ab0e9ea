//! Monitor-backed commands: status, peers.

use anyhow::Result;
use serde::Deserialize;

use super::http::{get_json, Monitor};

// ── Response types ────────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct StatusResponse {
    status: String,
    udp_port: u16,
    web_port: u16,
    client_count: usize,
    capacity: usize,
    evictions: u64,
    uptime_secs: u64,
    protocol: ProtocolInfo,
}

#[derive(Deserialize)]
struct ProtocolInfo {
    handshakes: u64,
    resolves: u64,
    resolved_records: u64,
    dropped: u64,
    recv_errors: u64,
}

#[derive(Deserialize)]
struct PeersResponse {
    peers: Vec<PeerInfo>,
}

#[derive(Deserialize)]
#[allow(dead_code)]
struct PeerInfo {
    key: String,
    address: String,
    ip: String,
    port: u16,
    last_seen_secs: u64,
}

// ── Commands ──────────────────────────────────────────────────────────────────

pub async fn cmd_status(monitor: &Monitor) -> Result<()> {
    let resp: StatusResponse = get_json(monitor, "/status").await?;

    println!("═══════════════════════════════════════");
    println!("  punchd Status");
    println!("═══════════════════════════════════════");
    println!("  Status           : {}", resp.status);
    println!("  UDP port         : {}", resp.udp_port);
    println!("  Web port         : {}", resp.web_port);
    println!("  Clients          : {} / {}", resp.client_count, resp.capacity);
    println!("  Evictions        : {}", resp.evictions);
    println!("  Uptime           : {}s", resp.uptime_secs);
    println!();
    println!("  Handshakes       : {}", resp.protocol.handshakes);
    println!("  Resolves         : {}", resp.protocol.resolves);
    println!("  Records served   : {}", resp.protocol.resolved_records);
    println!("  Dropped          : {}", resp.protocol.dropped);
    println!("  Receive errors   : {}", resp.protocol.recv_errors);

    Ok(())
}

pub async fn cmd_peers(monitor: &Monitor) -> Result<()> {
    let resp: PeersResponse = get_json(monitor, "/peers").await?;

    if resp.peers.is_empty() {
        println!("No peers registered.");
        return Ok(());
    }

    println!("═══════════════════════════════════════");
    println!("  Registered Peers ({})", resp.peers.len());
    println!("═══════════════════════════════════════");

    for p in &resp.peers {
        println!("  ┌─ {}", &p.key[..16.min(p.key.len())]);
        println!("  │  address   : {}", p.address);
        println!("  └─ last seen : {}s ago", p.last_seen_secs);
    }

    Ok(())
}
