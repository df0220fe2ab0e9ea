//! /api/status and /api/peers handlers.

use axum::extract::State;
use axum::Json;
use serde::Serialize;

use punch_services::StatsSnapshot;

use super::{peers_newest_first, ApiState};

// ── /api/status ──────────────────────────────────────────────────────────────

#[derive(Serialize)]
pub struct StatusResponse {
    pub status: String,
    pub udp_port: u16,
    pub web_port: u16,
    pub client_count: usize,
    pub capacity: usize,
    pub evictions: u64,
    pub uptime_secs: u64,
    pub protocol: StatsSnapshot,
}

pub async fn handle_status(State(state): State<ApiState>) -> Json<StatusResponse> {
    Json(status_of(&state))
}

fn status_of(state: &ApiState) -> StatusResponse {
    StatusResponse {
        status: "running".to_string(),
        udp_port: state.udp_port,
        web_port: state.web_port,
        client_count: state.registry.len(),
        capacity: state.registry.capacity(),
        evictions: state.registry.evictions(),
        uptime_secs: state.started_at.elapsed().as_secs(),
        protocol: state.stats.snapshot(),
    }
}

// ── /api/peers ───────────────────────────────────────────────────────────────

#[derive(Serialize)]
pub struct PeersResponse {
    pub peers: Vec<PeerInfo>,
}

#[derive(Serialize)]
pub struct PeerInfo {
    pub key: String,
    pub address: String,
    pub ip: String,
    pub port: u16,
    pub last_seen_secs: u64,
}

pub async fn handle_peers(State(state): State<ApiState>) -> Json<PeersResponse> {
    Json(PeersResponse {
        peers: peers_of(&state),
    })
}

fn peers_of(state: &ApiState) -> Vec<PeerInfo> {
    peers_newest_first(&state.registry)
        .into_iter()
        .map(|e| PeerInfo {
            key: e.record.key().to_string(),
            address: e.record.addr().to_string(),
            ip: e.record.ip().to_string(),
            port: e.record.port(),
            last_seen_secs: e.registered_at.elapsed().as_secs(),
        })
        .collect()
}

// ── /api ─────────────────────────────────────────────────────────────────────

/// Status and peer list in one document.
#[derive(Serialize)]
pub struct OverviewResponse {
    #[serde(flatten)]
    pub status: StatusResponse,
    pub peers: Vec<PeerInfo>,
}

pub async fn handle_overview(State(state): State<ApiState>) -> Json<OverviewResponse> {
    Json(OverviewResponse {
        status: status_of(&state),
        peers: peers_of(&state),
    })
}
