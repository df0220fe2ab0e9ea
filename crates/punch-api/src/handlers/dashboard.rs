//! `/` HTML dashboard. Refreshes itself every 10 seconds.

use std::fmt::Write;

use axum::extract::State;
use axum::response::Html;

use super::{peers_newest_first, ApiState};

const STYLE: &str = "
        body { font-family: Arial, sans-serif; margin: 20px; }
        h1 { color: #333; }
        table { border-collapse: collapse; width: 100%; margin-top: 20px; }
        th, td { border: 1px solid #ddd; padding: 12px; text-align: left; }
        th { background-color: #f2f2f2; }
        tr:nth-child(even) { background-color: #f9f9f9; }
        .status { color: #28a745; font-weight: bold; }
        .info { margin-bottom: 20px; padding: 10px; background: #e9ecef; border-radius: 5px; }";

pub async fn handle_dashboard(State(state): State<ApiState>) -> Html<String> {
    let peers = peers_newest_first(&state.registry);

    let mut rows = String::new();
    for p in &peers {
        let key = p.record.key().to_string();
        // every value below is hex or numeric, nothing to escape
        let _ = write!(
            rows,
            "<tr><td title=\"{key}\">{}...</td><td>{}</td><td>{}</td><td>{}s ago</td></tr>",
            &key[..16],
            p.record.ip(),
            p.record.port(),
            p.registered_at.elapsed().as_secs(),
        );
    }

    let clients = if peers.is_empty() {
        "<p>No clients registered.</p>".to_string()
    } else {
        format!(
            "<table><tr><th>Client key</th><th>IP address</th><th>Port</th><th>Last seen</th></tr>{rows}</table>"
        )
    };

    Html(format!(
        r#"<!DOCTYPE html>
<html>
<head>
    <title>UDP Punch Monitor</title>
    <meta charset="utf-8">
    <meta name="viewport" content="width=device-width, initial-scale=1">
    <meta http-equiv="refresh" content="10">
    <style>{STYLE}
    </style>
</head>
<body>
    <h1>UDP Punch Server Monitor</h1>
    <div class="info">
        <p><strong>Status:</strong> <span class="status">running</span></p>
        <p><strong>UDP port:</strong> {udp_port}</p>
        <p><strong>Web port:</strong> {web_port}</p>
        <p><strong>Active clients:</strong> {count} / {capacity}</p>
        <p><strong>Evictions:</strong> {evictions}</p>
        <p><strong>Uptime:</strong> {uptime}s</p>
    </div>
    <h2>Registered clients</h2>
    {clients}
    <p style="margin-top: 30px; color: #666; font-size: 14px;">Refreshes every 10 seconds.</p>
</body>
</html>"#,
        udp_port = state.udp_port,
        web_port = state.web_port,
        count = peers.len(),
        capacity = state.registry.capacity(),
        evictions = state.registry.evictions(),
        uptime = state.started_at.elapsed().as_secs(),
    ))
}
