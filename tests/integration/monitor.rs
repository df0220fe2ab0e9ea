//! Monitor API over real HTTP.

use anyhow::Result;
use reqwest::StatusCode;
use serde_json::Value;

use crate::*;

async fn get(server: &TestServer, path: &str) -> Result<reqwest::Response> {
    Ok(reqwest::Client::new()
        .get(server.url(path))
        .basic_auth(MONITOR_USER, Some(MONITOR_PASS))
        .send()
        .await?)
}

#[tokio::test]
async fn every_route_requires_credentials() -> Result<()> {
    let server = TestServer::start(8).await?;
    let http = reqwest::Client::new();

    for path in ["/", "/api", "/api/status", "/api/peers"] {
        let resp = http.get(server.url(path)).send().await?;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED, "{path}");
        let challenge = resp
            .headers()
            .get("www-authenticate")
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default();
        assert!(challenge.contains("UDP Punch Monitor"), "{path}: {challenge}");

        let resp = http
            .get(server.url(path))
            .basic_auth(MONITOR_USER, Some("wrong"))
            .send()
            .await?;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED, "{path}");

        assert_eq!(get(&server, path).await?.status(), StatusCode::OK, "{path}");
    }

    server.stop().await
}

#[tokio::test]
async fn status_reflects_registrations() -> Result<()> {
    let server = TestServer::start(8).await?;
    let a = client().await?;
    let b = client().await?;
    register(&server, &a, &key(1)).await?;
    register(&server, &b, &key(2)).await?;
    resolve(&server, &a, &[key(2), key(3)]).await?;

    let status: Value = get(&server, "/api/status").await?.json().await?;
    assert_eq!(status["status"], "running");
    assert_eq!(status["udp_port"], server.udp_addr.port());
    assert_eq!(status["web_port"], server.http_addr.port());
    assert_eq!(status["client_count"], 2);
    assert_eq!(status["capacity"], 8);
    assert_eq!(status["evictions"], 0);
    assert!(status["uptime_secs"].is_number());
    assert_eq!(status["protocol"]["handshakes"], 2);
    assert_eq!(status["protocol"]["resolves"], 1);
    assert_eq!(status["protocol"]["resolved_records"], 1);

    server.stop().await
}

#[tokio::test]
async fn peers_lists_addresses_without_touching_recency() -> Result<()> {
    let server = TestServer::start(2).await?;
    let a = client().await?;
    let b = client().await?;
    register(&server, &a, &key(0xA)).await?;
    register(&server, &b, &key(0xB)).await?;

    // A is the least recently used. A listing that touched entries would
    // freshen A and get B evicted below.
    let reply = resolve(&server, &a, &[key(0xB)]).await?;
    assert_eq!(reply.len(), 38);

    let peers: Value = get(&server, "/api/peers").await?.json().await?;
    let peers = peers["peers"].as_array().cloned().unwrap_or_default();
    assert_eq!(peers.len(), 2);

    let a_addr = a.local_addr()?;
    let a_entry = peers
        .iter()
        .find(|p| p["key"] == key(0xA).to_string())
        .expect("A listed");
    assert_eq!(a_entry["address"], a_addr.to_string());
    assert_eq!(a_entry["ip"], "127.0.0.1");
    assert_eq!(a_entry["port"], a_addr.port());

    // listing is read-only: A is still the oldest and goes first
    let c = client().await?;
    register(&server, &c, &key(0xC)).await?;
    assert!(server.registry.lookup(&key(0xA)).is_none());
    assert!(server.registry.lookup(&key(0xB)).is_some());

    server.stop().await
}

#[tokio::test]
async fn api_root_has_status_and_peers() -> Result<()> {
    let server = TestServer::start(8).await?;
    let a = client().await?;
    register(&server, &a, &key(0x21)).await?;

    let doc: Value = get(&server, "/api").await?.json().await?;
    assert_eq!(doc["status"], "running");
    assert_eq!(doc["udp_port"], server.udp_addr.port());
    assert_eq!(doc["client_count"], 1);
    assert_eq!(doc["peers"][0]["key"], key(0x21).to_string());
    assert_eq!(doc["peers"][0]["address"], a.local_addr()?.to_string());

    server.stop().await
}

#[tokio::test]
async fn dashboard_renders() -> Result<()> {
    let server = TestServer::start(8).await?;
    let a = client().await?;
    register(&server, &a, &key(0x42)).await?;

    let page = get(&server, "/").await?.text().await?;
    assert!(page.contains("UDP Punch Server Monitor"));
    assert!(page.contains(r#"http-equiv="refresh" content="10""#));
    assert!(page.contains(&format!("{}...", &key(0x42).to_string()[..16])));
    assert!(page.contains(&a.local_addr()?.port().to_string()));

    server.stop().await
}
