//! Register and resolve over real loopback UDP.

use std::net::SocketAddr;

use anyhow::Result;

use punch_core::wire::{decode_reply, handshake_datagram, PeerRecord, RECORD_LEN};

use crate::*;

fn record_of(reply: &[u8]) -> Vec<(PeerKey, SocketAddr)> {
    decode_reply(reply)
        .expect("reply is whole records")
        .iter()
        .map(|r: &PeerRecord| (r.key(), SocketAddr::V4(r.addr())))
        .collect()
}

#[tokio::test]
async fn peer_learns_the_other_peers_public_address() -> Result<()> {
    let server = TestServer::start(16).await?;
    let alice = client().await?;
    let bob = client().await?;

    register(&server, &alice, &key(0xA1)).await?;
    register(&server, &bob, &key(0xB0)).await?;

    let reply = resolve(&server, &bob, &[key(0xA1)]).await?;
    assert_eq!(record_of(&reply), vec![(key(0xA1), alice.local_addr()?)]);

    let reply = resolve(&server, &alice, &[key(0xB0)]).await?;
    assert_eq!(record_of(&reply), vec![(key(0xB0), bob.local_addr()?)]);

    server.stop().await
}

#[tokio::test]
async fn unknown_keys_are_skipped_in_query_order() -> Result<()> {
    let server = TestServer::start(16).await?;
    let a = client().await?;
    let b = client().await?;
    register(&server, &a, &key(1)).await?;
    register(&server, &b, &key(2)).await?;

    let asker = client().await?;
    let reply = resolve(&server, &asker, &[key(1), key(0xEE), key(2)]).await?;

    assert_eq!(reply.len(), 2 * RECORD_LEN);
    assert_eq!(
        record_of(&reply),
        vec![(key(1), a.local_addr()?), (key(2), b.local_addr()?)]
    );

    server.stop().await
}

#[tokio::test]
async fn no_matches_gets_an_empty_reply() -> Result<()> {
    let server = TestServer::start(16).await?;
    let asker = client().await?;

    let reply = resolve(&server, &asker, &[key(7), key(8)]).await?;
    assert!(reply.is_empty());

    // a bare tag asks for nothing and still gets answered
    let reply = exchange(&server, &asker, &[0x02]).await?;
    assert!(reply.is_empty());

    server.stop().await
}

#[tokio::test]
async fn re_registering_moves_the_peer() -> Result<()> {
    let server = TestServer::start(16).await?;
    let old = client().await?;
    let new = client().await?;

    register(&server, &old, &key(5)).await?;
    register(&server, &new, &key(5)).await?;
    assert_eq!(server.registry.len(), 1);

    let reply = resolve(&server, &old, &[key(5)]).await?;
    assert_eq!(record_of(&reply), vec![(key(5), new.local_addr()?)]);

    server.stop().await
}

#[tokio::test]
async fn malformed_datagrams_change_nothing() -> Result<()> {
    let server = TestServer::start(16).await?;
    let sender = client().await?;

    let mut short = handshake_datagram(&key(9));
    short.truncate(20);
    sender.send_to(&short, server.udp_addr).await?;
    sender.send_to(&[0x7F, 1, 2, 3], server.udp_addr).await?;
    sender.send_to(&[], server.udp_addr).await?;

    // datagrams are handled in order, so once this is answered the junk
    // above has been seen
    let reply = resolve(&server, &sender, &[key(9)]).await?;
    assert!(reply.is_empty());

    assert!(server.registry.is_empty());
    let stats = server.stats.snapshot();
    assert_eq!(stats.handshakes, 0);
    assert_eq!(stats.dropped, 3);
    assert_eq!(stats.resolves, 1);

    server.stop().await
}

#[tokio::test]
async fn least_recently_used_peer_is_evicted() -> Result<()> {
    let server = TestServer::start(2).await?;
    let a = client().await?;
    let b = client().await?;
    let c = client().await?;

    register(&server, &a, &key(0xA)).await?;
    register(&server, &b, &key(0xB)).await?;

    // resolving A makes B the oldest
    let reply = resolve(&server, &c, &[key(0xA)]).await?;
    assert_eq!(reply.len(), RECORD_LEN);

    register(&server, &c, &key(0xC)).await?;
    assert_eq!(server.registry.len(), 2);
    assert_eq!(server.registry.evictions(), 1);

    let reply = resolve(&server, &c, &[key(0xA), key(0xB), key(0xC)]).await?;
    assert_eq!(
        record_of(&reply),
        vec![(key(0xA), a.local_addr()?), (key(0xC), c.local_addr()?)]
    );

    server.stop().await
}

#[tokio::test]
async fn shutdown_is_clean() -> Result<()> {
    let server = TestServer::start(4).await?;
    let a = client().await?;
    register(&server, &a, &key(1)).await?;
    server.stop().await
}
