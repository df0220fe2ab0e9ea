//! punchd: UDP rendezvous daemon for NAT hole punching.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use tokio::sync::broadcast;

use punch_core::config::{PunchConfig, DEFAULT_MONITOR_PASSWORD};
use punch_services::{DenyList, OpenRegistration, PeerRegistry, ProtocolStats, RegistrationPolicy};

use punchd::{bind_socket, dump, ListenerSettings, RendezvousHandler, UdpListener};

#[tokio::main]
async fn main() -> Result<()> {
    if std::env::args()
        .nth(1)
        .is_some_and(|a| a == "--version" || a == "-V")
    {
        println!("punchd {}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    // Load config
    if let Err(e) = PunchConfig::write_default_if_missing() {
        tracing::warn!(error = %e, "failed to write default config");
    }
    let config = PunchConfig::load().unwrap_or_else(|e| {
        tracing::warn!(error = %e, "failed to load config, using defaults");
        PunchConfig::default()
    });
    config.validate().context("refusing to start")?;
    tracing::info!(
        path = %PunchConfig::file_path().display(),
        capacity = config.registry.capacity,
        "punchd starting"
    );

    if config.monitor.enabled && config.monitor.password == DEFAULT_MONITOR_PASSWORD {
        tracing::warn!("monitor is using the default password, set monitor.password");
    }

    // Shared state
    let registry = PeerRegistry::new(config.registry.capacity);
    let stats = ProtocolStats::new();
    let policy: Arc<dyn RegistrationPolicy> = if config.registration.blocked_keys.is_empty() {
        Arc::new(OpenRegistration)
    } else {
        let deny = DenyList::from_hex_keys(&config.registration.blocked_keys);
        tracing::info!(blocked = deny.len(), "registration deny list loaded");
        Arc::new(deny)
    };

    // Shutdown
    let (shutdown_tx, _) = broadcast::channel::<()>(1);
    {
        let shutdown_tx = shutdown_tx.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("interrupt received, shutting down");
                let _ = shutdown_tx.send(());
            }
        });
    }

    // Rendezvous socket
    let udp_addr = SocketAddr::new(config.network.bind_addr, config.network.udp_port);
    let socket = bind_socket(udp_addr, config.network.recv_buffer_bytes)?;
    let handler = RendezvousHandler::new(registry.clone(), policy, stats.clone())
        .with_max_reply_bytes(config.listener.max_reply_bytes);
    let listener = UdpListener::new(
        socket,
        handler,
        ListenerSettings {
            max_datagram: config.network.max_datagram,
            max_consecutive_errors: config.listener.max_consecutive_errors,
        },
        stats.clone(),
        shutdown_tx.subscribe(),
    );
    let listener_task = tokio::spawn(listener.run());

    // SIGHUP dump
    let dump_task = {
        let registry = registry.clone();
        tokio::spawn(async move {
            if let Err(e) = dump::dump_on_hangup(registry).await {
                tracing::warn!(error = %e, "registry dump disabled");
            }
        })
    };

    // Monitor
    let monitor_task = if config.monitor.enabled {
        let state = punch_api::ApiState {
            registry: registry.clone(),
            stats: stats.clone(),
            udp_port: config.network.udp_port,
            web_port: config.monitor.port,
            started_at: Instant::now(),
            credentials: Arc::new(punch_api::Credentials::new(
                &config.monitor.username,
                &config.monitor.password,
            )),
        };
        let addr = SocketAddr::new(config.monitor.bind_addr, config.monitor.port);
        let shutdown = shutdown_tx.subscribe();
        Some(tokio::spawn(async move {
            if let Err(e) = punch_api::serve(state, addr, shutdown).await {
                tracing::error!(error = %e, "monitor failed");
            }
        }))
    } else {
        tracing::info!("monitor disabled");
        None
    };

    let result = listener_task.await.context("listener task panicked")?;

    let _ = shutdown_tx.send(());
    if let Some(task) = monitor_task {
        let _ = task.await;
    }
    dump_task.abort();

    match result {
        Ok(()) => {
            tracing::info!(peers = registry.len(), "punchd stopped");
            Ok(())
        }
        Err(e) => {
            tracing::error!(error = %e, "rendezvous listener failed");
            Err(e.into())
        }
    }
}
