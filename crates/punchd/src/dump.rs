//! SIGHUP registry dump: `kill -HUP $(pidof punchd)` writes every known
//! peer to the log.

use punch_services::PeerRegistry;

/// Log the registry contents. Returns the number of peers logged.
pub fn log_registry(registry: &PeerRegistry) -> usize {
    let entries = registry.enumerate();
    tracing::info!(
        count = entries.len(),
        capacity = registry.capacity(),
        evictions = registry.evictions(),
        "dump peers"
    );
    for entry in &entries {
        tracing::info!(
            peer = %entry.record.key(),
            addr = %entry.record.addr(),
            last_seen_secs = entry.registered_at.elapsed().as_secs(),
            "  peer"
        );
    }
    entries.len()
}

/// Dump the registry on every SIGHUP. Runs until the task is aborted.
#[cfg(unix)]
pub async fn dump_on_hangup(registry: PeerRegistry) -> anyhow::Result<()> {
    use anyhow::Context;
    use tokio::signal::unix::{signal, SignalKind};

    let mut hangup = signal(SignalKind::hangup()).context("failed to install SIGHUP handler")?;
    while hangup.recv().await.is_some() {
        log_registry(&registry);
    }
    Ok(())
}

#[cfg(not(unix))]
pub async fn dump_on_hangup(_registry: PeerRegistry) -> anyhow::Result<()> {
    std::future::pending::<()>().await;
    Ok(())
}
