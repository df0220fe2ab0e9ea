pub mod auth;
pub mod handlers;

use std::net::SocketAddr;

use anyhow::Context;
use axum::middleware::from_fn_with_state;
use axum::routing::get;
use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::trace::TraceLayer;

pub use auth::Credentials;
pub use handlers::ApiState;

/// All monitor routes, behind Basic auth.
pub fn router(state: ApiState) -> Router {
    let api_routes = Router::new()
        .route("/", get(handlers::handle_overview))
        .route("/status", get(handlers::handle_status))
        .route("/peers", get(handlers::handle_peers));

    Router::new()
        .route("/", get(handlers::handle_dashboard))
        .nest("/api", api_routes)
        .layer(from_fn_with_state(state.clone(), auth::require_basic_auth))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn serve(
    state: ApiState,
    addr: SocketAddr,
    shutdown: broadcast::Receiver<()>,
) -> anyhow::Result<()> {
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind monitor on {addr}"))?;
    serve_listener(listener, state, shutdown).await
}

/// Serve on an already bound listener until `shutdown` fires.
pub async fn serve_listener(
    listener: TcpListener,
    state: ApiState,
    mut shutdown: broadcast::Receiver<()>,
) -> anyhow::Result<()> {
    let addr = listener.local_addr()?;
    tracing::info!(%addr, "monitor listening");
    axum::serve(listener, router(state))
        .with_graceful_shutdown(async move {
            let _ = shutdown.recv().await;
        })
        .await?;
    Ok(())
}
