use std::net::SocketAddr;

use tracing_subscriber::EnvFilter;

use oc_server::config::ServerConfig;
use oc_server::engine::GameEngine;
use oc_server::{build_app, persistence, shutdown_all_rooms, spawn_edit_saver, spawn_rate_limit_cleanup, spawn_room_reaper};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt().with_env_filter(EnvFilter::from_default_env()).init();

    let config = ServerConfig::load();
    config.validate();
    let listen_addr = config.listen_addr.clone();

    let pool = persistence::open_pool(&config.database_url)
        .await
        .unwrap_or_else(|e| panic!("failed to open database {}: {e}", config.database_url));
    let engine = GameEngine::new(pool);

    let (app, state) = build_app(config, engine);

    spawn_room_reaper(state.clone());
    spawn_edit_saver(state.clone());
    spawn_rate_limit_cleanup(state.clone());

    let listener = tokio::net::TcpListener::bind(&listen_addr)
        .await
        .unwrap_or_else(|e| panic!("failed to bind to {listen_addr}: {e}"));

    tracing::info!("Only Connect server listening on {listen_addr}");

    let shutdown_state = state.clone();
    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown_signal(shutdown_state))
        .await
        .expect("server error");
}

/// Waits for SIGINT/SIGTERM, then performs the graceful shutdown sequence
/// from spec.md §5: cancel background tasks, close every room's sockets.
async fn shutdown_signal(state: oc_server::state::AppState) {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("shutdown signal received, stopping rooms");
    state.shutdown.cancel();
    shutdown_all_rooms(&state).await;
    state.engine.pool().close().await;
}
