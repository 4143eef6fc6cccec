pub mod api;
pub mod auth;
pub mod config;
pub mod engine;
pub mod error;
pub mod health;
pub mod persistence;
pub mod rate_limit;
pub mod room;
pub mod room_manager;
pub mod state;
pub mod ws;

use std::net::SocketAddr;
use std::time::Duration;

use axum::extract::ConnectInfo;
use axum::http::HeaderValue;
use axum::middleware;
use axum::Router;
use tower::ServiceBuilder;
use tower_http::compression::CompressionLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::timeout::TimeoutLayer;

use config::ServerConfig;
use engine::GameEngine;
use state::AppState;

/// Build the Axum router and application state from a config and an
/// already-open engine (spec.md §6 "HTTP surface").
pub fn build_app(config: ServerConfig, engine: GameEngine) -> (Router<()>, AppState) {
    let web_root = config.web_root.clone();
    let state = AppState::new(config, engine);

    let api_routes = Router::new()
        .route("/episodes", axum::routing::post(api::create_episode))
        .route("/episodes/mine", axum::routing::get(api::list_my_episodes))
        .route("/episodes/by-state/{state}", axum::routing::get(api::list_by_state))
        .route("/episodes/{episode_id}/submit", axum::routing::post(api::submit_for_review))
        .route("/episodes/{episode_id}/publish", axum::routing::post(api::publish_episode))
        .route("/episodes/{episode_id}/play", axum::routing::post(api::start_play_room))
        .route("/episodes/{episode_id}/edit", axum::routing::post(api::start_edit_room))
        .route("/episodes/{episode_id}/review", axum::routing::post(api::start_view_room))
        .route("/blob", axum::routing::post(api::upload_blob))
        .route("/blob/{blob_id}", axum::routing::get(api::get_blob))
        .layer(middleware::from_fn_with_state(state.clone(), api_rate_limit_layer))
        .layer(ServiceBuilder::new().layer(TimeoutLayer::with_status_code(
            axum::http::StatusCode::REQUEST_TIMEOUT,
            Duration::from_secs(30),
        )));

    let cors = CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any);

    let mut static_router = Router::new().fallback_service(ServeDir::new(&web_root));
    if state.config.asset_optimization {
        static_router = static_router.layer(CompressionLayer::new());
    }

    let app = Router::new()
        .route("/ws/{code}", axum::routing::get(ws::ws_handler))
        .route("/health", axum::routing::get(health::health_check))
        .route("/health/ready", axum::routing::get(health::readiness_check))
        .nest("/api/v1", api_routes)
        .merge(static_router)
        .layer(axum::middleware::from_fn(cache_control_middleware))
        .layer(cors)
        .layer(SetResponseHeaderLayer::overriding(
            axum::http::header::X_FRAME_OPTIONS,
            HeaderValue::from_static("DENY"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            axum::http::header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            axum::http::header::HeaderName::from_static("x-xss-protection"),
            HeaderValue::from_static("0"),
        ))
        .with_state(state.clone());

    (app, state)
}

/// Background reaper for idle rooms (spec.md §4.D, §5).
pub fn spawn_room_reaper(state: AppState) {
    let shutdown = state.shutdown.clone();
    let registry = state.rooms.clone();
    let engine = state.engine.clone();
    let reap_interval = Duration::from_secs(state.config.rooms.idle_check_interval_secs);
    tokio::spawn(async move {
        tokio::select! {
            _ = shutdown.cancelled() => {
                tracing::info!("room reaper shutting down");
            }
            _ = room_manager::run_reaper(registry, engine, reap_interval) => {}
        }
    });
}

/// Background debounced-save loop for edit rooms (spec.md §4.E).
pub fn spawn_edit_saver(state: AppState) {
    let shutdown = state.shutdown.clone();
    let registry = state.rooms.clone();
    let engine = state.engine.clone();
    let poll_interval = Duration::from_secs(state.config.rooms.edit_save_poll_secs);
    tokio::spawn(async move {
        tokio::select! {
            _ = shutdown.cancelled() => {
                tracing::info!("edit saver shutting down");
            }
            _ = room_manager::run_edit_saver(registry, engine, poll_interval) => {}
        }
    });
}

/// Background task that periodically cleans up stale rate-limiter entries.
pub fn spawn_rate_limit_cleanup(state: AppState) {
    let shutdown = state.shutdown.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(300));
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    tracing::info!("rate limiter cleanup shutting down");
                    break;
                }
                _ = interval.tick() => {
                    state.api_rate_limiter.cleanup(Duration::from_secs(300)).await;
                }
            }
        }
    });
}

/// Graceful shutdown (spec.md §5): stop every live room (closing every
/// socket with a `close` frame).
pub async fn shutdown_all_rooms(state: &AppState) {
    let rooms = state.rooms.lock().await.all_rooms();
    for room in rooms {
        room.lock().await.stop();
    }
}

async fn cache_control_middleware(request: axum::extract::Request, next: middleware::Next) -> axum::response::Response {
    let path = request.uri().path().to_string();
    let mut response = next.run(request).await;

    if path.starts_with("/api/") || path.starts_with("/ws/") || path == "/health" || path == "/health/ready" {
        return response;
    }

    let cache_value = if path.ends_with(".png") || path.ends_with(".svg") || path.ends_with(".jpg") {
        HeaderValue::from_static("public, max-age=86400")
    } else if path.ends_with(".js") || path.ends_with(".css") {
        HeaderValue::from_static("no-cache")
    } else {
        HeaderValue::from_static("public, max-age=300")
    };

    response.headers_mut().insert(axum::http::header::CACHE_CONTROL, cache_value);
    response
}

async fn api_rate_limit_layer(
    axum::extract::State(state): axum::extract::State<AppState>,
    request: axum::extract::Request,
    next: middleware::Next,
) -> Result<axum::response::Response, axum::http::StatusCode> {
    let ip = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ci| ci.0.ip())
        .unwrap_or(std::net::IpAddr::V4(std::net::Ipv4Addr::LOCALHOST));
    if !state.api_rate_limiter.check_rate_limit(ip).await {
        tracing::warn!(%ip, "API rate limit exceeded");
        return Err(axum::http::StatusCode::TOO_MANY_REQUESTS);
    }
    Ok(next.run(request).await)
}
