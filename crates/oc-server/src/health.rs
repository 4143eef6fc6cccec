//! Health and readiness endpoints, grounded on the teacher's `health.rs`:
//! same JSON shape, generalised from game-room/player stats to
//! room/endpoint/socket counts (spec.md §4.C/§4.D).

use std::sync::atomic::Ordering;

use axum::extract::State;
use axum::Json;
use serde::Serialize;

use crate::state::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub connections: ConnectionInfo,
    pub rooms: RoomInfo,
}

#[derive(Serialize)]
pub struct ConnectionInfo {
    pub websocket: usize,
}

#[derive(Serialize)]
pub struct RoomInfo {
    pub active: usize,
}

pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let websocket = state.ws_connection_count.load(Ordering::Relaxed);
    let active = state.rooms.lock().await.len();

    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        connections: ConnectionInfo { websocket },
        rooms: RoomInfo { active },
    })
}

/// Verifies the durable store is reachable before declaring readiness.
pub async fn readiness_check(State(state): State<AppState>) -> &'static str {
    match state.engine.list_by_state(crate::engine::EpisodeState::Draft).await {
        Ok(_) => "ready",
        Err(_) => "not ready: database unavailable",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn health_response_serializes() {
        let resp = HealthResponse {
            status: "healthy",
            version: "0.1.0",
            connections: ConnectionInfo { websocket: 5 },
            rooms: RoomInfo { active: 1 },
        };
        let json = serde_json::to_string(&resp).unwrap();
        assert!(json.contains("\"healthy\""));
        assert!(json.contains("\"websocket\":5"));
        assert!(json.contains("\"active\":1"));
    }
}
