//! HTTP surface for episodes, blobs, and room creation (spec.md §6).
//!
//! Grounded on the teacher's `api.rs` (JSON request/response handlers over
//! `AppState`, `AppError` as the handler error type) and the content-
//! addressed upload pattern from `examples/other_examples` blob stores —
//! generalised here to Only Connect episodes and SHA-256 blob dedup
//! (spec.md §5 "writes are idempotent").

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use serde_json::json;
use sha2::{Digest, Sha256};

use crate::auth::{cookie_from_headers, require_mod, require_user};
use crate::engine::EpisodeState;
use crate::error::AppError;
use crate::state::AppState;

async fn current_session(state: &AppState, headers: &HeaderMap) -> crate::auth::Session {
    let cookie = cookie_from_headers(headers);
    let session = state.sessions.get_or_create(cookie.as_deref()).await;
    state.sessions.put(session.clone()).await;
    session
}

#[derive(Deserialize)]
pub struct CreateEpisodeBody {
    pub title: String,
}

pub async fn create_episode(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<CreateEpisodeBody>,
) -> Result<Json<serde_json::Value>, AppError> {
    let session = current_session(&state, &headers).await;
    let user = require_user(&session, "create an episode")?;
    let episode_id = state.engine.create_blank_episode(user.user_id, &body.title).await?;
    Ok(Json(json!({ "episode_id": episode_id })))
}

pub async fn list_my_episodes(State(state): State<AppState>, headers: HeaderMap) -> Result<Json<serde_json::Value>, AppError> {
    let session = current_session(&state, &headers).await;
    let user = require_user(&session, "list episodes")?;
    let episodes = state.engine.list_user_episodes(user.user_id).await?;
    let body: Vec<_> = episodes
        .into_iter()
        .map(|(meta, versions)| {
            json!({
                "episode_id": meta.episode_id,
                "title": meta.title,
                "versions": versions.into_iter().map(|v| json!({
                    "version": v.version,
                    "state": v.state,
                    "version_updated": v.version_updated,
                })).collect::<Vec<_>>(),
            })
        })
        .collect();
    Ok(Json(json!({ "episodes": body })))
}

pub async fn list_by_state(
    State(state): State<AppState>,
    Path(state_name): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    let episode_state = match state_name.as_str() {
        "draft" => EpisodeState::Draft,
        "pending-review" => EpisodeState::PendingReview,
        "published" => EpisodeState::Published,
        "superseded" => EpisodeState::Superseded,
        "discarded" => EpisodeState::Discarded,
        other => return Err(AppError::BadRequest(format!("unknown lifecycle state {other}"))),
    };
    let versions = state.engine.list_by_state(episode_state).await?;
    Ok(Json(json!(versions
        .into_iter()
        .map(|v| json!({ "episode_id": v.episode_id, "version": v.version, "state": v.state }))
        .collect::<Vec<_>>())))
}

#[derive(Deserialize)]
pub struct SubmitBody {
    pub version: i64,
}

pub async fn submit_for_review(
    State(state): State<AppState>,
    Path(episode_id): Path<i64>,
    headers: HeaderMap,
    Json(body): Json<SubmitBody>,
) -> Result<StatusCode, AppError> {
    let session = current_session(&state, &headers).await;
    require_user(&session, "submit an episode for review")?;
    state.engine.submit_for_review(episode_id, body.version).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Deserialize)]
pub struct PublishBody {
    pub version: i64,
}

pub async fn publish_episode(
    State(state): State<AppState>,
    Path(episode_id): Path<i64>,
    headers: HeaderMap,
    Json(body): Json<PublishBody>,
) -> Result<StatusCode, AppError> {
    let session = current_session(&state, &headers).await;
    require_mod(&session, "publish an episode")?;
    state.engine.save_state(episode_id, body.version, EpisodeState::Published).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Deserialize)]
pub struct StartRoomQuery {
    #[serde(default)]
    pub version: i64,
    #[serde(default = "default_team_count")]
    pub team_count: usize,
}

fn default_team_count() -> usize {
    2
}

pub async fn start_play_room(
    State(state): State<AppState>,
    Path(episode_id): Path<i64>,
    axum::extract::Query(query): axum::extract::Query<StartRoomQuery>,
) -> Result<Json<serde_json::Value>, AppError> {
    let seed = state.engine.play_room_seed(episode_id, query.version, query.team_count).await?;
    let (room_code, _room) = state.rooms.lock().await.create_play_room(seed);
    Ok(Json(json!({ "room_code": room_code })))
}

pub async fn start_edit_room(
    State(state): State<AppState>,
    Path(episode_id): Path<i64>,
    axum::extract::Query(query): axum::extract::Query<StartRoomQuery>,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>, AppError> {
    let session = current_session(&state, &headers).await;
    require_user(&session, "open the episode editor")?;
    let seed = state.engine.edit_room_seed(episode_id, query.version).await?;
    let (room_code, _room) = state.rooms.lock().await.create_edit_room(seed);
    Ok(Json(json!({ "room_code": room_code })))
}

pub async fn start_view_room(
    State(state): State<AppState>,
    Path(episode_id): Path<i64>,
    axum::extract::Query(query): axum::extract::Query<StartRoomQuery>,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>, AppError> {
    let session = current_session(&state, &headers).await;
    require_mod(&session, "preview an episode")?;
    let seed = state.engine.view_room_seed(episode_id, query.version).await?;
    let (room_code, _room) = state.rooms.lock().await.create_view_room(seed);
    Ok(Json(json!({ "room_code": room_code })))
}

/// Blob upload: content-addressed by SHA-256, idempotent on duplicate
/// content (spec.md §5). Persists bytes at `{blob_dir}/{blob_id}`.
pub async fn upload_blob(State(state): State<AppState>, headers: HeaderMap, body: Bytes) -> Result<Json<serde_json::Value>, AppError> {
    let mime = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("application/octet-stream")
        .to_string();

    let blob_id = hex::encode(Sha256::digest(&body));

    let exists: Option<(String,)> = sqlx::query_as("SELECT blob_id FROM blobs WHERE blob_id = ?")
        .bind(&blob_id)
        .fetch_optional(state.engine.pool())
        .await?;

    if exists.is_none() {
        let path = std::path::Path::new(&state.config.blob_dir).join(&blob_id);
        tokio::fs::create_dir_all(&state.config.blob_dir).await.map_err(|e| AppError::Internal(e.to_string()))?;
        tokio::fs::write(&path, &body).await.map_err(|e| AppError::Internal(e.to_string()))?;
        sqlx::query("INSERT INTO blobs (blob_id, mime, width, height) VALUES (?, ?, NULL, NULL)")
            .bind(&blob_id)
            .bind(&mime)
            .execute(state.engine.pool())
            .await?;
    }

    Ok(Json(json!({ "blob_id": blob_id })))
}

/// Blob download: immutable content, long-lived cache (spec.md §6).
pub async fn get_blob(State(state): State<AppState>, Path(blob_id): Path<String>) -> Result<Response, AppError> {
    let row: Option<(String,)> = sqlx::query_as("SELECT mime FROM blobs WHERE blob_id = ?")
        .bind(&blob_id)
        .fetch_optional(state.engine.pool())
        .await?;
    let Some((mime,)) = row else {
        return Err(AppError::NotFound(format!("blob {blob_id} not found")));
    };

    let path = std::path::Path::new(&state.config.blob_dir).join(&blob_id);
    let bytes = tokio::fs::read(&path).await.map_err(|_| AppError::NotFound(format!("blob {blob_id} not found on disk")))?;

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, mime),
            (header::CACHE_CONTROL, "public, max-age=31536000, immutable".to_string()),
            (header::ETAG, format!("\"{blob_id}\"")),
        ],
        bytes,
    )
        .into_response())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blob_id_is_sha256_hex_of_content() {
        let body = b"hello world";
        let expected = hex::encode(Sha256::digest(body));
        assert_eq!(expected.len(), 64);
    }
}
