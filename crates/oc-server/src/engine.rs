//! Engine facade (spec.md §4.F): episode load/list/create/save, lifecycle
//! transitions with the demotion invariants from §3, and the constructors
//! for play/edit/view room seeds that `room_manager` turns into live rooms.
//!
//! Grounded on the teacher's `ServerGameRegistry` (`game_loop.rs`) for the
//! "one facade owns construction + capability constants" shape, generalised
//! from an in-memory game factory to a database-backed content store since
//! Only Connect episodes are durable where the teacher's games are not.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;

use oc_core::episode::OnlyConnectEpisode;

use crate::error::AppError;

/// Episode lifecycle state (spec.md §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EpisodeState {
    Draft,
    PendingReview,
    Published,
    Superseded,
    Discarded,
}

impl EpisodeState {
    fn as_db_str(self) -> &'static str {
        match self {
            EpisodeState::Draft => "DRAFT",
            EpisodeState::PendingReview => "PENDING_REVIEW",
            EpisodeState::Published => "PUBLISHED",
            EpisodeState::Superseded => "SUPERSEDED",
            EpisodeState::Discarded => "DISCARDED",
        }
    }

    fn from_db_str(s: &str) -> Self {
        match s {
            "PENDING_REVIEW" => EpisodeState::PendingReview,
            "PUBLISHED" => EpisodeState::Published,
            "SUPERSEDED" => EpisodeState::Superseded,
            "DISCARDED" => EpisodeState::Discarded,
            _ => EpisodeState::Draft,
        }
    }

    /// Terminal states never trigger demotions (spec.md §4.F).
    fn is_terminal(self) -> bool {
        matches!(self, EpisodeState::Superseded | EpisodeState::Discarded)
    }
}

#[derive(Debug, Clone)]
pub struct EpisodeMeta {
    pub episode_id: i64,
    pub game_engine: String,
    pub user_id: i64,
    pub title: String,
    pub description: String,
}

#[derive(Debug, Clone)]
pub struct EpisodeVersionMeta {
    pub episode_id: i64,
    pub version: i64,
    pub state: EpisodeState,
    pub version_updated: String,
}

/// Scoring/audience capability levels an engine may require, make
/// optional, or refuse to support (spec.md §4.F).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SupportLevel {
    NotSupported,
    Optional,
    Required,
}

#[derive(Debug, Clone, Copy)]
pub struct EngineCapabilities {
    pub max_teams: usize,
    pub scoring_mode: SupportLevel,
    pub supports_audience: SupportLevel,
    pub cms_enabled: bool,
}

/// Seed handed to `room_manager::RoomRegistry::create_play_room`.
pub struct PlayRoomSeed {
    pub episode_id: i64,
    pub version: i64,
    pub title: String,
    pub content: OnlyConnectEpisode,
    pub team_count: usize,
    pub scoring: bool,
    pub audience: bool,
}

/// Seed handed to `room_manager::RoomRegistry::create_edit_room`.
pub struct EditRoomSeed {
    pub episode_id: i64,
    pub version: i64,
    pub meta: EpisodeMeta,
    pub content: OnlyConnectEpisode,
}

/// Read-only seed for a moderator preview room (`/review`).
pub struct ViewRoomSeed {
    pub episode_id: i64,
    pub version: i64,
    pub title: String,
    pub content: OnlyConnectEpisode,
}

/// Loads/persists episodes; owns the CMS/play capability policy for the
/// Only Connect engine tag (spec.md §4.F).
pub struct GameEngine {
    pool: SqlitePool,
}

const GAME_ENGINE_TAG: &str = "only-connect";

impl GameEngine {
    pub fn new(pool: SqlitePool) -> Self {
        GameEngine { pool }
    }

    /// Exposes the pool for call sites that need tables outside the episode
    /// lifecycle (blob dedup, notifications) — spec.md §5 "opened once,
    /// owned by the engine facade".
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub fn capabilities(&self) -> EngineCapabilities {
        EngineCapabilities {
            max_teams: oc_core::episode::MAX_TEAMS,
            scoring_mode: SupportLevel::Optional,
            supports_audience: SupportLevel::Optional,
            cms_enabled: true,
        }
    }

    pub async fn create_blank_episode(&self, user_id: i64, title: &str) -> Result<i64, AppError> {
        let episode_id: i64 = sqlx::query_scalar(
            "INSERT INTO episodes (game_engine, user_id, title, description) VALUES (?, ?, ?, '') RETURNING episode_id",
        )
        .bind(GAME_ENGINE_TAG)
        .bind(user_id)
        .bind(title)
        .fetch_one(&self.pool)
        .await?;

        let blank = OnlyConnectEpisode::default();
        sqlx::query(
            "INSERT INTO episode_versions (episode_id, version, state, data, version_updated) VALUES (?, 1, ?, ?, ?)",
        )
        .bind(episode_id)
        .bind(EpisodeState::Draft.as_db_str())
        .bind(blank.serialise())
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(episode_id)
    }

    /// `version == 0` means "current draft, creating one from the latest
    /// if absent" (spec.md §4.F).
    pub async fn load_episode(
        &self,
        episode_id: i64,
        version: i64,
    ) -> Result<(EpisodeMeta, EpisodeVersionMeta, OnlyConnectEpisode), AppError> {
        let meta = self.load_meta(episode_id).await?;
        let version = if version == 0 {
            self.get_or_create_draft_version(episode_id).await?
        } else {
            version
        };

        let row: Option<(String, String, String)> =
            sqlx::query_as("SELECT state, data, version_updated FROM episode_versions WHERE episode_id = ? AND version = ?")
                .bind(episode_id)
                .bind(version)
                .fetch_optional(&self.pool)
                .await?;

        let Some((state, data, version_updated)) = row else {
            return Err(AppError::NotFound(format!("episode {episode_id} version {version} not found")));
        };

        let content = OnlyConnectEpisode::from_str(&data);
        let version_meta = EpisodeVersionMeta {
            episode_id,
            version,
            state: EpisodeState::from_db_str(&state),
            version_updated,
        };
        Ok((meta, version_meta, content))
    }

    async fn load_meta(&self, episode_id: i64) -> Result<EpisodeMeta, AppError> {
        let row: Option<(String, i64, String, String)> =
            sqlx::query_as("SELECT game_engine, user_id, title, description FROM episodes WHERE episode_id = ?")
                .bind(episode_id)
                .fetch_optional(&self.pool)
                .await?;
        let Some((game_engine, user_id, title, description)) = row else {
            return Err(AppError::NotFound(format!("episode {episode_id} not found")));
        };
        Ok(EpisodeMeta {
            episode_id,
            game_engine,
            user_id,
            title,
            description,
        })
    }

    /// Create a new DRAFT by copying the contents of the latest existing
    /// version and incrementing — version numbering is strictly monotonic
    /// per episode (spec.md §4.F).
    async fn get_or_create_draft_version(&self, episode_id: i64) -> Result<i64, AppError> {
        let existing_draft: Option<(i64,)> = sqlx::query_as(
            "SELECT version FROM episode_versions WHERE episode_id = ? AND state = ? ORDER BY version DESC LIMIT 1",
        )
        .bind(episode_id)
        .bind(EpisodeState::Draft.as_db_str())
        .fetch_optional(&self.pool)
        .await?;

        if let Some((draft_version,)) = existing_draft {
            return Ok(draft_version);
        }

        let latest: Option<(i64, String)> =
            sqlx::query_as("SELECT version, data FROM episode_versions WHERE episode_id = ? ORDER BY version DESC LIMIT 1")
                .bind(episode_id)
                .fetch_optional(&self.pool)
                .await?;

        let Some((latest_version, data)) = latest else {
            return Err(AppError::NotFound(format!("episode {episode_id} has no versions")));
        };

        let next_version = latest_version + 1;
        sqlx::query(
            "INSERT INTO episode_versions (episode_id, version, state, data, version_updated) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(episode_id)
        .bind(next_version)
        .bind(EpisodeState::Draft.as_db_str())
        .bind(data)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(next_version)
    }

    /// Persist draft edits without touching lifecycle state (the edit
    /// session's own debounced saver calls this — spec.md §4.E).
    pub async fn save_draft(&self, episode_id: i64, version: i64, content: &OnlyConnectEpisode) -> Result<(), AppError> {
        sqlx::query("UPDATE episode_versions SET data = ?, version_updated = ? WHERE episode_id = ? AND version = ?")
            .bind(content.serialise())
            .bind(Utc::now().to_rfc3339())
            .bind(episode_id)
            .bind(version)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// `save_state(episode, new_state)`: updates the stored state, then
    /// applies the demotion invariant from spec.md §3/§4.F. Open Question
    /// #2 resolution: `new_state` and the demotion predicate are two
    /// distinct parameters rather than the source's single overloaded one.
    pub async fn save_state(&self, episode_id: i64, version: i64, new_state: EpisodeState) -> Result<(), AppError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("UPDATE episode_versions SET state = ?, version_updated = ? WHERE episode_id = ? AND version = ?")
            .bind(new_state.as_db_str())
            .bind(Utc::now().to_rfc3339())
            .bind(episode_id)
            .bind(version)
            .execute(&mut *tx)
            .await?;

        if !new_state.is_terminal() {
            let demote_predicate_state = if new_state == EpisodeState::Published {
                EpisodeState::Published
            } else {
                new_state
            };
            let demote_to = if new_state == EpisodeState::Published {
                EpisodeState::Superseded
            } else {
                EpisodeState::Discarded
            };

            sqlx::query(
                "UPDATE episode_versions SET state = ?, version_updated = ? \
                 WHERE episode_id = ? AND version != ? AND state = ?",
            )
            .bind(demote_to.as_db_str())
            .bind(Utc::now().to_rfc3339())
            .bind(episode_id)
            .bind(version)
            .bind(demote_predicate_state.as_db_str())
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    pub async fn list_by_state(&self, state: EpisodeState) -> Result<Vec<EpisodeVersionMeta>, AppError> {
        let rows: Vec<(i64, i64, String, String)> = sqlx::query_as(
            "SELECT episode_id, version, state, version_updated FROM episode_versions WHERE state = ? ORDER BY version_updated DESC",
        )
        .bind(state.as_db_str())
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(episode_id, version, state, version_updated)| EpisodeVersionMeta {
                episode_id,
                version,
                state: EpisodeState::from_db_str(&state),
                version_updated,
            })
            .collect())
    }

    /// Episodes owned by `user_id`, grouped by episode id (spec.md §4.F
    /// "list a user's episodes grouped").
    pub async fn list_user_episodes(
        &self,
        user_id: i64,
    ) -> Result<Vec<(EpisodeMeta, Vec<EpisodeVersionMeta>)>, AppError> {
        let episodes: Vec<(i64, String, i64, String, String)> =
            sqlx::query_as("SELECT episode_id, game_engine, user_id, title, description FROM episodes WHERE user_id = ?")
                .bind(user_id)
                .fetch_all(&self.pool)
                .await?;

        let mut out = Vec::with_capacity(episodes.len());
        for (episode_id, game_engine, user_id, title, description) in episodes {
            let versions: Vec<(i64, String, String)> = sqlx::query_as(
                "SELECT version, state, version_updated FROM episode_versions WHERE episode_id = ? ORDER BY version",
            )
            .bind(episode_id)
            .fetch_all(&self.pool)
            .await?;

            let meta = EpisodeMeta {
                episode_id,
                game_engine,
                user_id,
                title,
                description,
            };
            let version_metas = versions
                .into_iter()
                .map(|(version, state, version_updated)| EpisodeVersionMeta {
                    episode_id,
                    version,
                    state: EpisodeState::from_db_str(&state),
                    version_updated,
                })
                .collect();
            out.push((meta, version_metas));
        }
        Ok(out)
    }

    pub async fn play_room_seed(&self, episode_id: i64, version: i64, team_count: usize) -> Result<PlayRoomSeed, AppError> {
        let (meta, version_meta, content) = self.load_episode(episode_id, version).await?;
        Ok(PlayRoomSeed {
            episode_id,
            version: version_meta.version,
            title: meta.title,
            content,
            team_count: team_count.clamp(1, self.capabilities().max_teams),
            scoring: true,
            audience: false,
        })
    }

    pub async fn edit_room_seed(&self, episode_id: i64, version: i64) -> Result<EditRoomSeed, AppError> {
        let (meta, version_meta, content) = self.load_episode(episode_id, version).await?;
        Ok(EditRoomSeed {
            episode_id,
            version: version_meta.version,
            meta,
            content,
        })
    }

    pub async fn view_room_seed(&self, episode_id: i64, version: i64) -> Result<ViewRoomSeed, AppError> {
        let (meta, version_meta, content) = self.load_episode(episode_id, version).await?;
        Ok(ViewRoomSeed {
            episode_id,
            version: version_meta.version,
            title: meta.title,
            content,
        })
    }

    /// Transition an edit session's episode to PENDING_REVIEW (the `submit`
    /// CMS command — spec.md §4.E).
    pub async fn submit_for_review(&self, episode_id: i64, version: i64) -> Result<(), AppError> {
        self.save_state(episode_id, version, EpisodeState::PendingReview).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn test_engine() -> GameEngine {
        let pool = crate::persistence::open_pool("sqlite::memory:").await.unwrap();
        GameEngine::new(pool)
    }

    #[tokio::test]
    async fn create_and_load_blank_episode() {
        let engine = test_engine().await;
        sqlx::query("INSERT INTO users (user_name, twitch_id, is_mod) VALUES ('a', '1', 0)")
            .execute(&engine.pool)
            .await
            .unwrap();

        let episode_id = engine.create_blank_episode(1, "My Quiz").await.unwrap();
        let (meta, version, content) = engine.load_episode(episode_id, 1).await.unwrap();
        assert_eq!(meta.title, "My Quiz");
        assert_eq!(version.version, 1);
        assert_eq!(version.state, EpisodeState::Draft);
        assert!(content.connections_round.is_none());
    }

    #[tokio::test]
    async fn version_zero_creates_draft_from_latest() {
        let engine = test_engine().await;
        sqlx::query("INSERT INTO users (user_name, twitch_id, is_mod) VALUES ('a', '1', 0)")
            .execute(&engine.pool)
            .await
            .unwrap();
        let episode_id = engine.create_blank_episode(1, "Quiz").await.unwrap();
        engine.save_state(episode_id, 1, EpisodeState::Published).await.unwrap();

        let (_, version, _) = engine.load_episode(episode_id, 0).await.unwrap();
        assert_eq!(version.version, 2);
        assert_eq!(version.state, EpisodeState::Draft);
    }

    #[tokio::test]
    async fn publish_demotes_prior_published_to_superseded() {
        let engine = test_engine().await;
        sqlx::query("INSERT INTO users (user_name, twitch_id, is_mod) VALUES ('a', '1', 0)")
            .execute(&engine.pool)
            .await
            .unwrap();
        let episode_id = engine.create_blank_episode(1, "Quiz").await.unwrap();
        engine.save_state(episode_id, 1, EpisodeState::Published).await.unwrap();
        engine.get_or_create_draft_version(episode_id).await.unwrap();

        engine.save_state(episode_id, 2, EpisodeState::Published).await.unwrap();

        let versions = engine.list_user_episodes(1).await.unwrap();
        let (_, version_metas) = &versions[0];
        let v1 = version_metas.iter().find(|v| v.version == 1).unwrap();
        let v2 = version_metas.iter().find(|v| v.version == 2).unwrap();
        assert_eq!(v1.state, EpisodeState::Superseded);
        assert_eq!(v2.state, EpisodeState::Published);
    }

    #[tokio::test]
    async fn discard_after_publish_demotion_is_terminal_and_final() {
        // Scenario 6 from spec.md §8.
        let engine = test_engine().await;
        sqlx::query("INSERT INTO users (user_name, twitch_id, is_mod) VALUES ('a', '1', 0)")
            .execute(&engine.pool)
            .await
            .unwrap();
        let episode_id = engine.create_blank_episode(1, "Quiz").await.unwrap();
        engine.save_state(episode_id, 1, EpisodeState::Published).await.unwrap();
        engine.get_or_create_draft_version(episode_id).await.unwrap();
        engine.save_state(episode_id, 2, EpisodeState::Published).await.unwrap();
        engine.save_state(episode_id, 2, EpisodeState::Discarded).await.unwrap();

        let versions = engine.list_user_episodes(1).await.unwrap();
        let (_, version_metas) = &versions[0];
        let v1 = version_metas.iter().find(|v| v.version == 1).unwrap();
        let v2 = version_metas.iter().find(|v| v.version == 2).unwrap();
        assert_eq!(v1.state, EpisodeState::Superseded);
        assert_eq!(v2.state, EpisodeState::Discarded);
    }

    #[tokio::test]
    async fn approving_draft_discards_prior_drafts() {
        let engine = test_engine().await;
        sqlx::query("INSERT INTO users (user_name, twitch_id, is_mod) VALUES ('a', '1', 0)")
            .execute(&engine.pool)
            .await
            .unwrap();
        let episode_id = engine.create_blank_episode(1, "Quiz").await.unwrap();
        engine.get_or_create_draft_version(episode_id).await.unwrap();

        // Re-affirm version 2 as DRAFT; version 1 (also DRAFT) should be discarded.
        engine.save_state(episode_id, 2, EpisodeState::Draft).await.unwrap();

        let versions = engine.list_user_episodes(1).await.unwrap();
        let (_, version_metas) = &versions[0];
        let v1 = version_metas.iter().find(|v| v.version == 1).unwrap();
        assert_eq!(v1.state, EpisodeState::Discarded);
    }

    #[tokio::test]
    async fn list_by_state_filters() {
        let engine = test_engine().await;
        sqlx::query("INSERT INTO users (user_name, twitch_id, is_mod) VALUES ('a', '1', 0)")
            .execute(&engine.pool)
            .await
            .unwrap();
        let episode_id = engine.create_blank_episode(1, "Quiz").await.unwrap();
        let drafts = engine.list_by_state(EpisodeState::Draft).await.unwrap();
        assert_eq!(drafts.len(), 1);
        assert_eq!(drafts[0].episode_id, episode_id);
        let published = engine.list_by_state(EpisodeState::Published).await.unwrap();
        assert!(published.is_empty());
    }
}
