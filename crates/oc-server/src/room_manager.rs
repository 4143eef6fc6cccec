//! Room registry and reaper (spec.md §4.D).
//!
//! Grounded on the teacher's `room_manager.rs` (short-code generation with
//! collision retry, a code → live-object index, a periodic sweep task),
//! generalised from one flat game-room map to the two-level index this spec
//! needs: short-code → Endpoint (for socket-upgrade dispatch) and
//! short-code → Room (for the reaper).

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tracing::info;

use oc_core::room::generate_room_code;

use crate::config::RoomsConfig;
use crate::engine::{EditRoomSeed, GameEngine, PlayRoomSeed, ViewRoomSeed};
use crate::room::Room;

pub type SharedRoom = Arc<Mutex<Room>>;

/// Maps every short code — the room's own default-endpoint code, and each
/// of its other endpoints' codes — back to the room (spec.md §4.D).
pub struct RoomRegistry {
    rooms_by_code: HashMap<String, SharedRoom>,
    endpoint_owner: HashMap<String, String>,
    rooms_config: RoomsConfig,
}

impl RoomRegistry {
    pub fn new(rooms_config: RoomsConfig) -> Self {
        RoomRegistry {
            rooms_by_code: HashMap::new(),
            endpoint_owner: HashMap::new(),
            rooms_config,
        }
    }

    fn fresh_code(&self) -> String {
        loop {
            let code = generate_room_code();
            if !self.rooms_by_code.contains_key(&code) && !self.endpoint_owner.contains_key(&code) {
                return code;
            }
        }
    }

    pub fn create_play_room(&mut self, seed: PlayRoomSeed) -> (String, SharedRoom) {
        let room_code = self.fresh_code();
        // Non-default endpoints: overlay, optionally audience, one per team.
        let extra_endpoint_count = 1 + usize::from(seed.audience) + seed.team_count;
        let mut claimed: Vec<String> = vec![room_code.clone()];
        let mut pending = Vec::with_capacity(extra_endpoint_count);
        for _ in 0..extra_endpoint_count {
            let code = loop {
                let candidate = self.fresh_code();
                if !claimed.contains(&candidate) {
                    break candidate;
                }
            };
            claimed.push(code.clone());
            pending.push(code);
        }

        let mut pending = pending.into_iter();
        let idle_timeout = Duration::from_secs(self.rooms_config.idle_timeout_secs);
        let selection_pause = Duration::from_millis(self.rooms_config.selection_pause_ms);
        let room = Room::new_play(
            seed,
            room_code.clone(),
            move || pending.next().expect("endpoint code pool sized to endpoint count"),
            idle_timeout,
            selection_pause,
        );

        self.register(room_code, room)
    }

    pub fn create_edit_room(&mut self, seed: EditRoomSeed) -> (String, SharedRoom) {
        let room_code = self.fresh_code();
        let idle_timeout = Duration::from_secs(self.rooms_config.idle_timeout_secs);
        let debounce = Duration::from_secs(self.rooms_config.edit_debounce_secs);
        let room = Room::new_edit(seed, room_code.clone(), idle_timeout, debounce);
        self.register(room_code, room)
    }

    pub fn create_view_room(&mut self, seed: ViewRoomSeed) -> (String, SharedRoom) {
        let room_code = self.fresh_code();
        let idle_timeout = Duration::from_secs(self.rooms_config.idle_timeout_secs);
        let room = Room::new_view(seed, room_code.clone(), idle_timeout);
        self.register(room_code, room)
    }

    fn register(&mut self, room_code: String, room: Room) -> (String, SharedRoom) {
        for descriptor in room.endpoint_descriptors() {
            self.endpoint_owner.insert(descriptor.room_code, room_code.clone());
        }
        let shared = Arc::new(Mutex::new(room));
        self.rooms_by_code.insert(room_code.clone(), shared.clone());
        (room_code, shared)
    }

    /// Resolve a short code (room or endpoint) to its owning room, plus the
    /// endpoint name to join if the code belongs to one specific endpoint.
    pub fn resolve(&self, code: &str) -> Option<(SharedRoom, Option<String>)> {
        let code = code.to_ascii_uppercase();
        if let Some(room) = self.rooms_by_code.get(&code) {
            return Some((room.clone(), None));
        }
        let owner = self.endpoint_owner.get(&code)?;
        let room = self.rooms_by_code.get(owner)?;
        Some((room.clone(), Some(code)))
    }

    /// Removes a room and every endpoint code it owns (spec.md §8 "Room
    /// registry" invariant).
    fn remove(&mut self, room_code: &str, endpoint_codes: &[String]) {
        self.rooms_by_code.remove(room_code);
        for code in endpoint_codes {
            self.endpoint_owner.remove(code);
        }
        self.endpoint_owner.remove(room_code);
    }

    pub fn len(&self) -> usize {
        self.rooms_by_code.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rooms_by_code.is_empty()
    }

    pub fn all_rooms(&self) -> Vec<SharedRoom> {
        self.rooms_by_code.values().cloned().collect()
    }
}

/// Background sweep: every `reap_interval`, reap idle rooms and drop them
/// (spec.md §4.D). For an edit room, flush its pending save through the
/// engine before dropping it so no debounced edit is lost.
pub async fn run_reaper(registry: Arc<Mutex<RoomRegistry>>, engine: Arc<GameEngine>, reap_interval: Duration) {
    let mut interval = tokio::time::interval(reap_interval);
    loop {
        interval.tick().await;
        let snapshot: Vec<(String, SharedRoom)> = {
            let reg = registry.lock().await;
            reg.rooms_by_code.iter().map(|(k, v)| (k.clone(), v.clone())).collect()
        };

        for (room_code, room) in snapshot {
            let reaped = {
                let mut room = room.lock().await;
                room.reap()
            };
            if reaped {
                flush_if_edit_room(&room, &engine).await;
                let endpoint_codes: Vec<String> = {
                    let room = room.lock().await;
                    room.endpoint_descriptors().into_iter().map(|d| d.room_code).collect()
                };
                let mut reg = registry.lock().await;
                reg.remove(&room_code, &endpoint_codes);
                info!(room = %room_code, "reaped idle room");
            }
        }
    }
}

async fn flush_if_edit_room(room: &SharedRoom, engine: &GameEngine) {
    let (episode_id, version, content) = {
        let room = room.lock().await;
        match &room.kind {
            crate::room::RoomKind::Edit(edit) => (edit.episode_id, edit.version, edit.current.clone()),
            _ => return,
        }
    };
    if let Err(err) = engine.save_draft(episode_id, version, &content).await {
        tracing::error!(episode_id, version, error = %err, "failed to flush edit session on room stop");
    }
}

/// Background saver for every live edit room: every `poll_interval`, write
/// any room whose debounce deadline has passed (spec.md §4.E).
pub async fn run_edit_saver(registry: Arc<Mutex<RoomRegistry>>, engine: Arc<GameEngine>, poll_interval: Duration) {
    let mut interval = tokio::time::interval(poll_interval);
    loop {
        interval.tick().await;
        let snapshot: Vec<SharedRoom> = {
            let reg = registry.lock().await;
            reg.rooms_by_code.values().cloned().collect()
        };
        for room in snapshot {
            let due = {
                let room = room.lock().await;
                room.due_for_save()
            };
            if !due {
                continue;
            }
            flush_if_edit_room(&room, &engine).await;
            let mut room = room.lock().await;
            room.clear_save_deadline();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use oc_core::episode::OnlyConnectEpisode;

    fn play_seed() -> PlayRoomSeed {
        PlayRoomSeed {
            episode_id: 1,
            version: 1,
            title: "t".to_string(),
            content: OnlyConnectEpisode::default(),
            team_count: 2,
            scoring: true,
            audience: false,
        }
    }

    #[test]
    fn create_play_room_registers_room_and_endpoint_codes() {
        let mut registry = RoomRegistry::new(RoomsConfig::default());
        let (room_code, _room) = registry.create_play_room(play_seed());
        assert_eq!(room_code.len(), 4);
        assert!(registry.resolve(&room_code).is_some());
    }

    #[test]
    fn resolve_is_case_insensitive() {
        let mut registry = RoomRegistry::new(RoomsConfig::default());
        let (room_code, _room) = registry.create_play_room(play_seed());
        let lower = room_code.to_ascii_lowercase();
        assert!(registry.resolve(&lower).is_some());
    }

    #[test]
    fn two_rooms_never_share_a_code() {
        let mut registry = RoomRegistry::new(RoomsConfig::default());
        let (a, _) = registry.create_play_room(play_seed());
        let (b, _) = registry.create_play_room(play_seed());
        assert_ne!(a, b);
    }
}
