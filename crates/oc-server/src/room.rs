//! Room runtime (spec.md §4.C): endpoints, sockets, fan-out, and command
//! dispatch for both play rooms and edit rooms.
//!
//! Grounded on the teacher's room/session model (`breakpoint-core::room.rs`,
//! `breakpoint-server::room_manager.rs`) for the named-endpoint/socket-set
//! shape, generalised from one shared game state to the closed
//! play/edit split this spec needs. Per §4.C the state mutation must be
//! single-threaded per room; rather than the teacher's cooperative-scheduling
//! event loop we serialise with one `tokio::sync::Mutex<Room>` per room,
//! which §5 names as an equally valid strategy.

use std::collections::HashMap;
use std::net::IpAddr;
use std::time::{Duration, Instant};

use serde_json::Value;
use tokio::sync::mpsc;
use tracing::warn;
use uuid::Uuid;

use oc_core::episode::{Clue, OnlyConnectEpisode};
use oc_core::net::{EditingPosition, EndpointDescriptor, ServerFrame};
use oc_core::room::RoomOptions;
use oc_core::round::{Action, OnlyConnectRound, RoundHandler, RoundTracker, ToggleOutcome};
use oc_core::team::Team;

use crate::auth::Session;
use crate::engine::{EditRoomSeed, EpisodeMeta, PlayRoomSeed, ViewRoomSeed};
use crate::error::AppError;

pub type SocketId = Uuid;

/// A live connection within an endpoint's socket set (spec.md §4.C "Socket").
pub struct Socket {
    pub id: SocketId,
    pub session: Session,
    pub remote_addr: IpAddr,
    pub tx: mpsc::UnboundedSender<ServerFrame>,
}

impl Socket {
    fn send(&self, frame: ServerFrame) {
        // A closed receiver means the socket's writer task already exited;
        // removal happens in `Room::fanout`/`remove_socket`, not here.
        let _ = self.tx.send(frame);
    }
}

/// One named view onto a room (spec.md glossary "Endpoint").
pub struct Endpoint {
    pub name: String,
    pub code: String,
    pub sockets: Vec<Socket>,
}

impl Endpoint {
    fn new(name: &str, code: String) -> Self {
        Endpoint {
            name: name.to_string(),
            code,
            sockets: Vec::new(),
        }
    }

    fn broadcast(&mut self, frame: ServerFrame) {
        self.sockets.retain(|socket| {
            let ok = socket.tx.send(frame.clone()).is_ok();
            if !ok {
                warn!(endpoint = %self.name, socket = %socket.id, "dropping dead socket during fan-out");
            }
            ok
        });
    }
}

/// `gm` is the host/game-manager endpoint; `overlay` a read-only display;
/// `audience` the crowd vote channel; `team N` one per competing team.
pub const ENDPOINT_GM: &str = "gm";
pub const ENDPOINT_OVERLAY: &str = "overlay";
pub const ENDPOINT_AUDIENCE: &str = "audience";

pub fn team_endpoint_name(team_id: u8) -> String {
    format!("team{team_id}")
}

pub struct PlayRuntime {
    pub episode_id: i64,
    pub version: i64,
    pub content: OnlyConnectEpisode,
    pub teams: Vec<Team>,
    pub tracker: RoundTracker,
    pub round: Option<OnlyConnectRound>,
    pub current_team: u8,
    pub audience_enabled: bool,
    selection_pause: Duration,
}

impl PlayRuntime {
    fn from_seed(seed: PlayRoomSeed, selection_pause: Duration) -> Self {
        PlayRuntime {
            episode_id: seed.episode_id,
            version: seed.version,
            content: seed.content,
            teams: (1..=seed.team_count as u8).map(|id| Team::new(id, format!("Team {id}"))).collect(),
            tracker: RoundTracker::PreGame,
            round: None,
            current_team: 1,
            audience_enabled: seed.audience,
            selection_pause,
        }
    }

    fn public_view(&self) -> Value {
        serde_json::json!({
            "tracker": format!("{:?}", self.tracker),
            "teams": self.teams,
            "round": self.round.as_ref().map(|r| r.public_state(&self.teams)),
            "actions": self.round.as_ref().map(|r| r.possible_actions(&self.teams)).unwrap_or_default(),
        })
    }

    fn admin_view(&self) -> Value {
        serde_json::json!({
            "tracker": format!("{:?}", self.tracker),
            "teams": self.teams,
            "round": self.round.as_ref().map(|r| r.admin_state(&self.teams)),
            "actions": self.round.as_ref().map(|r| r.possible_actions(&self.teams)).unwrap_or_default(),
            "current_team": self.current_team,
        })
    }

    fn start_next_round(&mut self) {
        let next = self.tracker.next_offerable(&self.content, self.teams.len());
        self.tracker = next;
        if next == RoundTracker::PostGame {
            self.round = None;
            return;
        }
        self.current_team = if self.teams.len() > 1 && self.teams[1].score > self.teams[0].score {
            2
        } else {
            1
        };
        self.round = OnlyConnectRound::for_round(next, &self.content, self.teams.len());
    }

    /// Dispatches a closed-set `Action` (spec.md §4.B) against the current
    /// round handler. Illegal actions are state errors: silently ignored
    /// per spec.md §7, no fan-out follows.
    fn apply_action(&mut self, action: Action) -> bool {
        if action == Action::StartNextRound {
            self.start_next_round();
            return true;
        }
        let Some(round) = self.round.as_mut() else { return false };
        if !round.possible_actions(&self.teams).contains(&action) {
            return false;
        }
        round.do_action(action, &mut self.teams)
    }
}

pub struct EditRuntime {
    pub episode_id: i64,
    pub version: i64,
    pub meta: EpisodeMeta,
    /// Current editable tree; disabling a section sets its field to `None`.
    pub current: OnlyConnectEpisode,
    /// Shadow copy preserving the most recent valid contents of disabled
    /// sections so re-enabling restores them without data loss (spec.md §4.E).
    pub shadow: OnlyConnectEpisode,
    pub cursors: HashMap<SocketId, EditingPosition>,
    pub save_deadline: Option<Instant>,
    debounce: Duration,
}

impl EditRuntime {
    fn from_seed(seed: EditRoomSeed, debounce: Duration) -> Self {
        EditRuntime {
            episode_id: seed.episode_id,
            version: seed.version,
            meta: seed.meta,
            shadow: seed.content.clone(),
            current: seed.content,
            cursors: HashMap::new(),
            save_deadline: None,
            debounce,
        }
    }

    fn mark_dirty(&mut self) {
        self.save_deadline = Some(Instant::now() + self.debounce);
    }

    fn set_meta(&mut self, title: Option<String>, description: Option<String>) {
        if let Some(title) = title {
            self.meta.title = title;
        }
        if let Some(description) = description {
            self.meta.description = description;
        }
        self.mark_dirty();
    }

    fn enable_section(&mut self, section: &str) {
        match section {
            "connections" => self.current.connections_round = self.shadow.connections_round.clone(),
            "completions" => self.current.completions_round = self.shadow.completions_round.clone(),
            "walls" => self.current.connecting_walls = self.shadow.connecting_walls.clone(),
            "missing_vowels" => self.current.missing_vowels = self.shadow.missing_vowels.clone(),
            _ => return,
        }
        self.mark_dirty();
    }

    fn disable_section(&mut self, section: &str) {
        match section {
            "connections" => self.current.connections_round = None,
            "completions" => self.current.completions_round = None,
            "walls" => self.current.connecting_walls = None,
            "missing_vowels" => self.current.missing_vowels = None,
            _ => return,
        }
        self.mark_dirty();
    }

    /// `update(section, question, element, value)`: `section` identifies
    /// which tagged sub-tree, `question`/`element` index into it, `value`
    /// is the raw string the editor typed (spec.md §4.E).
    fn update(&mut self, section: &str, question: usize, element: usize, value: &str) {
        let clue = Clue::from_edit_value(value);
        // Mirror the edit into `shadow` as well as `current`, touching only
        // this section so other disabled sections' shadowed contents survive
        // (spec.md §4.E "re-enabling restores them without data loss").
        let updated = match section {
            "connections" => {
                let ok = update_six(&mut self.current.connections_round, question, element, clue.clone());
                ok && update_six(&mut self.shadow.connections_round, question, element, clue)
            }
            "completions" => {
                let ok = update_six(&mut self.current.completions_round, question, element, clue.clone());
                ok && update_six(&mut self.shadow.completions_round, question, element, clue)
            }
            "wall0" => {
                let ok = update_wall(&mut self.current.connecting_walls, 0, question, element, clue.clone());
                ok && update_wall(&mut self.shadow.connecting_walls, 0, question, element, clue)
            }
            "wall1" => {
                let ok = update_wall(&mut self.current.connecting_walls, 1, question, element, clue.clone());
                ok && update_wall(&mut self.shadow.connecting_walls, 1, question, element, clue)
            }
            "missing_vowels" => {
                let ok = update_vowels(&mut self.current.missing_vowels, question, element, value);
                ok && update_vowels(&mut self.shadow.missing_vowels, question, element, value)
            }
            _ => false,
        };
        if updated {
            self.mark_dirty();
        }
    }

    fn announce_editing(&mut self, socket_id: SocketId, session: &Session, element: String) {
        self.cursors.insert(
            socket_id,
            EditingPosition {
                session: session.cookie.clone(),
                username: session.user.as_ref().map(|u| u.user_name.clone()).unwrap_or_else(|| "anonymous".to_string()),
                position: Some(element),
            },
        );
    }

    fn editing_positions(&self) -> Vec<EditingPosition> {
        self.cursors.values().cloned().collect()
    }
}

fn update_six(target: &mut Option<[oc_core::episode::Question; 6]>, question: usize, element: usize, clue: Clue) -> bool {
    let Some(qs) = target.as_mut() else { return false };
    let Some(q) = qs.get_mut(question) else { return false };
    let Some(slot) = q.elements.get_mut(element) else { return false };
    *slot = clue;
    true
}

fn update_wall(
    target: &mut Option<(oc_core::episode::Wall, oc_core::episode::Wall)>,
    wall_index: usize,
    question: usize,
    element: usize,
    clue: Clue,
) -> bool {
    let Some(walls) = target.as_mut() else { return false };
    let wall = if wall_index == 0 { &mut walls.0 } else { &mut walls.1 };
    let Some(q) = wall.get_mut(question) else { return false };
    let Some(slot) = q.elements.get_mut(element) else { return false };
    *slot = clue;
    true
}

fn update_vowels(target: &mut Option<Vec<oc_core::episode::MissingVowelsGroup>>, group: usize, pair: usize, value: &str) -> bool {
    let Some(groups) = target.as_mut() else { return false };
    let Some(g) = groups.get_mut(group) else { return false };
    let Some(p) = g.pairs.get_mut(pair) else { return false };
    p.answer = value.to_string();
    p.prompt = oc_core::episode::generate_prompt(value);
    true
}

pub enum RoomKind {
    Play(PlayRuntime),
    Edit(EditRuntime),
    View(ViewRoomSeedRuntime),
}

/// A read-only moderator preview: holds the content but accepts no mutating
/// commands (spec.md §6 `/review`).
pub struct ViewRoomSeedRuntime {
    pub episode_id: i64,
    pub version: i64,
    pub title: String,
    pub content: OnlyConnectEpisode,
}

/// A live play or edit session keyed by short code (spec.md glossary "Room").
pub struct Room {
    pub endpoints: HashMap<String, Endpoint>,
    pub default_endpoint: String,
    pub starting_endpoint: String,
    pub kind: RoomKind,
    deadline: Instant,
    idle_timeout: Duration,
    stopped: bool,
}

impl Room {
    pub fn new_play(
        seed: PlayRoomSeed,
        room_code: String,
        mut endpoint_codes: impl FnMut() -> String,
        idle_timeout: Duration,
        selection_pause: Duration,
    ) -> Self {
        let mut endpoints = HashMap::new();
        endpoints.insert(ENDPOINT_GM.to_string(), Endpoint::new(ENDPOINT_GM, room_code.clone()));
        endpoints.insert(ENDPOINT_OVERLAY.to_string(), Endpoint::new(ENDPOINT_OVERLAY, endpoint_codes()));
        if seed.audience {
            endpoints.insert(ENDPOINT_AUDIENCE.to_string(), Endpoint::new(ENDPOINT_AUDIENCE, endpoint_codes()));
        }
        for team_id in 1..=seed.team_count as u8 {
            let name = team_endpoint_name(team_id);
            endpoints.insert(name.clone(), Endpoint::new(&name, endpoint_codes()));
        }
        Room {
            endpoints,
            default_endpoint: ENDPOINT_GM.to_string(),
            starting_endpoint: ENDPOINT_GM.to_string(),
            kind: RoomKind::Play(PlayRuntime::from_seed(seed, selection_pause)),
            deadline: Instant::now() + idle_timeout,
            idle_timeout,
            stopped: false,
        }
    }

    pub fn new_edit(seed: EditRoomSeed, room_code: String, idle_timeout: Duration, debounce: Duration) -> Self {
        let mut endpoints = HashMap::new();
        endpoints.insert("edit".to_string(), Endpoint::new("edit", room_code));
        Room {
            endpoints,
            default_endpoint: "edit".to_string(),
            starting_endpoint: "edit".to_string(),
            kind: RoomKind::Edit(EditRuntime::from_seed(seed, debounce)),
            deadline: Instant::now() + idle_timeout,
            idle_timeout,
            stopped: false,
        }
    }

    pub fn new_view(seed: ViewRoomSeed, room_code: String, idle_timeout: Duration) -> Self {
        let mut endpoints = HashMap::new();
        endpoints.insert("review".to_string(), Endpoint::new("review", room_code));
        Room {
            endpoints,
            default_endpoint: "review".to_string(),
            starting_endpoint: "review".to_string(),
            kind: RoomKind::View(ViewRoomSeedRuntime {
                episode_id: seed.episode_id,
                version: seed.version,
                title: seed.title,
                content: seed.content,
            }),
            deadline: Instant::now() + idle_timeout,
            idle_timeout,
            stopped: false,
        }
    }

    pub fn ping(&mut self) {
        self.deadline = Instant::now() + self.idle_timeout;
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped
    }

    /// Returns true iff the idle deadline has passed; in that case also
    /// calls `stop()` (spec.md §4.C).
    pub fn reap(&mut self) -> bool {
        if Instant::now() > self.deadline {
            self.stop();
            true
        } else {
            false
        }
    }

    /// Idempotent: sets the stopped flag, closes every socket on every
    /// endpoint (spec.md §4.C). Flushing a dirty edit session's pending
    /// save is the caller's responsibility (it needs the engine handle,
    /// which the room itself does not own) — see `RoomRegistry::stop_room`.
    pub fn stop(&mut self) {
        if self.stopped {
            return;
        }
        self.stopped = true;
        for endpoint in self.endpoints.values_mut() {
            endpoint.broadcast(ServerFrame::Close);
            endpoint.sockets.clear();
        }
    }

    pub fn endpoint_descriptors(&self) -> Vec<EndpointDescriptor> {
        self.endpoints
            .values()
            .map(|e| EndpointDescriptor {
                name: e.name.clone(),
                room_code: e.code.clone(),
            })
            .collect()
    }

    pub fn add_socket(&mut self, endpoint_name: &str, socket: Socket) {
        if let Some(endpoint) = self.endpoints.get_mut(endpoint_name) {
            endpoint.sockets.push(socket);
        }
    }

    pub fn remove_socket(&mut self, endpoint_name: &str, socket_id: SocketId) {
        if let Some(endpoint) = self.endpoints.get_mut(endpoint_name) {
            endpoint.sockets.retain(|s| s.id != socket_id);
        }
        if let RoomKind::Edit(edit) = &mut self.kind {
            edit.cursors.remove(&socket_id);
        }
    }

    /// Dispatch a single decoded client frame. Returns `Err` for unknown
    /// commands or bad argument shapes (spec.md §7 "client-protocol
    /// errors"); `Ok(true)` if state changed and a fan-out is owed.
    ///
    /// Async because selecting a standard-round question inserts the
    /// deliberate pause between "question selected" and "question
    /// displayed" (spec.md §5) — held across the room's lock like every
    /// other suspension point named there, since state mutation for a room
    /// is serialised regardless.
    pub async fn handle_command(
        &mut self,
        endpoint_name: &str,
        socket_id: SocketId,
        session: &Session,
        cmd: &str,
        args: &Value,
    ) -> Result<bool, AppError> {
        match &mut self.kind {
            RoomKind::Play(play) => handle_play_command(play, endpoint_name, cmd, args).await,
            RoomKind::Edit(edit) => handle_edit_command(edit, socket_id, session, cmd, args),
            RoomKind::View(_) => Err(AppError::BadRequest(format!("unknown command {cmd} in a read-only room"))),
        }
    }

    /// Serialises each endpoint's view and writes it to every socket on
    /// that endpoint (spec.md §4.C "Fanout"). Endpoint views differ by
    /// name: the `gm` endpoint gets the admin view, everyone else the
    /// public view.
    pub fn fanout(&mut self) {
        match &self.kind {
            RoomKind::Play(play) => {
                let public = ServerFrame::StateChange(play.public_view());
                let admin = ServerFrame::StateChange(play.admin_view());
                for (name, endpoint) in self.endpoints.iter_mut() {
                    let frame = if name == ENDPOINT_GM { admin.clone() } else { public.clone() };
                    endpoint.broadcast(frame);
                }
            },
            RoomKind::Edit(edit) => {
                let update = ServerFrame::Update(edit.current.to_json());
                let editing = ServerFrame::Editing {
                    positions: edit.editing_positions(),
                };
                if let Some(endpoint) = self.endpoints.get_mut("edit") {
                    endpoint.broadcast(update);
                    endpoint.broadcast(editing);
                }
            },
            RoomKind::View(view) => {
                let update = ServerFrame::Update(view.content.to_json());
                if let Some(endpoint) = self.endpoints.get_mut("review") {
                    endpoint.broadcast(update);
                }
            },
        }
    }

    /// True while an edit room has unsaved changes past their debounce
    /// deadline (spec.md §4.E "background saver").
    pub fn due_for_save(&self) -> bool {
        match &self.kind {
            RoomKind::Edit(edit) => edit.save_deadline.is_some_and(|d| Instant::now() >= d),
            _ => false,
        }
    }

    pub fn clear_save_deadline(&mut self) {
        if let RoomKind::Edit(edit) = &mut self.kind {
            edit.save_deadline = None;
        }
    }
}

async fn handle_play_command(play: &mut PlayRuntime, endpoint_name: &str, cmd: &str, args: &Value) -> Result<bool, AppError> {
    if let Ok(action) = serde_json::from_value::<Action>(Value::String(cmd.to_string())) {
        if endpoint_name != ENDPOINT_GM {
            return Err(AppError::Unauthorized(format!("{cmd} is a host-only command")));
        }
        let is_select = oc_core::round::SELECT_TOKENS.contains(&action);
        let changed = play.apply_action(action);
        if changed && is_select {
            // Question selected, not yet displayed — spec.md §5.
            tokio::time::sleep(play.selection_pause).await;
        }
        return Ok(changed);
    }

    match cmd {
        "init" => Ok(false),
        "toggle" => {
            // Connecting-walls clue selection is parameterised by clue
            // text, outside the closed `Action` set (spec.md §9); the host
            // endpoint drives it like every other in-game command.
            if endpoint_name != ENDPOINT_GM {
                return Err(AppError::Unauthorized("toggle is a host-only command".to_string()));
            }
            let Some(word) = args.get("word").and_then(Value::as_str) else {
                return Err(AppError::BadRequest("toggle requires a word".to_string()));
            };
            match play.round.as_mut().and_then(|r| r.toggle_wall_clue(word)) {
                Some(outcome) => Ok(!matches!(outcome, ToggleOutcome::NotSolving)),
                None => Ok(false),
            }
        },
        "cast_vote" => {
            let Some(choice) = args.get("choice").and_then(Value::as_str) else {
                return Err(AppError::BadRequest("cast_vote requires a choice".to_string()));
            };
            if let Some(team) = play.teams.iter_mut().find(|t| team_endpoint_name(t.id) == endpoint_name) {
                team.vote = Some(choice.to_string());
                return Ok(true);
            }
            Ok(false)
        },
        _ => Err(AppError::BadRequest(format!("unknown command {cmd}"))),
    }
}

fn handle_edit_command(
    edit: &mut EditRuntime,
    socket_id: SocketId,
    session: &Session,
    cmd: &str,
    args: &Value,
) -> Result<bool, AppError> {
    match cmd {
        "init" => Ok(false),
        "set_meta" => {
            let title = args.get("title").and_then(Value::as_str).map(str::to_string);
            let description = args.get("description").and_then(Value::as_str).map(str::to_string);
            edit.set_meta(title, description);
            Ok(true)
        },
        "enable_section" => {
            let Some(name) = args.get("name").and_then(Value::as_str) else {
                return Err(AppError::BadRequest("enable_section requires a name".to_string()));
            };
            edit.enable_section(name);
            Ok(true)
        },
        "disable_section" => {
            let Some(name) = args.get("name").and_then(Value::as_str) else {
                return Err(AppError::BadRequest("disable_section requires a name".to_string()));
            };
            edit.disable_section(name);
            Ok(true)
        },
        "update" => {
            let (Some(section), Some(question), Some(element), Some(value)) = (
                args.get("section").and_then(Value::as_str),
                args.get("question").and_then(Value::as_u64),
                args.get("element").and_then(Value::as_u64),
                args.get("value").and_then(Value::as_str),
            ) else {
                return Err(AppError::BadRequest("update requires section, question, element, value".to_string()));
            };
            edit.update(section, question as usize, element as usize, value);
            Ok(true)
        },
        "announce_editing" => {
            let element = args.get("element").and_then(Value::as_str).unwrap_or("").to_string();
            edit.announce_editing(socket_id, session, element);
            Ok(true)
        },
        "submit" => Ok(false), // lifecycle transition is performed by the caller via GameEngine, not here
        _ => Err(AppError::BadRequest(format!("unknown command {cmd}"))),
    }
}

/// Room construction options echoed back in `setup` (spec.md §6).
pub fn room_options_for(play: &PlayRuntime) -> RoomOptions {
    RoomOptions {
        scoring: true,
        audience: play.audience_enabled,
        teams: play.teams.len(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use oc_core::episode::{six_questions_default, Question};

    fn sample_play() -> PlayRuntime {
        let mut content = OnlyConnectEpisode::default();
        let mut qs = six_questions_default();
        for (i, q) in qs.iter_mut().enumerate() {
            *q = Question {
                connection: format!("c{i}"),
                details: String::new(),
                elements: std::array::from_fn(|j| Clue::Text { value: format!("e{i}{j}") }),
            };
        }
        content.connections_round = Some(qs);
        PlayRuntime::from_seed(
            PlayRoomSeed {
                episode_id: 1,
                version: 1,
                title: "t".to_string(),
                content,
                team_count: 2,
                scoring: true,
                audience: false,
            },
            Duration::from_millis(500),
        )
    }

    #[test]
    fn start_next_round_enters_connections() {
        let mut play = sample_play();
        play.apply_action(Action::StartNextRound);
        assert_eq!(play.tracker, RoundTracker::Connections);
        assert!(play.round.is_some());
    }

    #[tokio::test]
    async fn host_only_command_from_other_endpoint_is_rejected() {
        let mut play = sample_play();
        let result = handle_play_command(&mut play, "team1", "START_NEXT_ROUND", &Value::Null).await;
        assert!(result.is_err());
    }

    #[test]
    fn unknown_command_is_bad_request_not_panic() {
        let mut edit = EditRuntime::from_seed(
            EditRoomSeed {
                episode_id: 1,
                version: 1,
                meta: EpisodeMeta {
                    episode_id: 1,
                    game_engine: "only-connect".to_string(),
                    user_id: 1,
                    title: String::new(),
                    description: String::new(),
                },
                content: OnlyConnectEpisode::default(),
            },
            Duration::from_secs(3),
        );
        let session = Session::anonymous();
        let result = handle_edit_command(&mut edit, Uuid::new_v4(), &session, "not_a_command", &Value::Null);
        assert!(result.is_err());
    }

    #[test]
    fn disable_then_enable_section_restores_from_shadow() {
        let mut content = OnlyConnectEpisode::default();
        let qs = six_questions_default();
        content.connections_round = Some(qs.clone());
        let mut edit = EditRuntime::from_seed(
            EditRoomSeed {
                episode_id: 1,
                version: 1,
                meta: EpisodeMeta {
                    episode_id: 1,
                    game_engine: "only-connect".to_string(),
                    user_id: 1,
                    title: String::new(),
                    description: String::new(),
                },
                content,
            },
            Duration::from_secs(3),
        );

        edit.disable_section("connections");
        assert!(edit.current.connections_round.is_none());
        assert!(edit.shadow.connections_round.is_some());

        edit.enable_section("connections");
        assert_eq!(edit.current.connections_round, Some(qs));
    }

    #[test]
    fn editing_one_section_does_not_clobber_another_disabled_section() {
        let mut content = OnlyConnectEpisode::default();
        let connections = six_questions_default();
        let completions = six_questions_default();
        content.connections_round = Some(connections.clone());
        content.completions_round = Some(completions);
        let mut edit = EditRuntime::from_seed(
            EditRoomSeed {
                episode_id: 1,
                version: 1,
                meta: EpisodeMeta {
                    episode_id: 1,
                    game_engine: "only-connect".to_string(),
                    user_id: 1,
                    title: String::new(),
                    description: String::new(),
                },
                content,
            },
            Duration::from_secs(3),
        );

        edit.disable_section("connections");
        assert!(edit.shadow.connections_round.is_some());

        edit.update("completions", 0, 0, "edited");

        edit.enable_section("connections");
        assert_eq!(edit.current.connections_round, Some(connections));
    }
}
