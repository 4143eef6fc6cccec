//! Only Connect round state machines (spec.md §4.B).
//!
//! The four round types share a uniform `RoundHandler` contract
//! (`public_state`/`admin_state`/`possible_actions`/`do_action`). Per
//! spec.md §9 this is implemented as a tagged enum (`OnlyConnectRound`) with
//! a top-level `match` dispatch rather than a deep class hierarchy — each
//! variant owns its round-local data, and the room swaps the active variant
//! on round transitions.

pub mod standard;
pub mod vowels;
pub mod wall;

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::episode::OnlyConnectEpisode;
use crate::team::Team;

pub use standard::StandardRoundState;
pub use vowels::{MissingVowelsState, VowelsPhase};
pub use wall::{ActiveWall, ConnectingWallState, ToggleOutcome, WallPhase};

/// Top-level round progression (spec.md §4.B).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RoundTracker {
    PreGame,
    Connections,
    Completions,
    ConnectingWalls,
    MissingVowels,
    PostGame,
}

impl RoundTracker {
    const ORDER: [RoundTracker; 6] = [
        RoundTracker::PreGame,
        RoundTracker::Connections,
        RoundTracker::Completions,
        RoundTracker::ConnectingWalls,
        RoundTracker::MissingVowels,
        RoundTracker::PostGame,
    ];

    /// Walk forward and install the first round whose content is valid;
    /// unreachable rounds are skipped. Post-game is terminal.
    pub fn next_offerable(self, episode: &OnlyConnectEpisode, teams: usize) -> RoundTracker {
        if self == RoundTracker::PostGame {
            return RoundTracker::PostGame;
        }

        let start = Self::ORDER.iter().position(|r| *r == self).unwrap_or(0) + 1;
        for candidate in &Self::ORDER[start..] {
            let offerable = match candidate {
                RoundTracker::Connections => episode.connections_offerable(),
                RoundTracker::Completions => episode.completions_offerable(),
                RoundTracker::ConnectingWalls => episode.walls_offerable(teams),
                RoundTracker::MissingVowels => episode.missing_vowels_offerable(),
                RoundTracker::PostGame => true,
                RoundTracker::PreGame => false,
            };
            if offerable {
                return *candidate;
            }
        }
        RoundTracker::PostGame
    }
}

/// Sub-state shared by the standard round and connecting-walls handlers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum InRoundState {
    PreRound,
    #[serde(rename = "select")]
    QuestionSelection,
    #[serde(rename = "question")]
    QuestionActive,
    LockedIn,
    Stealing,
    #[serde(rename = "answer")]
    AnswerRevealed,
    PostRound,
}

/// The closed set of actions a client may request (spec.md §4.B).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Action {
    NextQuestion,
    SelectTwoReeds,
    SelectLion,
    SelectTwistedFlax,
    SelectHornedViper,
    SelectWater,
    SelectEyeOfHorus,
    NextClue,
    LockIn,
    RevealForSteal,
    ScoreTeam1,
    ScoreTeam2,
    ScoreSteal,
    ScoreIncorrect,
    StartNextRound,
}

/// The six question-selection/wall-picker hieroglyph tokens, in slot order.
pub const SELECT_TOKENS: [Action; 6] = [
    Action::SelectTwoReeds,
    Action::SelectLion,
    Action::SelectTwistedFlax,
    Action::SelectHornedViper,
    Action::SelectWater,
    Action::SelectEyeOfHorus,
];

/// Uniform contract implemented by every round sub-state-machine
/// (spec.md §4.B).
pub trait RoundHandler {
    /// Snapshot for non-privileged endpoints.
    fn public_state(&self, teams: &[Team]) -> Value;

    /// Snapshot with host-only fields. Defaults to `public_state`.
    fn admin_state(&self, teams: &[Team]) -> Value {
        self.public_state(teams)
    }

    /// Actions permissible in the current sub-state.
    fn possible_actions(&self, teams: &[Team]) -> BTreeSet<Action>;

    /// Attempt the action; return whether state changed. An action outside
    /// `possible_actions()` is rejected (no-op, returns `false`) — this is
    /// by design (spec.md §7): late or impossible actions are silently
    /// swallowed rather than raising an error.
    fn do_action(&mut self, action: Action, teams: &mut [Team]) -> bool;
}

/// The active round's state handler. `None` in pre-game/post-game, where
/// there is no sub-state to mutate.
#[derive(Debug, Clone)]
pub enum OnlyConnectRound {
    Standard(StandardRoundState),
    Wall(ConnectingWallState),
    Vowels(MissingVowelsState),
}

impl RoundHandler for OnlyConnectRound {
    fn public_state(&self, teams: &[Team]) -> Value {
        match self {
            OnlyConnectRound::Standard(s) => s.public_state(teams),
            OnlyConnectRound::Wall(s) => s.public_state(teams),
            OnlyConnectRound::Vowels(s) => s.public_state(teams),
        }
    }

    fn admin_state(&self, teams: &[Team]) -> Value {
        match self {
            OnlyConnectRound::Standard(s) => s.admin_state(teams),
            OnlyConnectRound::Wall(s) => s.admin_state(teams),
            OnlyConnectRound::Vowels(s) => s.admin_state(teams),
        }
    }

    fn possible_actions(&self, teams: &[Team]) -> BTreeSet<Action> {
        match self {
            OnlyConnectRound::Standard(s) => s.possible_actions(teams),
            OnlyConnectRound::Wall(s) => s.possible_actions(teams),
            OnlyConnectRound::Vowels(s) => s.possible_actions(teams),
        }
    }

    fn do_action(&mut self, action: Action, teams: &mut [Team]) -> bool {
        match self {
            OnlyConnectRound::Standard(s) => s.do_action(action, teams),
            OnlyConnectRound::Wall(s) => s.do_action(action, teams),
            OnlyConnectRound::Vowels(s) => s.do_action(action, teams),
        }
    }
}

impl OnlyConnectRound {
    /// Build the handler for `tracker`, pulling its content out of
    /// `episode`. `None` if the round has no sub-state (pre/post game) or
    /// the episode has no content for it.
    pub fn for_round(
        tracker: RoundTracker,
        episode: &OnlyConnectEpisode,
        team_count: usize,
    ) -> Option<Self> {
        match tracker {
            RoundTracker::Connections => episode.connections_round.clone().map(|qs| {
                OnlyConnectRound::Standard(StandardRoundState::new(qs, team_count, false))
            }),
            RoundTracker::Completions => episode.completions_round.clone().map(|qs| {
                OnlyConnectRound::Standard(StandardRoundState::new(qs, team_count, true))
            }),
            RoundTracker::ConnectingWalls => episode.connecting_walls.clone().map(|(a, b)| {
                OnlyConnectRound::Wall(ConnectingWallState::new(a, b, team_count))
            }),
            RoundTracker::MissingVowels => episode.missing_vowels.as_ref().map(|groups| {
                let filtered = groups.iter().filter_map(|g| g.filtered_if_valid()).collect();
                OnlyConnectRound::Vowels(MissingVowelsState::new(filtered, team_count))
            }),
            RoundTracker::PreGame | RoundTracker::PostGame => None,
        }
    }

    /// Clue selection in the walls round is parameterised by clue text and
    /// so sits outside `do_action`'s closed `Action` set; `None` when the
    /// active round isn't a wall.
    pub fn toggle_wall_clue(&mut self, word: &str) -> Option<ToggleOutcome> {
        match self {
            OnlyConnectRound::Wall(w) => Some(w.toggle(word)),
            _ => None,
        }
    }
}

/// `in_round_state` reported for a round with no sub-state (pre/post game).
pub fn terminal_state(state: InRoundState) -> Value {
    serde_json::json!({ "state": state })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::episode::{generate_prompt, MissingVowelsGroup, VowelPair};

    #[test]
    fn for_round_drops_a_group_with_no_valid_pairs() {
        let episode = OnlyConnectEpisode {
            connections_round: None,
            completions_round: None,
            connecting_walls: None,
            missing_vowels: Some(vec![
                MissingVowelsGroup {
                    connection: "capitals".to_string(),
                    pairs: vec![VowelPair {
                        answer: "LONDON".to_string(),
                        prompt: generate_prompt("LONDON"),
                    }],
                },
                MissingVowelsGroup {
                    connection: "all invalid".to_string(),
                    pairs: vec![VowelPair {
                        answer: "PARIS".to_string(),
                        prompt: "unrelated".to_string(),
                    }],
                },
            ]),
        };

        let mut round = OnlyConnectRound::for_round(RoundTracker::MissingVowels, &episode, 2)
            .expect("episode has missing-vowels content");
        let mut teams = vec![Team::new(0, "A"), Team::new(1, "B")];
        assert!(round.do_action(Action::NextQuestion, &mut teams));
        let admin = round.admin_state(&teams);
        assert_eq!(admin["connection"], "capitals");

        // Advancing past the only surviving group's single pair lands in
        // POST_ROUND directly — the invalid second group was never entered.
        assert!(round.do_action(Action::ScoreTeam1, &mut teams));
        assert!(round.do_action(Action::NextQuestion, &mut teams));
        let admin = round.admin_state(&teams);
        assert_eq!(admin["phase"], "post-round");
    }
}
