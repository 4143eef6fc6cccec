//! The connecting-walls round (spec.md §4.B). Each team works an
//! independent 4x4 wall of 16 shuffled clues, grouping them into the four
//! underlying connections.
//!
//! Clue selection ("toggle this word") is parameterised by clue text, which
//! does not fit the fixed `Action` token set used by every other round —
//! so it is exposed as a dedicated inherent method (`toggle`) rather than
//! routed through `RoundHandler::do_action`. The websocket layer special-
//! cases the `toggle` client command to call it directly while this round
//! is active.

use std::collections::{BTreeSet, HashSet};

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::episode::{wall_clues, Wall};
use crate::team::Team;

use super::{Action, RoundHandler};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToggleOutcome {
    Selected,
    Deselected,
    GroupCorrect,
    GroupIncorrect,
    WallFailed,
    WallSolved,
    NotSolving,
}

/// One team's 4x4 grid in play (spec.md §4.B "Connecting Walls round").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActiveWall {
    wall: Wall,
    ungrouped: Vec<String>,
    /// Group indices the team correctly identified while solving.
    found: Vec<usize>,
    /// Group indices moved here on lock-in (auto-reveal or full solve),
    /// not yet walked through the steal-confirmation cycle.
    not_found: Vec<usize>,
    selected: Vec<String>,
    /// `None` until exactly two groups (8 clues) remain ungrouped, then
    /// `Some(3)`, decrementing on each subsequent miss (spec.md §4.B).
    strikes: Option<u8>,
    /// Pointer into `not_found` currently being confirmed for a steal
    /// attempt, and whether its connection has been revealed to the host.
    confirming_group: Option<usize>,
    is_group_revealed: bool,
    locked: bool,
    /// Whether the automatic `|grouped|/4` score has already been applied
    /// for this wall (spec.md §4.B); guards against double-crediting when
    /// both the no-steal-target and the steal-cycle-entry paths can reach
    /// the crediting call.
    credited: bool,
}

impl ActiveWall {
    pub fn new(wall: Wall) -> Self {
        let mut ungrouped = wall_clues(&wall);
        crate::episode::shuffle_clues(&mut ungrouped);
        ActiveWall {
            wall,
            ungrouped,
            found: Vec::new(),
            not_found: Vec::new(),
            selected: Vec::new(),
            strikes: None,
            confirming_group: None,
            is_group_revealed: false,
            locked: false,
            credited: false,
        }
    }

    /// Apply the automatic `|grouped|/4` score once, the first time it is
    /// asked for after lock-in. Returns the points just awarded (0 if
    /// already credited).
    fn credit_points_once(&mut self) -> i32 {
        if self.credited {
            return 0;
        }
        self.credited = true;
        self.found.len() as i32
    }

    fn group_texts(&self, idx: usize) -> HashSet<&str> {
        self.wall[idx].elements.iter().map(clue_text).collect()
    }

    fn matching_group(&self) -> Option<usize> {
        let selected: HashSet<&str> = self.selected.iter().map(String::as_str).collect();
        (0..self.wall.len()).find(|idx| !self.found.contains(idx) && self.group_texts(*idx) == selected)
    }

    fn activate_strikes_if_due(&mut self) {
        if self.strikes.is_none() && self.ungrouped.len() == 8 {
            self.strikes = Some(3);
        }
    }

    fn lock_in(&mut self) {
        self.locked = true;
        self.not_found = (0..self.wall.len()).filter(|idx| !self.found.contains(idx)).collect();
        self.strikes = None;
    }

    /// Toggle one clue; `NotSolving` if the wall is already locked or the
    /// word doesn't appear among the still-ungrouped clues.
    pub fn toggle(&mut self, word: &str) -> ToggleOutcome {
        if self.locked {
            return ToggleOutcome::NotSolving;
        }
        if let Some(pos) = self.selected.iter().position(|c| c == word) {
            self.selected.remove(pos);
            return ToggleOutcome::Deselected;
        }
        if !self.ungrouped.contains(&word.to_string()) || self.selected.len() >= 4 {
            return ToggleOutcome::NotSolving;
        }
        self.selected.push(word.to_string());
        if self.selected.len() < 4 {
            return ToggleOutcome::Selected;
        }

        if let Some(idx) = self.matching_group() {
            let texts: HashSet<String> = self.group_texts(idx).into_iter().map(str::to_string).collect();
            self.ungrouped.retain(|c| !texts.contains(c));
            self.found.push(idx);
            self.selected.clear();
            self.activate_strikes_if_due();
            if self.ungrouped.is_empty() {
                self.lock_in();
                return ToggleOutcome::WallSolved;
            }
            ToggleOutcome::GroupCorrect
        } else {
            self.selected.clear();
            self.activate_strikes_if_due();
            if let Some(strikes) = self.strikes.as_mut() {
                *strikes -= 1;
                if *strikes == 0 {
                    self.lock_in();
                    return ToggleOutcome::WallFailed;
                }
            }
            ToggleOutcome::GroupIncorrect
        }
    }

    /// Begin or continue the steal-confirmation cycle over the groups the
    /// team never found (spec.md §4.B "REVEAL_FOR_STEAL cycles through
    /// groups one-by-one"). `false` once there is nothing left to confirm.
    fn reveal_next_for_steal(&mut self) -> bool {
        let next = match self.confirming_group {
            None => 0,
            Some(i) => i + 1,
        };
        if next >= self.not_found.len() {
            return false;
        }
        self.confirming_group = Some(next);
        self.is_group_revealed = true;
        true
    }

    fn confirming_group_index(&self) -> Option<usize> {
        self.confirming_group.and_then(|i| self.not_found.get(i)).copied()
    }

    fn steal_cycle_exhausted(&self) -> bool {
        self.not_found.is_empty()
            || self.confirming_group.is_some_and(|i| i + 1 >= self.not_found.len())
    }

    fn public_json(&self) -> Value {
        json!({
            "ungrouped": self.ungrouped,
            "found_groups": self.found.iter().map(|&idx| json!({
                "connection": self.wall[idx].connection,
                "elements": self.wall[idx].elements.iter().map(clue_text).collect::<Vec<_>>(),
            })).collect::<Vec<_>>(),
            "selected": self.selected,
            "strikes": self.strikes,
            "locked": self.locked,
            "confirming": self.confirming_group_index().filter(|_| self.is_group_revealed).map(|idx| json!({
                "connection": self.wall[idx].connection,
                "elements": self.wall[idx].elements.iter().map(clue_text).collect::<Vec<_>>(),
            })),
            "remaining_to_confirm": self.not_found.len().saturating_sub(self.confirming_group.map_or(0, |i| i + 1)),
        })
    }
}

fn clue_text(clue: &crate::episode::Clue) -> &str {
    match clue {
        crate::episode::Clue::Text { value } => value,
        crate::episode::Clue::Media { blob_id } => blob_id,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WallPhase {
    PreRound,
    #[serde(rename = "select")]
    QuestionSelection,
    #[serde(rename = "question")]
    QuestionActive,
    LockedIn,
    PostRound,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectingWallState {
    pub phase: WallPhase,
    walls: [ActiveWall; 2],
    /// Team index -> wall index, `None` once `available_walls[i]` is
    /// consumed by a pick (spec.md §4.B).
    assignment: [Option<usize>; 2],
    /// Whether team `i` has already locked in its wall (spec.md §4.B: the
    /// round only ends once both teams have played, regardless of which
    /// team picked first).
    played: [bool; 2],
    team_count: usize,
    current_team: u8,
}

impl ConnectingWallState {
    pub fn new(wall0: Wall, wall1: Wall, team_count: usize) -> Self {
        let walls = [ActiveWall::new(wall0), ActiveWall::new(wall1)];
        let assignment = if team_count == 1 { [Some(0), None] } else { [None, None] };
        ConnectingWallState {
            phase: WallPhase::PreRound,
            walls,
            assignment,
            played: [false, false],
            team_count,
            current_team: 0,
        }
    }

    /// Two-team picker order: the team with the higher score picks first
    /// (spec.md §4.B).
    fn picking_team(&self, teams: &[Team]) -> u8 {
        if teams.len() > 1 && teams[1].score > teams[0].score { 1 } else { 0 }
    }

    fn current_wall(&self) -> Option<&ActiveWall> {
        self.assignment[self.current_team as usize].map(|idx| &self.walls[idx])
    }

    fn current_wall_mut(&mut self) -> Option<&mut ActiveWall> {
        self.assignment[self.current_team as usize].map(|idx| &mut self.walls[idx])
    }

    fn has_steal_target(&self) -> bool {
        self.team_count > 1 && self.current_wall().is_some_and(|w| !w.not_found.is_empty())
    }

    /// See module doc: clue selection is parameterised and lives outside
    /// the closed `Action` set.
    pub fn toggle(&mut self, word: &str) -> ToggleOutcome {
        if self.phase != WallPhase::QuestionActive {
            return ToggleOutcome::NotSolving;
        }
        let Some(wall) = self.current_wall_mut() else {
            return ToggleOutcome::NotSolving;
        };
        let outcome = wall.toggle(word);
        if matches!(outcome, ToggleOutcome::WallFailed | ToggleOutcome::WallSolved) {
            self.phase = WallPhase::LockedIn;
        }
        outcome
    }

    fn advance_after_lock_in(&mut self) -> bool {
        if self.team_count == 1 {
            self.phase = WallPhase::PostRound;
            return true;
        }
        let current = self.current_team as usize;
        self.played[current] = true;
        let other = 1 - current;
        if !self.played[other] {
            self.current_team = other as u8;
            self.phase = WallPhase::QuestionActive;
        } else {
            self.phase = WallPhase::PostRound;
        }
        true
    }
}

impl RoundHandler for ConnectingWallState {
    fn public_state(&self, teams: &[Team]) -> Value {
        let mut out = json!({
            "phase": self.phase,
            "current_team": teams.get(self.current_team as usize),
        });
        if let Some(wall) = self.current_wall() {
            out["wall"] = wall.public_json();
        }
        out
    }

    fn possible_actions(&self, _teams: &[Team]) -> BTreeSet<Action> {
        let mut actions = BTreeSet::new();
        match self.phase {
            WallPhase::PreRound => {
                actions.insert(Action::NextQuestion);
            }
            WallPhase::QuestionSelection => {
                actions.insert(Action::SelectLion);
                actions.insert(Action::SelectWater);
            }
            WallPhase::QuestionActive => {}
            WallPhase::LockedIn => {
                let confirming = self.current_wall().is_some_and(|w| w.is_group_revealed);
                if confirming {
                    let idx = self.current_team as usize;
                    actions.insert(if idx == 0 { Action::ScoreTeam2 } else { Action::ScoreTeam1 });
                    actions.insert(Action::ScoreIncorrect);
                } else if self.has_steal_target() {
                    actions.insert(Action::RevealForSteal);
                } else {
                    actions.insert(Action::NextQuestion);
                }
            }
            WallPhase::PostRound => {}
        }
        actions
    }

    fn do_action(&mut self, action: Action, teams: &mut [Team]) -> bool {
        match action {
            Action::NextQuestion if self.phase == WallPhase::PreRound => {
                if self.team_count == 1 {
                    self.phase = WallPhase::QuestionActive;
                } else {
                    self.current_team = self.picking_team(teams);
                    self.phase = WallPhase::QuestionSelection;
                }
                true
            }
            Action::SelectLion if self.phase == WallPhase::QuestionSelection => {
                self.assign_walls(0);
                true
            }
            Action::SelectWater if self.phase == WallPhase::QuestionSelection => {
                self.assign_walls(1);
                true
            }
            Action::RevealForSteal if self.phase == WallPhase::LockedIn => self.reveal_for_steal(teams),
            Action::ScoreTeam1 | Action::ScoreTeam2 if self.phase == WallPhase::LockedIn => {
                self.confirm_steal(action == Action::ScoreTeam1, teams)
            }
            Action::ScoreIncorrect if self.phase == WallPhase::LockedIn => self.confirm_no_steal(),
            Action::NextQuestion if self.phase == WallPhase::LockedIn => {
                if self.has_steal_target() {
                    false
                } else {
                    self.ensure_credited(teams);
                    self.advance_after_lock_in()
                }
            }
            _ => false,
        }
    }
}

impl ConnectingWallState {
    fn assign_walls(&mut self, picked_wall_for_picker: usize) {
        let picker = self.current_team as usize;
        let other = 1 - picker;
        self.assignment[picker] = Some(picked_wall_for_picker);
        self.assignment[other] = Some(1 - picked_wall_for_picker);
        self.phase = WallPhase::QuestionActive;
    }

    /// Automatic points for groups the team identified while solving
    /// (spec.md §4.B "the solving team earns |grouped|/4 points"); applied
    /// once, whichever path out of LOCKED_IN reaches it first.
    fn ensure_credited(&mut self, teams: &mut [Team]) {
        let current_team = self.current_team as usize;
        let Some(wall) = self.current_wall_mut() else { return };
        let points = wall.credit_points_once();
        if points != 0 {
            if let Some(team) = teams.get_mut(current_team) {
                team.score += points;
            }
        }
    }

    fn reveal_for_steal(&mut self, teams: &mut [Team]) -> bool {
        if !self.has_steal_target() {
            return false;
        }
        self.ensure_credited(teams);
        let Some(wall) = self.current_wall_mut() else { return false };
        wall.reveal_next_for_steal()
    }

    fn confirm_steal(&mut self, team1: bool, teams: &mut [Team]) -> bool {
        let Some(wall) = self.current_wall_mut() else { return false };
        if !wall.is_group_revealed {
            return false;
        }
        let team_idx = if team1 { 0 } else { 1 };
        if team_idx == self.current_team as usize {
            return false; // the non-solving team is the only one who can steal
        }
        if let Some(team) = teams.get_mut(team_idx) {
            team.score += 1;
        }
        self.resolve_confirmed_group()
    }

    fn confirm_no_steal(&mut self) -> bool {
        let confirmed = {
            let Some(wall) = self.current_wall_mut() else { return false };
            if !wall.is_group_revealed {
                return false;
            }
            wall.is_group_revealed = false;
            true
        };
        if !confirmed {
            return false;
        }
        self.maybe_advance_after_cycle();
        true
    }

    fn resolve_confirmed_group(&mut self) -> bool {
        if let Some(wall) = self.current_wall_mut() {
            wall.is_group_revealed = false;
        }
        self.maybe_advance_after_cycle();
        true
    }

    fn maybe_advance_after_cycle(&mut self) {
        let exhausted = self.current_wall().is_some_and(ActiveWall::steal_cycle_exhausted);
        if exhausted {
            self.advance_after_lock_in();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::episode::{wall_default, Clue, Question};

    fn distinct_wall(prefix: &str) -> Wall {
        std::array::from_fn(|g| Question {
            connection: format!("{prefix}-connection-{g}"),
            details: String::new(),
            elements: std::array::from_fn(|e| Clue::Text { value: format!("{prefix}-{g}-{e}") }),
        })
    }

    #[test]
    fn single_team_wall_goes_straight_to_solving() {
        let mut state = ConnectingWallState::new(wall_default(), wall_default(), 1);
        let mut teams = vec![Team::new(0, "Solo")];
        assert!(state.do_action(Action::NextQuestion, &mut teams));
        assert_eq!(state.phase, WallPhase::QuestionActive);
    }

    #[test]
    fn toggle_outside_solving_phase_is_a_no_op() {
        let mut state = ConnectingWallState::new(wall_default(), wall_default(), 2);
        assert_eq!(state.toggle("anything"), ToggleOutcome::NotSolving);
    }

    /// Scenario 3 from spec.md §8, literally: two correct groups bring
    /// `ungrouped` to 8 and `strikes` to 3; three more wrong guesses burn
    /// all three strikes, auto-revealing the wall with both remaining
    /// groups in `not_found` and +2 to the solving team.
    #[test]
    fn three_strikes_after_two_groups_auto_reveals_the_wall() {
        let mut active = ActiveWall::new(distinct_wall("w"));
        for word in ["w-0-0", "w-0-1", "w-0-2", "w-0-3"] {
            assert_ne!(active.toggle(word), ToggleOutcome::NotSolving);
        }
        for word in ["w-1-0", "w-1-1", "w-1-2", "w-1-3"] {
            assert_ne!(active.toggle(word), ToggleOutcome::NotSolving);
        }
        assert_eq!(active.ungrouped.len(), 8);
        assert_eq!(active.strikes, Some(3));
        assert_eq!(active.found, vec![0, 1]);

        // Three wrong 4-picks (group 2's clues plus one foreign clue each
        // time) burn the three strikes down to failure.
        for wrong_partner in ["w-3-0", "w-3-1", "w-3-2"] {
            let outcomes: Vec<_> = ["w-2-0", "w-2-1", "w-2-2", wrong_partner]
                .into_iter()
                .map(|word| active.toggle(word))
                .collect();
            let last = *outcomes.last().unwrap();
            if last != ToggleOutcome::WallFailed {
                assert_eq!(last, ToggleOutcome::GroupIncorrect);
            }
        }

        assert_eq!(active.strikes, None);
        assert!(active.locked);
        assert_eq!(active.not_found.len(), 2);
        assert_eq!(active.not_found, vec![2, 3]);
    }

    #[test]
    fn fully_solved_wall_credits_one_point_per_group_found() {
        let wall = distinct_wall("w");
        let mut state = ConnectingWallState::new(wall.clone(), distinct_wall("x"), 1);
        let mut teams = vec![Team::new(0, "Solo")];
        state.do_action(Action::NextQuestion, &mut teams);
        for group in 0..4 {
            for elem in 0..4 {
                state.toggle(&format!("w-{group}-{elem}"));
            }
        }
        assert_eq!(state.phase, WallPhase::LockedIn);
        assert!(!state.has_steal_target());
        assert!(state.do_action(Action::NextQuestion, &mut teams));
        assert_eq!(teams[0].score, 4);
        assert_eq!(state.phase, WallPhase::PostRound);
    }

    fn solve_current_wall(state: &mut ConnectingWallState, prefix: &str) {
        for group in 0..4 {
            for elem in 0..4 {
                state.toggle(&format!("{prefix}-{group}-{elem}"));
            }
        }
    }

    /// Reproduces the scenario where team 2 leads going into the walls
    /// round: `picking_team` hands the first pick to team index 1, so
    /// `current_team` starts at 1 instead of 0. Both walls must still get
    /// played before the round ends.
    #[test]
    fn both_walls_are_played_when_team_two_picks_first() {
        let mut state = ConnectingWallState::new(distinct_wall("w"), distinct_wall("x"), 2);
        let mut teams = vec![Team::new(0, "One"), Team::new(1, "Two")];
        teams[1].score = 10;

        assert!(state.do_action(Action::NextQuestion, &mut teams));
        assert_eq!(state.phase, WallPhase::QuestionSelection);
        assert_eq!(state.current_team, 1);

        assert!(state.do_action(Action::SelectLion, &mut teams));
        assert_eq!(state.phase, WallPhase::QuestionActive);

        // Team 1 solves its wall (wall 0, picked via SelectLion) completely.
        solve_current_wall(&mut state, "w");
        assert_eq!(state.phase, WallPhase::LockedIn);
        assert!(state.do_action(Action::NextQuestion, &mut teams));

        // Team 0's wall must still be played, not skipped to PostRound.
        assert_eq!(state.phase, WallPhase::QuestionActive);
        assert_eq!(state.current_team, 0);

        solve_current_wall(&mut state, "x");
        assert_eq!(state.phase, WallPhase::LockedIn);
        assert!(state.do_action(Action::NextQuestion, &mut teams));
        assert_eq!(state.phase, WallPhase::PostRound);
    }
}
