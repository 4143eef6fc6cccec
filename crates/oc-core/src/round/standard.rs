//! The Connections and Completions rounds (spec.md §4.B). Both rounds share
//! one state machine; only the scoring ladder length and the team
//! alternation rule differ, selected by `is_completions` at construction.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::episode::{Question, SixQuestions, SLOTS_PER_CONNECTION};
use crate::team::Team;

use super::{Action, InRoundState, RoundHandler, SELECT_TOKENS};

/// Points awarded per revealed clue at the moment of a correct answer,
/// indexed by `revealed_clues` (1 clue seen -> 5 points, ... 4 clues -> 1
/// point). Lifted verbatim from the source's scoring ladder.
const SCORE_LADDER: [i32; 5] = [0, 5, 3, 2, 1];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StandardRoundState {
    pub state: InRoundState,
    pub active_team: u8,
    data: SixQuestions,
    available: [Option<Action>; 6],
    current_question: Question,
    revealed_clues: u8,
    max_revealed: u8,
    is_completions: bool,
    team_count: usize,
}

impl StandardRoundState {
    pub fn new(data: SixQuestions, team_count: usize, is_completions: bool) -> Self {
        // Two-team mode primes active_team at 1 so the first `next_question`
        // flip lands on team 0 for the opening question.
        let active_team = if is_completions || team_count == 1 { 0 } else { 1 };
        let max_revealed = if is_completions {
            SLOTS_PER_CONNECTION as u8 - 1
        } else {
            SLOTS_PER_CONNECTION as u8
        };

        StandardRoundState {
            state: InRoundState::PreRound,
            active_team,
            current_question: data[0].clone(),
            data,
            available: SELECT_TOKENS.map(Some),
            revealed_clues: 0,
            max_revealed,
            is_completions,
            team_count,
        }
    }

    fn elements_json(&self, revealed: usize, mark_hidden: bool) -> Value {
        let elements: Vec<Value> = self.current_question.elements[..revealed]
            .iter()
            .map(|c| json!(c))
            .collect();
        let mut out = elements;
        if mark_hidden {
            out.push(json!("?"));
        }
        json!(out)
    }

    fn index_of(&self, token: Action) -> Option<usize> {
        self.available.iter().position(|slot| *slot == Some(token))
    }

    fn may_score(&self, team_idx: usize) -> bool {
        if self.team_count == 1 {
            return team_idx == 0;
        }
        if self.is_completions {
            return team_idx < self.team_count;
        }
        team_idx == self.active_team as usize
    }
}

impl RoundHandler for StandardRoundState {
    fn public_state(&self, teams: &[Team]) -> Value {
        let mut out = json!({
            "state": self.state,
            "active_team": teams.get(self.active_team as usize),
        });

        match self.state {
            InRoundState::PreRound | InRoundState::PostRound => {}
            InRoundState::QuestionSelection => {
                out["available"] = json!(self.available);
            }
            InRoundState::AnswerRevealed => {
                out["current"] = json!(self.current_question);
            }
            InRoundState::QuestionActive | InRoundState::LockedIn | InRoundState::Stealing => {
                let total = self.current_question.elements.len();
                let steal_partial =
                    self.state == InRoundState::Stealing && (self.max_revealed as usize) < total;
                if steal_partial {
                    out["revealed"] = json!(total);
                    out["elements"] = self.elements_json(self.revealed_clues as usize, true);
                } else {
                    out["revealed"] = json!(self.revealed_clues);
                    out["elements"] = self.elements_json(self.revealed_clues as usize, false);
                }
            }
        }
        out
    }

    fn admin_state(&self, teams: &[Team]) -> Value {
        let mut out = self.public_state(teams);
        if out.get("current").is_some() {
            out["connection"] = json!(self.current_question.connection);
            out["details"] = json!(self.current_question.details);
        }
        if let Some(elements) = out.get_mut("elements") {
            let total = self.current_question.elements.len();
            if (self.max_revealed as usize) < total {
                let mut full: Vec<Value> = self.current_question.elements
                    [..self.max_revealed as usize]
                    .iter()
                    .map(|c| json!(c))
                    .collect();
                full.push(json!(self.current_question.elements[self.max_revealed as usize]));
                *elements = json!(full);
            }
        }
        out
    }

    fn possible_actions(&self, _teams: &[Team]) -> BTreeSet<Action> {
        let mut actions = BTreeSet::new();
        match self.state {
            InRoundState::PreRound | InRoundState::AnswerRevealed => {
                actions.insert(Action::NextQuestion);
            }
            InRoundState::QuestionSelection => {
                actions.extend(self.available.iter().flatten().copied());
            }
            InRoundState::QuestionActive => {
                if self.revealed_clues < self.max_revealed {
                    actions.insert(Action::NextClue);
                }
                actions.insert(Action::LockIn);
            }
            InRoundState::LockedIn => {
                if self.team_count == 1 {
                    actions.insert(Action::ScoreTeam1);
                } else if self.is_completions {
                    actions.insert(Action::ScoreTeam1);
                    actions.insert(Action::ScoreTeam2);
                } else {
                    actions.insert(if self.active_team == 0 {
                        Action::ScoreTeam1
                    } else {
                        Action::ScoreTeam2
                    });
                    actions.insert(Action::RevealForSteal);
                }
                actions.insert(Action::ScoreIncorrect);
            }
            InRoundState::Stealing => {
                actions.insert(Action::ScoreSteal);
                actions.insert(Action::ScoreIncorrect);
            }
            InRoundState::PostRound => {}
        }
        actions
    }

    fn do_action(&mut self, action: Action, teams: &mut [Team]) -> bool {
        match action {
            Action::NextQuestion => self.next_question(),
            Action::NextClue => self.next_clue(),
            Action::LockIn => self.lock_in(),
            Action::RevealForSteal => self.reveal_for_steal(),
            Action::ScoreTeam1 => self.score(0, teams),
            Action::ScoreTeam2 => self.score(1, teams),
            Action::ScoreSteal => self.score_steal(teams),
            Action::ScoreIncorrect => self.score_incorrect(),
            token if SELECT_TOKENS.contains(&token) => self.select(token),
            _ => false,
        }
    }
}

impl StandardRoundState {
    fn next_question(&mut self) -> bool {
        if !matches!(self.state, InRoundState::PreRound | InRoundState::AnswerRevealed) {
            return false;
        }
        if self.available.iter().all(Option::is_none) {
            self.state = InRoundState::PostRound;
            return true;
        }
        if !self.is_completions && self.team_count != 1 {
            self.active_team = 1 - self.active_team;
        }
        self.state = InRoundState::QuestionSelection;
        true
    }

    fn select(&mut self, token: Action) -> bool {
        if self.state != InRoundState::QuestionSelection {
            return false;
        }
        let Some(idx) = self.index_of(token) else {
            return false;
        };
        self.available[idx] = None;
        self.current_question = self.data[idx].clone();
        self.revealed_clues = 1;
        self.state = InRoundState::QuestionActive;
        true
    }

    fn next_clue(&mut self) -> bool {
        if self.state != InRoundState::QuestionActive || self.revealed_clues >= self.max_revealed
        {
            return false;
        }
        self.revealed_clues += 1;
        if self.revealed_clues == self.max_revealed {
            self.state = InRoundState::LockedIn;
        }
        true
    }

    fn lock_in(&mut self) -> bool {
        if self.state != InRoundState::QuestionActive {
            return false;
        }
        self.state = InRoundState::LockedIn;
        true
    }

    fn reveal_for_steal(&mut self) -> bool {
        if self.state != InRoundState::LockedIn || self.team_count == 1 || self.is_completions {
            return false;
        }
        self.revealed_clues = self.max_revealed;
        self.state = InRoundState::Stealing;
        true
    }

    fn score(&mut self, team_idx: usize, teams: &mut [Team]) -> bool {
        if self.state != InRoundState::LockedIn || !self.may_score(team_idx) {
            return false;
        }
        if let Some(team) = teams.get_mut(team_idx) {
            team.score += SCORE_LADDER[self.revealed_clues as usize];
        }
        self.state = InRoundState::AnswerRevealed;
        self.revealed_clues = SLOTS_PER_CONNECTION as u8;
        true
    }

    fn score_steal(&mut self, teams: &mut [Team]) -> bool {
        if self.state != InRoundState::Stealing {
            return false;
        }
        let other = 1 - self.active_team as usize;
        if let Some(team) = teams.get_mut(other) {
            team.score += 1;
        }
        self.state = InRoundState::AnswerRevealed;
        self.revealed_clues = SLOTS_PER_CONNECTION as u8;
        true
    }

    fn score_incorrect(&mut self) -> bool {
        if !matches!(self.state, InRoundState::LockedIn | InRoundState::Stealing) {
            return false;
        }
        self.state = InRoundState::AnswerRevealed;
        self.revealed_clues = SLOTS_PER_CONNECTION as u8;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::episode::six_questions_default;

    fn teams() -> Vec<Team> {
        vec![Team::new(0, "Alpha"), Team::new(1, "Beta")]
    }

    #[test]
    fn connections_first_pick_goes_to_team_zero() {
        let mut round = StandardRoundState::new(six_questions_default(), 2, false);
        let mut teams = teams();
        assert!(round.do_action(Action::NextQuestion, &mut teams));
        assert_eq!(round.active_team, 0);
    }

    #[test]
    fn full_reveal_then_score_awards_one_point() {
        let mut round = StandardRoundState::new(six_questions_default(), 2, false);
        let mut teams = teams();
        round.do_action(Action::NextQuestion, &mut teams);
        round.do_action(Action::SelectTwoReeds, &mut teams);
        for _ in 0..3 {
            round.do_action(Action::NextClue, &mut teams);
        }
        assert_eq!(round.state, InRoundState::LockedIn);
        assert!(round.do_action(Action::ScoreTeam1, &mut teams));
        assert_eq!(teams[0].score, 1);
    }

    #[test]
    fn completions_does_not_alternate_pickers() {
        let mut round = StandardRoundState::new(six_questions_default(), 2, true);
        let mut teams = teams();
        round.do_action(Action::NextQuestion, &mut teams);
        assert_eq!(round.active_team, 0);
        round.do_action(Action::SelectTwoReeds, &mut teams);
        round.do_action(Action::ScoreTeam2, &mut teams);
        round.do_action(Action::NextQuestion, &mut teams);
        assert_eq!(round.active_team, 0);
    }

    #[test]
    fn impossible_action_is_a_silent_no_op() {
        let mut round = StandardRoundState::new(six_questions_default(), 2, false);
        let mut teams = teams();
        assert!(!round.do_action(Action::LockIn, &mut teams));
        assert_eq!(round.state, InRoundState::PreRound);
    }

    #[test]
    fn single_team_mode_disables_steal() {
        let mut round = StandardRoundState::new(six_questions_default(), 1, false);
        let mut teams = vec![Team::new(0, "Solo")];
        round.do_action(Action::NextQuestion, &mut teams);
        round.do_action(Action::SelectTwoReeds, &mut teams);
        for _ in 0..3 {
            round.do_action(Action::NextClue, &mut teams);
        }
        assert!(!round.do_action(Action::RevealForSteal, &mut teams));
        assert!(!round.possible_actions(&teams).contains(&Action::RevealForSteal));
    }
}
