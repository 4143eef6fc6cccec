//! The missing vowels round (spec.md §4.B). A sequence of connection
//! groups, each holding several vowel-stripped prompts; teams buzz in by
//! requesting the next clue and the host scores per correct answer.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::episode::MissingVowelsGroup;
use crate::team::Team;

use super::{Action, RoundHandler};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum VowelsPhase {
    PreRound,
    #[serde(rename = "question")]
    QuestionActive,
    #[serde(rename = "answer")]
    AnswerRevealed,
    PostRound,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MissingVowelsState {
    pub phase: VowelsPhase,
    groups: Vec<MissingVowelsGroup>,
    group_index: usize,
    pair_index: usize,
    team_count: usize,
}

impl MissingVowelsState {
    pub fn new(groups: Vec<MissingVowelsGroup>, team_count: usize) -> Self {
        MissingVowelsState {
            phase: VowelsPhase::PreRound,
            groups,
            group_index: 0,
            pair_index: 0,
            team_count,
        }
    }

    fn current_group(&self) -> Option<&MissingVowelsGroup> {
        self.groups.get(self.group_index)
    }

    fn current_pair(&self) -> Option<&crate::episode::VowelPair> {
        self.current_group().and_then(|g| g.pairs.get(self.pair_index))
    }

    /// `NEXT_QUESTION` from PRE_ROUND enters the first group; from
    /// ANSWER_REVEALED it advances the pair pointer, rolling into the next
    /// group (or POST_ROUND) when the current group is exhausted
    /// (spec.md §4.B "Missing Vowels round").
    fn enter_first_question(&mut self) -> bool {
        if self.groups.is_empty() {
            self.phase = VowelsPhase::PostRound;
        } else {
            self.group_index = 0;
            self.pair_index = 0;
            self.phase = VowelsPhase::QuestionActive;
        }
        true
    }

    fn advance_to_next_question(&mut self) -> bool {
        let Some(group) = self.current_group() else {
            self.phase = VowelsPhase::PostRound;
            return true;
        };
        if self.pair_index + 1 < group.pairs.len() {
            self.pair_index += 1;
        } else {
            self.group_index += 1;
            self.pair_index = 0;
        }
        self.phase = if self.group_index >= self.groups.len() {
            VowelsPhase::PostRound
        } else {
            VowelsPhase::QuestionActive
        };
        true
    }
}

impl RoundHandler for MissingVowelsState {
    fn public_state(&self, teams: &[Team]) -> Value {
        let mut out = json!({ "phase": self.phase, "group_index": self.group_index });
        match self.phase {
            VowelsPhase::QuestionActive => {
                if let Some(pair) = self.current_pair() {
                    out["prompt"] = json!(pair.prompt);
                }
            }
            VowelsPhase::AnswerRevealed => {
                if let Some(pair) = self.current_pair() {
                    out["answer"] = json!(pair.answer);
                }
            }
            VowelsPhase::PreRound | VowelsPhase::PostRound => {}
        }
        let _ = teams;
        out
    }

    /// Admin additionally shows the group connection and the full answer
    /// at all times during the question (spec.md §4.B).
    fn admin_state(&self, teams: &[Team]) -> Value {
        let mut out = self.public_state(teams);
        if matches!(self.phase, VowelsPhase::QuestionActive | VowelsPhase::AnswerRevealed) {
            if let Some(group) = self.current_group() {
                out["connection"] = json!(group.connection);
            }
            if let Some(pair) = self.current_pair() {
                out["answer"] = json!(pair.answer);
            }
        }
        out
    }

    fn possible_actions(&self, _teams: &[Team]) -> BTreeSet<Action> {
        let mut actions = BTreeSet::new();
        match self.phase {
            VowelsPhase::PreRound | VowelsPhase::AnswerRevealed => {
                actions.insert(Action::NextQuestion);
            }
            VowelsPhase::QuestionActive => {
                if self.team_count == 1 {
                    actions.insert(Action::ScoreTeam1);
                } else {
                    actions.insert(Action::ScoreTeam1);
                    actions.insert(Action::ScoreTeam2);
                }
                actions.insert(Action::ScoreIncorrect);
            }
            VowelsPhase::PostRound => {}
        }
        actions
    }

    fn do_action(&mut self, action: Action, teams: &mut [Team]) -> bool {
        match (self.phase, action) {
            (VowelsPhase::PreRound, Action::NextQuestion) => self.enter_first_question(),
            (VowelsPhase::AnswerRevealed, Action::NextQuestion) => self.advance_to_next_question(),
            (VowelsPhase::QuestionActive, Action::ScoreTeam1) if !teams.is_empty() => {
                teams[0].score += 1;
                self.phase = VowelsPhase::AnswerRevealed;
                true
            }
            (VowelsPhase::QuestionActive, Action::ScoreTeam2) if self.team_count != 1 && teams.len() > 1 => {
                teams[1].score += 1;
                self.phase = VowelsPhase::AnswerRevealed;
                true
            }
            (VowelsPhase::QuestionActive, Action::ScoreIncorrect) => {
                self.phase = VowelsPhase::AnswerRevealed;
                true
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::episode::VowelPair;

    fn groups() -> Vec<MissingVowelsGroup> {
        vec![MissingVowelsGroup {
            connection: "Capital cities".to_string(),
            pairs: vec![
                VowelPair { answer: "LONDON".to_string(), prompt: "LNDN".to_string() },
                VowelPair { answer: "PARIS".to_string(), prompt: "PRS".to_string() },
                VowelPair { answer: "ROME".to_string(), prompt: "RM".to_string() },
            ],
        }]
    }

    /// Scenario 4 from spec.md §8, literally: a single group with 3 valid
    /// pairs, scoring team1/incorrect/team1 in turn ends at POST_ROUND with
    /// team1 = 2.
    #[test]
    fn missing_vowels_advance_scenario() {
        let mut state = MissingVowelsState::new(groups(), 2);
        let mut teams = vec![Team::new(0, "A"), Team::new(1, "B")];

        assert_eq!(state.phase, VowelsPhase::PreRound);
        assert!(state.do_action(Action::NextQuestion, &mut teams));
        assert_eq!(state.phase, VowelsPhase::QuestionActive);
        assert_eq!(state.pair_index, 0);

        assert!(state.do_action(Action::ScoreTeam1, &mut teams));
        assert_eq!(state.phase, VowelsPhase::AnswerRevealed);
        assert_eq!(teams[0].score, 1);

        assert!(state.do_action(Action::NextQuestion, &mut teams));
        assert_eq!(state.phase, VowelsPhase::QuestionActive);
        assert_eq!(state.pair_index, 1);

        assert!(state.do_action(Action::ScoreIncorrect, &mut teams));
        assert_eq!(state.phase, VowelsPhase::AnswerRevealed);
        assert_eq!(teams[0].score, 1);

        assert!(state.do_action(Action::NextQuestion, &mut teams));
        assert_eq!(state.phase, VowelsPhase::QuestionActive);
        assert_eq!(state.pair_index, 2);

        assert!(state.do_action(Action::ScoreTeam1, &mut teams));
        assert_eq!(teams[0].score, 2);

        assert!(state.do_action(Action::NextQuestion, &mut teams));
        assert_eq!(state.phase, VowelsPhase::PostRound);
    }

    #[test]
    fn scoring_while_not_in_question_active_is_a_no_op() {
        let mut state = MissingVowelsState::new(groups(), 2);
        let mut teams = vec![Team::new(0, "A"), Team::new(1, "B")];
        assert!(!state.do_action(Action::ScoreTeam1, &mut teams));
        assert_eq!(teams[0].score, 0);
    }

    #[test]
    fn empty_groups_goes_straight_to_post_round() {
        let mut state = MissingVowelsState::new(Vec::new(), 1);
        let mut teams = vec![Team::new(0, "Solo")];
        assert!(state.do_action(Action::NextQuestion, &mut teams));
        assert_eq!(state.phase, VowelsPhase::PostRound);
    }
}
