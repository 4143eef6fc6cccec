pub mod episode;
pub mod net;
pub mod room;
pub mod round;
pub mod team;

/// A generic contract suite every `RoundHandler` implementation must pass,
/// exercised against fixtures for all four round kinds. Mirrors the
/// teacher's game-trait contract tests, reworked for the closed `Action`
/// set instead of a free-form input/update loop.
#[cfg(any(test, feature = "test-helpers"))]
pub mod test_helpers {
    use crate::episode::{
        generate_prompt, six_questions_default, wall_default, Clue, MissingVowelsGroup, SixQuestions,
        VowelPair, Wall,
    };
    use crate::round::{
        Action, ConnectingWallState, MissingVowelsState, OnlyConnectRound, RoundHandler,
        StandardRoundState,
    };
    use crate::team::Team;

    pub fn make_teams(n: usize) -> Vec<Team> {
        (0..n)
            .map(|i| Team::new(i as u8, format!("Team {}", i + 1)))
            .collect()
    }

    fn valid_six() -> SixQuestions {
        let mut qs = six_questions_default();
        for (i, q) in qs.iter_mut().enumerate() {
            q.connection = format!("connection {i}");
            for (j, c) in q.elements.iter_mut().enumerate() {
                *c = Clue::Text {
                    value: format!("q{i}e{j}"),
                };
            }
        }
        qs
    }

    fn valid_wall(tag: &str) -> Wall {
        let mut wall = wall_default();
        for (i, q) in wall.iter_mut().enumerate() {
            q.connection = format!("{tag} group {i}");
            for (j, c) in q.elements.iter_mut().enumerate() {
                *c = Clue::Text {
                    value: format!("{tag}-{i}-{j}"),
                };
            }
        }
        wall
    }

    fn valid_vowels_groups() -> Vec<MissingVowelsGroup> {
        vec![MissingVowelsGroup {
            connection: "capitals".to_string(),
            pairs: vec![VowelPair {
                answer: "LONDON".to_string(),
                prompt: generate_prompt("LONDON"),
            }],
        }]
    }

    pub fn standard_round_fixture(team_count: usize, is_completions: bool) -> OnlyConnectRound {
        OnlyConnectRound::Standard(StandardRoundState::new(valid_six(), team_count, is_completions))
    }

    pub fn wall_round_fixture(team_count: usize) -> OnlyConnectRound {
        OnlyConnectRound::Wall(ConnectingWallState::new(
            valid_wall("lion"),
            valid_wall("water"),
            team_count,
        ))
    }

    pub fn vowels_round_fixture(team_count: usize) -> OnlyConnectRound {
        OnlyConnectRound::Vowels(MissingVowelsState::new(valid_vowels_groups(), team_count))
    }

    /// Every action `possible_actions()` advertises must actually be
    /// accepted by `do_action()` from a clone of the same state.
    pub fn contract_possible_actions_are_really_possible(
        round: &OnlyConnectRound,
        teams: &[Team],
    ) {
        for action in round.possible_actions(teams) {
            let mut probe = round.clone();
            let mut probe_teams = teams.to_vec();
            assert!(
                probe.do_action(action, &mut probe_teams),
                "{action:?} was advertised by possible_actions() but rejected by do_action()"
            );
        }
    }

    /// Any action outside `possible_actions()` must be a no-op: state and
    /// team scores are unchanged and `do_action` returns `false`.
    pub fn contract_impossible_action_is_a_no_op(
        round: &mut OnlyConnectRound,
        teams: &mut Vec<Team>,
        action: Action,
    ) {
        assert!(
            !round.possible_actions(teams).contains(&action),
            "test bug: {action:?} is actually possible here"
        );
        let before_state = round.public_state(teams);
        let before_teams = teams.clone();
        assert!(!round.do_action(action, teams));
        assert_eq!(before_state, round.public_state(teams));
        assert_eq!(before_teams, *teams);
    }

    /// Driving `NextQuestion` repeatedly (scoring every question as
    /// incorrect, or steal-incorrect, when offered) must terminate: no
    /// round config can loop forever.
    pub fn contract_standard_round_terminates(round: &mut OnlyConnectRound, teams: &mut Vec<Team>) {
        for _ in 0..256 {
            let actions = round.possible_actions(teams);
            if actions.is_empty() {
                return;
            }
            let next = actions
                .iter()
                .copied()
                .find(|a| *a != Action::ScoreSteal && *a != Action::ScoreTeam1 && *a != Action::ScoreTeam2)
                .or_else(|| actions.iter().copied().next())
                .unwrap();
            round.do_action(next, teams);
        }
        panic!("round did not reach a terminal (no possible actions) state within 256 steps");
    }
}

#[cfg(test)]
mod contract_tests {
    use super::test_helpers::*;
    use crate::round::{Action, RoundHandler};

    #[test]
    fn standard_round_possible_actions_hold_for_both_team_counts() {
        for teams_n in [1, 2] {
            for is_completions in [false, true] {
                let round = standard_round_fixture(teams_n, is_completions);
                let teams = make_teams(teams_n);
                contract_possible_actions_are_really_possible(&round, &teams);
            }
        }
    }

    #[test]
    fn wall_round_possible_actions_hold() {
        for teams_n in [1, 2] {
            let round = wall_round_fixture(teams_n);
            let teams = make_teams(teams_n);
            contract_possible_actions_are_really_possible(&round, &teams);
        }
    }

    #[test]
    fn vowels_round_possible_actions_hold() {
        for teams_n in [1, 2] {
            let round = vowels_round_fixture(teams_n);
            let teams = make_teams(teams_n);
            contract_possible_actions_are_really_possible(&round, &teams);
        }
    }

    #[test]
    fn locking_in_before_selecting_is_always_a_no_op() {
        let mut round = standard_round_fixture(2, false);
        let mut teams = make_teams(2);
        contract_impossible_action_is_a_no_op(&mut round, &mut teams, Action::LockIn);
    }

    #[test]
    fn standard_round_terminates() {
        let mut round = standard_round_fixture(2, false);
        let mut teams = make_teams(2);
        contract_standard_round_terminates(&mut round, &mut teams);
    }

    #[test]
    fn completions_round_terminates() {
        let mut round = standard_round_fixture(2, true);
        let mut teams = make_teams(2);
        contract_standard_round_terminates(&mut round, &mut teams);
    }
}
