//! End-to-end scenarios for the assignment engine.

mod common;

use common::{build_input, members_per_instance, with_variant, STUDENT_BASE};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tg_core::engine::{solve_assignment, EngineError};
use tg_core::happiness::{happiness, mean_happiness, Happiness};
use tg_core::models::{AmbitionLevel, AssignmentVariant, SCORE_MAX};

fn rng() -> ChaCha8Rng {
    ChaCha8Rng::seed_from_u64(7)
}

#[test]
fn minimal_two_projects_split() {
    // 6 students, projects A and B with one instance each, teams of 3.
    // Everybody loves A (5) and dislikes B (1).
    let input = build_input(6, 2, 1, 3, |_, p| if p == 0 { 5 } else { 1 });
    let solution = solve_assignment(&input, &mut rng()).unwrap();

    let members = members_per_instance(&solution.teams);
    assert_eq!(members.len(), 2);
    assert!(members.values().all(|m| m.len() == 3));
    assert_eq!(solution.teams.len(), 6);
    assert_eq!(solution.stats.teams_used, 2);

    // Half the roster gets the beloved project, half the disliked one.
    let mut on_a: Vec<Happiness> = Vec::new();
    let mut on_b: Vec<Happiness> = Vec::new();
    for team in &solution.teams {
        let raw = if team.project_id == 1 { 5 } else { 1 };
        let value = happiness(raw, SCORE_MAX);
        if team.project_id == 1 {
            assert_eq!(team.score, 100);
            on_a.push(value);
        } else {
            assert_eq!(team.score, 0);
            on_b.push(value);
        }
    }
    assert_eq!(mean_happiness(&on_a).project, 1.0);
    assert_eq!(mean_happiness(&on_b).project, 0.0);
    // Everyone's personal maximum was 5, so poll happiness mirrors project
    // happiness here.
    assert_eq!(mean_happiness(&on_a).poll, 1.0);
    assert_eq!(mean_happiness(&on_b).poll, 0.0);
}

#[test]
fn wing_students_are_dispersed() {
    // 9 students, 3 of them wings, 3 instances of 3: one wing per team.
    let mut input = build_input(9, 3, 1, 3, |_, _| 3);
    for seat in input.students.iter_mut().take(3) {
        seat.is_wing = true;
    }
    let solution = solve_assignment(&input, &mut rng()).unwrap();

    let members = members_per_instance(&solution.teams);
    assert_eq!(members.len(), 3);
    for group in members.values() {
        let wings = group
            .iter()
            .filter(|id| (**id - STUDENT_BASE) < 3)
            .count();
        assert_eq!(wings, 1, "group {group:?}");
    }
}

#[test]
fn instance_selection_maximizes_the_preference_sum() {
    // 10 students over 5 single-instance projects with teams of 3: only
    // floor(10/3) = 3 instances may be used. Everybody scores projects
    // 1..=3 with 5 and the rest with 1, so exactly those three win.
    let input = build_input(10, 5, 1, 3, |_, p| if p < 3 { 5 } else { 1 });
    let solution = solve_assignment(&input, &mut rng()).unwrap();

    assert_eq!(solution.stats.teams_used, 3);
    let mut used_projects: Vec<i64> = solution.teams.iter().map(|t| t.project_id).collect();
    used_projects.sort_unstable();
    used_projects.dedup();
    assert_eq!(used_projects, vec![1, 2, 3]);

    // All ten students landed on a full-score project.
    assert_eq!(solution.stats.objective, 1000.0);
    let members = members_per_instance(&solution.teams);
    assert!(members.values().all(|m| m.len() == 3 || m.len() == 4));
}

#[test]
fn missing_answers_fall_back_to_the_neutral_default() {
    // 12 students on 3 projects with 2 instances each; the last 4 students
    // submitted no poll at all.
    let mut input = build_input(12, 3, 2, 3, |s, p| {
        if p == 0 && s < 8 {
            5
        } else {
            1
        }
    });
    input
        .answers
        .retain(|row| row.student_id < STUDENT_BASE + 8);

    let solution = solve_assignment(&input, &mut rng()).unwrap();

    let mut assigned: Vec<i64> = solution.teams.iter().map(|t| t.student_id).collect();
    assigned.sort_unstable();
    assigned.dedup();
    assert_eq!(assigned.len(), 12, "every student is placed exactly once");

    // The silent students contribute the neutral 50 wherever they land.
    for team in &solution.teams {
        if team.student_id >= STUDENT_BASE + 8 {
            assert_eq!(team.score, 50);
        }
    }
}

#[test]
fn level_grouping_builds_homogeneous_teams() {
    // 12 students with levels 2,2,2,2,3,3,3,3,4,4,4,4 and no preference
    // signal: variant 2 groups each level into its own team.
    let mut input = build_input(12, 3, 1, 4, |_, _| 3);
    input = with_variant(input, AssignmentVariant::LevelGroup);
    for (i, seat) in input.students.iter_mut().enumerate() {
        seat.level = AmbitionLevel::from_value(2 + (i / 4) as i64).unwrap();
    }

    let solution = solve_assignment(&input, &mut rng()).unwrap();
    let members = members_per_instance(&solution.teams);
    assert_eq!(members.len(), 3);
    for group in members.values() {
        let mut levels: Vec<i64> = group.iter().map(|id| 2 + (id - STUDENT_BASE) / 4).collect();
        levels.sort_unstable();
        levels.dedup();
        assert_eq!(levels.len(), 1, "mixed-level group {group:?}");
    }
}

#[test]
fn combined_variant_never_mixes_ambitious_with_minimal_pass() {
    // 6 students, half ambitious, half minimal-pass, equal preferences.
    let mut input = build_input(6, 2, 1, 3, |_, _| 3);
    input = with_variant(input, AssignmentVariant::Combined);
    for (i, seat) in input.students.iter_mut().enumerate() {
        seat.level = if i < 3 {
            AmbitionLevel::Ambitious
        } else {
            AmbitionLevel::MinimalPass
        };
    }

    let solution = solve_assignment(&input, &mut rng()).unwrap();
    let members = members_per_instance(&solution.teams);
    for group in members.values() {
        let ambitious = group.iter().filter(|id| (**id - STUDENT_BASE) < 3).count();
        assert!(
            ambitious == 0 || ambitious == group.len(),
            "mixed group {group:?}"
        );
    }
}

#[test]
fn scarce_instances_grow_the_single_team() {
    // 5 students, one instance, minimum 3: the minimum is recomputed so the
    // single team absorbs the whole roster.
    let input = build_input(5, 1, 1, 3, |_, _| 3);
    let solution = solve_assignment(&input, &mut rng()).unwrap();
    assert_eq!(solution.stats.teams_used, 1);
    assert_eq!(solution.teams.len(), 5);
}

#[test]
fn roster_below_the_minimum_is_unsolvable() {
    let input = build_input(5, 1, 1, 6, |_, _| 3);
    let err = solve_assignment(&input, &mut rng()).unwrap_err();
    assert!(matches!(err, EngineError::Unsolvable(_)), "{err}");
}

#[test]
fn impossible_remainder_is_reported_as_unsolvable() {
    // 11 students with teams of 4 or 5 need three instances, but only
    // floor(11/4) = 2 may be used: the model is proven infeasible.
    let input = build_input(11, 5, 1, 4, |_, _| 3);
    let err = solve_assignment(&input, &mut rng()).unwrap_err();
    assert!(matches!(err, EngineError::Unsolvable(_)), "{err}");
}

#[test]
fn repeated_runs_reach_the_same_objective() {
    let input = build_input(9, 3, 2, 3, |s, p| 1 + ((s + p) % 5) as i64);

    let first = solve_assignment(&input, &mut ChaCha8Rng::seed_from_u64(1)).unwrap();
    let second = solve_assignment(&input, &mut ChaCha8Rng::seed_from_u64(2)).unwrap();
    assert!(
        (first.stats.objective - second.stats.objective).abs() < 1e-9,
        "{} vs {}",
        first.stats.objective,
        second.stats.objective
    );
    assert_eq!(first.stats.solution_gap, 0.0);
}

#[test]
fn exactly_one_initial_contact_per_team() {
    let input = build_input(12, 4, 1, 3, |s, p| 1 + ((s * p) % 5) as i64);
    let solution = solve_assignment(&input, &mut rng()).unwrap();

    let members = members_per_instance(&solution.teams);
    for instance_id in members.keys() {
        let contacts = solution
            .teams
            .iter()
            .filter(|t| t.project_instance_id == *instance_id && t.is_initial_contact)
            .count();
        assert_eq!(contacts, 1);
    }
}
