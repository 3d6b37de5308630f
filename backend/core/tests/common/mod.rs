//! Shared helpers for the engine integration tests.

use tg_core::engine::{AssignmentInput, PreferenceRow, SolveConfig, StudentSeat, TeamSlot};
use tg_core::models::{AmbitionLevel, AssignmentVariant, Settings};

/// Student ids start here so they never collide with slot ids in a test.
pub const STUDENT_BASE: i64 = 1000;

/// Builds an input where project `p` (1-based) expands into
/// `instances_per_project` slots and every student scores every project
/// with `score_fn(student_index, project_index)`.
#[allow(dead_code)]
pub fn build_input(
    n_students: usize,
    n_projects: usize,
    instances_per_project: u32,
    team_min_member: u32,
    score_fn: impl Fn(usize, usize) -> i64,
) -> AssignmentInput {
    let students = (0..n_students)
        .map(|i| StudentSeat {
            id: STUDENT_BASE + i as i64,
            is_wing: false,
            level: AmbitionLevel::Unspecified,
        })
        .collect();

    let mut slots = Vec::new();
    let mut slot_id = 1;
    for project in 1..=n_projects as i64 {
        for number in 1..=instances_per_project {
            slots.push(TeamSlot {
                id: slot_id,
                project_id: project,
                number,
            });
            slot_id += 1;
        }
    }

    let mut answers = Vec::new();
    for s in 0..n_students {
        for p in 0..n_projects {
            answers.push(PreferenceRow {
                student_id: STUDENT_BASE + s as i64,
                project_id: 1 + p as i64,
                score: score_fn(s, p),
            });
        }
    }

    AssignmentInput {
        students,
        slots,
        answers,
        config: SolveConfig::from_settings(&Settings {
            team_min_member,
            ..Settings::default()
        }),
    }
}

/// Switches the objective variant of an already-built input.
#[allow(dead_code)]
pub fn with_variant(mut input: AssignmentInput, variant: AssignmentVariant) -> AssignmentInput {
    input.config.variant = variant;
    input
}

/// Groups the solution's student ids per project instance id.
#[allow(dead_code)]
pub fn members_per_instance(
    teams: &[tg_core::TeamDraft],
) -> std::collections::HashMap<i64, Vec<i64>> {
    let mut members: std::collections::HashMap<i64, Vec<i64>> = std::collections::HashMap::new();
    for team in teams {
        members
            .entry(team.project_instance_id)
            .or_default()
            .push(team.student_id);
    }
    members
}
