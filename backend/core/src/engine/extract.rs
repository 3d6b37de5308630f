//! Maps the solved groups back to persistable team rows.

use std::collections::HashMap;

use rand::{Rng, RngExt};

use super::{AssignmentInput, TeamDraft};

/// Turns the solver's groups into team rows.
///
/// Used slots are renumbered per parent project: the first used slot of a
/// project lands on the project's lowest-numbered instance, the second on
/// the next one, and so on, so persisted instance numbers are always
/// contiguous from 1. One member per team is picked uniformly at random as
/// the initial contact.
pub(super) fn extract_teams<R: Rng>(
    input: &AssignmentInput,
    groups: &[Vec<usize>],
    pair_scores: &[Vec<i64>],
    rng: &mut R,
) -> Vec<TeamDraft> {
    // Instance pool per project, ordered by instance number.
    let mut pools: HashMap<i64, Vec<(u32, i64)>> = HashMap::new();
    for slot in &input.slots {
        pools
            .entry(slot.project_id)
            .or_default()
            .push((slot.number, slot.id));
    }
    for pool in pools.values_mut() {
        pool.sort_unstable();
    }

    let mut next_in_pool: HashMap<i64, usize> = HashMap::new();
    let mut teams = Vec::new();

    for (p, members) in groups.iter().enumerate() {
        if members.is_empty() {
            continue;
        }
        let slot = &input.slots[p];
        let cursor = next_in_pool.entry(slot.project_id).or_insert(0);
        let (_, instance_id) = pools[&slot.project_id][*cursor];
        *cursor += 1;

        let contact = rng.random_range(0..members.len());
        for (position, &s) in members.iter().enumerate() {
            teams.push(TeamDraft {
                project_id: slot.project_id,
                project_instance_id: instance_id,
                student_id: input.students[s].id,
                is_initial_contact: position == contact,
                score: pair_scores[p][s],
            });
        }
    }

    teams
}
