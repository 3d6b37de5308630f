//! Team sizing bounds derived from the roster and instance counts.

use super::EngineError;

/// Sizing bounds for one solve.
///
/// `min_members`/`max_members` bound the size of every used instance,
/// `used_instances` is the exact number of instances the solution must use,
/// and the wing bounds spread the wing students evenly over used instances.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TeamBounds {
    /// Effective minimum team size after correction.
    pub team_min: usize,
    /// Lower member bound per used instance (equals `team_min`).
    pub min_members: usize,
    /// Upper member bound per used instance (`team_min` or one more).
    pub max_members: usize,
    /// Exact number of instances that must be used.
    pub used_instances: usize,
    /// Lower wing-count bound per used instance.
    pub min_wings: usize,
    /// Upper wing-count bound per used instance.
    pub max_wings: usize,
}

/// Computes the sizing bounds.
///
/// The baseline is `used = n_students / team_min`. When that would call for
/// at least as many instances as exist, the minimum team size is recomputed
/// as `n_students / n_slots` so the available instances absorb everybody.
/// A roster smaller than the minimum team size leaves zero usable instances
/// and is rejected as unsolvable.
pub fn team_bounds(
    n_students: usize,
    n_slots: usize,
    n_wings: usize,
    team_min_member: u32,
) -> Result<TeamBounds, EngineError> {
    if n_students == 0 {
        return Err(EngineError::InvalidConfig("empty roster".into()));
    }
    if n_slots == 0 {
        return Err(EngineError::InvalidConfig("no project instances".into()));
    }

    let configured_min = team_min_member as usize;
    let baseline = n_students / configured_min;
    if baseline == 0 {
        return Err(EngineError::Unsolvable(format!(
            "{n_students} students cannot fill a team of at least {configured_min}"
        )));
    }

    let (team_min, used_instances) = if baseline >= n_slots {
        (n_students / n_slots, n_slots)
    } else {
        (configured_min, baseline)
    };

    let max_members = if n_students % team_min == 0 {
        team_min
    } else {
        team_min + 1
    };

    Ok(TeamBounds {
        team_min,
        min_members: team_min,
        max_members,
        used_instances,
        min_wings: n_wings / used_instances,
        max_wings: n_wings.div_ceil(used_instances),
    })
}
