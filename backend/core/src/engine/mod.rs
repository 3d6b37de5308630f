//! The assignment engine: model construction, solving and extraction.
//!
//! The engine takes a snapshot of the preference data (students, expanded
//! project instances, per-project scores), turns it into a 0/1 integer
//! program over assignment booleans `x[p, s]`, solves it exactly, and maps
//! the solution back to team rows. Domain ids are remapped to dense indices
//! for the duration of one run and discarded afterwards.

mod bounds;
mod extract;
mod index;
mod model;
mod solve;

pub use bounds::{team_bounds, TeamBounds};
pub use index::IdIndex;
pub use solve::{is_running, RunGuard, SolveStats, SolveStatus};

use log::{debug, info};
use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::{AmbitionLevel, AssignmentVariant, Settings};

/// Errors raised by the assignment engine.
#[derive(Error, Debug)]
pub enum EngineError {
    /// Misconfigured instance counts, team sizes or solver parameters.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    /// No feasible assignment exists for the given data, or the solver gave
    /// up without one.
    #[error("no feasible assignment: {0}")]
    Unsolvable(String),
    /// A team generation is already in flight in this process.
    #[error("team generation is already running")]
    AlreadyRunning,
}

/// One student as the solver sees it.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct StudentSeat {
    pub id: i64,
    /// Drives the dispersion constraint.
    pub is_wing: bool,
    /// Ambition level; only read by the level-aware variants.
    pub level: AmbitionLevel,
}

/// One expanded project instance as the solver sees it.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct TeamSlot {
    /// Project instance id.
    pub id: i64,
    /// Parent project id.
    pub project_id: i64,
    /// Instance number within the parent project, starting at 1.
    pub number: u32,
}

/// One (student, project) preference score.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct PreferenceRow {
    pub student_id: i64,
    pub project_id: i64,
    pub score: i64,
}

/// Solver parameters captured from the settings at the start of a run.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct SolveConfig {
    pub variant: AssignmentVariant,
    pub team_min_member: u32,
    pub max_runtime_secs: u32,
    pub relative_gap_limit: f64,
    pub num_workers: u32,
    pub level_group_factor: i64,
}

impl SolveConfig {
    /// Captures the solve-relevant subset of the settings singleton.
    pub fn from_settings(settings: &Settings) -> SolveConfig {
        SolveConfig {
            variant: settings.assignment_variant,
            team_min_member: settings.team_min_member,
            max_runtime_secs: settings.max_runtime_secs,
            relative_gap_limit: settings.relative_gap_limit,
            num_workers: settings.num_workers,
            level_group_factor: settings.level_group_factor,
        }
    }

    fn validate(&self) -> Result<(), EngineError> {
        let as_settings = Settings {
            team_min_member: self.team_min_member,
            max_runtime_secs: self.max_runtime_secs,
            relative_gap_limit: self.relative_gap_limit,
            num_workers: self.num_workers,
            level_group_factor: self.level_group_factor,
            assignment_variant: self.variant,
            ..Settings::default()
        };
        as_settings.validate().map_err(EngineError::InvalidConfig)
    }
}

/// Complete input snapshot for one solve.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct AssignmentInput {
    pub students: Vec<StudentSeat>,
    /// Expanded instances in solve order (the expansion plan's order).
    pub slots: Vec<TeamSlot>,
    /// Preference scores per (student, project). Instances inherit the
    /// parent project's score. Missing pairs fall back to the neutral
    /// default score.
    pub answers: Vec<PreferenceRow>,
    pub config: SolveConfig,
}

/// One team row produced by the extractor, ready to persist.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct TeamDraft {
    pub project_id: i64,
    pub project_instance_id: i64,
    pub student_id: i64,
    pub is_initial_contact: bool,
    /// Normalized preference score (0..=100) for this pair.
    pub score: i64,
}

/// The outcome of a successful solve.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct AssignmentSolution {
    pub teams: Vec<TeamDraft>,
    pub stats: SolveStats,
}

/// Solves the team assignment problem for one input snapshot.
///
/// This is a pure function over its input plus the injected randomness
/// (initial-contact selection); callers that need the process-wide
/// single-run policy acquire a [`RunGuard`] around it. The solve is bounded
/// by the configured wall-time limit: a run that times out returns a greedy
/// feasible assignment with status `FEASIBLE` where one exists. Returns
/// [`EngineError::Unsolvable`] when the hard constraints admit no
/// assignment, or when the time limit strikes without a feasible solution.
pub fn solve_assignment<R: Rng>(
    input: &AssignmentInput,
    rng: &mut R,
) -> Result<AssignmentSolution, EngineError> {
    input.config.validate()?;
    if input.students.is_empty() {
        return Err(EngineError::InvalidConfig("no students to assign".into()));
    }
    if input.slots.is_empty() {
        return Err(EngineError::InvalidConfig(
            "no project instances to assign to".into(),
        ));
    }

    let students = IdIndex::from_ids(input.students.iter().map(|s| s.id))
        .map_err(|id| EngineError::InvalidConfig(format!("duplicate student id {id}")))?;
    let slots = IdIndex::from_ids(input.slots.iter().map(|s| s.id))
        .map_err(|id| EngineError::InvalidConfig(format!("duplicate project instance id {id}")))?;

    let wing_count = input.students.iter().filter(|s| s.is_wing).count();
    let bounds = team_bounds(
        students.len(),
        slots.len(),
        wing_count,
        input.config.team_min_member,
    )?;
    debug!(
        "solving: {} students ({} wings), {} instances, variant {}, bounds {:?}",
        students.len(),
        wing_count,
        slots.len(),
        input.config.variant.value(),
        bounds
    );

    let started = std::time::Instant::now();
    let outcome = model::solve_model(input, &students, &slots, &bounds)?;
    let wall_time_secs = started.elapsed().as_secs_f64();

    let teams = extract::extract_teams(input, &outcome.groups, &outcome.pair_scores, rng);
    let teams_used = outcome.groups.iter().filter(|g| !g.is_empty()).count();
    let stats = if outcome.proven_optimal {
        SolveStats::optimal(
            outcome.objective,
            wall_time_secs,
            students.len(),
            slots.len(),
            teams_used,
        )
    } else {
        SolveStats::feasible(
            outcome.objective,
            outcome.best_bound,
            wall_time_secs,
            students.len(),
            slots.len(),
            teams_used,
        )
    };
    info!("solve finished: {}", stats.summary());

    Ok(AssignmentSolution { teams, stats })
}
