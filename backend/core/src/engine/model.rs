//! Integer-program construction for the assignment problem.
//!
//! The decision space is a boolean matrix `assign[p][s]`, true iff student
//! `s` joins instance `p`. Hard constraints cover membership, team sizing,
//! wing dispersion and the exact used-instance count; the objective is one
//! of three selectable variants. Implications on the auxiliary `used[p]`
//! booleans are encoded as pairs of linear inequalities.
//!
//! The solve itself runs on a worker thread watched against the configured
//! wall-time limit. When the limit strikes before the exact solver finishes,
//! the driver falls back to a greedily constructed feasible assignment, so a
//! timed-out run can still persist a suboptimal solution instead of failing.

use std::collections::HashMap;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::Duration;

use good_lp::{constraint, default_solver, variable, variables, Expression, ResolutionError, Solution, SolverModel, Variable};
use log::{debug, warn};

use super::bounds::TeamBounds;
use super::index::IdIndex;
use super::{AssignmentInput, EngineError};
use crate::models::{AmbitionLevel, AssignmentVariant, SCORE_DEFAULT};
use crate::score::{normalize_score, normalized_unit};

/// Ambition levels that take part in the grouping indicators.
const GROUPED_LEVELS: [AmbitionLevel; 3] = [
    AmbitionLevel::Ambitious,
    AmbitionLevel::Solid,
    AmbitionLevel::MinimalPass,
];

/// Reward per homogeneous-team indicator in the level-grouping objective.
const LEVEL_FILLED_REWARD: f64 = 100.0;

struct DecisionVars {
    /// `assign[p][s]`: student `s` is a member of instance `p`.
    assign: Vec<Vec<Variable>>,
    /// `used[p]`: instance `p` has at least one member.
    used: Vec<Variable>,
    /// `present[p][l]`: instance `p` contains a student of grouped level `l`.
    /// Empty unless the variant is level-aware.
    present: Vec<Vec<Variable>>,
    /// `filled[p][l]`: instance `p` holds a whole team of grouped level `l`.
    /// Empty unless the variant is level-aware.
    filled: Vec<Vec<Variable>>,
}

pub(super) struct ModelOutcome {
    /// Member indices per slot, in student-index order.
    pub groups: Vec<Vec<usize>>,
    /// Normalized preference score per `[slot][student]` pair.
    pub pair_scores: Vec<Vec<i64>>,
    /// Achieved objective value.
    pub objective: f64,
    /// Best objective bound known for this run. Equals `objective` when the
    /// solve ran to completion.
    pub best_bound: f64,
    /// False when the time limit struck and the fallback assignment stands in
    /// for the exact solution.
    pub proven_optimal: bool,
}

/// Builds and solves the model, returning the realized groups.
pub(super) fn solve_model(
    input: &AssignmentInput,
    students: &IdIndex,
    slots: &IdIndex,
    bounds: &TeamBounds,
) -> Result<ModelOutcome, EngineError> {
    let n_students = students.len();
    let n_slots = slots.len();
    let pair_scores = build_score_table(input, students);
    let levels: Vec<AmbitionLevel> = input.students.iter().map(|s| s.level).collect();
    let level_aware = input.config.variant.is_level_aware();

    let mut vars = variables!();
    let dv = create_decision_variables(&mut vars, n_slots, n_students, level_aware);
    let objective = build_objective(input, &dv, &pair_scores, &levels);

    let mut problem = vars.maximise(objective.clone()).using(default_solver);

    // Each student joins exactly one instance.
    for s in 0..n_students {
        let membership: Expression = (0..n_slots).map(|p| dv.assign[p][s]).sum();
        problem = problem.with(constraint!(membership == 1));
    }

    // A used instance holds between min and max members, an unused one
    // holds none.
    for p in 0..n_slots {
        let members: Expression = dv.assign[p].iter().copied().sum();
        problem = problem.with(constraint!(
            members.clone() >= bounds.min_members as f64 * dv.used[p]
        ));
        problem = problem.with(constraint!(
            members <= bounds.max_members as f64 * dv.used[p]
        ));
    }

    // Wing students are spread evenly over the used instances.
    let wings: Vec<usize> = input
        .students
        .iter()
        .enumerate()
        .filter(|(_, s)| s.is_wing)
        .map(|(i, _)| i)
        .collect();
    if !wings.is_empty() {
        for p in 0..n_slots {
            let wing_members: Expression = wings.iter().map(|&s| dv.assign[p][s]).sum();
            problem = problem.with(constraint!(
                wing_members.clone() >= bounds.min_wings as f64 * dv.used[p]
            ));
            problem = problem.with(constraint!(
                wing_members <= bounds.max_wings as f64 * dv.used[p]
            ));
        }
    }

    // Exactly the computed number of instances is used.
    let used_total: Expression = dv.used.iter().copied().sum();
    problem = problem.with(constraint!(used_total == bounds.used_instances as f64));

    if level_aware {
        problem = add_level_constraints(problem, &dv, &levels, bounds);
    }

    debug!(
        "model built: {} assignment vars, {} slots, level_aware={}",
        n_slots * n_students,
        n_slots,
        level_aware
    );

    // The exact solve runs on a worker thread so the configured wall-time
    // limit can be enforced from outside. A timed-out worker is left to
    // finish on its own; its result is discarded.
    let assign = dv.assign.clone();
    let (sender, receiver) = mpsc::channel();
    thread::spawn(move || {
        let outcome = problem.solve().map(|solution| {
            let mut groups: Vec<Vec<usize>> = vec![Vec::new(); n_slots];
            for (p, group) in groups.iter_mut().enumerate() {
                for s in 0..n_students {
                    if solution.value(assign[p][s]) > 0.5 {
                        group.push(s);
                    }
                }
            }
            (groups, solution.eval(objective))
        });
        let _ = sender.send(outcome);
    });

    let timeout = Duration::from_secs(input.config.max_runtime_secs as u64);
    match receiver.recv_timeout(timeout) {
        Ok(Ok((groups, objective))) => Ok(ModelOutcome {
            groups,
            pair_scores,
            objective,
            best_bound: objective,
            proven_optimal: true,
        }),
        Ok(Err(ResolutionError::Infeasible)) => Err(EngineError::Unsolvable(
            "the hard constraints admit no assignment".into(),
        )),
        Ok(Err(other)) => Err(EngineError::Unsolvable(format!("solver gave up: {other}"))),
        Err(RecvTimeoutError::Timeout) => {
            warn!(
                "time limit of {}s reached, falling back to a greedy assignment",
                input.config.max_runtime_secs
            );
            let Some(groups) = greedy_fallback(input, bounds, n_students, n_slots) else {
                return Err(EngineError::Unsolvable(format!(
                    "time limit of {}s reached without a feasible solution",
                    input.config.max_runtime_secs
                )));
            };
            let objective = preference_objective(&groups, &pair_scores);
            let best_bound = preference_upper_bound(&pair_scores);
            Ok(ModelOutcome {
                groups,
                pair_scores,
                objective,
                best_bound,
                proven_optimal: false,
            })
        }
        Err(RecvTimeoutError::Disconnected) => Err(EngineError::Unsolvable(
            "solver worker terminated unexpectedly".into(),
        )),
    }
}

/// Constructs a feasible assignment without the solver: the first instances
/// in slot order are filled round-robin, wings first so their counts stay
/// within the dispersion bounds. Only available for the plain preference
/// variant; the level-aware variants add constraints a greedy fill cannot
/// guarantee. Returns `None` when no feasible fill exists.
fn greedy_fallback(
    input: &AssignmentInput,
    bounds: &TeamBounds,
    n_students: usize,
    n_slots: usize,
) -> Option<Vec<Vec<usize>>> {
    if input.config.variant.is_level_aware() {
        return None;
    }

    let teams = bounds.used_instances;
    let extra = n_students - teams * bounds.min_members;
    // More leftover students than teams that can take one extra member.
    if extra > teams * (bounds.max_members - bounds.min_members) {
        return None;
    }

    // Teams 0..extra hold one member more; extra wings go to the same low
    // indices, which keeps every wing quota within its team's capacity.
    let capacity: Vec<usize> = (0..teams)
        .map(|i| bounds.min_members + usize::from(i < extra))
        .collect();
    let wings: Vec<usize> = (0..n_students).filter(|&s| input.students[s].is_wing).collect();
    let spare = wings.len() % teams;
    let quota: Vec<usize> = (0..teams)
        .map(|i| wings.len() / teams + usize::from(i < spare))
        .collect();

    let mut groups: Vec<Vec<usize>> = vec![Vec::new(); n_slots];
    let mut wing_iter = wings.iter().copied();
    for (i, group) in groups.iter_mut().enumerate().take(teams) {
        group.extend(wing_iter.by_ref().take(quota[i]));
    }
    let mut others = (0..n_students).filter(|s| !input.students[*s].is_wing);
    for (i, group) in groups.iter_mut().enumerate().take(teams) {
        let missing = capacity[i] - group.len();
        group.extend(others.by_ref().take(missing));
    }
    for group in groups.iter_mut() {
        group.sort_unstable();
    }
    Some(groups)
}

/// Preference objective value of a concrete assignment.
fn preference_objective(groups: &[Vec<usize>], pair_scores: &[Vec<i64>]) -> f64 {
    groups
        .iter()
        .enumerate()
        .flat_map(|(p, group)| group.iter().map(move |&s| pair_scores[p][s]))
        .sum::<i64>() as f64
}

/// Upper bound on the preference objective: every student on one of their
/// best-scored instances.
fn preference_upper_bound(pair_scores: &[Vec<i64>]) -> f64 {
    if pair_scores.is_empty() {
        return 0.0;
    }
    let n_students = pair_scores[0].len();
    (0..n_students)
        .map(|s| pair_scores.iter().map(|row| row[s]).max().unwrap_or(0))
        .sum::<i64>() as f64
}

/// Normalized preference score per `[slot][student]` pair.
///
/// Every instance inherits its parent project's score; pairs without an
/// answer fall back to the neutral default.
fn build_score_table(input: &AssignmentInput, students: &IdIndex) -> Vec<Vec<i64>> {
    let mut raw: HashMap<(i64, i64), i64> = HashMap::new();
    for answer in &input.answers {
        raw.insert((answer.student_id, answer.project_id), answer.score);
    }

    input
        .slots
        .iter()
        .map(|slot| {
            (0..students.len())
                .map(|s| {
                    let student_id = students.id(s);
                    let score = raw
                        .get(&(student_id, slot.project_id))
                        .copied()
                        .unwrap_or(SCORE_DEFAULT);
                    normalize_score(score)
                })
                .collect()
        })
        .collect()
}

fn create_decision_variables(
    vars: &mut good_lp::ProblemVariables,
    n_slots: usize,
    n_students: usize,
    level_aware: bool,
) -> DecisionVars {
    let assign: Vec<Vec<Variable>> = (0..n_slots)
        .map(|p| {
            (0..n_students)
                .map(|s| vars.add(variable().binary().name(format!("x_{p}_{s}"))))
                .collect()
        })
        .collect();

    let used: Vec<Variable> = (0..n_slots)
        .map(|p| vars.add(variable().binary().name(format!("used_{p}"))))
        .collect();

    let (present, filled) = if level_aware {
        let present = (0..n_slots)
            .map(|p| {
                GROUPED_LEVELS
                    .iter()
                    .map(|l| {
                        vars.add(
                            variable()
                                .binary()
                                .name(format!("present_{p}_{}", l.value())),
                        )
                    })
                    .collect()
            })
            .collect();
        let filled = (0..n_slots)
            .map(|p| {
                GROUPED_LEVELS
                    .iter()
                    .map(|l| {
                        vars.add(
                            variable()
                                .binary()
                                .name(format!("filled_{p}_{}", l.value())),
                        )
                    })
                    .collect()
            })
            .collect();
        (present, filled)
    } else {
        (Vec::new(), Vec::new())
    };

    DecisionVars {
        assign,
        used,
        present,
        filled,
    }
}

fn build_objective(
    input: &AssignmentInput,
    dv: &DecisionVars,
    pair_scores: &[Vec<i64>],
    levels: &[AmbitionLevel],
) -> Expression {
    let factor = input.config.level_group_factor as f64;
    match input.config.variant {
        AssignmentVariant::Preference => preference_sum(dv, pair_scores, levels, false),
        AssignmentVariant::LevelGroup => {
            let filled_reward: Expression = dv
                .filled
                .iter()
                .flatten()
                .map(|&f| f * LEVEL_FILLED_REWARD)
                .sum();
            let spread_penalty: Expression =
                dv.present.iter().flatten().map(|&h| h * factor).sum();
            filled_reward - spread_penalty
        }
        AssignmentVariant::Combined => {
            let filled_reward: Expression =
                dv.filled.iter().flatten().map(|&f| f * factor).sum();
            preference_sum(dv, pair_scores, levels, true) + filled_reward
        }
    }
}

/// Σ score(p, s) · assign[p][s], optionally with the ambition adjustment:
/// above-neutral scores are skewed one raw unit up for ambitious students
/// and one down for minimal-pass students.
fn preference_sum(
    dv: &DecisionVars,
    pair_scores: &[Vec<i64>],
    levels: &[AmbitionLevel],
    adjust_for_levels: bool,
) -> Expression {
    let neutral = normalize_score(SCORE_DEFAULT);
    let unit = normalized_unit();
    let mut total = Expression::default();
    for (p, row) in pair_scores.iter().enumerate() {
        for (s, &score) in row.iter().enumerate() {
            let mut value = score;
            if adjust_for_levels && score > neutral {
                match levels[s] {
                    AmbitionLevel::Ambitious => value += unit,
                    AmbitionLevel::MinimalPass => value -= unit,
                    _ => {}
                }
            }
            total += dv.assign[p][s] * value as f64;
        }
    }
    total
}

/// Links the level indicator booleans to the member counts and forbids
/// mixing ambitious with minimal-pass students in one instance.
fn add_level_constraints<M: SolverModel>(
    mut problem: M,
    dv: &DecisionVars,
    levels: &[AmbitionLevel],
    bounds: &TeamBounds,
) -> M {
    let n_slots = dv.assign.len();
    for p in 0..n_slots {
        for (li, level) in GROUPED_LEVELS.iter().enumerate() {
            let count: Expression = levels
                .iter()
                .enumerate()
                .filter(|(_, l)| *l == level)
                .map(|(s, _)| dv.assign[p][s])
                .sum();
            // present is forced up by any member of the level...
            problem = problem.with(constraint!(
                count.clone() <= bounds.max_members as f64 * dv.present[p][li]
            ));
            // ...and filled is capped until a whole team of the level is there.
            problem = problem.with(constraint!(
                bounds.min_members as f64 * dv.filled[p][li] <= count
            ));
        }

        // Ambitious and minimal-pass students never share an instance.
        let ambitious = grouped_level_index(AmbitionLevel::Ambitious);
        let minimal = grouped_level_index(AmbitionLevel::MinimalPass);
        problem = problem.with(constraint!(
            dv.present[p][ambitious] + dv.present[p][minimal] <= 1
        ));
    }
    problem
}

fn grouped_level_index(level: AmbitionLevel) -> usize {
    GROUPED_LEVELS
        .iter()
        .position(|l| *l == level)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{team_bounds, PreferenceRow, SolveConfig, StudentSeat, TeamSlot};
    use crate::models::Settings;

    fn fallback_input(n_students: usize, wings: usize, team_min: u32) -> AssignmentInput {
        AssignmentInput {
            students: (0..n_students)
                .map(|i| StudentSeat {
                    id: 1000 + i as i64,
                    is_wing: i < wings,
                    level: AmbitionLevel::Unspecified,
                })
                .collect(),
            slots: Vec::new(),
            answers: Vec::<PreferenceRow>::new(),
            config: SolveConfig::from_settings(&Settings {
                team_min_member: team_min,
                ..Settings::default()
            }),
        }
    }

    #[test]
    fn fallback_fills_teams_within_the_size_bounds() {
        let input = fallback_input(10, 0, 3);
        let bounds = team_bounds(10, 5, 0, 3).unwrap();
        let groups = greedy_fallback(&input, &bounds, 10, 5).unwrap();

        let used: Vec<&Vec<usize>> = groups.iter().filter(|g| !g.is_empty()).collect();
        assert_eq!(used.len(), bounds.used_instances);
        for group in &used {
            assert!(group.len() >= bounds.min_members);
            assert!(group.len() <= bounds.max_members);
        }
        let mut all: Vec<usize> = groups.iter().flatten().copied().collect();
        all.sort_unstable();
        assert_eq!(all, (0..10).collect::<Vec<_>>());
    }

    #[test]
    fn fallback_spreads_wings_evenly() {
        let input = fallback_input(9, 3, 3);
        let bounds = team_bounds(9, 3, 3, 3).unwrap();
        let groups = greedy_fallback(&input, &bounds, 9, 3).unwrap();

        for group in groups.iter().filter(|g| !g.is_empty()) {
            let wings = group.iter().filter(|&&s| s < 3).count();
            assert_eq!(wings, 1);
        }
    }

    #[test]
    fn fallback_rejects_impossible_remainders() {
        // 11 students in teams of 4 or 5 over two usable instances.
        let input = fallback_input(11, 0, 4);
        let bounds = team_bounds(11, 5, 0, 4).unwrap();
        assert!(greedy_fallback(&input, &bounds, 11, 5).is_none());
    }

    #[test]
    fn fallback_is_unavailable_for_level_aware_variants() {
        let mut input = fallback_input(6, 0, 3);
        input.config.variant = AssignmentVariant::Combined;
        let bounds = team_bounds(6, 2, 0, 3).unwrap();
        assert!(greedy_fallback(&input, &bounds, 6, 2).is_none());
    }

    #[test]
    fn preference_bound_takes_every_best_score() {
        let pair_scores = vec![vec![100, 0], vec![25, 50]];
        assert_eq!(preference_upper_bound(&pair_scores), 150.0);
        assert_eq!(preference_upper_bound(&[]), 0.0);

        let groups = vec![vec![0], vec![1]];
        assert_eq!(preference_objective(&groups, &pair_scores), 150.0);
    }
}
