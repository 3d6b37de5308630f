//! Project instance expansion planning.
//!
//! Before a solve, every project is expanded into a fixed number of
//! instances (team slots). The plan orders projects by their total poll
//! score, descending, so better-liked projects come first in the solver's
//! slot ordering; projects with the same total are shuffled to break ties
//! fairly between runs.

use std::collections::HashMap;

use rand::seq::SliceRandom;
use rand::Rng;

use crate::engine::EngineError;
use crate::models::{Project, INSTANCE_LIMIT};

/// How many instances one project expands into.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstancePlan {
    pub project_id: i64,
    /// Instance count, 1..=99. Instances are numbered `1..=instances`.
    pub instances: u32,
}

/// Plans the expansion for the whole catalog.
///
/// `score_totals` maps project ids to the summed poll score over all polls;
/// projects without answers count as zero. Each project expands to its own
/// `instances` override or `default_instances`.
pub fn plan_instances<R: Rng>(
    projects: &[Project],
    score_totals: &HashMap<i64, i64>,
    default_instances: u32,
    rng: &mut R,
) -> Result<Vec<InstancePlan>, EngineError> {
    // Group project ids per total score.
    let mut by_score: Vec<(i64, Vec<&Project>)> = Vec::new();
    let mut ordered: Vec<&Project> = projects.iter().collect();
    ordered.sort_by_key(|p| std::cmp::Reverse(score_totals.get(&p.id).copied().unwrap_or(0)));
    for project in ordered {
        let total = score_totals.get(&project.id).copied().unwrap_or(0);
        match by_score.last_mut() {
            Some((score, group)) if *score == total => group.push(project),
            _ => by_score.push((total, vec![project])),
        }
    }

    // Shuffle inside equal-score groups only; the descending order stands.
    let mut plan = Vec::with_capacity(projects.len());
    for (_, mut group) in by_score {
        if group.len() > 1 {
            group.shuffle(rng);
        }
        for project in group {
            let instances = project.instances.unwrap_or(default_instances);
            if instances < 1 || instances > INSTANCE_LIMIT {
                return Err(EngineError::InvalidConfig(format!(
                    "project {} expands to {} instances, allowed is 1..={}",
                    project.pid, instances, INSTANCE_LIMIT
                )));
            }
            plan.push(InstancePlan {
                project_id: project.id,
                instances,
            });
        }
    }

    Ok(plan)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn project(id: i64, pid: &str, instances: Option<u32>) -> Project {
        Project {
            id,
            pid: pid.to_string(),
            name: format!("Project {pid}"),
            instances,
            description: None,
            technologies: None,
            company: None,
            contact: None,
            url: None,
        }
    }

    #[test]
    fn orders_by_total_score_descending() {
        let projects = vec![
            project(1, "A", None),
            project(2, "B", None),
            project(3, "C", None),
        ];
        let totals = HashMap::from([(1, 10), (2, 30), (3, 20)]);
        let mut rng = ChaCha8Rng::seed_from_u64(1);

        let plan = plan_instances(&projects, &totals, 2, &mut rng).unwrap();
        let ids: Vec<i64> = plan.iter().map(|p| p.project_id).collect();
        assert_eq!(ids, vec![2, 3, 1]);
        assert!(plan.iter().all(|p| p.instances == 2));
    }

    #[test]
    fn override_beats_the_default() {
        let projects = vec![project(1, "A", Some(5)), project(2, "B", None)];
        let totals = HashMap::from([(1, 1), (2, 0)]);
        let mut rng = ChaCha8Rng::seed_from_u64(1);

        let plan = plan_instances(&projects, &totals, 3, &mut rng).unwrap();
        assert_eq!(plan[0].instances, 5);
        assert_eq!(plan[1].instances, 3);
    }

    #[test]
    fn ties_are_shuffled_but_groups_stay_ordered() {
        let projects: Vec<Project> = (1..=6).map(|i| project(i, "X", None)).collect();
        // Projects 1-5 tie, project 6 wins.
        let mut totals: HashMap<i64, i64> = (1..=5).map(|i| (i, 10)).collect();
        totals.insert(6, 99);

        let mut rng = ChaCha8Rng::seed_from_u64(42);
        let plan = plan_instances(&projects, &totals, 1, &mut rng).unwrap();
        assert_eq!(plan[0].project_id, 6);

        let tied: Vec<i64> = plan[1..].iter().map(|p| p.project_id).collect();
        let mut sorted = tied.clone();
        sorted.sort_unstable();
        assert_eq!(sorted, vec![1, 2, 3, 4, 5]);

        // A different seed yields a different tie order eventually.
        let mut other_order = false;
        for seed in 0..20 {
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            let other = plan_instances(&projects, &totals, 1, &mut rng).unwrap();
            let other_tied: Vec<i64> = other[1..].iter().map(|p| p.project_id).collect();
            if other_tied != tied {
                other_order = true;
                break;
            }
        }
        assert!(other_order, "tie shuffling never changed the order");
    }

    #[test]
    fn zero_instances_are_rejected() {
        let projects = vec![project(1, "A", Some(0))];
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let err = plan_instances(&projects, &HashMap::new(), 2, &mut rng).unwrap_err();
        assert!(matches!(err, EngineError::InvalidConfig(_)));
    }
}
