//! Read-only view assembly for teams and the overview page.
//!
//! The views are plain serializable records: rosters grouped per project
//! instance with per-member visibility and semantic display hints, plus the
//! happiness aggregates the pages render. Styling stays semantic: the
//! frontend maps the hints to its own classes.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use tg_core::happiness::{happiness, mean_happiness, Happiness, HappinessBand, PollStats};
use tg_core::models::{Settings, SCORE_DEFAULT};

use crate::store::{self, Store, StoreError};

/// Semantic display hint for one team member line.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayHint {
    /// Bold: the team's initial contact.
    InitialContact,
    /// Struck through: not shown to students.
    Hidden,
    /// Danger color: no longer participating.
    Inactive,
    /// Muted color: hidden for display-only reasons.
    Muted,
}

impl DisplayHint {
    /// The CSS class the web frontend uses for this hint.
    pub fn css_class(self) -> &'static str {
        match self {
            DisplayHint::InitialContact => "fw-semibold",
            DisplayHint::Hidden => "text-decoration-line-through",
            DisplayHint::Inactive => "text-danger",
            DisplayHint::Muted => "text-secondary",
        }
    }
}

/// One student line in a team roster.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct MemberView {
    pub name: String,
    pub matriculation: String,
    pub study_program_short: String,
    pub is_initial_contact: bool,
    pub is_wing: bool,
    pub is_active: bool,
    /// False for inactive students and, when configured, wings.
    pub is_visible: bool,
    /// Normalized solver score for this pair.
    pub score: i64,
    pub stats: PollStats,
    pub happiness: Happiness,
    pub band: HappinessBand,
    pub hints: Vec<DisplayHint>,
}

/// Happiness aggregate with its display band.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct HappinessSummary {
    pub happiness: Happiness,
    pub band: HappinessBand,
    /// "{icon} {project} ({poll})" line for compact displays.
    pub summary: String,
}

impl HappinessSummary {
    fn from_values(values: &[Happiness]) -> HappinessSummary {
        let mean = mean_happiness(values);
        let band = HappinessBand::from_score(mean.project);
        HappinessSummary {
            summary: format!("{} {} ({})", band.icon(), mean.project, mean.poll),
            happiness: mean,
            band,
        }
    }
}

/// One project instance with its roster.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct TeamView {
    pub pid: String,
    pub project_name: String,
    pub instance_number: u32,
    /// "A1: Name" style heading.
    pub heading: String,
    pub members: Vec<MemberView>,
    pub visible_count: usize,
    pub happiness: HappinessSummary,
}

/// All teams plus the overall happiness summary.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct TeamsView {
    pub teams: Vec<TeamView>,
    pub happiness: HappinessSummary,
}

/// Assembles the team rosters for display.
pub fn teams_view(store: &Store) -> Result<TeamsView, StoreError> {
    let conn = store.conn();
    let settings = store.settings()?;
    let students: HashMap<i64, _> = store::students(conn)?
        .into_iter()
        .map(|s| (s.id, s))
        .collect();
    let projects: HashMap<i64, _> = store::projects(conn)?
        .into_iter()
        .map(|p| (p.id, p))
        .collect();
    let instances: HashMap<i64, _> = store::instances(conn)?
        .into_iter()
        .map(|i| (i.id, i))
        .collect();
    let scores = store::scores_by_student(conn)?;

    let mut per_instance: Vec<(i64, Vec<tg_core::models::Team>)> = Vec::new();
    for team in store::teams(conn)? {
        match per_instance.last_mut() {
            Some((instance_id, group)) if *instance_id == team.project_instance_id => {
                group.push(team)
            }
            _ => per_instance.push((team.project_instance_id, vec![team])),
        }
    }

    let mut teams = Vec::new();
    let mut all_happiness = Vec::new();
    for (instance_id, rows) in per_instance {
        let Some(instance) = instances.get(&instance_id) else {
            continue;
        };
        let Some(project) = projects.get(&instance.project_id) else {
            continue;
        };

        let mut members = Vec::new();
        let mut team_happiness = Vec::new();
        for row in rows {
            let Some(student) = students.get(&row.student_id) else {
                continue;
            };
            let chosen = store::score_for(conn, row.student_id, row.project_id)?
                .unwrap_or(SCORE_DEFAULT);
            let answers = scores.get(&row.student_id).cloned().unwrap_or_default();
            let stats = PollStats::from_answers(chosen, &answers);
            let member_happiness = happiness(chosen, stats.max);
            team_happiness.push(member_happiness);
            all_happiness.push(member_happiness);

            members.push(build_member(
                student,
                &row,
                &settings,
                stats,
                member_happiness,
            ));
        }

        let visible_count = members.iter().filter(|m| m.is_visible).count();
        teams.push(TeamView {
            pid: project.pid.clone(),
            project_name: project.name.clone(),
            instance_number: instance.number,
            heading: format!("{}{} — {}", project.pid, instance.number, project.name),
            members,
            visible_count,
            happiness: HappinessSummary::from_values(&team_happiness),
        });
    }

    Ok(TeamsView {
        happiness: HappinessSummary::from_values(&all_happiness),
        teams,
    })
}

fn build_member(
    student: &tg_core::models::Student,
    row: &tg_core::models::Team,
    settings: &Settings,
    stats: PollStats,
    member_happiness: Happiness,
) -> MemberView {
    let is_wing = student.is_wing();
    let is_visible = student.is_active && !(is_wing && settings.wings_hidden);

    let mut hints = Vec::new();
    if row.is_initial_contact {
        hints.push(DisplayHint::InitialContact);
    }
    if !is_visible {
        hints.push(DisplayHint::Hidden);
    }
    if !student.is_active {
        hints.push(DisplayHint::Inactive);
    } else if !is_visible {
        hints.push(DisplayHint::Muted);
    }

    MemberView {
        name: student.name(),
        matriculation: student.matriculation.clone(),
        study_program_short: student.study_program.short().to_string(),
        is_initial_contact: row.is_initial_contact,
        is_wing,
        is_active: student.is_active,
        is_visible,
        score: row.score,
        band: HappinessBand::from_score(member_happiness.project),
        stats,
        happiness: member_happiness,
        hints,
    }
}

/// Poll fill counters for one category.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct PollCount {
    pub count: i64,
    pub percent: f64,
}

/// Per-project usage line in the overview, ordered by total score.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ProjectUsage {
    pub pid: String,
    pub name: String,
    pub total_score: i64,
    pub instances: usize,
    pub instances_used: usize,
}

/// Administrative overview counters.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Overview {
    pub projects: usize,
    pub project_instances: usize,
    pub students: usize,
    pub students_inactive: usize,
    /// Number of non-empty project instances.
    pub teams: usize,
    pub polls: PollCount,
    pub polls_submitted: PollCount,
    pub polls_generated: PollCount,
    pub polls_empty: PollCount,
    pub projects_by_score: Vec<ProjectUsage>,
}

/// Assembles the overview counters.
pub fn overview(store: &Store) -> Result<Overview, StoreError> {
    let conn = store.conn();
    let students = store::students(conn)?;
    let projects = store::projects(conn)?;
    let instances = store::instances(conn)?;
    let teams = store::teams(conn)?;

    let student_count = students.len() as i64;
    let poll_count = store::poll_count(conn)?;
    let generated = store::generated_poll_count(conn)?;
    let submitted = poll_count - generated;
    let empty = student_count - poll_count;
    let percent = |count: i64| -> f64 {
        if student_count == 0 {
            return 0.0;
        }
        let pct = 100.0 * count as f64 / student_count as f64;
        (pct * 100.0).round() / 100.0
    };

    let mut used_instances: Vec<i64> = teams.iter().map(|t| t.project_instance_id).collect();
    used_instances.sort_unstable();
    used_instances.dedup();

    let totals = store::project_score_totals(conn)?;
    let mut projects_by_score: Vec<ProjectUsage> = projects
        .iter()
        .map(|project| {
            let project_instances: Vec<_> = instances
                .iter()
                .filter(|i| i.project_id == project.id)
                .collect();
            let instances_used = project_instances
                .iter()
                .filter(|i| used_instances.binary_search(&i.id).is_ok())
                .count();
            ProjectUsage {
                pid: project.pid.clone(),
                name: project.name.clone(),
                total_score: totals.get(&project.id).copied().unwrap_or(0),
                instances: project_instances.len(),
                instances_used,
            }
        })
        .collect();
    projects_by_score.sort_by(|a, b| b.total_score.cmp(&a.total_score).then(a.pid.cmp(&b.pid)));

    Ok(Overview {
        projects: projects.len(),
        project_instances: instances.len(),
        students: students.len(),
        students_inactive: students.iter().filter(|s| !s.is_active).count(),
        teams: used_instances.len(),
        polls: PollCount {
            count: poll_count,
            percent: percent(poll_count),
        },
        polls_submitted: PollCount {
            count: submitted,
            percent: percent(submitted),
        },
        polls_generated: PollCount {
            count: generated,
            percent: percent(generated),
        },
        polls_empty: PollCount {
            count: empty,
            percent: percent(empty),
        },
        projects_by_score,
    })
}
