//! Engine orchestration around the preference store.
//!
//! The services here implement the engine API the surrounding application
//! consumes: default-poll generation, poll submission, and the atomic team
//! regeneration cycle *(delete teams, delete instances, re-expand, solve,
//! insert teams, update info)*. The cycle runs inside one transaction and
//! under the process-wide run guard, so a second caller gets a busy error
//! instead of interleaving.

use chrono::Utc;
use log::{debug, info};
use rand::Rng;
use rusqlite::Connection;

use tg_core::engine::{
    solve_assignment, AssignmentInput, RunGuard, SolveConfig, StudentSeat, TeamSlot,
};
use tg_core::expand::plan_instances;
use tg_core::models::SCORE_DEFAULT;
use tg_core::score::{generated_level, generated_score};

use crate::store::{self, Store, StoreError};

pub use tg_core::engine::is_running;

/// Fills the preference matrix for everyone who has not answered.
///
/// Students without a poll get one with `is_generated = true`, an answer for
/// every project and a generated level answer; projects nobody has answered
/// get an answer on every existing poll. Scores are neutral, or sampled when
/// the random-defaults knob is set. Running this twice is equivalent to
/// running it once.
pub fn generate_poll_defaults<R: Rng>(store: &mut Store, rng: &mut R) -> Result<(), StoreError> {
    let settings = store.settings()?;
    let randomized = settings.random_poll_defaults;

    let tx = store.conn_mut().transaction()?;
    {
        let conn: &Connection = &tx;
        let projects = store::projects(conn)?;

        // Snapshot both gaps before filling either, so a new project still
        // reaches the polls that existed before this run.
        let missing_students = store::students_without_poll(conn)?;
        let missing_projects = store::projects_without_answers(conn)?;
        let existing_polls = store::polls(conn)?;

        debug!(
            "generating polls for {} students without one",
            missing_students.len()
        );
        for student_id in missing_students {
            let poll_id = store::upsert_poll(conn, student_id, true)?;
            for project in &projects {
                store::upsert_project_answer(
                    conn,
                    poll_id,
                    project.id,
                    generated_score(randomized, rng),
                )?;
            }
            store::upsert_level_answer(conn, poll_id, generated_level(randomized, rng))?;
        }

        for project_id in missing_projects {
            for poll in &existing_polls {
                store::upsert_project_answer(
                    conn,
                    poll.id,
                    project_id,
                    generated_score(randomized, rng),
                )?;
            }
        }
    }
    tx.commit()?;
    Ok(())
}

/// Saves one student's submitted poll.
///
/// `scores` holds (project_id, score) pairs from the form; projects without
/// a posted value fall back to the neutral default so the (poll, project)
/// matrix stays dense. The poll is marked as submitted and the poll update
/// timestamp is bumped.
pub fn save_poll(
    store: &mut Store,
    student_id: i64,
    scores: &[(i64, i64)],
    level: Option<tg_core::models::AmbitionLevel>,
) -> Result<(), StoreError> {
    let tx = store.conn_mut().transaction()?;
    {
        let conn: &Connection = &tx;
        let projects = store::projects(conn)?;
        let poll_id = store::upsert_poll(conn, student_id, false)?;
        for project in &projects {
            let score = scores
                .iter()
                .find(|(project_id, _)| *project_id == project.id)
                .map(|(_, score)| *score)
                .unwrap_or(SCORE_DEFAULT);
            store::upsert_project_answer(conn, poll_id, project.id, score)?;
        }
        if let Some(level) = level {
            store::upsert_level_answer(conn, poll_id, level)?;
        }
        store::set_polls_last_update(conn, Utc::now())?;
    }
    tx.commit()?;
    Ok(())
}

/// Drops and recreates all project instances.
///
/// Projects are expanded to their own instance-count override or the given
/// default, ordered by total poll score with ties shuffled. Refused with an
/// invalid-config error while teams still reference instances.
pub fn expand_instances<R: Rng>(
    conn: &Connection,
    default_instances: u32,
    rng: &mut R,
) -> Result<Vec<TeamSlot>, StoreError> {
    if store::teams_exist(conn)? {
        return Err(StoreError::Engine(
            tg_core::engine::EngineError::InvalidConfig(
                "cannot expand project instances while teams exist".into(),
            ),
        ));
    }
    store::delete_all_instances(conn)?;

    let projects = store::projects(conn)?;
    let totals = store::project_score_totals(conn)?;
    let plan = plan_instances(&projects, &totals, default_instances, rng)?;

    let mut slots = Vec::new();
    for entry in &plan {
        for number in 1..=entry.instances {
            let id = store::insert_instance(conn, entry.project_id, number)?;
            slots.push(TeamSlot {
                id,
                project_id: entry.project_id,
                number,
            });
        }
    }
    Ok(slots)
}

/// Regenerates all teams from the current preference data.
///
/// Returns `Ok(false)` with no side effect when there are no polls or no
/// project answers yet. Otherwise performs the atomic regeneration cycle
/// and returns `Ok(true)`. Refuses reentrant calls with the engine's
/// busy error; solver failures surface as `Unsolvable` and roll the
/// transaction back, leaving the previous teams untouched.
pub fn generate_teams<R: Rng>(store: &mut Store, rng: &mut R) -> Result<bool, StoreError> {
    let _guard = RunGuard::acquire()?;

    let settings = store.settings()?;
    settings
        .validate()
        .map_err(tg_core::engine::EngineError::InvalidConfig)?;

    if store::poll_count(store.conn())? == 0 || store::project_answer_count(store.conn())? == 0 {
        debug!("no polls or answers yet, skipping regeneration");
        return Ok(false);
    }

    let config = SolveConfig::from_settings(&settings);
    let tx = store.conn_mut().transaction()?;
    let stats_summary;
    {
        let conn: &Connection = &tx;

        store::delete_all_teams(conn)?;
        let slots = expand_instances(conn, settings.project_instances_default, rng)?;

        // Snapshot the roster and preferences.
        let levels = store::levels_by_student(conn)?;
        let students = store::students(conn)?
            .into_iter()
            .map(|student| StudentSeat {
                id: student.id,
                is_wing: student.is_wing(),
                level: levels.get(&student.id).copied().unwrap_or_default(),
            })
            .collect();
        let answers = store::preference_rows(conn)?;

        let input = AssignmentInput {
            students,
            slots,
            answers,
            config,
        };
        let solution = solve_assignment(&input, rng)?;

        store::insert_teams(conn, &solution.teams)?;
        store::set_teams_last_update(conn, Utc::now())?;
        stats_summary = solution.stats.summary();
        store::set_result_info(conn, &stats_summary)?;
    }
    tx.commit()?;

    info!("teams regenerated: {stats_summary}");
    Ok(true)
}
