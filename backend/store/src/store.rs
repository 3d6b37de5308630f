//! Connection handling and row-level access to the preference store.
//!
//! `Store` owns the SQLite connection; the query functions below operate on
//! `&Connection` so the service layer can reuse them inside a transaction
//! (a `rusqlite::Transaction` dereferences to a connection).

use std::collections::HashMap;
use std::path::Path;

use chrono::{DateTime, Utc};
use log::debug;
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use tg_core::engine::{EngineError, PreferenceRow, TeamDraft};
use tg_core::models::{
    AmbitionLevel, AssignmentVariant, Poll, Project, ProjectAnswer, ProjectInstance, Settings,
    Student, StudyProgram, Team, INSTANCE_LIMIT,
};

use crate::schema::SCHEMA;

/// Errors raised by the preference store and the services on top of it.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error(transparent)]
    Engine(#[from] EngineError),
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    /// Deleting an entity that generated teams still reference.
    #[error("{0} is still referenced by generated teams")]
    ProtectedEntity(String),
}

/// Run bookkeeping singleton.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct Info {
    pub teams_last_update: Option<DateTime<Utc>>,
    pub polls_last_update: Option<DateTime<Utc>>,
    /// Solver statistics of the last generation run.
    pub result_info: Option<String>,
}

/// A project to insert, without the generated id.
#[derive(Debug, Clone, Default)]
pub struct NewProject {
    pub pid: String,
    pub name: String,
    pub instances: Option<u32>,
    pub description: Option<String>,
    pub technologies: Option<String>,
    pub company: Option<String>,
    pub contact: Option<String>,
    pub url: Option<String>,
}

impl NewProject {
    /// Checks the catalog invariants: the project id is a single uppercase
    /// letter A-Z and any instance override stays within 1..=99.
    pub fn validate(&self) -> Result<(), StoreError> {
        let mut chars = self.pid.chars();
        let valid_pid = matches!(
            (chars.next(), chars.next()),
            (Some('A'..='Z'), None)
        );
        if !valid_pid {
            return Err(StoreError::Engine(EngineError::InvalidConfig(format!(
                "project id must be a single uppercase letter A-Z, got '{}'",
                self.pid
            ))));
        }
        if let Some(instances) = self.instances {
            if instances < 1 || instances > INSTANCE_LIMIT {
                return Err(StoreError::Engine(EngineError::InvalidConfig(format!(
                    "project {} declares {} instances, allowed is 1..={}",
                    self.pid, instances, INSTANCE_LIMIT
                ))));
            }
        }
        Ok(())
    }
}

/// A student to insert, without the generated id.
#[derive(Debug, Clone)]
pub struct NewStudent {
    pub matriculation: String,
    pub first_name: String,
    pub last_name: String,
    pub study_program: StudyProgram,
}

/// Handle to one SQLite preference store.
pub struct Store {
    conn: Connection,
}

impl Store {
    /// Opens (and initializes, if needed) the store at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Store, StoreError> {
        let conn = Connection::open(path)?;
        Store::from_connection(conn)
    }

    /// In-memory store, used by tests and dry runs.
    pub fn open_in_memory() -> Result<Store, StoreError> {
        Store::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Store, StoreError> {
        conn.pragma_update(None, "foreign_keys", true)?;
        conn.execute_batch(SCHEMA)?;
        debug!("store opened");
        Ok(Store { conn })
    }

    /// Read access to the underlying connection.
    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Mutable access for transactions; used by the service layer.
    pub fn conn_mut(&mut self) -> &mut Connection {
        &mut self.conn
    }

    pub fn projects(&self) -> Result<Vec<Project>, StoreError> {
        projects(&self.conn)
    }

    pub fn students(&self) -> Result<Vec<Student>, StoreError> {
        students(&self.conn)
    }

    pub fn teams(&self) -> Result<Vec<Team>, StoreError> {
        teams(&self.conn)
    }

    pub fn settings(&self) -> Result<Settings, StoreError> {
        settings(&self.conn)
    }

    pub fn save_settings(&self, settings: &Settings) -> Result<(), StoreError> {
        save_settings(&self.conn, settings)
    }

    pub fn info(&self) -> Result<Info, StoreError> {
        info(&self.conn)
    }

    pub fn insert_project(&self, project: &NewProject) -> Result<i64, StoreError> {
        insert_project(&self.conn, project)
    }

    pub fn insert_student(&self, student: &NewStudent) -> Result<i64, StoreError> {
        insert_student(&self.conn, student)
    }

    /// Deletes a project; refused while teams reference it.
    pub fn delete_project(&self, project_id: i64) -> Result<(), StoreError> {
        let referenced: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM team WHERE project_id = ?1",
            params![project_id],
            |row| row.get(0),
        )?;
        if referenced > 0 {
            return Err(StoreError::ProtectedEntity(format!(
                "project {project_id}"
            )));
        }
        self.conn
            .execute("DELETE FROM project WHERE id = ?1", params![project_id])?;
        Ok(())
    }

    /// Deletes a student; refused while a team references them.
    pub fn delete_student(&self, student_id: i64) -> Result<(), StoreError> {
        let referenced: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM team WHERE student_id = ?1",
            params![student_id],
            |row| row.get(0),
        )?;
        if referenced > 0 {
            return Err(StoreError::ProtectedEntity(format!(
                "student {student_id}"
            )));
        }
        self.conn
            .execute("DELETE FROM student WHERE id = ?1", params![student_id])?;
        Ok(())
    }
}

// === row mappers ===

fn project_from_row(row: &Row<'_>) -> rusqlite::Result<Project> {
    Ok(Project {
        id: row.get(0)?,
        pid: row.get(1)?,
        name: row.get(2)?,
        instances: row.get::<_, Option<i64>>(3)?.map(|v| v as u32),
        description: row.get(4)?,
        technologies: row.get(5)?,
        company: row.get(6)?,
        contact: row.get(7)?,
        url: row.get(8)?,
    })
}

fn student_from_row(row: &Row<'_>) -> rusqlite::Result<Student> {
    let tag: String = row.get(4)?;
    let study_program = StudyProgram::from_tag(&tag).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            4,
            rusqlite::types::Type::Text,
            format!("unknown study program tag {tag}").into(),
        )
    })?;
    Ok(Student {
        id: row.get(0)?,
        matriculation: row.get(1)?,
        first_name: row.get(2)?,
        last_name: row.get(3)?,
        study_program,
        is_active: row.get(5)?,
    })
}

fn team_from_row(row: &Row<'_>) -> rusqlite::Result<Team> {
    Ok(Team {
        id: row.get(0)?,
        project_id: row.get(1)?,
        project_instance_id: row.get(2)?,
        student_id: row.get(3)?,
        is_initial_contact: row.get(4)?,
        score: row.get(5)?,
    })
}

// === projects ===

pub fn projects(conn: &Connection) -> Result<Vec<Project>, StoreError> {
    let mut stmt = conn.prepare(
        "SELECT id, pid, name, instances, description, technologies, company, contact, url
         FROM project ORDER BY pid",
    )?;
    let rows = stmt.query_map([], project_from_row)?;
    Ok(rows.collect::<rusqlite::Result<_>>()?)
}

pub fn insert_project(conn: &Connection, project: &NewProject) -> Result<i64, StoreError> {
    project.validate()?;
    conn.execute(
        "INSERT INTO project (pid, name, instances, description, technologies, company, contact, url)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            project.pid,
            project.name,
            project.instances.map(|v| v as i64),
            project.description,
            project.technologies,
            project.company,
            project.contact,
            project.url,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Summed poll score per project over all polls. Projects without answers
/// are absent from the map.
pub fn project_score_totals(conn: &Connection) -> Result<HashMap<i64, i64>, StoreError> {
    let mut stmt = conn.prepare(
        "SELECT project_id, SUM(score) FROM project_answer GROUP BY project_id",
    )?;
    let rows = stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?;
    Ok(rows.collect::<rusqlite::Result<_>>()?)
}

// === students ===

pub fn students(conn: &Connection) -> Result<Vec<Student>, StoreError> {
    let mut stmt = conn.prepare(
        "SELECT id, matriculation, first_name, last_name, study_program, is_active
         FROM student ORDER BY id",
    )?;
    let rows = stmt.query_map([], student_from_row)?;
    Ok(rows.collect::<rusqlite::Result<_>>()?)
}

pub fn insert_student(conn: &Connection, student: &NewStudent) -> Result<i64, StoreError> {
    conn.execute(
        "INSERT INTO student (matriculation, first_name, last_name, study_program)
         VALUES (?1, ?2, ?3, ?4)",
        params![
            student.matriculation,
            student.first_name,
            student.last_name,
            student.study_program.tag(),
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn student_by_matriculation(
    conn: &Connection,
    matriculation: &str,
) -> Result<Option<Student>, StoreError> {
    let student = conn
        .query_row(
            "SELECT id, matriculation, first_name, last_name, study_program, is_active
             FROM student WHERE matriculation = ?1",
            params![matriculation],
            student_from_row,
        )
        .optional()?;
    Ok(student)
}

pub fn set_student_active(
    conn: &Connection,
    student_id: i64,
    is_active: bool,
) -> Result<(), StoreError> {
    conn.execute(
        "UPDATE student SET is_active = ?2 WHERE id = ?1",
        params![student_id, is_active],
    )?;
    Ok(())
}

/// Wipes the whole roster (polls and answers cascade). Refused while teams
/// exist.
pub fn wipe_students(conn: &Connection) -> Result<(), StoreError> {
    if teams_exist(conn)? {
        return Err(StoreError::ProtectedEntity("the student roster".into()));
    }
    conn.execute("DELETE FROM student", [])?;
    Ok(())
}

// === polls and answers ===

pub fn polls(conn: &Connection) -> Result<Vec<Poll>, StoreError> {
    let mut stmt = conn.prepare("SELECT id, student_id, is_generated FROM poll ORDER BY id")?;
    let rows = stmt.query_map([], |row| {
        Ok(Poll {
            id: row.get(0)?,
            student_id: row.get(1)?,
            is_generated: row.get(2)?,
        })
    })?;
    Ok(rows.collect::<rusqlite::Result<_>>()?)
}

pub fn poll_count(conn: &Connection) -> Result<i64, StoreError> {
    Ok(conn.query_row("SELECT COUNT(*) FROM poll", [], |row| row.get(0))?)
}

pub fn generated_poll_count(conn: &Connection) -> Result<i64, StoreError> {
    Ok(conn.query_row(
        "SELECT COUNT(*) FROM poll WHERE is_generated = 1",
        [],
        |row| row.get(0),
    )?)
}

pub fn project_answer_count(conn: &Connection) -> Result<i64, StoreError> {
    Ok(conn.query_row("SELECT COUNT(*) FROM project_answer", [], |row| row.get(0))?)
}

/// Creates the poll for a student or flips its `is_generated` flag; returns
/// the poll id either way.
pub fn upsert_poll(
    conn: &Connection,
    student_id: i64,
    is_generated: bool,
) -> Result<i64, StoreError> {
    conn.execute(
        "INSERT INTO poll (student_id, is_generated) VALUES (?1, ?2)
         ON CONFLICT(student_id) DO UPDATE SET is_generated = excluded.is_generated",
        params![student_id, is_generated],
    )?;
    let id = conn.query_row(
        "SELECT id FROM poll WHERE student_id = ?1",
        params![student_id],
        |row| row.get(0),
    )?;
    Ok(id)
}

/// Ids of students that have not submitted (or been given) a poll yet.
pub fn students_without_poll(conn: &Connection) -> Result<Vec<i64>, StoreError> {
    let mut stmt = conn.prepare(
        "SELECT s.id FROM student s LEFT JOIN poll p ON p.student_id = s.id
         WHERE p.id IS NULL ORDER BY s.id",
    )?;
    let rows = stmt.query_map([], |row| row.get(0))?;
    Ok(rows.collect::<rusqlite::Result<_>>()?)
}

/// Ids of projects no poll has answered yet.
pub fn projects_without_answers(conn: &Connection) -> Result<Vec<i64>, StoreError> {
    let mut stmt = conn.prepare(
        "SELECT pr.id FROM project pr LEFT JOIN project_answer pa ON pa.project_id = pr.id
         WHERE pa.id IS NULL ORDER BY pr.id",
    )?;
    let rows = stmt.query_map([], |row| row.get(0))?;
    Ok(rows.collect::<rusqlite::Result<_>>()?)
}

pub fn upsert_project_answer(
    conn: &Connection,
    poll_id: i64,
    project_id: i64,
    score: i64,
) -> Result<(), StoreError> {
    conn.execute(
        "INSERT INTO project_answer (poll_id, project_id, score) VALUES (?1, ?2, ?3)
         ON CONFLICT(poll_id, project_id) DO UPDATE SET score = excluded.score",
        params![poll_id, project_id, score],
    )?;
    Ok(())
}

pub fn upsert_level_answer(
    conn: &Connection,
    poll_id: i64,
    level: AmbitionLevel,
) -> Result<(), StoreError> {
    conn.execute(
        "INSERT INTO level_answer (poll_id, level) VALUES (?1, ?2)
         ON CONFLICT(poll_id) DO UPDATE SET level = excluded.level",
        params![poll_id, level.value()],
    )?;
    Ok(())
}

pub fn answers_for_poll(conn: &Connection, poll_id: i64) -> Result<Vec<ProjectAnswer>, StoreError> {
    let mut stmt = conn.prepare(
        "SELECT id, poll_id, project_id, score FROM project_answer
         WHERE poll_id = ?1 ORDER BY project_id",
    )?;
    let rows = stmt.query_map(params![poll_id], |row| {
        Ok(ProjectAnswer {
            id: row.get(0)?,
            poll_id: row.get(1)?,
            project_id: row.get(2)?,
            score: row.get(3)?,
        })
    })?;
    Ok(rows.collect::<rusqlite::Result<_>>()?)
}

/// All project answers joined to their students, ready for the engine.
pub fn preference_rows(conn: &Connection) -> Result<Vec<PreferenceRow>, StoreError> {
    let mut stmt = conn.prepare(
        "SELECT p.student_id, pa.project_id, pa.score
         FROM project_answer pa JOIN poll p ON pa.poll_id = p.id
         ORDER BY p.student_id, pa.project_id",
    )?;
    let rows = stmt.query_map([], |row| {
        Ok(PreferenceRow {
            student_id: row.get(0)?,
            project_id: row.get(1)?,
            score: row.get(2)?,
        })
    })?;
    Ok(rows.collect::<rusqlite::Result<_>>()?)
}

/// Ambition level per student id, for students whose poll has one.
pub fn levels_by_student(conn: &Connection) -> Result<HashMap<i64, AmbitionLevel>, StoreError> {
    let mut stmt = conn.prepare(
        "SELECT p.student_id, la.level
         FROM level_answer la JOIN poll p ON la.poll_id = p.id",
    )?;
    let rows = stmt.query_map([], |row| {
        Ok((row.get::<_, i64>(0)?, row.get::<_, i64>(1)?))
    })?;
    let mut levels = HashMap::new();
    for row in rows {
        let (student_id, value) = row?;
        levels.insert(
            student_id,
            AmbitionLevel::from_value(value).unwrap_or_default(),
        );
    }
    Ok(levels)
}

/// Raw scores per student over all projects, for the happiness stats.
pub fn scores_by_student(conn: &Connection) -> Result<HashMap<i64, Vec<i64>>, StoreError> {
    let mut scores: HashMap<i64, Vec<i64>> = HashMap::new();
    for row in preference_rows(conn)? {
        scores.entry(row.student_id).or_default().push(row.score);
    }
    Ok(scores)
}

/// Score a student gave one project, if answered.
pub fn score_for(
    conn: &Connection,
    student_id: i64,
    project_id: i64,
) -> Result<Option<i64>, StoreError> {
    let score = conn
        .query_row(
            "SELECT pa.score FROM project_answer pa JOIN poll p ON pa.poll_id = p.id
             WHERE p.student_id = ?1 AND pa.project_id = ?2",
            params![student_id, project_id],
            |row| row.get(0),
        )
        .optional()?;
    Ok(score)
}

// === instances and teams ===

pub fn instances(conn: &Connection) -> Result<Vec<ProjectInstance>, StoreError> {
    let mut stmt = conn.prepare(
        "SELECT id, project_id, number FROM project_instance ORDER BY id",
    )?;
    let rows = stmt.query_map([], |row| {
        Ok(ProjectInstance {
            id: row.get(0)?,
            project_id: row.get(1)?,
            number: row.get::<_, i64>(2)? as u32,
        })
    })?;
    Ok(rows.collect::<rusqlite::Result<_>>()?)
}

pub fn insert_instance(
    conn: &Connection,
    project_id: i64,
    number: u32,
) -> Result<i64, StoreError> {
    conn.execute(
        "INSERT INTO project_instance (project_id, number) VALUES (?1, ?2)",
        params![project_id, number as i64],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn delete_all_instances(conn: &Connection) -> Result<(), StoreError> {
    conn.execute("DELETE FROM project_instance", [])?;
    Ok(())
}

pub fn teams(conn: &Connection) -> Result<Vec<Team>, StoreError> {
    let mut stmt = conn.prepare(
        "SELECT id, project_id, project_instance_id, student_id, is_initial_contact, score
         FROM team ORDER BY project_id, project_instance_id, student_id",
    )?;
    let rows = stmt.query_map([], team_from_row)?;
    Ok(rows.collect::<rusqlite::Result<_>>()?)
}

pub fn teams_exist(conn: &Connection) -> Result<bool, StoreError> {
    let count: i64 = conn.query_row("SELECT COUNT(*) FROM team", [], |row| row.get(0))?;
    Ok(count > 0)
}

pub fn delete_all_teams(conn: &Connection) -> Result<(), StoreError> {
    conn.execute("DELETE FROM team", [])?;
    Ok(())
}

/// Bulk insert of the extractor's team rows.
pub fn insert_teams(conn: &Connection, drafts: &[TeamDraft]) -> Result<(), StoreError> {
    let mut stmt = conn.prepare(
        "INSERT INTO team (project_id, project_instance_id, student_id, is_initial_contact, score)
         VALUES (?1, ?2, ?3, ?4, ?5)",
    )?;
    for draft in drafts {
        stmt.execute(params![
            draft.project_id,
            draft.project_instance_id,
            draft.student_id,
            draft.is_initial_contact,
            draft.score,
        ])?;
    }
    Ok(())
}

// === singletons ===

pub fn settings(conn: &Connection) -> Result<Settings, StoreError> {
    ensure_singletons(conn)?;
    let settings = conn.query_row(
        "SELECT projects_visible, poll_visible, poll_writable, teams_visible,
                team_min_member, project_instances_default, wings_hidden,
                assignment_variant, max_runtime_secs, relative_gap_limit,
                num_workers, random_poll_defaults, level_group_factor
         FROM settings WHERE id = 1",
        [],
        |row| {
            Ok(Settings {
                projects_visible: row.get(0)?,
                poll_visible: row.get(1)?,
                poll_writable: row.get(2)?,
                teams_visible: row.get(3)?,
                team_min_member: row.get::<_, i64>(4)? as u32,
                project_instances_default: row.get::<_, i64>(5)? as u32,
                wings_hidden: row.get(6)?,
                assignment_variant: AssignmentVariant::from_value(row.get::<_, i64>(7)?)
                    .unwrap_or_default(),
                max_runtime_secs: row.get::<_, i64>(8)? as u32,
                relative_gap_limit: row.get(9)?,
                num_workers: row.get::<_, i64>(10)? as u32,
                random_poll_defaults: row.get(11)?,
                level_group_factor: row.get(12)?,
            })
        },
    )?;
    Ok(settings)
}

pub fn save_settings(conn: &Connection, settings: &Settings) -> Result<(), StoreError> {
    settings
        .validate()
        .map_err(EngineError::InvalidConfig)
        .map_err(StoreError::Engine)?;
    ensure_singletons(conn)?;
    conn.execute(
        "UPDATE settings SET
            projects_visible = ?1, poll_visible = ?2, poll_writable = ?3,
            teams_visible = ?4, team_min_member = ?5, project_instances_default = ?6,
            wings_hidden = ?7, assignment_variant = ?8, max_runtime_secs = ?9,
            relative_gap_limit = ?10, num_workers = ?11, random_poll_defaults = ?12,
            level_group_factor = ?13
         WHERE id = 1",
        params![
            settings.projects_visible,
            settings.poll_visible,
            settings.poll_writable,
            settings.teams_visible,
            settings.team_min_member as i64,
            settings.project_instances_default as i64,
            settings.wings_hidden,
            settings.assignment_variant.value(),
            settings.max_runtime_secs as i64,
            settings.relative_gap_limit,
            settings.num_workers as i64,
            settings.random_poll_defaults,
            settings.level_group_factor,
        ],
    )?;
    Ok(())
}

pub fn info(conn: &Connection) -> Result<Info, StoreError> {
    ensure_singletons(conn)?;
    let (teams_raw, polls_raw, result_info) = conn.query_row(
        "SELECT teams_last_update, polls_last_update, result_info FROM info WHERE id = 1",
        [],
        |row| {
            Ok((
                row.get::<_, Option<String>>(0)?,
                row.get::<_, Option<String>>(1)?,
                row.get::<_, Option<String>>(2)?,
            ))
        },
    )?;
    Ok(Info {
        teams_last_update: teams_raw.as_deref().and_then(parse_timestamp),
        polls_last_update: polls_raw.as_deref().and_then(parse_timestamp),
        result_info,
    })
}

pub fn set_teams_last_update(conn: &Connection, when: DateTime<Utc>) -> Result<(), StoreError> {
    ensure_singletons(conn)?;
    conn.execute(
        "UPDATE info SET teams_last_update = ?1 WHERE id = 1",
        params![when.to_rfc3339()],
    )?;
    Ok(())
}

pub fn set_polls_last_update(conn: &Connection, when: DateTime<Utc>) -> Result<(), StoreError> {
    ensure_singletons(conn)?;
    conn.execute(
        "UPDATE info SET polls_last_update = ?1 WHERE id = 1",
        params![when.to_rfc3339()],
    )?;
    Ok(())
}

pub fn set_result_info(conn: &Connection, text: &str) -> Result<(), StoreError> {
    ensure_singletons(conn)?;
    conn.execute(
        "UPDATE info SET result_info = ?1 WHERE id = 1",
        params![text],
    )?;
    Ok(())
}

fn ensure_singletons(conn: &Connection) -> Result<(), StoreError> {
    conn.execute("INSERT OR IGNORE INTO settings (id) VALUES (1)", [])?;
    conn.execute("INSERT OR IGNORE INTO info (id) VALUES (1)", [])?;
    Ok(())
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}
