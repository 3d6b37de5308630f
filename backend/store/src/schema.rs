//! SQLite schema for the preference store.

/// Creates all tables and indexes. Idempotent.
pub const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS project (
    id            INTEGER PRIMARY KEY,
    pid           TEXT NOT NULL UNIQUE CHECK (pid GLOB '[A-Z]'),
    name          TEXT NOT NULL,
    instances     INTEGER CHECK (instances BETWEEN 1 AND 99),
    description   TEXT,
    technologies  TEXT,
    company       TEXT,
    contact       TEXT,
    url           TEXT
);

CREATE TABLE IF NOT EXISTS student (
    id             INTEGER PRIMARY KEY,
    matriculation  TEXT NOT NULL UNIQUE,
    first_name     TEXT NOT NULL,
    last_name      TEXT NOT NULL,
    study_program  TEXT NOT NULL,
    is_active      INTEGER NOT NULL DEFAULT 1
);

CREATE TABLE IF NOT EXISTS poll (
    id            INTEGER PRIMARY KEY,
    student_id    INTEGER NOT NULL UNIQUE REFERENCES student(id) ON DELETE CASCADE,
    is_generated  INTEGER NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS project_answer (
    id          INTEGER PRIMARY KEY,
    poll_id     INTEGER NOT NULL REFERENCES poll(id) ON DELETE CASCADE,
    project_id  INTEGER NOT NULL REFERENCES project(id) ON DELETE CASCADE,
    score       INTEGER NOT NULL CHECK (score BETWEEN 1 AND 5),
    UNIQUE (poll_id, project_id)
);

CREATE TABLE IF NOT EXISTS level_answer (
    id       INTEGER PRIMARY KEY,
    poll_id  INTEGER NOT NULL UNIQUE REFERENCES poll(id) ON DELETE CASCADE,
    level    INTEGER NOT NULL CHECK (level BETWEEN 1 AND 4)
);

CREATE TABLE IF NOT EXISTS project_instance (
    id          INTEGER PRIMARY KEY,
    project_id  INTEGER NOT NULL REFERENCES project(id) ON DELETE CASCADE,
    number      INTEGER NOT NULL CHECK (number >= 1),
    UNIQUE (project_id, number)
);

CREATE TABLE IF NOT EXISTS team (
    id                   INTEGER PRIMARY KEY,
    project_id           INTEGER NOT NULL REFERENCES project(id),
    project_instance_id  INTEGER NOT NULL REFERENCES project_instance(id),
    student_id           INTEGER NOT NULL UNIQUE REFERENCES student(id),
    is_initial_contact   INTEGER NOT NULL DEFAULT 0,
    score                INTEGER NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS settings (
    id                         INTEGER PRIMARY KEY CHECK (id = 1),
    projects_visible           INTEGER NOT NULL DEFAULT 0,
    poll_visible               INTEGER NOT NULL DEFAULT 0,
    poll_writable              INTEGER NOT NULL DEFAULT 0,
    teams_visible              INTEGER NOT NULL DEFAULT 0,
    team_min_member            INTEGER NOT NULL DEFAULT 6,
    project_instances_default  INTEGER NOT NULL DEFAULT 4,
    wings_hidden               INTEGER NOT NULL DEFAULT 0,
    assignment_variant         INTEGER NOT NULL DEFAULT 1,
    max_runtime_secs           INTEGER NOT NULL DEFAULT 300,
    relative_gap_limit         REAL NOT NULL DEFAULT 0.0,
    num_workers                INTEGER NOT NULL DEFAULT 0,
    random_poll_defaults       INTEGER NOT NULL DEFAULT 0,
    level_group_factor         INTEGER NOT NULL DEFAULT 25
);

CREATE TABLE IF NOT EXISTS info (
    id                 INTEGER PRIMARY KEY CHECK (id = 1),
    teams_last_update  TEXT,
    polls_last_update  TEXT,
    result_info        TEXT
);

CREATE INDEX IF NOT EXISTS idx_project_answer_poll ON project_answer(poll_id);
CREATE INDEX IF NOT EXISTS idx_team_instance ON team(project_instance_id);
"#;
