//! CSV roster import.
//!
//! Consumes the group-management export: comma-separated with a header line
//! and the columns *first_name, last_name, email, study_group*. The
//! matriculation id is the part of the email before the `@`; the study
//! program is the middle group of the study-group column. Rows that do not
//! match the expected shapes are skipped silently (logged at debug level).

use std::io::Read;
use std::str::FromStr;
use std::sync::OnceLock;

use log::debug;
use regex::Regex;

use tg_core::models::StudyProgram;

use crate::store::{self, NewStudent, Store, StoreError};

/// Matriculation ids: 's' or 'gs' plus 1-9 digits, before the mail domain.
fn matriculation_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new("^g?s[0-9]{1,9}@").expect("literal pattern"))
}

/// Study groups: "21-041-01" style.
fn study_group_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new("^[0-9]{2}-[0-9]{3}-[0-9]{2}$").expect("literal pattern"))
}

/// Import behavior for rows whose matriculation id already exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportMode {
    /// Keep existing students, import only new ones.
    Add,
    /// Wipe the roster first, then import.
    New,
}

impl FromStr for ImportMode {
    type Err = String;

    fn from_str(value: &str) -> Result<ImportMode, String> {
        match value {
            "add" => Ok(ImportMode::Add),
            "new" => Ok(ImportMode::New),
            other => Err(format!("unknown import mode '{other}', use add or new")),
        }
    }
}

/// Counters of one import run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportReport {
    pub imported: usize,
    /// Invalid rows plus rows whose matriculation id already existed.
    pub skipped: usize,
}

/// Imports students from CSV data.
pub fn import_students<R: Read>(
    store: &mut Store,
    reader: R,
    mode: ImportMode,
) -> Result<ImportReport, StoreError> {
    if mode == ImportMode::New {
        store::wipe_students(store.conn())?;
    }

    let mut csv_reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(reader);

    let mut report = ImportReport::default();
    for record in csv_reader.records() {
        let record = record?;
        match parse_row(&record) {
            Some(student) => {
                if store::student_by_matriculation(store.conn(), &student.matriculation)?
                    .is_some()
                {
                    debug!("skipping existing student {}", student.matriculation);
                    report.skipped += 1;
                    continue;
                }
                store::insert_student(store.conn(), &student)?;
                report.imported += 1;
            }
            None => {
                debug!("skipping invalid roster row {record:?}");
                report.skipped += 1;
            }
        }
    }
    Ok(report)
}

fn parse_row(record: &csv::StringRecord) -> Option<NewStudent> {
    let first_name = record.get(0)?.trim();
    let last_name = record.get(1)?.trim();
    let email = record.get(2)?.trim();
    let study_group = record.get(3)?.trim();

    if first_name.is_empty() || last_name.is_empty() {
        return None;
    }
    if !matriculation_pattern().is_match(email) {
        return None;
    }
    let matriculation = email.split('@').next()?.to_string();

    if !study_group_pattern().is_match(study_group) {
        return None;
    }
    let tag = study_group.split('-').nth(1)?;
    let study_program = StudyProgram::from_tag(tag)?;

    Some(NewStudent {
        matriculation,
        first_name: first_name.to_string(),
        last_name: last_name.to_string(),
        study_program,
    })
}
