//! Domain model and types for the TeamGen engine.
//!
//! This module contains the persisted entities (projects, students, polls and
//! their answers, project instances, teams), the process-wide settings record,
//! and the small closed enums the engine dispatches on. All types are
//! serializable so the surrounding adapters (store, CLI, JSON output) can pass
//! them around without bespoke conversion layers.

use serde::{Deserialize, Serialize};

/// Lowest score a student can give a project in the poll.
pub const SCORE_MIN: i64 = 1;
/// Highest score a student can give a project in the poll.
pub const SCORE_MAX: i64 = 5;
/// Neutral score used for generated answers and missing posted values.
pub const SCORE_DEFAULT: i64 = 3;

/// Upper bound for per-project instance counts and the team-size minimum.
pub const INSTANCE_LIMIT: u32 = 99;

/// Closed set of study programs students can be enrolled in.
///
/// The numeric tags come from the roster export format (the middle group of
/// the study-group column). `IndustrialEngineering` is the "wing" program:
/// its students drive the dedicated dispersion constraint and can optionally
/// be hidden in team displays.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StudyProgram {
    /// Computer science ("041" / AI)
    ComputerScience,
    /// Business informatics ("042" / WI)
    BusinessInformatics,
    /// Administrative informatics ("048" / VI)
    AdministrativeInformatics,
    /// Industrial engineering ("072" / WIng): the wing program
    IndustrialEngineering,
}

impl StudyProgram {
    /// All programs, in tag order.
    pub const ALL: [StudyProgram; 4] = [
        StudyProgram::ComputerScience,
        StudyProgram::BusinessInformatics,
        StudyProgram::AdministrativeInformatics,
        StudyProgram::IndustrialEngineering,
    ];

    /// The three-digit roster tag for this program.
    pub fn tag(self) -> &'static str {
        match self {
            StudyProgram::ComputerScience => "041",
            StudyProgram::BusinessInformatics => "042",
            StudyProgram::AdministrativeInformatics => "048",
            StudyProgram::IndustrialEngineering => "072",
        }
    }

    /// Short display label.
    pub fn short(self) -> &'static str {
        match self {
            StudyProgram::ComputerScience => "AI",
            StudyProgram::BusinessInformatics => "WI",
            StudyProgram::AdministrativeInformatics => "VI",
            StudyProgram::IndustrialEngineering => "WIng",
        }
    }

    /// Looks a program up by its three-digit roster tag.
    pub fn from_tag(tag: &str) -> Option<StudyProgram> {
        StudyProgram::ALL.iter().copied().find(|p| p.tag() == tag)
    }

    /// True for the program whose students carry the wing flag.
    pub fn is_wing(self) -> bool {
        self == StudyProgram::IndustrialEngineering
    }
}

/// Self-reported ambition level from the poll, 1..=4.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AmbitionLevel {
    /// No answer given (1)
    Unspecified,
    /// Wants to go beyond the course requirements (2)
    Ambitious,
    /// Wants a solid understanding (3)
    Solid,
    /// Just wants to pass (4)
    MinimalPass,
}

impl AmbitionLevel {
    /// The persisted integer value, 1..=4.
    pub fn value(self) -> i64 {
        match self {
            AmbitionLevel::Unspecified => 1,
            AmbitionLevel::Ambitious => 2,
            AmbitionLevel::Solid => 3,
            AmbitionLevel::MinimalPass => 4,
        }
    }

    /// Parses the persisted integer value.
    pub fn from_value(value: i64) -> Option<AmbitionLevel> {
        match value {
            1 => Some(AmbitionLevel::Unspecified),
            2 => Some(AmbitionLevel::Ambitious),
            3 => Some(AmbitionLevel::Solid),
            4 => Some(AmbitionLevel::MinimalPass),
            _ => None,
        }
    }
}

impl Default for AmbitionLevel {
    fn default() -> Self {
        AmbitionLevel::Unspecified
    }
}

/// Which objective the model builder installs.
///
/// The variant is selected once per run from the settings; the builder
/// dispatches at model-construction time, not per variable.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignmentVariant {
    /// Variant 1: maximize preference satisfaction only.
    Preference,
    /// Variant 2: group teams by ambition level only.
    LevelGroup,
    /// Variant 3: preference satisfaction plus level-grouping rewards.
    Combined,
}

impl AssignmentVariant {
    /// The persisted integer value, 1..=3.
    pub fn value(self) -> i64 {
        match self {
            AssignmentVariant::Preference => 1,
            AssignmentVariant::LevelGroup => 2,
            AssignmentVariant::Combined => 3,
        }
    }

    /// Parses the persisted integer value.
    pub fn from_value(value: i64) -> Option<AssignmentVariant> {
        match value {
            1 => Some(AssignmentVariant::Preference),
            2 => Some(AssignmentVariant::LevelGroup),
            3 => Some(AssignmentVariant::Combined),
            _ => None,
        }
    }

    /// True for the variants that use ambition-level answers.
    pub fn is_level_aware(self) -> bool {
        !matches!(self, AssignmentVariant::Preference)
    }
}

impl Default for AssignmentVariant {
    fn default() -> Self {
        AssignmentVariant::Preference
    }
}

/// A catalog project students can be assigned to.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Project {
    /// Database id.
    pub id: i64,
    /// Single uppercase letter A-Z, unique across the catalog.
    pub pid: String,
    /// Display name.
    pub name: String,
    /// Per-project override for the number of instances (1..=99).
    /// `None` falls back to `Settings::project_instances_default`.
    pub instances: Option<u32>,
    pub description: Option<String>,
    pub technologies: Option<String>,
    pub company: Option<String>,
    pub contact: Option<String>,
    pub url: Option<String>,
}

impl Project {
    /// "A: Name" style label used across displays.
    pub fn pid_name(&self) -> String {
        format!("{}: {}", self.pid, self.name)
    }
}

/// A roster entry.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Student {
    /// Database id.
    pub id: i64,
    /// Matriculation id, e.g. "s81234" or "gs81234". Unique.
    pub matriculation: String,
    pub first_name: String,
    pub last_name: String,
    pub study_program: StudyProgram,
    /// Inactive students stay in persisted teams for continuity but are
    /// rendered struck-through.
    pub is_active: bool,
}

impl Student {
    pub fn name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    /// The wing flag, derived from the study program.
    pub fn is_wing(&self) -> bool {
        self.study_program.is_wing()
    }
}

/// One poll per student; `is_generated` marks synthesized defaults.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Poll {
    pub id: i64,
    pub student_id: i64,
    pub is_generated: bool,
}

/// A single (poll, project) preference score, unique per pair.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ProjectAnswer {
    pub id: i64,
    pub poll_id: i64,
    pub project_id: i64,
    /// Score in `SCORE_MIN..=SCORE_MAX`.
    pub score: i64,
}

/// Optional ambition level answer, unique per poll.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct LevelAnswer {
    pub id: i64,
    pub poll_id: i64,
    pub level: AmbitionLevel,
}

/// One concrete team slot of a project. `(project_id, number)` is unique,
/// numbers start at 1. Instances are recreated before every solve.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ProjectInstance {
    pub id: i64,
    pub project_id: i64,
    pub number: u32,
}

/// One persisted assignment row: a student on a project instance.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Team {
    pub id: i64,
    pub project_id: i64,
    pub project_instance_id: i64,
    /// Unique: every student appears in at most one team.
    pub student_id: i64,
    /// Exactly one member per non-empty instance carries this flag.
    pub is_initial_contact: bool,
    /// Normalized preference score (0..=100) for this (instance, student) pair.
    pub score: i64,
}

/// Process-wide settings singleton.
///
/// The visibility flags gate the surrounding application's pages; the engine
/// itself reads the team sizing, instance expansion and solver knobs. A solve
/// captures its parameters at start, so editing settings while a run is in
/// flight does not affect it.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Settings {
    pub projects_visible: bool,
    pub poll_visible: bool,
    pub poll_writable: bool,
    pub teams_visible: bool,
    /// Minimum team size (1..=99). Teams end up with this many members or one more.
    pub team_min_member: u32,
    /// Default instance count for projects without an override (1..=99).
    pub project_instances_default: u32,
    /// Hide wing students in team displays.
    pub wings_hidden: bool,
    /// Objective variant the model builder installs.
    pub assignment_variant: AssignmentVariant,
    /// Solver wall-time limit in seconds (1..=3600). When the limit strikes
    /// before the exact solve finishes, a greedy feasible assignment is
    /// persisted instead (preference variant; level-aware runs fail).
    pub max_runtime_secs: u32,
    /// Accepted relative gap between objective and best bound, 0.0..=1.0.
    /// The bundled exact backend only stops at gap 0, so this is satisfied
    /// trivially on completed runs; it is recorded with the run statistics.
    pub relative_gap_limit: f64,
    /// Solver search workers (0..=64, 0 = all cores). Recorded with the run
    /// statistics; the bundled backend searches single-threaded regardless.
    pub num_workers: u32,
    /// Fill empty polls with random scores instead of neutral defaults.
    pub random_poll_defaults: bool,
    /// Weight of the level-grouping indicators in variants 2 and 3.
    pub level_group_factor: i64,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            projects_visible: false,
            poll_visible: false,
            poll_writable: false,
            teams_visible: false,
            team_min_member: 6,
            project_instances_default: 4,
            wings_hidden: false,
            assignment_variant: AssignmentVariant::Preference,
            max_runtime_secs: 300,
            relative_gap_limit: 0.0,
            num_workers: 0,
            random_poll_defaults: false,
            level_group_factor: 25,
        }
    }
}

impl Settings {
    /// Checks all field ranges. Returns the first violation as a message.
    pub fn validate(&self) -> Result<(), String> {
        if self.team_min_member < 1 || self.team_min_member > INSTANCE_LIMIT {
            return Err(format!(
                "team_min_member must be within 1..={}, got {}",
                INSTANCE_LIMIT, self.team_min_member
            ));
        }
        if self.project_instances_default < 1 || self.project_instances_default > INSTANCE_LIMIT {
            return Err(format!(
                "project_instances_default must be within 1..={}, got {}",
                INSTANCE_LIMIT, self.project_instances_default
            ));
        }
        if self.max_runtime_secs < 1 || self.max_runtime_secs > 3600 {
            return Err(format!(
                "max_runtime_secs must be within 1..=3600, got {}",
                self.max_runtime_secs
            ));
        }
        if !(0.0..=1.0).contains(&self.relative_gap_limit) {
            return Err(format!(
                "relative_gap_limit must be within 0.0..=1.0, got {}",
                self.relative_gap_limit
            ));
        }
        if self.num_workers > 64 {
            return Err(format!(
                "num_workers must be within 0..=64, got {}",
                self.num_workers
            ));
        }
        if self.level_group_factor < 0 {
            return Err(format!(
                "level_group_factor must not be negative, got {}",
                self.level_group_factor
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn study_program_tags_round_trip() {
        for program in StudyProgram::ALL {
            assert_eq!(StudyProgram::from_tag(program.tag()), Some(program));
        }
        assert_eq!(StudyProgram::from_tag("999"), None);
    }

    #[test]
    fn only_industrial_engineering_is_wing() {
        let wings: Vec<_> = StudyProgram::ALL.iter().filter(|p| p.is_wing()).collect();
        assert_eq!(wings, vec![&StudyProgram::IndustrialEngineering]);
    }

    #[test]
    fn ambition_level_values_round_trip() {
        for value in 1..=4 {
            let level = AmbitionLevel::from_value(value).unwrap();
            assert_eq!(level.value(), value);
        }
        assert_eq!(AmbitionLevel::from_value(0), None);
        assert_eq!(AmbitionLevel::from_value(5), None);
    }

    #[test]
    fn variant_values_round_trip() {
        for value in 1..=3 {
            let variant = AssignmentVariant::from_value(value).unwrap();
            assert_eq!(variant.value(), value);
        }
        assert_eq!(AssignmentVariant::from_value(4), None);
        assert!(!AssignmentVariant::Preference.is_level_aware());
        assert!(AssignmentVariant::LevelGroup.is_level_aware());
        assert!(AssignmentVariant::Combined.is_level_aware());
    }

    #[test]
    fn default_settings_validate() {
        assert!(Settings::default().validate().is_ok());
    }

    #[test]
    fn settings_ranges_are_enforced() {
        let mut settings = Settings {
            team_min_member: 0,
            ..Settings::default()
        };
        assert!(settings.validate().is_err());

        settings.team_min_member = 6;
        settings.relative_gap_limit = 1.5;
        assert!(settings.validate().is_err());

        settings.relative_gap_limit = 0.0;
        settings.num_workers = 65;
        assert!(settings.validate().is_err());
    }
}
