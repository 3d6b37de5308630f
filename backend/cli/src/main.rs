//! tg-cli: Operator command line for the TeamGen assignment engine.
//!
//! Wires the SQLite preference store and the solver together so the whole
//! workflow can be driven without the web frontend:
//!
//! - `import`: load a CSV roster export
//! - `add-project`: add a catalog project
//! - `poll`: submit one student's preference scores
//! - `fill-polls`: generate default answers for silent students
//! - `generate`: regenerate all teams
//! - `teams`: show the current team rosters
//! - `overview`: show catalog/roster/poll counters
//! - `config`: inspect or update the settings singleton

use std::fs::File;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use rand::rngs::StdRng;
use rand::SeedableRng;

use tg_core::models::{AmbitionLevel, AssignmentVariant};
use tg_store::import::{import_students, ImportMode};
use tg_store::view::{overview, teams_view};
use tg_store::{service, Store};

#[derive(Parser)]
#[command(name = "tg-cli")]
#[command(version = "0.1.0")]
#[command(about = "TeamGen assignment engine CLI", long_about = None)]
struct Cli {
    /// SQLite database file.
    #[arg(long, global = true, default_value = "teamgen.db")]
    db: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Import students from a CSV roster export
    Import {
        /// CSV file with first_name, last_name, email, study_group columns
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// "add" keeps existing students, "new" wipes the roster first
        #[arg(long, default_value = "add")]
        mode: ImportMode,
    },

    /// Add a project to the catalog
    AddProject {
        /// Single uppercase letter A-Z
        pid: String,

        /// Display name
        name: String,

        /// Instance-count override (1-99); defaults to the settings value
        #[arg(long)]
        instances: Option<u32>,
    },

    /// Submit one student's poll
    Poll {
        /// Matriculation id, e.g. s81234
        student: String,

        /// Scores as PID=SCORE pairs, e.g. A=5 B=1
        #[arg(value_name = "SCORE", required = true)]
        scores: Vec<String>,

        /// Ambition level 1-4
        #[arg(long)]
        level: Option<i64>,
    },

    /// Generate default poll answers for students without one
    FillPolls {
        /// Seed for the randomized defaults
        #[arg(long)]
        seed: Option<u64>,
    },

    /// Regenerate all teams from the current poll data
    Generate {
        /// Seed for tie shuffling and initial-contact selection
        #[arg(long)]
        seed: Option<u64>,
    },

    /// Show the current team rosters
    Teams {
        /// Emit the full view as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show catalog, roster and poll counters
    Overview {
        /// Emit the counters as JSON
        #[arg(long)]
        json: bool,
    },

    /// Inspect or update the settings singleton
    Config {
        /// Minimum team size (1-99)
        #[arg(long)]
        team_min_member: Option<u32>,

        /// Default instances per project (1-99)
        #[arg(long)]
        project_instances: Option<u32>,

        /// Objective variant (1-3)
        #[arg(long)]
        variant: Option<i64>,

        /// Fill empty polls with random scores
        #[arg(long)]
        random_poll_defaults: Option<bool>,

        /// Hide wing students in team displays
        #[arg(long)]
        wings_hidden: Option<bool>,
    },
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();
    let mut store = Store::open(&cli.db)
        .with_context(|| format!("failed to open store at {:?}", cli.db))?;

    match cli.command {
        Commands::Import { file, mode } => cmd_import(&mut store, &file, mode),
        Commands::AddProject {
            pid,
            name,
            instances,
        } => cmd_add_project(&store, pid, name, instances),
        Commands::Poll {
            student,
            scores,
            level,
        } => cmd_poll(&mut store, &student, &scores, level),
        Commands::FillPolls { seed } => {
            let mut rng = seeded_rng(seed);
            service::generate_poll_defaults(&mut store, &mut rng)
                .context("failed to generate poll defaults")?;
            eprintln!("poll defaults generated");
            Ok(())
        }
        Commands::Generate { seed } => cmd_generate(&mut store, seed),
        Commands::Teams { json } => cmd_teams(&store, json),
        Commands::Overview { json } => cmd_overview(&store, json),
        Commands::Config {
            team_min_member,
            project_instances,
            variant,
            random_poll_defaults,
            wings_hidden,
        } => cmd_config(
            &store,
            team_min_member,
            project_instances,
            variant,
            random_poll_defaults,
            wings_hidden,
        ),
    }
}

fn seeded_rng(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => rand::make_rng(),
    }
}

fn cmd_import(store: &mut Store, file: &PathBuf, mode: ImportMode) -> Result<()> {
    let reader = File::open(file).with_context(|| format!("failed to open {file:?}"))?;
    let report = import_students(store, reader, mode).context("import failed")?;
    println!(
        "imported {} students, skipped {} rows",
        report.imported, report.skipped
    );
    Ok(())
}

fn cmd_add_project(
    store: &Store,
    pid: String,
    name: String,
    instances: Option<u32>,
) -> Result<()> {
    let id = store
        .insert_project(&tg_store::store::NewProject {
            pid: pid.clone(),
            name: name.clone(),
            instances,
            ..Default::default()
        })
        .context("failed to insert project")?;
    println!("added project {pid}: {name} (id {id})");
    Ok(())
}

fn cmd_poll(
    store: &mut Store,
    matriculation: &str,
    scores: &[String],
    level: Option<i64>,
) -> Result<()> {
    let Some(student) = tg_store::store::student_by_matriculation(store.conn(), matriculation)?
    else {
        bail!("no student with matriculation id {matriculation}");
    };

    let projects = store.projects()?;
    let mut pairs = Vec::new();
    for entry in scores {
        let Some((pid, value)) = entry.split_once('=') else {
            bail!("score '{entry}' is not in PID=SCORE form");
        };
        let Some(project) = projects.iter().find(|p| p.pid == pid) else {
            bail!("unknown project id '{pid}'");
        };
        let score: i64 = value
            .parse()
            .with_context(|| format!("score '{value}' is not a number"))?;
        pairs.push((project.id, score));
    }

    let level = match level {
        Some(value) => Some(
            AmbitionLevel::from_value(value)
                .with_context(|| format!("ambition level must be 1-4, got {value}"))?,
        ),
        None => None,
    };

    service::save_poll(store, student.id, &pairs, level).context("failed to save poll")?;
    println!("poll saved for {matriculation}");
    Ok(())
}

fn cmd_generate(store: &mut Store, seed: Option<u64>) -> Result<()> {
    let mut rng = seeded_rng(seed);
    let generated =
        service::generate_teams(store, &mut rng).context("team generation failed")?;
    if !generated {
        println!("nothing to generate: no polls or project answers yet");
        return Ok(());
    }
    let info = store.info()?;
    println!(
        "teams generated ({})",
        info.result_info.unwrap_or_else(|| "no result info".into())
    );
    Ok(())
}

fn cmd_teams(store: &Store, json: bool) -> Result<()> {
    let view = teams_view(store).context("failed to assemble teams view")?;
    if json {
        println!("{}", serde_json::to_string_pretty(&view)?);
        return Ok(());
    }
    if view.teams.is_empty() {
        println!("no teams generated yet");
        return Ok(());
    }
    for team in &view.teams {
        println!("{} [{}]", team.heading, team.happiness.summary);
        for member in &team.members {
            let mut markers = String::new();
            if member.is_initial_contact {
                markers.push('*');
            }
            if !member.is_visible {
                markers.push('-');
            }
            println!(
                "  {:<28} {:>5} {:>4} {:>6.2}{}",
                member.name,
                member.study_program_short,
                member.score,
                member.happiness.project,
                markers
            );
        }
    }
    println!("overall: {}", view.happiness.summary);
    Ok(())
}

fn cmd_overview(store: &Store, json: bool) -> Result<()> {
    let report = overview(store).context("failed to assemble overview")?;
    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }
    println!(
        "projects: {} ({} instances), students: {} ({} inactive), teams: {}",
        report.projects,
        report.project_instances,
        report.students,
        report.students_inactive,
        report.teams
    );
    println!(
        "polls: {} ({}%), submitted {} ({}%), generated {} ({}%), empty {} ({}%)",
        report.polls.count,
        report.polls.percent,
        report.polls_submitted.count,
        report.polls_submitted.percent,
        report.polls_generated.count,
        report.polls_generated.percent,
        report.polls_empty.count,
        report.polls_empty.percent
    );
    for project in &report.projects_by_score {
        println!(
            "  {} {:<24} score {:>4}  instances {}/{}",
            project.pid, project.name, project.total_score, project.instances_used,
            project.instances
        );
    }
    Ok(())
}

fn cmd_config(
    store: &Store,
    team_min_member: Option<u32>,
    project_instances: Option<u32>,
    variant: Option<i64>,
    random_poll_defaults: Option<bool>,
    wings_hidden: Option<bool>,
) -> Result<()> {
    let mut settings = store.settings()?;
    let mut changed = false;

    if let Some(value) = team_min_member {
        settings.team_min_member = value;
        changed = true;
    }
    if let Some(value) = project_instances {
        settings.project_instances_default = value;
        changed = true;
    }
    if let Some(value) = variant {
        settings.assignment_variant = AssignmentVariant::from_value(value)
            .with_context(|| format!("variant must be 1-3, got {value}"))?;
        changed = true;
    }
    if let Some(value) = random_poll_defaults {
        settings.random_poll_defaults = value;
        changed = true;
    }
    if let Some(value) = wings_hidden {
        settings.wings_hidden = value;
        changed = true;
    }

    if changed {
        store.save_settings(&settings).context("invalid settings")?;
    }
    println!("{}", serde_json::to_string_pretty(&settings)?);
    Ok(())
}
