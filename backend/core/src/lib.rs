//! # tg-core: Optimal team assignment for classroom project allocation
//!
//! This crate turns a roster of students with polled project preferences
//! into an assignment of every student to exactly one project instance.
//! The problem is modelled as a 0/1 integer program: hard constraints keep
//! the group composition rules (every student placed once, team sizes
//! between the minimum and minimum+1, wing students spread evenly, an exact
//! number of used instances), while a selectable soft objective maximizes
//! aggregate preference satisfaction and, optionally, ambition-level
//! homogeneity.
//!
//! ## Quick example
//!
//! ```no_run
//! use rand::SeedableRng;
//! use rand::rngs::StdRng;
//! use tg_core::engine::{
//!     solve_assignment, AssignmentInput, PreferenceRow, SolveConfig, StudentSeat, TeamSlot,
//! };
//! use tg_core::models::{AmbitionLevel, Settings};
//!
//! let input = AssignmentInput {
//!     students: (1..=6)
//!         .map(|id| StudentSeat {
//!             id,
//!             is_wing: false,
//!             level: AmbitionLevel::Unspecified,
//!         })
//!         .collect(),
//!     slots: vec![
//!         TeamSlot { id: 1, project_id: 1, number: 1 },
//!         TeamSlot { id: 2, project_id: 2, number: 1 },
//!     ],
//!     answers: (1..=6)
//!         .map(|student_id| PreferenceRow { student_id, project_id: 1, score: 5 })
//!         .collect(),
//!     config: SolveConfig::from_settings(&Settings {
//!         team_min_member: 3,
//!         ..Settings::default()
//!     }),
//! };
//!
//! let mut rng = StdRng::seed_from_u64(1);
//! match solve_assignment(&input, &mut rng) {
//!     Ok(solution) => println!("{}", solution.stats.summary()),
//!     Err(e) => eprintln!("assignment failed: {e}"),
//! }
//! ```
//!
//! The crate is persistence-free: `tg-store` feeds it snapshots of the
//! preference store and writes the resulting team rows back.

pub mod engine;
pub mod expand;
pub mod happiness;
pub mod models;
pub mod score;

pub use engine::{
    is_running, solve_assignment, AssignmentInput, AssignmentSolution, EngineError, RunGuard,
    SolveConfig, SolveStats, TeamDraft,
};
