//! # tg-store: SQLite-backed preference store for the TeamGen engine.
//!
//! This crate persists the catalog, roster, polls and generated teams in a
//! single SQLite database and drives the engine around it: it fills missing
//! polls with defaults, expands project instances, runs the solver inside
//! one transaction, and assembles the read-only team and overview views the
//! surrounding application renders.

pub mod import;
pub mod schema;
pub mod service;
pub mod store;
pub mod view;

pub use store::{Store, StoreError};
