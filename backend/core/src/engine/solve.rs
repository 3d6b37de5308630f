//! Run bookkeeping: the process-wide single-run flag and solve statistics.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};

use serde::{Deserialize, Serialize};

use super::EngineError;

static RUN_FLAG: AtomicBool = AtomicBool::new(false);

/// True while a team generation holds the [`RunGuard`].
pub fn is_running() -> bool {
    RUN_FLAG.load(Ordering::SeqCst)
}

/// RAII guard for the process-wide single-run policy.
///
/// Only one generation cycle may be in flight per process; the guard is
/// released on every exit path, including panics, via `Drop`.
#[derive(Debug)]
pub struct RunGuard(());

impl RunGuard {
    /// Acquires the run flag, refusing reentrant generation.
    pub fn acquire() -> Result<RunGuard, EngineError> {
        RUN_FLAG
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .map_err(|_| EngineError::AlreadyRunning)?;
        Ok(RunGuard(()))
    }
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        RUN_FLAG.store(false, Ordering::SeqCst);
    }
}

/// Terminal solver status of a finished run.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolveStatus {
    /// Proven optimal.
    Optimal,
    /// Feasible but not proven optimal (a backend stopped at a limit).
    Feasible,
}

impl fmt::Display for SolveStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SolveStatus::Optimal => write!(f, "OPTIMAL"),
            SolveStatus::Feasible => write!(f, "FEASIBLE"),
        }
    }
}

/// Statistics of one finished solve, recorded into the info singleton.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct SolveStats {
    pub status: SolveStatus,
    pub objective: f64,
    pub best_bound: f64,
    /// `|1 - objective / best_bound|`; 0 when proven optimal.
    pub solution_gap: f64,
    pub wall_time_secs: f64,
    pub solution_count: u32,
    pub students: usize,
    pub instances: usize,
    /// Number of non-empty instances in the solution.
    pub teams_used: usize,
}

impl SolveStats {
    /// Stats for a run the backend solved to proven optimality.
    pub fn optimal(
        objective: f64,
        wall_time_secs: f64,
        students: usize,
        instances: usize,
        teams_used: usize,
    ) -> SolveStats {
        SolveStats {
            status: SolveStatus::Optimal,
            objective,
            best_bound: objective,
            solution_gap: 0.0,
            wall_time_secs,
            solution_count: 1,
            students,
            instances,
            teams_used,
        }
    }

    /// Stats for a run that hit the time limit with a feasible solution in
    /// hand but without an optimality proof.
    pub fn feasible(
        objective: f64,
        best_bound: f64,
        wall_time_secs: f64,
        students: usize,
        instances: usize,
        teams_used: usize,
    ) -> SolveStats {
        let solution_gap = if best_bound == 0.0 {
            0.0
        } else {
            (1.0 - objective / best_bound).abs()
        };
        SolveStats {
            status: SolveStatus::Feasible,
            objective,
            best_bound,
            solution_gap,
            wall_time_secs,
            solution_count: 1,
            students,
            instances,
            teams_used,
        }
    }

    /// One-line summary for logs and the persisted result info.
    pub fn summary(&self) -> String {
        format!(
            "status={} objective={:.0} best_bound={:.0} gap={:.6} walltime={:.3}s solutions={} students={} instances={} teams={}",
            self.status,
            self.objective,
            self.best_bound,
            self.solution_gap,
            self.wall_time_secs,
            self.solution_count,
            self.students,
            self.instances,
            self.teams_used
        )
    }
}
