//! Journal trait and error types

use crate::journal::{OutcomeRecord, RunCounters, RunRecord, RunStatus};
use crate::state::PageOutcome;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use thiserror::Error;

/// Errors that can occur during journal operations
#[derive(Debug, Error)]
pub enum JournalError {
    #[error("Run not found: {0}")]
    RunNotFound(i64),

    #[error("No runs recorded yet")]
    NoRuns,

    #[error("Corrupt journal entry: {0}")]
    Corrupt(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Result type for journal operations
pub type JournalResult<T> = Result<T, JournalError>;

/// Record of crawl runs and per-page outcomes
///
/// The journal is bookkeeping only. The archive directory, done-list and checkpoint
/// file remain the source of truth for what has been mirrored.
pub trait Journal {
    // ===== Run Management =====

    /// Opens a new run
    ///
    /// # Arguments
    ///
    /// * `mode` - Crawl mode name ("initial" or "incremental")
    /// * `config_hash` - Hash of the configuration file
    /// * `started_at` - Run start time; also the candidate checkpoint
    ///
    /// # Returns
    ///
    /// The ID of the newly created run
    fn create_run(
        &mut self,
        mode: &str,
        config_hash: &str,
        started_at: DateTime<Utc>,
    ) -> JournalResult<i64>;

    /// Gets a run by ID
    fn get_run(&self, run_id: i64) -> JournalResult<RunRecord>;

    /// Gets the most recent run
    fn get_latest_run(&self) -> JournalResult<Option<RunRecord>>;

    /// Gets the most recent runs, newest first
    fn list_runs(&self, limit: usize) -> JournalResult<Vec<RunRecord>>;

    /// Updates the status of a run without finishing it
    fn update_run_status(&mut self, run_id: i64, status: RunStatus) -> JournalResult<()>;

    /// Closes a run with its final counters
    fn finish_run(
        &mut self,
        run_id: i64,
        status: RunStatus,
        counters: &RunCounters,
    ) -> JournalResult<()>;

    /// Start time of the earliest run in the given mode
    fn earliest_run_start(&self, mode: &str) -> JournalResult<Option<DateTime<Utc>>>;

    // ===== Page Outcomes =====

    /// Records what happened to one page
    fn record_outcome(
        &mut self,
        run_id: i64,
        page: &str,
        outcome: PageOutcome,
        versions_written: u32,
        message: Option<&str>,
    ) -> JournalResult<()>;

    /// Counts outcomes of a run by kind
    fn count_outcomes(&self, run_id: i64) -> JournalResult<HashMap<PageOutcome, u64>>;

    /// Gets the error outcomes of a run
    fn failures_for_run(&self, run_id: i64) -> JournalResult<Vec<OutcomeRecord>>;

    /// Gets every outcome ever recorded for a page, oldest first
    fn history_for_page(&self, page: &str) -> JournalResult<Vec<OutcomeRecord>>;
}
