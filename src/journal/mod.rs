//! Run journal
//!
//! Every run is recorded in a SQLite database together with the outcome of each
//! page it touched. The journal backs `--stats` and the markdown run report, and
//! provides the start time of the first initial-mode run when an initial crawl
//! finishes and the resume checkpoint is first written.

mod schema;
mod sqlite;
mod traits;

pub use sqlite::SqliteJournal;
pub use traits::{Journal, JournalError, JournalResult};

use crate::state::PageOutcome;
use crate::Result;

use std::path::Path;

/// Initializes or opens a journal database
///
/// # Arguments
///
/// * `path` - Path to the SQLite database file
///
/// # Returns
///
/// * `Ok(SqliteJournal)` - Successfully initialized journal
/// * `Err(MirrorError)` - Failed to open the database
pub fn open_journal(path: &Path) -> Result<SqliteJournal> {
    SqliteJournal::new(path)
}

/// Represents a crawl run
#[derive(Debug, Clone)]
pub struct RunRecord {
    pub id: i64,
    pub started_at: String,
    pub finished_at: Option<String>,
    pub mode: String,
    pub config_hash: String,
    pub status: RunStatus,
    pub counters: RunCounters,
}

/// Totals accumulated over one run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunCounters {
    pub pages_processed: u64,
    pub versions_written: u64,
    pub pages_failed: u64,
    /// Whether the run advanced the resume checkpoint
    pub checkpoint_written: bool,
}

/// One page outcome as stored
#[derive(Debug, Clone)]
pub struct OutcomeRecord {
    pub run_id: i64,
    pub page: String,
    pub outcome: PageOutcome,
    pub versions_written: u32,
    pub message: Option<String>,
    pub recorded_at: String,
}

/// Status of a crawl run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Running,
    /// Every page succeeded or was skipped
    Completed,
    /// The run finished but some pages failed
    CompletedWithErrors,
    /// A fatal error stopped the run
    Failed,
}

impl RunStatus {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::CompletedWithErrors => "completed_with_errors",
            Self::Failed => "failed",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "running" => Some(Self::Running),
            "completed" => Some(Self::Completed),
            "completed_with_errors" => Some(Self::CompletedWithErrors),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}
