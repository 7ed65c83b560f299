//! Output types
//!
//! Summary data assembled from the journal for reports.

use crate::journal::OutcomeRecord;
use crate::state::PageOutcome;
use std::collections::HashMap;
use thiserror::Error;

/// Errors that can occur during output operations
#[derive(Debug, Error)]
pub enum OutputError {
    #[error("Failed to write output: {0}")]
    Write(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Journal error: {0}")]
    Journal(String),
}

/// Result type for output operations
pub type OutputResult<T> = Result<T, OutputError>;

/// Summary of one run
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    // Run metadata
    pub run_id: i64,
    pub mode: String,
    pub started_at: String,
    pub finished_at: Option<String>,
    pub duration_seconds: Option<u64>,
    pub status: String,
    pub config_hash: String,

    // Totals
    pub pages_processed: u64,
    pub versions_written: u64,
    pub pages_failed: u64,
    pub checkpoint_written: bool,

    /// Page count per outcome
    pub outcomes: HashMap<PageOutcome, u64>,

    /// Failed pages in processing order
    pub failures: Vec<OutcomeRecord>,
}

impl RunSummary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self, outcome: PageOutcome) -> u64 {
        self.outcomes.get(&outcome).copied().unwrap_or(0)
    }

    /// Returns the number of pages that were fetched or deliberately skipped
    pub fn total_pages(&self) -> u64 {
        self.outcomes.values().sum()
    }

    /// Returns the share of fetched pages that were handled completely, as a percentage
    pub fn success_rate(&self) -> f64 {
        let succeeded = self.count(PageOutcome::Archived) + self.count(PageOutcome::Unchanged);
        let attempted = succeeded + self.pages_failed;
        if attempted == 0 {
            return 0.0;
        }
        (succeeded as f64 / attempted as f64) * 100.0
    }
}
