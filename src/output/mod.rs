//! Output module for run reports and statistics
//!
//! This module handles:
//! - Building run summaries from the journal
//! - Writing markdown run reports
//! - Printing archive statistics

mod markdown;
pub mod stats;
mod traits;

pub use markdown::{format_markdown_summary, generate_markdown_summary};
pub use stats::{load_statistics, print_statistics, MirrorStatistics};
pub use traits::{OutputError, OutputResult, RunSummary};

use crate::journal::{Journal, JournalError, RunRecord};
use crate::{MirrorError, Result};
use chrono::{DateTime, Utc};

/// Generates a summary of the most recent run
///
/// # Arguments
///
/// * `journal` - The run journal
///
/// # Returns
///
/// * `Ok(RunSummary)` - Summary of the latest run
/// * `Err(MirrorError)` - No run recorded, or the journal could not be read
pub fn generate_summary(journal: &dyn Journal) -> Result<RunSummary> {
    let run = journal
        .get_latest_run()?
        .ok_or(MirrorError::Journal(JournalError::NoRuns))?;
    summarize_run(journal, run)
}

/// Generates the summary of a specific run
pub fn summarize_run(journal: &dyn Journal, run: RunRecord) -> Result<RunSummary> {
    let duration_seconds = match (parse_timestamp(&run.started_at), &run.finished_at) {
        (Some(started), Some(finished)) => parse_timestamp(finished)
            .map(|finished| (finished - started).num_seconds().max(0) as u64),
        _ => None,
    };

    let outcomes = journal.count_outcomes(run.id)?;
    let failures = journal.failures_for_run(run.id)?;

    Ok(RunSummary {
        run_id: run.id,
        mode: run.mode,
        started_at: run.started_at,
        finished_at: run.finished_at,
        duration_seconds,
        status: run.status.to_db_string().to_string(),
        config_hash: run.config_hash,
        pages_processed: run.counters.pages_processed,
        versions_written: run.counters.versions_written,
        pages_failed: run.counters.pages_failed,
        checkpoint_written: run.counters.checkpoint_written,
        outcomes,
        failures,
    })
}

fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|ts| ts.with_timezone(&Utc))
}
