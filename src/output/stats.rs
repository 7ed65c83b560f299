//! Archive statistics
//!
//! Combines the run journal with the archive's checkpoint files for `--stats`.

use crate::journal::{Journal, OutcomeRecord, RunRecord};
use crate::state::PageOutcome;
use crate::storage::{DoneList, ResumeCheckpoint};
use crate::Result;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::path::Path;

/// Number of runs listed by `--stats`
const RECENT_RUNS: usize = 10;

/// Archive statistics summary
#[derive(Debug, Clone)]
pub struct MirrorStatistics {
    /// Most recent runs, newest first
    pub recent_runs: Vec<RunRecord>,

    /// Page count per outcome for the most recent run
    pub latest_outcomes: HashMap<PageOutcome, u64>,

    /// Pages that failed in the most recent run
    pub latest_failures: Vec<OutcomeRecord>,

    /// Pages whose full history is archived
    pub pages_done: usize,

    /// Where the next incremental run resumes
    pub checkpoint: Option<DateTime<Utc>>,
}

/// Loads statistics from the journal and the archive root
///
/// # Arguments
///
/// * `journal` - The run journal
/// * `archive_root` - Root directory of the archive
pub fn load_statistics(journal: &dyn Journal, archive_root: &Path) -> Result<MirrorStatistics> {
    let recent_runs = journal.list_runs(RECENT_RUNS)?;
    let (latest_outcomes, latest_failures) = match recent_runs.first() {
        Some(run) => (
            journal.count_outcomes(run.id)?,
            journal.failures_for_run(run.id)?,
        ),
        None => (HashMap::new(), Vec::new()),
    };

    let pages_done = DoneList::load(archive_root)?.len();
    let checkpoint = ResumeCheckpoint::new(archive_root).load()?;

    Ok(MirrorStatistics {
        recent_runs,
        latest_outcomes,
        latest_failures,
        pages_done,
        checkpoint,
    })
}

/// Prints statistics to stdout
pub fn print_statistics(stats: &MirrorStatistics) {
    println!("=== Archive Statistics ===\n");

    println!("Archive:");
    println!("  Pages with complete history: {}", stats.pages_done);
    match stats.checkpoint {
        Some(ts) => println!("  Resume checkpoint: {}", ts.to_rfc3339()),
        None => println!("  Resume checkpoint: none (initial crawl not finished)"),
    }
    println!();

    if stats.recent_runs.is_empty() {
        println!("No runs recorded yet.");
        return;
    }

    println!("Recent Runs:");
    for run in &stats.recent_runs {
        println!(
            "  #{} {} {} [{}] pages: {} versions: {} failed: {}",
            run.id,
            run.started_at,
            run.mode,
            run.status.to_db_string(),
            run.counters.pages_processed,
            run.counters.versions_written,
            run.counters.pages_failed
        );
    }
    println!();

    if !stats.latest_outcomes.is_empty() {
        println!("Latest Run Outcomes:");
        let mut counts: Vec<_> = stats.latest_outcomes.iter().collect();
        counts.sort_by(|a, b| b.1.cmp(a.1));
        for (outcome, count) in counts {
            println!("  {}: {}", outcome, count);
        }
        println!();
    }

    if !stats.latest_failures.is_empty() {
        println!("Failed Pages ({}):", stats.latest_failures.len());
        for failure in &stats.latest_failures {
            println!(
                "  - {} [{}] {}",
                failure.page,
                failure.outcome,
                failure.message.as_deref().unwrap_or("")
            );
        }
    }
}
