//! Markdown run report
//!
//! Human-readable summary of one run: metadata, totals, outcome breakdown and
//! the pages that failed.

use crate::output::traits::{OutputResult, RunSummary};
use crate::state::PageOutcome;
use std::fs::File;
use std::io::Write;
use std::path::Path;

/// Number of failures listed before the report truncates
const MAX_LISTED_FAILURES: usize = 100;

/// Writes the markdown report for a run
///
/// # Arguments
///
/// * `summary` - The run summary
/// * `output_path` - Path where the markdown file should be written
///
/// # Returns
///
/// * `Ok(())` - Successfully wrote the report
/// * `Err(OutputError)` - Failed to write the report
pub fn generate_markdown_summary(summary: &RunSummary, output_path: &Path) -> OutputResult<()> {
    let markdown = format_markdown_summary(summary);

    let mut file = File::create(output_path)?;
    file.write_all(markdown.as_bytes())?;

    Ok(())
}

/// Formats a run summary as markdown
pub fn format_markdown_summary(summary: &RunSummary) -> String {
    let mut md = String::new();

    md.push_str("# History Mirror Run Report\n\n");

    md.push_str("## Run Information\n\n");
    md.push_str(&format!("- **Run ID**: {}\n", summary.run_id));
    md.push_str(&format!("- **Mode**: {}\n", summary.mode));
    md.push_str(&format!("- **Started**: {}\n", summary.started_at));
    if let Some(finished) = &summary.finished_at {
        md.push_str(&format!("- **Finished**: {}\n", finished));
    }
    if let Some(duration) = summary.duration_seconds {
        md.push_str(&format!(
            "- **Duration**: {} seconds ({:.2} minutes)\n",
            duration,
            duration as f64 / 60.0
        ));
    }
    md.push_str(&format!("- **Status**: {}\n", summary.status));
    md.push_str(&format!("- **Config Hash**: {}\n\n", summary.config_hash));

    md.push_str("## Totals\n\n");
    md.push_str(&format!(
        "- **Pages Processed**: {}\n",
        summary.pages_processed
    ));
    md.push_str(&format!(
        "- **Versions Written**: {}\n",
        summary.versions_written
    ));
    md.push_str(&format!("- **Pages Failed**: {}\n", summary.pages_failed));
    md.push_str(&format!(
        "- **Success Rate**: {:.2}%\n",
        summary.success_rate()
    ));
    md.push_str(&format!(
        "- **Checkpoint Written**: {}\n\n",
        if summary.checkpoint_written { "yes" } else { "no" }
    ));

    md.push_str("## Page Outcomes\n\n");
    md.push_str("| Outcome | Pages |\n");
    md.push_str("|---------|-------|\n");
    for outcome in PageOutcome::all_outcomes() {
        md.push_str(&format!("| {} | {} |\n", outcome, summary.count(outcome)));
    }
    md.push('\n');

    if !summary.failures.is_empty() {
        md.push_str("## Failed Pages\n\n");
        md.push_str("| Page | Outcome | Message |\n");
        md.push_str("|------|---------|---------|\n");
        for failure in summary.failures.iter().take(MAX_LISTED_FAILURES) {
            md.push_str(&format!(
                "| {} | {} | {} |\n",
                failure.page,
                failure.outcome,
                escape_cell(failure.message.as_deref().unwrap_or(""))
            ));
        }
        if summary.failures.len() > MAX_LISTED_FAILURES {
            md.push_str(&format!(
                "\n... and {} more\n",
                summary.failures.len() - MAX_LISTED_FAILURES
            ));
        }
        md.push('\n');
    }

    md
}

fn escape_cell(s: &str) -> String {
    s.replace('|', "\\|").replace('\n', " ")
}
