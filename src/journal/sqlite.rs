//! SQLite journal implementation

use crate::journal::schema::initialize_schema;
use crate::journal::traits::{Journal, JournalError, JournalResult};
use crate::journal::{OutcomeRecord, RunCounters, RunRecord, RunStatus};
use crate::state::PageOutcome;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::collections::HashMap;
use std::path::Path;

const RUN_COLUMNS: &str = "id, started_at, finished_at, mode, config_hash, status,
     pages_processed, versions_written, pages_failed, checkpoint_written";

const OUTCOME_COLUMNS: &str = "run_id, page, outcome, versions_written, message, recorded_at";

/// SQLite journal backend
pub struct SqliteJournal {
    conn: Connection,
}

impl SqliteJournal {
    /// Opens or creates the journal database
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    ///
    /// # Returns
    ///
    /// * `Ok(SqliteJournal)` - Successfully opened/created database
    /// * `Err(MirrorError)` - Failed to open database
    pub fn new(path: &Path) -> crate::Result<Self> {
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self { conn })
    }

    /// Creates an in-memory database (for testing)
    #[cfg(test)]
    pub fn new_in_memory() -> crate::Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }
}

fn run_from_row(row: &Row<'_>) -> rusqlite::Result<RunRecord> {
    Ok(RunRecord {
        id: row.get(0)?,
        started_at: row.get(1)?,
        finished_at: row.get(2)?,
        mode: row.get(3)?,
        config_hash: row.get(4)?,
        status: RunStatus::from_db_string(&row.get::<_, String>(5)?).unwrap_or(RunStatus::Failed),
        counters: RunCounters {
            pages_processed: row.get::<_, i64>(6)? as u64,
            versions_written: row.get::<_, i64>(7)? as u64,
            pages_failed: row.get::<_, i64>(8)? as u64,
            checkpoint_written: row.get(9)?,
        },
    })
}

fn outcome_from_row(row: &Row<'_>) -> rusqlite::Result<(OutcomeRecord, String)> {
    let outcome_str: String = row.get(2)?;
    Ok((
        OutcomeRecord {
            run_id: row.get(0)?,
            page: row.get(1)?,
            outcome: PageOutcome::from_db_string(&outcome_str).unwrap_or(PageOutcome::Failed),
            versions_written: row.get(3)?,
            message: row.get(4)?,
            recorded_at: row.get(5)?,
        },
        outcome_str,
    ))
}

fn collect_outcomes(
    rows: impl Iterator<Item = rusqlite::Result<(OutcomeRecord, String)>>,
) -> JournalResult<Vec<OutcomeRecord>> {
    let mut records = Vec::new();
    for row in rows {
        let (record, raw) = row?;
        if PageOutcome::from_db_string(&raw).is_none() {
            return Err(JournalError::Corrupt(format!(
                "unknown outcome '{}' for page {}",
                raw, record.page
            )));
        }
        records.push(record);
    }
    Ok(records)
}

impl Journal for SqliteJournal {
    // ===== Run Management =====

    fn create_run(
        &mut self,
        mode: &str,
        config_hash: &str,
        started_at: DateTime<Utc>,
    ) -> JournalResult<i64> {
        self.conn.execute(
            "INSERT INTO runs (started_at, mode, config_hash, status) VALUES (?1, ?2, ?3, ?4)",
            params![
                started_at.to_rfc3339(),
                mode,
                config_hash,
                RunStatus::Running.to_db_string()
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn get_run(&self, run_id: i64) -> JournalResult<RunRecord> {
        self.conn
            .query_row(
                &format!("SELECT {} FROM runs WHERE id = ?1", RUN_COLUMNS),
                params![run_id],
                run_from_row,
            )
            .optional()?
            .ok_or(JournalError::RunNotFound(run_id))
    }

    fn get_latest_run(&self) -> JournalResult<Option<RunRecord>> {
        let run = self
            .conn
            .query_row(
                &format!("SELECT {} FROM runs ORDER BY id DESC LIMIT 1", RUN_COLUMNS),
                [],
                run_from_row,
            )
            .optional()?;
        Ok(run)
    }

    fn list_runs(&self, limit: usize) -> JournalResult<Vec<RunRecord>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM runs ORDER BY id DESC LIMIT ?1",
            RUN_COLUMNS
        ))?;
        let runs = stmt
            .query_map(params![limit as i64], run_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(runs)
    }

    fn update_run_status(&mut self, run_id: i64, status: RunStatus) -> JournalResult<()> {
        let updated = self.conn.execute(
            "UPDATE runs SET status = ?1 WHERE id = ?2",
            params![status.to_db_string(), run_id],
        )?;
        if updated == 0 {
            return Err(JournalError::RunNotFound(run_id));
        }
        Ok(())
    }

    fn finish_run(
        &mut self,
        run_id: i64,
        status: RunStatus,
        counters: &RunCounters,
    ) -> JournalResult<()> {
        let now = Utc::now().to_rfc3339();
        let updated = self.conn.execute(
            "UPDATE runs SET status = ?1, finished_at = ?2, pages_processed = ?3,
             versions_written = ?4, pages_failed = ?5, checkpoint_written = ?6
             WHERE id = ?7",
            params![
                status.to_db_string(),
                now,
                counters.pages_processed as i64,
                counters.versions_written as i64,
                counters.pages_failed as i64,
                counters.checkpoint_written,
                run_id
            ],
        )?;
        if updated == 0 {
            return Err(JournalError::RunNotFound(run_id));
        }
        Ok(())
    }

    fn earliest_run_start(&self, mode: &str) -> JournalResult<Option<DateTime<Utc>>> {
        let mut stmt = self
            .conn
            .prepare("SELECT started_at FROM runs WHERE mode = ?1")?;
        let rows = stmt.query_map(params![mode], |row| row.get::<_, String>(0))?;

        let mut earliest: Option<DateTime<Utc>> = None;
        for row in rows {
            let raw = row?;
            let started = DateTime::parse_from_rfc3339(&raw)
                .map_err(|e| JournalError::Corrupt(format!("run start '{}': {}", raw, e)))?
                .with_timezone(&Utc);
            earliest = Some(earliest.map_or(started, |e| e.min(started)));
        }
        Ok(earliest)
    }

    // ===== Page Outcomes =====

    fn record_outcome(
        &mut self,
        run_id: i64,
        page: &str,
        outcome: PageOutcome,
        versions_written: u32,
        message: Option<&str>,
    ) -> JournalResult<()> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO page_outcomes (run_id, page, outcome, versions_written, message, recorded_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                run_id,
                page,
                outcome.to_db_string(),
                versions_written,
                message,
                now
            ],
        )?;
        Ok(())
    }

    fn count_outcomes(&self, run_id: i64) -> JournalResult<HashMap<PageOutcome, u64>> {
        let mut stmt = self.conn.prepare(
            "SELECT outcome, COUNT(*) FROM page_outcomes WHERE run_id = ?1 GROUP BY outcome",
        )?;

        let mut counts = HashMap::new();
        let rows = stmt.query_map(params![run_id], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
        })?;

        for row in rows {
            let (outcome_str, count) = row?;
            let outcome = PageOutcome::from_db_string(&outcome_str)
                .ok_or_else(|| JournalError::Corrupt(format!("unknown outcome '{}'", outcome_str)))?;
            counts.insert(outcome, count as u64);
        }

        Ok(counts)
    }

    fn failures_for_run(&self, run_id: i64) -> JournalResult<Vec<OutcomeRecord>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM page_outcomes WHERE run_id = ?1 ORDER BY id",
            OUTCOME_COLUMNS
        ))?;
        let records = collect_outcomes(stmt.query_map(params![run_id], outcome_from_row)?)?;
        Ok(records
            .into_iter()
            .filter(|record| record.outcome.is_error())
            .collect())
    }

    fn history_for_page(&self, page: &str) -> JournalResult<Vec<OutcomeRecord>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM page_outcomes WHERE page = ?1 ORDER BY id",
            OUTCOME_COLUMNS
        ))?;
        let outcomes = collect_outcomes(stmt.query_map(params![page], outcome_from_row)?);
        outcomes
    }
}
