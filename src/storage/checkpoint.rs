//! Crawl checkpoints kept at the archive root
//!
//! - `donelist.txt`: raw names of pages whose full history is archived, one per line,
//!   appended as each page completes during an initial crawl
//! - `dateLastCompleteUpdate.txt`: the start time of the last run that finished
//!   with no failures

use crate::{MirrorError, Result};
use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use std::collections::HashSet;
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

pub const DONE_LIST_FILE: &str = "donelist.txt";
pub const CHECKPOINT_FILE: &str = "dateLastCompleteUpdate.txt";

/// Pages whose complete history has been archived
#[derive(Debug)]
pub struct DoneList {
    path: PathBuf,
    names: Vec<String>,
    index: HashSet<String>,
}

impl DoneList {
    /// Loads the done-list from the archive root
    ///
    /// A missing file is an empty list. Blank lines are ignored.
    pub fn load(root: &Path) -> Result<Self> {
        let path = root.join(DONE_LIST_FILE);
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => String::new(),
            Err(e) => return Err(e.into()),
        };

        let mut names = Vec::new();
        let mut index = HashSet::new();
        for line in content.lines() {
            let name = line.trim_end();
            if !name.is_empty() && index.insert(name.to_string()) {
                names.push(name.to_string());
            }
        }

        tracing::debug!("Loaded {} done-list entries from {}", names.len(), path.display());

        Ok(Self { path, names, index })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains(name)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Names in completion order
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Records a page as complete
    ///
    /// # Returns
    ///
    /// * `Ok(true)` - The name was appended and flushed to disk
    /// * `Ok(false)` - The name was already present; the file is untouched
    pub fn append(&mut self, name: &str) -> Result<bool> {
        if self.contains(name) {
            return Ok(false);
        }

        // An interrupted append may have left an unterminated line
        let needs_newline = match fs::read(&self.path) {
            Ok(bytes) => bytes.last().is_some_and(|b| *b != b'\n'),
            Err(e) if e.kind() == ErrorKind::NotFound => false,
            Err(e) => return Err(e.into()),
        };

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        if needs_newline {
            file.write_all(b"\n")?;
        }
        writeln!(file, "{}", name)?;
        file.sync_data()?;

        self.names.push(name.to_string());
        self.index.insert(name.to_string());
        Ok(true)
    }
}

/// The timestamp incremental runs resume from
#[derive(Debug, Clone)]
pub struct ResumeCheckpoint {
    path: PathBuf,
}

impl ResumeCheckpoint {
    pub fn new(root: &Path) -> Self {
        Self {
            path: root.join(CHECKPOINT_FILE),
        }
    }

    /// Default checkpoint when none has been recorded: 1 January 1900
    pub fn epoch() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(1900, 1, 1, 0, 0, 0)
            .single()
            .unwrap_or(DateTime::<Utc>::MIN_UTC)
    }

    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    /// Reads the recorded checkpoint
    ///
    /// # Returns
    ///
    /// * `Ok(Some(ts))` - The recorded timestamp
    /// * `Ok(None)` - No checkpoint has been recorded yet
    /// * `Err(MirrorError::Checkpoint)` - The file exists but cannot be parsed
    pub fn load(&self) -> Result<Option<DateTime<Utc>>> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        parse_checkpoint_date(content.trim())
            .map(Some)
            .ok_or_else(|| {
                MirrorError::Checkpoint(format!(
                    "unrecognized date {:?} in {}",
                    content.trim(),
                    self.path.display()
                ))
            })
    }

    /// Reads the checkpoint, falling back to [`ResumeCheckpoint::epoch`]
    pub fn load_or_epoch(&self) -> Result<DateTime<Utc>> {
        Ok(self.load()?.unwrap_or_else(Self::epoch))
    }

    /// Replaces the recorded checkpoint
    ///
    /// The new value is written to a sibling file and renamed into place, so a
    /// reader sees either the old or the new timestamp.
    pub fn save(&self, timestamp: DateTime<Utc>) -> Result<()> {
        let tmp = self.path.with_extension("txt.tmp");
        {
            let mut file = fs::File::create(&tmp)?;
            writeln!(file, "{}", timestamp.to_rfc3339())?;
            file.sync_all()?;
        }
        fs::rename(&tmp, &self.path)?;

        tracing::info!("Recorded checkpoint {}", timestamp.to_rfc3339());
        Ok(())
    }
}

/// Parses a checkpoint date written by this or an earlier archiver
///
/// Accepts RFC 3339, `YYYY-MM-DD HH:MM:SS` (UTC), `YYYY-MM-DD` and `D Mon YYYY`.
pub fn parse_checkpoint_date(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(s) {
        return Some(ts.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return Some(naive.and_utc());
    }
    ["%Y-%m-%d", "%d %b %Y"]
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(s, format).ok())
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}
