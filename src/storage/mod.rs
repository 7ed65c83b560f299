//! Local archive module for History-Mirror
//!
//! This module owns everything written under the archive root:
//! - One directory per page version, each holding `metadata.xml` and `source.txt`
//! - The current set of attached files per page
//! - The done-list and resume checkpoint files
//!
//! # Layout
//!
//! ```text
//! <root>/
//!   donelist.txt
//!   dateLastCompleteUpdate.txt
//!   b/a/balticon-7/
//!     V0001/metadata.xml
//!     V0001/source.txt
//!     V0002/...
//!     badge.jpg
//! ```
//!
//! A version directory is the unit of completeness. It is assembled under a hidden
//! staging name and renamed into place only after both files are on disk, so a
//! version directory that exists is always complete. An empty version directory
//! created by hand marks that version as present and it is never fetched.

mod checkpoint;
mod metadata;
mod text;

use crate::crawler::RevisionRecord;
use crate::page::{shard_path, PageId};
use crate::{MirrorError, Result};
use std::collections::HashSet;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

pub use checkpoint::{
    parse_checkpoint_date, DoneList, ResumeCheckpoint, CHECKPOINT_FILE, DONE_LIST_FILE,
};
pub use metadata::{render_metadata, CurrentPageState};
pub use text::transliterate;

pub const METADATA_FILE: &str = "metadata.xml";
pub const SOURCE_FILE: &str = "source.txt";

/// Content of `source.txt` for a revision whose source is empty
pub const BLANK_SOURCE: &str = "\n";

/// Prefix of in-progress directories and files; never visible as a version
const STAGING_PREFIX: &str = ".staging-";

/// Directory name of a version, e.g. `V0007`
pub fn version_dir_name(sequence_number: u32) -> String {
    format!("V{:04}", sequence_number)
}

/// A file attached to a page, as downloaded
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachedFile {
    pub name: String,
    pub content: Vec<u8>,
}

/// Filesystem archive of page versions
#[derive(Debug, Clone)]
pub struct VersionStore {
    root: PathBuf,
}

impl VersionStore {
    /// Opens the archive rooted at `root`, creating the directory if needed
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory holding every version of a page
    pub fn page_dir(&self, page: &PageId) -> PathBuf {
        self.root.join(shard_path(page.normalized()))
    }

    pub fn version_dir(&self, page: &PageId, sequence_number: u32) -> PathBuf {
        self.page_dir(page).join(version_dir_name(sequence_number))
    }

    /// Returns true if the version is archived
    ///
    /// Only the directory's existence is checked, not its contents.
    pub fn has_version(&self, page: &PageId, sequence_number: u32) -> bool {
        self.version_dir(page, sequence_number).is_dir()
    }

    /// Sequence numbers of the archived versions of a page, ascending
    pub fn stored_versions(&self, page: &PageId) -> Result<Vec<u32>> {
        let dir = self.page_dir(page);
        if !dir.is_dir() {
            return Ok(Vec::new());
        }

        let mut versions = Vec::new();
        for entry in fs::read_dir(&dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            let name = entry.file_name();
            let Some(number) = name.to_str().and_then(|n| n.strip_prefix('V')) else {
                continue;
            };
            if let Ok(n) = number.parse::<u32>() {
                versions.push(n);
            }
        }
        versions.sort_unstable();
        Ok(versions)
    }

    /// Writes both files of a version into a staging directory
    ///
    /// The version becomes visible only once [`StagedVersion::commit`] is called.
    /// A staging directory left behind by an interrupted run for the same version
    /// is discarded first.
    ///
    /// # Arguments
    ///
    /// * `page` - The page the version belongs to
    /// * `record` - The parsed history row
    /// * `source` - The revision's wiki source
    /// * `current` - Extra page state for current-version snapshots
    pub fn stage_version(
        &self,
        page: &PageId,
        record: &RevisionRecord,
        source: &str,
        current: Option<&CurrentPageState>,
    ) -> Result<StagedVersion> {
        let page_dir = self.page_dir(page);
        fs::create_dir_all(&page_dir)?;

        let dir_name = version_dir_name(record.sequence_number);
        let staging = page_dir.join(format!("{}{}", STAGING_PREFIX, dir_name));
        if staging.exists() {
            tracing::debug!("Discarding leftover staging directory {}", staging.display());
            fs::remove_dir_all(&staging)?;
        }
        fs::create_dir(&staging)?;

        let metadata = render_metadata(record, current)?;
        write_synced(&staging.join(METADATA_FILE), metadata.as_bytes())?;
        write_synced(&staging.join(SOURCE_FILE), source_bytes(source).as_bytes())?;

        Ok(StagedVersion {
            staging,
            target: page_dir.join(dir_name),
            committed: false,
        })
    }

    /// Writes a version and publishes it atomically
    pub fn write_version(
        &self,
        page: &PageId,
        record: &RevisionRecord,
        source: &str,
        current: Option<&CurrentPageState>,
    ) -> Result<()> {
        self.stage_version(page, record, source, current)?.commit()?;
        tracing::debug!("Stored {} {}", page, version_dir_name(record.sequence_number));
        Ok(())
    }

    /// Replaces the archived attachments of a page with the given set
    ///
    /// Files present in the archive but missing from `files` are removed. Version
    /// directories are never touched.
    ///
    /// # Returns
    ///
    /// The names of the removed files, sorted
    pub fn snapshot_files(&self, page: &PageId, files: &[AttachedFile]) -> Result<Vec<String>> {
        let page_dir = self.page_dir(page);
        fs::create_dir_all(&page_dir)?;

        let mut kept = HashSet::new();
        for file in files {
            if !is_safe_file_name(&file.name) {
                tracing::warn!("Skipping attachment with unsafe name {:?} on {}", file.name, page);
                continue;
            }
            let target = page_dir.join(&file.name);
            if target.is_dir() {
                tracing::warn!("Attachment {:?} on {} collides with a directory", file.name, page);
                continue;
            }
            let staging = page_dir.join(format!("{}{}", STAGING_PREFIX, file.name));
            write_synced(&staging, &file.content)?;
            fs::rename(&staging, &target)?;
            kept.insert(file.name.as_str());
        }

        let mut removed = Vec::new();
        for entry in fs::read_dir(&page_dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.starts_with('.') || kept.contains(name.as_str()) {
                continue;
            }
            fs::remove_file(entry.path())?;
            removed.push(name);
        }
        removed.sort();

        if !removed.is_empty() {
            tracing::debug!("Removed {} stale attachment(s) from {}", removed.len(), page);
        }
        Ok(removed)
    }
}

/// A fully written version waiting to be published
#[derive(Debug)]
pub struct StagedVersion {
    staging: PathBuf,
    target: PathBuf,
    committed: bool,
}

impl StagedVersion {
    /// Renames the staging directory to its version name
    ///
    /// Refuses to replace an existing version directory.
    pub fn commit(mut self) -> Result<()> {
        if self.target.exists() {
            return Err(MirrorError::Archive(format!(
                "version already present at {}",
                self.target.display()
            )));
        }
        fs::rename(&self.staging, &self.target)?;
        self.committed = true;

        if let Some(parent) = self.target.parent() {
            // Directory fsync is not supported everywhere
            if let Ok(dir) = File::open(parent) {
                let _ = dir.sync_all();
            }
        }
        Ok(())
    }
}

impl Drop for StagedVersion {
    fn drop(&mut self) {
        if !self.committed && self.staging.exists() {
            let _ = fs::remove_dir_all(&self.staging);
        }
    }
}

/// Version files are never empty; a blank revision is stored as one newline
fn source_bytes(source: &str) -> String {
    if source.is_empty() {
        BLANK_SOURCE.to_string()
    } else {
        transliterate(source)
    }
}

fn write_synced(path: &Path, bytes: &[u8]) -> Result<()> {
    let mut file = File::create(path)?;
    file.write_all(bytes)?;
    file.sync_all()?;
    Ok(())
}

fn is_safe_file_name(name: &str) -> bool {
    !name.is_empty()
        && !name.starts_with('.')
        && !name.contains(['/', '\\'])
        && name != METADATA_FILE
        && name != SOURCE_FILE
}
