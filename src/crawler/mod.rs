//! Crawler module for mirroring page histories
//!
//! This module contains the core crawling logic, including:
//! - Parsing rendered history rows into revision records
//! - Walking a page's paginated revision list
//! - Reading the current title, tags, source and files of a page
//! - Locating where an incremental run resumes
//! - Overall run coordination

mod coordinator;
mod history;
mod resume;
mod revision;
mod snapshot;

pub use coordinator::{run_mirror, Coordinator, CrawlMode, RunReport};
pub use history::{Cursor, HistoryWalker};
pub use resume::ResumeLocator;
pub use revision::{parse_row, sequence_number, ChangeType, RevisionRecord};
pub use snapshot::{list_files, login, read_current_source, read_tags, read_title, RemoteFile};
