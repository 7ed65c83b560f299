//! History-Mirror: an incremental wiki history archiver
//!
//! This crate mirrors the complete edit history of a wiki into a local, versioned
//! directory tree. Crawls are restartable at any point: every stored version is either
//! fully present or absent, completed pages are checkpointed in a done-list, and
//! incremental runs resume from the last fully completed update.

pub mod browser;
pub mod config;
pub mod crawler;
pub mod journal;
pub mod output;
pub mod page;
pub mod state;
pub mod storage;
pub mod wikidot;

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for History-Mirror operations
#[derive(Debug, Error)]
pub enum MirrorError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Browser automation error: {0}")]
    Driver(#[from] browser::DriverError),

    #[error("Page not found: {page}")]
    PageNotFound { page: String },

    #[error("Malformed history row ({reason}): {row:?}")]
    MalformedRow { row: String, reason: String },

    #[error("Timestamp lookup failed for {page}: {message}")]
    OracleLookup { page: String, message: String },

    #[error("Site API error: {0}")]
    Api(String),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("Journal error: {0}")]
    Journal(#[from] journal::JournalError),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Checkpoint error: {0}")]
    Checkpoint(String),

    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("Archive error: {0}")]
    Archive(String),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] ::url::ParseError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl MirrorError {
    /// Returns true if the error only concerns the page being processed
    ///
    /// Page-scoped errors are logged and journaled, and the crawl moves on to the
    /// next page. Everything else aborts the run.
    pub fn is_page_scoped(&self) -> bool {
        matches!(
            self,
            Self::Driver(_)
                | Self::PageNotFound { .. }
                | Self::MalformedRow { .. }
                | Self::Api(_)
                | Self::Reqwest(_)
        )
    }
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// Result type alias for History-Mirror operations
pub type Result<T> = std::result::Result<T, MirrorError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use config::Config;
pub use crawler::{CrawlMode, RevisionRecord};
pub use page::PageId;
pub use state::PageOutcome;
pub use storage::VersionStore;
