//! Page identity module for History-Mirror
//!
//! This module provides page-name normalization, the shard path used to fan out
//! the archive directory tree, and the skip rules applied before a page is fetched.

mod filter;
mod shard;

use std::fmt;

pub use filter::{classify_page, PageClassification};
pub use shard::shard_path;

/// Page names that cannot be used as directory names on every platform
const RESERVED_FILE_NAMES: &[&str] = &["con"];

/// A wiki page as known to the remote site and to the local archive
///
/// The raw name is what the remote API returns and what page URLs are built from;
/// it is also what the done-list records. The normalized name is the filesystem-safe
/// form used for the page's archive directory.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PageId {
    raw: String,
    normalized: String,
}

impl PageId {
    /// Creates a page identifier from the remote page name
    pub fn new(raw: impl Into<String>) -> Self {
        let raw = raw.into();
        let normalized = normalize_page_name(&raw);
        Self { raw, normalized }
    }

    /// The page name exactly as the remote site reports it
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// The filesystem-safe page name
    pub fn normalized(&self) -> &str {
        &self.normalized
    }
}

impl fmt::Display for PageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.raw)
    }
}

/// Normalizes a remote page name into a filesystem-safe directory name
///
/// # Normalization Steps
///
/// 1. The first `:` (namespace separator) becomes `_`
/// 2. A name colliding with a reserved device name gets a trailing `-`
///
/// # Examples
///
/// ```
/// use history_mirror::page::normalize_page_name;
///
/// assert_eq!(normalize_page_name("Misc:Foo"), "Misc_Foo");
/// assert_eq!(normalize_page_name("con"), "con-");
/// assert_eq!(normalize_page_name("balticon-7"), "balticon-7");
/// ```
pub fn normalize_page_name(name: &str) -> String {
    let mut normalized = name.replacen(':', "_", 1);
    if RESERVED_FILE_NAMES.contains(&normalized.as_str()) {
        normalized.push('-');
    }
    normalized
}
