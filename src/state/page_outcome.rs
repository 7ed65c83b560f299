/// Page outcome definitions for tracking crawl progress
///
/// This module defines everything that can happen to a page during one run.
use std::fmt;

/// Represents the result of processing one page in one run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PageOutcome {
    // ===== Success States =====
    /// At least one new version was written to the archive
    Archived,

    /// Every version the run looked at was already present
    Unchanged,

    // ===== Skip States =====
    /// Page is in a reserved namespace - never fetched
    Reserved,

    /// Page is on the ignore list - never fetched
    Ignored,

    /// Remote site confirmed the page no longer exists
    NotFound,

    // ===== Error States =====
    /// A history row did not match the expected layout
    MalformedRow,

    /// The browser session timed out or could not find an element
    AutomationFailed,

    /// Page failed for another page-scoped reason (API, download)
    Failed,
}

impl PageOutcome {
    /// Returns true if the page was handled completely
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Archived | Self::Unchanged)
    }

    /// Returns true if the page was deliberately not fetched
    pub fn is_skipped(&self) -> bool {
        matches!(self, Self::Reserved | Self::Ignored | Self::NotFound)
    }

    /// Returns true if the page needs another attempt
    pub fn is_error(&self) -> bool {
        matches!(self, Self::MalformedRow | Self::AutomationFailed | Self::Failed)
    }

    /// Converts the outcome to its database string representation
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Archived => "archived",
            Self::Unchanged => "unchanged",
            Self::Reserved => "reserved",
            Self::Ignored => "ignored",
            Self::NotFound => "not_found",
            Self::MalformedRow => "malformed_row",
            Self::AutomationFailed => "automation_failed",
            Self::Failed => "failed",
        }
    }

    /// Parses an outcome from its database string representation
    ///
    /// Returns None if the string doesn't match any known outcome.
    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "archived" => Some(Self::Archived),
            "unchanged" => Some(Self::Unchanged),
            "reserved" => Some(Self::Reserved),
            "ignored" => Some(Self::Ignored),
            "not_found" => Some(Self::NotFound),
            "malformed_row" => Some(Self::MalformedRow),
            "automation_failed" => Some(Self::AutomationFailed),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }

    /// Returns all possible outcomes
    pub fn all_outcomes() -> Vec<Self> {
        vec![
            Self::Archived,
            Self::Unchanged,
            Self::Reserved,
            Self::Ignored,
            Self::NotFound,
            Self::MalformedRow,
            Self::AutomationFailed,
            Self::Failed,
        ]
    }
}

impl fmt::Display for PageOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_string())
    }
}
