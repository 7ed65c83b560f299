//! State module for tracking crawl progress
//!
//! # Components
//!
//! - `PageOutcome`: What happened to one page during one run (archived, unchanged,
//!   skipped, failed, ...). Outcomes are journaled so an operator can see which pages
//!   need attention.

mod page_outcome;

pub use page_outcome::PageOutcome;
